use crate::app_config::AppConfig;
use crate::cache::Cache;
use crate::clock::{Clock, SystemClock};
use crate::coordinates::load_coordinates;
use crate::dispatcher::Dispatcher;
use crate::provider::{Geoapify, Nominatim, Resolver};
use crate::rate_limiter::{Limits, RateLimiter};
use std::sync::Arc;
use tokio::time::Instant;
use tracing::info;

mod app_config;
mod cache;
mod clock;
mod coordinate_deserializer;
mod coordinates;
mod dispatcher;
mod domain;
mod provider;
mod rate_limiter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();

    info!("🪵 Starting {} v{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
    let start = Instant::now();

    let config = AppConfig::load()?;
    info!("✅  Loaded configuration");

    let client = provider::new_client(&config)?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let rate_limiter = Arc::new(RateLimiter::load(config.files().rate_limits(), Limits::from(&config), clock));
    let cache = Arc::new(Cache::load(config.files().cache()).await);
    info!("✅  Loaded {} cached location(s)", cache.len());

    let nominatim: Arc<dyn Resolver> = Arc::new(Nominatim::new(client.clone(), config.nominatim(), rate_limiter.clone()));
    let geoapify: Arc<dyn Resolver> = Arc::new(Geoapify::new(client, config.geoapify(), rate_limiter.clone(), nominatim.clone()));
    let dispatcher = Dispatcher::new(cache, nominatim, geoapify, config.core().lane_buffer_size());
    info!("✅  Initialized dispatcher");

    let coordinates = load_coordinates(config.files().coordinates()).await?;
    let countries = dispatcher.resolve_all(&coordinates).await;

    for coordinate in &coordinates {
        let country = countries.get(coordinate).copied().unwrap_or_default();
        println!("{} -> Country: {}", coordinate, country);
    }

    info!(
        duration = ?start.elapsed(),
        "🏁 Resolved {} coordinate(s), {} Geoapify request(s) used today",
        coordinates.len(),
        rate_limiter.daily_count()
    );
    Ok(())
}
