use crate::cache::Cache;
use crate::dispatcher::lane::{Lane, LaneError, Ticket};
use crate::domain::{Coordinate, Country};
use crate::provider::Resolver;
use futures::stream::{FuturesUnordered, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};

/// Resolves batches of coordinates through the cache and two provider lanes.
#[derive(Debug)]
pub struct Dispatcher {
    cache: Arc<Cache>,
    interval_lane: Lane,
    quota_lane: Lane,
}

impl Dispatcher {
    /// `interval` is the provider that is always allowed to answer eventually, `quota` the one with a daily allowance.
    pub fn new(cache: Arc<Cache>, interval: Arc<dyn Resolver>, quota: Arc<dyn Resolver>, lane_buffer_size: usize) -> Self {
        Dispatcher {
            cache,
            interval_lane: Lane::spawn(interval, lane_buffer_size),
            quota_lane: Lane::spawn(quota, lane_buffer_size),
        }
    }

    /// Maps every coordinate to a country, `Unknown` when it could not be resolved.
    ///
    /// Cached keys never reach a provider, coordinates that share a key are looked up once. New results are cached and
    /// flushed as soon as they arrive.
    #[instrument(skip_all, fields(coordinates = coordinates.len()))]
    pub async fn resolve_all(&self, coordinates: &[Coordinate]) -> HashMap<Coordinate, Country> {
        let start = Instant::now();
        let mut countries = HashMap::with_capacity(coordinates.len());

        let mut uncached: Vec<(String, Vec<Coordinate>)> = Vec::new();
        let mut uncached_index: HashMap<String, usize> = HashMap::new();
        for &coordinate in coordinates {
            let key = coordinate.cache_key();
            if let Some(country) = self.cache.get(&key) {
                countries.insert(coordinate, country);
                continue;
            }

            match uncached_index.get(&key) {
                Some(&index) => uncached[index].1.push(coordinate),
                None => {
                    uncached_index.insert(key.clone(), uncached.len());
                    uncached.push((key, vec![coordinate]));
                }
            }
        }

        info!("🌍 Resolving {} coordinate(s)... {} cached, {} to look up", coordinates.len(), countries.len(), uncached.len());

        let mut lookups = FuturesUnordered::new();
        for (key, group) in uncached {
            let lane = self.route();
            debug!(lane = lane.name(), "🛣️ Routing {}", key);
            let submitted = lane.submit(group[0]).await;
            lookups.push(async move { (key, group, wait(submitted).await) });
        }

        while let Some((key, group, result)) = lookups.next().await {
            let country = match result {
                Ok(country) => {
                    self.remember(key, country).await;
                    country
                }
                Err(LaneError::Resolve(e)) => {
                    warn!("⚠️ Unable to resolve {}: {}", key, e);
                    Country::Unknown
                }
                Err(e) => {
                    error!("❌ Unable to resolve {}: {}", key, e);
                    Country::Unknown
                }
            };

            countries.extend(group.into_iter().map(|coordinate| (coordinate, country)));
        }

        info!(duration = ?start.elapsed(), "🌍 Resolving {} coordinate(s)... OK", coordinates.len());
        countries
    }

    /// Jobs waiting in the interval lane have not marked the rate limiter yet, so a busy interval lane counts as
    /// throttled.
    fn route(&self) -> &Lane {
        if self.interval_lane.is_idle() && self.interval_lane.provider_available() {
            &self.interval_lane
        } else if self.quota_lane.provider_available() {
            &self.quota_lane
        } else {
            // Always answers eventually, it just waits for its slot
            &self.interval_lane
        }
    }

    async fn remember(&self, key: String, country: Country) {
        self.cache.put(key, country);
        if let Err(e) = self.cache.flush().await {
            warn!("⚠️ Unable to save cache: {}", e);
        }
    }
}

async fn wait(submitted: Result<Ticket, LaneError>) -> Result<Country, LaneError> {
    submitted?.wait().await
}
