use crate::app_config;
use crate::domain::{Coordinate, Country, CountryCode};
use crate::provider::nominatim_response::ReverseResponse;
use crate::provider::resolver::{ResolveError, Resolver};
use crate::rate_limiter::RateLimiter;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::iter;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::sleep;
use tokio_retry::RetryIf;
use tracing::{debug, info, instrument, warn};

const NAME: &str = "nominatim";

/// OpenStreetMap's reverse geocoder. No daily cap, but request starts must be at least one interval apart.
#[derive(Debug)]
pub struct Nominatim {
    client: Client,
    url: String,
    max_retries: usize,
    rate_limiter: Arc<RateLimiter>,
    // Serializes callers from both lanes
    gate: Mutex<()>,
}

impl Nominatim {
    pub fn new(client: Client, config: &app_config::Nominatim, rate_limiter: Arc<RateLimiter>) -> Self {
        Nominatim {
            client,
            url: config.url().trim_end_matches('/').to_string(),
            max_retries: config.max_retries(),
            rate_limiter,
            gate: Mutex::new(()),
        }
    }

    async fn wait_for_slot(&self) {
        let delay = self.rate_limiter.delay_until_next_interval_slot();
        if !delay.is_zero() {
            debug!("⏳ Waiting {:?} for the next request slot", delay);
            sleep(delay).await;
        }
    }

    async fn request(&self, coordinate: Coordinate) -> Result<Country, ResolveError> {
        self.rate_limiter.mark_interval_request(self.rate_limiter.now_ms());

        let latitude = format!("{:.6}", coordinate.latitude());
        let longitude = format!("{:.6}", coordinate.longitude());
        let response = self
            .client
            .get(format!("{}/reverse", self.url))
            .query(&[("format", "json"), ("lat", latitude.as_str()), ("lon", longitude.as_str())])
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => {}
            StatusCode::TOO_MANY_REQUESTS => return Err(ResolveError::RateLimited(NAME)),
            status => return Err(ResolveError::HttpStatus { provider: NAME, status }),
        }

        let body = response.text().await?;
        let reverse_response: ReverseResponse = serde_json::from_str(&body)?;

        let Some(address) = reverse_response.address else {
            debug!(error = ?reverse_response.error, "🌊 Nominatim has no address for {}", coordinate);
            return Ok(Country::Unknown);
        };

        match address.country_code.as_deref().and_then(CountryCode::parse) {
            Some(code) => Ok(code.into()),
            None => {
                warn!("⚠️ Invalid Nominatim country_code for {}: {:?}", coordinate, address.country_code);
                Ok(Country::Unknown)
            }
        }
    }
}

#[async_trait]
impl Resolver for Nominatim {
    fn name(&self) -> &'static str {
        NAME
    }

    fn is_available(&self) -> bool {
        self.rate_limiter.can_use_interval_provider()
    }

    #[instrument(skip(self), fields(coordinate = %coordinate))]
    async fn resolve(&self, coordinate: Coordinate) -> Result<Country, ResolveError> {
        let _permit = self.gate.lock().await;
        self.wait_for_slot().await;

        let rate_limiter = self.rate_limiter.clone();
        let strategy = iter::repeat_with(move || rate_limiter.delay_until_next_interval_slot()).take(self.max_retries);
        let result = RetryIf::spawn(
            strategy,
            || self.request(coordinate),
            |e: &ResolveError| {
                let transient = e.is_transient();
                if transient {
                    warn!("⏳ Nominatim request failed, retrying after delay: {}", e);
                }
                transient
            },
        )
        .await;

        match result {
            Ok(country) => {
                info!("🌍 Resolving {} with Nominatim... OK, {}", coordinate, country);
                Ok(country)
            }
            Err(e) if e.is_transient() => {
                warn!("⚠️ Resolving {} with Nominatim... failed, {}", coordinate, e);
                Err(e)
            }
            Err(e) => {
                warn!("⚠️ Resolving {} with Nominatim... no usable answer, {}", coordinate, e);
                Ok(Country::Unknown)
            }
        }
    }
}
