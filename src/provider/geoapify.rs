use crate::app_config;
use crate::domain::{Coordinate, Country, CountryCode};
use crate::provider::geoapify_response::FeatureCollection;
use crate::provider::resolver::{ResolveError, Resolver};
use crate::rate_limiter::RateLimiter;
use async_trait::async_trait;
use reqwest::{Client, StatusCode, header};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

const NAME: &str = "geoapify";

/// Geoapify's reverse geocoder, limited to a fixed number of requests per UTC day.
///
/// Whenever it cannot or may not answer it hands the coordinate to `fallback` and waits for that result.
#[derive(Debug)]
pub struct Geoapify {
    client: Client,
    url: String,
    api_key: String,
    enabled: bool,
    rate_limiter: Arc<RateLimiter>,
    fallback: Arc<dyn Resolver>,
}

impl Geoapify {
    pub fn new(client: Client, config: &app_config::Geoapify, rate_limiter: Arc<RateLimiter>, fallback: Arc<dyn Resolver>) -> Self {
        Geoapify {
            client,
            url: config.url().trim_end_matches('/').to_string(),
            api_key: config.api_key().to_string(),
            enabled: config.enabled(),
            rate_limiter,
            fallback,
        }
    }

    async fn fall_back(&self, coordinate: Coordinate) -> Result<Country, ResolveError> {
        info!("↪️ Handing {} to {}", coordinate, self.fallback.name());
        self.fallback.resolve(coordinate).await
    }

    async fn request(&self, coordinate: Coordinate) -> Result<Option<Country>, ResolveError> {
        let latitude = format!("{:.6}", coordinate.latitude());
        let longitude = format!("{:.6}", coordinate.longitude());
        let response = self
            .client
            .get(format!("{}/v1/geocode/reverse", self.url))
            .query(&[("lat", latitude.as_str()), ("lon", longitude.as_str()), ("apiKey", self.api_key.as_str())])
            .header(header::ACCEPT, "application/json")
            .send()
            .await?;

        if response.status() != StatusCode::OK {
            warn!(status_code = %response.status(), "⚠️ Geoapify HTTP error");
            return Ok(None);
        }

        let body = response.text().await?;
        let collection: FeatureCollection = serde_json::from_str(&body)?;

        let Some(feature) = collection.features.into_iter().next() else {
            warn!("⚠️ Geoapify returned no features for {}", coordinate);
            return Ok(Some(Country::Unknown));
        };

        match feature.properties.country_code.as_deref().and_then(CountryCode::parse) {
            Some(code) => {
                self.rate_limiter.increment_quota_provider();
                Ok(Some(code.into()))
            }
            None => {
                warn!("⚠️ Invalid Geoapify country_code for {}: {:?}", coordinate, feature.properties.country_code);
                Ok(Some(Country::Unknown))
            }
        }
    }
}

#[async_trait]
impl Resolver for Geoapify {
    fn name(&self) -> &'static str {
        NAME
    }

    fn is_available(&self) -> bool {
        self.enabled && self.rate_limiter.can_use_quota_provider()
    }

    #[instrument(skip(self), fields(coordinate = %coordinate))]
    async fn resolve(&self, coordinate: Coordinate) -> Result<Country, ResolveError> {
        if !self.enabled {
            debug!("Geoapify is disabled");
            return self.fall_back(coordinate).await;
        }

        if !self.rate_limiter.can_use_quota_provider() {
            warn!("📉 Geoapify daily limit reached");
            return self.fall_back(coordinate).await;
        }

        match self.request(coordinate).await {
            Ok(Some(country)) => {
                info!("🌍 Resolving {} with Geoapify... OK, {}", coordinate, country);
                Ok(country)
            }
            Ok(None) => self.fall_back(coordinate).await,
            Err(e) if e.is_transient() => {
                warn!("⚠️ Resolving {} with Geoapify... failed, {}", coordinate, e);
                Err(e)
            }
            Err(e) => {
                warn!("⚠️ Resolving {} with Geoapify... no usable answer, {}", coordinate, e);
                Ok(Country::Unknown)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app_config::AppConfigBuilder;
    use crate::clock::ManualClock;
    use crate::provider::{Nominatim, StubResolver, new_client};
    use crate::rate_limiter::Limits;
    use chrono::{TimeZone, Utc};
    use mockito::{Matcher, Server};
    use pretty_assertions::assert_eq;
    use std::time::Duration;
    use test_log::test;

    fn paris() -> Coordinate {
        Coordinate::new(48.8566, 2.3522)
    }

    fn rate_limiter(daily_limit: u32) -> Arc<RateLimiter> {
        let clock = Arc::new(ManualClock::at(Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap()));
        let limits = Limits {
            daily_limit,
            interval: Duration::from_millis(10),
        };
        Arc::new(RateLimiter::in_memory(limits, clock))
    }

    fn geoapify(url: String, enabled: bool, rate_limiter: Arc<RateLimiter>, fallback: Arc<dyn Resolver>) -> Geoapify {
        let config = AppConfigBuilder::new().geoapify_url(url).geoapify_enabled(enabled).build();
        let client = new_client(&config).unwrap();
        Geoapify::new(client, config.geoapify(), rate_limiter, fallback)
    }

    fn fallback() -> Arc<StubResolver> {
        Arc::new(StubResolver::answering("fallback", Country::from(CountryCode::parse("XX"))))
    }

    #[test(tokio::test)]
    async fn resolve_returns_the_code_and_counts_the_request() -> Result<(), ResolveError> {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/v1/geocode/reverse")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("lat".into(), "48.856600".into()),
                Matcher::UrlEncoded("lon".into(), "2.352200".into()),
                Matcher::UrlEncoded("apiKey".into(), "key".into()),
            ]))
            .match_header("accept", "application/json")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(include_str!("../../tests/resources/geoapify_reverse_response.json"))
            .create_async()
            .await;
        let rate_limiter = rate_limiter(3000);
        let fallback = fallback();

        let country = geoapify(server.url(), true, rate_limiter.clone(), fallback.clone()).resolve(paris()).await?;

        mock.assert_async().await;
        assert_eq!(country.to_string(), "FR");
        assert_eq!(rate_limiter.daily_count(), 1);
        assert!(fallback.calls().is_empty());
        Ok(())
    }

    #[test(tokio::test)]
    async fn resolve_returns_unknown_for_an_empty_feature_list_without_falling_back() -> Result<(), ResolveError> {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/v1/geocode/reverse")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{ "type": "FeatureCollection", "features": [] }"#)
            .create_async()
            .await;
        let rate_limiter = rate_limiter(3000);
        let fallback = fallback();

        let country = geoapify(server.url(), true, rate_limiter.clone(), fallback.clone())
            .resolve(Coordinate::new(0.0, 0.0))
            .await?;

        assert_eq!(country, Country::Unknown);
        assert_eq!(rate_limiter.daily_count(), 0);
        assert!(fallback.calls().is_empty());
        Ok(())
    }

    #[test(tokio::test)]
    async fn resolve_returns_unknown_for_a_missing_country_code() -> Result<(), ResolveError> {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/v1/geocode/reverse")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{ "features": [{ "properties": { "name": "Atlantic Ocean" } }] }"#)
            .create_async()
            .await;
        let fallback = fallback();

        let country = geoapify(server.url(), true, rate_limiter(3000), fallback.clone()).resolve(paris()).await?;

        assert_eq!(country, Country::Unknown);
        assert!(fallback.calls().is_empty());
        Ok(())
    }

    #[test(tokio::test)]
    async fn resolve_falls_back_once_on_an_http_error() -> Result<(), ResolveError> {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/v1/geocode/reverse")
            .match_query(Matcher::Any)
            .with_status(401)
            .expect(1)
            .create_async()
            .await;
        let rate_limiter = rate_limiter(3000);
        let fallback = fallback();

        let country = geoapify(server.url(), true, rate_limiter.clone(), fallback.clone()).resolve(paris()).await?;

        mock.assert_async().await;
        assert_eq!(country.to_string(), "XX");
        assert_eq!(fallback.calls(), vec![paris()]);
        assert_eq!(rate_limiter.daily_count(), 0);
        Ok(())
    }

    #[test(tokio::test)]
    async fn resolve_answers_unknown_for_a_malformed_response_without_falling_back() -> Result<(), ResolveError> {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/v1/geocode/reverse")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("{ \"features\": ")
            .create_async()
            .await;
        let rate_limiter = rate_limiter(3000);
        let fallback = fallback();

        let country = geoapify(server.url(), true, rate_limiter.clone(), fallback.clone()).resolve(paris()).await?;

        assert_eq!(country, Country::Unknown);
        assert_eq!(rate_limiter.daily_count(), 0);
        assert!(fallback.calls().is_empty());
        Ok(())
    }

    #[test(tokio::test)]
    async fn resolve_fails_on_a_transport_error_without_falling_back() {
        let fallback = fallback();

        let result = geoapify("http://127.0.0.1:9".to_string(), true, rate_limiter(3000), fallback.clone())
            .resolve(paris())
            .await;

        assert!(matches!(result, Err(ResolveError::Request(_))), "unexpected result: {:?}", result);
        assert!(fallback.calls().is_empty());
    }

    #[test(tokio::test)]
    async fn resolve_delegates_when_disabled() -> Result<(), ResolveError> {
        let mut server = Server::new_async().await;
        let mock = server.mock("GET", Matcher::Any).expect(0).create_async().await;
        let fallback = fallback();

        let resolver = geoapify(server.url(), false, rate_limiter(3000), fallback.clone());
        let country = resolver.resolve(paris()).await?;

        mock.assert_async().await;
        assert!(!resolver.is_available());
        assert_eq!(country.to_string(), "XX");
        assert_eq!(fallback.calls(), vec![paris()]);
        Ok(())
    }

    #[test(tokio::test)]
    async fn exhausted_quota_gives_the_same_answer_as_the_interval_provider() -> Result<(), ResolveError> {
        let mut geoapify_server = Server::new_async().await;
        let geoapify_mock = geoapify_server.mock("GET", Matcher::Any).expect(0).create_async().await;
        let mut nominatim_server = Server::new_async().await;
        let nominatim_mock = nominatim_server
            .mock("GET", "/reverse")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(include_str!("../../tests/resources/nominatim_reverse_response.json"))
            .expect(2)
            .create_async()
            .await;

        let rate_limiter = rate_limiter(1);
        rate_limiter.increment_quota_provider();
        let config = AppConfigBuilder::new().nominatim_url(nominatim_server.url()).build();
        let nominatim = Arc::new(Nominatim::new(new_client(&config).unwrap(), config.nominatim(), rate_limiter.clone()));
        let resolver = geoapify(geoapify_server.url(), true, rate_limiter.clone(), nominatim.clone());

        assert!(!resolver.is_available());
        let via_geoapify = resolver.resolve(paris()).await?;
        let direct = nominatim.resolve(paris()).await?;

        geoapify_mock.assert_async().await;
        nominatim_mock.assert_async().await;
        assert_eq!(via_geoapify, direct);
        assert_eq!(rate_limiter.daily_count(), 1);
        Ok(())
    }
}
