use crate::domain::{Coordinate, Country};
use async_trait::async_trait;
use reqwest::StatusCode;
use std::fmt::Debug;
use thiserror::Error;

/// A reverse geocoding provider.
///
/// `Ok(Country::Unknown)` means the provider gave no usable country code: an empty answer, an HTTP error or a malformed
/// body. An `Err` is left for transient failures (rate limits, transport errors) that outlived their retries. Callers
/// treat both as unknown, but only the former is worth remembering.
#[async_trait]
pub trait Resolver: Debug + Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether new work may be routed to this provider right now.
    fn is_available(&self) -> bool;

    async fn resolve(&self, coordinate: Coordinate) -> Result<Country, ResolveError>;
}

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),
    #[error("{0} rate limit hit")]
    RateLimited(&'static str),
    #[error("{provider} answered with HTTP {status}")]
    HttpStatus { provider: &'static str, status: StatusCode },
    #[error("malformed response: {0}")]
    MalformedResponse(#[from] serde_json::Error),
}

impl ResolveError {
    /// Overload and transport failures are worth another attempt, anything the provider actually said is not.
    pub fn is_transient(&self) -> bool {
        match self {
            ResolveError::Request(e) => !e.is_decode() && !e.is_builder(),
            ResolveError::RateLimited(_) => true,
            ResolveError::HttpStatus { .. } | ResolveError::MalformedResponse(_) => false,
        }
    }
}

#[cfg(test)]
pub use stub::StubResolver;
