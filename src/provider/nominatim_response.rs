use serde::Deserialize;

/// Body of `GET /reverse?format=json`. Locations without an address (open sea) only carry `error`.
#[allow(dead_code)]
#[derive(Debug, Deserialize)]
pub struct ReverseResponse {
    pub display_name: Option<String>,
    pub address: Option<Address>,
    pub error: Option<String>,
}

#[allow(dead_code)]
#[derive(Debug, Deserialize)]
pub struct Address {
    pub country: Option<String>,
    pub country_code: Option<String>,
}
