use serde::Deserialize;

/// GeoJSON body of `GET /v1/geocode/reverse`, ordered by distance to the queried point.
#[derive(Debug, Deserialize)]
pub struct FeatureCollection {
    #[serde(default)]
    pub features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
pub struct Feature {
    #[serde(default)]
    pub properties: Properties,
}

#[allow(dead_code)]
#[derive(Debug, Default, Deserialize)]
pub struct Properties {
    pub country: Option<String>,
    pub country_code: Option<String>,
    pub formatted: Option<String>,
}
