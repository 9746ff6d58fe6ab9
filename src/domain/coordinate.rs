use ordered_float::OrderedFloat;
use std::fmt::{Display, Formatter};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Coordinate {
    latitude: OrderedFloat<f64>,
    longitude: OrderedFloat<f64>,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Coordinate {
            latitude: OrderedFloat(latitude),
            longitude: OrderedFloat(longitude),
        }
    }

    pub fn latitude(&self) -> f64 {
        self.latitude.into_inner()
    }

    pub fn longitude(&self) -> f64 {
        self.longitude.into_inner()
    }

    /// Both components rounded to 6 decimals (~0.11 m), so nearby lookups share a key.
    pub fn cache_key(&self) -> String {
        format!("{:.6}_{:.6}", self.latitude(), self.longitude())
    }
}

impl Display for Coordinate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Lat: {:.6}, Lon: {:.6}", self.latitude(), self.longitude())
    }
}
