mod coordinate;
mod country;

pub use coordinate::Coordinate;
pub use country::{Country, CountryCode};
