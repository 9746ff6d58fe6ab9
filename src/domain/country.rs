use serde::de::Error;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

const UNKNOWN: &str = "Unknown";

/// An ISO 3166-1 alpha-2 style code, two ASCII letters stored uppercase.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CountryCode([u8; 2]);

impl CountryCode {
    pub fn parse(value: &str) -> Option<CountryCode> {
        match value.as_bytes() {
            [a, b] if a.is_ascii_alphabetic() && b.is_ascii_alphabetic() => Some(CountryCode([a.to_ascii_uppercase(), b.to_ascii_uppercase()])),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &str {
        // Both bytes are ASCII letters
        std::str::from_utf8(&self.0).unwrap_or(UNKNOWN)
    }
}

impl Display for CountryCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Country {
    Code(CountryCode),
    #[default]
    Unknown,
}

impl From<CountryCode> for Country {
    fn from(code: CountryCode) -> Self {
        Country::Code(code)
    }
}

impl From<Option<CountryCode>> for Country {
    fn from(code: Option<CountryCode>) -> Self {
        code.map_or(Country::Unknown, Country::Code)
    }
}

impl Display for Country {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Country::Code(code) => code.fmt(f),
            Country::Unknown => f.write_str(UNKNOWN),
        }
    }
}

#[derive(Debug, PartialEq, thiserror::Error)]
#[error("invalid country '{0}', expected a two letter code or 'Unknown'")]
pub struct ParseCountryError(String);

impl FromStr for Country {
    type Err = ParseCountryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == UNKNOWN {
            return Ok(Country::Unknown);
        }
        CountryCode::parse(s).map(Country::Code).ok_or_else(|| ParseCountryError(s.to_string()))
    }
}

impl Serialize for Country {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Country {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        value.parse().map_err(Error::custom)
    }
}
