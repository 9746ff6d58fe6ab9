use config::{Config, ConfigError};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    core: Core,
    files: Files,
    nominatim: Nominatim,
    geoapify: Geoapify,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(config::File::with_name("config").required(true))
            .add_source(config::File::with_name("config_local").required(false))
            .add_source(config::Environment::with_prefix("GEOCOUNTRY").separator("__"))
            .build()?
            .try_deserialize()
    }

    pub fn core(&self) -> &Core {
        &self.core
    }

    pub fn files(&self) -> &Files {
        &self.files
    }

    pub fn nominatim(&self) -> &Nominatim {
        &self.nominatim
    }

    pub fn geoapify(&self) -> &Geoapify {
        &self.geoapify
    }
}

#[derive(Debug, Deserialize)]
pub struct Core {
    lane_buffer_size: usize,
}

impl Core {
    pub fn lane_buffer_size(&self) -> usize {
        self.lane_buffer_size
    }
}

#[derive(Debug, Deserialize)]
pub struct Files {
    cache: PathBuf,
    rate_limits: PathBuf,
    coordinates: PathBuf,
}

impl Files {
    pub fn cache(&self) -> &Path {
        &self.cache
    }

    pub fn rate_limits(&self) -> &Path {
        &self.rate_limits
    }

    pub fn coordinates(&self) -> &Path {
        &self.coordinates
    }
}

#[derive(Debug, Deserialize)]
pub struct Nominatim {
    url: String,
    user_agent: String,
    #[serde(with = "humantime_serde")]
    interval: Duration,
    max_retries: usize,
    #[serde(with = "humantime_serde")]
    timeout: Duration,
}

impl Nominatim {
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// Minimum spacing between the start of two requests.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn max_retries(&self) -> usize {
        self.max_retries
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[derive(Debug, Deserialize)]
pub struct Geoapify {
    enabled: bool,
    url: String,
    api_key: String,
    daily_limit: u32,
}

impl Geoapify {
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn daily_limit(&self) -> u32 {
        self.daily_limit
    }
}

#[cfg(test)]
pub struct AppConfigBuilder {
    config: AppConfig,
}

#[cfg(test)]
impl AppConfigBuilder {
    pub fn new() -> Self {
        AppConfigBuilder {
            config: AppConfig {
                core: Core { lane_buffer_size: 8 },
                files: Files {
                    cache: PathBuf::from("cache.json"),
                    rate_limits: PathBuf::from("daily_limits.json"),
                    coordinates: PathBuf::from("coordinates.json"),
                },
                nominatim: Nominatim {
                    url: "https://nominatim.url".to_string(),
                    user_agent: "geocountry-test/1.0".to_string(),
                    interval: Duration::from_millis(10),
                    max_retries: 3,
                    timeout: Duration::from_secs(5),
                },
                geoapify: Geoapify {
                    enabled: true,
                    url: "https://geoapify.url".to_string(),
                    api_key: "key".to_string(),
                    daily_limit: 3000,
                },
            },
        }
    }

    pub fn nominatim_url(mut self, url: String) -> Self {
        self.config.nominatim.url = url;
        self
    }

    pub fn nominatim_user_agent(mut self, user_agent: String) -> Self {
        self.config.nominatim.user_agent = user_agent;
        self
    }

    pub fn nominatim_timeout(mut self, timeout: Duration) -> Self {
        self.config.nominatim.timeout = timeout;
        self
    }

    pub fn geoapify_url(mut self, url: String) -> Self {
        self.config.geoapify.url = url;
        self
    }

    pub fn geoapify_enabled(mut self, enabled: bool) -> Self {
        self.config.geoapify.enabled = enabled;
        self
    }

    pub fn build(self) -> AppConfig {
        self.config
    }
}
