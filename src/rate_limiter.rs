use crate::app_config::AppConfig;
use crate::clock::Clock;
use chrono::NaiveDate;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

#[derive(Clone, Copy, Debug)]
pub struct Limits {
    /// Requests allowed per UTC day by the quota-limited provider.
    pub daily_limit: u32,
    /// Minimum spacing between request starts for the interval-throttled provider.
    pub interval: Duration,
}

impl From<&AppConfig> for Limits {
    fn from(config: &AppConfig) -> Self {
        Limits {
            daily_limit: config.geoapify().daily_limit(),
            interval: config.nominatim().interval(),
        }
    }
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersistedState {
    date: NaiveDate,
    #[serde(alias = "geoapifyCount")]
    daily_count: u32,
}

#[derive(Debug)]
struct State {
    date: NaiveDate,
    daily_count: u32,
    last_interval_request_ms: i64,
}

/// Tracks the daily quota of one provider and the request spacing of the other.
///
/// The quota counter survives restarts through a small JSON file, the interval timestamp lives in memory only. Every
/// operation takes the same lock, they are all O(1).
#[derive(Debug)]
pub struct RateLimiter {
    state: Mutex<State>,
    limits: Limits,
    clock: Arc<dyn Clock>,
    path: Option<PathBuf>,
}

impl RateLimiter {
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>, limits: Limits, clock: Arc<dyn Clock>) -> Self {
        let path = path.as_ref();
        let today = clock.today();
        let (date, daily_count) = match read_state(path) {
            Ok(Some(persisted)) => {
                info!("📈 Loaded daily limits, {} request(s) used on {}", persisted.daily_count, persisted.date);
                (persisted.date, persisted.daily_count)
            }
            Ok(None) => {
                debug!("📈 No daily limits found, starting fresh");
                (today, 0)
            }
            Err(e) => {
                warn!("⚠️ Unable to load daily limits: {}", e);
                (today, 0)
            }
        };

        RateLimiter {
            state: Mutex::new(State {
                date,
                daily_count,
                last_interval_request_ms: 0,
            }),
            limits,
            clock,
            path: Some(path.to_path_buf()),
        }
    }

    #[cfg(test)]
    pub fn in_memory(limits: Limits, clock: Arc<dyn Clock>) -> Self {
        RateLimiter {
            state: Mutex::new(State {
                date: clock.today(),
                daily_count: 0,
                last_interval_request_ms: 0,
            }),
            limits,
            clock,
            path: None,
        }
    }

    pub fn now_ms(&self) -> i64 {
        self.clock.now_ms()
    }

    pub fn can_use_quota_provider(&self) -> bool {
        let mut state = self.state.lock();
        self.roll_date(&mut state);
        state.daily_count < self.limits.daily_limit
    }

    pub fn can_use_interval_provider(&self) -> bool {
        let state = self.state.lock();
        self.clock.now_ms() >= state.last_interval_request_ms + self.interval_ms()
    }

    pub fn mark_interval_request(&self, timestamp_ms: i64) {
        self.state.lock().last_interval_request_ms = timestamp_ms;
    }

    pub fn delay_until_next_interval_slot(&self) -> Duration {
        let state = self.state.lock();
        let delay_ms = state.last_interval_request_ms + self.interval_ms() - self.clock.now_ms();
        Duration::from_millis(delay_ms.max(0) as u64)
    }

    pub fn increment_quota_provider(&self) {
        let mut state = self.state.lock();
        self.roll_date(&mut state);
        state.daily_count += 1;
        debug!("📈 Quota provider used {}/{} today", state.daily_count, self.limits.daily_limit);
        self.persist(&state);
    }

    pub fn daily_count(&self) -> u32 {
        let mut state = self.state.lock();
        self.roll_date(&mut state);
        state.daily_count
    }

    fn interval_ms(&self) -> i64 {
        self.limits.interval.as_millis() as i64
    }

    fn roll_date(&self, state: &mut State) {
        let today = self.clock.today();
        if state.date != today {
            info!("📈 New day {}, resetting quota (used {} on {})", today, state.daily_count, state.date);
            state.date = today;
            state.daily_count = 0;
            self.persist(state);
        }
    }

    /// Writes synchronously while the caller holds the state lock, so the file never lags behind a later count. The
    /// file is a few bytes and only quota changes reach it.
    fn persist(&self, state: &State) {
        let Some(path) = &self.path else {
            return;
        };

        let persisted = PersistedState {
            date: state.date,
            daily_count: state.daily_count,
        };
        if let Err(e) = write_state(path, &persisted) {
            warn!("⚠️ Unable to save daily limits to '{}': {}", path.display(), e);
        }
    }
}

fn read_state(path: &Path) -> Result<Option<PersistedState>, PersistError> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn write_state(path: &Path, state: &PersistedState) -> Result<(), PersistError> {
    let content = serde_json::to_string_pretty(state)?;
    fs::write(path, content)?;
    Ok(())
}

#[derive(Error, Debug)]
enum PersistError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("malformed daily limits: {0}")]
    Serialization(#[from] serde_json::Error),
}
