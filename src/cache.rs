use crate::domain::Country;
use dashmap::DashMap;
use std::collections::{BTreeMap, HashMap};
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

/// Resolved countries by coordinate cache key, backed by a flat JSON file.
#[derive(Debug)]
pub struct Cache {
    entries: DashMap<String, Country>,
    path: Option<PathBuf>,
    flush_lock: Mutex<()>,
}

impl Cache {
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub async fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let entries = DashMap::new();

        info!("🗃️ Loading cache...");
        match read_entries(path).await {
            Ok(Some(raw)) => {
                for (key, value) in raw {
                    match value.parse::<Country>() {
                        Ok(country) => {
                            entries.insert(key, country);
                        }
                        Err(e) => warn!("⚠️ Skipping cache entry '{}': {}", key, e),
                    }
                }
                info!("🗃️ Loading cache... OK, {} entries", entries.len());
            }
            Ok(None) => info!("🗃️ Loading cache... OK, no cache file yet"),
            Err(e) => warn!("⚠️ Loading cache... failed, starting empty: {}", e),
        }

        Cache {
            entries,
            path: Some(path.to_path_buf()),
            flush_lock: Mutex::new(()),
        }
    }

    #[cfg(test)]
    pub fn in_memory() -> Self {
        Cache {
            entries: DashMap::new(),
            path: None,
            flush_lock: Mutex::new(()),
        }
    }

    pub fn get(&self, key: &str) -> Option<Country> {
        self.entries.get(key).map(|entry| *entry.value())
    }

    pub fn put(&self, key: impl Into<String>, value: Country) {
        self.entries.insert(key.into(), value);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Rewrites the whole file. The content goes to a sibling temp file first and is renamed over the target, so readers
    /// never observe a partial write.
    pub async fn flush(&self) -> Result<(), CacheError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let _guard = self.flush_lock.lock().await;
        let snapshot: BTreeMap<String, String> = self.entries.iter().map(|entry| (entry.key().clone(), entry.value().to_string())).collect();
        let content = serde_json::to_string_pretty(&snapshot)?;

        let temp_path = temp_path_for(path);
        fs::write(&temp_path, content).await.map_err(|source| CacheError::Io {
            source,
            path: temp_path.clone(),
        })?;
        fs::rename(&temp_path, path).await.map_err(|source| CacheError::Io {
            source,
            path: path.to_path_buf(),
        })?;

        debug!(entries = snapshot.len(), "🗃️ Flushed cache to '{}'", path.display());
        Ok(())
    }
}

async fn read_entries(path: &Path) -> Result<Option<HashMap<String, String>>, CacheError> {
    match fs::read_to_string(path).await {
        Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(CacheError::Io {
            source,
            path: path.to_path_buf(),
        }),
    }
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut file_name = path.file_name().map(OsString::from).unwrap_or_else(|| OsString::from("cache"));
    file_name.push(".tmp");
    path.with_file_name(file_name)
}

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("{source} ({})", .path.display())]
    Io { source: io::Error, path: PathBuf },
    #[error("malformed cache: {0}")]
    Serialization(#[from] serde_json::Error),
}
