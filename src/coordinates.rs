use crate::domain::Coordinate;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::{info, instrument};

/// Reads the batch to resolve, a JSON array of `{ "latitude": .., "longitude": .. }` objects.
#[instrument(skip_all, fields(path = %path.display()))]
pub async fn load_coordinates(path: &Path) -> Result<Vec<Coordinate>, CoordinatesError> {
    info!("📁 Loading coordinates...");
    let content = fs::read_to_string(path).await.map_err(|e| CoordinatesError::Io {
        source: e,
        path: path.to_path_buf(),
    })?;

    let coordinates: Vec<Coordinate> = serde_json::from_str(&content).map_err(|e| CoordinatesError::Parse {
        source: e,
        path: path.to_path_buf(),
    })?;

    info!("📁 Loading coordinates... OK, {} loaded", coordinates.len());
    Ok(coordinates)
}

#[derive(Error, Debug)]
pub enum CoordinatesError {
    #[error("unable to read '{}': {source}", .path.display())]
    Io { source: io::Error, path: PathBuf },
    #[error("unable to parse '{}': {source}", .path.display())]
    Parse { source: serde_json::Error, path: PathBuf },
}
