//! Durable Hologram Storage
//!
//! Holograms must survive server reloads: the registry's persistent fields
//! (id, position, lines) round-trip through a [`HologramStore`]. The engine
//! loads all records at startup and saves the registry snapshot at shutdown;
//! viewer state is never persisted, it is rebuilt by reconciliation.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::hologram::{HologramId, Position};

/// The persistent fields of one hologram.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HologramRecord {
    /// Stable hologram id.
    pub id: HologramId,
    /// Base position of the top line.
    pub position: Position,
    /// Text lines in display order.
    pub lines: Vec<String>,
}

/// Errors raised by hologram storage.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Failed to read the backing file.
    #[error("failed to read hologram store at {path}: {source}")]
    Read {
        /// The path that was attempted.
        path: PathBuf,
        /// The underlying IO error.
        source: std::io::Error,
    },

    /// Failed to write the backing file.
    #[error("failed to write hologram store at {path}: {source}")]
    Write {
        /// The path that was attempted.
        path: PathBuf,
        /// The underlying IO error.
        source: std::io::Error,
    },

    /// The stored payload did not parse.
    #[error("malformed hologram store: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Durable storage for hologram definitions.
#[async_trait]
pub trait HologramStore: Send + Sync {
    /// Load every stored record, in stored order.
    async fn load_all(&self) -> Result<Vec<HologramRecord>, StoreError>;

    /// Replace the stored records with `records`.
    async fn save_all(&self, records: &[HologramRecord]) -> Result<(), StoreError>;
}

/// JSON-file-backed hologram store.
///
/// Writes go to a sibling temp file first and are renamed into place, so a
/// crash mid-save never truncates the previous snapshot. A missing file
/// loads as an empty set.
#[derive(Clone, Debug)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// Create a store backed by the given file path.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The backing file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl HologramStore for JsonFileStore {
    async fn load_all(&self) -> Result<Vec<HologramRecord>, StoreError> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %self.path.display(), "No hologram store yet, starting empty");
                return Ok(Vec::new());
            }
            Err(err) => {
                return Err(StoreError::Read {
                    path: self.path.clone(),
                    source: err,
                })
            }
        };

        let records: Vec<HologramRecord> = serde_json::from_str(&raw)?;
        tracing::info!(
            path = %self.path.display(),
            holograms = records.len(),
            "Loaded hologram store"
        );
        Ok(records)
    }

    async fn save_all(&self, records: &[HologramRecord]) -> Result<(), StoreError> {
        let payload = serde_json::to_string_pretty(records)?;
        let tmp = self.path.with_extension("tmp");

        tokio::fs::write(&tmp, payload)
            .await
            .map_err(|source| StoreError::Write {
                path: tmp.clone(),
                source,
            })?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|source| StoreError::Write {
                path: self.path.clone(),
                source,
            })?;

        tracing::info!(
            path = %self.path.display(),
            holograms = records.len(),
            "Saved hologram store"
        );
        Ok(())
    }
}
