//! Persistent histogram storage.
//!
//! A store is opened once per run in replace mode, receives every
//! histogram exactly once at finalize and is closed afterwards.

use super::histogram::Histogram;
use crate::models::RunMetadata;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Errors raised while persisting histograms.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to open output file {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write output file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize histograms: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("histogram '{0}' was already written")]
    Duplicate(String),
}

/// Destination for the histograms of one run.
pub trait HistogramStore: Sized {
    /// Open `path`, replacing any existing file.
    fn open(path: &Path, metadata: &RunMetadata) -> Result<Self, StorageError>;

    /// Persist one histogram. The histogram is consumed.
    fn write(&mut self, histogram: Histogram) -> Result<(), StorageError>;

    /// Flush and release the store, returning where the data went.
    fn close(self) -> Result<PathBuf, StorageError>;
}

/// On-disk layout of a run file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredRun {
    pub metadata: RunMetadata,
    pub histograms: Vec<Histogram>,
}

impl StoredRun {
    /// Load a run file written by [`JsonFileStore`].
    #[allow(dead_code)] // Reader side for downstream tooling
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        use anyhow::Context;

        let file = File::open(path)
            .with_context(|| format!("Failed to open run file: {}", path.display()))?;
        serde_json::from_reader(std::io::BufReader::new(file))
            .with_context(|| format!("Failed to parse run file: {}", path.display()))
    }

    /// Find a histogram by name.
    pub fn get(&self, name: &str) -> Option<&Histogram> {
        self.histograms.iter().find(|h| h.name() == name)
    }
}

/// Writes all histograms of a run as a single JSON document.
pub struct JsonFileStore {
    path: PathBuf,
    writer: BufWriter<File>,
    run: StoredRun,
}

impl HistogramStore for JsonFileStore {
    fn open(path: &Path, metadata: &RunMetadata) -> Result<Self, StorageError> {
        // File::create truncates, so a previous run with the same name is replaced.
        let file = File::create(path).map_err(|source| StorageError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        debug!("Opened output file {}", path.display());

        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
            run: StoredRun {
                metadata: metadata.clone(),
                histograms: Vec::new(),
            },
        })
    }

    fn write(&mut self, histogram: Histogram) -> Result<(), StorageError> {
        if self.run.get(histogram.name()).is_some() {
            return Err(StorageError::Duplicate(histogram.name().to_string()));
        }

        debug!(
            "Writing histogram '{}' ({} entries)",
            histogram.name(),
            histogram.entries()
        );
        self.run.histograms.push(histogram);
        Ok(())
    }

    fn close(mut self) -> Result<PathBuf, StorageError> {
        serde_json::to_writer(&mut self.writer, &self.run)?;
        self.writer
            .flush()
            .map_err(|source| StorageError::Write {
                path: self.path.clone(),
                source,
            })?;

        Ok(self.path)
    }
}

/// Keeps written histograms in memory.
#[cfg(test)]
#[derive(Debug)]
pub struct MemoryStore {
    pub path: PathBuf,
    pub histograms: Vec<Histogram>,
}

#[cfg(test)]
impl HistogramStore for MemoryStore {
    fn open(path: &Path, _metadata: &RunMetadata) -> Result<Self, StorageError> {
        Ok(Self {
            path: path.to_path_buf(),
            histograms: Vec::new(),
        })
    }

    fn write(&mut self, histogram: Histogram) -> Result<(), StorageError> {
        self.histograms.push(histogram);
        Ok(())
    }

    fn close(self) -> Result<PathBuf, StorageError> {
        Ok(self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::GeometryParameters;
    use crate::storage::histogram::Hist1D;
    use chrono::Utc;
    use tempfile::TempDir;

    fn metadata() -> RunMetadata {
        RunMetadata {
            output_name: "test".to_string(),
            started_at: Utc::now(),
            tool_version: "0.0.0".to_string(),
            geometry: GeometryParameters::default(),
            event_limit: 0,
        }
    }

    #[test]
    fn test_write_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("run.json");

        let mut store = JsonFileStore::open(&path, &metadata()).unwrap();
        let mut h = Hist1D::new("energy", "energy", "E [MeV]", 10, 0.0, 10.0).unwrap();
        h.fill(2.5);
        store.write(h.into()).unwrap();
        let written = store.close().unwrap();

        assert_eq!(written, path);
        let run = StoredRun::load(&path).unwrap();
        assert_eq!(run.metadata.output_name, "test");
        assert_eq!(run.get("energy").map(|h| h.entries()), Some(1));
    }

    #[test]
    fn test_open_replaces_existing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("run.json");
        std::fs::write(&path, "stale content that is not json").unwrap();

        let store = JsonFileStore::open(&path, &metadata()).unwrap();
        store.close().unwrap();

        let run = StoredRun::load(&path).unwrap();
        assert!(run.histograms.is_empty());
    }

    #[test]
    fn test_duplicate_histogram_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("run.json");

        let mut store = JsonFileStore::open(&path, &metadata()).unwrap();
        let h = Hist1D::new("dup", "dup", "x", 1, 0.0, 1.0).unwrap();
        store.write(h.clone().into()).unwrap();

        assert!(matches!(
            store.write(h.into()),
            Err(StorageError::Duplicate(name)) if name == "dup"
        ));
    }

    #[test]
    fn test_open_in_missing_directory_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing").join("run.json");

        assert!(matches!(
            JsonFileStore::open(&path, &metadata()),
            Err(StorageError::Open { .. })
        ));
    }
}
