//! Histograms and their persistent storage.

pub mod histogram;
pub mod store;

pub use histogram::{Hist1D, Hist2D, Histogram, HistogramError};
pub use store::{HistogramStore, JsonFileStore, StorageError};

#[cfg(test)]
pub use store::{MemoryStore, StoredRun};
