//! Hit collections delivered by the simulation.
//!
//! The transport engine registers one hit collection per sensitive
//! detector. For every finished event the aggregator looks them up by
//! name through [`HitSource`]; a lookup either yields the hits or says
//! why the collection is unavailable.

pub mod reader;

pub use reader::EventReader;

#[cfg(test)]
pub use reader::RecordedEvent;

use crate::models::{EnergyDepositRecord, TrackerHitRecord};
use thiserror::Error;

/// Name of the target energy-deposit collection.
pub const EDEP_COLLECTION: &str = "EdepCollection";

/// Name of the tracker collection.
pub const TRACKER_COLLECTION: &str = "TrackerCollection";

/// Reason a hit collection could not be read for an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CollectionUnavailable {
    /// No sensitive detector registered a collection with that name.
    #[error("collection is not registered")]
    NotRegistered,
    /// The collection id resolved to a negative value.
    #[error("collection id was {0} < 0")]
    NegativeId(i32),
    /// The id is valid but the event carries no handle for it.
    #[error("collection handle was null")]
    NullHandle,
}

/// Per-event access to the hit collections.
pub trait HitSource {
    /// Energy deposits in the target.
    fn energy_deposits(&self) -> Result<&[EnergyDepositRecord], CollectionUnavailable>;

    /// Particles crossing the tracker plane.
    fn tracker_hits(&self) -> Result<&[TrackerHitRecord], CollectionUnavailable>;
}
