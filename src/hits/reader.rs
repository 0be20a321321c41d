//! Recorded hit stream.
//!
//! Events are stored as JSON Lines, one finished event per line:
//!
//! ```text
//! {"event_id":0,"collections":{"EdepCollection":{"id":0,"hits":[{"edep":1.1,"edep_niel":0.01}]},
//!  "TrackerCollection":{"id":1,"hits":[{"energy":199.2,"pdg":2212,"type_name":"proton","position":[0.4,-1.3]}]}}}
//! ```
//!
//! A missing collection key means the collection was never registered,
//! a negative `id` mirrors a failed id lookup, and a missing or `null`
//! `hits` array mirrors a null collection handle.

use super::{CollectionUnavailable, HitSource};
use crate::models::{EnergyDepositRecord, TrackerHitRecord};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;
use tracing::debug;

/// One collection as recorded for an event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedCollection<T> {
    /// Collection id assigned by the detector manager.
    pub id: i32,
    /// Hits, or `None` when the event carried no handle.
    pub hits: Option<Vec<T>>,
}

impl<T> RecordedCollection<T> {
    /// A valid collection holding `hits`.
    #[cfg(test)]
    pub fn with_hits(id: i32, hits: Vec<T>) -> Self {
        Self {
            id,
            hits: Some(hits),
        }
    }

    fn lookup(this: Option<&Self>) -> Result<&[T], CollectionUnavailable> {
        let collection = this.ok_or(CollectionUnavailable::NotRegistered)?;
        if collection.id < 0 {
            return Err(CollectionUnavailable::NegativeId(collection.id));
        }
        collection
            .hits
            .as_deref()
            .ok_or(CollectionUnavailable::NullHandle)
    }
}

/// The collections of one event, keyed by their registered names.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordedCollections {
    #[serde(
        rename = "EdepCollection",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub edep: Option<RecordedCollection<EnergyDepositRecord>>,

    #[serde(
        rename = "TrackerCollection",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub tracker: Option<RecordedCollection<TrackerHitRecord>>,
}

/// A finished event read back from the hit stream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordedEvent {
    /// Event number within the run.
    #[serde(default)]
    pub event_id: u64,
    /// Hit collections of this event.
    #[serde(default)]
    pub collections: RecordedCollections,
}

#[cfg(test)]
impl RecordedEvent {
    /// Build an event with both collections present.
    pub fn new(
        event_id: u64,
        edep: Vec<EnergyDepositRecord>,
        tracker: Vec<TrackerHitRecord>,
    ) -> Self {
        Self {
            event_id,
            collections: RecordedCollections {
                edep: Some(RecordedCollection::with_hits(0, edep)),
                tracker: Some(RecordedCollection::with_hits(1, tracker)),
            },
        }
    }
}

impl HitSource for RecordedEvent {
    fn energy_deposits(&self) -> Result<&[EnergyDepositRecord], CollectionUnavailable> {
        RecordedCollection::lookup(self.collections.edep.as_ref())
    }

    fn tracker_hits(&self) -> Result<&[TrackerHitRecord], CollectionUnavailable> {
        RecordedCollection::lookup(self.collections.tracker.as_ref())
    }
}

/// Streaming reader over a JSON Lines hit file.
pub struct EventReader<R> {
    reader: R,
    line_number: usize,
    buffer: String,
}

impl EventReader<BufReader<Box<dyn io::Read>>> {
    /// Open a hit stream; `-` reads from stdin.
    pub fn open(path: &Path) -> Result<Self> {
        let source: Box<dyn io::Read> = if path == Path::new("-") {
            debug!("Reading hits from stdin");
            Box::new(io::stdin())
        } else {
            debug!("Reading hits from {}", path.display());
            let file = File::open(path)
                .with_context(|| format!("Failed to open hit file: {}", path.display()))?;
            Box::new(file)
        };

        Ok(Self::new(BufReader::new(source)))
    }
}

impl<R: BufRead> EventReader<R> {
    /// Wrap a buffered reader.
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line_number: 0,
            buffer: String::new(),
        }
    }
}

impl<R: BufRead> Iterator for EventReader<R> {
    type Item = Result<RecordedEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.buffer.clear();
            self.line_number += 1;

            match self.reader.read_line(&mut self.buffer) {
                Ok(0) => return None,
                Ok(_) => {}
                Err(e) => {
                    return Some(
                        Err(e).with_context(|| format!("Failed to read line {}", self.line_number)),
                    )
                }
            }

            let line = self.buffer.trim();
            if line.is_empty() {
                continue;
            }

            let line_number = self.line_number;
            return Some(
                serde_json::from_str(line)
                    .with_context(|| format!("Malformed event on line {}", line_number)),
            );
        }
    }
}
