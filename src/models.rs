//! Data models for the hit aggregation pipeline.
//!
//! This module contains the hit records delivered by the simulation,
//! the run metadata persisted alongside the histograms, and the summary
//! produced when a run is finalized.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// PDG code of the proton.
pub const PDG_PROTON: i32 = 2212;

/// Energy unit used when filling an energy histogram.
///
/// Hit records always carry energies in MeV; the unit only changes the
/// value that ends up on the histogram axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EnergyUnit {
    #[serde(rename = "eV")]
    EV,
    #[serde(rename = "keV")]
    KeV,
    MeV,
    GeV,
    TeV,
}

impl fmt::Display for EnergyUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnergyUnit::EV => write!(f, "eV"),
            EnergyUnit::KeV => write!(f, "keV"),
            EnergyUnit::MeV => write!(f, "MeV"),
            EnergyUnit::GeV => write!(f, "GeV"),
            EnergyUnit::TeV => write!(f, "TeV"),
        }
    }
}

impl EnergyUnit {
    /// Size of one unit expressed in MeV.
    pub fn in_mev(&self) -> f64 {
        match self {
            EnergyUnit::EV => 1e-6,
            EnergyUnit::KeV => 1e-3,
            EnergyUnit::MeV => 1.0,
            EnergyUnit::GeV => 1e3,
            EnergyUnit::TeV => 1e6,
        }
    }

    /// Convert an energy given in MeV into this unit.
    pub fn from_mev(&self, energy_mev: f64) -> f64 {
        energy_mev / self.in_mev()
    }
}

/// Energy deposited in the target by one step of one track.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnergyDepositRecord {
    /// Total deposited energy [MeV].
    pub edep: f64,
    /// Non-ionizing part of the deposit [MeV].
    #[serde(default)]
    pub edep_niel: f64,
}

impl EnergyDepositRecord {
    /// Ionizing part of the deposit [MeV].
    pub fn edep_ionizing(&self) -> f64 {
        self.edep - self.edep_niel
    }
}

/// A particle crossing the tracker plane.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerHitRecord {
    /// Kinetic energy of the track [MeV].
    pub energy: f64,
    /// PDG code of the particle species.
    pub pdg: i32,
    /// Human readable species name, e.g. "proton" or "e-".
    pub type_name: String,
    /// Crossing position on the tracker plane, (x, y) [mm].
    pub position: (f64, f64),
    /// Angle between the track and the beam axis [rad], if recorded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub angle: Option<f64>,
}

/// Number of tracker hits seen for one particle species.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeciesCount {
    /// PDG code.
    pub pdg: i32,
    /// Name reported the first time this species was seen.
    pub name: String,
    /// Number of tracker hits.
    pub count: u64,
}

impl SpeciesCount {
    /// Share of `total` in percent, truncated to a whole number.
    pub fn percent_of(&self, total: u64) -> usize {
        if total == 0 {
            return 0;
        }
        ((self.count as f64 / total as f64) * 100.0) as usize
    }
}

/// Mean and spread of the hit position along one axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisStatistics {
    /// Mean position [mm].
    pub mean: f64,
    /// Sample variance [mm^2]; `None` with fewer than two samples.
    pub variance: Option<f64>,
}

impl AxisStatistics {
    /// Sample standard deviation [mm], when the variance is defined.
    pub fn std_dev(&self) -> Option<f64> {
        self.variance.map(|v| v.max(0.0).sqrt())
    }
}

/// Geometry and beam configuration the hits were simulated with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeometryParameters {
    /// Target thickness [mm].
    pub target_thickness: f64,
    /// Target material name.
    pub target_material: String,
    /// Detector distance from the target [mm].
    pub detector_distance: f64,
    /// Detector rotation around the y axis [deg]; `None` when not rotated.
    pub detector_angle: Option<f64>,
    /// Beam kinetic energy [MeV].
    pub beam_energy: f64,
    /// Beam particle type.
    pub beam_type: String,
    /// Beam offset along x [mm].
    pub beam_offset: f64,
    /// Physics list name.
    pub physics_list: String,
}

impl Default for GeometryParameters {
    fn default() -> Self {
        Self {
            target_thickness: 1.0,
            target_material: "G4_Cu".to_string(),
            detector_distance: 50.0,
            detector_angle: None,
            beam_energy: 200.0,
            beam_type: "proton".to_string(),
            beam_offset: 0.0,
            physics_list: "QGSP_FTFP_BERT".to_string(),
        }
    }
}

/// Metadata stored next to the histograms of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMetadata {
    /// Output name the run was configured with.
    pub output_name: String,
    /// Time the run was initialized.
    pub started_at: DateTime<Utc>,
    /// Version of this tool.
    pub tool_version: String,
    /// Simulation configuration.
    pub geometry: GeometryParameters,
    /// Maximum number of events requested (0 means all).
    pub event_limit: u64,
}

/// Everything a finalized run reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    /// Metadata of the run.
    pub metadata: RunMetadata,
    /// File the histograms were written to.
    pub output_path: PathBuf,
    /// Number of events aggregated.
    pub events: u64,
    /// Tracker hits per species, in first-seen order.
    pub species: Vec<SpeciesCount>,
    /// Total number of tracker hits.
    pub total_hits: u64,
    /// Hit position statistics along x; `None` without hits.
    pub x: Option<AxisStatistics>,
    /// Hit position statistics along y; `None` without hits.
    pub y: Option<AxisStatistics>,
    /// Duration of the run in seconds.
    pub duration_seconds: f64,
}
