//! Per-event hit aggregation.
//!
//! Each finished event is folded into the run histograms and the running
//! tracker statistics. Energy deposits are summed over the event and fill
//! the deposit histograms once; tracker hits fill their histograms once
//! per hit.

use super::tally::RunningAccumulator;
use crate::config::{DerivedHistogram, EnergyAxisConfig, HistogramConfig};
use crate::hits::{HitSource, EDEP_COLLECTION, TRACKER_COLLECTION};
use crate::models::{EnergyUnit, PDG_PROTON};
use crate::storage::{Hist1D, Hist2D, Histogram, HistogramError};
use tracing::warn;

fn energy_histogram(
    name: &str,
    x_title: &str,
    axis: &EnergyAxisConfig,
) -> Result<Hist1D, HistogramError> {
    Hist1D::new(
        name,
        name,
        &format!("{} [{}]", x_title, axis.unit),
        axis.bins,
        0.0,
        axis.max,
    )
}

/// All histograms of a run.
#[derive(Debug, Clone)]
pub struct RunHistograms {
    pub target_edep: Hist1D,
    pub target_edep_niel: Hist1D,
    pub target_edep_ionizing: Hist1D,
    pub num_particles: Hist1D,
    pub tracker_energy: Hist1D,
    pub tracker_hit_pos: Hist2D,
    pub angle: Option<Hist1D>,
    pub proton_angle: Option<Hist1D>,
    pub proton_energy: Option<Hist1D>,
}

impl RunHistograms {
    /// Build empty histograms from the configured layout.
    pub fn new(config: &HistogramConfig) -> Result<Self, HistogramError> {
        let max_particles = config.max_particles as f64;
        let half_x = config.detector_size_x / 2.0;
        let half_y = config.detector_size_y / 2.0;

        let angle_histogram = |name: &str, x_title: &str| {
            Hist1D::new(name, name, x_title, config.angle_bins, 0.0, config.angle_max)
        };

        Ok(Self {
            target_edep: energy_histogram(
                "targetEdep",
                "Total energy deposit/event",
                &config.edep,
            )?,
            target_edep_niel: energy_histogram(
                "targetEdep_NIEL",
                "Total NIEL/event",
                &config.edep_niel,
            )?,
            target_edep_ionizing: energy_histogram(
                "targetEdep_IEL",
                "Total ionizing energy deposit/event",
                &config.edep_ionizing,
            )?,
            num_particles: Hist1D::new(
                "numParticles",
                "numParticles",
                "Number of particles / event",
                config.max_particles + 1,
                -0.5,
                max_particles + 0.5,
            )?,
            tracker_energy: energy_histogram(
                "energy",
                "Energy of particles on the tracker",
                &config.tracker_energy,
            )?,
            tracker_hit_pos: Hist2D::new(
                "trackerHitpos",
                "Tracker Hit position",
                ("x [mm]", config.position_bins, -half_x, half_x),
                ("y [mm]", config.position_bins, -half_y, half_y),
            )?,
            angle: config
                .wants(DerivedHistogram::Angle)
                .then(|| angle_histogram("angle", "Angle of outgoing particles [rad]"))
                .transpose()?,
            proton_angle: config
                .wants(DerivedHistogram::ProtonAngle)
                .then(|| angle_histogram("protonAngle", "Angle of outgoing protons [rad]"))
                .transpose()?,
            proton_energy: config
                .wants(DerivedHistogram::ProtonEnergy)
                .then(|| {
                    energy_histogram(
                        "protonEnergy",
                        "Energy of outgoing protons",
                        &config.tracker_energy,
                    )
                })
                .transpose()?,
        })
    }

    /// All histograms in write order.
    pub fn into_histograms(self) -> Vec<Histogram> {
        let mut histograms: Vec<Histogram> = vec![
            self.target_edep.into(),
            self.target_edep_niel.into(),
            self.target_edep_ionizing.into(),
            self.num_particles.into(),
            self.tracker_energy.into(),
            self.tracker_hit_pos.into(),
        ];

        histograms.extend(
            [self.angle, self.proton_angle, self.proton_energy]
                .into_iter()
                .flatten()
                .map(Histogram::from),
        );

        histograms
    }
}

/// Display units of the energy histograms.
#[derive(Debug, Clone, Copy)]
struct FillUnits {
    edep: EnergyUnit,
    niel: EnergyUnit,
    ionizing: EnergyUnit,
    tracker: EnergyUnit,
}

/// Folds events into histograms and running statistics.
#[derive(Debug, Clone)]
pub struct EventAggregator {
    histograms: RunHistograms,
    accumulator: RunningAccumulator,
    units: FillUnits,
    events: u64,
}

impl EventAggregator {
    /// Create an aggregator with empty histograms and zeroed sums.
    pub fn new(config: &HistogramConfig) -> Result<Self, HistogramError> {
        Ok(Self {
            histograms: RunHistograms::new(config)?,
            accumulator: RunningAccumulator::new(),
            units: FillUnits {
                edep: config.edep.unit,
                niel: config.edep_niel.unit,
                ionizing: config.edep_ionizing.unit,
                tracker: config.tracker_energy.unit,
            },
            events: 0,
        })
    }

    /// Fold one finished event.
    ///
    /// An unavailable collection only skips its own category for this
    /// event; the other category is still aggregated.
    pub fn aggregate<S: HitSource + ?Sized>(&mut self, event: &S) {
        let event_number = self.events;
        self.events += 1;

        match event.energy_deposits() {
            Ok(deposits) => {
                let (edep, niel, ionizing) =
                    deposits.iter().fold((0.0, 0.0, 0.0), |(edep, niel, ionizing), d| {
                        (edep + d.edep, niel + d.edep_niel, ionizing + d.edep_ionizing())
                    });
                let h = &mut self.histograms;
                h.target_edep.fill(self.units.edep.from_mev(edep));
                h.target_edep_niel.fill(self.units.niel.from_mev(niel));
                h.target_edep_ionizing
                    .fill(self.units.ionizing.from_mev(ionizing));
            }
            Err(reason) => warn!(
                "Event {}: {} unavailable ({}), skipping energy deposits",
                event_number, EDEP_COLLECTION, reason
            ),
        }

        match event.tracker_hits() {
            Ok(hits) => {
                let h = &mut self.histograms;
                for hit in hits {
                    h.tracker_energy.fill(self.units.tracker.from_mev(hit.energy));
                    h.tracker_hit_pos.fill(hit.position.0, hit.position.1);

                    if let (Some(angle), Some(histogram)) = (hit.angle, h.angle.as_mut()) {
                        histogram.fill(angle);
                    }
                    if hit.pdg == PDG_PROTON {
                        if let (Some(angle), Some(histogram)) =
                            (hit.angle, h.proton_angle.as_mut())
                        {
                            histogram.fill(angle);
                        }
                        if let Some(histogram) = h.proton_energy.as_mut() {
                            histogram.fill(self.units.tracker.from_mev(hit.energy));
                        }
                    }

                    self.accumulator.record(hit);
                }
                h.num_particles.fill(hits.len() as f64);
            }
            Err(reason) => warn!(
                "Event {}: {} unavailable ({}), skipping tracker hits",
                event_number, TRACKER_COLLECTION, reason
            ),
        }
    }

    /// Number of events aggregated so far.
    pub fn events(&self) -> u64 {
        self.events
    }

    #[cfg(test)]
    pub fn histograms(&self) -> &RunHistograms {
        &self.histograms
    }

    #[cfg(test)]
    pub fn accumulator(&self) -> &RunningAccumulator {
        &self.accumulator
    }

    /// Split into the histograms and the running statistics.
    pub fn into_parts(self) -> (RunHistograms, RunningAccumulator) {
        (self.histograms, self.accumulator)
    }
}
