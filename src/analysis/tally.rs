//! Running tracker statistics.
//!
//! Hit positions are folded into running sums so the mean and spread can
//! be derived at the end of the run without keeping individual samples.

use crate::models::{AxisStatistics, SpeciesCount, TrackerHitRecord};
use std::collections::HashMap;

/// Running Σv and Σv² along one axis.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Moments {
    pub sum: f64,
    pub sum_sq: f64,
}

impl Moments {
    fn add(&mut self, value: f64) {
        self.sum += value;
        self.sum_sq += value * value;
    }

    /// Mean for `n >= 1`, sample variance for `n >= 2`.
    pub fn statistics(&self, n: u64) -> Option<AxisStatistics> {
        if n == 0 {
            return None;
        }

        let n = n as f64;
        let mean = self.sum / n;
        let variance = (n >= 2.0).then(|| (self.sum_sq - self.sum * self.sum / n) / (n - 1.0));

        Some(AxisStatistics { mean, variance })
    }
}

/// Per-species hit counts and position sums of a run.
#[derive(Debug, Clone, Default)]
pub struct RunningAccumulator {
    species: Vec<SpeciesCount>,
    index: HashMap<i32, usize>,
    x: Moments,
    y: Moments,
    total: u64,
}

impl RunningAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one tracker hit.
    pub fn record(&mut self, hit: &TrackerHitRecord) {
        let slot = match self.index.get(&hit.pdg) {
            Some(&slot) => slot,
            None => {
                self.species.push(SpeciesCount {
                    pdg: hit.pdg,
                    name: hit.type_name.clone(),
                    count: 0,
                });
                self.index.insert(hit.pdg, self.species.len() - 1);
                self.species.len() - 1
            }
        };
        self.species[slot].count += 1;

        let (x, y) = hit.position;
        self.x.add(x);
        self.y.add(y);
        self.total += 1;
    }

    /// Total number of tracker hits.
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Species in the order they were first seen.
    pub fn species(&self) -> &[SpeciesCount] {
        &self.species
    }

    /// Hits recorded for one species.
    #[cfg(test)]
    pub fn count(&self, pdg: i32) -> Option<u64> {
        self.index.get(&pdg).map(|&slot| self.species[slot].count)
    }

    pub fn x_moments(&self) -> Moments {
        self.x
    }

    pub fn y_moments(&self) -> Moments {
        self.y
    }

    pub fn x_statistics(&self) -> Option<AxisStatistics> {
        self.x.statistics(self.total)
    }

    pub fn y_statistics(&self) -> Option<AxisStatistics> {
        self.y.statistics(self.total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(pdg: i32, name: &str, x: f64, y: f64) -> TrackerHitRecord {
        TrackerHitRecord {
            energy: 1.0,
            pdg,
            type_name: name.to_string(),
            position: (x, y),
            angle: None,
        }
    }

    #[test]
    fn test_species_first_seen_order() {
        let mut acc = RunningAccumulator::new();
        acc.record(&hit(11, "e-", 0.0, 0.0));
        acc.record(&hit(2212, "proton", 0.0, 0.0));
        acc.record(&hit(11, "electron", 0.0, 0.0));
        acc.record(&hit(22, "gamma", 0.0, 0.0));

        let order: Vec<i32> = acc.species().iter().map(|s| s.pdg).collect();
        assert_eq!(order, vec![11, 2212, 22]);
        assert_eq!(acc.count(11), Some(2));
        assert_eq!(acc.count(13), None);
        // Name from the first sighting is kept
        assert_eq!(acc.species()[0].name, "e-");
    }

    #[test]
    fn test_total_matches_species_sum() {
        let mut acc = RunningAccumulator::new();
        for i in 0..25 {
            let pdg = [11, -11, 22, 2112, 2212][i % 5];
            acc.record(&hit(pdg, "p", i as f64, 0.0));
        }

        let sum: u64 = acc.species().iter().map(|s| s.count).sum();
        assert_eq!(sum, acc.total());
        assert_eq!(acc.total(), 25);
    }

    #[test]
    fn test_statistics() {
        let mut acc = RunningAccumulator::new();
        acc.record(&hit(11, "e-", 1.0, 2.0));
        acc.record(&hit(11, "e-", 3.0, 2.0));
        acc.record(&hit(11, "e-", 5.0, 2.0));

        let x = acc.x_statistics().unwrap();
        assert!((x.mean - 3.0).abs() < 1e-12);
        assert!((x.variance.unwrap() - 4.0).abs() < 1e-12);

        let y = acc.y_statistics().unwrap();
        assert!((y.mean - 2.0).abs() < 1e-12);
        assert!(y.variance.unwrap().abs() < 1e-12);
    }

    #[test]
    fn test_statistics_guard_small_samples() {
        let mut acc = RunningAccumulator::new();
        assert!(acc.x_statistics().is_none());

        acc.record(&hit(11, "e-", 1.5, -0.5));
        let x = acc.x_statistics().unwrap();
        assert_eq!(x.mean, 1.5);
        assert!(x.variance.is_none());
    }
}
