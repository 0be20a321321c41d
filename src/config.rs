//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.miniscatter.toml` files.

use crate::models::EnergyUnit;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default configuration file name.
pub const CONFIG_FILE_NAME: &str = ".miniscatter.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Output file settings.
    #[serde(default)]
    pub output: OutputConfig,

    /// Histogram binning and units.
    #[serde(default)]
    pub histograms: HistogramConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,

    /// Show a progress indicator while events are aggregated.
    #[serde(default = "default_true")]
    pub progress: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            verbose: false,
            progress: true,
        }
    }
}

fn default_true() -> bool {
    true
}

/// How the output file name is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum NamingScheme {
    /// `<directory>/<filename>.json`
    #[default]
    Output,
    /// `<directory>/histo_<thickness>mm_<physics list>.json`
    Geometry,
}

/// Output file settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory all run files are written to.
    #[serde(default = "default_directory")]
    pub directory: String,

    /// Output name of the run.
    #[serde(default = "default_filename")]
    pub filename: String,

    /// File name scheme.
    #[serde(default)]
    pub naming: NamingScheme,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_directory(),
            filename: default_filename(),
            naming: NamingScheme::default(),
        }
    }
}

fn default_directory() -> String {
    "plots".to_string()
}

fn default_filename() -> String {
    "output".to_string()
}

/// Histogram preset selectable from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum LayoutPreset {
    /// Tracker position histogram, NIEL in keV, deposits up to 6 MeV
    #[default]
    Writer,
    /// Angle and proton histograms, NIEL in MeV, deposits up to 3 MeV
    Legacy,
}

/// Optional histograms filled on top of the standard set.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum DerivedHistogram {
    /// Angle of every particle reaching the tracker
    Angle,
    /// Angle of protons reaching the tracker
    ProtonAngle,
    /// Energy of protons reaching the tracker
    ProtonEnergy,
}

/// Binning of an energy histogram starting at zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnergyAxisConfig {
    pub bins: usize,
    /// Upper edge, in `unit`.
    pub max: f64,
    pub unit: EnergyUnit,
}

impl EnergyAxisConfig {
    pub fn new(bins: usize, max: f64, unit: EnergyUnit) -> Self {
        Self { bins, max, unit }
    }
}

/// Histogram binning and units.
///
/// Plain values come before the per-histogram energy tables so the
/// struct serializes to valid TOML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramConfig {
    /// Largest particle count per event with its own bin.
    #[serde(default = "default_max_particles")]
    pub max_particles: usize,

    /// Bins per axis of the hit position histogram.
    #[serde(default = "default_position_bins")]
    pub position_bins: usize,

    /// Detector width along x [mm].
    #[serde(default = "default_detector_size")]
    pub detector_size_x: f64,

    /// Detector height along y [mm].
    #[serde(default = "default_detector_size")]
    pub detector_size_y: f64,

    /// Bins of the angle histograms.
    #[serde(default = "default_angle_bins")]
    pub angle_bins: usize,

    /// Upper edge of the angle histograms [rad].
    #[serde(default = "default_angle_max")]
    pub angle_max: f64,

    /// Optional histograms to fill.
    #[serde(default)]
    pub derived: Vec<DerivedHistogram>,

    /// Total energy deposit per event.
    #[serde(default = "default_edep_axis")]
    pub edep: EnergyAxisConfig,

    /// Non-ionizing energy deposit per event.
    #[serde(default = "default_niel_axis")]
    pub edep_niel: EnergyAxisConfig,

    /// Ionizing energy deposit per event.
    #[serde(default = "default_edep_axis")]
    pub edep_ionizing: EnergyAxisConfig,

    /// Energy of particles reaching the tracker.
    #[serde(default = "default_tracker_energy_axis")]
    pub tracker_energy: EnergyAxisConfig,
}

impl Default for HistogramConfig {
    fn default() -> Self {
        Self {
            edep: default_edep_axis(),
            edep_niel: default_niel_axis(),
            edep_ionizing: default_edep_axis(),
            max_particles: default_max_particles(),
            tracker_energy: default_tracker_energy_axis(),
            position_bins: default_position_bins(),
            detector_size_x: default_detector_size(),
            detector_size_y: default_detector_size(),
            angle_bins: default_angle_bins(),
            angle_max: default_angle_max(),
            derived: Vec::new(),
        }
    }
}

fn default_edep_axis() -> EnergyAxisConfig {
    EnergyAxisConfig::new(1000, 6.0, EnergyUnit::MeV)
}

fn default_niel_axis() -> EnergyAxisConfig {
    EnergyAxisConfig::new(1000, 1.0, EnergyUnit::KeV)
}

fn default_max_particles() -> usize {
    1000
}

fn default_tracker_energy_axis() -> EnergyAxisConfig {
    EnergyAxisConfig::new(10000, 10.0, EnergyUnit::TeV)
}

fn default_position_bins() -> usize {
    1000
}

fn default_detector_size() -> f64 {
    500.0
}

fn default_angle_bins() -> usize {
    1000
}

fn default_angle_max() -> f64 {
    std::f64::consts::PI / 3.0
}

impl HistogramConfig {
    /// Histogram set for a preset.
    pub fn preset(preset: LayoutPreset) -> Self {
        match preset {
            LayoutPreset::Writer => Self::default(),
            LayoutPreset::Legacy => Self {
                edep: EnergyAxisConfig::new(1000, 3.0, EnergyUnit::MeV),
                edep_niel: EnergyAxisConfig::new(1000, 1.0, EnergyUnit::MeV),
                edep_ionizing: EnergyAxisConfig::new(1000, 3.0, EnergyUnit::MeV),
                derived: vec![
                    DerivedHistogram::Angle,
                    DerivedHistogram::ProtonAngle,
                    DerivedHistogram::ProtonEnergy,
                ],
                ..Self::default()
            },
        }
    }

    /// Whether an optional histogram is enabled.
    pub fn wants(&self, derived: DerivedHistogram) -> bool {
        self.derived.contains(&derived)
    }
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE_NAME);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings.
    /// This method only overrides config when CLI provides explicit values.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref filename) = args.filename {
            self.output.filename = filename.clone();
        }
        if let Some(ref dir) = args.output_dir {
            self.output.directory = dir.display().to_string();
        }
        if let Some(naming) = args.naming {
            self.output.naming = naming;
        }

        // A preset replaces the whole histogram section
        if let Some(layout) = args.layout {
            self.histograms = HistogramConfig::preset(layout);
        }
        if let Some(ref derived) = args.derived {
            self.histograms.derived = derived.clone();
        }

        if args.verbose {
            self.general.verbose = true;
        }
        if args.quiet || args.no_progress {
            self.general.progress = false;
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.output.directory, "plots");
        assert_eq!(config.output.filename, "output");
        assert_eq!(config.output.naming, NamingScheme::Output);
        assert_eq!(config.histograms.edep.max, 6.0);
        assert_eq!(config.histograms.edep_niel.unit, EnergyUnit::KeV);
        assert!(config.histograms.derived.is_empty());
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[general]
verbose = true

[output]
directory = "results"
naming = "geometry"

[histograms]
max_particles = 50
detector_size_x = 100.0
derived = ["angle", "proton-energy"]

[histograms.edep_niel]
bins = 200
max = 2.0
unit = "MeV"
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert!(config.general.verbose);
        assert!(config.general.progress);
        assert_eq!(config.output.directory, "results");
        assert_eq!(config.output.filename, "output");
        assert_eq!(config.output.naming, NamingScheme::Geometry);
        assert_eq!(config.histograms.max_particles, 50);
        assert_eq!(config.histograms.detector_size_x, 100.0);
        assert_eq!(config.histograms.detector_size_y, 500.0);
        assert_eq!(config.histograms.edep_niel.bins, 200);
        assert_eq!(config.histograms.edep_niel.unit, EnergyUnit::MeV);
        assert!(config.histograms.wants(DerivedHistogram::Angle));
        assert!(!config.histograms.wants(DerivedHistogram::ProtonAngle));
    }

    #[test]
    fn test_legacy_preset() {
        let legacy = HistogramConfig::preset(LayoutPreset::Legacy);
        assert_eq!(legacy.edep.max, 3.0);
        assert_eq!(legacy.edep_niel.unit, EnergyUnit::MeV);
        assert_eq!(legacy.derived.len(), 3);
        assert_eq!(legacy.tracker_energy, default_tracker_energy_axis());

        let writer = HistogramConfig::preset(LayoutPreset::Writer);
        assert_eq!(writer, HistogramConfig::default());
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(!toml_str.is_empty());
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[output]"));
        assert!(toml_str.contains("[histograms"));

        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.histograms, HistogramConfig::default());
    }
}
