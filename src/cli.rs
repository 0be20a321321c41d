//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::config::{DerivedHistogram, LayoutPreset, NamingScheme};
use crate::models::GeometryParameters;
use clap::Parser;
use std::path::PathBuf;

/// MiniScatter histogram writer
///
/// Reads the hit collections of a MiniScatter run (one JSON event per
/// line), fills the target and tracker histograms and writes them to
/// plots/<filename>.json, then prints the particle species seen at the
/// tracker and the hit position statistics.
///
/// Examples:
///   miniscatter-hist -i hits.jsonl -f run42
///   miniscatter-hist -t 2.5 -p FTFP_BERT --naming geometry < hits.jsonl
///   miniscatter-hist -i hits.jsonl --layout legacy --summary run.md
///   miniscatter-hist --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Target thickness [mm]
    #[arg(short = 't', long, default_value = "1.0", value_name = "MM")]
    pub thickness: f64,

    /// Target material name
    #[arg(short = 'm', long, default_value = "G4_Cu")]
    pub material: String,

    /// Detector distance [mm]
    #[arg(short = 'd', long, default_value = "50.0", value_name = "MM")]
    pub distance: f64,

    /// Detector angle [deg]
    ///
    /// The detector is only rotated when an angle is given.
    #[arg(short = 'a', long, value_name = "DEG", allow_negative_numbers = true)]
    pub angle: Option<f64>,

    /// Beam energy [MeV]
    #[arg(short = 'e', long, default_value = "200", value_name = "MEV")]
    pub beam_energy: f64,

    /// Beam particle type
    #[arg(short = 'b', long, default_value = "proton")]
    pub beam_type: String,

    /// Beam offset along x [mm]
    #[arg(
        short = 'x',
        long,
        default_value = "0.0",
        value_name = "MM",
        allow_negative_numbers = true
    )]
    pub beam_offset: f64,

    /// Physics list name
    #[arg(short = 'p', long, default_value = "QGSP_FTFP_BERT")]
    pub physics_list: String,

    /// Number of events to aggregate
    ///
    /// 0 aggregates every event in the input.
    #[arg(short = 'n', long, default_value = "0", value_name = "COUNT")]
    pub events: u64,

    /// Output filename (without directory or extension)
    ///
    /// Defaults to the config file value, or "output".
    #[arg(short = 'f', long, value_name = "NAME")]
    pub filename: Option<String>,

    /// Use a GUI
    ///
    /// Accepted for command-line compatibility; this tool only runs in batch mode.
    #[arg(short = 'g', long)]
    pub gui: bool,

    /// Hit stream to read, one JSON event per line ("-" for stdin)
    #[arg(short = 'i', long, default_value = "-", value_name = "FILE")]
    pub input: PathBuf,

    /// Directory run files are written to
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// How the output file name is derived
    #[arg(long, value_name = "SCHEME")]
    pub naming: Option<NamingScheme>,

    /// Histogram preset (replaces the [histograms] section of the config)
    #[arg(long, value_name = "PRESET")]
    pub layout: Option<LayoutPreset>,

    /// Optional histograms to fill (comma-separated)
    ///
    /// Example: --derived angle,proton-energy
    #[arg(long, value_name = "HISTS", value_delimiter = ',')]
    pub derived: Option<Vec<DerivedHistogram>>,

    /// Also save the run summary to this file
    #[arg(long, value_name = "FILE")]
    pub summary: Option<PathBuf>,

    /// Format of the saved summary (markdown, json)
    #[arg(long, default_value = "markdown", value_name = "FORMAT")]
    pub summary_format: OutputFormat,

    /// Path to configuration file
    ///
    /// If not specified, looks for .miniscatter.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Hide the progress indicator
    #[arg(long)]
    pub no_progress: bool,

    /// Generate a default .miniscatter.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the saved summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

impl Args {
    /// Parse command-line arguments.
    ///
    /// Any parse error exits with status 1 after printing the usage
    /// message; `--help` and `--version` exit with status 0.
    pub fn parse_args() -> Self {
        match Self::try_parse() {
            Ok(args) => args,
            Err(e) => {
                let _ = e.print();
                std::process::exit(if e.use_stderr() { 1 } else { 0 });
            }
        }
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if self.gui {
            return Err("GUI is not compatible with batch mode".to_string());
        }

        if !self.thickness.is_finite() || self.thickness <= 0.0 {
            return Err(format!(
                "Target thickness must be a positive number, got {}",
                self.thickness
            ));
        }

        if !self.beam_energy.is_finite() || self.beam_energy <= 0.0 {
            return Err(format!(
                "Beam energy must be a positive number, got {}",
                self.beam_energy
            ));
        }

        if !self.distance.is_finite() || !self.beam_offset.is_finite() {
            return Err("Detector distance and beam offset must be finite".to_string());
        }

        if let Some(angle) = self.angle {
            if !angle.is_finite() {
                return Err("Detector angle must be finite".to_string());
            }
        }

        if let Some(ref name) = self.filename {
            if name.is_empty() || name.contains(['/', '\\']) {
                return Err(format!(
                    "Output filename must be a plain name without directories, got '{}'",
                    name
                ));
            }
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        // Validate input file if provided
        if self.input != PathBuf::from("-") && !self.input.is_file() {
            return Err(format!("Hit file does not exist: {}", self.input.display()));
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }

    /// Simulation configuration given on the command line.
    pub fn geometry(&self) -> GeometryParameters {
        GeometryParameters {
            target_thickness: self.thickness,
            target_material: self.material.clone(),
            detector_distance: self.distance,
            detector_angle: self.angle,
            beam_energy: self.beam_energy,
            beam_type: self.beam_type.clone(),
            beam_offset: self.beam_offset,
            physics_list: self.physics_list.clone(),
        }
    }
}
