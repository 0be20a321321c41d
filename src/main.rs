//! MiniScatter histogram writer
//!
//! Aggregates the per-event hit collections of a MiniScatter run into
//! histograms, writes them to a run file and prints the tracker summary.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Invalid arguments or runtime error (bad input, output failure, etc.)

mod analysis;
mod cli;
mod config;
mod hits;
mod models;
mod report;
mod run;
mod storage;

use anyhow::{Context, Result};
use cli::{Args, OutputFormat};
use config::{Config, CONFIG_FILE_NAME};
use hits::EventReader;
use indicatif::{ProgressBar, ProgressStyle};
use run::{Run, RunContext};
use std::path::PathBuf;
use storage::JsonFileStore;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

fn main() {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        if let Err(e) = handle_init_config() {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
        return;
    }

    // Config is read before logging so `general.verbose` can raise the level
    let loaded = load_config(&args);
    let config_verbose = matches!(&loaded, Ok((config, _)) if config.general.verbose);

    // Initialize logging
    init_logging(&args, config_verbose);

    info!("MiniScatter histogram writer v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    let result = loaded.and_then(|(config, source)| {
        source.log();
        run_histograms(&args, config)
    });

    if let Err(e) = result {
        error!("Run failed: {:#}", e);
        eprintln!("\nError: {:#}", e);
        std::process::exit(1);
    }
}

/// Handle --init-config: generate a default .miniscatter.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(CONFIG_FILE_NAME);

    if path.exists() {
        anyhow::bail!(
            "{} already exists. Remove it first or edit it manually.",
            CONFIG_FILE_NAME
        );
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", CONFIG_FILE_NAME))?;

    println!("Created {} with default settings.", CONFIG_FILE_NAME);
    println!("Edit it to customize the output folder, naming and histogram layout.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args, config_verbose: bool) {
    let level = if config_verbose && !args.quiet {
        tracing::Level::DEBUG
    } else {
        args.log_level()
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Run the complete workflow: initialize, aggregate every event, finalize.
fn run_histograms(args: &Args, mut config: Config) -> Result<()> {
    config.merge_with_args(args);

    let geometry = args.geometry();
    info!(
        "Target: {} mm of {}, beam: {} MeV {}, physics list: {}",
        geometry.target_thickness,
        geometry.target_material,
        geometry.beam_energy,
        geometry.beam_type,
        geometry.physics_list
    );

    let mut context = RunContext::new(&config.output.directory, geometry)
        .with_naming(config.output.naming)
        .with_event_limit(args.events);
    context.set_output_name(config.output.filename.clone());

    let mut run: Run<JsonFileStore> = Run::initialize(context, &config.histograms)?;

    let progress = make_progress(args.events, config.general.progress);
    let events = EventReader::open(&args.input)?;
    run.aggregate_stream(events, args.events, || progress.inc(1))?;
    progress.finish_and_clear();
    debug!("Aggregated {} events", run.events());

    info!("Finalizing '{}'", run.output_path().display());
    let summary = run.finalize()?;

    print!("{}", report::generate_text_report(&summary));

    if let Some(ref path) = args.summary {
        let content = match args.summary_format {
            OutputFormat::Json => report::generate_json_report(&summary)?,
            OutputFormat::Markdown => report::generate_markdown_report(&summary),
        };
        report::write_report(&content, path)?;
        info!("Summary saved to {}", path.display());
    }

    Ok(())
}

/// Progress indicator over the event stream; hidden when disabled.
fn make_progress(limit: u64, enabled: bool) -> ProgressBar {
    if !enabled {
        return ProgressBar::hidden();
    }

    if limit > 0 {
        let pb = ProgressBar::new(limit);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} events ({eta})")
        {
            pb.set_style(style.progress_chars("#>-"));
        }
        pb
    } else {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) =
            ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {pos} events")
        {
            pb.set_style(style);
        }
        pb
    }
}

/// Where the configuration came from, reported once logging is up.
enum ConfigSource {
    Explicit(PathBuf),
    DefaultFile,
    Builtin,
    Fallback(anyhow::Error),
}

impl ConfigSource {
    fn log(&self) {
        match self {
            ConfigSource::Explicit(path) => info!("Loaded config from: {}", path.display()),
            ConfigSource::DefaultFile => info!("Loaded default config from {}", CONFIG_FILE_NAME),
            ConfigSource::Builtin => debug!("No config file found, using defaults"),
            ConfigSource::Fallback(e) => warn!("Failed to load config: {:#}", e),
        }
    }
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<(Config, ConfigSource)> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        let config = Config::load(config_path)?;
        return Ok((config, ConfigSource::Explicit(config_path.clone())));
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => Ok((config, ConfigSource::DefaultFile)),
        Ok(None) => Ok((Config::default(), ConfigSource::Builtin)),
        Err(e) => Ok((Config::default(), ConfigSource::Fallback(e))),
    }
}
