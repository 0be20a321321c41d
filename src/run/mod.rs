//! Run lifecycle: initialize, aggregate events, finalize.
//!
//! A [`RunContext`] carries the output configuration of one simulation
//! run. [`Run::initialize`] turns it into an open run with empty
//! histograms; every finished event goes through [`Run::aggregate`] and
//! [`Run::finalize`] writes the histograms, closes the output and returns
//! the derived statistics. Once finalized, further calls are errors.

use crate::analysis::EventAggregator;
use crate::config::{HistogramConfig, NamingScheme};
use crate::hits::HitSource;
use crate::models::{GeometryParameters, RunMetadata, RunSummary};
use crate::storage::{HistogramError, HistogramStore, JsonFileStore, StorageError};
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Extension of run files.
pub const OUTPUT_EXTENSION: &str = "json";

/// Errors that end a run.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("output filename not set")]
    OutputNameNotSet,

    #[error("invalid output filename '{0}': must not be empty or contain path separators")]
    InvalidOutputName(String),

    #[error("run was already finalized")]
    Finalized,

    #[error("failed to create output folder {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Histogram(#[from] HistogramError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Output configuration of one run.
#[derive(Debug, Clone)]
pub struct RunContext {
    output_dir: PathBuf,
    output_name: Option<String>,
    naming: NamingScheme,
    geometry: GeometryParameters,
    event_limit: u64,
}

impl RunContext {
    /// Create a context without an output name.
    pub fn new(output_dir: impl Into<PathBuf>, geometry: GeometryParameters) -> Self {
        Self {
            output_dir: output_dir.into(),
            output_name: None,
            naming: NamingScheme::default(),
            geometry,
            event_limit: 0,
        }
    }

    pub fn with_naming(mut self, naming: NamingScheme) -> Self {
        self.naming = naming;
        self
    }

    /// Record the requested event count (0 means all).
    pub fn with_event_limit(mut self, event_limit: u64) -> Self {
        self.event_limit = event_limit;
        self
    }

    pub fn set_output_name(&mut self, name: impl Into<String>) {
        self.output_name = Some(name.into());
    }

    #[allow(dead_code)] // Embedders that set the name late
    pub fn has_output_name(&self) -> bool {
        self.output_name.is_some()
    }

    /// Path of the run file.
    ///
    /// Fails when no output name was configured, whatever the naming scheme.
    pub fn output_path(&self) -> Result<PathBuf, RunError> {
        let name = self
            .output_name
            .as_deref()
            .ok_or(RunError::OutputNameNotSet)?;
        if name.is_empty() || name.contains(['/', '\\']) {
            return Err(RunError::InvalidOutputName(name.to_string()));
        }

        let stem = match self.naming {
            NamingScheme::Output => name.to_string(),
            NamingScheme::Geometry => format!(
                "histo_{:.6}mm_{}",
                self.geometry.target_thickness, self.geometry.physics_list
            ),
        };

        Ok(self
            .output_dir
            .join(format!("{}.{}", stem, OUTPUT_EXTENSION)))
    }
}

/// An initialized run.
pub struct Run<S: HistogramStore = JsonFileStore> {
    metadata: RunMetadata,
    output_path: PathBuf,
    aggregator: Option<EventAggregator>,
    store: Option<S>,
    started: Instant,
}

impl<S: HistogramStore> Run<S> {
    /// Open the output and create empty histograms.
    pub fn initialize(context: RunContext, config: &HistogramConfig) -> Result<Self, RunError> {
        let output_path = context.output_path()?;

        if !context.output_dir.exists() {
            info!("Creating folder '{}'", context.output_dir.display());
        }
        std::fs::create_dir_all(&context.output_dir).map_err(|source| RunError::CreateDir {
            path: context.output_dir.clone(),
            source,
        })?;

        // Histograms are built first so a bad layout never truncates an old file.
        let aggregator = EventAggregator::new(config)?;

        let metadata = RunMetadata {
            output_name: context.output_name.clone().unwrap_or_default(),
            started_at: Utc::now(),
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
            geometry: context.geometry,
            event_limit: context.event_limit,
        };

        info!("Opening output file '{}'", output_path.display());
        let store = S::open(&output_path, &metadata)?;

        Ok(Self {
            metadata,
            output_path,
            aggregator: Some(aggregator),
            store: Some(store),
            started: Instant::now(),
        })
    }

    /// Fold one finished event into the run.
    pub fn aggregate<E: HitSource + ?Sized>(&mut self, event: &E) -> Result<(), RunError> {
        let aggregator = self.aggregator.as_mut().ok_or(RunError::Finalized)?;
        aggregator.aggregate(event);
        Ok(())
    }

    /// Aggregate events from a stream, stopping after `limit` events (0 means all).
    ///
    /// Events past the limit are never pulled from the stream. `on_event`
    /// runs after each aggregated event. Returns the number aggregated.
    pub fn aggregate_stream<I, E>(
        &mut self,
        events: I,
        limit: u64,
        mut on_event: impl FnMut(),
    ) -> anyhow::Result<u64>
    where
        I: IntoIterator<Item = anyhow::Result<E>>,
        E: HitSource,
    {
        let take = match limit {
            0 => usize::MAX,
            n => usize::try_from(n).unwrap_or(usize::MAX),
        };

        let mut aggregated = 0;
        for event in events.into_iter().take(take) {
            let event = event?;
            self.aggregate(&event)?;
            aggregated += 1;
            on_event();
        }

        if limit > 0 && aggregated < limit {
            warn!(
                "Input ended after {} of {} requested events",
                aggregated, limit
            );
        }
        Ok(aggregated)
    }

    /// Write and release all histograms, then derive the run statistics.
    pub fn finalize(&mut self) -> Result<RunSummary, RunError> {
        let aggregator = self.aggregator.take().ok_or(RunError::Finalized)?;
        let mut store = self.store.take().ok_or(RunError::Finalized)?;

        let events = aggregator.events();
        let (histograms, accumulator) = aggregator.into_parts();

        if let Some(mean) = histograms.num_particles.mean() {
            debug!("Mean tracker hits per event: {:.3}", mean);
        }

        for histogram in histograms.into_histograms() {
            store.write(histogram)?;
        }
        let output_path = store.close()?;
        info!("Wrote histograms of {} events to '{}'", events, output_path.display());

        let (x, y) = (accumulator.x_moments(), accumulator.y_moments());
        debug!(
            "Tracker sums: n={} Σx={} Σx²={} Σy={} Σy²={}",
            accumulator.total(),
            x.sum,
            x.sum_sq,
            y.sum,
            y.sum_sq
        );

        Ok(RunSummary {
            metadata: self.metadata.clone(),
            output_path,
            events,
            species: accumulator.species().to_vec(),
            total_hits: accumulator.total(),
            x: accumulator.x_statistics(),
            y: accumulator.y_statistics(),
            duration_seconds: self.started.elapsed().as_secs_f64(),
        })
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    #[allow(dead_code)] // Lifecycle query for embedders
    pub fn is_finalized(&self) -> bool {
        self.aggregator.is_none()
    }

    /// Events aggregated so far; zero once finalized.
    pub fn events(&self) -> u64 {
        self.aggregator.as_ref().map_or(0, |a| a.events())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hits::RecordedEvent;
    use crate::models::TrackerHitRecord;
    use crate::storage::{MemoryStore, StoredRun};
    use tempfile::TempDir;

    fn context(dir: &Path, name: Option<&str>) -> RunContext {
        let mut ctx = RunContext::new(dir.join("plots"), GeometryParameters::default());
        if let Some(name) = name {
            ctx.set_output_name(name);
        }
        ctx
    }

    fn event(hits: Vec<(i32, &str, f64, f64)>) -> RecordedEvent {
        RecordedEvent::new(
            0,
            Vec::new(),
            hits.into_iter()
                .map(|(pdg, name, x, y)| TrackerHitRecord {
                    energy: 1.0,
                    pdg,
                    type_name: name.to_string(),
                    position: (x, y),
                    angle: None,
                })
                .collect(),
        )
    }

    #[test]
    fn test_output_path_naming() {
        let mut ctx = RunContext::new("plots", GeometryParameters::default());
        assert!(!ctx.has_output_name());
        assert!(matches!(ctx.output_path(), Err(RunError::OutputNameNotSet)));

        ctx.set_output_name("run42");
        assert_eq!(ctx.output_path().unwrap(), PathBuf::from("plots/run42.json"));

        let ctx = ctx.with_naming(NamingScheme::Geometry);
        assert_eq!(
            ctx.output_path().unwrap(),
            PathBuf::from("plots/histo_1.000000mm_QGSP_FTFP_BERT.json")
        );
    }

    #[test]
    fn test_invalid_output_name() {
        let mut ctx = RunContext::new("plots", GeometryParameters::default());
        ctx.set_output_name("../escape");
        assert!(matches!(
            ctx.output_path(),
            Err(RunError::InvalidOutputName(_))
        ));

        ctx.set_output_name("");
        assert!(matches!(
            ctx.output_path(),
            Err(RunError::InvalidOutputName(_))
        ));
    }

    #[test]
    fn test_initialize_requires_output_name() {
        let dir = TempDir::new().unwrap();
        let result = Run::<MemoryStore>::initialize(context(dir.path(), None), &HistogramConfig::default());

        assert!(matches!(result, Err(RunError::OutputNameNotSet)));
        assert!(!dir.path().join("plots").exists());
    }

    #[test]
    fn test_initialize_twice_in_existing_directory() {
        let dir = TempDir::new().unwrap();

        for _ in 0..2 {
            let mut run: Run = Run::initialize(
                context(dir.path(), Some("run42")),
                &HistogramConfig::default(),
            )
            .unwrap();
            run.finalize().unwrap();
        }

        assert!(dir.path().join("plots").join("run42.json").exists());
    }

    #[test]
    fn test_aggregate_after_finalize_is_error() {
        let dir = TempDir::new().unwrap();
        let mut run = Run::<MemoryStore>::initialize(
            context(dir.path(), Some("run")),
            &HistogramConfig::default(),
        )
        .unwrap();

        run.aggregate(&event(vec![(11, "e-", 0.0, 0.0)])).unwrap();
        run.finalize().unwrap();

        assert!(run.is_finalized());
        assert!(matches!(
            run.aggregate(&event(Vec::new())),
            Err(RunError::Finalized)
        ));
        assert!(matches!(run.finalize(), Err(RunError::Finalized)));
    }

    #[test]
    fn test_finalize_summary() {
        let dir = TempDir::new().unwrap();
        let mut run = Run::<MemoryStore>::initialize(
            context(dir.path(), Some("summary")),
            &HistogramConfig::default(),
        )
        .unwrap();

        run.aggregate(&event(vec![
            (2212, "proton", 0.1, -0.2),
            (11, "e-", 0.3, 0.1),
        ]))
        .unwrap();
        run.aggregate(&event(vec![(2212, "proton", 0.2, 0.4)])).unwrap();
        assert_eq!(run.events(), 2);

        let summary = run.finalize().unwrap();
        assert_eq!(summary.events, 2);
        assert_eq!(summary.total_hits, 3);
        assert_eq!(summary.species.len(), 2);
        assert_eq!(summary.species[0].pdg, 2212);
        assert_eq!(summary.species[0].count, 2);
        assert_eq!(summary.metadata.output_name, "summary");

        let x = summary.x.unwrap();
        assert!((x.mean - 0.2).abs() < 1e-12);
        assert!((x.variance.unwrap() - 0.01).abs() < 1e-12);
    }

    fn stream(count: usize) -> Vec<anyhow::Result<RecordedEvent>> {
        (0..count)
            .map(|_| Ok(event(vec![(11, "e-", 0.0, 0.0)])))
            .collect()
    }

    fn memory_run(dir: &Path) -> Run<MemoryStore> {
        Run::initialize(context(dir, Some("stream")), &HistogramConfig::default()).unwrap()
    }

    #[test]
    fn test_aggregate_stream_stops_at_limit() {
        let dir = TempDir::new().unwrap();
        let mut run = memory_run(dir.path());

        // Anything past the limit must not be pulled
        let events = stream(2).into_iter().chain(std::iter::once_with(
            || -> anyhow::Result<RecordedEvent> { panic!("read past the event limit") },
        ));

        let mut seen = 0;
        let aggregated = run.aggregate_stream(events, 2, || seen += 1).unwrap();

        assert_eq!(aggregated, 2);
        assert_eq!(seen, 2);
        assert_eq!(run.events(), 2);
    }

    #[test]
    fn test_aggregate_stream_limit_beyond_input() {
        let dir = TempDir::new().unwrap();
        let mut run = memory_run(dir.path());

        let aggregated = run.aggregate_stream(stream(3), 10, || {}).unwrap();

        assert_eq!(aggregated, 3);
        let summary = run.finalize().unwrap();
        assert_eq!(summary.events, 3);
        assert_eq!(summary.total_hits, 3);
    }

    #[test]
    fn test_aggregate_stream_zero_means_all() {
        let dir = TempDir::new().unwrap();
        let mut run = memory_run(dir.path());

        let aggregated = run.aggregate_stream(stream(5), 0, || {}).unwrap();

        assert_eq!(aggregated, 5);
        assert_eq!(run.events(), 5);
    }

    #[test]
    fn test_aggregate_stream_input_error_is_fatal() {
        let dir = TempDir::new().unwrap();
        let mut run = memory_run(dir.path());

        let mut events = stream(1);
        events.push(Err(anyhow::anyhow!("Malformed event on line 2")));
        events.extend(stream(1));

        let err = run.aggregate_stream(events, 0, || {}).unwrap_err();
        assert!(err.to_string().contains("line 2"));
        assert_eq!(run.events(), 1);
    }

    #[test]
    fn test_single_hit_variance_undefined() {
        let dir = TempDir::new().unwrap();
        let mut run = Run::<MemoryStore>::initialize(
            context(dir.path(), Some("one")),
            &HistogramConfig::default(),
        )
        .unwrap();

        run.aggregate(&event(vec![(11, "e-", 1.0, 1.0)])).unwrap();
        let summary = run.finalize().unwrap();

        assert!(summary.x.unwrap().variance.is_none());
        assert!(summary.y.unwrap().variance.is_none());
    }

    #[test]
    fn test_finalize_writes_all_histograms() {
        let dir = TempDir::new().unwrap();
        let mut run: Run = Run::initialize(
            context(dir.path(), Some("full")),
            &HistogramConfig::default(),
        )
        .unwrap();

        run.aggregate(&event(vec![(11, "e-", 0.0, 0.0)])).unwrap();
        let summary = run.finalize().unwrap();

        let stored = StoredRun::load(&summary.output_path).unwrap();
        assert_eq!(stored.histograms.len(), 6);
        assert_eq!(stored.get("numParticles").map(|h| h.entries()), Some(1));
        assert_eq!(stored.get("trackerHitpos").map(|h| h.entries()), Some(1));
        assert_eq!(stored.metadata.output_name, "full");
    }

    #[test]
    fn test_invalid_layout_keeps_existing_file() {
        let dir = TempDir::new().unwrap();
        let plots = dir.path().join("plots");
        std::fs::create_dir_all(&plots).unwrap();
        std::fs::write(plots.join("keep.json"), "previous").unwrap();

        let config = HistogramConfig {
            position_bins: 0,
            ..HistogramConfig::default()
        };
        let result: Result<Run, _> = Run::initialize(context(dir.path(), Some("keep")), &config);

        assert!(matches!(result, Err(RunError::Histogram(_))));
        assert_eq!(
            std::fs::read_to_string(plots.join("keep.json")).unwrap(),
            "previous"
        );
    }
}
