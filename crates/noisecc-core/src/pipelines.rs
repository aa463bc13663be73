// crates/noisecc-core/src/pipelines.rs
//
// Stage drivers. Each driver walks the event catalog, applies one stage to
// everything it finds, and folds the results into a StageReport. A failed
// file never aborts the stage; only configuration failures abort a run.

use std::path::PathBuf;

use tracing::{debug, info};

use crate::catalog::OperatorDescriptor;
use crate::config::PipelineConfig;
use crate::correlator::{CorrelationOptions, EventCorrelator};
use crate::engine::{build_engine, DspEngine};
use crate::error::Result;
use crate::executor::StageExecutor;
use crate::normalizer::Normalizer;
use crate::operators::{build_plan, OperatorContext};
use crate::report::{RunReport, StageReport};
use crate::resolver::MetadataResolver;
use crate::stacker::Stacker;
use crate::types::{DatasetCatalog, EventKey, StationIndex, TraceName};

pub struct PipelineRunner {
    pub config: PipelineConfig,
    pub catalog: DatasetCatalog,
    engine: Box<dyn DspEngine>,
    stations: StationIndex,
}

impl PipelineRunner {
    pub fn new(config: PipelineConfig, catalog: DatasetCatalog) -> Self {
        let engine = build_engine(&config.engine);
        let stations = catalog.station_index();
        Self {
            config,
            catalog,
            engine,
            stations,
        }
    }

    /// Normalize raw segmented recordings into one canonical trace per
    /// channel per event.
    pub fn run_normalize(&self) -> Result<StageReport> {
        let mut report = StageReport::new("normalize");
        let normalizer = Normalizer {
            engine: self.engine.as_ref(),
            window_length_s: self.config.window.length_s,
        };
        for event in self.catalog.event_keys() {
            let raw_dir = self.config.paths.raw_dir.join(event.tag());
            if !raw_dir.is_dir() {
                debug!(event = %event, "no raw directory, skipping");
                report.skipped += 1;
                continue;
            }
            let data_dir = self.config.paths.data_dir.join(event.tag());
            let outcome = normalizer.normalize_event(&event, &raw_dir, &data_dir)?;
            report.processed += outcome.produced.len();
            for (channel, error) in outcome.failed {
                report.record_failure(format!("{event}/{channel}"), error);
            }
        }
        info!(processed = report.processed, failures = report.failures.len(), "normalize done");
        Ok(report)
    }

    pub fn run_conditioning(&self) -> Result<StageReport> {
        self.run_trace_stage("conditioning", &self.config.conditioning)
    }

    pub fn run_processing(&self) -> Result<StageReport> {
        self.run_trace_stage("processing", &self.config.processing)
    }

    /// Apply one ordered operator list to every canonical trace of every
    /// event. A trailing `cross_correlate` descriptor is not a per-trace
    /// operator; the plan skips it and `run_correlate` picks it up.
    fn run_trace_stage(
        &self,
        stage: &str,
        descriptors: &[OperatorDescriptor],
    ) -> Result<StageReport> {
        let mut report = StageReport::new(stage);
        let plan = build_plan(descriptors)?;
        report.skipped += plan.skipped;

        for event in self.catalog.event_keys() {
            let event_dir = self.config.paths.data_dir.join(event.tag());
            if !event_dir.is_dir() {
                continue;
            }
            let event_responses = event_dir.join("resp");
            let resolver = MetadataResolver::new(
                &self.config.paths.response_dir,
                event_responses.is_dir().then_some(event_responses.as_path()),
            );
            let executor = StageExecutor::new(OperatorContext {
                engine: self.engine.as_ref(),
                resolver: &resolver,
                stations: &self.stations,
            });
            for (path, identity) in event_traces(&event_dir, &event)? {
                match executor.execute(&plan, &path, &identity) {
                    Ok(()) => report.processed += 1,
                    Err(error) => report.record_failure(identity.to_string(), error),
                }
            }
        }
        info!(stage, processed = report.processed, failures = report.failures.len(), "stage done");
        Ok(report)
    }

    /// Pairwise correlation over every event directory.
    pub fn run_correlate(&self) -> Result<StageReport> {
        let mut report = StageReport::new("correlate");
        let correlator = EventCorrelator {
            engine: self.engine.as_ref(),
            stations: &self.stations,
            options: CorrelationOptions::from_descriptor(self.config.correlate_descriptor()),
        };
        for event in self.catalog.event_keys() {
            let event_dir = self.config.paths.data_dir.join(event.tag());
            if !event_dir.exists() {
                report.skipped += 1;
                continue;
            }
            // Anything else wrong with the directory is an event-level
            // failure; the remaining events still run.
            match correlator.correlate_event(&event, &event_dir) {
                Ok(outcome) => {
                    report.processed += outcome.produced.len();
                    for (subject, error) in outcome.failures {
                        report.record_failure(format!("{event}/{subject}"), error);
                    }
                }
                Err(error) => report.record_failure(event.tag(), error),
            }
        }
        info!(products = report.processed, failures = report.failures.len(), "correlate done");
        Ok(report)
    }

    pub fn run_stack(&self) -> Result<StageReport> {
        let mut report = StageReport::new("stack");
        if !self.config.stack.enabled {
            debug!("stacking disabled");
            return Ok(report);
        }
        let stacker = Stacker {
            config: &self.config.stack,
        };
        let events = self.catalog.event_keys();
        let outcome = stacker.stack(
            &self.config.paths.data_dir,
            &events,
            &self.config.paths.stack_dir,
        )?;
        report.processed = outcome.stacked.len();
        report.skipped = outcome.skipped_instances;
        report.counters = outcome.stacked;
        for (tag, reason) in outcome.transform_failures {
            report.record_failure(tag, reason);
        }
        info!(stacks = report.processed, "stack done");
        Ok(report)
    }

    /// The full chain, in order. Stage reports accumulate even when
    /// individual files failed along the way.
    pub fn run_all(&self) -> Result<RunReport> {
        let mut report = RunReport::new();
        report.push(self.run_normalize()?);
        report.push(self.run_conditioning()?);
        report.push(self.run_processing()?);
        report.push(self.run_correlate()?);
        report.push(self.run_stack()?);
        report.finish();
        Ok(report)
    }
}

/// Canonical per-event trace files, in deterministic order.
fn event_traces(event_dir: &std::path::Path, event: &EventKey) -> Result<Vec<(PathBuf, TraceName)>> {
    let tag = event.tag();
    let mut traces = Vec::new();
    for entry in std::fs::read_dir(event_dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        if let Some(identity) = entry
            .file_name()
            .to_str()
            .and_then(|name| TraceName::parse(name, &tag))
        {
            traces.push((entry.path(), identity));
        }
    }
    traces.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(traces)
}
