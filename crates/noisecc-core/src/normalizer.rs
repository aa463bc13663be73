// crates/noisecc-core/src/normalizer.rs
//
// Waveform normalizer: turns fragmented raw per-event recordings into one
// canonical, gap-free trace per channel whose time origin sits exactly at
// the start of the nominal request window.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use noisecc_sac::Trace;

use crate::engine::{DspEngine, Script, ScriptCommand};
use crate::error::{PipelineError, Result};
use crate::types::{ChannelId, EventKey, TraceName};

/// Raw segment files are named `NET.STA.CHN.<seq>.sac`; everything after the
/// channel is ignored. The identity is parsed here, once, and carried along.
fn segment_identity(file_name: &str) -> Option<ChannelId> {
    let mut parts = file_name.split('.');
    let network = parts.next()?;
    let station = parts.next()?;
    let channel = parts.next()?;
    if network.is_empty() || station.is_empty() || channel.is_empty() {
        return None;
    }
    Some(ChannelId::new(network, station, channel))
}

pub struct Normalizer<'a> {
    pub engine: &'a dyn DspEngine,
    /// Requested window length in seconds.
    pub window_length_s: f64,
}

pub struct NormalizeOutcome {
    pub produced: Vec<TraceName>,
    pub failed: Vec<(ChannelId, PipelineError)>,
}

impl<'a> Normalizer<'a> {
    /// Normalize every channel found under `raw_event_dir` into
    /// `data_event_dir`. Failures are per-channel; the target file of a
    /// failed channel is treated as not produced.
    pub fn normalize_event(
        &self,
        event: &EventKey,
        raw_event_dir: &Path,
        data_event_dir: &Path,
    ) -> Result<NormalizeOutcome> {
        std::fs::create_dir_all(data_event_dir)?;

        let mut groups: BTreeMap<ChannelId, Vec<PathBuf>> = BTreeMap::new();
        let pattern = raw_event_dir.join("*").to_string_lossy().into_owned();
        for entry in glob::glob(&pattern).map_err(|e| {
            PipelineError::Fragmentation(format!("bad raw glob pattern: {e}"))
        })? {
            let path = match entry {
                Ok(path) => path,
                Err(e) => {
                    warn!(error = %e, "unreadable raw path, skipping");
                    continue;
                }
            };
            if !path.is_file() {
                continue;
            }
            let Some(identity) = path
                .file_name()
                .and_then(|name| name.to_str())
                .and_then(segment_identity)
            else {
                debug!(path = %path.display(), "not a raw segment name, skipping");
                continue;
            };
            groups.entry(identity).or_default().push(path);
        }

        let mut outcome = NormalizeOutcome {
            produced: Vec::new(),
            failed: Vec::new(),
        };
        for (identity, segments) in groups {
            let name = TraceName::new(event, &identity.station, &identity.channel);
            let target = data_event_dir.join(name.to_string());
            match self.normalize_channel(event, &identity, &segments, &target) {
                Ok(()) => outcome.produced.push(name),
                Err(error) => {
                    warn!(channel = %identity, %error, "normalization failed");
                    if target.exists() {
                        let _ = std::fs::remove_file(&target);
                    }
                    outcome.failed.push((identity, error));
                }
            }
        }
        Ok(outcome)
    }

    fn normalize_channel(
        &self,
        event: &EventKey,
        identity: &ChannelId,
        segments: &[PathBuf],
        target: &Path,
    ) -> Result<()> {
        let mut traces = Vec::with_capacity(segments.len());
        for path in segments {
            traces.push(Trace::read(path).map_err(|e| {
                PipelineError::Fragmentation(format!("{}: {e}", path.display()))
            })?);
        }

        let mut merged = Trace::merge(traces, 0.0)
            .map_err(|e| PipelineError::Fragmentation(e.to_string()))?;

        // Re-base offsets onto midnight of the request day so the true data
        // start (beginData) and the requested start are directly comparable
        // seconds-since-midnight values.
        let midnight = event.midnight();
        let reference = merged
            .header
            .reference
            .ok_or_else(|| PipelineError::Fragmentation("merged trace lost its reference".into()))?;
        let shift = (reference - midnight).num_microseconds().unwrap_or(0) as f64 / 1_000_000.0;
        merged.header.b += shift;
        merged.header.reference = Some(midnight);
        merged.header.kstnm = Some(identity.station.clone());
        merged.header.knetwk = Some(identity.network.clone());
        merged.header.kcmpnm = Some(identity.channel.clone());

        // First write the merged trace with its true begin offset, then let
        // the engine force the window to the nominal request.
        merged.write(target)?;
        let begin_request = event.seconds_since_midnight();
        self.engine.run_checked(&Script::new(
            vec![
                ScriptCommand::Cut {
                    begin: begin_request,
                    end: begin_request + self.window_length_s,
                },
                ScriptCommand::Read {
                    path: target.to_path_buf(),
                },
                ScriptCommand::Write {
                    path: target.to_path_buf(),
                },
            ],
            vec![target.to_path_buf()],
        ))?;

        // The windowing call leaves b = beginRequest relative to midnight;
        // zero the internal origin and re-stamp the absolute start to the
        // event origin exactly.
        let mut windowed = Trace::read(target)?;
        windowed.header.b = 0.0;
        windowed.header.reference = Some(event.origin());
        windowed.write(target)?;
        Ok(())
    }
}
