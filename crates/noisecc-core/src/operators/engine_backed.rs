// crates/noisecc-core/src/operators/engine_backed.rs
//
// Operators that delegate to the external DSP engine via a script. Each
// builds the canonical read-transform-overwrite script for its target file.

use std::path::Path;

use noisecc_sac::{GeoPoint, SacError, Trace};

use crate::catalog::OperatorDescriptor;
use crate::engine::{Script, ScriptCommand};
use crate::error::{PipelineError, Result};
use crate::types::{ChannelId, TraceName};

use super::{Operator, OperatorContext};

#[derive(Debug, Clone, Copy)]
pub enum DetrendKind {
    Demean,
    Linear,
}

pub struct DetrendOp {
    kind: DetrendKind,
}

impl DetrendOp {
    pub fn from_descriptor(descriptor: &OperatorDescriptor) -> Result<Self> {
        let kind = match descriptor.method {
            crate::catalog::Method::Linear => DetrendKind::Linear,
            _ => DetrendKind::Demean,
        };
        Ok(Self { kind })
    }
}

impl Operator for DetrendOp {
    fn name(&self) -> &'static str {
        "detrend"
    }

    fn apply(&self, cx: &OperatorContext<'_>, path: &Path, _identity: &TraceName) -> Result<()> {
        let transform = match self.kind {
            DetrendKind::Demean => ScriptCommand::Rmean,
            DetrendKind::Linear => ScriptCommand::Rtrend,
        };
        run_in_place(cx, path, vec![transform])
    }
}

pub struct TaperOp {
    width: f64,
}

impl TaperOp {
    pub fn from_descriptor(descriptor: &OperatorDescriptor) -> Result<Self> {
        let width = descriptor
            .params
            .get("width")
            .and_then(|v| v.as_f64())
            .unwrap_or(0.05);
        Ok(Self { width })
    }
}

impl Operator for TaperOp {
    fn name(&self) -> &'static str {
        "taper"
    }

    fn apply(&self, cx: &OperatorContext<'_>, path: &Path, _identity: &TraceName) -> Result<()> {
        run_in_place(cx, path, vec![ScriptCommand::Taper { width: self.width }])
    }
}

pub struct CutOp {
    begin: f64,
    end: f64,
}

impl CutOp {
    pub fn from_descriptor(descriptor: &OperatorDescriptor) -> Result<Self> {
        Ok(Self {
            begin: require_f64(descriptor, "begin_s")?,
            end: require_f64(descriptor, "end_s")?,
        })
    }
}

impl Operator for CutOp {
    fn name(&self) -> &'static str {
        "cut"
    }

    fn apply(&self, cx: &OperatorContext<'_>, path: &Path, _identity: &TraceName) -> Result<()> {
        // The cut window applies at the next read.
        let script = Script::new(
            vec![
                ScriptCommand::Cut {
                    begin: self.begin,
                    end: self.end,
                },
                ScriptCommand::Read {
                    path: path.to_path_buf(),
                },
                ScriptCommand::Write {
                    path: path.to_path_buf(),
                },
            ],
            vec![path.to_path_buf()],
        );
        cx.engine.run_checked(&script)?;
        Ok(())
    }
}

pub struct DecimateOp {
    target_hz: f64,
}

impl DecimateOp {
    pub fn from_descriptor(descriptor: &OperatorDescriptor) -> Result<Self> {
        Ok(Self {
            target_hz: require_f64(descriptor, "target_hz")?,
        })
    }
}

impl Operator for DecimateOp {
    fn name(&self) -> &'static str {
        "decimate"
    }

    fn apply(&self, cx: &OperatorContext<'_>, path: &Path, _identity: &TraceName) -> Result<()> {
        // The factor depends on the file's current rate.
        let trace = Trace::read(path)?;
        let rate = trace.header.sampling_rate();
        let ratio = rate / self.target_hz;
        let factor = ratio.round();
        if factor < 1.0 || (ratio - factor).abs() > 1e-6 {
            return Err(PipelineError::Trace(SacError::Mismatch(format!(
                "cannot decimate {rate} Hz to {} Hz by an integer factor",
                self.target_hz
            ))));
        }
        run_in_place(
            cx,
            path,
            vec![ScriptCommand::Decimate {
                factor: factor as usize,
            }],
        )
    }
}

pub struct BandpassOp {
    low_hz: f64,
    high_hz: f64,
    poles: u32,
    passes: u32,
}

impl BandpassOp {
    pub fn from_descriptor(descriptor: &OperatorDescriptor) -> Result<Self> {
        Ok(Self {
            low_hz: require_f64(descriptor, "low_hz")?,
            high_hz: require_f64(descriptor, "high_hz")?,
            poles: descriptor
                .params
                .get("poles")
                .and_then(|v| v.as_u32())
                .unwrap_or(4),
            passes: descriptor
                .params
                .get("passes")
                .and_then(|v| v.as_u32())
                .unwrap_or(2),
        })
    }
}

impl Operator for BandpassOp {
    fn name(&self) -> &'static str {
        "bandpass"
    }

    fn apply(&self, cx: &OperatorContext<'_>, path: &Path, _identity: &TraceName) -> Result<()> {
        run_in_place(
            cx,
            path,
            vec![ScriptCommand::Bandpass {
                low_hz: self.low_hz,
                high_hz: self.high_hz,
                poles: self.poles,
                passes: self.passes,
            }],
        )
    }
}

pub struct RemoveResponseOp {
    freq_limits: [f64; 4],
    water_level_db: f64,
}

impl RemoveResponseOp {
    pub fn from_descriptor(descriptor: &OperatorDescriptor) -> Result<Self> {
        let limits = descriptor
            .params
            .get("freq_limits")
            .and_then(|v| v.as_list())
            .ok_or_else(|| missing(descriptor, "freq_limits"))?;
        let freq_limits: [f64; 4] = limits
            .try_into()
            .map_err(|_| missing(descriptor, "freq_limits"))?;
        Ok(Self {
            freq_limits,
            water_level_db: descriptor
                .params
                .get("water_level_db")
                .and_then(|v| v.as_f64())
                .unwrap_or(60.0),
        })
    }
}

impl Operator for RemoveResponseOp {
    fn name(&self) -> &'static str {
        "remove_response"
    }

    fn apply(&self, cx: &OperatorContext<'_>, path: &Path, identity: &TraceName) -> Result<()> {
        let channel = channel_identity(cx, path, identity)?;
        let polezero = cx.resolver.resolve(&channel)?;
        run_in_place(
            cx,
            path,
            vec![ScriptCommand::Transfer {
                polezero,
                freq_limits: self.freq_limits,
                water_level_db: self.water_level_db,
            }],
        )
    }
}

/// Stamps station coordinates into the trace header. Coordinates come from
/// the resolved station-metadata file's comment block when present, else
/// from the station catalog; a resolver miss aborts the file.
pub struct WriteHeaderOp;

impl Operator for WriteHeaderOp {
    fn name(&self) -> &'static str {
        "write_header"
    }

    fn apply(&self, cx: &OperatorContext<'_>, path: &Path, identity: &TraceName) -> Result<()> {
        let channel = channel_identity(cx, path, identity)?;
        let metadata = cx.resolver.resolve(&channel)?;
        let location = coordinates_from_comments(&metadata)
            .or_else(|| {
                cx.stations
                    .get(&identity.station)
                    .map(|station| station.location())
            })
            .ok_or_else(|| PipelineError::MetadataNotFound {
                identity: channel.clone(),
            })?;
        run_in_place(cx, path, vec![ScriptCommand::SetStationCoordinates { location }])
    }
}

/// `* LATITUDE : 34.95` style comment lines written by metadata exporters.
fn coordinates_from_comments(path: &Path) -> Option<GeoPoint> {
    let content = std::fs::read_to_string(path).ok()?;
    let mut latitude = None;
    let mut longitude = None;
    let mut elevation = 0.0;
    for line in content.lines() {
        let line = line.trim_start_matches('*').trim();
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value: f64 = match value.split_whitespace().next().and_then(|v| v.parse().ok()) {
            Some(value) => value,
            None => continue,
        };
        match key.trim().to_ascii_uppercase().as_str() {
            "LATITUDE" => latitude = Some(value),
            "LONGITUDE" => longitude = Some(value),
            "ELEVATION" => elevation = value,
            _ => {}
        }
    }
    Some(GeoPoint {
        latitude: latitude?,
        longitude: longitude?,
        elevation_m: elevation,
    })
}

fn channel_identity(
    cx: &OperatorContext<'_>,
    path: &Path,
    identity: &TraceName,
) -> Result<ChannelId> {
    // Network comes from the trace header when stamped, else the catalog.
    let network = Trace::read(path)?
        .header
        .knetwk
        .or_else(|| {
            cx.stations
                .get(&identity.station)
                .map(|station| station.network.clone())
        })
        .unwrap_or_default();
    Ok(ChannelId::new(&network, &identity.station, &identity.channel))
}

fn run_in_place(
    cx: &OperatorContext<'_>,
    path: &Path,
    transforms: Vec<ScriptCommand>,
) -> Result<()> {
    let mut commands = Vec::with_capacity(transforms.len() + 2);
    commands.push(ScriptCommand::Read {
        path: path.to_path_buf(),
    });
    commands.extend(transforms);
    commands.push(ScriptCommand::Write {
        path: path.to_path_buf(),
    });
    cx.engine
        .run_checked(&Script::new(commands, vec![path.to_path_buf()]))?;
    Ok(())
}

fn require_f64(descriptor: &OperatorDescriptor, key: &'static str) -> Result<f64> {
    descriptor
        .params
        .get(key)
        .and_then(|v| v.as_f64())
        .ok_or_else(|| missing(descriptor, key))
}

fn missing(descriptor: &OperatorDescriptor, key: &'static str) -> PipelineError {
    PipelineError::Config(crate::config::ConfigError::MissingParam {
        operator: format!("{:?}/{:?}", descriptor.family, descriptor.method),
        param: key,
    })
}
