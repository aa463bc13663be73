// crates/noisecc-core/src/operators/normalization.rs
//
// Ambient-noise normalization operators. These have no external-engine
// command, so they always run in process regardless of the configured
// engine.

use std::path::Path;

use noisecc_sac::{dsp, Trace};

use crate::catalog::{Method, OperatorDescriptor};
use crate::error::Result;
use crate::types::TraceName;

use super::{Operator, OperatorContext};

#[derive(Debug, Clone, Copy)]
enum TimeNormKind {
    OneBit,
    RunningMean { half_width_s: f64 },
}

pub struct TimeNormalizeOp {
    kind: TimeNormKind,
}

impl TimeNormalizeOp {
    pub fn from_descriptor(descriptor: &OperatorDescriptor) -> Result<Self> {
        let kind = match descriptor.method {
            Method::RunningMean => TimeNormKind::RunningMean {
                half_width_s: descriptor
                    .params
                    .get("half_width_s")
                    .and_then(|v| v.as_f64())
                    .unwrap_or(10.0),
            },
            _ => TimeNormKind::OneBit,
        };
        Ok(Self { kind })
    }
}

impl Operator for TimeNormalizeOp {
    fn name(&self) -> &'static str {
        "time_normalize"
    }

    fn apply(&self, _cx: &OperatorContext<'_>, path: &Path, _identity: &TraceName) -> Result<()> {
        let mut trace = Trace::read(path)?;
        match self.kind {
            TimeNormKind::OneBit => dsp::one_bit(&mut trace),
            TimeNormKind::RunningMean { half_width_s } => {
                let half_width = (half_width_s / trace.header.delta).round() as usize;
                dsp::running_abs_mean(&mut trace, half_width.max(1));
            }
        }
        trace.write(path)?;
        Ok(())
    }
}

pub struct WhitenOp {
    low_hz: f64,
    high_hz: f64,
}

impl WhitenOp {
    pub fn from_descriptor(descriptor: &OperatorDescriptor) -> Result<Self> {
        let get = |key: &str| descriptor.params.get(key).and_then(|v| v.as_f64());
        Ok(Self {
            low_hz: get("low_hz").unwrap_or(0.01),
            high_hz: get("high_hz").unwrap_or(1.0),
        })
    }
}

impl Operator for WhitenOp {
    fn name(&self) -> &'static str {
        "whiten"
    }

    fn apply(&self, _cx: &OperatorContext<'_>, path: &Path, _identity: &TraceName) -> Result<()> {
        let mut trace = Trace::read(path)?;
        dsp::whiten(&mut trace, self.low_hz, self.high_hz);
        trace.write(path)?;
        Ok(())
    }
}
