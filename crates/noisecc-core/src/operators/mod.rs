// crates/noisecc-core/src/operators/mod.rs
//
// Per-file operator implementations. A validated `OperatorDescriptor` is
// turned into exactly one boxed operator at plan-construction time; at run
// time an operator reads its file, transforms it, and overwrites it in
// place.

mod engine_backed;
mod normalization;

use std::path::Path;

use tracing::debug;

use crate::catalog::{self, OperatorDescriptor, StageFamily};
use crate::config::ConfigError;
use crate::engine::DspEngine;
use crate::error::Result;
use crate::resolver::MetadataResolver;
use crate::types::{StationIndex, TraceName};

pub use engine_backed::{
    BandpassOp, CutOp, DecimateOp, DetrendOp, RemoveResponseOp, TaperOp, WriteHeaderOp,
};
pub use normalization::{TimeNormalizeOp, WhitenOp};

/// Everything an operator may need besides its own parameters.
pub struct OperatorContext<'a> {
    pub engine: &'a dyn DspEngine,
    pub resolver: &'a MetadataResolver,
    pub stations: &'a StationIndex,
}

pub trait Operator: Send + Sync {
    fn name(&self) -> &'static str;

    /// Transform the file in place. An error aborts the rest of the file's
    /// pipeline.
    fn apply(&self, cx: &OperatorContext<'_>, path: &Path, identity: &TraceName) -> Result<()>;
}

/// An ordered, validated operator list for one stage.
pub struct Plan {
    pub ops: Vec<Box<dyn Operator>>,
    /// Descriptors present in the stage but not executed per file
    /// (cross-correlation runs in the pair engine instead).
    pub skipped: usize,
}

/// Build a per-file plan from a stage's descriptors. Parameters are parsed
/// and range-checked here, once; apply() never sees a raw parameter map.
pub fn build_plan(descriptors: &[OperatorDescriptor]) -> Result<Plan> {
    let mut ops: Vec<Box<dyn Operator>> = Vec::with_capacity(descriptors.len());
    let mut skipped = 0usize;
    for descriptor in descriptors {
        let spec = catalog::lookup(descriptor.family, descriptor.method).ok_or(
            ConfigError::UnknownOperator {
                family: descriptor.family,
                method: descriptor.method,
            },
        )?;
        spec.validate(descriptor)?;

        match descriptor.family {
            StageFamily::CrossCorrelate => {
                debug!(operator = %spec.name(), "not a per-file operator, skipping");
                skipped += 1;
            }
            StageFamily::Detrend => ops.push(Box::new(DetrendOp::from_descriptor(descriptor)?)),
            StageFamily::Taper => ops.push(Box::new(TaperOp::from_descriptor(descriptor)?)),
            StageFamily::Cut => ops.push(Box::new(CutOp::from_descriptor(descriptor)?)),
            StageFamily::Decimate => ops.push(Box::new(DecimateOp::from_descriptor(descriptor)?)),
            StageFamily::Bandpass => ops.push(Box::new(BandpassOp::from_descriptor(descriptor)?)),
            StageFamily::RemoveResponse => {
                ops.push(Box::new(RemoveResponseOp::from_descriptor(descriptor)?))
            }
            StageFamily::WriteHeader => ops.push(Box::new(WriteHeaderOp)),
            StageFamily::TimeNormalize => {
                ops.push(Box::new(TimeNormalizeOp::from_descriptor(descriptor)?))
            }
            StageFamily::Whiten => ops.push(Box::new(WhitenOp::from_descriptor(descriptor)?)),
        }
    }
    Ok(Plan { ops, skipped })
}
