// crates/noisecc-core/src/error.rs

use thiserror::Error;

use crate::config::ConfigError;
use crate::engine::EngineError;
use crate::types::ChannelId;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("station metadata not found for {identity}")]
    MetadataNotFound { identity: ChannelId },

    #[error("raw segments unreadable or unmergeable: {0}")]
    Fragmentation(String),

    #[error(
        "component azimuths {azimuth_a} and {azimuth_b} are not orthogonal \
         (separation {separation} deg, need 90 or 270)"
    )]
    GeometryPrecondition {
        azimuth_a: f64,
        azimuth_b: f64,
        separation: i64,
    },

    #[error("correlation precondition failed for {direction}: {reason}")]
    CorrelationPrecondition { direction: String, reason: String },

    #[error("external engine failed: {0}")]
    Engine(#[from] EngineError),

    #[error("trace operation failed: {0}")]
    Trace(#[from] noisecc_sac::SacError),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
