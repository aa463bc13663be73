use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SacError {
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{path}: not a SAC file: {reason}")]
    Format { path: PathBuf, reason: String },

    #[error("unsupported SAC header version {0}")]
    Version(i32),

    #[error("trace mismatch: {0}")]
    Mismatch(String),

    #[error("invalid cut window [{begin}, {end})")]
    BadWindow { begin: f64, end: f64 },

    #[error("pole-zero file invalid: {0}")]
    PoleZero(String),

    #[error("empty segment list, nothing to merge")]
    EmptyMerge,
}
