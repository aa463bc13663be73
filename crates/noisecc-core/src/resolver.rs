// crates/noisecc-core/src/resolver.rs

use std::path::{Path, PathBuf};

use crate::error::PipelineError;
use crate::types::ChannelId;

/// Maps a channel identity to its station-metadata file. Two candidate
/// locations are searched in order: the dataset-wide response directory,
/// then the per-event one. Fails closed; an operator that needs metadata
/// must abort its file on a miss, never continue with defaults.
#[derive(Debug, Clone)]
pub struct MetadataResolver {
    primary: PathBuf,
    secondary: Option<PathBuf>,
}

impl MetadataResolver {
    pub fn new(primary: &Path, secondary: Option<&Path>) -> Self {
        Self {
            primary: primary.to_path_buf(),
            secondary: secondary.map(Path::to_path_buf),
        }
    }

    pub fn resolve(&self, identity: &ChannelId) -> Result<PathBuf, PipelineError> {
        let file_name = identity.to_string();
        let primary = self.primary.join(&file_name);
        if primary.is_file() {
            return Ok(primary);
        }
        if let Some(secondary) = &self.secondary {
            let candidate = secondary.join(&file_name);
            if candidate.is_file() {
                return Ok(candidate);
            }
        }
        Err(PipelineError::MetadataNotFound {
            identity: identity.clone(),
        })
    }
}
