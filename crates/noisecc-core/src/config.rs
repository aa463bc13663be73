// crates/noisecc-core/src/config.rs
//
// Pipeline configuration: ordered operator lists per stage plus dataset
// paths. Validation happens here, before any file is touched; a validation
// failure is the only error that aborts a whole run.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::{self, OperatorDescriptor, StageFamily};
use crate::types::DatasetCatalog;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("unknown operator {family:?}/{method:?}")]
    UnknownOperator {
        family: StageFamily,
        method: catalog::Method,
    },

    #[error("operator {operator}: missing required parameter '{param}'")]
    MissingParam {
        operator: String,
        param: &'static str,
    },

    #[error("operator {operator}: parameter '{param}': {reason}")]
    BadParam {
        operator: String,
        param: String,
        reason: String,
    },

    #[error(
        "{stage}: cross_correlate must be the last descriptor, found at \
         position {position} of {len}"
    )]
    CorrelateNotLast {
        stage: &'static str,
        position: usize,
        len: usize,
    },

    #[error("{stage}: at most one cross_correlate descriptor is allowed")]
    DuplicateCorrelate { stage: &'static str },

    #[error("{0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    pub raw_dir: PathBuf,
    pub data_dir: PathBuf,
    pub stack_dir: PathBuf,
    pub response_dir: PathBuf,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WindowConfig {
    /// Requested window length per event, seconds.
    pub length_s: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LagWindowConfig {
    pub min_lag_s: f64,
    pub max_lag_s: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StackBandpassConfig {
    pub poles: u32,
    pub passes: u32,
    pub low_period_s: f64,
    pub high_period_s: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub symmetrize: bool,
    #[serde(default)]
    pub window: Option<LagWindowConfig>,
    #[serde(default)]
    pub bandpass: Option<StackBandpassConfig>,
}

impl Default for StackConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            symmetrize: false,
            window: None,
            bandpass: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EngineKind {
    #[default]
    Native,
    Sac,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub kind: EngineKind,
    #[serde(default = "default_engine_command")]
    pub command: String,
    #[serde(default = "default_engine_timeout_s")]
    pub timeout_s: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            kind: EngineKind::Native,
            command: default_engine_command(),
            timeout_s: default_engine_timeout_s(),
        }
    }
}

impl EngineConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_s)
    }
}

fn default_true() -> bool {
    true
}

fn default_engine_command() -> String {
    "sac".to_string()
}

fn default_engine_timeout_s() -> u64 {
    300
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub paths: PathsConfig,
    pub window: WindowConfig,
    #[serde(default)]
    pub conditioning: Vec<OperatorDescriptor>,
    #[serde(default)]
    pub processing: Vec<OperatorDescriptor>,
    #[serde(default)]
    pub stack: StackConfig,
    #[serde(default)]
    pub engine: EngineConfig,
}

impl PipelineConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: PipelineConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.window.length_s > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "window length must be positive, got {}",
                self.window.length_s
            )));
        }
        validate_stage("conditioning", &self.conditioning)?;
        validate_stage("processing", &self.processing)?;
        if let Some(window) = &self.stack.window {
            if !(window.max_lag_s > window.min_lag_s) {
                return Err(ConfigError::Invalid(format!(
                    "stack lag window [{}, {}] is empty",
                    window.min_lag_s, window.max_lag_s
                )));
            }
        }
        if let Some(bandpass) = &self.stack.bandpass {
            if !(bandpass.low_period_s < bandpass.high_period_s) || bandpass.low_period_s <= 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "stack bandpass periods [{}, {}] are not increasing",
                    bandpass.low_period_s, bandpass.high_period_s
                )));
            }
        }
        Ok(())
    }

    /// The `cross_correlate` descriptor configured at the end of the
    /// processing stage, if any.
    pub fn correlate_descriptor(&self) -> Option<&OperatorDescriptor> {
        self.processing
            .last()
            .filter(|descriptor| descriptor.family == StageFamily::CrossCorrelate)
    }
}

fn validate_stage(stage: &'static str, descriptors: &[OperatorDescriptor]) -> Result<(), ConfigError> {
    let len = descriptors.len();
    let correlate_count = descriptors
        .iter()
        .filter(|descriptor| descriptor.family == StageFamily::CrossCorrelate)
        .count();
    if correlate_count > 1 {
        return Err(ConfigError::DuplicateCorrelate { stage });
    }
    for (position, descriptor) in descriptors.iter().enumerate() {
        let spec = catalog::lookup(descriptor.family, descriptor.method).ok_or(
            ConfigError::UnknownOperator {
                family: descriptor.family,
                method: descriptor.method,
            },
        )?;
        spec.validate(descriptor)?;
        validate_ranges(&spec.name(), descriptor)?;

        if descriptor.family == StageFamily::CrossCorrelate && position + 1 != len {
            return Err(ConfigError::CorrelateNotLast {
                stage,
                position: position + 1,
                len,
            });
        }
    }
    Ok(())
}

/// Range checks beyond kind/presence; still construction-time, not call-time.
fn validate_ranges(name: &str, descriptor: &OperatorDescriptor) -> Result<(), ConfigError> {
    let bad = |param: &str, reason: String| ConfigError::BadParam {
        operator: name.to_string(),
        param: param.to_string(),
        reason,
    };

    let float = |key: &str| descriptor.params.get(key).and_then(|v| v.as_f64());

    match descriptor.family {
        StageFamily::Taper => {
            if let Some(width) = float("width") {
                if !(0.0..=0.5).contains(&width) {
                    return Err(bad("width", format!("{width} outside (0, 0.5]")));
                }
            }
        }
        StageFamily::Cut => {
            let (begin, end) = (float("begin_s"), float("end_s"));
            if let (Some(begin), Some(end)) = (begin, end) {
                if !(end > begin) {
                    return Err(bad("end_s", format!("window [{begin}, {end}) is empty")));
                }
            }
        }
        StageFamily::Decimate => {
            if let Some(target) = float("target_hz") {
                if !(target > 0.0) {
                    return Err(bad("target_hz", format!("{target} must be positive")));
                }
            }
        }
        StageFamily::Bandpass | StageFamily::Whiten => {
            if let (Some(low), Some(high)) = (float("low_hz"), float("high_hz")) {
                if !(low > 0.0 && high > low) {
                    return Err(bad("high_hz", format!("band [{low}, {high}] is invalid")));
                }
            }
            if let Some(poles) = descriptor.params.get("poles") {
                match poles.as_u32() {
                    Some(1..=10) => {}
                    _ => return Err(bad("poles", "must be 1..=10".into())),
                }
            }
            if let Some(passes) = descriptor.params.get("passes") {
                match passes.as_u32() {
                    Some(1..=2) => {}
                    _ => return Err(bad("passes", "must be 1 or 2".into())),
                }
            }
        }
        StageFamily::RemoveResponse => {
            if let Some(limits) = descriptor
                .params
                .get("freq_limits")
                .and_then(|v| v.as_list())
            {
                if limits.len() != 4 || !limits.windows(2).all(|w| w[0] < w[1]) {
                    return Err(bad(
                        "freq_limits",
                        "must be four strictly increasing frequencies".into(),
                    ));
                }
            }
        }
        StageFamily::TimeNormalize => {
            if let Some(half_width) = float("half_width_s") {
                if !(half_width > 0.0) {
                    return Err(bad("half_width_s", format!("{half_width} must be positive")));
                }
            }
        }
        StageFamily::CrossCorrelate => {
            if let Some(max_lag) = float("max_lag_s") {
                if !(max_lag > 0.0) {
                    return Err(bad("max_lag_s", format!("{max_lag} must be positive")));
                }
            }
        }
        _ => {}
    }
    Ok(())
}

pub fn load_catalog(path: &Path) -> Result<DatasetCatalog, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(toml::from_str(&content)?)
}
