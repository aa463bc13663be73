// crates/noisecc-core/src/catalog.rs
//
// The enumerated set of (family, method) operator pairs and their parameter
// schemas. Pure data; descriptors are validated against this table when a
// plan is built, never at call time.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

/// Disjoint operator families; one configured step belongs to exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageFamily {
    Detrend,
    Taper,
    Cut,
    Decimate,
    Bandpass,
    RemoveResponse,
    WriteHeader,
    TimeNormalize,
    Whiten,
    CrossCorrelate,
}

/// Algorithmic variants within a family. The valid combinations are listed
/// in [`CATALOG`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    Demean,
    Linear,
    Hann,
    FillZero,
    Fir,
    Butterworth,
    Polezero,
    StationCoordinates,
    OneBit,
    RunningMean,
    TimeDomain,
    Spectral,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    FloatList(Vec<f64>),
}

impl ParamValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Float(value) => Some(*value),
            ParamValue::Int(value) => Some(*value as f64),
            _ => None,
        }
    }

    pub fn as_u32(&self) -> Option<u32> {
        match self {
            ParamValue::Int(value) => u32::try_from(*value).ok(),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[f64]> {
        match self {
            ParamValue::FloatList(values) => Some(values),
            _ => None,
        }
    }
}

pub type ParamMap = BTreeMap<String, ParamValue>;

/// One configured transformation step. Immutable once constructed; only the
/// validated configuration loader produces these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperatorDescriptor {
    pub family: StageFamily,
    pub method: Method,
    #[serde(default)]
    pub params: ParamMap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Float,
    Int,
    FloatList,
}

#[derive(Debug, Clone, Copy)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
    pub required: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct OperatorSpec {
    pub family: StageFamily,
    pub method: Method,
    pub params: &'static [ParamSpec],
    pub description: &'static str,
}

static CATALOG: Lazy<Vec<OperatorSpec>> = Lazy::new(|| {
    use Method::*;
    use ParamKind::*;
    use StageFamily::*;

    vec![
        OperatorSpec {
            family: Detrend,
            method: Demean,
            params: &[],
            description: "Remove the mean",
        },
        OperatorSpec {
            family: Detrend,
            method: Linear,
            params: &[],
            description: "Remove a least-squares straight line",
        },
        OperatorSpec {
            family: Taper,
            method: Hann,
            params: &[ParamSpec {
                name: "width",
                kind: Float,
                required: false,
            }],
            description: "Hann taper at both ends",
        },
        OperatorSpec {
            family: Cut,
            method: FillZero,
            params: &[
                ParamSpec {
                    name: "begin_s",
                    kind: Float,
                    required: true,
                },
                ParamSpec {
                    name: "end_s",
                    kind: Float,
                    required: true,
                },
            ],
            description: "Cut to a window, zero-filling outside the data",
        },
        OperatorSpec {
            family: Decimate,
            method: Fir,
            params: &[ParamSpec {
                name: "target_hz",
                kind: Float,
                required: true,
            }],
            description: "Anti-aliased decimation to a target rate",
        },
        OperatorSpec {
            family: Bandpass,
            method: Butterworth,
            params: &[
                ParamSpec {
                    name: "low_hz",
                    kind: Float,
                    required: true,
                },
                ParamSpec {
                    name: "high_hz",
                    kind: Float,
                    required: true,
                },
                ParamSpec {
                    name: "poles",
                    kind: Int,
                    required: false,
                },
                ParamSpec {
                    name: "passes",
                    kind: Int,
                    required: false,
                },
            ],
            description: "Zero-phase Butterworth band-pass",
        },
        OperatorSpec {
            family: RemoveResponse,
            method: Polezero,
            params: &[
                ParamSpec {
                    name: "freq_limits",
                    kind: FloatList,
                    required: true,
                },
                ParamSpec {
                    name: "water_level_db",
                    kind: Float,
                    required: false,
                },
            ],
            description: "Instrument response removal from a pole-zero file",
        },
        OperatorSpec {
            family: WriteHeader,
            method: StationCoordinates,
            params: &[],
            description: "Stamp station coordinates from the catalog",
        },
        OperatorSpec {
            family: TimeNormalize,
            method: OneBit,
            params: &[],
            description: "One-bit temporal normalization",
        },
        OperatorSpec {
            family: TimeNormalize,
            method: RunningMean,
            params: &[ParamSpec {
                name: "half_width_s",
                kind: Float,
                required: true,
            }],
            description: "Running-absolute-mean temporal normalization",
        },
        OperatorSpec {
            family: Whiten,
            method: Spectral,
            params: &[
                ParamSpec {
                    name: "low_hz",
                    kind: Float,
                    required: true,
                },
                ParamSpec {
                    name: "high_hz",
                    kind: Float,
                    required: true,
                },
            ],
            description: "Spectral whitening over a band",
        },
        OperatorSpec {
            family: CrossCorrelate,
            method: TimeDomain,
            params: &[ParamSpec {
                name: "max_lag_s",
                kind: Float,
                required: false,
            }],
            description: "Normalized station-pair cross-correlation",
        },
    ]
});

pub fn all_operator_specs() -> &'static [OperatorSpec] {
    CATALOG.as_slice()
}

pub fn lookup(family: StageFamily, method: Method) -> Option<&'static OperatorSpec> {
    CATALOG
        .iter()
        .find(|spec| spec.family == family && spec.method == method)
}

impl OperatorSpec {
    pub fn name(&self) -> String {
        format!("{:?}/{:?}", self.family, self.method)
    }

    /// Schema check for a descriptor: required parameters present, every
    /// supplied parameter known and of the declared kind.
    pub fn validate(&self, descriptor: &OperatorDescriptor) -> Result<(), ConfigError> {
        for spec in self.params {
            match descriptor.params.get(spec.name) {
                None if spec.required => {
                    return Err(ConfigError::MissingParam {
                        operator: self.name(),
                        param: spec.name,
                    });
                }
                None => {}
                Some(value) => {
                    let ok = match spec.kind {
                        ParamKind::Float => value.as_f64().is_some(),
                        ParamKind::Int => matches!(value, ParamValue::Int(_)),
                        ParamKind::FloatList => value.as_list().is_some(),
                    };
                    if !ok {
                        return Err(ConfigError::BadParam {
                            operator: self.name(),
                            param: spec.name.to_string(),
                            reason: format!("expected {:?}", spec.kind),
                        });
                    }
                }
            }
        }
        for supplied in descriptor.params.keys() {
            if !self.params.iter().any(|spec| spec.name == supplied) {
                return Err(ConfigError::BadParam {
                    operator: self.name(),
                    param: supplied.clone(),
                    reason: "unknown parameter".into(),
                });
            }
        }
        Ok(())
    }
}
