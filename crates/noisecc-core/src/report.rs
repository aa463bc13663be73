// crates/noisecc-core/src/report.rs

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Machine-readable summary of one pipeline run, serialized to JSON when
/// the caller asks for a report file.
#[derive(Debug, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub stages: Vec<StageReport>,
}

impl RunReport {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            stages: Vec::new(),
        }
    }

    pub fn push(&mut self, stage: StageReport) {
        self.stages.push(stage);
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn total_failures(&self) -> usize {
        self.stages.iter().map(|s| s.failures.len()).sum()
    }
}

impl Default for RunReport {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Serialize)]
pub struct StageReport {
    pub stage: String,
    pub processed: usize,
    pub skipped: usize,
    pub failures: Vec<FailureReport>,
    /// Stage-specific counters, e.g. stack contribution counts per pair tag.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub counters: BTreeMap<String, u32>,
}

impl StageReport {
    pub fn new(stage: &str) -> Self {
        Self {
            stage: stage.to_string(),
            processed: 0,
            skipped: 0,
            failures: Vec::new(),
            counters: BTreeMap::new(),
        }
    }

    pub fn record_failure(&mut self, subject: impl Into<String>, error: impl ToString) {
        self.failures.push(FailureReport {
            subject: subject.into(),
            error: error.to_string(),
        });
    }
}

#[derive(Debug, Serialize)]
pub struct FailureReport {
    pub subject: String,
    pub error: String,
}
