// crates/noisecc-core/src/executor.rs
//
// Per-file stage executor: runs one file through an ordered operator plan
// with strict fail-fast short-circuiting. The same executor drives both the
// conditioning and the per-trace processing stage.

use std::path::Path;

use tracing::{info, warn};

use crate::error::Result;
use crate::operators::{OperatorContext, Plan};
use crate::types::TraceName;

pub struct StageExecutor<'a> {
    pub context: OperatorContext<'a>,
}

impl<'a> StageExecutor<'a> {
    pub fn new(context: OperatorContext<'a>) -> Self {
        Self { context }
    }

    /// Apply every operator in order. The first error stops the remaining
    /// operators — even ones unrelated to the failure — and the target file
    /// is deleted so no partial artifact survives.
    pub fn execute(&self, plan: &Plan, path: &Path, identity: &TraceName) -> Result<()> {
        let outcome = self.run_operators(plan, path, identity);
        if let Err(error) = &outcome {
            warn!(file = %identity, %error, "pipeline aborted, removing output");
            if path.exists() {
                let _ = std::fs::remove_file(path);
            }
        }
        outcome
    }

    fn run_operators(&self, plan: &Plan, path: &Path, identity: &TraceName) -> Result<()> {
        for (step, operator) in plan.ops.iter().enumerate() {
            info!(file = %identity, step, operator = operator.name(), "applying");
            operator.apply(&self.context, path, identity)?;
        }
        Ok(())
    }
}
