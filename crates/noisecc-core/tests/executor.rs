use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use noisecc_core::catalog::{Method, OperatorDescriptor, StageFamily};
use noisecc_core::engine::NativeEngine;
use noisecc_core::error::{PipelineError, Result};
use noisecc_core::executor::StageExecutor;
use noisecc_core::operators::{build_plan, Operator, OperatorContext, Plan};
use noisecc_core::resolver::MetadataResolver;
use noisecc_core::types::{StationIndex, TraceName};

struct CountingOp {
    calls: Arc<AtomicUsize>,
    fail: bool,
}

impl Operator for CountingOp {
    fn name(&self) -> &'static str {
        "counting"
    }

    fn apply(&self, _cx: &OperatorContext<'_>, _path: &Path, _id: &TraceName) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            Err(PipelineError::Fragmentation("injected failure".into()))
        } else {
            Ok(())
        }
    }
}

#[test]
fn failure_short_circuits_and_removes_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("24061000000_AAA.BHZ");
    std::fs::write(&target, b"stub").unwrap();

    let calls = Arc::new(AtomicUsize::new(0));
    let plan = Plan {
        ops: vec![
            Box::new(CountingOp { calls: calls.clone(), fail: false }),
            Box::new(CountingOp { calls: calls.clone(), fail: true }),
            Box::new(CountingOp { calls: calls.clone(), fail: false }),
        ],
        skipped: 0,
    };

    let engine = NativeEngine;
    let resolver = MetadataResolver::new(dir.path(), None);
    let stations = StationIndex::new();
    let executor = StageExecutor::new(OperatorContext {
        engine: &engine,
        resolver: &resolver,
        stations: &stations,
    });

    let identity = TraceName::parse("24061000000_AAA.BHZ", "24061000000").unwrap();
    let result = executor.execute(&plan, &target, &identity);

    assert!(result.is_err());
    // The third operator never ran.
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    // No partial artifact survives.
    assert!(!target.exists());
}

#[test]
fn all_operators_run_when_nothing_fails() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("24061000000_AAA.BHZ");
    std::fs::write(&target, b"stub").unwrap();

    let calls = Arc::new(AtomicUsize::new(0));
    let plan = Plan {
        ops: vec![
            Box::new(CountingOp { calls: calls.clone(), fail: false }),
            Box::new(CountingOp { calls: calls.clone(), fail: false }),
        ],
        skipped: 0,
    };

    let engine = NativeEngine;
    let resolver = MetadataResolver::new(dir.path(), None);
    let stations = StationIndex::new();
    let executor = StageExecutor::new(OperatorContext {
        engine: &engine,
        resolver: &resolver,
        stations: &stations,
    });

    let identity = TraceName::parse("24061000000_AAA.BHZ", "24061000000").unwrap();
    executor.execute(&plan, &target, &identity).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(target.exists());
}

#[test]
fn build_plan_skips_trailing_cross_correlate() {
    let descriptors = vec![
        OperatorDescriptor {
            family: StageFamily::Detrend,
            method: Method::Demean,
            params: Default::default(),
        },
        OperatorDescriptor {
            family: StageFamily::CrossCorrelate,
            method: Method::TimeDomain,
            params: Default::default(),
        },
    ];
    let plan = build_plan(&descriptors).unwrap();
    assert_eq!(plan.ops.len(), 1);
    assert_eq!(plan.skipped, 1);
}
