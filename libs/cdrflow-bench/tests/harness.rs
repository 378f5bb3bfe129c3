use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use cdrflow_api::{CallRecord, StageConfig};
use cdrflow_bench::{BenchError, BenchOptions, run_benchmark, run_benchmark_with_sink};
use cdrflow_engine::{
    RunContext, Topology, TopologyConfig, TopologyKind, WorkerPool, recv_or_cancel, send_or_cancel,
};

const DEADLINE: Duration = Duration::from_secs(30);

fn stage_config() -> StageConfig {
    StageConfig { rate_zone_keys: 1_000, ..StageConfig::instant() }
}

fn options(iterations: u64) -> BenchOptions {
    BenchOptions {
        iterations,
        sample_interval: Duration::from_millis(1),
        seed: Some(42),
        validate: true,
    }
}

/// Applies every stage like a one-worker pool, then lets `fault` tamper with
/// the record. A `None` from `fault` drops the record.
struct Faulty<F> {
    fault: F,
}

impl<F> Topology for Faulty<F>
where
    F: Fn(CallRecord) -> Option<CallRecord> + Clone + Send + Sync + 'static,
{
    fn name(&self) -> &'static str {
        "faulty"
    }

    fn describe(&self) -> String {
        "single worker with injected fault".into()
    }

    fn start(&self, ctx: &RunContext, mut input: mpsc::Receiver<CallRecord>) -> mpsc::Receiver<CallRecord> {
        let (tx, rx) = mpsc::channel(1);
        let stages = ctx.stages.clone();
        let token = ctx.token.clone();
        let fault = self.fault.clone();
        ctx.spawn(async move {
            while let Some(mut record) = recv_or_cancel(&mut input, &token).await {
                stages.apply_all(&mut record).await;
                let Some(record) = fault(record) else { continue };
                if !send_or_cancel(&tx, record, &token).await {
                    break;
                }
            }
        });
        rx
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_every_topology_completes_a_validated_run() {
    let mut cfg = TopologyConfig::default();
    for kind in TopologyKind::ALL {
        cfg.set_workers(kind, 8);
    }

    for kind in TopologyKind::ALL {
        let topology = cfg.build(kind).unwrap();
        let report = tokio::time::timeout(
            DEADLINE,
            run_benchmark(topology.as_ref(), &stage_config(), &options(500), &CancellationToken::new()),
        )
        .await
        .expect("benchmark hung")
        .unwrap_or_else(|e| panic!("{kind} failed: {e}"));

        assert_eq!(report.topology, kind.as_str());
        assert_eq!(report.iterations, 500);
        assert!(report.validated);
        assert!(report.throughput > 0.0);
        assert!(report.peak_concurrency >= 1);
        // no counting allocator in the test binary
        assert_eq!(report.arch_mem_bytes, 0);
        assert_eq!(report.bytes_per_op, 0);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_pool_peak_is_its_worker_count() {
    let pool = WorkerPool::new(4, 1);
    let report = run_benchmark(&pool, &stage_config(), &options(200), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(report.peak_concurrency, 4);
    assert!(report.concurrency_samples >= 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_semaphore_peak_is_bounded_by_permits() {
    let mut cfg = TopologyConfig::default();
    cfg.semaphore.permits = 3;
    let topology = cfg.build(TopologyKind::Semaphore).unwrap();
    let report = run_benchmark(topology.as_ref(), &stage_config(), &options(300), &CancellationToken::new())
        .await
        .unwrap();
    // a finished record task is untracked slightly after its permit is released
    assert!(report.peak_concurrency < 20, "peak {}", report.peak_concurrency);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_sink_sees_every_record() {
    let pool = WorkerPool::new(4, 1);
    let seen = AtomicU64::new(0);
    let report = run_benchmark_with_sink(&pool, &stage_config(), &options(100), &CancellationToken::new(), |record| {
        assert!(record.is_enriched());
        seen.fetch_add(1, Ordering::Relaxed);
    })
    .await
    .unwrap();
    assert_eq!(seen.load(Ordering::Relaxed), 100);
    assert_eq!(report.iterations, 100);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_zero_iterations() {
    let pool = WorkerPool::new(2, 1);
    let report = run_benchmark(&pool, &stage_config(), &options(0), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(report.iterations, 0);
    assert_eq!(report.throughput, 0.0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_dropped_record_is_data_loss() {
    let topology = Faulty {
        fault: |record: CallRecord| (record.call_id != "UUID-3").then_some(record),
    };
    let mut opts = options(10);
    opts.validate = false;

    let err = run_benchmark(&topology, &stage_config(), &opts, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, BenchError::DataLoss { sent: 10, received: 9 }), "{err}");
    assert_eq!(err.to_string(), "data loss detected! sent 10, received 9");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_duplicated_record_is_rejected() {
    let topology = Faulty {
        fault: |mut record: CallRecord| {
            if record.call_id == "UUID-5" {
                record.call_id = "UUID-4".into();
            }
            Some(record)
        },
    };
    let err = run_benchmark(&topology, &stage_config(), &options(10), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, BenchError::Duplicate { ref call_id } if call_id == "UUID-4"), "{err}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_rewritten_identity_is_rejected() {
    let topology = Faulty {
        fault: |mut record: CallRecord| {
            record.caller_number.push('0');
            Some(record)
        },
    };
    let err = run_benchmark(&topology, &stage_config(), &options(5), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, BenchError::IdentityMismatch { ref call_id } if call_id == "UUID-0"), "{err}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_unenriched_record_is_rejected() {
    let topology = Faulty {
        fault: |mut record: CallRecord| {
            record.home_operator = None;
            Some(record)
        },
    };
    let err = run_benchmark(&topology, &stage_config(), &options(5), &CancellationToken::new())
        .await
        .unwrap_err();
    match err {
        BenchError::Incomplete { missing, .. } => assert_eq!(missing, vec!["home_operator"]),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_cancel_reports_interrupted() {
    let stages = StageConfig {
        home_operator_latency_ms: 5_000,
        ..stage_config()
    };
    let pool = Arc::new(WorkerPool::new(4, 1));
    let token = CancellationToken::new();

    let run = {
        let token = token.clone();
        let pool = pool.clone();
        tokio::spawn(async move { run_benchmark(pool.as_ref(), &stages, &options(1_000), &token).await })
    };

    tokio::time::sleep(Duration::from_millis(100)).await;
    token.cancel();

    let result = tokio::time::timeout(Duration::from_secs(2), run)
        .await
        .expect("benchmark did not stop after cancel")
        .unwrap();
    match result {
        Err(BenchError::Interrupted { received, .. }) => assert_eq!(received, 0),
        other => panic!("unexpected result: {other:?}"),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_cancel_after_last_record_keeps_the_report() {
    let pool = WorkerPool::new(4, 1);
    let token = CancellationToken::new();
    let mut drained = 0u64;

    let report = run_benchmark_with_sink(&pool, &stage_config(), &options(50), &token, |_| {
        drained += 1;
        if drained == 50 {
            token.cancel();
        }
    })
    .await
    .unwrap();

    assert!(token.is_cancelled());
    assert_eq!(report.iterations, 50);
}
