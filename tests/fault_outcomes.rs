use std::sync::Arc;
use tally::store::memory::MemoryStore;
use tally::{CounterWorkload, TallyConfig, TallyErrorCode, Worker};

const COUNTER: &str = "faulty";

struct Rig {
    store: Arc<MemoryStore>,
    workload: Arc<CounterWorkload<MemoryStore>>,
}

/// Builds a workload with an elected, idle aggregator so that the returned
/// worker always runs the plain append path.
async fn rig(config: TallyConfig) -> (Rig, Worker<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let workload =
        Arc::new(CounterWorkload::new(Arc::clone(&store), config, COUNTER).expect("workload"));
    workload.setup().await.expect("setup");

    let mut aggregator = workload.open_worker("agg").expect("open agg");
    assert!(aggregator.increment(0).await.is_ok());
    assert!(aggregator.is_aggregator());
    aggregator.close();

    let worker = workload.open_worker("w1").expect("open worker");
    (Rig { store, workload }, worker)
}

async fn total(workload: &CounterWorkload<MemoryStore>) -> i64 {
    workload
        .open_worker("observer")
        .expect("open observer")
        .read()
        .await
        .ok()
        .expect("read total")
}

#[tokio::test]
async fn rejected_write_is_a_definite_failure() {
    let (rig, mut worker) = rig(TallyConfig::default()).await;

    rig.store.reject_next_write("malformed query");
    let outcome = worker.increment(5).await;
    let err = outcome.error().expect("failed outcome");
    assert_eq!(err.code(), TallyErrorCode::StoreRejected);
    assert!(!outcome.is_indeterminate(), "rejection definitely did not apply");

    assert_eq!(total(&rig.workload).await, 0);
}

#[tokio::test]
async fn lost_ack_write_is_indeterminate_and_may_have_applied() {
    let (rig, mut worker) = rig(TallyConfig::default()).await;

    rig.store.timeout_next_write(true);
    let outcome = worker.increment(5).await;
    assert!(outcome.is_indeterminate());
    assert_eq!(
        outcome.error().expect("error").code(),
        TallyErrorCode::StoreTimeout
    );

    // The "maybe" was a yes this time; only the ack was lost.
    assert_eq!(total(&rig.workload).await, 5);
}

#[tokio::test]
async fn timed_out_write_that_never_applied_is_also_indeterminate() {
    let (rig, mut worker) = rig(TallyConfig::default()).await;

    rig.store.timeout_next_write(false);
    let outcome = worker.increment(5).await;
    assert!(outcome.is_indeterminate());

    assert_eq!(total(&rig.workload).await, 0);
}

#[tokio::test]
async fn unavailable_replicas_make_reads_indeterminate() {
    let (rig, worker) = rig(TallyConfig::default()).await;

    rig.store.unavailable_next_read("1 of 3 replicas responded");
    let outcome = worker.read().await;
    assert!(outcome.is_indeterminate());
    assert_eq!(
        outcome.error().expect("error").code(),
        TallyErrorCode::StoreUnavailable
    );
}

#[tokio::test]
async fn fragmented_read_is_diagnostic_only_by_default() {
    let (rig, mut worker) = rig(TallyConfig::default()).await;
    assert!(worker.increment(3).await.is_ok());

    rig.store.fragment_next_read();
    let outcome = worker.read().await;
    assert_eq!(outcome.ok(), Some(3), "flagged, logged, not failed");
}

#[tokio::test]
async fn fragmented_read_fails_the_operation_when_configured() {
    let config = TallyConfig {
        fail_on_fragmented_read: true,
        ..TallyConfig::default()
    };
    let (rig, mut worker) = rig(config).await;
    assert!(worker.increment(3).await.is_ok());

    rig.store.fragment_next_read();
    let outcome = worker.read().await;
    assert!(!outcome.is_ok());
    assert!(!outcome.is_indeterminate(), "violation is a definite failure");
    assert_eq!(
        outcome.error().expect("error").code(),
        TallyErrorCode::PagedPartitionRead
    );
}

#[tokio::test]
async fn indeterminate_fold_that_applied_did_so_as_one_unit() {
    let (rig, mut worker) = rig(TallyConfig::default()).await;
    assert!(worker.increment(2).await.is_ok());
    assert!(worker.increment(3).await.is_ok());

    let mut aggregator = rig.workload.open_worker("agg").expect("reopen agg");
    assert!(aggregator.is_aggregator());
    rig.store.timeout_next_write(true);
    let outcome = aggregator.increment(1).await;
    assert!(outcome.is_indeterminate());
    assert_eq!(total(&rig.workload).await, 6, "fold applied as one unit");
}

#[tokio::test]
async fn indeterminate_fold_that_never_applied_left_rows_untouched() {
    let (rig, mut worker) = rig(TallyConfig::default()).await;
    assert!(worker.increment(2).await.is_ok());

    let mut aggregator = rig.workload.open_worker("agg").expect("reopen agg");
    rig.store.timeout_next_write(false);
    let outcome = aggregator.increment(1).await;
    assert!(outcome.is_indeterminate());
    assert_eq!(total(&rig.workload).await, 2, "nothing folded, nothing lost");
}

#[tokio::test]
async fn cumulative_read_modify_write_honors_the_fragmentation_guard() {
    let config = TallyConfig {
        fail_on_fragmented_read: true,
        ..TallyConfig::cumulative()
    };
    let store = Arc::new(MemoryStore::new());
    let workload =
        Arc::new(CounterWorkload::new(Arc::clone(&store), config, COUNTER).expect("workload"));
    workload.setup().await.expect("setup");

    let mut worker = workload.open_worker("w1").expect("open");
    assert!(worker.increment(1).await.is_ok());

    store.fragment_next_read();
    let outcome = worker.increment(1).await;
    assert!(!outcome.is_ok());
    assert!(!outcome.is_indeterminate(), "violation is a definite failure");
    assert_eq!(
        outcome.error().expect("error").code(),
        TallyErrorCode::PagedPartitionRead
    );

    // The guard fired on the read, before anything was written back.
    assert_eq!(total(&workload).await, 1);
}

#[tokio::test]
async fn construction_rejects_invalid_inputs() {
    let store = Arc::new(MemoryStore::new());

    let bad_config = TallyConfig {
        replication_factor: 0,
        ..TallyConfig::default()
    };
    let err = CounterWorkload::new(Arc::clone(&store), bad_config, COUNTER)
        .err()
        .expect("invalid config");
    assert_eq!(err.code(), TallyErrorCode::InvalidConfig);

    let err = CounterWorkload::new(Arc::clone(&store), TallyConfig::default(), "")
        .err()
        .expect("empty counter id");
    assert_eq!(err.code(), TallyErrorCode::InvalidCounterId);

    let workload =
        CounterWorkload::new(store, TallyConfig::default(), COUNTER).expect("workload");
    let err = workload.open_worker("").err().expect("empty worker id");
    assert_eq!(err.code(), TallyErrorCode::InvalidWorkerId);
    let err = workload
        .open_worker("summary")
        .err()
        .expect("sentinel worker id");
    assert_eq!(err.code(), TallyErrorCode::InvalidWorkerId);
}
