use lazyflow::combinators::RetryDecision;
use lazyflow::test_utils::{TimedWait, jittered_delay};
use lazyflow::{Enumerable, ErrorKind, Mode, ParallelConfig, Sequence, seq_error};
use lazyflow_telemetry::tracing::init_test_tracing;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[tokio::test]
async fn retry_reprocesses_then_skips_silently_test() {
    init_test_tracing();
    let attempts = Arc::new(Mutex::new(HashMap::<i64, usize>::new()));
    let counter = attempts.clone();

    let processed = Enumerable::new(Sequence::range(1, 3))
        .retry(
            false,
            |_, _, _| RetryDecision::Retry,
            move |item, _| {
                let mut attempts = counter.lock().unwrap();
                let attempt = attempts.entry(item).or_default();
                *attempt += 1;

                if item == 2 && *attempt == 1 {
                    return Err(seq_error!(ErrorKind::OperationFailed, "transient failure"));
                }
                Ok(item)
            },
        )
        .to_vec()
        .await
        .unwrap();

    assert_eq!(processed, vec![1, 2, 3]);
    assert_eq!(attempts.lock().unwrap()[&2], 2);
}

#[tokio::test]
async fn retry_gives_up_without_failing_test() {
    init_test_tracing();
    let processed = Enumerable::new(Sequence::range(1, 3))
        .retry(
            false,
            |_, _, _| RetryDecision::GiveUp,
            |item, _| {
                if item == 2 {
                    return Err(seq_error!(ErrorKind::OperationFailed, "permanent failure"));
                }
                Ok(item)
            },
        )
        .to_vec()
        .await
        .unwrap();

    assert_eq!(processed, vec![1, 3]);

    let err = Enumerable::new(Sequence::range(1, 3))
        .retry(
            true,
            |_, _, _| RetryDecision::GiveUp,
            |item, _| {
                if item == 2 {
                    return Err(seq_error!(ErrorKind::OperationFailed, "permanent failure"));
                }
                Ok(item)
            },
        )
        .to_vec()
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::OperationFailed);
}

#[tokio::test(flavor = "multi_thread")]
async fn mixed_pipeline_test() {
    init_test_tracing();
    let config = ParallelConfig::default();

    let pipeline = Enumerable::from_iter(1..=1000u64)
        .filter(|item, _| Ok(item % 3 != 0))
        .parallel_map_with(&config, |item, index| async move {
            tokio::time::sleep(jittered_delay(index)).await;
            Ok(item * 2)
        })
        .unwrap()
        .buffer(16)
        .unwrap()
        .batch(100)
        .unwrap();

    assert_eq!(pipeline.mode(), Mode::Async);

    let batches = TimedWait::new().wait(pipeline.to_vec()).await.unwrap();
    let flattened = batches.into_iter().flatten().collect::<Vec<_>>();
    let expected = (1..=1000u64)
        .filter(|item| item % 3 != 0)
        .map(|item| item * 2)
        .collect::<Vec<_>>();

    assert_eq!(flattened, expected);
}

#[tokio::test]
async fn sync_pipeline_never_suspends_test() {
    init_test_tracing();
    let pipeline = Enumerable::from_iter(vec![5, 3, 9, 1, 3])
        .distinct(|item| *item)
        .sort()
        .pairwise()
        .map(|(left, right), _| Ok(right - left));

    assert_eq!(pipeline.mode(), Mode::Sync);

    let iter = pipeline.into_sequence().try_into_iter().unwrap();
    let gaps = iter.collect::<Result<Vec<_>, _>>().unwrap();
    assert_eq!(gaps, vec![2, 2, 4]);
}

#[tokio::test(flavor = "multi_thread")]
async fn parallel_filter_and_group_test() {
    init_test_tracing();
    let filtered = Enumerable::from_iter(1..=100u32)
        .parallel_filter(8, true, |item, _| {
            let keep = item % 10 == 0;
            async move { Ok(keep) }
        })
        .unwrap();

    let groups = TimedWait::new().wait(filtered.parallel_group(4, |item, _| {
        let key = if *item > 50 { "high" } else { "low" };
        async move { Ok(key) }
    }))
    .await
    .unwrap();

    assert_eq!(groups["low"], vec![10, 20, 30, 40, 50]);
    assert_eq!(groups["high"], vec![60, 70, 80, 90, 100]);
}
