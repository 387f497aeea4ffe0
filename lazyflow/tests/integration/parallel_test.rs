use lazyflow::combinators::{map, to_vec};
use lazyflow::parallel::{parallel_for_each, parallel_group, parallel_map};
use lazyflow::test_utils::{TimedWait, jittered_delay};
use lazyflow::{ErrorKind, Sequence, seq_error};
use lazyflow_telemetry::tracing::init_test_tracing;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

#[tokio::test(flavor = "multi_thread")]
async fn ordered_parallel_map_equals_sequential_map_test() {
    init_test_tracing();
    for concurrency in [1, 2, 7, 32] {
        let parallel = parallel_map(
            Sequence::range(1, 200),
            concurrency,
            true,
            |item, index| async move {
                tokio::time::sleep(jittered_delay(index)).await;
                Ok(item * item)
            },
        )
        .unwrap();
        let sequential = map(Sequence::range(1, 200), |item, _| Ok(item * item));

        let parallel = TimedWait::new().wait(to_vec(parallel)).await.unwrap();
        let sequential = to_vec(sequential).await.unwrap();
        assert_eq!(parallel, sequential, "concurrency {concurrency}");
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn unordered_parallel_map_is_a_permutation_test() {
    init_test_tracing();
    let parallel = parallel_map(Sequence::range(1, 200), 16, false, |item, index| async move {
        tokio::time::sleep(jittered_delay(index)).await;
        Ok(item + 1000)
    })
    .unwrap();

    let mut values = TimedWait::new().wait(to_vec(parallel)).await.unwrap();
    values.sort_unstable();

    assert_eq!(values, (1001..=1200).collect::<Vec<_>>());
}

#[tokio::test(flavor = "multi_thread")]
async fn parallel_group_keeps_dispatch_order_per_key_test() {
    init_test_tracing();
    let groups = TimedWait::new().wait(parallel_group(
        Sequence::from_iter(0..10_000usize),
        8,
        |item, index| {
            let key = item % 4;
            async move {
                if index % 97 == 0 {
                    tokio::task::yield_now().await;
                }
                Ok(key)
            }
        },
    ))
    .await
    .unwrap();

    assert_eq!(groups.len(), 4);
    assert_eq!(groups.values().map(Vec::len).sum::<usize>(), 10_000);

    for (key, items) in &groups {
        assert!(items.iter().all(|item| item % 4 == *key));
        assert!(items.windows(2).all(|pair| pair[0] < pair[1]));
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn worker_failure_is_observed_exactly_once_test() {
    init_test_tracing();
    let mapped = parallel_map(Sequence::range(1, 100), 4, false, |item, _| async move {
        if item == 42 {
            return Err(seq_error!(ErrorKind::OperationFailed, "cannot process 42"));
        }
        Ok(item)
    })
    .unwrap();

    let mut mapped = mapped;
    let mut failures = 0;
    while let Some(result) = TimedWait::new().wait(mapped.next()).await {
        if let Err(err) = result {
            assert_eq!(err.kind(), ErrorKind::OperationFailed);
            failures += 1;
        }
    }

    assert_eq!(failures, 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn parallel_for_each_fails_with_first_error_test() {
    init_test_tracing();
    let processed = Arc::new(AtomicUsize::new(0));
    let counter = processed.clone();

    let err = TimedWait::new().wait(parallel_for_each(
        Sequence::range(1, 50),
        4,
        move |item, _| {
            let counter = counter.clone();
            async move {
                if item == 10 {
                    return Err(seq_error!(ErrorKind::OperationFailed, "job failed"));
                }
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        },
    ))
    .await
    .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::OperationFailed);
    assert!(processed.load(Ordering::SeqCst) < 50);
}

#[tokio::test]
async fn dropping_the_output_stops_dispatching_test() {
    init_test_tracing();
    let dispatched = Arc::new(AtomicUsize::new(0));
    let counter = dispatched.clone();

    let mut mapped = parallel_map(Sequence::from_iter(0..1_000_000u64), 4, true, move |item, _| {
        counter.fetch_add(1, Ordering::SeqCst);
        async move { Ok(item) }
    })
    .unwrap();

    assert_eq!(TimedWait::new().wait(mapped.next()).await, Some(Ok(0)));
    drop(mapped);

    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    let after_drop = dispatched.load(Ordering::SeqCst);
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }

    assert_eq!(dispatched.load(Ordering::SeqCst), after_drop);
    assert!(after_drop < 1_000_000);
}
