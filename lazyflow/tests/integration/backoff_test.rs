use futures::StreamExt;
use lazyflow::BackoffConfig;
use lazyflow::concurrency::backoff::BackoffHelper;
use lazyflow::concurrency::cancellation::CancellationToken;
use lazyflow::concurrency::poll::{PollOutcome, backoff_generator, backoff_loop};
use lazyflow::concurrency::timer::TimeoutOutcome;
use lazyflow_telemetry::tracing::init_test_tracing;
use std::time::Duration;
use tokio::time::Instant;

#[tokio::test(start_paused = true)]
async fn exponential_backoff_sleeps_grow_and_cap_test() {
    init_test_tracing();
    let mut helper = BackoffHelper::new(BackoffConfig::exponential(100, 2.0, 5000)).unwrap();

    let mut sleeps = Vec::new();
    for _ in 0..8 {
        let started = Instant::now();
        assert_eq!(helper.backoff(None).await, TimeoutOutcome::Elapsed);
        sleeps.push(started.elapsed().as_millis() as u64);
    }

    let expected = [100, 200, 400, 800, 1600, 3200, 5000, 5000];
    for (slept, expected) in sleeps.iter().zip(expected) {
        assert!(
            (expected..expected + 10).contains(slept),
            "slept {slept}ms, expected {expected}ms"
        );
    }

    helper.reset();
    assert_eq!(helper.current_delay(), Duration::from_millis(100));
}

#[tokio::test(start_paused = true)]
async fn linear_backoff_adds_increase_test() {
    init_test_tracing();
    let mut helper = BackoffHelper::new(BackoffConfig::linear(100, 100, 350)).unwrap();

    let mut delays = Vec::new();
    for _ in 0..5 {
        delays.push(helper.current_delay().as_millis() as u64);
        helper.backoff(None).await;
    }

    assert_eq!(delays, vec![100, 200, 300, 350, 350]);
}

#[tokio::test(start_paused = true)]
async fn backoff_loop_stops_when_parent_token_is_set_test() {
    init_test_tracing();
    let token = CancellationToken::new();
    let setter = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(1000)).await;
        setter.set();
    });

    let mut polls = 0;
    let started = Instant::now();
    backoff_loop(BackoffConfig::exponential(100, 2.0, 5000), &token, |_| {
        polls += 1;
        async { Ok(PollOutcome::Idle) }
    })
    .await
    .unwrap();

    // Polls at 0, 100, 300, 700; the wait towards 1500 is cut short at 1000.
    assert_eq!(polls, 4);
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(1000));
    assert!(elapsed < Duration::from_millis(1100));
}

#[tokio::test(start_paused = true)]
async fn backoff_generator_interleaves_work_test() {
    init_test_tracing();
    let token = CancellationToken::new();
    let mut signals = backoff_generator(BackoffConfig::exponential(10, 2.0, 1000), &token).unwrap();

    let mut pending_work = vec![3, 0, 0, 2];
    let mut processed = 0;
    while let Some(signal) = signals.next().await {
        match pending_work.pop() {
            Some(0) => signal.backoff(),
            Some(count) => processed += count,
            None => token.set(),
        }
    }

    assert_eq!(processed, 5);
}
