use lazyflow::concurrency::cancellation::{CancellationToken, ChildMode};
use lazyflow::concurrency::timer::{Cancelable, TimeoutOutcome, cancelable, cancelable_timeout};
use lazyflow::test_utils::TimedWait;
use lazyflow_telemetry::tracing::init_test_tracing;
use std::time::Duration;

#[tokio::test]
async fn linked_child_follows_parent_test() {
    init_test_tracing();
    let parent = CancellationToken::new();
    let child = parent.create_child(ChildMode::Linked);
    let grandchild = child.create_child(ChildMode::Linked);

    let waiter = tokio::spawn(grandchild.cancelled());

    parent.set();

    assert!(child.is_set());
    assert!(grandchild.is_set());
    TimedWait::new().wait(waiter).await.unwrap();
}

#[tokio::test]
async fn independent_child_ignores_parent_test() {
    init_test_tracing();
    let parent = CancellationToken::new();
    let child = parent.create_child(ChildMode::Independent);

    parent.set();
    assert!(!child.is_set());

    child.set();
    assert!(child.is_set());
}

#[tokio::test]
async fn setting_a_child_never_sets_the_parent_test() {
    init_test_tracing();
    let parent = CancellationToken::new();
    let child = parent.create_child(ChildMode::Linked);

    child.set();
    child.set();

    assert!(child.is_set());
    assert!(!parent.is_set());
}

#[tokio::test(start_paused = true)]
async fn waits_end_early_on_cancellation_test() {
    init_test_tracing();
    let token = CancellationToken::new();
    let setter = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        setter.set();
    });

    let outcome = cancelable_timeout(Duration::from_secs(60), Some(&token)).await;
    assert_eq!(outcome, TimeoutOutcome::Cancelled);

    let outcome = cancelable(
        tokio::time::sleep(Duration::from_secs(60)),
        &token.create_child(ChildMode::Linked),
    )
    .await;
    assert_eq!(outcome, Cancelable::Cancelled);
}
