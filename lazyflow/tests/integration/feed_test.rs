use lazyflow::combinators::to_vec;
use lazyflow::concurrency::feed::FeedableSequence;
use lazyflow::test_utils::TimedWait;
use lazyflow::{ErrorKind, seq_error};
use lazyflow_telemetry::tracing::init_test_tracing;

#[tokio::test]
async fn fed_items_drain_in_order_test() {
    init_test_tracing();
    let feed = FeedableSequence::new();
    let sequence = feed.consume().unwrap();

    feed.feed("a").unwrap();
    feed.feed("b").unwrap();
    feed.feed("c").unwrap();
    feed.end();

    assert_eq!(TimedWait::new().wait(to_vec(sequence)).await.unwrap(), vec!["a", "b", "c"]);
    assert_eq!(feed.buffer_size(), 0);
    assert_eq!(feed.feed("d").unwrap_err().kind(), ErrorKind::FeedClosed);
}

#[tokio::test]
async fn thrown_error_follows_buffered_items_test() {
    init_test_tracing();
    let feed = FeedableSequence::new();
    let mut sequence = feed.consume().unwrap();

    feed.feed(1).unwrap();
    feed.throw(seq_error!(ErrorKind::SourceFailed, "stream reset"))
        .unwrap();

    assert_eq!(sequence.next().await, Some(Ok(1)));
    assert_eq!(
        sequence.next().await.unwrap().unwrap_err().kind(),
        ErrorKind::SourceFailed
    );
    assert_eq!(sequence.next().await, None);
    assert_eq!(feed.feed(2).unwrap_err().kind(), ErrorKind::FeedClosed);
}

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_producers_lose_nothing_test() {
    init_test_tracing();
    let feed = FeedableSequence::new();
    let sequence = feed.consume().unwrap();

    let producers = (0..4u32)
        .map(|producer| {
            let feed = feed.clone();
            tokio::spawn(async move {
                for item in 0..250u32 {
                    feed.feed(producer * 1000 + item).unwrap();
                    if item % 50 == 0 {
                        tokio::task::yield_now().await;
                    }
                }
            })
        })
        .collect::<Vec<_>>();

    let closer = feed.clone();
    tokio::spawn(async move {
        for producer in producers {
            producer.await.unwrap();
        }
        closer.end();
    });

    let items = TimedWait::new().wait(to_vec(sequence)).await.unwrap();
    assert_eq!(items.len(), 1000);

    // Every producer's items arrive in the order that producer fed them.
    for producer in 0..4u32 {
        let own = items
            .iter()
            .filter(|item| **item / 1000 == producer)
            .collect::<Vec<_>>();
        assert_eq!(own.len(), 250);
        assert!(own.windows(2).all(|pair| pair[0] < pair[1]));
    }
}

#[tokio::test]
async fn producer_paces_itself_on_read_signal_test() {
    init_test_tracing();
    const LIMIT: usize = 3;

    let feed = FeedableSequence::new();
    let mut sequence = feed.consume().unwrap();

    let producer = feed.clone();
    let handle = tokio::spawn(async move {
        let mut peak = 0;
        for item in 0..20 {
            loop {
                let read = producer.read();
                if producer.buffer_size() < LIMIT {
                    break;
                }
                read.await;
            }
            producer.feed(item).unwrap();
            peak = peak.max(producer.buffer_size());
        }
        producer.end();
        peak
    });

    let mut received = Vec::new();
    while let Some(item) = TimedWait::new().wait(sequence.next()).await {
        received.push(item.unwrap());
        tokio::task::yield_now().await;
    }

    let peak = TimedWait::new().wait(handle).await.unwrap();
    assert_eq!(received, (0..20).collect::<Vec<_>>());
    assert!(peak <= LIMIT);
}
