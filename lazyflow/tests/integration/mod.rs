mod backoff_test;
mod cancellation_test;
mod enumerable_test;
mod feed_test;
mod parallel_test;
