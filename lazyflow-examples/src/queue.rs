//! In-memory job queue consumed through poll loops.

use futures::StreamExt;
use futures::future;
use lazyflow::concurrency::cancellation::CancellationToken;
use lazyflow::concurrency::poll::backoff_generator;
use lazyflow::{BackoffConfig, ErrorKind, SeqResult, Sequence, bail};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Unit of work stored in a [`JobQueue`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub id: u64,
    pub payload: String,
}

#[derive(Debug, Default)]
struct QueueState {
    next_id: u64,
    ready: VecDeque<Job>,
    in_flight: HashMap<u64, Job>,
}

/// A FIFO queue with acknowledgement.
///
/// Dequeued jobs stay in flight until acknowledged. Clones share the same queue.
#[derive(Debug, Clone, Default)]
pub struct JobQueue {
    state: Arc<Mutex<QueueState>>,
}

impl JobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends a job and returns its id.
    pub fn enqueue(&self, payload: impl Into<String>) -> u64 {
        let mut state = self.lock();
        let id = state.next_id;
        state.next_id += 1;
        state.ready.push_back(Job {
            id,
            payload: payload.into(),
        });

        id
    }

    pub fn dequeue(&self) -> Option<Job> {
        self.dequeue_many(1).pop()
    }

    /// Takes up to `max` jobs off the queue and marks them as in flight.
    pub fn dequeue_many(&self, max: usize) -> Vec<Job> {
        let mut state = self.lock();
        let count = max.min(state.ready.len());
        let jobs = state.ready.drain(..count).collect::<Vec<_>>();
        for job in &jobs {
            state.in_flight.insert(job.id, job.clone());
        }

        jobs
    }

    /// Completes an in-flight job. Returns `false` if the id is unknown.
    pub fn acknowledge(&self, id: u64) -> bool {
        self.lock().in_flight.remove(&id).is_some()
    }

    pub fn ready_len(&self) -> usize {
        self.lock().ready.len()
    }

    pub fn in_flight_len(&self) -> usize {
        self.lock().in_flight.len()
    }

    /// Returns a sequence of jobs that polls the queue until `token` is set.
    ///
    /// Polls that find the queue empty back off according to `config`.
    pub fn consumer(
        &self,
        config: BackoffConfig,
        token: &CancellationToken,
    ) -> SeqResult<Sequence<Job>> {
        let queue = self.clone();
        let jobs = backoff_generator(config, token)?.filter_map(move |signal| {
            let job = queue.dequeue();
            if job.is_none() {
                signal.backoff();
            }
            future::ready(job)
        });

        Ok(Sequence::from_stream(jobs))
    }

    /// Like [`JobQueue::consumer`] but yields up to `size` jobs per poll.
    pub fn batch_consumer(
        &self,
        size: usize,
        config: BackoffConfig,
        token: &CancellationToken,
    ) -> SeqResult<Sequence<Vec<Job>>> {
        if size == 0 {
            bail!(
                ErrorKind::InvalidArgument,
                "Batch size must be greater than 0"
            );
        }

        let queue = self.clone();
        let batches = backoff_generator(config, token)?.filter_map(move |signal| {
            let jobs = queue.dequeue_many(size);
            if jobs.is_empty() {
                signal.backoff();
                return future::ready(None);
            }
            future::ready(Some(jobs))
        });

        Ok(Sequence::from_stream(batches))
    }
}
