//! Job queue example.
//!
//! A producer enqueues jobs at a steady pace while a consumer polls the queue in batches,
//! backing off while it is empty, and processes the jobs with bounded concurrency. The run
//! ends once every job has been acknowledged or when Ctrl+C is pressed.

use clap::Parser;
use lazyflow::concurrency::cancellation::{CancellationToken, ChildMode};
use lazyflow::{BackoffConfig, Enumerable, ParallelConfig};
use lazyflow_config::{Config, Environment, load_config_from};
use lazyflow_telemetry::tracing::init_tracing;
use rand::Rng;
use serde::Deserialize;
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

mod queue;

use queue::JobQueue;

#[derive(Debug, Parser)]
#[command(name = "job-queue", version, about)]
struct Args {
    /// Number of jobs the producer enqueues.
    #[arg(long, default_value = "200")]
    jobs: u64,

    /// Delay between two enqueued jobs, in milliseconds.
    #[arg(long, default_value = "5")]
    produce_interval_ms: u64,

    /// Upper bound of the simulated processing time of a job, in milliseconds.
    #[arg(long, default_value = "50")]
    max_work_ms: u64,

    /// Directory holding `base.yaml` and the environment overrides.
    #[arg(long, default_value = "configuration")]
    config_dir: PathBuf,
}

#[derive(Debug, Deserialize)]
struct ExampleConfig {
    #[serde(default = "default_batch_size")]
    batch_size: usize,
    #[serde(default)]
    backoff: BackoffConfig,
    #[serde(default)]
    parallel: ParallelConfig,
}

impl Config for ExampleConfig {}

fn default_batch_size() -> usize {
    16
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let _log_flusher = init_tracing("job-queue")?;

    main_impl().await
}

async fn main_impl() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    let environment = Environment::load()?;
    let config: ExampleConfig = load_config_from(&args.config_dir, environment)?;
    config.backoff.validate()?;
    config.parallel.validate()?;

    info!(
        jobs = args.jobs,
        batch_size = config.batch_size,
        concurrency = config.parallel.concurrency,
        %environment,
        "starting job queue example"
    );

    let token = CancellationToken::new();
    let shutdown = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("received Ctrl+C, stopping");
            shutdown.set();
        }
    });

    let queue = JobQueue::new();
    let producer = tokio::spawn(produce(
        queue.clone(),
        args.jobs,
        Duration::from_millis(args.produce_interval_ms),
        token.create_child(ChildMode::Linked),
    ));

    let processed = Arc::new(AtomicU64::new(0));
    let consumer_token = token.create_child(ChildMode::Linked);
    let jobs = Enumerable::new(queue.batch_consumer(
        config.batch_size,
        config.backoff.clone(),
        &consumer_token,
    )?)
    .map_many(|batch, _| Ok(batch));

    let (queue_ref, processed_ref) = (queue.clone(), processed.clone());
    let total = args.jobs;
    let max_work_ms = args.max_work_ms.max(1);
    jobs.parallel_for_each(config.parallel.concurrency, move |job, _| {
        let queue = queue_ref.clone();
        let processed = processed_ref.clone();
        let consumer_token = consumer_token.clone();
        let work = Duration::from_millis(rand::rng().random_range(0..max_work_ms));

        async move {
            tokio::time::sleep(work).await;
            if !queue.acknowledge(job.id) {
                warn!(job_id = job.id, "job was acknowledged twice");
            }

            let done = processed.fetch_add(1, Ordering::SeqCst) + 1;
            debug!(job_id = job.id, payload = %job.payload, done, "job processed");
            if done == total {
                consumer_token.set();
            }

            Ok(())
        }
    })
    .await?;

    let produced = producer.await?;
    info!(
        produced,
        processed = processed.load(Ordering::SeqCst),
        left_in_queue = queue.ready_len(),
        "job queue example finished"
    );

    Ok(())
}

/// Enqueues `count` jobs, one every `interval`, unless `token` is set first.
async fn produce(
    queue: JobQueue,
    count: u64,
    interval: Duration,
    token: CancellationToken,
) -> u64 {
    let enqueued = Enumerable::from_iter(0..count)
        .throttle(interval)
        .take_while(move |_, _| Ok(!token.is_set()))
        .reduce(0, |enqueued, index, _| {
            queue.enqueue(format!("job-{index}"));
            Ok(enqueued + 1)
        })
        .await;

    match enqueued {
        Ok(enqueued) => enqueued,
        Err(err) => {
            warn!(error = %err, "producer stopped early");
            0
        }
    }
}
