//! batchq - Main Entry Point
//! Reads lines from stdin, batches them through a BatchingWorkQueue and
//! writes every batch to stdout as one JSON line.

mod settings;

use anyhow::{Context, Result};
use serde::Serialize;
use std::io::{BufRead, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use batchq_core::port::ProcessError;
use batchq_core::{BatchingWorkQueue, WorkQueue};
use batchq_infra_memory::ArrayBlockingQueue;
use settings::DaemonSettings;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Serialize)]
struct BatchRecord<'a> {
    batch: u64,
    size: usize,
    items: &'a [String],
}

fn init_logging() -> Result<()> {
    let log_format = std::env::var("BATCHQ_LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("batchq=info"))
        .context("Failed to create env filter")?;

    // Logs go to stderr: stdout carries the batches
    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().pretty().with_writer(std::io::stderr))
                .init();
        }
    }
    Ok(())
}

fn stdout_processor() -> impl Fn(Vec<String>) -> std::result::Result<(), ProcessError> + Send + Sync {
    let batch_counter = AtomicU64::new(0);
    move |items: Vec<String>| {
        let record = BatchRecord {
            batch: batch_counter.fetch_add(1, Ordering::Relaxed) + 1,
            size: items.len(),
            items: &items,
        };
        let mut stdout = std::io::stdout().lock();
        serde_json::to_writer(&mut stdout, &record)?;
        stdout.write_all(b"\n")?;
        stdout.flush()?;
        Ok(())
    }
}

/// Feed stdin lines into the queue until EOF or shutdown
fn produce(queue: &BatchingWorkQueue<String>, settings: &DaemonSettings) -> Result<u64> {
    let mut dropped = 0;
    for line in std::io::stdin().lock().lines() {
        let line = line.context("Failed to read stdin")?;
        match queue.add_timeout(line, settings.offer_timeout()) {
            Ok(true) => {}
            Ok(false) => {
                dropped += 1;
                warn!(
                    queue_name = %queue.name(),
                    offer_timeout_ms = settings.offer_timeout_ms,
                    "Queue full, line dropped"
                );
            }
            Err(e) if e.is_illegal_state() => break,
            Err(e) => return Err(e).context("Failed to enqueue line"),
        }
    }
    Ok(dropped)
}

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize logging
    init_logging()?;
    info!("batchq v{} starting...", VERSION);

    // 2. Load configuration
    let settings = DaemonSettings::load()?;
    let config = Arc::new(settings.queue_config()?);
    info!(
        queue_name = %config.queue_name(),
        capacity = settings.capacity,
        min_batch_size = config.min_batch_size(),
        max_batch_size = config.max_batch_size(),
        "Configuration loaded"
    );

    // 3. Setup dependencies (DI wiring)
    let container: Arc<ArrayBlockingQueue<String>> = Arc::new(if settings.capacity == 0 {
        ArrayBlockingQueue::unbounded()
    } else {
        ArrayBlockingQueue::bounded(settings.capacity).context("Invalid container capacity")?
    });
    let queue = Arc::new(BatchingWorkQueue::new(
        config,
        container,
        Arc::new(stdout_processor()),
    ));

    // 4. Start worker
    queue.start().context("Failed to start queue")?;

    // 5. Producer on a plain thread: a read blocked on stdin must not keep
    // the runtime from exiting after Ctrl+C
    let (done_tx, done_rx) = tokio::sync::oneshot::channel();
    {
        let queue = queue.clone();
        let settings = settings.clone();
        std::thread::Builder::new()
            .name("stdin-reader".to_string())
            .spawn(move || {
                let _ = done_tx.send(produce(&queue, &settings));
            })
            .context("Failed to spawn stdin reader")?;
    }

    // 6. Wait for EOF or shutdown signal
    tokio::select! {
        result = done_rx => {
            let dropped = result.context("stdin reader exited unexpectedly")??;
            info!(dropped, "Input finished");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received. Exiting gracefully...");
        }
    }

    // 7. Graceful shutdown (joins the worker thread)
    let stats = {
        let queue = queue.clone();
        tokio::task::spawn_blocking(move || {
            queue.shutdown();
            queue.stats()
        })
        .await
        .context("Shutdown task failed")?
    };

    info!(
        items_accepted = stats.items_accepted,
        items_rejected = stats.items_rejected,
        batches_processed = stats.batches_processed,
        batch_failures = stats.batch_failures,
        "Shutdown complete."
    );

    Ok(())
}
