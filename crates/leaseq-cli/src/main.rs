use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tokio::net::TcpListener;

use leaseq_core::app::{HandlerError, MessageHandler, QueueProcessor, QueueProcessorSettings};
use leaseq_core::domain::{
    ItemId, LeaseId, MessageProcessingResult, Payload, QueueName, ReleaseOutcome,
};
use leaseq_core::impls::{InMemoryQueueStore, RemoteQueueClient};
use leaseq_core::observability::init_tracing;
use leaseq_core::ports::QueueStore;
use leaseq_core::service;

#[derive(Parser, Debug)]
#[command(name = "leaseq", version, about = "Lease-based at-least-once work queue")]
struct Cli {
    /// Log filter (overrides RUST_LOG)
    #[arg(long, global = true)]
    log: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the leasing service
    Serve {
        #[arg(long, env = "LEASEQ_BIND", default_value = "127.0.0.1:7070")]
        bind: SocketAddr,
        /// Queues declared at startup
        #[arg(long = "queue", env = "LEASEQ_QUEUES", value_delimiter = ',')]
        queues: Vec<String>,
    },
    /// Add an item
    Add {
        #[command(flatten)]
        remote: Remote,
        queue: String,
        data: String,
    },
    /// Lease one item and print it
    Lease {
        #[command(flatten)]
        remote: Remote,
        queue: String,
        #[arg(long, default_value_t = 30_000)]
        lease_ms: u64,
    },
    /// Resolve a lease
    Release {
        #[command(flatten)]
        remote: Remote,
        id: ItemId,
        lease_id: LeaseId,
        #[arg(value_enum)]
        outcome: OutcomeArg,
        /// Requeue delay
        #[arg(long, default_value_t = 0)]
        delay_ms: u64,
    },
    /// Print queue counts
    Stats {
        #[command(flatten)]
        remote: Remote,
        queue: String,
    },
    /// Drain a queue, logging every payload
    Work {
        #[command(flatten)]
        remote: Remote,
        queue: String,
        /// Processor settings (TOML); flags below override it
        #[arg(long)]
        settings: Option<PathBuf>,
        #[arg(long)]
        threads: Option<usize>,
        #[arg(long)]
        lock_ms: Option<u64>,
        #[arg(long)]
        sleep_ms: Option<u64>,
        #[arg(long)]
        retry_ms: Option<u64>,
    },
}

#[derive(Args, Debug)]
struct Remote {
    /// Leasing service base URL
    #[arg(long, env = "LEASEQ_URL", default_value = "http://127.0.0.1:7070")]
    url: String,
}

impl Remote {
    fn client(&self) -> Result<RemoteQueueClient> {
        RemoteQueueClient::new(&self.url).context("building http client")
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutcomeArg {
    Commit,
    DeadLetter,
    Requeue,
}

impl OutcomeArg {
    fn into_outcome(self, delay_ms: u64) -> ReleaseOutcome {
        match self {
            OutcomeArg::Commit => ReleaseOutcome::Commit,
            OutcomeArg::DeadLetter => ReleaseOutcome::DeadLetter,
            OutcomeArg::Requeue => ReleaseOutcome::requeue_after(Duration::from_millis(delay_ms)),
        }
    }
}

/// Handler used by `work`: prints each payload.
/// - `fail` → Retry
/// - `bad` → BadMessage
struct EchoHandler;

#[async_trait]
impl MessageHandler for EchoHandler {
    async fn handle(&self, payload: Payload) -> Result<MessageProcessingResult, HandlerError> {
        Ok(match payload.as_str() {
            "fail" => {
                tracing::info!("asked to fail, retrying later");
                MessageProcessingResult::Retry
            }
            "bad" => MessageProcessingResult::BadMessage,
            other => {
                println!("{other}");
                MessageProcessingResult::Success
            }
        })
    }
}

fn queue_name(raw: &str) -> Result<QueueName> {
    QueueName::new(raw).with_context(|| format!("invalid queue name {raw:?}"))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log.as_deref());

    match cli.command {
        Command::Serve { bind, queues } => serve(bind, queues).await,
        Command::Add {
            remote,
            queue,
            data,
        } => {
            let id = remote.client()?.add(&queue_name(&queue)?, Payload::new(data)).await?;
            println!("{id}");
            Ok(())
        }
        Command::Lease {
            remote,
            queue,
            lease_ms,
        } => {
            let leased = remote
                .client()?
                .lease(&queue_name(&queue)?, Duration::from_millis(lease_ms))
                .await?;
            match leased {
                Some(item) => print_json(&item),
                None => {
                    eprintln!("queue {queue} has nothing to lease");
                    Ok(())
                }
            }
        }
        Command::Release {
            remote,
            id,
            lease_id,
            outcome,
            delay_ms,
        } => {
            remote
                .client()?
                .release(id, lease_id, outcome.into_outcome(delay_ms))
                .await?;
            println!("released {id}");
            Ok(())
        }
        Command::Stats { remote, queue } => {
            let stats = remote.client()?.stats(&queue_name(&queue)?).await?;
            print_json(&stats)
        }
        Command::Work {
            remote,
            queue,
            settings,
            threads,
            lock_ms,
            sleep_ms,
            retry_ms,
        } => {
            let mut s = match settings {
                Some(path) => QueueProcessorSettings::from_file(&path)
                    .with_context(|| format!("loading {}", path.display()))?,
                None => QueueProcessorSettings::default(),
            };
            if let Some(n) = threads {
                s = s.with_threads(n);
            }
            if let Some(ms) = lock_ms {
                s = s.with_lock_duration(Duration::from_millis(ms));
            }
            if let Some(ms) = sleep_ms {
                s = s.with_sleep_time(Duration::from_millis(ms));
            }
            if let Some(ms) = retry_ms {
                s = s.with_retry_delay(Duration::from_millis(ms));
            }
            work(remote.client()?, queue, s).await
        }
    }
}

async fn serve(bind: SocketAddr, queues: Vec<String>) -> Result<()> {
    let store = InMemoryQueueStore::new();
    for raw in queues.iter().map(|q| q.trim()).filter(|q| !q.is_empty()) {
        store.create_queue(&queue_name(raw)?).await?;
    }
    let listener = TcpListener::bind(bind)
        .await
        .with_context(|| format!("binding {bind}"))?;
    service::serve(listener, Arc::new(store), shutdown_signal()).await?;
    tracing::info!("leasing service stopped");
    Ok(())
}

async fn work(client: RemoteQueueClient, queue: String, settings: QueueProcessorSettings) -> Result<()> {
    if !client.health().await.unwrap_or(false) {
        tracing::warn!(url = client.base_url(), "service is not answering yet, workers will keep polling");
    }

    let handle = QueueProcessor::new(Arc::new(client), queue, settings, EchoHandler)?.start();
    shutdown_signal().await;

    // in-flight items are released before the workers exit
    let stats = handle.shutdown_and_join().await;
    print_json(&stats)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "could not listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
