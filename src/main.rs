//! CLI demo for openmq
//!
//! Enqueues a batch of email jobs, then works through them against a fake
//! email service that fails some of the time. Failed sends are retried until
//! they land in the dead-letter queue, which is printed at the end.

use std::io::ErrorKind;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use openmq::config::{Settings, load_config};
use openmq::utils::logging;
use openmq::{Consumer, Delivery, QueueError, QueueManager, ReplayMode};
use rand::Rng;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "openmq", about = "Embedded message queue demo: a flaky email worker")]
struct Args {
    /// Append every enqueue to the durability log
    #[arg(long)]
    persistent: bool,
    /// Durability log location (default: openmq.log)
    #[arg(long)]
    log_path: Option<String>,
    /// Replay the durability log before enqueueing new jobs
    #[arg(long)]
    replay: bool,
    /// Skip malformed log lines during replay instead of failing
    #[arg(long)]
    lenient: bool,
    /// Topic the jobs are sent to
    #[arg(long)]
    topic: Option<String>,
    /// Number of email jobs to enqueue
    #[arg(long)]
    jobs: Option<usize>,
    /// Probability in [0, 1] that a send fails
    #[arg(long)]
    failure_rate: Option<f64>,
    /// Pause between deliveries, in milliseconds
    #[arg(long)]
    interval_ms: Option<u64>,
}

impl Args {
    fn apply(self, settings: &mut Settings) {
        settings.queue.persistent |= self.persistent;
        settings.queue.replay_on_start |= self.replay;
        settings.queue.lenient_replay |= self.lenient;
        if let Some(path) = self.log_path {
            settings.queue.log_path = path;
        }
        if let Some(topic) = self.topic {
            settings.demo.topic = topic;
        }
        if let Some(jobs) = self.jobs {
            settings.demo.jobs = jobs;
        }
        if let Some(rate) = self.failure_rate {
            settings.demo.failure_rate = rate;
        }
        if let Some(ms) = self.interval_ms {
            settings.demo.interval_ms = ms;
        }
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let mut settings = match load_config() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };
    args.apply(&mut settings);
    logging::init(&settings.logging);

    tokio::select! {
        result = run(settings) => {
            if let Err(e) = result {
                error!("Demo failed: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received. Exiting.");
        }
    }
}

async fn run(settings: Settings) -> Result<(), Box<dyn std::error::Error>> {
    let manager = Arc::new(QueueManager::from_settings(&settings.queue));
    let demo = &settings.demo;

    if settings.queue.replay_on_start {
        let mode = if settings.queue.lenient_replay {
            ReplayMode::Lenient
        } else {
            ReplayMode::Strict
        };
        match manager.replay_with(&settings.queue.log_path, mode) {
            Ok(report) => info!(applied = report.applied, "replayed previous jobs"),
            Err(QueueError::Io(e)) if e.kind() == ErrorKind::NotFound => {
                info!(path = %settings.queue.log_path, "no durability log to replay");
            }
            Err(e) => return Err(e.into()),
        }
    }

    info!("Enqueueing {} email jobs...", demo.jobs);
    for i in 1..=demo.jobs {
        manager.enqueue(&demo.topic, format!("email #{i} - Welcome to openmq!"), None);
    }

    let consumer = Consumer::new(Arc::clone(&manager), &demo.topic);
    let failure_rate = failure_probability(demo.failure_rate);
    let interval = Duration::from_millis(demo.interval_ms);

    loop {
        let delivery = consumer.process_next(|msg| {
            info!(payload = %msg.payload, "processing");
            send_email(&msg.payload, failure_rate)
        })?;

        match delivery {
            Delivery::Idle => {
                info!("No more messages in queue.");
                break;
            }
            Delivery::Acked(msg) => info!(id = %msg.id, "email sent, acked"),
            Delivery::Requeued(msg) => {
                warn!(id = %msg.id, retry_count = msg.retry_count, "email failed, nacked");
            }
            Delivery::DeadLettered(msg) => {
                warn!(id = %msg.id, retry_count = msg.retry_count, "email failed for good");
            }
        }

        tokio::time::sleep(interval).await;
    }

    println!("\nDEAD LETTER QUEUE:");
    for msg in manager.dead_letters(&demo.topic) {
        println!("Failed message (retries={}): {}", msg.retry_count, msg.payload);
    }
    if manager.log_failures() > 0 {
        warn!(failures = manager.log_failures(), "some enqueues were not persisted");
    }

    Ok(())
}

/// Clamps a configured rate into `[0, 1]`; NaN means "never fail".
fn failure_probability(rate: f64) -> f64 {
    if rate.is_nan() {
        return 0.0;
    }
    rate.clamp(0.0, 1.0)
}

/// Stand-in for a downstream email service.
fn send_email(payload: &str, failure_rate: f64) -> Result<(), String> {
    if rand::thread_rng().gen_bool(failure_rate) {
        return Err(format!("email service failed to send: {payload}"));
    }
    Ok(())
}
