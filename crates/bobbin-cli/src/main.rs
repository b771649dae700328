//! bobbin - demo driver for the scheduler.
//!
//! Submits a mixed batch of work, registers a recurring sync, runs for a while
//! and prints the final snapshot as JSON.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::Parser;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::sync::broadcast::error::RecvError;
use tokio::time::sleep;
use tracing::{info, warn};

use bobbin_core::config::duration_serde;
use bobbin_core::{
    Priority, Scheduler, SchedulerConfig, SchedulerEvent, SubmitOptions, TaskContext, TaskError,
    TaskHandler,
};

#[derive(Parser, Debug)]
#[command(name = "bobbin", version, about = "Run the background task scheduler demo")]
struct Cli {
    /// Path to a TOML config file. Defaults are used when omitted.
    #[arg(long, env = "BOBBIN_CONFIG")]
    config: Option<PathBuf>,

    /// How long to let the scheduler run before shutting down (e.g. "5s", "1m").
    #[arg(long, default_value = "5s", value_parser = humantime::parse_duration)]
    run_for: Duration,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AppConfig {
    scheduler: SchedulerConfig,
    demo: DemoConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct DemoConfig {
    /// Notes pushed through filter + scoring.
    notes: usize,
    #[serde(with = "duration_serde::duration")]
    sync_interval: Duration,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            notes: 4,
            sync_interval: Duration::from_secs(1),
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    let Some(path) = path else {
        return Ok(AppConfig::default());
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading config file {}", path.display()))?;
    let config: AppConfig =
        toml::from_str(&raw).with_context(|| format!("parsing config file {}", path.display()))?;
    info!(path = %path.display(), "loaded config");
    Ok(config)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
enum Job {
    FilterContent,
    ScoreQuality,
    SyncNotes,
    Flaky,
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Job::FilterContent => "filter_content",
            Job::ScoreQuality => "score_quality",
            Job::SyncNotes => "sync_notes",
            Job::Flaky => "flaky",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Deserialize)]
struct NotePayload {
    text: String,
}

fn decode<T: for<'de> Deserialize<'de>>(payload: Value) -> Result<T, TaskError> {
    serde_json::from_value(payload).map_err(|e| TaskError::handler(format!("json decode: {e}")))
}

/// Masks blocked words, reporting progress per word.
struct FilterHandler {
    blocked: Vec<String>,
}

#[async_trait]
impl TaskHandler for FilterHandler {
    async fn handle(&self, payload: Value, ctx: TaskContext) -> Result<Value, TaskError> {
        let note: NotePayload = decode(payload)?;
        let words: Vec<&str> = note.text.split_whitespace().collect();
        let mut masked = 0;
        let mut out = Vec::with_capacity(words.len());

        for (i, word) in words.iter().enumerate() {
            if ctx.is_timed_out() {
                return Err(TaskError::handler("stopped after timeout"));
            }
            if self.blocked.iter().any(|b| b.eq_ignore_ascii_case(word)) {
                masked += 1;
                out.push("***".to_string());
            } else {
                out.push((*word).to_string());
            }
            let percent = ((i + 1) * 100 / words.len()) as u8;
            ctx.report_progress(percent, format!("checked {} of {}", i + 1, words.len()));
            sleep(Duration::from_millis(20)).await;
        }

        Ok(json!({ "text": out.join(" "), "masked": masked }))
    }
}

/// Fails a fixed number of times before succeeding.
struct FlakyHandler {
    remaining_failures: AtomicU32,
}

impl FlakyHandler {
    fn new(n: u32) -> Self {
        Self {
            remaining_failures: AtomicU32::new(n),
        }
    }
}

#[async_trait]
impl TaskHandler for FlakyHandler {
    async fn handle(&self, _payload: Value, ctx: TaskContext) -> Result<Value, TaskError> {
        let left = self.remaining_failures.load(Ordering::Relaxed);
        if left > 0 {
            self.remaining_failures.fetch_sub(1, Ordering::Relaxed);
            return Err(TaskError::handler(format!(
                "intentional failure (left={left})"
            )));
        }
        Ok(json!({ "attempt": ctx.attempt() }))
    }
}

fn sample_note(i: usize) -> Value {
    const NOTES: [&str; 3] = [
        "mitochondria is the powerhouse of the cell",
        "this darn quiz about spam and eggs",
        "photosynthesis converts light into chemical energy",
    ];
    json!({ "text": NOTES[i % NOTES.len()] })
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    let scheduler = Scheduler::builder(config.scheduler)
        .handler(
            Job::FilterContent,
            FilterHandler {
                blocked: vec!["darn".to_string(), "spam".to_string()],
            },
        )?
        .handler_fn(Job::ScoreQuality, |payload, _ctx| async move {
            let note: NotePayload = decode(payload)?;
            let words = note.text.split_whitespace().count();
            let score = (words as f64 / 10.0).min(1.0);
            Ok(json!({ "words": words, "score": score }))
        })?
        .handler_fn(Job::SyncNotes, |_payload, ctx| async move {
            tokio::select! {
                _ = sleep(Duration::from_millis(200)) => Ok(json!({ "synced": true })),
                _ = ctx.timed_out() => Err(TaskError::handler("sync abandoned")),
            }
        })?
        .handler(Job::Flaky, FlakyHandler::new(2))?
        .expect_kinds([
            Job::FilterContent,
            Job::ScoreQuality,
            Job::SyncNotes,
            Job::Flaky,
        ])
        .build()?;

    let mut events = scheduler.subscribe();
    let reporter = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(SchedulerEvent::Succeeded(entry)) => {
                    info!(task_id = %entry.id, kind = %entry.kind, summary = %entry.result_summary, "done");
                }
                Ok(SchedulerEvent::Failed(entry)) => {
                    warn!(task_id = %entry.id, kind = %entry.kind, error = %entry.result_summary, "gave up");
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "event reporter lagged"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    for i in 0..config.demo.notes {
        scheduler.submit(Job::FilterContent, sample_note(i), Priority::High)?;
        scheduler.submit(Job::ScoreQuality, sample_note(i), "low")?;
    }
    let flaky = scheduler.submit_with_handle(
        Job::Flaky,
        json!({}),
        Priority::Medium,
        SubmitOptions::new().max_attempts(3),
    )?;
    let schedule = scheduler.register_recurring(
        Job::SyncNotes,
        json!({ "folder": "inbox" }),
        config.demo.sync_interval,
        "low",
    )?;
    info!(schedule_id = %schedule, run_for = ?cli.run_for, "demo running");

    tokio::select! {
        _ = sleep(cli.run_for) => {}
        _ = tokio::signal::ctrl_c() => info!("interrupted"),
    }

    // shutdown で保留中のリトライは捨てられるので、先に待つ
    match tokio::time::timeout(Duration::from_secs(30), flaky.wait()).await {
        Ok(Ok(Ok(value))) => info!(%value, "flaky task recovered"),
        Ok(Ok(Err(err))) => warn!(error = %err, "flaky task failed"),
        Ok(Err(err)) => warn!(error = %err, "flaky task never finished"),
        Err(_) => warn!("gave up waiting for the flaky task"),
    }

    scheduler.shutdown().await;
    let snapshot = scheduler.snapshot();
    drop(scheduler);
    reporter.abort();

    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_config_parses() {
        let config: AppConfig = toml::from_str(include_str!("../bobbin.toml")).unwrap();
        config.scheduler.validate().unwrap();
        assert_eq!(config.scheduler.retry_delay, Duration::from_millis(500));
        assert_eq!(config.scheduler.retry_backoff_multiplier, 2.0);
        assert_eq!(config.demo.notes, 6);
        assert_eq!(config.demo.sync_interval, Duration::from_secs(1));
    }

    #[test]
    fn empty_config_uses_defaults() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config.scheduler, SchedulerConfig::default());
        assert_eq!(config.demo.notes, 4);
    }
}
