//! Catch-up orchestration over an ordered strategy chain.
//!
//! Each task walks the strategies in fixed order until one succeeds.
//! A strategy is attempted fully, including its own internal retries,
//! and never re-entered for the same task. Failure is reported only
//! after the whole chain is exhausted.

use crate::catchup::strategy::{CatchupRequest, CatchupStrategy, CatchupSummary};
use crate::defaults;
use crate::error::{Result, StreamcapError};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{info, warn};

/// Task lifecycle. Strategy indices are zero-based positions in the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatchupStatus {
    Pending,
    TryingStrategy(usize),
    Succeeded,
    ExhaustedFailed,
}

/// Progress side effect emitted after each strategy transition. The
/// orchestrator renders nothing; an external UI layer consumes these.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressUpdate {
    pub task_id: String,
    pub stage: String,
    pub percent: u8,
    pub message: String,
}

/// Snapshot of one tracked task.
#[derive(Debug, Clone)]
pub struct CatchupTask {
    pub task_id: String,
    pub request: CatchupRequest,
    pub status: CatchupStatus,
    /// Strategy names in attempt order.
    pub history: Vec<String>,
    pub started_at: Instant,
}

/// Outcome of a completed catch-up run.
#[derive(Debug, Clone)]
pub struct CatchupReport {
    pub task_id: String,
    /// Strategy names in attempt order, ending with the one that succeeded.
    pub history: Vec<String>,
    pub summary: CatchupSummary,
}

/// Runs catch-up requests through the strategy chain and tracks tasks.
pub struct CatchupOrchestrator {
    strategies: Vec<Arc<dyn CatchupStrategy>>,
    tasks: Mutex<HashMap<String, CatchupTask>>,
    staleness: Duration,
    progress: Option<mpsc::UnboundedSender<ProgressUpdate>>,
    next_task: std::sync::atomic::AtomicU64,
}

impl CatchupOrchestrator {
    /// Creates an orchestrator over a fixed, ordered strategy chain.
    pub fn new(strategies: Vec<Arc<dyn CatchupStrategy>>) -> Self {
        Self {
            strategies,
            tasks: Mutex::new(HashMap::new()),
            staleness: defaults::CATCHUP_STALENESS,
            progress: None,
            next_task: std::sync::atomic::AtomicU64::new(1),
        }
    }

    /// Overrides the staleness window after which leaked tasks are dropped.
    pub fn with_staleness(mut self, staleness: Duration) -> Self {
        self.staleness = staleness;
        self
    }

    /// Attaches a progress channel.
    pub fn with_progress(mut self, progress: mpsc::UnboundedSender<ProgressUpdate>) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Runs one catch-up request to a terminal state.
    ///
    /// Validation failures return before any strategy runs or any task is
    /// tracked. Any strategy failure, capacity signals included, moves to
    /// the next strategy; the error surfaces only once the chain is
    /// exhausted, naming the last strategy attempted.
    pub async fn run(&self, request: CatchupRequest) -> Result<CatchupReport> {
        request.validate()?;
        if self.strategies.is_empty() {
            return Err(StreamcapError::StrategiesExhausted {
                strategy: "none".to_string(),
                message: "no strategies configured".to_string(),
            });
        }

        let task_id = self.register_task(&request);
        self.emit_progress(&task_id, "queued", 0, "Task accepted");
        info!(task_id, url = %request.source_url, minutes = request.duration_minutes, "catch-up started");

        let total = self.strategies.len();
        let mut last_error: Option<(String, StreamcapError)> = None;

        for (index, strategy) in self.strategies.iter().enumerate() {
            let name = strategy.name().to_string();
            self.update_task(&task_id, |task| {
                task.status = CatchupStatus::TryingStrategy(index);
                task.history.push(name.clone());
            });
            let percent = (10 + index * 80 / total) as u8;
            self.emit_progress(&task_id, &name, percent, &format!("Trying {name}"));

            match strategy.attempt(&request).await {
                Ok(summary) => {
                    let history = self.finish_task(&task_id, CatchupStatus::Succeeded);
                    self.emit_progress(&task_id, &name, 100, "Summary ready");
                    info!(task_id, strategy = %name, "catch-up succeeded");
                    return Ok(CatchupReport {
                        task_id,
                        history,
                        summary,
                    });
                }
                Err(err) => {
                    warn!(task_id, strategy = %name, %err, "strategy failed, moving on");
                    last_error = Some((name, err));
                }
            }
        }

        self.finish_task(&task_id, CatchupStatus::ExhaustedFailed);
        let (strategy, err) = last_error.unwrap_or_else(|| {
            (
                "none".to_string(),
                StreamcapError::Other("empty strategy chain".to_string()),
            )
        });
        self.emit_progress(&task_id, &strategy, 0, "All strategies failed");
        Err(StreamcapError::StrategiesExhausted {
            strategy,
            message: err.to_string(),
        })
    }

    /// Lists currently tracked tasks, dropping any past the staleness
    /// window first.
    pub fn active_tasks(&self) -> Vec<CatchupTask> {
        self.prune_stale();
        self.tasks
            .lock()
            .map(|tasks| tasks.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Drops tasks older than the staleness window regardless of state.
    pub fn prune_stale(&self) {
        let now = Instant::now();
        if let Ok(mut tasks) = self.tasks.lock() {
            tasks.retain(|task_id, task| {
                let keep = now.duration_since(task.started_at) < self.staleness;
                if !keep {
                    warn!(task_id, "dropping stale catch-up task");
                }
                keep
            });
        }
    }

    fn register_task(&self, request: &CatchupRequest) -> String {
        let sequence = self
            .next_task
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        let task_id = format!("catchup-{sequence}");
        let task = CatchupTask {
            task_id: task_id.clone(),
            request: request.clone(),
            status: CatchupStatus::Pending,
            history: Vec::new(),
            started_at: Instant::now(),
        };
        if let Ok(mut tasks) = self.tasks.lock() {
            tasks.insert(task_id.clone(), task);
        }
        task_id
    }

    fn update_task(&self, task_id: &str, update: impl FnOnce(&mut CatchupTask)) {
        if let Ok(mut tasks) = self.tasks.lock()
            && let Some(task) = tasks.get_mut(task_id)
        {
            update(task);
        }
    }

    /// Marks the terminal state and removes the task from tracking,
    /// returning its recorded history.
    fn finish_task(&self, task_id: &str, status: CatchupStatus) -> Vec<String> {
        self.tasks
            .lock()
            .ok()
            .and_then(|mut tasks| tasks.remove(task_id))
            .map(|mut task| {
                task.status = status;
                task.history
            })
            .unwrap_or_default()
    }

    fn emit_progress(&self, task_id: &str, stage: &str, percent: u8, message: &str) {
        if let Some(progress) = &self.progress {
            let _ = progress.send(ProgressUpdate {
                task_id: task_id.to_string(),
                stage: stage.to_string(),
                percent,
                message: message.to_string(),
            });
        }
    }
}
