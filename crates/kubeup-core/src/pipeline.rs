//! Ordered, fail-fast execution of provisioning steps.
//!
//! The pipeline is a batch job: no retries, no rollback of prior steps.
//! Operator intervention is the recovery path, and every step's guard makes
//! a re-run cheap.

use crate::error::Result;
use crate::host::HostContext;
use crate::runner::CommandRunner;
use crate::step::Step;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Instant;

// ---------------------------------------------------------------------------
// PipelineState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PipelineState {
    Pending,
    Running { step: usize },
    Succeeded,
    Failed { step: usize },
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StepOutcome {
    Ran { duration_ms: u64 },
    Skipped { reason: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    pub name: String,
    #[serde(flatten)]
    pub outcome: StepOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub pipeline: String,
    pub state: PipelineState,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub steps: Vec<StepReport>,
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

pub struct Pipeline {
    pub name: String,
    pub steps: Vec<Step>,
}

impl Pipeline {
    pub fn new(name: impl Into<String>, steps: Vec<Step>) -> Self {
        Self {
            name: name.into(),
            steps,
        }
    }

    /// Execute every step in order. Transitions:
    /// Pending → Running(0); Running(i) → Running(i+1) on success (or
    /// Succeeded when i is last); Running(i) → Failed(i) on failure,
    /// which is terminal: the error propagates and later steps never run.
    pub fn run(&self, host: &HostContext, runner: &dyn CommandRunner) -> Result<RunReport> {
        let started_at = Utc::now();
        let total = self.steps.len();
        let mut state = PipelineState::Pending;
        let mut reports = Vec::with_capacity(total);
        tracing::debug!(?state, pipeline = %self.name, "pipeline created");

        for (i, step) in self.steps.iter().enumerate() {
            state = PipelineState::Running { step: i };
            tracing::debug!(?state, "transition");

            if let Some(guard) = &step.guard {
                if guard.holds(host, runner)? {
                    let reason = guard.describe();
                    tracing::info!("[{}/{total}] {} (skipped: {reason})", i + 1, step.name);
                    reports.push(StepReport {
                        name: step.name.clone(),
                        outcome: StepOutcome::Skipped { reason },
                    });
                    continue;
                }
            }

            tracing::info!("[{}/{total}] {}", i + 1, step.name);
            let start = Instant::now();
            if let Err(e) = step.execute(runner) {
                state = PipelineState::Failed { step: i };
                tracing::error!(?state, "step '{}' failed", step.name);
                return Err(e);
            }
            reports.push(StepReport {
                name: step.name.clone(),
                outcome: StepOutcome::Ran {
                    duration_ms: start.elapsed().as_millis() as u64,
                },
            });
        }

        state = PipelineState::Succeeded;
        tracing::debug!(?state, "transition");
        Ok(RunReport {
            pipeline: self.name.clone(),
            state,
            started_at,
            finished_at: Utc::now(),
            steps: reports,
        })
    }
}
