//! Evaluation strategies
//!
//! One strategy per task kind, each consuming a single test case and
//! producing a normalized `EvaluationResult`. The aggregation engine picks
//! the strategy with an exhaustive match on the task kind.

pub mod batch;
pub mod communication;
pub mod output_only;

use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;

use crate::config::get_config;
use crate::languages::LanguageSpec;
use crate::model::{TaskData, TaskLimits};
use crate::sandbox::{DirMount, RunLimits, RunOutcome, SandboxSpec};
use crate::verdict::Verdict;

pub use batch::BatchEvaluator;
pub use communication::CommunicationEvaluator;
pub use output_only::OutputOnlyEvaluator;

/// Normalized result of evaluating one test case.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationResult {
    pub verdict: Verdict,
    /// Fractional score in [0, 1]; scaled by the subtask's score_max later
    pub score_raw: f64,
    pub running_time_ms: i64,
    pub running_memory_byte: i64,
}

impl EvaluationResult {
    /// Policy outcome for a test inside a poisoned or compile-failed subtask.
    pub fn skipped() -> Self {
        Self {
            verdict: Verdict::Skipped,
            score_raw: 0.0,
            running_time_ms: 0,
            running_memory_byte: 0,
        }
    }

    pub fn judge_failed() -> Self {
        Self {
            verdict: Verdict::JudgeFailed,
            score_raw: 0.0,
            running_time_ms: 0,
            running_memory_byte: 0,
        }
    }

    /// A run that never reached the checker scores zero.
    pub fn from_run(run: &RunOutcome) -> Self {
        Self {
            verdict: run.verdict,
            score_raw: 0.0,
            running_time_ms: run.running_time_ms,
            running_memory_byte: run.running_memory_byte,
        }
    }
}

/// Strategy interface: evaluate one test case.
#[async_trait]
pub trait TaskDataEvaluator: Send + Sync {
    async fn evaluate(&self, data: &TaskData) -> Result<EvaluationResult>;
}

/// The contestant's compiled program plus everything needed to build its
/// sandbox spec.
pub struct ContestantProgram {
    pub language: LanguageSpec,
    pub exe_name: String,
}

impl ContestantProgram {
    /// Sandbox spec for one contestant run: submission root mounted at
    /// /submission, task limits plus the language's runtime headroom.
    pub fn sandbox_spec(&self, limits: &TaskLimits, submission_root: &Path) -> SandboxSpec {
        let config = get_config();
        let memory_limit_byte = limits
            .memory_limit_byte
            .unwrap_or(config.run_memory_limit_kb * 1000);

        SandboxSpec {
            argv: self
                .language
                .run_command(&self.exe_name, "/submission", memory_limit_byte),
            limits: RunLimits {
                time_ms: limits.run_time_ms(config),
                memory_kb: limits.run_memory_kb(config)
                    + self.language.run_bonus_memory_byte / 1000,
                processes: self.language.run_processes,
            },
            mounts: vec![DirMount::read_only("/submission", submission_root)],
            chdir: "/submission".to_string(),
        }
    }
}
