//! Communication evaluation
//!
//! Two sandboxed processes run concurrently: the contestant program and the
//! task's communicator script, cross-wired so the contestant's stdout feeds
//! the communicator's stdin and vice versa. The communicator alone sees the
//! hidden input and judge files; it writes the output the checker later
//! reads. Both structured results are read only after both processes have
//! exited.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;

use super::{ContestantProgram, EvaluationResult, TaskDataEvaluator};
use crate::checker::{check_output, Checker};
use crate::compile::script_language;
use crate::config::get_config;
use crate::model::{CompiledScript, TaskData, TaskLimits};
use crate::sandbox::{BoxPool, DirMount, RunLimits, RunOutcome, SandboxSession, SandboxSpec};
use crate::verdict::Verdict;

pub struct CommunicationEvaluator {
    pub boxes: Arc<BoxPool>,
    pub task_root: PathBuf,
    pub output_root: PathBuf,
    pub submission_root: PathBuf,
    pub contestant: ContestantProgram,
    pub communicator: CompiledScript,
    pub checker: Checker,
    pub limits: TaskLimits,
}

#[async_trait]
impl TaskDataEvaluator for CommunicationEvaluator {
    async fn evaluate(&self, data: &TaskData) -> Result<EvaluationResult> {
        let contestant_session = SandboxSession::acquire(&self.boxes).await?;
        let communicator_session = match SandboxSession::acquire(&self.boxes).await {
            Ok(session) => session,
            Err(e) => {
                contestant_session.release().await;
                return Err(e);
            }
        };

        let result = self
            .run_pair(&contestant_session, &communicator_session, data)
            .await;

        contestant_session.release().await;
        communicator_session.release().await;

        let (contestant_run, communicator_run) = result?;

        if let Some(result) = compose_runs(&contestant_run, &communicator_run) {
            return Ok(result);
        }

        // Both sandboxes report Accepted: the checker compares the
        // communicator's declared judge file with what it actually wrote.
        let judge_path = self.task_root.join(&data.judge_file_name);
        let output_path = self.output_root.join(&data.judge_file_name);
        let check = check_output(&self.checker, &self.task_root, None, &judge_path, &output_path)
            .await;

        Ok(EvaluationResult {
            verdict: check.verdict,
            score_raw: check.score_raw,
            running_time_ms: contestant_run.running_time_ms,
            running_memory_byte: contestant_run.running_memory_byte,
        })
    }
}

impl CommunicationEvaluator {
    /// Launch both sides, wait for both exits, read both results.
    async fn run_pair(
        &self,
        contestant_session: &SandboxSession<'_>,
        communicator_session: &SandboxSession<'_>,
        data: &TaskData,
    ) -> Result<(RunOutcome, RunOutcome)> {
        let contestant_spec = self.contestant.sandbox_spec(&self.limits, &self.submission_root);
        let communicator_spec = self.communicator_spec(data)?;

        let mut contestant =
            contestant_session.spawn(&contestant_spec, Stdio::piped(), Stdio::piped())?;

        let contestant_stdout: Stdio = contestant
            .stdout
            .take()
            .context("Contestant stdout missing")?
            .try_into()
            .context("Failed to adopt contestant stdout")?;
        let contestant_stdin: Stdio = contestant
            .stdin
            .take()
            .context("Contestant stdin missing")?
            .try_into()
            .context("Failed to adopt contestant stdin")?;

        let mut communicator =
            communicator_session.spawn(&communicator_spec, contestant_stdout, contestant_stdin)?;

        // When the contestant exits, the communicator is killed immediately.
        // When the communicator exits first, pipe closure lets the contestant
        // finish on its own; the kill is a backstop behind the sandbox's own
        // wall-time limit so total wait stays bounded.
        let config = get_config();
        let grace = Duration::from_millis(self.limits.run_time_ms(config) as u64)
            + Duration::from_secs(config.wall_time_bonus_secs + 1);

        tokio::select! {
            _ = contestant.wait() => {
                let _ = communicator.start_kill();
                let _ = communicator.wait().await;
            }
            _ = communicator.wait() => {
                if tokio::time::timeout(grace, contestant.wait()).await.is_err() {
                    let _ = contestant.start_kill();
                    let _ = contestant.wait().await;
                }
            }
        }

        Ok((
            contestant_session.outcome().await,
            communicator_session.outcome().await,
        ))
    }

    fn communicator_spec(&self, data: &TaskData) -> Result<SandboxSpec> {
        let config = get_config();
        let language = script_language(&self.communicator)?;

        let input_name = data
            .input_file_name
            .as_deref()
            .context("Communication test data without an input file")?;

        let memory_limit_byte = config.judge_memory_limit_kb * 1000;
        let mut argv =
            language.run_command(&self.communicator.exe_name, "/task", memory_limit_byte);
        argv.push(format!("/task/{}", input_name));
        argv.push(format!("/task/{}", data.judge_file_name));
        argv.push(format!("/output/{}", data.judge_file_name));

        Ok(SandboxSpec {
            argv,
            limits: RunLimits {
                time_ms: config.judge_time_limit_ms,
                memory_kb: config.judge_memory_limit_kb + language.run_bonus_memory_byte / 1000,
                processes: language.run_processes,
            },
            mounts: vec![
                DirMount::read_only("/task", &self.task_root),
                DirMount::writable("/output", &self.output_root),
            ],
            chdir: "/task".to_string(),
        })
    }
}

/// Verdict composition for a finished pair; `None` means both sides are
/// Accepted and the checker decides.
///
/// A communicator failure is always JudgeFailed: communicator bugs must never
/// be attributed to the contestant.
fn compose_runs(contestant: &RunOutcome, communicator: &RunOutcome) -> Option<EvaluationResult> {
    if communicator.verdict != Verdict::Accepted {
        return Some(EvaluationResult {
            verdict: Verdict::JudgeFailed,
            score_raw: 0.0,
            running_time_ms: contestant.running_time_ms,
            running_memory_byte: contestant.running_memory_byte,
        });
    }

    match contestant.verdict {
        Verdict::Accepted => None,
        _ => Some(EvaluationResult::from_run(contestant)),
    }
}
