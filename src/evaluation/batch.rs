//! Batch evaluation
//!
//! One sandboxed run of the contestant program with the test input wired to
//! stdin and stdout captured to a file; on an Accepted run the checker
//! compares the produced output against the judge file.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;

use super::{ContestantProgram, EvaluationResult, TaskDataEvaluator};
use crate::checker::{check_output, Checker};
use crate::model::{TaskData, TaskLimits};
use crate::sandbox::{BoxPool, SandboxSession};
use crate::verdict::Verdict;

pub struct BatchEvaluator {
    pub boxes: Arc<BoxPool>,
    pub task_root: PathBuf,
    pub output_root: PathBuf,
    pub submission_root: PathBuf,
    pub contestant: ContestantProgram,
    pub checker: Checker,
    pub limits: TaskLimits,
}

#[async_trait]
impl TaskDataEvaluator for BatchEvaluator {
    async fn evaluate(&self, data: &TaskData) -> Result<EvaluationResult> {
        let input_name = data
            .input_file_name
            .as_deref()
            .context("Batch test data without an input file")?;
        let input_path = self.task_root.join(input_name);
        let judge_path = self.task_root.join(&data.judge_file_name);
        let output_path = self.output_root.join(&data.judge_file_name);

        let input_file = std::fs::File::open(&input_path)
            .with_context(|| format!("Failed to open input file {:?}", input_path))?;
        let output_file = std::fs::File::create(&output_path)
            .with_context(|| format!("Failed to create output file {:?}", output_path))?;

        let spec = self.contestant.sandbox_spec(&self.limits, &self.submission_root);

        let session = SandboxSession::acquire(&self.boxes).await?;
        let run = session
            .run(&spec, Stdio::from(input_file), Stdio::from(output_file))
            .await;
        session.release().await;
        let run = run?;

        if run.verdict != Verdict::Accepted {
            return Ok(EvaluationResult::from_run(&run));
        }

        let check = check_output(
            &self.checker,
            &self.task_root,
            Some(&input_path),
            &judge_path,
            &output_path,
        )
        .await;

        Ok(EvaluationResult {
            verdict: check.verdict,
            score_raw: check.score_raw,
            running_time_ms: run.running_time_ms,
            running_memory_byte: run.running_memory_byte,
        })
    }
}
