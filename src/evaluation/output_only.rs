//! Output-Only evaluation
//!
//! Nothing runs: the contestant-supplied file is the output and goes straight
//! to the checker. A file the contestant never provided is a WrongAnswer,
//! not an infrastructure failure.

use std::path::PathBuf;

use anyhow::Result;
use async_trait::async_trait;

use super::{EvaluationResult, TaskDataEvaluator};
use crate::checker::{check_output, Checker};
use crate::model::TaskData;
use crate::verdict::Verdict;

pub struct OutputOnlyEvaluator {
    pub task_root: PathBuf,
    pub submission_root: PathBuf,
    pub checker: Checker,
}

#[async_trait]
impl TaskDataEvaluator for OutputOnlyEvaluator {
    async fn evaluate(&self, data: &TaskData) -> Result<EvaluationResult> {
        let judge_path = self.task_root.join(&data.judge_file_name);
        let output_path = self.submission_root.join(&data.judge_file_name);

        if !output_path.exists() {
            return Ok(EvaluationResult {
                verdict: Verdict::WrongAnswer,
                score_raw: 0.0,
                running_time_ms: 0,
                running_memory_byte: 0,
            });
        }

        let check = check_output(&self.checker, &self.task_root, None, &judge_path, &output_path)
            .await;

        Ok(EvaluationResult {
            verdict: check.verdict,
            score_raw: check.score_raw,
            running_time_ms: 0,
            running_memory_byte: 0,
        })
    }
}
