//! Task, submission and verdict-tree data model
//!
//! Tasks are loaded once per judgement and treated as immutable. The task
//! kind is a sum type so every traversal point in the judge matches
//! exhaustively; adding a task type is a compiler-checked change.

use crate::config::JudgeConfig;
use crate::verdict::Verdict;

/// A judge-owned script (custom checker or communicator), addressed by the
/// content hash of its source in file storage.
#[derive(Debug, Clone)]
pub struct Script {
    pub language: String,
    pub file_name: String,
    pub file_hash: String,
}

/// A script whose compiled executable name is known. Produced by
/// `compile::compile_script` and threaded explicitly to the evaluators.
#[derive(Debug, Clone)]
pub struct CompiledScript {
    pub language: String,
    pub exe_name: String,
}

/// How contestant output is compared against the judge file.
#[derive(Debug, Clone)]
pub enum CheckerKind {
    LenientDiff,
    Custom(Script),
}

/// Per-task resource limits; `None` falls back to the process-wide defaults.
#[derive(Debug, Clone, Default)]
pub struct TaskLimits {
    pub time_limit_ms: Option<i64>,
    pub memory_limit_byte: Option<i64>,
    pub compile_time_limit_ms: Option<i64>,
    pub compile_memory_limit_byte: Option<i64>,
}

impl TaskLimits {
    pub fn run_time_ms(&self, config: &JudgeConfig) -> i64 {
        self.time_limit_ms.unwrap_or(config.run_time_limit_ms)
    }

    /// Run memory limit in KB. Task limits are stored in bytes; isolate takes
    /// decimal kilobytes.
    pub fn run_memory_kb(&self, config: &JudgeConfig) -> i64 {
        match self.memory_limit_byte {
            Some(bytes) => bytes / 1000,
            None => config.run_memory_limit_kb,
        }
    }

    pub fn compile_time_ms(&self, config: &JudgeConfig) -> i64 {
        self.compile_time_limit_ms
            .unwrap_or(config.compile_time_limit_ms)
    }

    pub fn compile_memory_kb(&self, config: &JudgeConfig) -> i64 {
        match self.compile_memory_limit_byte {
            Some(bytes) => bytes / 1000,
            None => config.compile_memory_limit_kb,
        }
    }
}

/// Task kind with kind-specific payload.
#[derive(Debug, Clone)]
pub enum TaskKind {
    Batch,
    OutputOnly,
    Communication { communicator: Script },
}

#[derive(Debug, Clone)]
pub struct Task {
    pub id: i64,
    pub kind: TaskKind,
    pub limits: TaskLimits,
    pub checker: CheckerKind,
    pub subtasks: Vec<Subtask>,
}

impl Task {
    pub fn score_max(&self) -> f64 {
        self.subtasks.iter().map(|s| s.score_max).sum()
    }
}

/// One scored group of test data. `order` is the join key used when the best
/// historical score per subtask is computed across resubmissions.
#[derive(Debug, Clone)]
pub struct Subtask {
    pub id: i64,
    pub order: i64,
    pub score_max: f64,
    pub data: Vec<TaskData>,
}

/// One test case. The judge file hash doubles as the caching key: two records
/// sharing it are the same logical test and evaluated at most once per
/// judgement.
#[derive(Debug, Clone)]
pub struct TaskData {
    pub id: i64,
    pub input_file_name: Option<String>,
    pub input_file_hash: Option<String>,
    pub judge_file_name: String,
    pub judge_file_hash: String,
}

#[derive(Debug, Clone)]
pub enum SubmissionSource {
    /// A single program source file
    Program { file_hash: String },
    /// Output-Only: contestant-supplied files keyed by task-declared names
    OutputFiles(Vec<SubmissionFile>),
}

#[derive(Debug, Clone)]
pub struct SubmissionFile {
    pub file_name: String,
    pub file_hash: String,
}

#[derive(Debug, Clone)]
pub struct Submission {
    pub id: i64,
    pub task_id: i64,
    pub user_id: i64,
    pub contest_id: Option<i64>,
    pub language: String,
    pub source: SubmissionSource,
}

/// Persisted verdict tree, mirrored back to the caller after judging.
#[derive(Debug)]
pub struct VerdictTree {
    pub verdict_id: i64,
    pub verdict: Verdict,
    pub score_raw: f64,
    pub running_time_ms: i64,
    pub running_memory_byte: i64,
    pub compile_time_ms: i64,
    pub compile_memory_byte: i64,
    pub subtasks: Vec<SubtaskVerdict>,
}

#[derive(Debug)]
pub struct SubtaskVerdict {
    pub verdict_subtask_id: i64,
    pub subtask_id: i64,
    pub verdict: Verdict,
    pub score_raw: f64,
    pub running_time_ms: i64,
    pub running_memory_byte: i64,
    pub data: Vec<TaskDataVerdict>,
}

#[derive(Debug, Clone)]
pub struct TaskDataVerdict {
    pub task_data_id: i64,
    pub verdict: Verdict,
    pub score_raw: f64,
    pub running_time_ms: i64,
    pub running_memory_byte: i64,
}
