use serde::{Deserialize, Serialize};
use std::fmt;

/// Verdict from judging
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Accepted,
    Partial,
    WrongAnswer,
    RuntimeError,
    TimeLimitExceeded,
    MemoryLimitExceeded,
    CompileError,
    JudgeFailed,
    Skipped,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Accepted => "accepted",
            Verdict::Partial => "partial",
            Verdict::WrongAnswer => "wrong_answer",
            Verdict::RuntimeError => "runtime_error",
            Verdict::TimeLimitExceeded => "time_limit_exceeded",
            Verdict::MemoryLimitExceeded => "memory_limit_exceeded",
            Verdict::CompileError => "compile_error",
            Verdict::JudgeFailed => "judge_failed",
            Verdict::Skipped => "skipped",
        }
    }

    /// Ranking used when reducing children to a parent verdict; lower is worse.
    fn priority(&self) -> u8 {
        match self {
            Verdict::Accepted => 6,
            Verdict::Skipped => 5,
            Verdict::Partial => 4,
            Verdict::WrongAnswer
            | Verdict::RuntimeError
            | Verdict::TimeLimitExceeded
            | Verdict::MemoryLimitExceeded => 3,
            Verdict::CompileError => 2,
            Verdict::JudgeFailed => 1,
        }
    }

    /// Whether this verdict poisons the remaining test data of its subtask.
    ///
    /// JudgeFailed is deliberately not bad: an infrastructure failure on one
    /// test must not cascade into skipping the rest.
    pub fn is_bad(&self) -> bool {
        match self {
            Verdict::Accepted | Verdict::Skipped | Verdict::Partial | Verdict::JudgeFailed => false,
            Verdict::WrongAnswer
            | Verdict::RuntimeError
            | Verdict::TimeLimitExceeded
            | Verdict::MemoryLimitExceeded
            | Verdict::CompileError => true,
        }
    }

    /// The worse of two verdicts.
    pub fn worst(self, other: Verdict) -> Verdict {
        if other.priority() < self.priority() {
            other
        } else {
            self
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
