//! Isolate meta file parser
//!
//! Parses the line-oriented key:value file isolate writes after every run.
//! Missing or malformed fields degrade to zero and a verdict of JudgeFailed
//! rather than an error, so one bad run never aborts a judgement tree.

use crate::verdict::Verdict;

/// Structured result of a sandboxed run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub verdict: Verdict,
    pub running_time_ms: i64,
    pub running_memory_byte: i64,
}

impl RunOutcome {
    /// Outcome used when the sandbox produced nothing trustworthy.
    pub fn judge_failed() -> Self {
        Self {
            verdict: Verdict::JudgeFailed,
            running_time_ms: 0,
            running_memory_byte: 0,
        }
    }
}

/// Parse isolate meta file content.
///
/// status TO -> TimeLimitExceeded, SG -> MemoryLimitExceeded (signal kill is
/// read as a memory violation), RE -> RuntimeError; no status and exit code 0
/// -> Accepted; anything else -> JudgeFailed.
pub fn parse_meta(content: &str) -> RunOutcome {
    let mut outcome = RunOutcome::judge_failed();

    let mut status: Option<&str> = None;
    let mut exit_code: Option<&str> = None;

    for line in content.lines() {
        let (key, value) = match line.split_once(':') {
            Some((key, value)) => (key.trim(), value.trim()),
            None => continue,
        };

        match key {
            "status" => status = Some(value),
            "exitcode" => exit_code = Some(value),
            "time" => {
                if let Ok(secs) = value.parse::<f64>() {
                    outcome.running_time_ms = (secs * 1000.0).round() as i64;
                }
            }
            "max-rss" => {
                // max-rss is reported in KB
                if let Ok(kb) = value.parse::<i64>() {
                    outcome.running_memory_byte = kb * 1000;
                }
            }
            _ => {}
        }
    }

    outcome.verdict = match status {
        Some("TO") => Verdict::TimeLimitExceeded,
        Some("SG") => Verdict::MemoryLimitExceeded,
        Some("RE") => Verdict::RuntimeError,
        None if exit_code == Some("0") => Verdict::Accepted,
        _ => Verdict::JudgeFailed,
    };

    outcome
}
