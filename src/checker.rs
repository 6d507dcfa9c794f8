//! Checker invocation
//!
//! Compares contestant output against the judge file, either with the
//! built-in lenient diff or by running a task-supplied checker script. The
//! judge-side file paths are always engine-controlled; a checker crash or
//! unparseable output is JudgeFailed, never attributed to the contestant.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::languages::LanguageSpec;
use crate::verdict::Verdict;

/// Wall-clock allowance for a custom checker run (trusted, unsandboxed)
pub const CHECKER_TIMEOUT_SECS: u64 = 30;

/// A checker ready to be invoked: either the built-in diff or a compiled
/// custom script.
pub enum Checker {
    LenientDiff,
    Custom(CustomChecker),
}

pub struct CustomChecker {
    pub language: LanguageSpec,
    pub exe_name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CheckerOutcome {
    pub verdict: Verdict,
    pub score_raw: f64,
}

impl CheckerOutcome {
    fn judge_failed() -> Self {
        Self {
            verdict: Verdict::JudgeFailed,
            score_raw: 0.0,
        }
    }
}

/// Compare `output_path` against `judge_path`. `input_path` is forwarded to
/// custom checkers when the strategy has one (batch); the lenient diff
/// ignores it.
pub async fn check_output(
    checker: &Checker,
    task_root: &Path,
    input_path: Option<&Path>,
    judge_path: &Path,
    output_path: &Path,
) -> CheckerOutcome {
    match checker {
        Checker::LenientDiff => {
            let judge = match tokio::fs::read_to_string(judge_path).await {
                Ok(content) => content,
                Err(e) => {
                    warn!("Failed to read judge file {:?}: {}", judge_path, e);
                    return CheckerOutcome::judge_failed();
                }
            };
            let output = match tokio::fs::read_to_string(output_path).await {
                Ok(content) => content,
                Err(e) => {
                    warn!("Failed to read output file {:?}: {}", output_path, e);
                    return CheckerOutcome::judge_failed();
                }
            };

            if lenient_diff(&judge, &output) {
                CheckerOutcome {
                    verdict: Verdict::Accepted,
                    score_raw: 1.0,
                }
            } else {
                CheckerOutcome {
                    verdict: Verdict::WrongAnswer,
                    score_raw: 0.0,
                }
            }
        }
        Checker::Custom(custom) => {
            run_custom_checker(custom, task_root, input_path, judge_path, output_path).await
        }
    }
}

/// Token-wise comparison: each line is split on whitespace, trailing blank
/// lines are ignored. Leading/trailing whitespace differences never matter.
pub fn lenient_diff(judge: &str, output: &str) -> bool {
    fn tokenize(s: &str) -> Vec<Vec<&str>> {
        let mut lines: Vec<Vec<&str>> =
            s.lines().map(|l| l.split_whitespace().collect()).collect();
        while lines.last().map(|l| l.is_empty()).unwrap_or(false) {
            lines.pop();
        }
        lines
    }

    tokenize(judge) == tokenize(output)
}

async fn run_custom_checker(
    checker: &CustomChecker,
    task_root: &Path,
    input_path: Option<&Path>,
    judge_path: &Path,
    output_path: &Path,
) -> CheckerOutcome {
    let root = task_root.to_string_lossy();
    let memory_byte = crate::config::get_config().judge_memory_limit_kb * 1000;
    let mut argv = checker.language.run_command(&checker.exe_name, &root, memory_byte);
    if let Some(input) = input_path {
        argv.push(input.to_string_lossy().into_owned());
    }
    argv.push(judge_path.to_string_lossy().into_owned());
    argv.push(output_path.to_string_lossy().into_owned());

    debug!("Running checker: {:?}", argv);

    let mut command = Command::new(&argv[0]);
    command
        .args(&argv[1..])
        .current_dir(task_root)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true);

    let output = match tokio::time::timeout(
        Duration::from_secs(CHECKER_TIMEOUT_SECS),
        async { command.spawn()?.wait_with_output().await },
    )
    .await
    {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => {
            warn!("Failed to run checker {:?}: {}", argv, e);
            return CheckerOutcome::judge_failed();
        }
        Err(_) => {
            warn!("Checker timed out after {}s", CHECKER_TIMEOUT_SECS);
            return CheckerOutcome::judge_failed();
        }
    };

    if !output.status.success() {
        warn!("Checker exited with {:?}", output.status.code());
        return CheckerOutcome::judge_failed();
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    match parse_checker_output(&stdout) {
        Ok(outcome) => outcome,
        Err(e) => {
            warn!("Unparseable checker output: {}", e);
            CheckerOutcome::judge_failed()
        }
    }
}

#[derive(Debug, Error)]
pub enum CheckerOutputError {
    #[error("empty checker output")]
    Empty,
    #[error("unrecognized verdict token: {0}")]
    BadVerdict(String),
    #[error("missing or invalid score")]
    BadScore,
}

/// Checker stdout protocol: line 1 is a verdict token (`ac`, `wa`, `pa`),
/// line 2 an optional fractional score. `pa` must carry a score; `ac`/`wa`
/// default to 1.0/0.0. Scores are clamped to [0, 1].
fn parse_checker_output(stdout: &str) -> Result<CheckerOutcome, CheckerOutputError> {
    let mut lines = stdout.lines().map(str::trim).filter(|l| !l.is_empty());

    let token = lines.next().ok_or(CheckerOutputError::Empty)?;
    let score = match lines.next() {
        Some(line) => Some(
            line.parse::<f64>()
                .map_err(|_| CheckerOutputError::BadScore)?,
        ),
        None => None,
    };
    let score = score.map(|s| s.clamp(0.0, 1.0));

    match token {
        "ac" => Ok(CheckerOutcome {
            verdict: Verdict::Accepted,
            score_raw: score.unwrap_or(1.0),
        }),
        "wa" => Ok(CheckerOutcome {
            verdict: Verdict::WrongAnswer,
            score_raw: score.unwrap_or(0.0),
        }),
        "pa" => match score {
            Some(score) => Ok(CheckerOutcome {
                verdict: Verdict::Partial,
                score_raw: score,
            }),
            None => Err(CheckerOutputError::BadScore),
        },
        other => Err(CheckerOutputError::BadVerdict(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lenient_diff_exact_match() {
        assert!(lenient_diff("1 2 3\n4\n", "1 2 3\n4\n"));
    }

    #[test]
    fn test_lenient_diff_ignores_whitespace_layout() {
        assert!(lenient_diff("1 2 3\n", "  1\t2   3  \n"));
        assert!(lenient_diff("hello\nworld\n", "hello\nworld\n\n\n"));
        assert!(lenient_diff("a\n", "a"));
    }

    #[test]
    fn test_lenient_diff_rejects_token_differences() {
        assert!(!lenient_diff("1 2\n", "1 3\n"));
        assert!(!lenient_diff("1 2\n", "1\n2\n"));
        assert!(!lenient_diff("1\n", "1\n2\n"));
    }

    #[test]
    fn test_parse_checker_output_tokens() {
        let ac = parse_checker_output("ac\n").unwrap();
        assert_eq!(ac.verdict, Verdict::Accepted);
        assert_eq!(ac.score_raw, 1.0);

        let wa = parse_checker_output("wa\n0.25\n").unwrap();
        assert_eq!(wa.verdict, Verdict::WrongAnswer);
        assert_eq!(wa.score_raw, 0.25);

        let pa = parse_checker_output("pa\n0.5\n").unwrap();
        assert_eq!(pa.verdict, Verdict::Partial);
        assert_eq!(pa.score_raw, 0.5);
    }

    #[test]
    fn test_parse_checker_output_clamps_score() {
        let outcome = parse_checker_output("pa\n1.5\n").unwrap();
        assert_eq!(outcome.score_raw, 1.0);
    }

    #[test]
    fn test_parse_checker_output_rejects_garbage() {
        assert!(parse_checker_output("").is_err());
        assert!(parse_checker_output("maybe\n").is_err());
        assert!(parse_checker_output("pa\n").is_err());
        assert!(parse_checker_output("ac\nnot-a-number\n").is_err());
    }
}
