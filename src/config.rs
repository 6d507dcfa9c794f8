//! Process-wide judge configuration
//!
//! Default limits applied when a task leaves its own limits unset, plus the
//! fixed limits used for judge-owned scripts (checkers, communicators).

use std::sync::OnceLock;

#[derive(Debug, Clone)]
pub struct JudgeConfig {
    /// Default CPU time limit for contestant runs in milliseconds
    pub run_time_limit_ms: i64,
    /// Default memory limit for contestant runs in KB
    pub run_memory_limit_kb: i64,
    /// CPU time limit for judge scripts (communicator, checker) in milliseconds
    pub judge_time_limit_ms: i64,
    /// Memory limit for judge scripts in KB
    pub judge_memory_limit_kb: i64,
    /// Default compile time limit in milliseconds
    pub compile_time_limit_ms: i64,
    /// Default compile memory limit in KB
    pub compile_memory_limit_kb: i64,
    /// Added to the CPU limit to form the wall-clock limit, in seconds.
    /// Must absorb scheduling jitter and I/O stalls without over-penalizing.
    pub wall_time_bonus_secs: u64,
    /// Path to the isolate binary
    pub isolate_bin: String,
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            run_time_limit_ms: 3_000,
            // Anything below around 15000 KB makes every Python program fail
            run_memory_limit_kb: 100_000,
            judge_time_limit_ms: 60_000,
            judge_memory_limit_kb: 1_024_000,
            compile_time_limit_ms: 10_000,
            compile_memory_limit_kb: 1_024_000,
            wall_time_bonus_secs: 30,
            isolate_bin: "/usr/local/bin/isolate".into(),
        }
    }
}

impl JudgeConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(bin) = std::env::var("ISOLATE_BIN") {
            config.isolate_bin = bin;
        }
        config
    }
}

static CONFIG: OnceLock<JudgeConfig> = OnceLock::new();

/// Initialize the global configuration from the environment
pub fn init_config() -> &'static JudgeConfig {
    CONFIG.get_or_init(JudgeConfig::from_env)
}

/// Get the global configuration (defaults if never initialized, e.g. in tests)
pub fn get_config() -> &'static JudgeConfig {
    CONFIG.get_or_init(JudgeConfig::from_env)
}
