//! Sandboxed compilation
//!
//! Contestant submissions compile under the task's compile limits (or the
//! process-wide defaults); judge scripts always compile under the defaults.
//! A language without a compile command yields an immediate Accepted result
//! with zero cost.

use std::path::Path;
use std::process::Stdio;

use anyhow::Result;
use tracing::info;

use crate::config::get_config;
use crate::languages::{self, LanguageSpec};
use crate::model::{CompiledScript, Script, TaskLimits};
use crate::sandbox::{BoxPool, DirMount, RunLimits, SandboxSession, SandboxSpec};
use crate::verdict::Verdict;

#[derive(Debug, Clone)]
pub struct CompilationResult {
    pub verdict: Verdict,
    pub compile_time_ms: i64,
    pub compile_memory_byte: i64,
    pub exe_name: String,
}

impl CompilationResult {
    /// Interpreted languages skip the compile step entirely.
    fn without_compile_step(exe_name: String) -> Self {
        Self {
            verdict: Verdict::Accepted,
            compile_time_ms: 0,
            compile_memory_byte: 0,
            exe_name,
        }
    }
}

/// Compile the contestant's source inside a sandbox. A non-Accepted verdict
/// here becomes the task-level CompileError that skips every subtask.
pub async fn compile_submission(
    boxes: &BoxPool,
    limits: &TaskLimits,
    language: &LanguageSpec,
    submission_root: &Path,
) -> Result<CompilationResult> {
    let config = get_config();
    let source = language.source_file.clone();
    let exe_name = language.executable_name(&source);

    let argv = match language.compile_command(&source, &exe_name) {
        Some(argv) => argv,
        None => return Ok(CompilationResult::without_compile_step(exe_name)),
    };

    let spec = SandboxSpec {
        argv,
        limits: RunLimits {
            time_ms: limits.compile_time_ms(config),
            memory_kb: limits.compile_memory_kb(config) + language.compile_bonus_memory_byte / 1000,
            processes: language.compile_processes,
        },
        mounts: vec![DirMount::writable("/submission", submission_root)],
        chdir: "/submission".to_string(),
    };

    let session = SandboxSession::acquire(boxes).await?;
    let outcome = session.run(&spec, Stdio::null(), Stdio::null()).await;
    session.release().await;
    let outcome = outcome?;

    info!(
        "Compiled submission: verdict={}, time={}ms",
        outcome.verdict, outcome.running_time_ms
    );

    Ok(CompilationResult {
        verdict: outcome.verdict,
        compile_time_ms: outcome.running_time_ms,
        compile_memory_byte: outcome.running_memory_byte,
        exe_name,
    })
}

/// Compile a judge-owned script (checker or communicator) materialized under
/// `root`, returning a new value carrying the executable name. Judge scripts
/// that fail to compile are an infrastructure error, not a contestant one.
pub async fn compile_script(boxes: &BoxPool, script: &Script, root: &Path) -> Result<CompiledScript> {
    let config = get_config();
    let language = languages::get_language(&script.language)
        .ok_or_else(|| anyhow::anyhow!("Unsupported script language: {}", script.language))?;

    let exe_name = language.executable_name(&script.file_name);
    let compiled = CompiledScript {
        language: script.language.clone(),
        exe_name: exe_name.clone(),
    };

    let argv = match language.compile_command(&script.file_name, &exe_name) {
        Some(argv) => argv,
        None => return Ok(compiled),
    };

    let spec = SandboxSpec {
        argv,
        limits: RunLimits {
            time_ms: config.compile_time_limit_ms,
            memory_kb: config.compile_memory_limit_kb + language.compile_bonus_memory_byte / 1000,
            processes: language.compile_processes,
        },
        mounts: vec![DirMount::writable("/task", root)],
        chdir: "/task".to_string(),
    };

    let session = SandboxSession::acquire(boxes).await?;
    let outcome = session.run(&spec, Stdio::null(), Stdio::null()).await;
    session.release().await;
    let outcome = outcome?;

    if outcome.verdict != Verdict::Accepted {
        anyhow::bail!(
            "Judge script {} failed to compile: {}",
            script.file_name,
            outcome.verdict
        );
    }

    Ok(compiled)
}

/// Look up the language spec used to run a compiled script.
pub fn script_language(compiled: &CompiledScript) -> Result<LanguageSpec> {
    languages::get_language(&compiled.language)
        .ok_or_else(|| anyhow::anyhow!("Unsupported script language: {}", compiled.language))
}
