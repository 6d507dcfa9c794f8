//! Sandbox session lifecycle
//!
//! A session leases a box id, initializes the box, runs exactly one command
//! (or one side of a piped pair) under resource limits, and releases the box
//! best-effort. Release failures are logged and swallowed: cleanup must never
//! block judging.

use std::path::PathBuf;
use std::process::Stdio;

use anyhow::{Context, Result};
use tokio::fs;
use tokio::process::{Child, Command};
use tracing::{debug, warn};

use super::meta::{parse_meta, RunOutcome};
use super::pool::BoxPool;
use crate::config::get_config;

/// Resource limits for one sandboxed run.
#[derive(Debug, Clone)]
pub struct RunLimits {
    /// CPU time limit in milliseconds
    pub time_ms: i64,
    /// Memory limit in KB
    pub memory_kb: i64,
    /// Maximum number of processes
    pub processes: u32,
}

/// A directory mapped into the box.
#[derive(Debug, Clone)]
pub struct DirMount {
    pub inside: String,
    pub outside: PathBuf,
    pub writable: bool,
}

impl DirMount {
    pub fn read_only(inside: impl Into<String>, outside: impl Into<PathBuf>) -> Self {
        Self {
            inside: inside.into(),
            outside: outside.into(),
            writable: false,
        }
    }

    pub fn writable(inside: impl Into<String>, outside: impl Into<PathBuf>) -> Self {
        Self {
            inside: inside.into(),
            outside: outside.into(),
            writable: true,
        }
    }
}

/// Everything needed to run one command in a box.
#[derive(Debug, Clone)]
pub struct SandboxSpec {
    pub argv: Vec<String>,
    pub limits: RunLimits,
    pub mounts: Vec<DirMount>,
    pub chdir: String,
}

/// A single-use isolate session holding a leased box id.
pub struct SandboxSession<'p> {
    pool: &'p BoxPool,
    box_id: u32,
    meta_path: PathBuf,
}

impl<'p> SandboxSession<'p> {
    /// Lease a box id and initialize the box.
    pub async fn acquire(pool: &'p BoxPool) -> Result<SandboxSession<'p>> {
        let box_id = pool.acquire().await;
        let meta_path = PathBuf::from(format!("/tmp/arbiter.{}.meta", box_id));

        let output = Command::new(&get_config().isolate_bin)
            .args(["--init", "--box-id", &box_id.to_string()])
            .output()
            .await
            .context("Failed to run isolate --init");

        let output = match output {
            Ok(output) => output,
            Err(e) => {
                pool.release(box_id).await;
                return Err(e);
            }
        };

        if !output.status.success() {
            pool.release(box_id).await;
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("Failed to initialize isolate box {}: {}", box_id, stderr);
        }

        debug!("Initialized isolate box {}", box_id);
        Ok(Self {
            pool,
            box_id,
            meta_path,
        })
    }

    fn build_args(&self, spec: &SandboxSpec) -> Vec<String> {
        let config = get_config();

        // CPU limit in seconds, millisecond precision rounded down
        let time_secs = (spec.limits.time_ms as f64) / 1000.0;
        let wall_time_secs = time_secs + config.wall_time_bonus_secs as f64;

        let mut args = vec![
            format!("--box-id={}", self.box_id),
            format!("--meta={}", self.meta_path.display()),
            format!("--time={:.3}", time_secs),
            format!("--wall-time={:.3}", wall_time_secs),
            format!("--mem={}", spec.limits.memory_kb),
            format!("--processes={}", spec.limits.processes),
            // Runtime directories
            "--dir=/usr".to_string(),
            "--dir=/lib".to_string(),
            "--dir=/lib64".to_string(),
            "--dir=/etc:noexec".to_string(),
            // Environment
            "--env=PATH=/usr/local/bin:/usr/bin:/bin".to_string(),
            "--env=HOME=/box".to_string(),
        ];

        for mount in &spec.mounts {
            let rw = if mount.writable { ":rw" } else { "" };
            args.push(format!(
                "--dir={}={}{}",
                mount.inside,
                mount.outside.display(),
                rw
            ));
        }

        args.push(format!("--chdir={}", spec.chdir));
        args.push("--run".to_string());
        args.push("--".to_string());
        args.extend(spec.argv.iter().cloned());

        args
    }

    /// Spawn the command without awaiting it. Used by the communication
    /// strategy to launch both sides before either is awaited.
    pub fn spawn(&self, spec: &SandboxSpec, stdin: Stdio, stdout: Stdio) -> Result<Child> {
        let args = self.build_args(spec);
        debug!("Running isolate with args: {:?}", args);

        Command::new(&get_config().isolate_bin)
            .args(&args)
            .stdin(stdin)
            .stdout(stdout)
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .context("Failed to spawn isolate")
    }

    /// Run the command to completion and read the structured result.
    pub async fn run(&self, spec: &SandboxSpec, stdin: Stdio, stdout: Stdio) -> Result<RunOutcome> {
        let mut child = self.spawn(spec, stdin, stdout)?;
        child.wait().await.context("Failed to wait for isolate")?;
        Ok(self.outcome().await)
    }

    /// Read the run result from the meta file. A missing or malformed file is
    /// JudgeFailed, never an error.
    pub async fn outcome(&self) -> RunOutcome {
        match fs::read_to_string(&self.meta_path).await {
            Ok(content) => parse_meta(&content),
            Err(e) => {
                warn!(
                    "Failed to read isolate meta file {:?}: {}",
                    self.meta_path, e
                );
                RunOutcome::judge_failed()
            }
        }
    }

    /// Tear down the box and return the id to the pool. Best-effort.
    pub async fn release(self) {
        let cleanup = Command::new(&get_config().isolate_bin)
            .args(["--cleanup", "--box-id", &self.box_id.to_string()])
            .output()
            .await;
        if let Err(e) = cleanup {
            warn!("Failed to clean up isolate box {}: {}", self.box_id, e);
        }

        if let Err(e) = fs::remove_file(&self.meta_path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Failed to remove meta file {:?}: {}", self.meta_path, e);
            }
        }

        self.pool.release(self.box_id).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_build_args_limits_and_mounts() {
        let pool = BoxPool::with_range(42, 42);
        // Build a session by hand; no isolate binary in the test environment.
        let session = SandboxSession {
            pool: &pool,
            box_id: 42,
            meta_path: PathBuf::from("/tmp/arbiter.42.meta"),
        };

        let spec = SandboxSpec {
            argv: vec!["/submission/main".to_string()],
            limits: RunLimits {
                time_ms: 2500,
                memory_kb: 100_000,
                processes: 1,
            },
            mounts: vec![
                DirMount::read_only("/submission", "/work/sub"),
                DirMount::writable("/output", "/work/out"),
            ],
            chdir: "/submission".to_string(),
        };

        let args = session.build_args(&spec);
        assert!(args.contains(&"--box-id=42".to_string()));
        assert!(args.contains(&"--time=2.500".to_string()));
        assert!(args.contains(&"--wall-time=32.500".to_string()));
        assert!(args.contains(&"--mem=100000".to_string()));
        assert!(args.contains(&"--processes=1".to_string()));
        assert!(args.contains(&"--dir=/submission=/work/sub".to_string()));
        assert!(args.contains(&"--dir=/output=/work/out:rw".to_string()));
        assert!(args.contains(&"--chdir=/submission".to_string()));

        // The contestant argv comes after the `--` separator
        let sep = args.iter().position(|a| a == "--").unwrap();
        assert_eq!(args[sep + 1], "/submission/main");
    }
}
