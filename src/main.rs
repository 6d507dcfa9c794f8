mod checker;
mod compile;
mod config;
mod evaluation;
mod judge;
mod languages;
mod model;
mod sandbox;
mod scoring;
mod storage;
mod store;
mod verdict;

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use tokio::time::{sleep, Duration};
use tracing::{error, info, warn};

use crate::checker::{Checker, CustomChecker};
use crate::judge::JudgeRunner;
use crate::model::{CheckerKind, CompiledScript, Submission, SubmissionSource, Task, TaskKind};
use crate::sandbox::BoxPool;
use crate::storage::FileStorage;
use crate::store::Store;

/// Worker job enum - all job types arriving on the queue
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "job_type", rename_all = "snake_case")]
pub enum WorkerJob {
    /// Judge a submission
    Judge(JudgeJob),
    /// Retract a submission's official verdict and judge it again
    Rejudge(RejudgeJob),
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JudgeJob {
    pub submission_id: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RejudgeJob {
    pub submission_id: i64,
}

const QUEUE_NAME: &str = "arbiter:queue";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("arbiter=info".parse()?),
        )
        .init();

    dotenvy::dotenv().ok();

    languages::init_languages()?;
    info!("Loaded language registry");

    config::init_config();

    let redis_url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".into());

    info!("Starting judge worker...");

    let client = redis::Client::open(redis_url.clone())?;
    let mut conn = get_redis_connection(&client).await?;
    info!("Connected to Redis at {}", redis_url);

    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "sqlite://arbiter.sqlite3?mode=rwc".into());
    let store = Store::connect(&database_url).await?;

    let storage = FileStorage::from_env().await?;
    info!("Connected to file storage");

    let boxes = Arc::new(BoxPool::new());

    info!("Waiting for jobs...");

    loop {
        // Block and wait for a job from the queue (BLPOP)
        let result: Option<(String, String)> = match conn.blpop(QUEUE_NAME, 0.0).await {
            Ok(res) => res,
            Err(e) => {
                warn!("Redis BLPOP failed: {}. Attempting to reconnect...", e);
                conn = get_redis_connection(&client).await?;
                continue;
            }
        };

        let Some((_, job_data)) = result else {
            continue;
        };

        match serde_json::from_str::<WorkerJob>(&job_data) {
            Ok(WorkerJob::Judge(job)) => {
                info!("Received judge job: submission_id={}", job.submission_id);
                match handle_judge_job(&store, &storage, &boxes, job.submission_id).await {
                    Ok(()) => {
                        info!("Judge job completed: submission_id={}", job.submission_id)
                    }
                    Err(e) => {
                        error!(
                            "Failed to judge submission {}: {:#}",
                            job.submission_id, e
                        );
                    }
                }
            }
            Ok(WorkerJob::Rejudge(job)) => {
                info!("Received rejudge job: submission_id={}", job.submission_id);
                match store.prepare_rejudge(job.submission_id).await {
                    Ok(()) => {
                        if let Err(e) = enqueue_judge(&mut conn, job.submission_id).await {
                            error!(
                                "Failed to re-enqueue submission {}: {:#}",
                                job.submission_id, e
                            );
                        }
                    }
                    Err(e) => {
                        error!(
                            "Failed to prepare rejudge of submission {}: {:#}",
                            job.submission_id, e
                        );
                    }
                }
            }
            Err(e) => {
                warn!("Failed to parse job data: {}", e);
            }
        }
    }
}

async fn enqueue_judge(conn: &mut MultiplexedConnection, submission_id: i64) -> Result<()> {
    let payload = serde_json::to_string(&WorkerJob::Judge(JudgeJob { submission_id }))?;
    conn.rpush::<_, _, ()>(QUEUE_NAME, payload).await?;
    Ok(())
}

/// Drive one submission through the pipeline: load the snapshot, materialize
/// files, compile judge scripts, evaluate, persist.
async fn handle_judge_job(
    store: &Store,
    storage: &FileStorage,
    boxes: &Arc<BoxPool>,
    submission_id: i64,
) -> Result<()> {
    let submission = store.load_submission(submission_id).await?;
    let task = store.load_task(submission.task_id).await?;

    let task_dir = tempfile::tempdir()?;
    let output_dir = tempfile::tempdir()?;
    let submission_dir = tempfile::tempdir()?;

    materialize_task_files(storage, &task, task_dir.path()).await?;
    materialize_submission(storage, &submission, submission_dir.path()).await?;

    let checker = prepare_checker(storage, boxes, &task, task_dir.path()).await?;
    let communicator = prepare_communicator(storage, boxes, &task, task_dir.path()).await?;

    let runner = JudgeRunner::new(store, boxes.clone(), checker, communicator);
    let tree = runner
        .evaluate(
            &task,
            &submission,
            task_dir.path(),
            output_dir.path(),
            submission_dir.path(),
        )
        .await?;

    info!(
        "Judged submission {}: verdict={}, score={}/{}, time={}ms, memory={}B, compile={}ms",
        submission_id,
        tree.verdict,
        tree.score_raw,
        task.score_max(),
        tree.running_time_ms,
        tree.running_memory_byte,
        tree.compile_time_ms
    );

    Ok(())
}

/// Download every input and judge file the task references into the task
/// root, once per declared file name.
async fn materialize_task_files(storage: &FileStorage, task: &Task, task_root: &Path) -> Result<()> {
    let mut materialized: HashSet<String> = HashSet::new();

    for subtask in &task.subtasks {
        for data in &subtask.data {
            if let (Some(name), Some(hash)) = (&data.input_file_name, &data.input_file_hash) {
                if materialized.insert(name.clone()) {
                    storage
                        .download_to_file(hash, &task_root.join(name))
                        .await
                        .with_context(|| format!("Failed to materialize input {}", name))?;
                }
            }
            if materialized.insert(data.judge_file_name.clone()) {
                storage
                    .download_to_file(&data.judge_file_hash, &task_root.join(&data.judge_file_name))
                    .await
                    .with_context(|| {
                        format!("Failed to materialize judge file {}", data.judge_file_name)
                    })?;
            }
        }
    }

    Ok(())
}

/// Materialize the contestant's source file (named per the language registry)
/// or, for Output-Only, the supplied output files under their declared names.
async fn materialize_submission(
    storage: &FileStorage,
    submission: &Submission,
    submission_root: &Path,
) -> Result<()> {
    match &submission.source {
        SubmissionSource::Program { file_hash } => {
            let language = languages::get_language(&submission.language).with_context(|| {
                format!("Unsupported submission language: {}", submission.language)
            })?;
            storage
                .download_to_file(file_hash, &submission_root.join(&language.source_file))
                .await
                .context("Failed to materialize submission source")?;
        }
        SubmissionSource::OutputFiles(files) => {
            for file in files {
                storage
                    .download_to_file(&file.file_hash, &submission_root.join(&file.file_name))
                    .await
                    .with_context(|| {
                        format!("Failed to materialize output file {}", file.file_name)
                    })?;
            }
        }
    }
    Ok(())
}

async fn prepare_checker(
    storage: &FileStorage,
    boxes: &Arc<BoxPool>,
    task: &Task,
    task_root: &Path,
) -> Result<Checker> {
    match &task.checker {
        CheckerKind::LenientDiff => Ok(Checker::LenientDiff),
        CheckerKind::Custom(script) => {
            storage
                .download_to_file(&script.file_hash, &task_root.join(&script.file_name))
                .await
                .context("Failed to materialize checker script")?;
            let compiled = compile::compile_script(boxes, script, task_root).await?;
            let language = compile::script_language(&compiled)?;
            Ok(Checker::Custom(CustomChecker {
                language,
                exe_name: compiled.exe_name,
            }))
        }
    }
}

async fn prepare_communicator(
    storage: &FileStorage,
    boxes: &Arc<BoxPool>,
    task: &Task,
    task_root: &Path,
) -> Result<Option<CompiledScript>> {
    match &task.kind {
        TaskKind::Communication { communicator } => {
            storage
                .download_to_file(
                    &communicator.file_hash,
                    &task_root.join(&communicator.file_name),
                )
                .await
                .context("Failed to materialize communicator script")?;
            let compiled = compile::compile_script(boxes, communicator, task_root).await?;
            Ok(Some(compiled))
        }
        TaskKind::Batch | TaskKind::OutputOnly => Ok(None),
    }
}

async fn get_redis_connection(client: &redis::Client) -> Result<MultiplexedConnection> {
    loop {
        match client.get_multiplexed_async_connection().await {
            Ok(conn) => return Ok(conn),
            Err(e) => {
                warn!("Failed to connect to Redis: {}. Retrying in 3 seconds...", e);
                sleep(Duration::from_secs(3)).await;
            }
        }
    }
}
