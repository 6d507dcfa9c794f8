//! Relational store contracts
//!
//! The judge needs a handful of read/write contracts from the relational
//! store: load the task/submission snapshot, write the three-level verdict
//! tree incrementally, read official scoring history, and upsert the
//! denormalized overall score. Everything else about the schema belongs to
//! task authoring and the front end.
//!
//! The global (no-contest) overall scope is stored as `contest_id = 0` so the
//! `UNIQUE(task_id, user_id, contest_id)` upsert always fires; SQLite treats
//! NULLs as distinct in unique indexes.

use anyhow::{Context, Result};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use tracing::info;

use crate::model::{
    CheckerKind, Script, Submission, SubmissionFile, SubmissionSource, Subtask, Task, TaskData,
    TaskDataVerdict, TaskKind, TaskLimits,
};
use crate::scoring::score_overall;
use crate::verdict::Verdict;

const GLOBAL_CONTEST_SCOPE: i64 = 0;

pub struct Store {
    pool: SqlitePool,
}

impl Store {
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(url)
            .await
            .with_context(|| format!("Failed to open database {}", url))?;

        for pragma_sql in &[
            "PRAGMA foreign_keys = ON;",
            "PRAGMA busy_timeout = 2000;",
            "PRAGMA journal_mode = WAL;",
            "PRAGMA synchronous = NORMAL;",
        ] {
            sqlx::query(pragma_sql).execute(&pool).await?;
        }

        let mut tx = pool.begin().await?;
        for sql in SCHEMA {
            sqlx::query(sql).execute(tx.as_mut()).await?;
        }
        tx.commit().await?;

        info!("Connected to database at {}", url);
        Ok(Self { pool })
    }

    #[cfg(test)]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Load the immutable task snapshot as a typed union.
    pub async fn load_task(&self, task_id: i64) -> Result<Task> {
        let row = sqlx::query(
            "SELECT kind, time_limit_ms, memory_limit_byte, compile_time_limit_ms, \
             compile_memory_limit_byte, checker_kind, checker_language, checker_file_name, \
             checker_file_hash, communicator_language, communicator_file_name, \
             communicator_file_hash \
             FROM tasks WHERE id = ?",
        )
        .bind(task_id)
        .fetch_one(&self.pool)
        .await
        .with_context(|| format!("Task {} not found", task_id))?;

        let kind: String = row.try_get("kind")?;
        let kind = match kind.as_str() {
            "batch" => TaskKind::Batch,
            "output_only" => TaskKind::OutputOnly,
            "communication" => TaskKind::Communication {
                communicator: script_from_row(&row, "communicator")
                    .context("Communication task without a communicator script")?,
            },
            other => anyhow::bail!("Unknown task kind: {}", other),
        };

        let checker_kind: String = row.try_get("checker_kind")?;
        let checker = match checker_kind.as_str() {
            "lenient_diff" => CheckerKind::LenientDiff,
            "custom" => CheckerKind::Custom(
                script_from_row(&row, "checker").context("Custom checker without a script")?,
            ),
            other => anyhow::bail!("Unknown checker kind: {}", other),
        };

        let limits = TaskLimits {
            time_limit_ms: row.try_get("time_limit_ms")?,
            memory_limit_byte: row.try_get("memory_limit_byte")?,
            compile_time_limit_ms: row.try_get("compile_time_limit_ms")?,
            compile_memory_limit_byte: row.try_get("compile_memory_limit_byte")?,
        };

        let subtask_rows = sqlx::query(
            "SELECT id, ord, score_max FROM subtasks WHERE task_id = ? ORDER BY ord",
        )
        .bind(task_id)
        .fetch_all(&self.pool)
        .await?;

        let mut subtasks = Vec::with_capacity(subtask_rows.len());
        for subtask_row in subtask_rows {
            let subtask_id: i64 = subtask_row.try_get("id")?;
            let data_rows = sqlx::query(
                "SELECT id, input_file_name, input_file_hash, judge_file_name, \
                 judge_file_hash FROM task_data WHERE subtask_id = ? ORDER BY ord",
            )
            .bind(subtask_id)
            .fetch_all(&self.pool)
            .await?;

            let mut data = Vec::with_capacity(data_rows.len());
            for data_row in data_rows {
                data.push(TaskData {
                    id: data_row.try_get("id")?,
                    input_file_name: data_row.try_get("input_file_name")?,
                    input_file_hash: data_row.try_get("input_file_hash")?,
                    judge_file_name: data_row.try_get("judge_file_name")?,
                    judge_file_hash: data_row.try_get("judge_file_hash")?,
                });
            }

            subtasks.push(Subtask {
                id: subtask_id,
                order: subtask_row.try_get("ord")?,
                score_max: subtask_row.try_get("score_max")?,
                data,
            });
        }

        Ok(Task {
            id: task_id,
            kind,
            limits,
            checker,
            subtasks,
        })
    }

    pub async fn load_submission(&self, submission_id: i64) -> Result<Submission> {
        let row = sqlx::query(
            "SELECT task_id, user_id, contest_id, language, source_file_hash \
             FROM submissions WHERE id = ?",
        )
        .bind(submission_id)
        .fetch_one(&self.pool)
        .await
        .with_context(|| format!("Submission {} not found", submission_id))?;

        let source_file_hash: Option<String> = row.try_get("source_file_hash")?;
        let source = match source_file_hash {
            Some(file_hash) => SubmissionSource::Program { file_hash },
            None => {
                let file_rows = sqlx::query(
                    "SELECT file_name, file_hash FROM submission_files \
                     WHERE submission_id = ? ORDER BY file_name",
                )
                .bind(submission_id)
                .fetch_all(&self.pool)
                .await?;

                let mut files = Vec::with_capacity(file_rows.len());
                for file_row in file_rows {
                    files.push(SubmissionFile {
                        file_name: file_row.try_get("file_name")?,
                        file_hash: file_row.try_get("file_hash")?,
                    });
                }
                SubmissionSource::OutputFiles(files)
            }
        };

        Ok(Submission {
            id: submission_id,
            task_id: row.try_get("task_id")?,
            user_id: row.try_get("user_id")?,
            contest_id: row.try_get("contest_id")?,
            language: row.try_get("language")?,
            source,
        })
    }

    /// Insert the top-level verdict row and point the submission's official
    /// verdict at it, in one transaction. Any earlier official verdict of the
    /// same submission is flipped to unofficial first, so at most one verdict
    /// per submission ever counts.
    pub async fn open_verdict(
        &self,
        submission_id: i64,
        compile_time_ms: i64,
        compile_memory_byte: i64,
    ) -> Result<i64> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE verdicts SET is_official = 0 WHERE submission_id = ?")
            .bind(submission_id)
            .execute(tx.as_mut())
            .await?;

        let result = sqlx::query(
            "INSERT INTO verdicts (submission_id, is_official, compile_time_ms, \
             compile_memory_byte) VALUES (?, 1, ?, ?)",
        )
        .bind(submission_id)
        .bind(compile_time_ms)
        .bind(compile_memory_byte)
        .execute(tx.as_mut())
        .await?;
        let verdict_id = result.last_insert_rowid();

        sqlx::query("UPDATE submissions SET official_verdict_id = ? WHERE id = ?")
            .bind(verdict_id)
            .bind(submission_id)
            .execute(tx.as_mut())
            .await?;

        tx.commit().await?;
        Ok(verdict_id)
    }

    pub async fn open_subtask_verdict(&self, verdict_id: i64, subtask_id: i64) -> Result<i64> {
        let result = sqlx::query(
            "INSERT INTO verdict_subtasks (verdict_id, subtask_id) VALUES (?, ?)",
        )
        .bind(verdict_id)
        .bind(subtask_id)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    /// Written as soon as each test completes, so a crash mid-judgement
    /// leaves an inspectable partial tree.
    pub async fn insert_task_data_verdict(
        &self,
        verdict_subtask_id: i64,
        row: &TaskDataVerdict,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO verdict_task_data (verdict_subtask_id, task_data_id, verdict, \
             score_raw, running_time_ms, running_memory_byte) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(verdict_subtask_id)
        .bind(row.task_data_id)
        .bind(row.verdict.as_str())
        .bind(row.score_raw)
        .bind(row.running_time_ms)
        .bind(row.running_memory_byte)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn finish_subtask_verdict(
        &self,
        verdict_subtask_id: i64,
        verdict: Verdict,
        score_raw: f64,
        running_time_ms: i64,
        running_memory_byte: i64,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE verdict_subtasks SET verdict = ?, score_raw = ?, running_time_ms = ?, \
             running_memory_byte = ? WHERE id = ?",
        )
        .bind(verdict.as_str())
        .bind(score_raw)
        .bind(running_time_ms)
        .bind(running_memory_byte)
        .bind(verdict_subtask_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn finish_verdict(
        &self,
        verdict_id: i64,
        verdict: Verdict,
        score_raw: f64,
        running_time_ms: i64,
        running_memory_byte: i64,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE verdicts SET verdict = ?, score_raw = ?, running_time_ms = ?, \
             running_memory_byte = ? WHERE id = ?",
        )
        .bind(verdict.as_str())
        .bind(score_raw)
        .bind(running_time_ms)
        .bind(running_memory_byte)
        .bind(verdict_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Subtask (order, score) pairs across all official verdicts of the user
    /// on this task. `contest_id` narrows to one contest's submissions; the
    /// global scope spans the user's entire official history.
    pub async fn official_subtask_scores(
        &self,
        task_id: i64,
        user_id: i64,
        contest_id: Option<i64>,
    ) -> Result<Vec<(i64, f64)>> {
        let base = "SELECT st.ord AS ord, COALESCE(vs.score_raw, 0.0) AS score \
                    FROM verdict_subtasks vs \
                    JOIN verdicts v ON v.id = vs.verdict_id \
                    JOIN submissions s ON s.id = v.submission_id \
                    JOIN subtasks st ON st.id = vs.subtask_id \
                    WHERE st.task_id = ? AND s.user_id = ? AND v.is_official = 1";

        let rows = match contest_id {
            Some(contest_id) => {
                sqlx::query(&format!("{} AND s.contest_id = ?", base))
                    .bind(task_id)
                    .bind(user_id)
                    .bind(contest_id)
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                sqlx::query(base)
                    .bind(task_id)
                    .bind(user_id)
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        let mut scores = Vec::with_capacity(rows.len());
        for row in rows {
            scores.push((row.try_get("ord")?, row.try_get("score")?));
        }
        Ok(scores)
    }

    pub async fn upsert_overall_verdict(
        &self,
        task_id: i64,
        user_id: i64,
        contest_id: Option<i64>,
        score_overall: f64,
        score_max: f64,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO overall_verdicts (task_id, user_id, contest_id, score_overall, \
             score_max) VALUES (?, ?, ?, ?, ?) \
             ON CONFLICT (task_id, user_id, contest_id) \
             DO UPDATE SET score_overall = excluded.score_overall, \
             score_max = excluded.score_max",
        )
        .bind(task_id)
        .bind(user_id)
        .bind(contest_id.unwrap_or(GLOBAL_CONTEST_SCOPE))
        .bind(score_overall)
        .bind(score_max)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Recompute the global overall score, and the contest-scoped one when the
    /// submission belongs to a contest, from the full official history.
    pub async fn refresh_overall_verdicts(
        &self,
        task_id: i64,
        user_id: i64,
        contest_id: Option<i64>,
        score_max: f64,
    ) -> Result<()> {
        let global_rows = self.official_subtask_scores(task_id, user_id, None).await?;
        self.upsert_overall_verdict(task_id, user_id, None, score_overall(&global_rows), score_max)
            .await?;

        if let Some(contest) = contest_id {
            let contest_rows = self
                .official_subtask_scores(task_id, user_id, Some(contest))
                .await?;
            self.upsert_overall_verdict(
                task_id,
                user_id,
                Some(contest),
                score_overall(&contest_rows),
                score_max,
            )
            .await?;
        }

        Ok(())
    }

    #[allow(dead_code)]
    pub async fn overall_score(
        &self,
        task_id: i64,
        user_id: i64,
        contest_id: Option<i64>,
    ) -> Result<Option<(f64, f64)>> {
        let row = sqlx::query(
            "SELECT score_overall, score_max FROM overall_verdicts \
             WHERE task_id = ? AND user_id = ? AND contest_id = ?",
        )
        .bind(task_id)
        .bind(user_id)
        .bind(contest_id.unwrap_or(GLOBAL_CONTEST_SCOPE))
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some((
                row.try_get("score_overall")?,
                row.try_get("score_max")?,
            ))),
            None => Ok(None),
        }
    }

    /// Retract the submission's official verdict before it is re-enqueued:
    /// clear the pointer and flip `is_official` atomically, then rebuild the
    /// overall scores from the remaining history.
    pub async fn prepare_rejudge(&self, submission_id: i64) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            "SELECT task_id, user_id, contest_id, official_verdict_id \
             FROM submissions WHERE id = ?",
        )
        .bind(submission_id)
        .fetch_one(tx.as_mut())
        .await
        .with_context(|| format!("Submission {} not found", submission_id))?;

        let task_id: i64 = row.try_get("task_id")?;
        let user_id: i64 = row.try_get("user_id")?;
        let contest_id: Option<i64> = row.try_get("contest_id")?;
        let official_verdict_id: Option<i64> = row.try_get("official_verdict_id")?;

        sqlx::query("UPDATE submissions SET official_verdict_id = NULL WHERE id = ?")
            .bind(submission_id)
            .execute(tx.as_mut())
            .await?;

        if let Some(verdict_id) = official_verdict_id {
            sqlx::query("UPDATE verdicts SET is_official = 0 WHERE id = ?")
                .bind(verdict_id)
                .execute(tx.as_mut())
                .await?;
        }

        tx.commit().await?;

        let score_max: f64 = sqlx::query(
            "SELECT COALESCE(SUM(score_max), 0.0) AS score_max FROM subtasks WHERE task_id = ?",
        )
        .bind(task_id)
        .fetch_one(&self.pool)
        .await?
        .try_get("score_max")?;

        self.refresh_overall_verdicts(task_id, user_id, contest_id, score_max)
            .await
    }
}

fn script_from_row(row: &sqlx::sqlite::SqliteRow, prefix: &str) -> Option<Script> {
    let language: Option<String> = row.try_get(format!("{}_language", prefix).as_str()).ok()?;
    let file_name: Option<String> = row.try_get(format!("{}_file_name", prefix).as_str()).ok()?;
    let file_hash: Option<String> = row.try_get(format!("{}_file_hash", prefix).as_str()).ok()?;
    Some(Script {
        language: language?,
        file_name: file_name?,
        file_hash: file_hash?,
    })
}

const SCHEMA: &[&str] = &[
    r"
    CREATE TABLE IF NOT EXISTS tasks (
        id                          INTEGER PRIMARY KEY,
        kind                        TEXT    NOT NULL,
        time_limit_ms               INTEGER,
        memory_limit_byte           INTEGER,
        compile_time_limit_ms       INTEGER,
        compile_memory_limit_byte   INTEGER,
        checker_kind                TEXT    NOT NULL DEFAULT 'lenient_diff',
        checker_language            TEXT,
        checker_file_name           TEXT,
        checker_file_hash           TEXT,
        communicator_language       TEXT,
        communicator_file_name      TEXT,
        communicator_file_hash      TEXT
    );",
    r"
    CREATE TABLE IF NOT EXISTS subtasks (
        id          INTEGER PRIMARY KEY,
        task_id     INTEGER NOT NULL,
        ord         INTEGER NOT NULL,
        score_max   REAL    NOT NULL,
        FOREIGN KEY (task_id) REFERENCES tasks (id)
    );",
    r"
    CREATE TABLE IF NOT EXISTS task_data (
        id                INTEGER PRIMARY KEY,
        subtask_id        INTEGER NOT NULL,
        ord               INTEGER NOT NULL,
        input_file_name   TEXT,
        input_file_hash   TEXT,
        judge_file_name   TEXT    NOT NULL,
        judge_file_hash   TEXT    NOT NULL,
        FOREIGN KEY (subtask_id) REFERENCES subtasks (id)
    );",
    r"
    CREATE TABLE IF NOT EXISTS submissions (
        id                    INTEGER PRIMARY KEY,
        task_id               INTEGER NOT NULL,
        user_id               INTEGER NOT NULL,
        contest_id            INTEGER,
        language              TEXT    NOT NULL,
        source_file_hash      TEXT,
        official_verdict_id   INTEGER,
        FOREIGN KEY (task_id) REFERENCES tasks (id)
    );",
    r"
    CREATE TABLE IF NOT EXISTS submission_files (
        submission_id   INTEGER NOT NULL,
        file_name       TEXT    NOT NULL,
        file_hash       TEXT    NOT NULL,
        PRIMARY KEY (submission_id, file_name),
        FOREIGN KEY (submission_id) REFERENCES submissions (id)
    );",
    r"
    CREATE TABLE IF NOT EXISTS verdicts (
        id                    INTEGER PRIMARY KEY,
        submission_id         INTEGER NOT NULL,
        created_at            TEXT    NOT NULL DEFAULT (datetime('now')),
        is_official           INTEGER NOT NULL DEFAULT 1,
        verdict               TEXT,
        score_raw             REAL,
        running_time_ms       INTEGER,
        running_memory_byte   INTEGER,
        compile_time_ms       INTEGER,
        compile_memory_byte   INTEGER,
        FOREIGN KEY (submission_id) REFERENCES submissions (id)
    );",
    r"
    CREATE TABLE IF NOT EXISTS verdict_subtasks (
        id                    INTEGER PRIMARY KEY,
        verdict_id            INTEGER NOT NULL,
        subtask_id            INTEGER NOT NULL,
        verdict               TEXT,
        score_raw             REAL,
        running_time_ms       INTEGER,
        running_memory_byte   INTEGER,
        FOREIGN KEY (verdict_id) REFERENCES verdicts (id),
        FOREIGN KEY (subtask_id) REFERENCES subtasks (id)
    );",
    r"
    CREATE TABLE IF NOT EXISTS verdict_task_data (
        id                    INTEGER PRIMARY KEY,
        verdict_subtask_id    INTEGER NOT NULL,
        task_data_id          INTEGER NOT NULL,
        verdict               TEXT    NOT NULL,
        score_raw             REAL    NOT NULL,
        running_time_ms       INTEGER NOT NULL,
        running_memory_byte   INTEGER NOT NULL,
        FOREIGN KEY (verdict_subtask_id) REFERENCES verdict_subtasks (id),
        FOREIGN KEY (task_data_id) REFERENCES task_data (id)
    );",
    r"
    CREATE TABLE IF NOT EXISTS overall_verdicts (
        id              INTEGER PRIMARY KEY,
        task_id         INTEGER NOT NULL,
        user_id         INTEGER NOT NULL,
        contest_id      INTEGER NOT NULL DEFAULT 0,
        score_overall   REAL    NOT NULL,
        score_max       REAL    NOT NULL,
        UNIQUE (task_id, user_id, contest_id)
    );",
];
