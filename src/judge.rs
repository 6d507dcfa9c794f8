//! Verdict aggregation engine
//!
//! Walks Task -> Subtask -> TaskData in declared order, driving the
//! kind-specific evaluation strategy per leaf and reducing scores bottom-up.
//!
//! Policy, in order of precedence:
//! - a failed compilation skips every test and forces CompileError;
//! - within a subtask, the first bad verdict poisons the remaining tests;
//! - tests sharing a judge-file hash are evaluated at most once per
//!   judgement (Skipped results are never cached);
//! - subtask score is the minimum test fraction scaled by score_max;
//! - running time/memory roll up as max, not sum.
//!
//! Every tree node is persisted as soon as it is known, so a crash leaves an
//! inspectable partial tree.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, error};

use crate::checker::Checker;
use crate::compile::{self, CompilationResult};
use crate::evaluation::{
    BatchEvaluator, CommunicationEvaluator, ContestantProgram, EvaluationResult,
    OutputOnlyEvaluator, TaskDataEvaluator,
};
use crate::languages;
use crate::model::{
    CompiledScript, Submission, Subtask, SubtaskVerdict, Task, TaskData, TaskDataVerdict,
    TaskKind, VerdictTree,
};
use crate::sandbox::BoxPool;
use crate::store::Store;
use crate::verdict::Verdict;

pub struct JudgeRunner<'a> {
    store: &'a Store,
    boxes: Arc<BoxPool>,
    checker: Checker,
    communicator: Option<CompiledScript>,
}

impl<'a> JudgeRunner<'a> {
    pub fn new(
        store: &'a Store,
        boxes: Arc<BoxPool>,
        checker: Checker,
        communicator: Option<CompiledScript>,
    ) -> Self {
        Self {
            store,
            boxes,
            checker,
            communicator,
        }
    }

    /// Judge one submission end to end: compile if the task kind calls for
    /// it, pick the evaluation strategy, walk the tree, and persist. The sole
    /// entry point consumed by the worker.
    pub async fn evaluate(
        self,
        task: &Task,
        submission: &Submission,
        task_root: &Path,
        output_root: &Path,
        submission_root: &Path,
    ) -> Result<VerdictTree> {
        let (compilation, evaluator): (CompilationResult, Box<dyn TaskDataEvaluator>) =
            match &task.kind {
                TaskKind::Batch => {
                    let language = languages::get_language(&submission.language)
                        .with_context(|| {
                            format!("Unsupported language: {}", submission.language)
                        })?;
                    let compilation = compile::compile_submission(
                        &self.boxes,
                        &task.limits,
                        &language,
                        submission_root,
                    )
                    .await?;

                    let evaluator = BatchEvaluator {
                        boxes: self.boxes.clone(),
                        task_root: task_root.to_path_buf(),
                        output_root: output_root.to_path_buf(),
                        submission_root: submission_root.to_path_buf(),
                        contestant: ContestantProgram {
                            language,
                            exe_name: compilation.exe_name.clone(),
                        },
                        checker: self.checker,
                        limits: task.limits.clone(),
                    };
                    (compilation, Box::new(evaluator))
                }
                TaskKind::OutputOnly => {
                    let evaluator = OutputOnlyEvaluator {
                        task_root: task_root.to_path_buf(),
                        submission_root: submission_root.to_path_buf(),
                        checker: self.checker,
                    };
                    // No compile step exists for this strategy
                    let compilation = CompilationResult {
                        verdict: Verdict::Accepted,
                        compile_time_ms: 0,
                        compile_memory_byte: 0,
                        exe_name: String::new(),
                    };
                    (compilation, Box::new(evaluator))
                }
                TaskKind::Communication { .. } => {
                    let language = languages::get_language(&submission.language)
                        .with_context(|| {
                            format!("Unsupported language: {}", submission.language)
                        })?;
                    let communicator = self
                        .communicator
                        .clone()
                        .context("Communication task without a compiled communicator")?;
                    let compilation = compile::compile_submission(
                        &self.boxes,
                        &task.limits,
                        &language,
                        submission_root,
                    )
                    .await?;

                    let evaluator = CommunicationEvaluator {
                        boxes: self.boxes.clone(),
                        task_root: task_root.to_path_buf(),
                        output_root: output_root.to_path_buf(),
                        submission_root: submission_root.to_path_buf(),
                        contestant: ContestantProgram {
                            language,
                            exe_name: compilation.exe_name.clone(),
                        },
                        communicator,
                        checker: self.checker,
                        limits: task.limits.clone(),
                    };
                    (compilation, Box::new(evaluator))
                }
            };

        judge_task(self.store, task, submission, &compilation, evaluator.as_ref()).await
    }
}

/// Walk the tree with an already-chosen strategy and persist as we go.
pub(crate) async fn judge_task(
    store: &Store,
    task: &Task,
    submission: &Submission,
    compilation: &CompilationResult,
    evaluator: &dyn TaskDataEvaluator,
) -> Result<VerdictTree> {
    let verdict_id = store
        .open_verdict(
            submission.id,
            compilation.compile_time_ms,
            compilation.compile_memory_byte,
        )
        .await?;

    let compile_failed = compilation.verdict != Verdict::Accepted;

    // Cross-subtask result cache, scoped to this judgement
    let mut cache: HashMap<String, EvaluationResult> = HashMap::new();

    let mut subtasks = Vec::with_capacity(task.subtasks.len());
    let mut verdict = Verdict::Accepted;
    let mut score_raw = 0.0;
    let mut running_time_ms = 0;
    let mut running_memory_byte = 0;

    for subtask in &task.subtasks {
        let child = judge_subtask(
            store,
            verdict_id,
            subtask,
            evaluator,
            &mut cache,
            compile_failed,
        )
        .await?;

        verdict = verdict.worst(child.verdict);
        score_raw += child.score_raw;
        running_time_ms = running_time_ms.max(child.running_time_ms);
        running_memory_byte = running_memory_byte.max(child.running_memory_byte);
        subtasks.push(child);
    }

    let score_max = task.score_max();
    if compile_failed {
        verdict = Verdict::CompileError;
    } else if score_raw > 0.0 && score_raw < score_max {
        verdict = Verdict::Partial;
    }

    store
        .finish_verdict(verdict_id, verdict, score_raw, running_time_ms, running_memory_byte)
        .await?;

    // The just-finished verdict is official, so the denormalized overall
    // scores are rebuilt from scratch for both scopes.
    store
        .refresh_overall_verdicts(task.id, submission.user_id, submission.contest_id, score_max)
        .await?;

    Ok(VerdictTree {
        verdict_id,
        verdict,
        score_raw,
        running_time_ms,
        running_memory_byte,
        compile_time_ms: compilation.compile_time_ms,
        compile_memory_byte: compilation.compile_memory_byte,
        subtasks,
    })
}

async fn judge_subtask(
    store: &Store,
    verdict_id: i64,
    subtask: &Subtask,
    evaluator: &dyn TaskDataEvaluator,
    cache: &mut HashMap<String, EvaluationResult>,
    compile_failed: bool,
) -> Result<SubtaskVerdict> {
    debug!("Judging subtask {} (order {})", subtask.id, subtask.order);
    let verdict_subtask_id = store.open_subtask_verdict(verdict_id, subtask.id).await?;

    let mut data_verdicts = Vec::with_capacity(subtask.data.len());
    let mut verdict = Verdict::Accepted;
    let mut min_fraction = 1.0f64;
    let mut running_time_ms = 0;
    let mut running_memory_byte = 0;
    let mut poisoned = false;

    for data in &subtask.data {
        let skip = compile_failed || poisoned;
        let result = judge_task_data(evaluator, data, cache, skip).await;

        let row = TaskDataVerdict {
            task_data_id: data.id,
            verdict: result.verdict,
            score_raw: result.score_raw,
            running_time_ms: result.running_time_ms,
            running_memory_byte: result.running_memory_byte,
        };
        store
            .insert_task_data_verdict(verdict_subtask_id, &row)
            .await?;

        verdict = verdict.worst(result.verdict);
        min_fraction = min_fraction.min(result.score_raw);
        running_time_ms = running_time_ms.max(result.running_time_ms);
        running_memory_byte = running_memory_byte.max(result.running_memory_byte);
        if result.verdict.is_bad() {
            poisoned = true;
        }

        data_verdicts.push(row);
    }

    let score_raw = (min_fraction * subtask.score_max).clamp(0.0, subtask.score_max);

    store
        .finish_subtask_verdict(
            verdict_subtask_id,
            verdict,
            score_raw,
            running_time_ms,
            running_memory_byte,
        )
        .await?;

    Ok(SubtaskVerdict {
        verdict_subtask_id,
        subtask_id: subtask.id,
        verdict,
        score_raw,
        running_time_ms,
        running_memory_byte,
        data: data_verdicts,
    })
}

async fn judge_task_data(
    evaluator: &dyn TaskDataEvaluator,
    data: &TaskData,
    cache: &mut HashMap<String, EvaluationResult>,
    skip: bool,
) -> EvaluationResult {
    if skip {
        return EvaluationResult::skipped();
    }

    if let Some(cached) = cache.get(&data.judge_file_hash) {
        return cached.clone();
    }

    let result = match evaluator.evaluate(data).await {
        Ok(result) => result,
        Err(e) => {
            // One broken test must not abort the judgement tree
            error!("Evaluation failed for task data {}: {:#}", data.id, e);
            EvaluationResult::judge_failed()
        }
    };

    // Skipped reflects poisoning state, not the test's true outcome
    if result.verdict != Verdict::Skipped {
        cache.insert(data.judge_file_hash.clone(), result.clone());
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::test_fixtures::{memory_store, seed_batch_task, seed_submission};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Evaluator returning pre-scripted results keyed by judge file hash,
    /// recording every invocation.
    struct ScriptedEvaluator {
        results: HashMap<String, EvaluationResult>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedEvaluator {
        fn new(results: &[(&str, EvaluationResult)]) -> Self {
            Self {
                results: results
                    .iter()
                    .map(|(hash, result)| (hash.to_string(), result.clone()))
                    .collect(),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl TaskDataEvaluator for ScriptedEvaluator {
        async fn evaluate(&self, data: &TaskData) -> Result<EvaluationResult> {
            self.calls
                .lock()
                .unwrap()
                .push(data.judge_file_hash.clone());
            self.results
                .get(&data.judge_file_hash)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("no scripted result for {}", data.judge_file_hash))
        }
    }

    fn accepted(time_ms: i64, memory_byte: i64) -> EvaluationResult {
        EvaluationResult {
            verdict: Verdict::Accepted,
            score_raw: 1.0,
            running_time_ms: time_ms,
            running_memory_byte: memory_byte,
        }
    }

    fn failed(verdict: Verdict) -> EvaluationResult {
        EvaluationResult {
            verdict,
            score_raw: 0.0,
            running_time_ms: 10,
            running_memory_byte: 1000,
        }
    }

    fn ok_compilation() -> CompilationResult {
        CompilationResult {
            verdict: Verdict::Accepted,
            compile_time_ms: 50,
            compile_memory_byte: 10_000,
            exe_name: "main".to_string(),
        }
    }

    #[tokio::test]
    async fn test_all_accepted_scores_full_marks() {
        let store = memory_store().await;
        seed_batch_task(&store, 1, &[(100.0, &["h1", "h2"])]).await;
        seed_submission(&store, 10, 1, 5, None).await;

        let task = store.load_task(1).await.unwrap();
        let submission = store.load_submission(10).await.unwrap();
        let evaluator = ScriptedEvaluator::new(&[
            ("h1", accepted(20, 5000)),
            ("h2", accepted(35, 3000)),
        ]);

        let tree = judge_task(&store, &task, &submission, &ok_compilation(), &evaluator)
            .await
            .unwrap();

        assert_eq!(tree.verdict, Verdict::Accepted);
        assert_eq!(tree.score_raw, 100.0);
        // time/memory roll up as max across children
        assert_eq!(tree.running_time_ms, 35);
        assert_eq!(tree.running_memory_byte, 5000);
        assert_eq!(tree.subtasks[0].subtask_id, task.subtasks[0].id);
        assert!(tree.subtasks[0].verdict_subtask_id > 0);
        assert_eq!(tree.subtasks[0].data.len(), 2);
    }

    #[tokio::test]
    async fn test_min_reducer_zeroes_subtask_on_late_failure() {
        // First test passes, second times out: min(1.0, 0.0) * 100 = 0
        let store = memory_store().await;
        seed_batch_task(&store, 1, &[(100.0, &["h1", "h2"])]).await;
        seed_submission(&store, 10, 1, 5, None).await;

        let task = store.load_task(1).await.unwrap();
        let submission = store.load_submission(10).await.unwrap();
        let evaluator = ScriptedEvaluator::new(&[
            ("h1", accepted(20, 5000)),
            ("h2", failed(Verdict::TimeLimitExceeded)),
        ]);

        let tree = judge_task(&store, &task, &submission, &ok_compilation(), &evaluator)
            .await
            .unwrap();

        assert_eq!(tree.verdict, Verdict::TimeLimitExceeded);
        assert_eq!(tree.score_raw, 0.0);
    }

    #[tokio::test]
    async fn test_bad_verdict_poisons_rest_of_subtask_only() {
        let store = memory_store().await;
        seed_batch_task(&store, 1, &[(50.0, &["h1", "h2", "h3"]), (50.0, &["h4"])]).await;
        seed_submission(&store, 10, 1, 5, None).await;

        let task = store.load_task(1).await.unwrap();
        let submission = store.load_submission(10).await.unwrap();
        let evaluator = ScriptedEvaluator::new(&[
            ("h1", failed(Verdict::WrongAnswer)),
            ("h2", accepted(5, 100)),
            ("h3", accepted(5, 100)),
            ("h4", accepted(5, 100)),
        ]);

        let tree = judge_task(&store, &task, &submission, &ok_compilation(), &evaluator)
            .await
            .unwrap();

        // h2/h3 never ran; the second subtask was unaffected
        assert_eq!(evaluator.calls(), vec!["h1", "h4"]);

        let first = &tree.subtasks[0];
        assert_eq!(first.verdict, Verdict::WrongAnswer);
        assert_eq!(first.score_raw, 0.0);
        assert_eq!(first.data[1].verdict, Verdict::Skipped);
        assert_eq!(first.data[2].verdict, Verdict::Skipped);

        let second = &tree.subtasks[1];
        assert_eq!(second.verdict, Verdict::Accepted);
        assert_eq!(second.score_raw, 50.0);

        assert_eq!(tree.verdict, Verdict::Partial);
        assert_eq!(tree.score_raw, 50.0);
    }

    #[tokio::test]
    async fn test_judge_failed_scores_zero_but_does_not_poison() {
        let store = memory_store().await;
        seed_batch_task(&store, 1, &[(100.0, &["h1", "h2"])]).await;
        seed_submission(&store, 10, 1, 5, None).await;

        let task = store.load_task(1).await.unwrap();
        let submission = store.load_submission(10).await.unwrap();
        let evaluator = ScriptedEvaluator::new(&[
            ("h1", failed(Verdict::JudgeFailed)),
            ("h2", accepted(5, 100)),
        ]);

        let tree = judge_task(&store, &task, &submission, &ok_compilation(), &evaluator)
            .await
            .unwrap();

        // Both tests ran; nothing was skipped
        assert_eq!(evaluator.calls(), vec!["h1", "h2"]);
        assert_eq!(tree.subtasks[0].data[1].verdict, Verdict::Accepted);
        assert_eq!(tree.subtasks[0].verdict, Verdict::JudgeFailed);
        assert_eq!(tree.subtasks[0].score_raw, 0.0);
    }

    #[tokio::test]
    async fn test_shared_judge_hash_evaluated_once() {
        // h1 appears in both subtasks; the cached result is reused verbatim
        let store = memory_store().await;
        seed_batch_task(&store, 1, &[(40.0, &["h1"]), (60.0, &["h1", "h2"])]).await;
        seed_submission(&store, 10, 1, 5, None).await;

        let task = store.load_task(1).await.unwrap();
        let submission = store.load_submission(10).await.unwrap();
        let evaluator = ScriptedEvaluator::new(&[
            ("h1", accepted(25, 2000)),
            ("h2", accepted(5, 100)),
        ]);

        let tree = judge_task(&store, &task, &submission, &ok_compilation(), &evaluator)
            .await
            .unwrap();

        assert_eq!(evaluator.calls(), vec!["h1", "h2"]);
        assert_eq!(tree.score_raw, 100.0);
        // The reused result carries the original measurements
        assert_eq!(tree.subtasks[1].data[0].running_time_ms, 25);
    }

    #[tokio::test]
    async fn test_skipped_results_are_not_cached() {
        // h2 is poisoned (skipped) in subtask 1 but must still run in subtask 2
        let store = memory_store().await;
        seed_batch_task(&store, 1, &[(50.0, &["h1", "h2"]), (50.0, &["h2"])]).await;
        seed_submission(&store, 10, 1, 5, None).await;

        let task = store.load_task(1).await.unwrap();
        let submission = store.load_submission(10).await.unwrap();
        let evaluator = ScriptedEvaluator::new(&[
            ("h1", failed(Verdict::WrongAnswer)),
            ("h2", accepted(5, 100)),
        ]);

        let tree = judge_task(&store, &task, &submission, &ok_compilation(), &evaluator)
            .await
            .unwrap();

        assert_eq!(evaluator.calls(), vec!["h1", "h2"]);
        assert_eq!(tree.subtasks[0].data[1].verdict, Verdict::Skipped);
        assert_eq!(tree.subtasks[1].data[0].verdict, Verdict::Accepted);
        assert_eq!(tree.subtasks[1].score_raw, 50.0);
    }

    #[tokio::test]
    async fn test_compile_error_skips_everything() {
        let store = memory_store().await;
        seed_batch_task(&store, 1, &[(40.0, &["h1"]), (60.0, &["h2"])]).await;
        seed_submission(&store, 10, 1, 5, None).await;

        let task = store.load_task(1).await.unwrap();
        let submission = store.load_submission(10).await.unwrap();
        let evaluator = ScriptedEvaluator::new(&[]);

        let compilation = CompilationResult {
            verdict: Verdict::TimeLimitExceeded,
            compile_time_ms: 10_000,
            compile_memory_byte: 0,
            exe_name: "main".to_string(),
        };

        let tree = judge_task(&store, &task, &submission, &compilation, &evaluator)
            .await
            .unwrap();

        assert!(evaluator.calls().is_empty());
        assert_eq!(tree.verdict, Verdict::CompileError);
        assert_eq!(tree.score_raw, 0.0);
        assert_eq!(tree.compile_time_ms, 10_000);
        assert_eq!(tree.compile_memory_byte, 0);
        for subtask in &tree.subtasks {
            assert_eq!(subtask.score_raw, 0.0);
            for data in &subtask.data {
                assert_eq!(data.verdict, Verdict::Skipped);
            }
        }
    }

    #[tokio::test]
    async fn test_evaluator_error_downgrades_to_judge_failed() {
        let store = memory_store().await;
        seed_batch_task(&store, 1, &[(100.0, &["h1", "h2"])]).await;
        seed_submission(&store, 10, 1, 5, None).await;

        let task = store.load_task(1).await.unwrap();
        let submission = store.load_submission(10).await.unwrap();
        // No scripted result for h1: the evaluator errors on it
        let evaluator = ScriptedEvaluator::new(&[("h2", accepted(5, 100))]);

        let tree = judge_task(&store, &task, &submission, &ok_compilation(), &evaluator)
            .await
            .unwrap();

        assert_eq!(tree.subtasks[0].data[0].verdict, Verdict::JudgeFailed);
        // JudgeFailed does not poison: h2 still ran
        assert_eq!(tree.subtasks[0].data[1].verdict, Verdict::Accepted);
    }

    #[tokio::test]
    async fn test_partial_checker_scores_scale_by_minimum() {
        let store = memory_store().await;
        seed_batch_task(&store, 1, &[(80.0, &["h1", "h2"])]).await;
        seed_submission(&store, 10, 1, 5, None).await;

        let task = store.load_task(1).await.unwrap();
        let submission = store.load_submission(10).await.unwrap();
        let evaluator = ScriptedEvaluator::new(&[
            (
                "h1",
                EvaluationResult {
                    verdict: Verdict::Partial,
                    score_raw: 0.5,
                    running_time_ms: 5,
                    running_memory_byte: 100,
                },
            ),
            ("h2", accepted(5, 100)),
        ]);

        let tree = judge_task(&store, &task, &submission, &ok_compilation(), &evaluator)
            .await
            .unwrap();

        assert_eq!(tree.subtasks[0].score_raw, 40.0);
        assert_eq!(tree.subtasks[0].verdict, Verdict::Partial);
        assert_eq!(tree.verdict, Verdict::Partial);
    }

    #[tokio::test]
    async fn test_overall_verdict_tracks_best_per_subtask_across_submissions() {
        let store = memory_store().await;
        seed_batch_task(&store, 1, &[(60.0, &["h1"]), (40.0, &["h2"])]).await;
        seed_submission(&store, 10, 1, 5, None).await;
        seed_submission(&store, 11, 1, 5, None).await;

        let task = store.load_task(1).await.unwrap();

        // First submission: solves only subtask 1
        let submission = store.load_submission(10).await.unwrap();
        let evaluator = ScriptedEvaluator::new(&[
            ("h1", accepted(5, 100)),
            ("h2", failed(Verdict::WrongAnswer)),
        ]);
        judge_task(&store, &task, &submission, &ok_compilation(), &evaluator)
            .await
            .unwrap();
        assert_eq!(
            store.overall_score(1, 5, None).await.unwrap(),
            Some((60.0, 100.0))
        );

        // Second submission: solves only subtask 2; the overall takes the
        // best of each subtask order across the official history
        let submission = store.load_submission(11).await.unwrap();
        let evaluator = ScriptedEvaluator::new(&[
            ("h1", failed(Verdict::WrongAnswer)),
            ("h2", accepted(5, 100)),
        ]);
        judge_task(&store, &task, &submission, &ok_compilation(), &evaluator)
            .await
            .unwrap();
        assert_eq!(
            store.overall_score(1, 5, None).await.unwrap(),
            Some((100.0, 100.0))
        );

        // Recomputation is idempotent
        store
            .refresh_overall_verdicts(1, 5, None, 100.0)
            .await
            .unwrap();
        assert_eq!(
            store.overall_score(1, 5, None).await.unwrap(),
            Some((100.0, 100.0))
        );
    }

    #[tokio::test]
    async fn test_rejudge_retracts_old_verdict_from_overall() {
        let store = memory_store().await;
        seed_batch_task(&store, 1, &[(60.0, &["h1"]), (40.0, &["h2"])]).await;
        seed_submission(&store, 10, 1, 5, None).await;

        let task = store.load_task(1).await.unwrap();
        let submission = store.load_submission(10).await.unwrap();

        let evaluator = ScriptedEvaluator::new(&[
            ("h1", accepted(5, 100)),
            ("h2", failed(Verdict::WrongAnswer)),
        ]);
        let first = judge_task(&store, &task, &submission, &ok_compilation(), &evaluator)
            .await
            .unwrap();
        assert_eq!(first.score_raw, 60.0);

        // Retract, then judge again with a different outcome
        store.prepare_rejudge(10).await.unwrap();
        assert_eq!(
            store.overall_score(1, 5, None).await.unwrap(),
            Some((0.0, 100.0))
        );

        let evaluator = ScriptedEvaluator::new(&[
            ("h1", failed(Verdict::WrongAnswer)),
            ("h2", accepted(5, 100)),
        ]);
        let second = judge_task(&store, &task, &submission, &ok_compilation(), &evaluator)
            .await
            .unwrap();
        assert_ne!(second.verdict_id, first.verdict_id);

        // Only the new official verdict counts toward the overall score
        assert_eq!(
            store.overall_score(1, 5, None).await.unwrap(),
            Some((40.0, 100.0))
        );
    }

    #[tokio::test]
    async fn test_contest_submissions_update_both_scopes() {
        let store = memory_store().await;
        seed_batch_task(&store, 1, &[(100.0, &["h1"])]).await;
        seed_submission(&store, 10, 1, 5, Some(7)).await;

        let task = store.load_task(1).await.unwrap();
        let submission = store.load_submission(10).await.unwrap();
        let evaluator = ScriptedEvaluator::new(&[("h1", accepted(5, 100))]);

        judge_task(&store, &task, &submission, &ok_compilation(), &evaluator)
            .await
            .unwrap();

        assert_eq!(
            store.overall_score(1, 5, None).await.unwrap(),
            Some((100.0, 100.0))
        );
        assert_eq!(
            store.overall_score(1, 5, Some(7)).await.unwrap(),
            Some((100.0, 100.0))
        );
        assert_eq!(store.overall_score(1, 5, Some(8)).await.unwrap(), None);
    }
}
