/// Run/Submit behaviour of the controller against stub executors and the
/// in-memory store
///
/// These tests verify:
/// 1. Verdicts for correct, wrong, throwing and non-compiling solutions
/// 2. Run never persists anything
/// 3. Submit writes exactly one record and counts a solve once
/// 4. Fallback is transparent to the caller
/// 5. Persistence failures never cost the caller a verdict

#[cfg(test)]
mod run_submit_tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use judge_common::memory::MemoryStore;
    use judge_common::store::SubmissionStore;
    use judge_common::types::{
        ComparisonMode, Difficulty, ExecutionBackend, ExecutionOutcome, OutcomeStatus, Problem,
        ProblemStats, ProviderStatus, TestCase, Verdict,
    };

    use crate::builder::ExecutionRequest;
    use crate::controller::{JudgeEngine, RunRequest, SubmitRequest};
    use crate::error::{ExecutionError, JudgeError};
    use crate::executor::{should_halt, Executor};
    use crate::languages::LanguageRegistry;

    #[derive(Clone, Copy)]
    enum Behaviour {
        Correct,
        /// Returns the reversed expected output
        Wrong,
        Throws,
        CompileFails,
        Unreachable,
    }

    /// Pretends to run a solution with a fixed behaviour
    struct StubExecutor {
        behaviour: Behaviour,
        calls: AtomicUsize,
        cases: AtomicUsize,
    }

    impl StubExecutor {
        fn new(behaviour: Behaviour) -> Arc<Self> {
            Arc::new(Self { behaviour, calls: AtomicUsize::new(0), cases: AtomicUsize::new(0) })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn cases(&self) -> usize {
            self.cases.load(Ordering::SeqCst)
        }

        fn outcome(&self, test_case: &TestCase) -> ExecutionOutcome {
            let expected = test_case.expected_output.clone().unwrap_or_else(|| "ok".to_string());
            let (stdout, stderr, status, id) = match self.behaviour {
                Behaviour::Correct => (expected, String::new(), OutcomeStatus::Accepted, 3),
                Behaviour::Wrong => (expected.chars().rev().collect(), String::new(), OutcomeStatus::WrongAnswer, 4),
                Behaviour::Throws => (String::new(), "Error: boom".to_string(), OutcomeStatus::RuntimeError, 11),
                Behaviour::CompileFails => (String::new(), String::new(), OutcomeStatus::CompilationError, 6),
                Behaviour::Unreachable => unreachable!(),
            };
            ExecutionOutcome {
                stdout,
                stderr,
                compile_output: matches!(self.behaviour, Behaviour::CompileFails)
                    .then(|| "SyntaxError: Unexpected token".to_string()),
                elapsed_ms: 12,
                memory_kb: 2048,
                exit_code: Some(0),
                status,
                provider_status: ProviderStatus { id, description: status.to_string() },
            }
        }
    }

    #[async_trait]
    impl Executor for StubExecutor {
        fn name(&self) -> &'static str {
            "stub"
        }

        async fn execute(&self, request: &ExecutionRequest) -> Result<Vec<ExecutionOutcome>, ExecutionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Behaviour::Unreachable = self.behaviour {
                return Err(ExecutionError::Transport("connection refused".to_string()));
            }

            let mut outcomes = Vec::new();
            for test_case in request.test_cases() {
                self.cases.fetch_add(1, Ordering::SeqCst);
                let outcome = self.outcome(test_case);
                let halt = should_halt(outcome.status, request.mode());
                outcomes.push(outcome);
                if halt {
                    break;
                }
            }
            Ok(outcomes)
        }
    }

    const USER: &str = "user-1";

    fn two_sum() -> Problem {
        Problem {
            id: "two-sum".to_string(),
            title: "Two Sum".to_string(),
            difficulty: Difficulty::Easy,
            entry_point: "twoSum".to_string(),
            comparison: ComparisonMode::Ordered,
            limits: None,
            test_cases: vec![TestCase::visible("[2,7,11,15]\n9", "[0,1]")],
        }
    }

    fn three_sum() -> Problem {
        Problem {
            id: "three-sum".to_string(),
            title: "Three Sum".to_string(),
            difficulty: Difficulty::Medium,
            entry_point: "threeSum".to_string(),
            comparison: ComparisonMode::Unordered,
            limits: None,
            test_cases: vec![
                TestCase::visible("[-1,0,1,2,-1,-4]", "[[-1,-1,2],[-1,0,1]]"),
                TestCase::visible("[0,1,1]", "[]"),
                TestCase::hidden("[0,0,0]", "[[0,0,0]]"),
                TestCase::hidden("SECRET-INPUT", "SECRET-OUTPUT"),
            ],
        }
    }

    fn hidden_only() -> Problem {
        Problem {
            id: "hidden-only".to_string(),
            test_cases: vec![TestCase::hidden("1", "1")],
            ..two_sum()
        }
    }

    fn empty_problem() -> Problem {
        Problem { id: "empty".to_string(), test_cases: vec![], ..two_sum() }
    }

    struct Harness {
        engine: JudgeEngine,
        store: Arc<MemoryStore>,
    }

    fn engine(remote: Option<Arc<StubExecutor>>, fallback: Arc<StubExecutor>) -> Harness {
        let store = Arc::new(MemoryStore::with_problems([two_sum(), three_sum(), hidden_only(), empty_problem()]));
        let mut engine = JudgeEngine::new(
            LanguageRegistry::builtin(),
            fallback,
            store.clone(),
            store.clone(),
            store.clone(),
        );
        if let Some(remote) = remote {
            engine = engine.with_remote(remote);
        }
        Harness { engine, store }
    }

    fn run(problem_id: &str) -> RunRequest {
        RunRequest {
            source_code: "function solve() {}".to_string(),
            language: "javascript".to_string(),
            problem_id: Some(problem_id.to_string()),
            custom_input: None,
        }
    }

    fn submit(problem_id: &str, user: Option<&str>) -> SubmitRequest {
        SubmitRequest {
            source_code: "function solve() {}".to_string(),
            language: "javascript".to_string(),
            problem_id: problem_id.to_string(),
            user_id: user.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_correct_solution_is_accepted() {
        let h = engine(Some(StubExecutor::new(Behaviour::Correct)), StubExecutor::new(Behaviour::Correct));

        let response = h.engine.run(run("two-sum")).await.unwrap();

        assert_eq!(response.verdict, Verdict::Accepted);
        assert_eq!(response.passed, 1);
        assert_eq!(response.total, 1);
        assert_eq!(response.backend, ExecutionBackend::Remote);
        assert_eq!(response.test_results[0].actual_output, "[0,1]");
    }

    #[tokio::test]
    async fn test_wrong_indices_are_wrong_answer() {
        let h = engine(Some(StubExecutor::new(Behaviour::Wrong)), StubExecutor::new(Behaviour::Correct));

        let response = h.engine.run(run("two-sum")).await.unwrap();

        assert_eq!(response.verdict, Verdict::WrongAnswer);
        assert_eq!(response.passed, 0);
        assert_eq!(response.total, 1);
        assert_eq!(response.test_results[0].status, OutcomeStatus::WrongAnswer);
    }

    #[tokio::test]
    async fn test_throwing_solution_stops_submit_early() {
        let remote = StubExecutor::new(Behaviour::Throws);
        let h = engine(Some(remote.clone()), StubExecutor::new(Behaviour::Correct));

        let response = h.engine.submit(submit("three-sum", Some(USER))).await.unwrap();

        assert_eq!(response.verdict, Verdict::RuntimeError);
        assert_eq!(remote.cases(), 1);
        let records = h.store.submissions();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].outcomes.len(), 1);
    }

    #[tokio::test]
    async fn test_throwing_solution_reports_every_sample_on_run() {
        let remote = StubExecutor::new(Behaviour::Throws);
        let h = engine(Some(remote.clone()), StubExecutor::new(Behaviour::Correct));

        let response = h.engine.run(run("three-sum")).await.unwrap();

        assert_eq!(response.verdict, Verdict::RuntimeError);
        assert_eq!(remote.cases(), 2);
        assert_eq!(response.test_results.len(), 2);
        assert_eq!(response.test_results[0].error.as_deref(), Some("Error: boom"));
    }

    #[tokio::test]
    async fn test_compile_error_short_circuits() {
        let remote = StubExecutor::new(Behaviour::CompileFails);
        let h = engine(Some(remote.clone()), StubExecutor::new(Behaviour::Correct));

        let response = h.engine.run(run("three-sum")).await.unwrap();

        assert_eq!(response.verdict, Verdict::CompilationError);
        assert_eq!(remote.cases(), 1);
        assert!(response.test_results[0].error.as_deref().unwrap().contains("SyntaxError"));
    }

    #[tokio::test]
    async fn test_unsupported_language_never_executes() {
        let remote = StubExecutor::new(Behaviour::Correct);
        let fallback = StubExecutor::new(Behaviour::Correct);
        let h = engine(Some(remote.clone()), fallback.clone());

        let mut request = run("two-sum");
        request.language = "cobol".to_string();
        let err = h.engine.run(request).await.unwrap_err();

        assert!(matches!(err, JudgeError::UnsupportedLanguage(ref l) if l == "cobol"));
        assert_eq!(remote.calls() + fallback.calls(), 0);
    }

    #[tokio::test]
    async fn test_fallback_only_rejects_other_languages() {
        let fallback = StubExecutor::new(Behaviour::Correct);
        let h = engine(None, fallback.clone());

        let mut request = submit("two-sum", Some(USER));
        request.language = "python".to_string();
        let err = h.engine.submit(request).await.unwrap_err();

        assert!(matches!(err, JudgeError::UnsupportedLanguage(ref l) if l == "python"));
        assert_eq!(fallback.calls(), 0);
        assert!(h.store.submissions().is_empty());
        assert_eq!(h.store.stats("two-sum"), ProblemStats::default());

        let mut request = run("two-sum");
        request.language = "py".to_string();
        assert!(matches!(h.engine.run(request).await, Err(JudgeError::UnsupportedLanguage(_))));
        assert_eq!(fallback.calls(), 0);
    }

    #[tokio::test]
    async fn test_remote_accepts_any_registered_language() {
        let remote = StubExecutor::new(Behaviour::Correct);
        let h = engine(Some(remote.clone()), StubExecutor::new(Behaviour::Correct));

        let mut request = submit("two-sum", Some(USER));
        request.language = "python".to_string();
        let response = h.engine.submit(request).await.unwrap();

        assert_eq!(response.verdict, Verdict::Accepted);
        assert_eq!(remote.calls(), 1);
        assert_eq!(h.store.submissions()[0].language, "python");
    }

    #[tokio::test]
    async fn test_unreachable_remote_falls_back() {
        let fallback = StubExecutor::new(Behaviour::Correct);
        let h = engine(Some(StubExecutor::new(Behaviour::Unreachable)), fallback.clone());

        let response = h.engine.run(run("two-sum")).await.unwrap();

        assert_eq!(response.verdict, Verdict::Accepted);
        assert_eq!(response.backend, ExecutionBackend::Fallback);
        assert_eq!(fallback.calls(), 1);
    }

    #[tokio::test]
    async fn test_unconfigured_remote_goes_to_fallback() {
        let fallback = StubExecutor::new(Behaviour::Correct);
        let h = engine(None, fallback.clone());

        let response = h.engine.submit(submit("two-sum", Some(USER))).await.unwrap();

        assert_eq!(response.verdict, Verdict::Accepted);
        assert_eq!(response.backend, ExecutionBackend::Fallback);
        assert!(!h.engine.has_remote());
    }

    #[tokio::test]
    async fn test_both_backends_failing_is_internal_error() {
        let h = engine(
            Some(StubExecutor::new(Behaviour::Unreachable)),
            StubExecutor::new(Behaviour::Unreachable),
        );

        let response = h.engine.submit(submit("two-sum", Some(USER))).await.unwrap();

        assert_eq!(response.verdict, Verdict::InternalError);
        assert_eq!(response.backend, ExecutionBackend::None);
        assert!(response.submission_id.is_some());
        assert_eq!(h.engine.get_progress(USER).await.unwrap().total_solved, 0);
    }

    #[tokio::test]
    async fn test_repeat_accepted_submit_counts_solve_once() {
        let h = engine(Some(StubExecutor::new(Behaviour::Correct)), StubExecutor::new(Behaviour::Correct));

        let first = h.engine.submit(submit("two-sum", Some(USER))).await.unwrap();
        let second = h.engine.submit(submit("two-sum", Some(USER))).await.unwrap();

        assert!(first.first_solve);
        assert!(!second.first_solve);
        assert_ne!(first.submission_id, second.submission_id);
        assert_eq!(h.store.submissions().len(), 2);

        let progress = h.engine.get_progress(USER).await.unwrap();
        assert_eq!(progress.total_solved, 1);
        assert_eq!(progress.solved_easy, 1);
        assert_eq!(progress.xp, Difficulty::Easy.xp());
        assert_eq!(progress.current_streak, 1);

        let stats = h.store.stats("two-sum");
        assert_eq!(stats.total_submissions, 2);
        assert_eq!(stats.accepted_submissions, 2);
    }

    #[tokio::test]
    async fn test_wrong_submit_records_but_leaves_progress() {
        let h = engine(Some(StubExecutor::new(Behaviour::Wrong)), StubExecutor::new(Behaviour::Correct));

        let response = h.engine.submit(submit("two-sum", Some(USER))).await.unwrap();

        assert_eq!(response.verdict, Verdict::WrongAnswer);
        assert!(!response.first_solve);
        assert_eq!(h.store.submissions().len(), 1);
        assert_eq!(h.engine.get_progress(USER).await.unwrap().total_solved, 0);

        let stats = h.store.stats("two-sum");
        assert_eq!(stats.total_submissions, 1);
        assert_eq!(stats.accepted_submissions, 0);
        assert_eq!(stats.acceptance_rate, 0.0);
    }

    #[tokio::test]
    async fn test_submission_is_retrievable() {
        let h = engine(Some(StubExecutor::new(Behaviour::Correct)), StubExecutor::new(Behaviour::Correct));

        let response = h.engine.submit(submit("three-sum", Some(USER))).await.unwrap();
        let id = response.submission_id.unwrap();
        let record = h.engine.get_submission(&id).await.unwrap().unwrap();

        assert_eq!(record.user_id, USER);
        assert_eq!(record.problem_id, "three-sum");
        assert_eq!(record.verdict, Verdict::Accepted);
        assert_eq!(record.passed, 4);
        assert_eq!(record.total, 4);
        assert_eq!(record.outcomes.len(), 4);
        assert!(h.store.has_accepted(USER, "three-sum").await.unwrap());
    }

    #[tokio::test]
    async fn test_run_never_persists() {
        let h = engine(Some(StubExecutor::new(Behaviour::Correct)), StubExecutor::new(Behaviour::Correct));

        for _ in 0..3 {
            let response = h.engine.run(run("two-sum")).await.unwrap();
            assert_eq!(response.verdict, Verdict::Accepted);
        }

        assert!(h.store.submissions().is_empty());
        assert_eq!(h.store.stats("two-sum").total_submissions, 0);
        assert_eq!(h.engine.get_progress(USER).await.unwrap().total_solved, 0);
    }

    #[tokio::test]
    async fn test_run_response_never_contains_hidden_cases() {
        let h = engine(Some(StubExecutor::new(Behaviour::Correct)), StubExecutor::new(Behaviour::Correct));

        let response = h.engine.run(run("three-sum")).await.unwrap();
        let body = serde_json::to_string(&response).unwrap();

        assert_eq!(response.test_results.len(), 2);
        assert_eq!(response.total, 2);
        assert!(!body.contains("SECRET-INPUT"));
        assert!(!body.contains("SECRET-OUTPUT"));
        assert!(!body.contains("[0,0,0]"));
    }

    #[tokio::test]
    async fn test_run_with_custom_input() {
        let fallback = StubExecutor::new(Behaviour::Correct);
        let h = engine(None, fallback.clone());

        let request = RunRequest {
            source_code: "function twoSum(a, b) { return a; }".to_string(),
            language: "JavaScript".to_string(),
            problem_id: Some("two-sum".to_string()),
            custom_input: Some("[3,3]\n6".to_string()),
        };
        let response = h.engine.run(request).await.unwrap();

        assert_eq!(response.verdict, Verdict::Accepted);
        assert_eq!(response.total, 0);
        assert_eq!(response.test_results.len(), 1);
        assert_eq!(response.test_results[0].input, "[3,3]\n6");
        assert_eq!(response.test_results[0].expected_output, None);
    }

    #[tokio::test]
    async fn test_run_requires_problem_or_input() {
        let h = engine(None, StubExecutor::new(Behaviour::Correct));

        let request = RunRequest {
            source_code: "x".to_string(),
            language: "javascript".to_string(),
            problem_id: None,
            custom_input: None,
        };

        assert!(matches!(h.engine.run(request).await, Err(JudgeError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_custom_input_needs_a_problem() {
        let fallback = StubExecutor::new(Behaviour::Correct);
        let h = engine(None, fallback.clone());

        let request = RunRequest {
            source_code: "function twoSum(a, b) { return a; }".to_string(),
            language: "javascript".to_string(),
            problem_id: None,
            custom_input: Some("[3,3]\n6".to_string()),
        };

        assert!(matches!(h.engine.run(request).await, Err(JudgeError::InvalidRequest(_))));
        assert_eq!(fallback.calls(), 0);
    }

    #[tokio::test]
    async fn test_run_without_visible_cases() {
        let h = engine(None, StubExecutor::new(Behaviour::Correct));

        let err = h.engine.run(run("hidden-only")).await.unwrap_err();

        assert!(matches!(err, JudgeError::NoTestCases(ref id) if id == "hidden-only"));
    }

    #[tokio::test]
    async fn test_persistence_failure_still_returns_verdict() {
        let h = engine(Some(StubExecutor::new(Behaviour::Correct)), StubExecutor::new(Behaviour::Correct));
        h.store.fail_writes(true);

        let response = h.engine.submit(submit("two-sum", Some(USER))).await.unwrap();

        assert_eq!(response.verdict, Verdict::Accepted);
        assert_eq!(response.submission_id, None);
        assert!(!response.first_solve);
        assert!(h.store.submissions().is_empty());

        // Once writes recover the solve is still counted, exactly once
        h.store.fail_writes(false);
        let retry = h.engine.submit(submit("two-sum", Some(USER))).await.unwrap();
        assert!(retry.first_solve);
        assert_eq!(h.engine.get_progress(USER).await.unwrap().total_solved, 1);
    }

    #[tokio::test]
    async fn test_submit_requires_user() {
        let remote = StubExecutor::new(Behaviour::Correct);
        let h = engine(Some(remote.clone()), StubExecutor::new(Behaviour::Correct));

        for user in [None, Some(""), Some("   ")] {
            let err = h.engine.submit(submit("two-sum", user)).await.unwrap_err();
            assert!(matches!(err, JudgeError::Unauthenticated));
        }
        assert_eq!(remote.calls(), 0);
        assert!(h.store.submissions().is_empty());
    }

    #[tokio::test]
    async fn test_submit_unknown_problem() {
        let h = engine(None, StubExecutor::new(Behaviour::Correct));

        let err = h.engine.submit(submit("no-such-problem", Some(USER))).await.unwrap_err();

        assert!(matches!(err, JudgeError::ProblemNotFound(ref id) if id == "no-such-problem"));
    }

    #[tokio::test]
    async fn test_submit_problem_without_cases() {
        let fallback = StubExecutor::new(Behaviour::Correct);
        let h = engine(None, fallback.clone());

        let err = h.engine.submit(submit("empty", Some(USER))).await.unwrap_err();

        assert!(matches!(err, JudgeError::NoTestCases(ref id) if id == "empty"));
        assert_eq!(fallback.calls(), 0);
    }

    #[tokio::test]
    async fn test_empty_source_is_rejected() {
        let h = engine(None, StubExecutor::new(Behaviour::Correct));

        let mut request = submit("two-sum", Some(USER));
        request.source_code = "  \n".to_string();

        assert!(matches!(h.engine.submit(request).await, Err(JudgeError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_progress_tracks_difficulty() {
        let h = engine(Some(StubExecutor::new(Behaviour::Correct)), StubExecutor::new(Behaviour::Correct));

        h.engine.submit(submit("two-sum", Some(USER))).await.unwrap();
        h.engine.submit(submit("three-sum", Some(USER))).await.unwrap();

        let progress = h.engine.get_progress(USER).await.unwrap();
        assert_eq!(progress.solved_easy, 1);
        assert_eq!(progress.solved_medium, 1);
        assert_eq!(progress.total_solved, 2);
        assert_eq!(progress.xp, Difficulty::Easy.xp() + Difficulty::Medium.xp());
        // Same day: streak unchanged by the second solve
        assert_eq!(progress.current_streak, 1);
    }
}
