/// Result Aggregator - Backend-Agnostic Verdict Logic
///
/// **Core Responsibility:**
/// Combine ordered per-case outcomes into one verdict.
///
/// **Critical Properties:**
/// - Knows nothing about the sandbox, Docker or Node
/// - Knows nothing about Redis
/// - Pure function: (outcomes, test cases, comparison mode) → judgement
///
/// **Verdict Precedence (highest first):**
/// CompilationError > TimeLimitExceeded > RuntimeError > InternalError >
/// (passed < total ? WrongAnswer : Accepted)
///
/// **Normalization Rules:**
/// - Leading and trailing whitespace trimmed
/// - Internal whitespace and case preserved
/// - `Unordered` problems compare top-level JSON arrays as multisets
///
/// Timing and memory are the worst case across executed cases.

use judge_common::types::{ComparisonMode, ExecutionOutcome, OutcomeStatus, TestCase, Verdict};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

/// Aggregate view of one execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Judgement {
    pub verdict: Verdict,
    /// Cases whose output matched the expected output
    pub passed: u32,
    /// Cases that carry an expected output
    pub total: u32,
    /// Cases that produced an outcome
    pub executed: u32,
    pub elapsed_ms: u64,
    pub memory_kb: u64,
}

pub fn normalize_output(output: &str) -> &str {
    output.trim()
}

/// Compare actual against expected output under `mode`
pub fn outputs_match(actual: &str, expected: &str, mode: ComparisonMode) -> bool {
    let actual = normalize_output(actual);
    let expected = normalize_output(expected);

    if actual == expected {
        return true;
    }

    match mode {
        ComparisonMode::Ordered => false,
        ComparisonMode::Unordered => unordered_match(actual, expected),
    }
}

fn unordered_match(actual: &str, expected: &str) -> bool {
    let (Ok(Value::Array(actual)), Ok(Value::Array(expected))) = (
        serde_json::from_str::<Value>(actual),
        serde_json::from_str::<Value>(expected),
    ) else {
        return false;
    };

    if actual.len() != expected.len() {
        return false;
    }

    let sorted = |items: Vec<Value>| {
        let mut keys: Vec<String> = items.iter().map(Value::to_string).collect();
        keys.sort();
        keys
    };
    sorted(actual) == sorted(expected)
}

/// Status of one case after re-comparing its output under `mode`.
///
/// Completed cases are re-judged locally so both backends agree on what
/// "matched" means; failures keep the backend's status.
pub fn case_status(outcome: &ExecutionOutcome, test_case: &TestCase, mode: ComparisonMode) -> OutcomeStatus {
    if !outcome.status.completed() {
        return outcome.status;
    }

    match test_case.expected_output.as_deref() {
        Some(expected) if outputs_match(&outcome.stdout, expected, mode) => OutcomeStatus::Accepted,
        Some(_) => OutcomeStatus::WrongAnswer,
        None => OutcomeStatus::Accepted,
    }
}

/// Combine `outcomes` (index-aligned with a prefix of `test_cases`) into a
/// single judgement
pub fn aggregate(
    outcomes: &[ExecutionOutcome],
    test_cases: &[TestCase],
    comparison: ComparisonMode,
) -> Judgement {
    let total = test_cases.iter().filter(|tc| tc.expected_output.is_some()).count() as u32;

    let mut passed = 0u32;
    let mut compile_error = false;
    let mut time_limit = false;
    let mut runtime_error = false;
    let mut internal_error = false;

    for (idx, (outcome, test_case)) in outcomes.iter().zip(test_cases).enumerate() {
        let status = case_status(outcome, test_case, comparison);
        debug!(test_num = idx + 1, status = %status, "Evaluated test case");

        match status {
            OutcomeStatus::Accepted => {
                if test_case.expected_output.is_some() {
                    passed += 1;
                }
            }
            OutcomeStatus::WrongAnswer => {}
            OutcomeStatus::CompilationError => compile_error = true,
            OutcomeStatus::TimeLimitExceeded => time_limit = true,
            OutcomeStatus::RuntimeError => runtime_error = true,
            OutcomeStatus::InternalError => internal_error = true,
        }
    }

    // More outcomes than cases means the backend misreported
    if outcomes.len() > test_cases.len() {
        internal_error = true;
    }

    let verdict = if compile_error {
        Verdict::CompilationError
    } else if time_limit {
        Verdict::TimeLimitExceeded
    } else if runtime_error {
        Verdict::RuntimeError
    } else if internal_error || (outcomes.is_empty() && !test_cases.is_empty()) {
        Verdict::InternalError
    } else if passed < total {
        Verdict::WrongAnswer
    } else {
        Verdict::Accepted
    };

    Judgement {
        verdict,
        passed,
        total,
        executed: outcomes.len() as u32,
        elapsed_ms: outcomes.iter().map(|o| o.elapsed_ms).max().unwrap_or(0),
        memory_kb: outcomes.iter().map(|o| o.memory_kb).max().unwrap_or(0),
    }
}
