/// Submission Builder
///
/// Packages source, stdin, expected output and limits per test case into the
/// sandbox wire format, and selects which test cases a request carries:
/// - sample: first `SAMPLE_SIZE` visible cases (Run)
/// - full: every case in catalog order (Submit)
/// - custom: one synthesized case without expected output (Run)
///
/// All textual wire fields are base64 so arbitrary bytes survive transport.
///
/// Every request carries the problem's declared entry point. For the fallback
/// language the remote source gets a driver appended that calls it the same
/// way the local harness does, so both backends judge the same program.

use crate::languages::{Language, FALLBACK_LANGUAGE};
use base64::{engine::general_purpose, Engine as _};
use judge_common::types::{ExecutionLimits, ExecutionMode, Problem, TestCase};
use serde::Serialize;

/// Number of visible cases a Run executes
pub const SAMPLE_SIZE: usize = 3;

/// One test case in the sandbox's submit format
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SandboxSubmission {
    pub source_code: String,
    pub language_id: u32,
    pub stdin: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_output: Option<String>,
    pub cpu_time_limit: f64,
    pub memory_limit: u64,
}

/// Everything needed to execute one submission against an ordered case list.
/// Built per call and never reused.
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    language: String,
    language_id: u32,
    mode: ExecutionMode,
    entry_point: String,
    source_code: String,
    test_cases: Vec<TestCase>,
    limits: ExecutionLimits,
    submissions: Vec<SandboxSubmission>,
}

impl ExecutionRequest {
    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn language_id(&self) -> u32 {
        self.language_id
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    pub fn entry_point(&self) -> &str {
        &self.entry_point
    }

    pub fn source_code(&self) -> &str {
        &self.source_code
    }

    pub fn test_cases(&self) -> &[TestCase] {
        &self.test_cases
    }

    pub fn limits(&self) -> ExecutionLimits {
        self.limits
    }

    /// Encoded wire payloads, index-aligned with `test_cases()`
    pub fn submissions(&self) -> &[SandboxSubmission] {
        &self.submissions
    }
}

pub fn encode(text: &str) -> String {
    general_purpose::STANDARD.encode(text)
}

/// Reads stdin one JSON argument per non-empty line, calls the entry point and
/// prints the serialized result. Console output is silenced before the user
/// source runs. Mirrors the fallback harness.
const JS_PRELUDE: &str = "const __judgeWrite = process.stdout.write.bind(process.stdout); for (const __k of ['log', 'info', 'warn', 'error', 'debug', 'trace', 'dir', 'table']) console[__k] = () => {};\n";

const JS_DRIVER: &str = r#"
;(() => {
  const __args = require('fs')
    .readFileSync(0, 'utf8')
    .split(/\r?\n/)
    .filter((line) => line.trim() !== '')
    .map((line) => {
      try {
        return JSON.parse(line);
      } catch (_) {
        return line;
      }
    });
  const __serialize = (value) => {
    if (typeof value === 'string') return value;
    if (value === undefined) return 'undefined';
    const text = JSON.stringify(value);
    return text === undefined ? String(value) : text;
  };
  Promise.resolve(__ENTRY__(...__args)).then((value) => __judgeWrite(__serialize(value) + '\n'));
})();
"#;

/// Source sent to the remote sandbox
pub fn remote_source(source_code: &str, language: &Language, entry_point: &str) -> String {
    if language.name != FALLBACK_LANGUAGE {
        return source_code.to_string();
    }
    format!(
        "{}{}{}",
        JS_PRELUDE,
        source_code,
        JS_DRIVER.replace("__ENTRY__", entry_point)
    )
}

/// Build a request over exactly `test_cases`, in order
pub fn build(
    source_code: &str,
    language: &Language,
    test_cases: Vec<TestCase>,
    limits: ExecutionLimits,
    mode: ExecutionMode,
    entry_point: &str,
) -> ExecutionRequest {
    let encoded_source = encode(&remote_source(source_code, language, entry_point));

    let submissions = test_cases
        .iter()
        .map(|tc| SandboxSubmission {
            source_code: encoded_source.clone(),
            language_id: language.runtime_id,
            stdin: encode(&tc.input),
            expected_output: tc.expected_output.as_deref().map(encode),
            cpu_time_limit: limits.time_limit_seconds,
            memory_limit: limits.memory_limit_kb,
        })
        .collect();

    ExecutionRequest {
        language: language.name.clone(),
        language_id: language.runtime_id,
        mode,
        entry_point: entry_point.to_string(),
        source_code: source_code.to_string(),
        test_cases,
        limits,
        submissions,
    }
}

/// Run-mode request over the first visible cases. Hidden cases never enter it.
pub fn sample(source_code: &str, language: &Language, problem: &Problem) -> ExecutionRequest {
    let cases = problem
        .test_cases
        .iter()
        .filter(|tc| !tc.is_hidden)
        .take(SAMPLE_SIZE)
        .cloned()
        .collect();

    build(
        source_code,
        language,
        cases,
        problem.effective_limits(),
        ExecutionMode::Run,
        &problem.entry_point,
    )
}

/// Submit-mode request over the entire ordered suite
pub fn full(source_code: &str, language: &Language, problem: &Problem) -> ExecutionRequest {
    build(
        source_code,
        language,
        problem.test_cases.clone(),
        problem.effective_limits(),
        ExecutionMode::Submit,
        &problem.entry_point,
    )
}

/// Run-mode request with one ad-hoc input against the problem's entry point
pub fn custom(source_code: &str, language: &Language, input: &str, problem: &Problem) -> ExecutionRequest {
    build(
        source_code,
        language,
        vec![TestCase::custom(input)],
        problem.effective_limits(),
        ExecutionMode::Run,
        &problem.entry_point,
    )
}
