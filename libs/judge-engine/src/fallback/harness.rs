//! Node.js harness shared by every fallback runtime.
//!
//! Inputs arrive through the environment:
//! - `JUDGE_SOURCE`: base64 user source
//! - `JUDGE_STDIN`: base64 test input, one JSON argument per non-empty line
//! - `JUDGE_ENTRY`: declared entry-point function name
//! - `JUDGE_TIMEOUT_MS`: budget for the call, including a returned promise settling
//!
//! The harness prints exactly one JSON report line on stdout.

use serde::Deserialize;

pub const HARNESS_JS: &str = r#"'use strict';
const vm = require('vm');
const decode = (v) => Buffer.from(v || '', 'base64').toString('utf8');
const emit = (report) => process.stdout.write(JSON.stringify(report) + '\n');
const describe = (e) => String((e && e.stack) || e);

const source = decode(process.env.JUDGE_SOURCE);
const stdin = decode(process.env.JUDGE_STDIN);
const entry = process.env.JUDGE_ENTRY || '';
const timeout = Number(process.env.JUDGE_TIMEOUT_MS) || 2000;

if (!/^[A-Za-z_$][\w$]*$/.test(entry)) {
  emit({ ok: false, phase: 'setup', error: 'invalid entry point: ' + entry });
  process.exit(2);
}

const args = stdin
  .split(/\r?\n/)
  .filter((line) => line.trim() !== '')
  .map((line) => {
    try {
      return JSON.parse(line);
    } catch (_) {
      return line;
    }
  });

const silent = () => {};
const context = vm.createContext({
  console: { log: silent, info: silent, warn: silent, error: silent, debug: silent, trace: silent, dir: silent, table: silent },
  __args: args,
});

let script;
try {
  script = new vm.Script(source + '\n;globalThis.__result = ' + entry + '(...__args);', { filename: 'solution.js' });
} catch (e) {
  emit({ ok: false, phase: 'compile', error: describe(e) });
  process.exit(1);
}

const serialize = (value) => {
  if (typeof value === 'string') return value;
  if (value === undefined) return 'undefined';
  const text = JSON.stringify(value);
  return text === undefined ? String(value) : text;
};

const started = process.hrtime.bigint();
const finish = (report) => {
  report.elapsed_ms = Number((process.hrtime.bigint() - started) / 1000000n);
  report.memory_kb = Math.round(process.memoryUsage().rss / 1024);
  emit(report);
};

// A returned promise that never settles would otherwise exit silently
const pending = setTimeout(() => {
  finish({ ok: false, phase: 'timeout', error: 'Returned promise did not settle within ' + timeout + 'ms' });
  process.exitCode = 1;
}, timeout);

Promise.resolve()
  .then(() => {
    script.runInContext(context, { timeout });
    return context.__result;
  })
  .then((value) => finish({ ok: true, output: serialize(value) }))
  .catch((e) => {
    const phase = e && e.code === 'ERR_SCRIPT_EXECUTION_TIMEOUT' ? 'timeout' : 'run';
    finish({ ok: false, phase, error: describe(e) });
    process.exitCode = 1;
  })
  .finally(() => clearTimeout(pending));
"#;

/// Where a failed call went wrong
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Setup,
    Compile,
    Run,
    Timeout,
}

/// The single JSON line the harness prints
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HarnessReport {
    pub ok: bool,
    #[serde(default)]
    pub output: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub phase: Option<Phase>,
    #[serde(default)]
    pub elapsed_ms: Option<u64>,
    #[serde(default)]
    pub memory_kb: Option<u64>,
}

/// Last stdout line that parses as a report, if any
pub fn parse_report(stdout: &str) -> Option<HarnessReport> {
    stdout
        .lines()
        .rev()
        .filter(|line| !line.trim().is_empty())
        .find_map(|line| serde_json::from_str(line.trim()).ok())
}
