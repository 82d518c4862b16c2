/// Case Evaluator - Verdicts and Run Aggregation
///
/// **Core Responsibility:**
/// Compare raw execution outputs against expected outputs and assign
/// verdicts, then fold per-case verdicts into one run report.
///
/// **Critical Properties:**
/// - Knows nothing about processes or compilers
/// - Pure function: (execution output, expected output, policy) → verdict
///
/// **Verdict Priority:**
/// 1. Spawn failure
/// 2. Timeout
/// 3. stdout over the capture cap
/// 4. stderr output (when the stderr policy is `fail`)
/// 5. Non-zero exit (when enabled)
/// 6. Output comparison
///
/// **Normalization Rules:**
/// - Leading and trailing whitespace trimmed
/// - Internal whitespace (including `\r`) and case preserved (exact match required)
/// - No floating-point tolerance

use crate::engine::CaseExecutionOutput;
use chrono::Utc;
use std::path::Path;
use uuid::Uuid;
use verdict_common::config::{HarnessConfig, StderrPolicy};
use verdict_common::types::{CaseOutputs, CaseResult, CaseStatus, RunReport};

/// Policy knobs that affect verdicts but not execution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvaluationPolicy {
    pub stderr_policy: StderrPolicy,
    pub fail_on_nonzero_exit: bool,
}

impl Default for EvaluationPolicy {
    fn default() -> Self {
        Self {
            stderr_policy: StderrPolicy::Fail,
            fail_on_nonzero_exit: false,
        }
    }
}

impl From<&HarnessConfig> for EvaluationPolicy {
    fn from(config: &HarnessConfig) -> Self {
        Self {
            stderr_policy: config.stderr_policy,
            fail_on_nonzero_exit: config.fail_on_nonzero_exit,
        }
    }
}

/// Normalize output for comparison
pub fn normalize_output(output: &str) -> String {
    output.trim().to_string()
}

fn classify(output: &CaseExecutionOutput, actual: &str, expected: &str, policy: EvaluationPolicy) -> CaseStatus {
    if output.spawn_error.is_some() {
        CaseStatus::SpawnFailed
    } else if output.timed_out {
        CaseStatus::TimedOut
    } else if output.stdout_truncated {
        // A prefix that matches says nothing about what was cut off
        CaseStatus::OutputLimitExceeded
    } else if policy.stderr_policy == StderrPolicy::Fail && !output.stderr.is_empty() {
        CaseStatus::RuntimeError
    } else if policy.fail_on_nonzero_exit && output.exit_code != Some(0) {
        CaseStatus::RuntimeError
    } else if actual == expected {
        CaseStatus::Passed
    } else {
        CaseStatus::WrongAnswer
    }
}

/// Evaluate one case
///
/// ## Arguments
/// * `index` - Fixture index
/// * `output` - Raw execution output from the engine
/// * `expected` - Contents of the expected-output file, as read
/// * `policy` - stderr and exit-code policy
///
/// ## Returns
/// The verdict and the normalized expected/actual pair, always together
pub fn evaluate_case(
    index: u32,
    output: &CaseExecutionOutput,
    expected: &str,
    policy: EvaluationPolicy,
) -> (CaseResult, CaseOutputs) {
    let actual = normalize_output(&output.stdout);
    let expected = normalize_output(expected);
    let status = classify(output, &actual, &expected, policy);

    let stderr = match &output.spawn_error {
        Some(message) => message.clone(),
        None => output.stderr.clone(),
    };

    (
        CaseResult {
            index,
            passed: status.is_passed(),
            status,
            exit_code: output.exit_code,
            stderr,
            duration_ms: output.duration_ms,
        },
        CaseOutputs { expected, actual },
    )
}

/// Verdict for a fixture whose files could not be read
pub fn unreadable_fixture(index: u32, expected: Option<&str>, reason: String) -> (CaseResult, CaseOutputs) {
    (
        CaseResult {
            index,
            passed: false,
            status: CaseStatus::FixtureUnreadable,
            exit_code: None,
            stderr: reason,
            duration_ms: 0,
        },
        CaseOutputs {
            expected: expected.map(normalize_output).unwrap_or_default(),
            actual: String::new(),
        },
    )
}

/// Accumulates verdicts across one run
///
/// `all_passed` starts true and is AND-ed with every recorded case, so a
/// single failure clears it for good. Results and outputs are only ever
/// pushed together, which keeps them aligned by position.
#[derive(Debug)]
pub struct RunAggregator {
    all_passed: bool,
    results: Vec<CaseResult>,
    outputs: Vec<CaseOutputs>,
    skipped: Vec<u32>,
}

impl Default for RunAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl RunAggregator {
    pub fn new() -> Self {
        Self {
            all_passed: true,
            results: Vec::new(),
            outputs: Vec::new(),
            skipped: Vec::new(),
        }
    }

    pub fn record(&mut self, result: CaseResult, outputs: CaseOutputs) {
        self.all_passed &= result.passed;
        self.results.push(result);
        self.outputs.push(outputs);
    }

    pub fn skip(&mut self, index: u32) {
        self.skipped.push(index);
    }

    pub fn finish(
        self,
        run_id: Uuid,
        language: &str,
        fixture_dir: &Path,
        started_at: chrono::DateTime<Utc>,
    ) -> RunReport {
        RunReport {
            run_id,
            language: language.to_string(),
            fixture_dir: fixture_dir.to_path_buf(),
            all_passed: self.all_passed,
            results: self.results,
            outputs: self.outputs,
            skipped: self.skipped,
            started_at,
            finished_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_output(stdout: &str) -> CaseExecutionOutput {
        CaseExecutionOutput {
            stdout: stdout.to_string(),
            exit_code: Some(0),
            duration_ms: 3,
            ..Default::default()
        }
    }

    fn lenient() -> EvaluationPolicy {
        EvaluationPolicy {
            stderr_policy: StderrPolicy::Ignore,
            fail_on_nonzero_exit: false,
        }
    }

    #[test]
    fn test_normalize_output() {
        assert_eq!(normalize_output("hello"), "hello");
        assert_eq!(normalize_output("  hello  "), "hello");
        assert_eq!(normalize_output("\nhello\n"), "hello");
        assert_eq!(normalize_output("a\r\nb\r\n"), "a\r\nb");
        assert_eq!(normalize_output("  hello world  \n"), "hello world");
        assert_eq!(normalize_output("   "), "");
    }

    #[test]
    fn test_exact_match_passes() {
        let (result, outputs) = evaluate_case(1, &make_output("7\n"), "7", EvaluationPolicy::default());

        assert_eq!(result.status, CaseStatus::Passed);
        assert!(result.passed);
        assert_eq!(result.index, 1);
        assert_eq!(result.duration_ms, 3);
        assert_eq!(outputs.expected, "7");
        assert_eq!(outputs.actual, "7");
    }

    #[test]
    fn test_mismatch_records_both_sides() {
        let (result, outputs) = evaluate_case(1, &make_output("8"), "7", EvaluationPolicy::default());

        assert_eq!(result.status, CaseStatus::WrongAnswer);
        assert!(!result.passed);
        assert_eq!(outputs.expected, "7");
        assert_eq!(outputs.actual, "8");
    }

    #[test]
    fn test_edge_whitespace_is_symmetric() {
        let policy = EvaluationPolicy::default();
        assert!(evaluate_case(1, &make_output("7"), "  7\n\n", policy).0.passed);
        assert!(evaluate_case(1, &make_output("\t7  \n"), "7", policy).0.passed);
    }

    #[test]
    fn test_internal_whitespace_matters() {
        let policy = EvaluationPolicy::default();
        assert!(!evaluate_case(1, &make_output("1  2"), "1 2", policy).0.passed);
        assert!(!evaluate_case(1, &make_output("1\n\n2"), "1\n2", policy).0.passed);
    }

    #[test]
    fn test_carriage_return_in_output_is_significant() {
        let (result, outputs) = evaluate_case(1, &make_output("1\r\n2\r\n"), "1\n2", EvaluationPolicy::default());

        assert_eq!(result.status, CaseStatus::WrongAnswer);
        assert_eq!(outputs.actual, "1\r\n2");
    }

    #[test]
    fn test_truncated_stdout_never_passes() {
        let mut output = make_output("7");
        output.stdout_truncated = true;

        let (result, outputs) = evaluate_case(1, &output, "7", lenient());
        assert_eq!(result.status, CaseStatus::OutputLimitExceeded);
        assert!(!result.passed);
        assert_eq!(outputs.actual, "7");
    }

    #[test]
    fn test_case_sensitivity() {
        let (result, _) = evaluate_case(1, &make_output("hello"), "Hello", EvaluationPolicy::default());
        assert_eq!(result.status, CaseStatus::WrongAnswer);
    }

    #[test]
    fn test_stderr_fails_under_strict_policy() {
        let mut output = make_output("7");
        output.stderr = "warning: deprecated".to_string();

        let (strict, outputs) = evaluate_case(1, &output, "7", EvaluationPolicy::default());
        assert_eq!(strict.status, CaseStatus::RuntimeError);
        assert_eq!(strict.stderr, "warning: deprecated");
        assert_eq!(outputs.actual, "7");

        let (relaxed, _) = evaluate_case(1, &output, "7", lenient());
        assert_eq!(relaxed.status, CaseStatus::Passed);
    }

    #[test]
    fn test_nonzero_exit_policy() {
        let mut output = make_output("7");
        output.exit_code = Some(3);

        let (ignored, _) = evaluate_case(1, &output, "7", EvaluationPolicy::default());
        assert_eq!(ignored.status, CaseStatus::Passed);
        assert_eq!(ignored.exit_code, Some(3));

        let policy = EvaluationPolicy {
            fail_on_nonzero_exit: true,
            ..EvaluationPolicy::default()
        };
        let (failed, _) = evaluate_case(1, &output, "7", policy);
        assert_eq!(failed.status, CaseStatus::RuntimeError);
    }

    #[test]
    fn test_timeout_beats_output_comparison() {
        let mut output = make_output("7");
        output.timed_out = true;
        output.exit_code = None;

        let (result, _) = evaluate_case(1, &output, "7", lenient());
        assert_eq!(result.status, CaseStatus::TimedOut);
        assert!(!result.passed);
    }

    #[test]
    fn test_spawn_failure() {
        let output = CaseExecutionOutput {
            spawn_error: Some("failed to start 'python3': not found".to_string()),
            ..Default::default()
        };

        let (result, outputs) = evaluate_case(4, &output, "7", lenient());
        assert_eq!(result.status, CaseStatus::SpawnFailed);
        assert!(result.stderr.contains("python3"));
        assert_eq!(outputs.expected, "7");
        assert_eq!(outputs.actual, "");
    }

    #[test]
    fn test_unreadable_fixture() {
        let (result, outputs) = unreadable_fixture(2, None, "invalid UTF-8".to_string());
        assert_eq!(result.status, CaseStatus::FixtureUnreadable);
        assert!(!result.passed);
        assert_eq!(outputs.expected, "");
    }

    #[test]
    fn test_aggregator_all_pass() {
        let mut aggregator = RunAggregator::new();
        let policy = EvaluationPolicy::default();
        let (r1, o1) = evaluate_case(1, &make_output("120"), "120", policy);
        let (r2, o2) = evaluate_case(2, &make_output("6"), "6", policy);
        aggregator.record(r1, o1);
        aggregator.record(r2, o2);

        let report = aggregator.finish(Uuid::new_v4(), "cpp", Path::new("TestData/p"), Utc::now());
        assert!(report.all_passed);
        assert_eq!(report.results.len(), 2);
        assert_eq!(report.outputs.len(), 2);
        assert_eq!(report.language, "cpp");
    }

    #[test]
    fn test_one_failure_clears_all_passed_for_good() {
        let mut aggregator = RunAggregator::new();
        let policy = EvaluationPolicy::default();
        for (index, stdout, expected) in [(1, "a", "a"), (2, "b", "x"), (3, "c", "c")] {
            let (result, outputs) = evaluate_case(index, &make_output(stdout), expected, policy);
            aggregator.record(result, outputs);
        }

        let report = aggregator.finish(Uuid::new_v4(), "python", Path::new("."), Utc::now());
        assert!(!report.all_passed);
        assert_eq!(report.passed_count(), 2);
        assert_eq!(report.total(), 3);
        let indices: Vec<u32> = report.results.iter().map(|r| r.index).collect();
        assert_eq!(indices, vec![1, 2, 3]);
        assert_eq!(report.outputs[1].actual, "b");
        assert_eq!(report.outputs[1].expected, "x");
    }

    #[test]
    fn test_empty_run_passes_vacuously() {
        let mut aggregator = RunAggregator::new();
        aggregator.skip(5);

        let report = aggregator.finish(Uuid::new_v4(), "python", Path::new("."), Utc::now());
        assert!(report.all_passed);
        assert!(report.results.is_empty());
        assert_eq!(report.skipped, vec![5]);
    }
}
