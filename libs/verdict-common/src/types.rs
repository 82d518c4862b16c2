use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

/// One `ipN.txt` / `opN.txt` pair found in a fixture directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fixture {
    pub index: u32,
    pub input_path: PathBuf,
    pub expected_output_path: PathBuf,
}

/// Solution handed to the harness by the caller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    pub language: String,
    pub source: String,
}

impl Submission {
    pub fn new(language: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            source: source.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseStatus {
    Passed,
    WrongAnswer,
    RuntimeError,
    TimedOut,
    SpawnFailed,
    /// stdout hit the capture cap, so the full output was never seen
    OutputLimitExceeded,
    FixtureUnreadable,
}

impl CaseStatus {
    pub fn is_passed(&self) -> bool {
        matches!(self, CaseStatus::Passed)
    }
}

impl fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CaseStatus::Passed => "passed",
            CaseStatus::WrongAnswer => "wrong answer",
            CaseStatus::RuntimeError => "runtime error",
            CaseStatus::TimedOut => "timed out",
            CaseStatus::SpawnFailed => "spawn failed",
            CaseStatus::OutputLimitExceeded => "output limit exceeded",
            CaseStatus::FixtureUnreadable => "fixture unreadable",
        };
        f.write_str(label)
    }
}

/// Verdict for one case. `passed` always mirrors `status.is_passed()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseResult {
    pub index: u32,
    pub passed: bool,
    pub status: CaseStatus,
    pub exit_code: Option<i32>,
    /// Captured for diagnostics only
    pub stderr: String,
    pub duration_ms: u64,
}

/// Trimmed expected and actual text for one case
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseOutputs {
    pub expected: String,
    pub actual: String,
}

/// Aggregate outcome of one run.
///
/// `results` and `outputs` are parallel: entry `i` of each describes the
/// same case. Fixtures without an expected output appear only in `skipped`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub language: String,
    pub fixture_dir: PathBuf,
    pub all_passed: bool,
    pub results: Vec<CaseResult>,
    pub outputs: Vec<CaseOutputs>,
    pub skipped: Vec<u32>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    pub fn total(&self) -> usize {
        self.results.len()
    }

    pub fn passed_count(&self) -> usize {
        self.results.iter().filter(|r| r.passed).count()
    }

    /// Failing cases paired with their expected/actual text
    pub fn failures(&self) -> impl Iterator<Item = (&CaseResult, &CaseOutputs)> {
        self.results
            .iter()
            .zip(self.outputs.iter())
            .filter(|(result, _)| !result.passed)
    }
}
