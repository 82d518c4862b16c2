// Run event stream and the sink traits presentation layers implement

use serde::Serialize;
use std::path::PathBuf;
use tracing::{info, warn};
use uuid::Uuid;
use verdict_common::types::{CaseResult, RunReport};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RunEvent {
    RunStarted {
        run_id: Uuid,
        language: String,
        fixtures: usize,
    },
    FixtureSkipped {
        index: u32,
        expected_path: PathBuf,
    },
    CompileStarted,
    CompileFinished {
        duration_ms: u64,
    },
    CompilationFailed {
        message: String,
        diagnostics: String,
    },
    CaseStarted {
        index: u32,
    },
    CaseFinished {
        result: CaseResult,
    },
    RunFinished {
        all_passed: bool,
        passed: usize,
        total: usize,
    },
}

/// Receives progress events while a run is in flight
pub trait EventSink {
    fn emit(&mut self, event: &RunEvent);
}

/// Receives the finished report, once per run
pub trait ReportSink {
    fn receive(&mut self, report: &RunReport);
}

/// Records events in order, mostly useful in tests
impl EventSink for Vec<RunEvent> {
    fn emit(&mut self, event: &RunEvent) {
        self.push(event.clone());
    }
}

/// Discards every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&mut self, _event: &RunEvent) {}
}

/// Forwards events to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&mut self, event: &RunEvent) {
        match event {
            RunEvent::RunStarted { run_id, language, fixtures } => {
                info!(run_id = %run_id, language = %language, fixtures, "Run started");
            }
            RunEvent::FixtureSkipped { index, expected_path } => {
                warn!(index, expected = %expected_path.display(), "Fixture skipped");
            }
            RunEvent::CompileStarted => info!("Compiling solution"),
            RunEvent::CompileFinished { duration_ms } => {
                info!(duration_ms, "Compiled");
            }
            RunEvent::CompilationFailed { message, .. } => {
                warn!(error = %message, "Compilation failed");
            }
            RunEvent::CaseStarted { index } => info!(index, "Executing test case"),
            RunEvent::CaseFinished { result } => {
                info!(
                    index = result.index,
                    status = %result.status,
                    duration_ms = result.duration_ms,
                    "Test case finished"
                );
            }
            RunEvent::RunFinished { all_passed, passed, total } => {
                info!(all_passed, passed, total, "Run finished");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use verdict_common::types::CaseStatus;

    #[test]
    fn test_vec_sink_records_in_order() {
        let mut events: Vec<RunEvent> = Vec::new();
        events.emit(&RunEvent::CaseStarted { index: 1 });
        events.emit(&RunEvent::CompileStarted);

        assert_eq!(events, vec![RunEvent::CaseStarted { index: 1 }, RunEvent::CompileStarted]);
    }

    #[test]
    fn test_event_json_is_tagged() {
        let event = RunEvent::CaseFinished {
            result: CaseResult {
                index: 2,
                passed: false,
                status: CaseStatus::TimedOut,
                exit_code: None,
                stderr: String::new(),
                duration_ms: 5000,
            },
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event"], "case_finished");
        assert_eq!(value["result"]["status"], "timed_out");

        let value = serde_json::to_value(RunEvent::CompileStarted).unwrap();
        assert_eq!(value["event"], "compile_started");
    }
}
