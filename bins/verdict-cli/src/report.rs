// Terminal rendering of run progress and the final report
use std::io::{self, Write};
use tracing::warn;
use verdict_common::types::{CaseStatus, RunReport};
use verdict_engine::{EventSink, ReportSink, RunEvent, TracingSink};

/// Writes progress and results to a terminal, or JSON when `json` is set.
/// Every event is also forwarded to the log.
pub struct TerminalSink<W: Write> {
    out: W,
    json: bool,
    log: TracingSink,
}

impl<W: Write> TerminalSink<W> {
    pub fn new(out: W, json: bool) -> Self {
        Self {
            out,
            json,
            log: TracingSink,
        }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_event(&mut self, event: &RunEvent) -> io::Result<()> {
        if self.json {
            // Only a failed compile has no report, so it is the one event
            // worth printing in JSON mode
            if let RunEvent::CompilationFailed { .. } = event {
                serde_json::to_writer_pretty(&mut self.out, event)?;
                writeln!(self.out)?;
            }
            return Ok(());
        }

        match event {
            RunEvent::RunStarted { language, fixtures, .. } => {
                writeln!(self.out, "→ Running {} test case(s) [{}]", fixtures, language)?;
            }
            RunEvent::FixtureSkipped { index, expected_path } => {
                let name = expected_path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| expected_path.display().to_string());
                writeln!(self.out, "  ⚠ Test case {}: {} not found, skipped", index, name)?;
            }
            RunEvent::CompileStarted => writeln!(self.out, "→ Compiling...")?,
            RunEvent::CompileFinished { duration_ms } => {
                writeln!(self.out, "  ✓ Compiled in {}ms", duration_ms)?;
            }
            RunEvent::CompilationFailed { message, diagnostics } => {
                writeln!(self.out, "  ✗ {}", message)?;
                for line in diagnostics.lines() {
                    writeln!(self.out, "    {}", line)?;
                }
            }
            RunEvent::CaseFinished { result } => {
                let mark = if result.passed { "✓" } else { "✗" };
                writeln!(
                    self.out,
                    "  {} Test case {}: {} ({}ms)",
                    mark, result.index, result.status, result.duration_ms
                )?;
            }
            RunEvent::CaseStarted { .. } | RunEvent::RunFinished { .. } => {}
        }
        self.out.flush()
    }

    fn write_report(&mut self, report: &RunReport) -> io::Result<()> {
        if self.json {
            serde_json::to_writer_pretty(&mut self.out, report)?;
            writeln!(self.out)?;
            return self.out.flush();
        }

        writeln!(self.out)?;
        writeln!(self.out, "========== Results ==========")?;
        for (result, outputs) in report.results.iter().zip(report.outputs.iter()) {
            if result.passed {
                writeln!(self.out, "Test Case {}: ✅ Passed", result.index)?;
                continue;
            }

            writeln!(self.out, "Test Case {}: ❌ Failed ({})", result.index, result.status)?;
            writeln!(self.out, "Expected: {}", outputs.expected)?;
            writeln!(self.out, " Actual : {}", outputs.actual)?;

            let show_stderr = matches!(
                result.status,
                CaseStatus::RuntimeError | CaseStatus::SpawnFailed | CaseStatus::FixtureUnreadable
            );
            if show_stderr {
                if let Some(line) = result.stderr.lines().find(|l| !l.trim().is_empty()) {
                    writeln!(self.out, " stderr : {}", line)?;
                }
            }
        }
        writeln!(self.out, "=============================")?;

        if report.all_passed {
            writeln!(self.out, "Hurray! All tests passed! ✅")?;
        } else {
            writeln!(
                self.out,
                "Oops! Some tests failed. ❌ ({}/{} passed)",
                report.passed_count(),
                report.total()
            )?;
        }
        self.out.flush()
    }
}

impl<W: Write> EventSink for TerminalSink<W> {
    fn emit(&mut self, event: &RunEvent) {
        self.log.emit(event);
        if let Err(e) = self.write_event(event) {
            warn!(error = %e, "Failed to write progress");
        }
    }
}

impl<W: Write> ReportSink for TerminalSink<W> {
    fn receive(&mut self, report: &RunReport) {
        if let Err(e) = self.write_report(report) {
            warn!(error = %e, "Failed to write report");
        }
    }
}
