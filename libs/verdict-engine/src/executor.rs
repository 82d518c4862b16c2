/// Run Executor - High-Level Orchestration
///
/// **Responsibility:**
/// Drive one run end to end and produce the RunReport.
///
/// **Flow:**
/// 1. Locate fixtures (locator.rs)
/// 2. Compile once, for compiled languages (compiler.rs)
/// 3. Execute every fixture, strictly one at a time (engine.rs)
/// 4. Judge and aggregate each case as it completes (evaluator.rs)
///
/// Only a failed compile (or a run that cannot start) aborts with an error.
/// Every located fixture is attempted, even after earlier failures.

use crate::compiler::{self, BuildWorkspace};
use crate::engine::{ExecutionLimits, ExecutionTarget, ProcessEngine};
use crate::error::{HarnessError, LocatorError};
use crate::evaluator::{self, EvaluationPolicy, RunAggregator};
use crate::events::{EventSink, ReportSink, RunEvent};
use crate::locator;
use chrono::Utc;
use std::path::Path;
use tracing::{debug, info, instrument};
use uuid::Uuid;
use verdict_common::config::{HarnessConfig, LanguageConfig, LanguageKind};
use verdict_common::types::{CaseOutputs, CaseResult, Fixture, RunReport, Submission};

/// Safety limit to keep pathological submissions out of the build step
pub const MAX_SOURCE_CODE_BYTES: usize = 1024 * 1024; // 1MB

pub struct Harness {
    config: HarnessConfig,
}

impl Harness {
    pub fn new(config: HarnessConfig) -> Self {
        Self { config }
    }

    /// Run `submission` against every fixture in `fixture_dir`
    #[instrument(
        skip(self, submission, events),
        fields(language = %submission.language, fixture_dir = %fixture_dir.display())
    )]
    pub async fn run(
        &self,
        submission: &Submission,
        fixture_dir: &Path,
        events: &mut dyn EventSink,
    ) -> Result<RunReport, HarnessError> {
        let language = self
            .config
            .language(&submission.language)
            .ok_or_else(|| HarnessError::UnknownLanguage(submission.language.clone()))?;

        if submission.source.len() > MAX_SOURCE_CODE_BYTES {
            return Err(HarnessError::SourceTooLarge {
                size: submission.source.len(),
                limit: MAX_SOURCE_CODE_BYTES,
            });
        }

        let fixture_dir = fixture_dir
            .canonicalize()
            .map_err(|e| LocatorError::Io {
                path: fixture_dir.to_path_buf(),
                source: e,
            })?;

        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let fixture_set = locator::locate(&fixture_dir)?;

        events.emit(&RunEvent::RunStarted {
            run_id,
            language: language.name.clone(),
            fixtures: fixture_set.fixtures.len(),
        });

        let mut aggregator = RunAggregator::new();
        for skipped in &fixture_set.skipped {
            events.emit(&RunEvent::FixtureSkipped {
                index: skipped.index,
                expected_path: skipped.expected_output_path.clone(),
            });
            aggregator.skip(skipped.index);
        }

        // Dropped at the end of this function on every path, taking the
        // source and binary with it
        let workspace = BuildWorkspace::create_in(&fixture_dir).map_err(HarnessError::Workspace)?;

        let target = match self.prepare(language, &submission.source, &workspace, events).await {
            Ok(target) => target,
            Err(e) => {
                if e.is_compilation_failure() {
                    events.emit(&RunEvent::CompilationFailed {
                        message: e.to_string(),
                        diagnostics: e.diagnostics().unwrap_or_default().to_string(),
                    });
                }
                return Err(e);
            }
        };

        let engine = ProcessEngine::new(ExecutionLimits::from(&self.config));
        let policy = EvaluationPolicy::from(&self.config);

        for fixture in &fixture_set.fixtures {
            events.emit(&RunEvent::CaseStarted { index: fixture.index });

            let (result, outputs) = run_case(&engine, &target, fixture, policy).await;

            events.emit(&RunEvent::CaseFinished {
                result: result.clone(),
            });
            aggregator.record(result, outputs);
        }

        let report = aggregator.finish(run_id, &language.name, &fixture_dir, started_at);

        info!(
            run_id = %run_id,
            all_passed = report.all_passed,
            passed = report.passed_count(),
            total = report.total(),
            "Run complete"
        );
        events.emit(&RunEvent::RunFinished {
            all_passed: report.all_passed,
            passed: report.passed_count(),
            total: report.total(),
        });

        Ok(report)
    }

    /// Run, then hand the finished report to `sink`. Returns the aggregate verdict.
    pub async fn run_and_report<S>(
        &self,
        submission: &Submission,
        fixture_dir: &Path,
        sink: &mut S,
    ) -> Result<bool, HarnessError>
    where
        S: EventSink + ReportSink,
    {
        let report = self.run(submission, fixture_dir, &mut *sink).await?;
        sink.receive(&report);
        Ok(report.all_passed)
    }

    /// Materialize the solution in the workspace and work out how to run it
    async fn prepare(
        &self,
        language: &LanguageConfig,
        source: &str,
        workspace: &BuildWorkspace,
        events: &mut dyn EventSink,
    ) -> Result<ExecutionTarget, HarnessError> {
        let source_path = workspace
            .write_source(&language.file_extension, source)
            .await
            .map_err(HarnessError::Workspace)?;

        match (language.kind, &language.compile) {
            (LanguageKind::Compiled, Some(template)) => {
                let binary_path = workspace.binary_path();
                events.emit(&RunEvent::CompileStarted);

                let output = compiler::compile(
                    template,
                    &source_path,
                    &binary_path,
                    self.config.compile_timeout(),
                )
                .await?;

                if !output.diagnostics.is_empty() {
                    debug!(diagnostics = %output.diagnostics, "Compiler output");
                }
                events.emit(&RunEvent::CompileFinished {
                    duration_ms: output.duration_ms,
                });

                Ok(ExecutionTarget::from_template(
                    &language.run,
                    &[("binary", binary_path.as_path()), ("source", source_path.as_path())],
                ))
            }
            // A compiled language without a compiler is rejected by config
            // validation; treat it like a script if it slips through
            _ => Ok(ExecutionTarget::from_template(
                &language.run,
                &[("script", source_path.as_path()), ("source", source_path.as_path())],
            )),
        }
    }
}

/// Execute and judge one fixture. Never aborts the run.
async fn run_case(
    engine: &ProcessEngine,
    target: &ExecutionTarget,
    fixture: &Fixture,
    policy: EvaluationPolicy,
) -> (CaseResult, CaseOutputs) {
    let expected = match read_fixture_text(&fixture.expected_output_path).await {
        Ok(text) => text,
        Err(e) => {
            return evaluator::unreadable_fixture(
                fixture.index,
                None,
                format!("failed to read {}: {}", fixture.expected_output_path.display(), e),
            )
        }
    };

    let input = match read_fixture_text(&fixture.input_path).await {
        Ok(text) => text,
        Err(e) => {
            return evaluator::unreadable_fixture(
                fixture.index,
                Some(&expected),
                format!("failed to read {}: {}", fixture.input_path.display(), e),
            )
        }
    };

    let output = engine.execute(target, &input).await;
    evaluator::evaluate_case(fixture.index, &output, &expected, policy)
}

/// Fixture files are text: UTF-8, with CRLF line endings read as LF.
/// Solution output is never rewritten this way.
async fn read_fixture_text(path: &Path) -> std::io::Result<String> {
    let text = tokio::fs::read_to_string(path).await?;
    if text.contains("\r\n") {
        Ok(text.replace("\r\n", "\n"))
    } else {
        Ok(text)
    }
}
