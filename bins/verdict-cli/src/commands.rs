// CLI commands backing the `verdict` subcommands
use crate::report::TerminalSink;
use anyhow::{bail, Context, Result};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, error};
use verdict_common::config::{HarnessConfig, LanguageKind};
use verdict_common::types::Submission;
use verdict_engine::{locator, Harness};

/// Root directory that `--problem` names are resolved under
pub const TEST_DATA_DIR: &str = "TestData";

pub const EXIT_ALL_PASSED: u8 = 0;
pub const EXIT_SOME_FAILED: u8 = 1;
pub const EXIT_FATAL: u8 = 2;

/// Lower-case a problem name and collapse whitespace runs into `-`
pub fn slugify(name: &str) -> String {
    name.split_whitespace()
        .map(|word| word.to_lowercase())
        .collect::<Vec<_>>()
        .join("-")
}

/// Work out which directory holds the fixtures for this run.
///
/// An explicit `--fixtures` wins, then `--problem`, then the directory
/// the solution file sits in.
pub fn resolve_fixture_dir(
    solution: &Path,
    fixtures: Option<&Path>,
    problem: Option<&str>,
) -> Result<PathBuf> {
    if let Some(dir) = fixtures {
        return Ok(dir.to_path_buf());
    }

    if let Some(name) = problem {
        let slug = slugify(name);
        if slug.is_empty() {
            bail!("Problem name cannot be empty");
        }
        return Ok(Path::new(TEST_DATA_DIR).join(slug));
    }

    match solution.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => Ok(parent.to_path_buf()),
        _ => Ok(PathBuf::from(".")),
    }
}

/// Judge `solution` against the fixtures in `fixture_dir`, printing progress
/// and the final report to stdout. Returns the process exit code.
pub async fn run_solution(
    config: HarnessConfig,
    solution: &Path,
    fixture_dir: &Path,
    language: Option<&str>,
    json: bool,
) -> Result<u8> {
    let language = match language {
        Some(name) => config
            .language(name)
            .map(|l| l.name.clone())
            .with_context(|| {
                format!(
                    "Unknown language '{}' (configured: {})",
                    name,
                    config.list_languages().join(", ")
                )
            })?,
        None => config
            .detect_language(solution)
            .map(|l| l.name.clone())
            .with_context(|| {
                format!(
                    "Cannot detect language of {}; pass --language",
                    solution.display()
                )
            })?,
    };

    let source = fs::read_to_string(solution)
        .with_context(|| format!("Failed to read solution {}", solution.display()))?;

    debug!(
        solution = %solution.display(),
        fixture_dir = %fixture_dir.display(),
        language = %language,
        "Starting run"
    );

    let harness = Harness::new(config);
    let submission = Submission::new(language, source);
    let mut sink = TerminalSink::new(io::stdout().lock(), json);

    match harness.run_and_report(&submission, fixture_dir, &mut sink).await {
        Ok(true) => Ok(EXIT_ALL_PASSED),
        Ok(false) => Ok(EXIT_SOME_FAILED),
        // The sink has already rendered the compiler diagnostics
        Err(e) if e.is_compilation_failure() => {
            error!(error = %e, "Compilation failed");
            Ok(EXIT_FATAL)
        }
        Err(e) => Err(e.into()),
    }
}

/// Print the fixtures found in `dir`, plus inputs with no expected output
pub fn list_fixtures(dir: &Path, out: &mut impl Write) -> Result<()> {
    let set = locator::locate(dir)
        .with_context(|| format!("Failed to scan fixtures in {}", dir.display()))?;

    if set.is_empty() && set.skipped.is_empty() {
        writeln!(out, "No fixtures found in {}", dir.display())?;
        return Ok(());
    }

    writeln!(out, "{:<8} {:<30} {:<30}", "Case", "Input", "Expected")?;
    writeln!(out, "{}", "─".repeat(70))?;
    for fixture in &set.fixtures {
        writeln!(
            out,
            "{:<8} {:<30} {:<30}",
            fixture.index,
            file_name(&fixture.input_path),
            file_name(&fixture.expected_output_path)
        )?;
    }
    for skipped in &set.skipped {
        writeln!(
            out,
            "{:<8} {:<30} {:<30}",
            skipped.index,
            file_name(&skipped.input_path),
            format!("(missing {})", file_name(&skipped.expected_output_path))
        )?;
    }

    writeln!(
        out,
        "\nTotal: {} fixture(s), {} skipped",
        set.fixtures.len(),
        set.skipped.len()
    )?;
    Ok(())
}

/// Print every configured language and how it is built and run
pub fn list_languages(config: &HarnessConfig, out: &mut impl Write) -> Result<()> {
    if config.languages.is_empty() {
        writeln!(out, "No languages configured.")?;
        return Ok(());
    }

    writeln!(out, "{:<12} {:<10} {:<12} {:<40}", "Name", "Extension", "Kind", "Command")?;
    writeln!(out, "{}", "─".repeat(76))?;
    for lang in &config.languages {
        let kind = match lang.kind {
            LanguageKind::Compiled => "compiled",
            LanguageKind::Interpreted => "interpreted",
        };
        let run = join_template(&lang.run.command, &lang.run.args);
        let command = match &lang.compile {
            Some(compile) => format!("{} && {}", join_template(&compile.command, &compile.args), run),
            None => run,
        };
        writeln!(out, "{:<12} {:<10} {:<12} {:<40}", lang.name, lang.file_extension, kind, command)?;
    }

    writeln!(out, "\nTotal: {} language(s)", config.languages.len())?;
    Ok(())
}

fn join_template(command: &str, args: &[String]) -> String {
    std::iter::once(command)
        .chain(args.iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join(" ")
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
