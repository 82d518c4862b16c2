/// Compiler Adapter
///
/// Owns the temporary build workspace for one run and invokes the external
/// compiler at most once. Only the compiler's exit code decides success;
/// its output is kept as diagnostics either way.

use crate::error::HarnessError;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tokio::process::Command;
use tracing::{info, instrument, warn};
use verdict_common::config::CommandTemplate;

const WORKSPACE_PREFIX: &str = ".verdict-";
const SOLUTION_STEM: &str = "solution";

/// Scratch directory holding the solution source and binary for one run.
/// Removed when dropped, whatever the outcome of the run.
#[derive(Debug)]
pub struct BuildWorkspace {
    dir: TempDir,
}

impl BuildWorkspace {
    /// Create the workspace inside `parent` (the fixture directory)
    pub fn create_in(parent: &Path) -> io::Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix(WORKSPACE_PREFIX)
            .tempdir_in(parent)?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write the solution source, named after the language's extension
    pub async fn write_source(&self, file_extension: &str, source: &str) -> io::Result<PathBuf> {
        let ext = file_extension.trim_start_matches('.');
        let file_name = if ext.is_empty() {
            SOLUTION_STEM.to_string()
        } else {
            format!("{}.{}", SOLUTION_STEM, ext)
        };
        let path = self.path().join(file_name);
        tokio::fs::write(&path, source).await?;
        Ok(path)
    }

    /// Where the compiler should put the executable
    pub fn binary_path(&self) -> PathBuf {
        self.path()
            .join(format!("{}{}", SOLUTION_STEM, std::env::consts::EXE_SUFFIX))
    }
}

#[derive(Debug, Clone)]
pub struct CompileOutput {
    pub diagnostics: String,
    pub duration_ms: u64,
}

/// Run the compiler on `source`, producing `binary`
///
/// Blocks until the compiler exits or `timeout` elapses. A timed-out
/// compiler is killed when its handle is dropped.
#[instrument(skip(template), fields(compiler = %template.command))]
pub async fn compile(
    template: &CommandTemplate,
    source: &Path,
    binary: &Path,
    timeout: Duration,
) -> Result<CompileOutput, HarnessError> {
    let start_time = Instant::now();
    let (program, args) = template.render(&[("source", source), ("binary", binary)]);

    let child = Command::new(&program)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| HarnessError::CompilerSpawn {
            command: program.clone(),
            source: e,
        })?;

    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => {
            return Err(HarnessError::CompilerSpawn {
                command: program,
                source: e,
            })
        }
        Err(_) => {
            warn!(timeout_ms = timeout.as_millis() as u64, "Compilation timed out");
            return Err(HarnessError::CompileTimedOut {
                timeout_ms: timeout.as_millis() as u64,
            });
        }
    };

    let duration_ms = start_time.elapsed().as_millis() as u64;
    let mut diagnostics = String::from_utf8_lossy(&output.stderr).into_owned();
    let stdout = String::from_utf8_lossy(&output.stdout);
    if !stdout.trim().is_empty() {
        if !diagnostics.is_empty() && !diagnostics.ends_with('\n') {
            diagnostics.push('\n');
        }
        diagnostics.push_str(&stdout);
    }

    if output.status.success() {
        info!(duration_ms, "Compilation succeeded");
        Ok(CompileOutput {
            diagnostics,
            duration_ms,
        })
    } else {
        warn!(
            duration_ms,
            exit_code = ?output.status.code(),
            error_preview = diagnostics.lines().next().unwrap_or(""),
            "Compilation failed"
        );
        Err(HarnessError::Compilation {
            exit_code: output.status.code(),
            diagnostics,
        })
    }
}
