use std::path::PathBuf;
use thiserror::Error;

/// Problems scanning a fixture directory
#[derive(Debug, Error)]
pub enum LocatorError {
    #[error("failed to read fixture directory {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0} is not a directory")]
    NotADirectory(PathBuf),

    #[error("fixture input '{0}' has no numeric index")]
    MissingIndex(String),

    #[error("fixture index in '{0}' is too large")]
    IndexOverflow(String),
}

/// Run-aborting failures. Anything that goes wrong inside a single case is
/// recorded in that case's verdict instead.
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("unknown language '{0}'")]
    UnknownLanguage(String),

    #[error("source code is {size} bytes, maximum is {limit}")]
    SourceTooLarge { size: usize, limit: usize },

    #[error(transparent)]
    Locator(#[from] LocatorError),

    #[error("failed to prepare build workspace: {0}")]
    Workspace(#[source] std::io::Error),

    #[error("failed to start compiler '{command}': {source}")]
    CompilerSpawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("compilation timed out after {timeout_ms}ms")]
    CompileTimedOut { timeout_ms: u64 },

    #[error("compilation failed (exit code {})", exit_code.map_or_else(|| "none".to_string(), |c| c.to_string()))]
    Compilation {
        exit_code: Option<i32>,
        diagnostics: String,
    },
}

impl HarnessError {
    /// True for every failure of the compile step
    pub fn is_compilation_failure(&self) -> bool {
        matches!(
            self,
            HarnessError::Compilation { .. }
                | HarnessError::CompilerSpawn { .. }
                | HarnessError::CompileTimedOut { .. }
        )
    }

    /// Compiler output, when the compiler ran far enough to produce any
    pub fn diagnostics(&self) -> Option<&str> {
        match self {
            HarnessError::Compilation { diagnostics, .. } => Some(diagnostics),
            _ => None,
        }
    }
}
