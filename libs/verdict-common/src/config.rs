// Harness configuration: language toolchains and execution policy
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "config/verdict.json";
pub const DEFAULT_CASE_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_COMPILE_TIMEOUT_MS: u64 = 60_000;
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 16 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LanguageKind {
    Compiled,
    Interpreted,
}

/// Program plus arguments, with `{source}`, `{binary}` and `{script}`
/// placeholders filled in at execution time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandTemplate {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl CommandTemplate {
    pub fn new(command: &str, args: &[&str]) -> Self {
        Self {
            command: command.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    /// Substitute placeholders, returning the program and its argument list
    pub fn render(&self, vars: &[(&str, &Path)]) -> (String, Vec<String>) {
        (
            substitute(&self.command, vars),
            self.args.iter().map(|a| substitute(a, vars)).collect(),
        )
    }
}

/// Expand `{name}` placeholders in one left-to-right pass. Substituted
/// text is never scanned again, and unknown placeholders are kept as is.
fn substitute(text: &str, vars: &[(&str, &Path)]) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];

        let value = after.find('}').and_then(|close| {
            let name = &after[..close];
            vars.iter()
                .find(|(var, _)| *var == name)
                .map(|(_, path)| (close, path.to_string_lossy()))
        });

        match value {
            Some((close, path)) => {
                out.push_str(&path);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageConfig {
    pub name: String,
    pub file_extension: String,
    pub kind: LanguageKind,
    #[serde(default)]
    pub compile: Option<CommandTemplate>,
    pub run: CommandTemplate,
}

impl LanguageConfig {
    pub fn cpp() -> Self {
        Self {
            name: "cpp".to_string(),
            file_extension: ".cpp".to_string(),
            kind: LanguageKind::Compiled,
            compile: Some(CommandTemplate::new("g++", &["{source}", "-o", "{binary}"])),
            run: CommandTemplate::new("{binary}", &[]),
        }
    }

    pub fn python() -> Self {
        Self {
            name: "python".to_string(),
            file_extension: ".py".to_string(),
            kind: LanguageKind::Interpreted,
            compile: None,
            run: CommandTemplate::new("python3", &["{script}"]),
        }
    }

    /// Extension comparison ignores case and an optional leading dot
    pub fn matches_extension(&self, ext: &str) -> bool {
        let ours = self.file_extension.trim_start_matches('.');
        let theirs = ext.trim_start_matches('.');
        ours.eq_ignore_ascii_case(theirs)
    }
}

/// What to do when a solution writes anything to stderr
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StderrPolicy {
    /// Any stderr output marks the case as a runtime error
    #[default]
    Fail,
    /// stderr is kept for diagnostics but never affects the verdict
    Ignore,
}

impl FromStr for StderrPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fail" => Ok(StderrPolicy::Fail),
            "ignore" => Ok(StderrPolicy::Ignore),
            other => Err(format!("invalid stderr policy '{}' (expected fail or ignore)", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    pub case_timeout_ms: u64,
    pub compile_timeout_ms: u64,
    pub stderr_policy: StderrPolicy,
    pub fail_on_nonzero_exit: bool,
    pub max_output_bytes: usize,
    pub languages: Vec<LanguageConfig>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            case_timeout_ms: DEFAULT_CASE_TIMEOUT_MS,
            compile_timeout_ms: DEFAULT_COMPILE_TIMEOUT_MS,
            stderr_policy: StderrPolicy::default(),
            fail_on_nonzero_exit: false,
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
            languages: vec![LanguageConfig::cpp(), LanguageConfig::python()],
        }
    }
}

impl HarnessConfig {
    /// Load configuration from a JSON file
    pub fn load(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            bail!("Harness config file not found: {}", config_path.display());
        }

        let content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;

        let config: HarnessConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", config_path.display()))?;

        config.validate()?;
        Ok(config)
    }

    /// Load from `config_path` if it exists, built-in defaults otherwise
    pub fn load_or_default(config_path: &Path) -> Result<Self> {
        if config_path.exists() {
            Self::load(config_path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.case_timeout_ms == 0 {
            bail!("case_timeout_ms must be greater than zero");
        }
        if self.compile_timeout_ms == 0 {
            bail!("compile_timeout_ms must be greater than zero");
        }

        let mut seen = HashSet::new();
        for lang in &self.languages {
            if !seen.insert(lang.name.to_ascii_lowercase()) {
                bail!("Language '{}' is configured more than once", lang.name);
            }
            if lang.kind == LanguageKind::Compiled && lang.compile.is_none() {
                bail!("Compiled language '{}' has no compile command", lang.name);
            }
        }
        Ok(())
    }

    /// Look up a language by name, case-insensitively
    pub fn language(&self, name: &str) -> Option<&LanguageConfig> {
        self.languages
            .iter()
            .find(|l| l.name.eq_ignore_ascii_case(name))
    }

    /// Pick the language whose extension matches the solution file
    pub fn detect_language(&self, solution_path: &Path) -> Option<&LanguageConfig> {
        let ext = solution_path.extension()?.to_str()?;
        self.languages.iter().find(|l| l.matches_extension(ext))
    }

    pub fn list_languages(&self) -> Vec<String> {
        self.languages.iter().map(|l| l.name.clone()).collect()
    }

    pub fn case_timeout(&self) -> Duration {
        Duration::from_millis(self.case_timeout_ms)
    }

    pub fn compile_timeout(&self) -> Duration {
        Duration::from_millis(self.compile_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_defaults() {
        let config = HarnessConfig::default();
        assert_eq!(config.case_timeout(), Duration::from_secs(5));
        assert_eq!(config.stderr_policy, StderrPolicy::Fail);
        assert!(!config.fail_on_nonzero_exit);
        assert_eq!(config.list_languages(), vec!["cpp", "python"]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_detect_language_by_extension() {
        let config = HarnessConfig::default();
        assert_eq!(config.detect_language(Path::new("sol.cpp")).unwrap().name, "cpp");
        assert_eq!(config.detect_language(Path::new("dir/Sol.PY")).unwrap().name, "python");
        assert!(config.detect_language(Path::new("sol.rb")).is_none());
        assert!(config.detect_language(Path::new("Makefile")).is_none());
    }

    #[test]
    fn test_language_lookup_ignores_case() {
        let config = HarnessConfig::default();
        assert_eq!(config.language("CPP").unwrap().kind, LanguageKind::Compiled);
        assert_eq!(config.language("python").unwrap().kind, LanguageKind::Interpreted);
        assert!(config.language("java").is_none());
    }

    #[test]
    fn test_render_compile_template() {
        let cpp = LanguageConfig::cpp();
        let source = PathBuf::from("/tmp/run/main.cpp");
        let binary = PathBuf::from("/tmp/run/main");
        let (program, args) = cpp
            .compile
            .as_ref()
            .unwrap()
            .render(&[("source", source.as_path()), ("binary", binary.as_path())]);

        assert_eq!(program, "g++");
        assert_eq!(args, vec!["/tmp/run/main.cpp", "-o", "/tmp/run/main"]);

        let (program, args) = cpp.run.render(&[("binary", binary.as_path())]);
        assert_eq!(program, "/tmp/run/main");
        assert!(args.is_empty());
    }

    #[test]
    fn test_render_does_not_expand_substituted_paths() {
        let template = CommandTemplate::new("cc", &["{source}", "-o", "{binary}", "{unknown}", "{"]);
        let source = PathBuf::from("/tmp/{binary}/main.c");
        let binary = PathBuf::from("/tmp/{source}/main");

        let (_, args) = template.render(&[("source", source.as_path()), ("binary", binary.as_path())]);
        assert_eq!(
            args,
            vec!["/tmp/{binary}/main.c", "-o", "/tmp/{source}/main", "{unknown}", "{"]
        );
    }

    #[test]
    fn test_stderr_policy_from_str() {
        assert_eq!("fail".parse::<StderrPolicy>().unwrap(), StderrPolicy::Fail);
        assert_eq!("IGNORE".parse::<StderrPolicy>().unwrap(), StderrPolicy::Ignore);
        assert!("sometimes".parse::<StderrPolicy>().is_err());
    }

    #[test]
    fn test_load_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("verdict.json");
        fs::write(&path, r#"{ "case_timeout_ms": 250, "stderr_policy": "ignore" }"#).unwrap();

        let config = HarnessConfig::load(&path).unwrap();
        assert_eq!(config.case_timeout_ms, 250);
        assert_eq!(config.stderr_policy, StderrPolicy::Ignore);
        assert_eq!(config.compile_timeout_ms, DEFAULT_COMPILE_TIMEOUT_MS);
        assert_eq!(config.languages.len(), 2);
    }

    #[test]
    fn test_load_rejects_compiled_language_without_compiler() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("verdict.json");
        fs::write(
            &path,
            r#"{ "languages": [ { "name": "c", "file_extension": ".c", "kind": "compiled",
                 "run": { "command": "{binary}" } } ] }"#,
        )
        .unwrap();

        let err = HarnessConfig::load(&path).unwrap_err();
        assert!(err.to_string().contains("no compile command"));
    }

    #[test]
    fn test_load_rejects_duplicate_languages() {
        let mut config = HarnessConfig::default();
        config.languages.push(LanguageConfig::python());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_shipped_config_matches_defaults() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../..").join(DEFAULT_CONFIG_PATH);
        let config = HarnessConfig::load(&path).unwrap();
        let defaults = HarnessConfig::default();

        assert_eq!(config.case_timeout_ms, defaults.case_timeout_ms);
        assert_eq!(config.stderr_policy, defaults.stderr_policy);
        assert_eq!(config.languages, defaults.languages);
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.json");
        assert!(HarnessConfig::load(&path).is_err());
        let config = HarnessConfig::load_or_default(&path).unwrap();
        assert_eq!(config.case_timeout_ms, DEFAULT_CASE_TIMEOUT_MS);
    }
}
