/// Fixture Locator
///
/// Scans a problem directory for `ip<N>.txt` inputs and pairs each with its
/// `op<N>.txt` expected output. Inputs without an expected output are
/// reported as skipped, never as errors.
///
/// Entries are visited in file-name order, which is stable across
/// platforms but is not numeric order (`ip10.txt` sorts before `ip2.txt`).

use crate::error::LocatorError;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use verdict_common::types::Fixture;

pub const INPUT_PREFIX: &str = "ip";
pub const OUTPUT_PREFIX: &str = "op";
pub const FIXTURE_EXTENSION: &str = ".txt";

/// Input fixture with no matching expected output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedFixture {
    pub index: u32,
    pub input_path: PathBuf,
    pub expected_output_path: PathBuf,
}

#[derive(Debug, Default)]
pub struct FixtureSet {
    pub fixtures: Vec<Fixture>,
    pub skipped: Vec<SkippedFixture>,
}

impl FixtureSet {
    pub fn is_empty(&self) -> bool {
        self.fixtures.is_empty()
    }
}

/// First run of ASCII digits in a file name
fn digit_run(name: &str) -> Option<&str> {
    let start = name.find(|c: char| c.is_ascii_digit())?;
    let rest = &name[start..];
    let end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    Some(&rest[..end])
}

fn is_input_name(name: &str) -> bool {
    name.starts_with(INPUT_PREFIX) && name.ends_with(FIXTURE_EXTENSION)
}

/// Locate all fixtures in `dir`
pub fn locate(dir: &Path) -> Result<FixtureSet, LocatorError> {
    let io_err = |source| LocatorError::Io {
        path: dir.to_path_buf(),
        source,
    };

    let metadata = fs::metadata(dir).map_err(io_err)?;
    if !metadata.is_dir() {
        return Err(LocatorError::NotADirectory(dir.to_path_buf()));
    }

    let mut names = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_err)? {
        let entry = entry.map_err(io_err)?;
        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };
        if is_input_name(&name) && entry.path().is_file() {
            names.push(name);
        }
    }
    names.sort();

    let mut set = FixtureSet::default();

    for name in names {
        let digits = digit_run(&name).ok_or_else(|| LocatorError::MissingIndex(name.clone()))?;
        let index: u32 = digits
            .parse()
            .map_err(|_| LocatorError::IndexOverflow(name.clone()))?;

        let input_path = dir.join(&name);
        let expected_output_path =
            dir.join(format!("{}{}{}", OUTPUT_PREFIX, digits, FIXTURE_EXTENSION));

        if !expected_output_path.exists() {
            warn!(
                index,
                expected = %expected_output_path.display(),
                "Expected output file not found, skipping fixture"
            );
            set.skipped.push(SkippedFixture {
                index,
                input_path,
                expected_output_path,
            });
            continue;
        }

        debug!(index, input = %input_path.display(), "Located fixture");
        set.fixtures.push(Fixture {
            index,
            input_path,
            expected_output_path,
        });
    }

    Ok(set)
}
