//! Version check orchestration.
//!
//! All decision logic lives here. The CLI only gathers inputs and writes the
//! resulting [`Report`] to an output sink.
//!
//! # Flow
//!
//! 1. Extract the current version. Any failure here aborts the check.
//! 2. If a diff was requested, fetch the file from the parent commit.
//!    - Found: parse it, extract the previous version, classify the change.
//!    - Not changed in the last commit, or no history: report `changed`.
//! 3. Without a diff, always report `changed`.
//!
//! Failures in step 2 never abort; they become warnings and `changed=false`.

use std::cmp::Ordering;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::document::Format;
use crate::error::{CheckError, CheckResult};
use crate::git::{self, History, PreviousContent};
use crate::query::{DEFAULT_QUERY, KeyPath};
use crate::version::{self, ChangeKind};

/// A file plus the key path to read from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// Path to the JSON, YAML, or TOML file.
    pub file: Utf8PathBuf,
    /// Dotted key path inside the file.
    pub query: KeyPath,
}

impl Target {
    /// Build a target from `file[#query]`.
    ///
    /// The key path after the first `#` wins; otherwise `default_query`,
    /// otherwise `version`.
    pub fn parse(input: &str, default_query: Option<&str>) -> Self {
        let (file, query) = match input.split_once('#') {
            Some((file, query)) => (file, query),
            None => (input, default_query.unwrap_or(DEFAULT_QUERY)),
        };
        Self {
            file: Utf8PathBuf::from(file),
            query: KeyPath::new(query),
        }
    }
}

/// Inputs to a version check.
#[derive(Debug, Clone)]
pub struct CheckRequest {
    /// What to read.
    pub target: Target,
    /// Compare against the parent commit.
    pub diff_search: bool,
}

/// Result of a version check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    /// Version currently in the file.
    pub version: String,
    /// Version in the parent commit, when one was found.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_version: Option<String>,
    /// Whether the version is considered changed.
    pub changed: bool,
    /// Kind of change, only when a change was detected against history.
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub change_type: Option<ChangeKind>,
    /// Non-fatal problems met along the way.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl Report {
    fn new(version: String) -> Self {
        Self {
            version,
            previous_version: None,
            changed: true,
            change_type: None,
            warnings: Vec::new(),
        }
    }

    /// Output name/value pairs, in emission order.
    pub fn outputs(&self) -> Vec<(&'static str, String)> {
        let mut outputs = vec![("version", self.version.clone())];
        if let Some(ref previous) = self.previous_version {
            outputs.push(("previous_version", previous.clone()));
        }
        outputs.push(("changed", self.changed.to_string()));
        if let Some(kind) = self.change_type {
            outputs.push(("type", kind.to_string()));
        }
        outputs
    }
}

/// Read `file` and resolve `query` in it.
#[instrument(skip_all, fields(file = %file, query = %query))]
pub fn extract_version(file: &Utf8Path, query: &KeyPath) -> CheckResult<String> {
    let content = std::fs::read_to_string(file).map_err(|source| CheckError::Read {
        path: file.to_path_buf(),
        source,
    })?;
    extract_from_content(&content, file, query)
}

fn extract_from_content(content: &str, file: &Utf8Path, query: &KeyPath) -> CheckResult<String> {
    let tree = Format::from_path(file)?.parse(content)?;
    Ok(query.resolve(&tree, Some(file))?)
}

/// Run a version check.
///
/// Returns an error only when the current version cannot be extracted.
#[instrument(skip_all, fields(file = %request.target.file, query = %request.target.query))]
pub fn run<H: History + ?Sized>(request: &CheckRequest, history: &H) -> CheckResult<Report> {
    let Target { file, query } = &request.target;

    let current = extract_version(file, query)?;
    info!("Current version: {current}");
    let mut report = Report::new(current);

    if !request.diff_search {
        return Ok(report);
    }

    match git::fetch_previous(history, file.as_str()) {
        PreviousContent::Found(content) => match extract_from_content(&content, file, query) {
            Ok(previous) => compare(&mut report, previous),
            Err(err) => {
                let message = format!("Could not get previous version: {err}");
                warn!("{message}");
                report.warnings.push(message);
                report.changed = false;
            }
        },
        PreviousContent::NotChanged | PreviousContent::Unavailable(_) => {
            info!("No previous version found (possibly first commit)");
        }
    }

    Ok(report)
}

fn compare(report: &mut Report, previous: String) {
    info!("Previous version: {previous}");
    report.changed = report.version != previous;

    if report.changed {
        let kind = version::classify_change(&previous, &report.version);
        info!("Version changed: {previous} → {} ({kind})", report.version);
        if version::compare_versions(&previous, &report.version) == Ordering::Greater {
            let message = format!(
                "Version went backwards: {previous} → {}",
                report.version
            );
            warn!("{message}");
            report.warnings.push(message);
        }
        report.change_type = Some(kind);
    } else {
        info!("Version unchanged");
    }
    report.previous_version = Some(previous);
}
