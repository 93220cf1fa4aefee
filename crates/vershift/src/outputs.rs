//! Output sinks for check results.
//!
//! `github` appends to the file named by `$GITHUB_OUTPUT` using the Actions
//! `name=value` format, `text` prints the same lines to stdout, and `json`
//! prints the whole report as one object.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Context;
use tracing::debug;
use vershift_core::{OutputFormat, Report};

/// Environment variable naming the Actions output file.
pub const ENV_GITHUB_OUTPUT: &str = "GITHUB_OUTPUT";

/// Choose a sink when none was requested explicitly.
///
/// Priority: `--output` > `--json` > config `output` > `github` when
/// `$GITHUB_OUTPUT` is set > `text`.
pub fn resolve_format(
    explicit: Option<OutputFormat>,
    global_json: bool,
    configured: Option<OutputFormat>,
) -> OutputFormat {
    explicit
        .or(global_json.then_some(OutputFormat::Json))
        .or(configured)
        .unwrap_or_else(|| {
            if std::env::var_os(ENV_GITHUB_OUTPUT).is_some() {
                OutputFormat::Github
            } else {
                OutputFormat::Text
            }
        })
}

/// Write `report` to the sink for `format`.
pub fn emit(report: &Report, format: OutputFormat) -> anyhow::Result<()> {
    debug!(?format, "writing outputs");
    match format {
        OutputFormat::Github => {
            let path = std::env::var_os(ENV_GITHUB_OUTPUT)
                .with_context(|| format!("{ENV_GITHUB_OUTPUT} is not set"))?;
            append_github_output(Path::new(&path), report)
        }
        OutputFormat::Text => {
            write_key_values(io::stdout().lock(), report)?;
            Ok(())
        }
        OutputFormat::Json => {
            let mut stdout = io::stdout().lock();
            serde_json::to_writer_pretty(&mut stdout, report)?;
            writeln!(stdout)?;
            Ok(())
        }
    }
}

fn append_github_output(path: &Path, report: &Report) -> anyhow::Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    write_key_values(file, report).with_context(|| format!("failed to write {}", path.display()))
}

/// Write every output as `name=value`, one per line.
///
/// Values containing a newline use the heredoc form
/// `name<<DELIMITER` / value / `DELIMITER`.
pub fn write_key_values<W: Write>(mut writer: W, report: &Report) -> io::Result<()> {
    for (name, value) in report.outputs() {
        if value.contains('\n') || value.contains('\r') {
            let delimiter = heredoc_delimiter(&value);
            writeln!(writer, "{name}<<{delimiter}")?;
            writeln!(writer, "{value}")?;
            writeln!(writer, "{delimiter}")?;
        } else {
            writeln!(writer, "{name}={value}")?;
        }
    }
    writer.flush()
}

fn heredoc_delimiter(value: &str) -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or_default();
    let mut delimiter = format!("vershift_{}_{nanos}", std::process::id());
    while value.contains(&delimiter) {
        delimiter.push('_');
    }
    delimiter
}
