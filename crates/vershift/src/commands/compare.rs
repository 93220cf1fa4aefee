//! Compare command — classify the change between two version strings.

use std::cmp::Ordering;

use clap::Args;
use owo_colors::OwoColorize;
use serde::Serialize;
use tracing::{debug, instrument};

use vershift_core::version::{self, ChangeKind};

/// Arguments for the `compare` subcommand.
#[derive(Args, Debug)]
pub struct CompareArgs {
    /// Earlier version
    pub previous: String,

    /// Later version
    pub current: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct Comparison {
    previous: String,
    current: String,
    changed: bool,
    #[serde(rename = "type")]
    change_type: ChangeKind,
    /// -1, 0, or 1 as `previous` is lower, equal, or higher.
    ordering: i8,
}

impl Comparison {
    fn new(previous: String, current: String) -> Self {
        let ordering = match version::compare_versions(&previous, &current) {
            Ordering::Less => -1,
            Ordering::Equal => 0,
            Ordering::Greater => 1,
        };
        Self {
            changed: previous != current,
            change_type: version::classify_change(&previous, &current),
            previous,
            current,
            ordering,
        }
    }
}

/// Print the change kind and ordering for two versions.
#[instrument(name = "cmd_compare", skip_all, fields(previous = %args.previous, current = %args.current))]
pub fn cmd_compare(args: CompareArgs, global_json: bool) -> anyhow::Result<()> {
    debug!(json_output = global_json, "executing compare command");
    let comparison = Comparison::new(args.previous, args.current);

    if global_json {
        println!("{}", serde_json::to_string_pretty(&comparison)?);
        return Ok(());
    }

    let arrow = match comparison.ordering {
        -1 => "→".green().to_string(),
        0 => "=".dimmed().to_string(),
        _ => "←".red().to_string(),
    };
    println!(
        "{} {arrow} {}: {}",
        comparison.previous,
        comparison.current,
        comparison.change_type.bold()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upgrade() {
        let c = Comparison::new("1.2.3".into(), "1.3.0".into());
        assert_eq!(c.change_type, ChangeKind::Minor);
        assert_eq!(c.ordering, -1);
        assert!(c.changed);
    }

    #[test]
    fn downgrade_orders_positive() {
        let c = Comparison::new("2.0.0".into(), "1.0.0".into());
        assert_eq!(c.ordering, 1);
        assert!(c.changed);
    }

    #[test]
    fn identical() {
        let c = Comparison::new("1.0.0".into(), "1.0.0".into());
        assert_eq!(c.ordering, 0);
        assert!(!c.changed);
        assert_eq!(c.change_type, ChangeKind::Unknown);
    }

    #[test]
    fn json_shape() {
        let c = Comparison::new("1.0.0".into(), "1.0.1".into());
        let json = serde_json::to_value(&c).unwrap();
        assert_eq!(json["type"], "patch");
        assert_eq!(json["ordering"], -1);
        assert_eq!(json["changed"], true);
    }

    #[test]
    fn cmd_compare_succeeds() {
        let args = CompareArgs {
            previous: "1".into(),
            current: "2".into(),
        };
        assert!(cmd_compare(args, false).is_ok());
    }
}
