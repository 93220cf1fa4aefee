//! Check command — extract the current version and diff it against the
//! previous commit.

use anyhow::Context;
use clap::Args;
use clap::builder::BoolishValueParser;
use tracing::{debug, info, instrument};

use vershift_core::check::{self, CheckRequest, Target};
use vershift_core::config::{Config, OutputFormat};
use vershift_core::git::Git;

use crate::outputs;

/// Legacy action input name for the file argument.
const ENV_FILE_NAME: &str = "INPUT_FILE-NAME";

/// Action input enabling the diff. Only the exact value `true` turns it on.
const ENV_DIFF_SEARCH: &str = "INPUT_DIFF-SEARCH";

/// Arguments for the `check` subcommand.
#[derive(Args, Debug, Default)]
pub struct CheckArgs {
    /// Version file, optionally followed by `#` and a key path
    /// (e.g. `Cargo.toml#package.version`)
    #[arg(value_name = "FILE[#QUERY]", env = "INPUT_FILE")]
    pub file: Option<String>,

    /// Dotted key path inside the file [default: version]
    #[arg(short = 'k', long, value_name = "QUERY", env = "INPUT_QUERY")]
    pub query: Option<String>,

    /// Compare against the parent commit (true/false) [env: INPUT_DIFF-SEARCH]
    #[arg(
        short,
        long,
        value_name = "BOOL",
        num_args = 0..=1,
        default_missing_value = "true",
        value_parser = BoolishValueParser::new(),
    )]
    pub diff_search: Option<bool>,

    /// Where to write outputs [default: github when $GITHUB_OUTPUT is set, else text]
    #[arg(short, long, value_enum)]
    pub output: Option<OutputFormat>,
}

impl CheckArgs {
    /// Build the core request, filling gaps from the environment and config.
    fn request(&self, config: &Config) -> anyhow::Result<CheckRequest> {
        self.request_with(config, |name| std::env::var(name).ok())
    }

    /// Same as [`Self::request`], reading action inputs through `env`.
    ///
    /// The runner sets undeclared or unused inputs to `""`, so empty values
    /// count as absent everywhere.
    fn request_with<F>(&self, config: &Config, env: F) -> anyhow::Result<CheckRequest>
    where
        F: Fn(&str) -> Option<String>,
    {
        let input = self
            .file
            .clone()
            .filter(|f| !f.is_empty())
            .or_else(|| env(ENV_FILE_NAME).filter(|v| !v.is_empty()))
            .context("no version file given (pass FILE or set INPUT_FILE)")?;
        let default_query = self
            .query
            .as_deref()
            .filter(|q| !q.is_empty())
            .unwrap_or_else(|| config.query_or_default());
        let diff_search = self
            .diff_search
            .or_else(|| {
                env(ENV_DIFF_SEARCH)
                    .filter(|v| !v.is_empty())
                    .map(|v| v == "true")
            })
            .or(config.diff_search)
            .unwrap_or(false);

        Ok(CheckRequest {
            target: Target::parse(&input, Some(default_query)),
            diff_search,
        })
    }
}

/// Run a version check and write its outputs.
///
/// # Arguments
/// * `global_json` - Global `--json` flag from CLI
/// * `config` - Loaded configuration
/// * `cwd` - Working directory; git runs here
#[instrument(name = "cmd_check", skip_all)]
pub fn cmd_check(
    args: CheckArgs,
    global_json: bool,
    config: &Config,
    cwd: &camino::Utf8Path,
) -> anyhow::Result<()> {
    let request = args.request(config)?;
    let format = outputs::resolve_format(args.output, global_json, config.output);
    debug!(?request, ?format, "executing check command");

    info!("Checking version in file: {}", request.target.file);
    info!("Query path: {}", request.target.query);

    let report = check::run(&request, &Git::in_dir(cwd))?;

    outputs::emit(&report, format)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn env_of(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: Vec<(String, String)> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| {
            vars.iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.clone())
        }
    }

    fn args(file: &str) -> CheckArgs {
        CheckArgs {
            file: Some(file.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn hash_query_beats_flag_and_config() {
        let mut a = args("Cargo.toml#package.version");
        a.query = Some("version".into());
        let config = Config {
            query: Some("other".into()),
            ..Default::default()
        };
        let request = a.request_with(&config, no_env).unwrap();
        assert_eq!(request.target.query.as_str(), "package.version");
    }

    #[test]
    fn flag_beats_config() {
        let mut a = args("Chart.yaml");
        a.query = Some("appVersion".into());
        let config = Config {
            query: Some("version".into()),
            ..Default::default()
        };
        assert_eq!(
            a.request_with(&config, no_env).unwrap().target.query.as_str(),
            "appVersion"
        );
    }

    #[test]
    fn empty_query_flag_falls_back() {
        let mut a = args("package.json");
        a.query = Some(String::new());
        assert_eq!(
            a.request_with(&Config::default(), no_env).unwrap().target.query.as_str(),
            "version"
        );
    }

    #[test]
    fn diff_search_defaults_off_and_follows_config() {
        assert!(!args("package.json").request_with(&Config::default(), no_env).unwrap().diff_search);

        let config = Config {
            diff_search: Some(true),
            ..Default::default()
        };
        assert!(args("package.json").request_with(&config, no_env).unwrap().diff_search);

        let mut a = args("package.json");
        a.diff_search = Some(false);
        assert!(!a.request_with(&config, no_env).unwrap().diff_search);
    }

    #[test]
    fn empty_diff_search_input_counts_as_absent() {
        let env = env_of(&[(ENV_DIFF_SEARCH, "")]);
        let request = args("package.json")
            .request_with(&Config::default(), env)
            .unwrap();
        assert!(!request.diff_search);

        let config = Config {
            diff_search: Some(true),
            ..Default::default()
        };
        let env = env_of(&[(ENV_DIFF_SEARCH, "")]);
        assert!(args("package.json").request_with(&config, env).unwrap().diff_search);
    }

    #[test]
    fn diff_search_input_is_on_only_for_true() {
        for (value, expected) in [("true", true), ("false", false), ("yes", false), ("1", false)] {
            let request = args("package.json")
                .request_with(&Config::default(), env_of(&[(ENV_DIFF_SEARCH, value)]))
                .unwrap();
            assert_eq!(request.diff_search, expected, "INPUT_DIFF-SEARCH={value}");
        }
    }

    #[test]
    fn diff_search_flag_beats_input() {
        let mut a = args("package.json");
        a.diff_search = Some(true);
        let env = env_of(&[(ENV_DIFF_SEARCH, "false")]);
        assert!(a.request_with(&Config::default(), env).unwrap().diff_search);
    }

    #[test]
    fn empty_file_falls_back_to_legacy_input() {
        let env = env_of(&[(ENV_FILE_NAME, "Cargo.toml")]);
        let request = args("").request_with(&Config::default(), env).unwrap();
        assert_eq!(request.target.file, "Cargo.toml");
    }

    #[test]
    fn missing_file_everywhere_is_an_error() {
        let env = env_of(&[(ENV_FILE_NAME, "")]);
        assert!(args("").request_with(&Config::default(), env).is_err());
        let a = CheckArgs::default();
        assert!(a.request_with(&Config::default(), no_env).is_err());
    }
}
