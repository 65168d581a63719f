//! Command-line surface shared by the loader binaries.

use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgGroup, Args, Parser};

use crate::config::{EnginePreference, LoaderConfig};
use crate::envelope::{InjectOptions, Syntax};
use crate::loader::inject::InjectArgs;
use crate::loader::validate::SpecSource;

/// Flags every loader accepts.
#[derive(Debug, Clone, Args)]
pub struct CommonArgs {
    /// Seconds before the module run is aborted
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Execution strategy for the module
    #[arg(long, value_enum)]
    pub engine: Option<EnginePreference>,

    /// Log runtime selection and module I/O sizes to stderr
    #[arg(short, long)]
    pub verbose: bool,
}

impl CommonArgs {
    /// Apply flag overrides on top of the loaded config.
    pub fn apply_to(&self, config: &mut LoaderConfig) {
        if let Some(secs) = self.timeout {
            config.timeout = Duration::from_secs(secs);
        }
        if let Some(engine) = self.engine {
            config.engine = engine;
        }
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "validate-test",
    version,
    about = "Validate a test specification with the validate-test WASM module.",
    after_help = "Exit codes:\n  0 - Validation passed\n  1 - Validation failed\n  2 - Usage/input error"
)]
#[command(group(ArgGroup::new("input").required(true).args(["file", "stdin"])))]
pub struct ValidateCli {
    /// Test specification file (JSON, or YAML by extension)
    pub file: Option<PathBuf>,

    /// Read the specification from standard input
    #[arg(long)]
    pub stdin: bool,

    #[command(flatten)]
    pub common: CommonArgs,
}

impl ValidateCli {
    pub fn source(&self) -> SpecSource {
        match &self.file {
            Some(path) if !self.stdin => SpecSource::File(path.clone()),
            _ => SpecSource::Stdin,
        }
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "inject-inline",
    version,
    about = "Inject generated test steps into a source file with the inject-inline WASM module.",
    after_help = "Exit codes:\n  0 - Success\n  1 - Injection failed\n  2 - Usage/input error"
)]
pub struct InjectCli {
    /// Test specification (JSON, or YAML by extension)
    pub spec_file: PathBuf,

    /// Source file to inject steps into
    pub source_file: PathBuf,

    /// Write the result back to the source file instead of previewing
    #[arg(long)]
    pub apply: bool,

    /// Syntax of the generated steps
    #[arg(long, value_enum, default_value_t = Syntax::Json)]
    pub syntax: Syntax,

    #[command(flatten)]
    pub common: CommonArgs,
}

impl InjectCli {
    pub fn args(&self) -> InjectArgs {
        InjectArgs {
            spec: self.spec_file.clone(),
            source: self.source_file.clone(),
            options: InjectOptions {
                apply: self.apply,
                syntax: self.syntax,
            },
        }
    }
}

/// Install the stderr tracing subscriber. `RUST_LOG` still wins per target.
pub fn init_tracing(verbose: bool) {
    let level = if verbose { "debug" } else { "warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(format!("wasm_skill_loader={level}")));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn validate_accepts_file() {
        let cli = ValidateCli::try_parse_from(["validate-test", "spec.json"]).unwrap();
        assert_eq!(cli.source(), SpecSource::File("spec.json".into()));
    }

    #[test]
    fn validate_accepts_stdin() {
        let cli = ValidateCli::try_parse_from(["validate-test", "--stdin"]).unwrap();
        assert_eq!(cli.source(), SpecSource::Stdin);
    }

    #[test]
    fn validate_requires_an_input() {
        let err = ValidateCli::try_parse_from(["validate-test"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn validate_file_and_stdin_conflict() {
        let err = ValidateCli::try_parse_from(["validate-test", "a.json", "--stdin"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ArgumentConflict);
    }

    #[test]
    fn unknown_flag_is_usage_error() {
        let err = ValidateCli::try_parse_from(["validate-test", "--bogus"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownArgument);
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn help_exits_0() {
        let err = ValidateCli::try_parse_from(["validate-test", "-h"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DisplayHelp);
        assert_eq!(err.exit_code(), 0);
    }

    #[test]
    fn inject_defaults() {
        let cli = InjectCli::try_parse_from(["inject-inline", "spec.yaml", "app.js"]).unwrap();
        let args = cli.args();
        assert_eq!(args.spec, PathBuf::from("spec.yaml"));
        assert_eq!(args.source, PathBuf::from("app.js"));
        assert!(!args.options.apply);
        assert_eq!(args.options.syntax, Syntax::Json);
    }

    #[test]
    fn inject_flags() {
        let cli = InjectCli::try_parse_from([
            "inject-inline", "spec.json", "page.xml", "--apply", "--syntax", "xml",
        ])
        .unwrap();
        let args = cli.args();
        assert!(args.options.apply);
        assert_eq!(args.options.syntax, Syntax::Xml);
    }

    #[test]
    fn inject_requires_both_files() {
        let err = InjectCli::try_parse_from(["inject-inline", "spec.json"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn inject_rejects_extra_positional() {
        let err = InjectCli::try_parse_from(["inject-inline", "a", "b", "c"]).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn inject_rejects_unknown_syntax() {
        let err = InjectCli::try_parse_from(["inject-inline", "a", "b", "--syntax", "toml"])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidValue);
    }

    #[test]
    fn syntax_without_value_is_usage_error() {
        let err = InjectCli::try_parse_from(["inject-inline", "a", "b", "--syntax"]).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn common_flags_override_config() {
        let cli = InjectCli::try_parse_from([
            "inject-inline", "a", "b", "--timeout", "5", "--engine", "process",
        ])
        .unwrap();
        let mut config = LoaderConfig::defaults_for(std::path::Path::new("/x"));
        cli.common.apply_to(&mut config);
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.engine, EnginePreference::Process);
    }
}
