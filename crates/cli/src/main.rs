// Explorium CLI - match, enrich and search companies and prospects
// Exit codes are listed in exit_codes.rs

mod app;
mod commands;
mod exit_codes;
mod output;
mod util;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use explorium_client::ClientError;
use explorium_config::{ConfigError, OutputFormat};
use explorium_engine::retry::RetryFailure;
use explorium_engine::{InputError, PipelineError};
use tracing_subscriber::EnvFilter;

use exit_codes::{
    pipeline_exit_code, retry_exit_code, EXIT_CONFIG, EXIT_ERROR, EXIT_INPUT, EXIT_MISSING_KEY,
    EXIT_SUCCESS, EXIT_USAGE,
};

#[derive(Parser)]
#[command(name = "explorium")]
#[command(about = "Match, enrich and search companies and prospects via the Explorium API")]
#[command(long_version = long_version())]
#[command(version)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

/// Flags accepted by every command.
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Config file [default: <config dir>/explorium/config.toml]
    #[arg(long, short = 'c', global = true, env = "EXPLORIUM_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output format: json, table or csv [default: from config, else json]
    #[arg(long, short = 'o', global = true, value_parser = parse_format)]
    pub output: Option<OutputFormat>,

    /// Write results to a file instead of stdout (table is written as JSON)
    #[arg(long, global = true)]
    pub output_file: Option<PathBuf>,

    /// Parallel API requests [default: from config, else 5]
    #[arg(long, global = true)]
    pub concurrency: Option<usize>,

    /// Only print errors on stderr
    #[arg(long, short = 'q', global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Print debug logs on stderr
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Match, search and enrich companies
    #[command(subcommand)]
    Businesses(commands::businesses::BusinessCommands),

    /// Match, search and enrich people
    #[command(subcommand)]
    Prospects(commands::prospects::ProspectCommands),

    /// Manage the partner enrichment webhook
    #[command(subcommand)]
    Webhooks(commands::webhooks::WebhookCommands),

    /// Show or edit the config file
    #[command(subcommand)]
    Config(commands::config::ConfigCommands),
}

fn parse_format(s: &str) -> Result<OutputFormat, String> {
    s.parse().map_err(|e: ConfigError| e.to_string())
}

fn long_version() -> &'static str {
    if cfg!(debug_assertions) {
        concat!(
            env!("CARGO_PKG_VERSION"),
            " (", env!("EXPLORIUM_GIT_HASH"), ")",
            "\nengine:  explorium-engine ", env!("CARGO_PKG_VERSION"),
            "\nbuild:   debug",
            "\ntarget:  ", env!("EXPLORIUM_TARGET"),
        )
    } else {
        concat!(
            env!("CARGO_PKG_VERSION"),
            " (", env!("EXPLORIUM_GIT_HASH"), ")",
            "\nengine:  explorium-engine ", env!("CARGO_PKG_VERSION"),
            "\nbuild:   release",
            "\ntarget:  ", env!("EXPLORIUM_TARGET"),
        )
    }
}

/// Logs go to stderr so stdout stays parseable. `RUST_LOG` wins over flags.
fn init_tracing(global: &GlobalArgs) {
    let default = if global.quiet {
        "error"
    } else if global.verbose {
        "debug"
    } else {
        "info"
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli.global);

    let result = match cli.command {
        Commands::Businesses(cmd) => commands::businesses::run(cmd, &cli.global),
        Commands::Prospects(cmd) => commands::prospects::run(cmd, &cli.global),
        Commands::Webhooks(cmd) => commands::webhooks::run(cmd, &cli.global),
        Commands::Config(cmd) => commands::config::run(cmd, &cli.global),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(e) => {
            eprintln!("error: {}", e.message);
            if let Some(hint) = &e.hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(e.code)
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn new(code: u8, msg: impl Into<String>) -> Self {
        Self { code, message: msg.into(), hint: None }
    }

    pub fn args(msg: impl Into<String>) -> Self {
        Self::new(EXIT_USAGE, msg)
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self::new(EXIT_ERROR, msg)
    }

    pub fn input(msg: impl Into<String>) -> Self {
        Self::new(EXIT_INPUT, msg)
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl From<PipelineError> for CliError {
    fn from(err: PipelineError) -> Self {
        let code = pipeline_exit_code(&err);
        let hint = match &err {
            PipelineError::Fatal(_) => Some("check the API key: explorium config show"),
            PipelineError::Input(_) => Some("input must be CSV with a header row, or JSON rows"),
            _ => None,
        };
        let e = Self::new(code, err.to_string());
        match hint {
            Some(h) => e.with_hint(h),
            None => e,
        }
    }
}

impl From<InputError> for CliError {
    fn from(err: InputError) -> Self {
        Self::input(err.to_string())
    }
}

impl From<RetryFailure> for CliError {
    fn from(failure: RetryFailure) -> Self {
        let code = retry_exit_code(&failure);
        let e = Self::new(
            code,
            format!("{} (after {} attempt(s))", failure.error, failure.attempts),
        );
        if failure.error.is_auth() {
            e.with_hint("check the API key: explorium config show")
        } else {
            e
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        let code = match err {
            ConfigError::UnknownKey(_) => EXIT_USAGE,
            _ => EXIT_CONFIG,
        };
        Self::new(code, err.to_string())
    }
}

impl From<ClientError> for CliError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::MissingKey => Self::new(EXIT_MISSING_KEY, "no API key configured")
                .with_hint("run `explorium config init --api-key <KEY>` or set EXPLORIUM_API_KEY"),
            ClientError::UnknownType { .. } => Self::args(err.to_string()),
            ClientError::Build(_) => Self::io(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use explorium_engine::RemoteError;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "explorium", "businesses", "match", "--name", "Acme", "-o", "csv", "--concurrency", "2",
        ])
        .unwrap();
        assert_eq!(cli.global.output, Some(OutputFormat::Csv));
        assert_eq!(cli.global.concurrency, Some(2));
    }

    #[test]
    fn bad_output_format_rejected() {
        assert!(Cli::try_parse_from(["explorium", "-o", "xml", "config", "path"]).is_err());
    }

    #[test]
    fn missing_key_maps_to_exit_10() {
        let e = CliError::from(ClientError::MissingKey);
        assert_eq!(e.code, EXIT_MISSING_KEY);
        assert!(e.hint.unwrap().contains("EXPLORIUM_API_KEY"));
    }

    #[test]
    fn auth_failure_has_hint() {
        let err = RemoteError::Status { status: 401, message: "bad key".into(), retry_after: None };
        let e = CliError::from(PipelineError::Fatal(err));
        assert_eq!(e.code, exit_codes::EXIT_AUTH);
        assert!(e.hint.is_some());
    }

    #[test]
    fn config_errors() {
        assert_eq!(CliError::from(ConfigError::UnknownKey("x".into())).code, EXIT_USAGE);
        let invalid = ConfigError::InvalidValue {
            key: "concurrency".into(),
            value: "0".into(),
            reason: "must be at least 1".into(),
        };
        assert_eq!(CliError::from(invalid).code, EXIT_CONFIG);
    }
}
