//! Binary entry point for kintone-transfer.
//!
//! Exports kintone app records to CSV or JSON, or imports a CSV file into an
//! app.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Allow print_stderr in main binary for CLI output
#![allow(clippy::print_stderr)]
// Allow multiple crate versions from transitive dependencies
#![allow(clippy::multiple_crate_versions)]

use clap::Parser;
use kintone_transfer::cli;
use kintone_transfer::config::{ConfigOverrides, TransferConfig};
use kintone_transfer::observability;
use kintone_transfer::security::PromptingCredentials;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

/// kintone-transfer - bulk export and import of kintone app records.
///
/// Exports to stdout (or `--output`) unless an import file is given with `-f`.
#[derive(Parser, Debug)]
#[command(name = "kintone-transfer")]
#[command(author, version, about, long_about = None)]
#[allow(clippy::struct_excessive_bools)]
struct Cli {
    /// Login name.
    #[arg(short = 'u', long = "user", env = "KINTONE_USER")]
    login: Option<String>,

    /// Password; prompted for when a login is given without one.
    #[arg(short = 'p', long, env = "KINTONE_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Basic authentication user.
    #[arg(short = 'U', long = "basic-auth-user", env = "KINTONE_BASIC_AUTH_USER")]
    basic_auth_user: Option<String>,

    /// Basic authentication password; prompted for when a user is given without one.
    #[arg(
        short = 'P',
        long = "basic-auth-password",
        env = "KINTONE_BASIC_AUTH_PASSWORD",
        hide_env_values = true
    )]
    basic_auth_password: Option<String>,

    /// Domain, e.g. `example` or `example.cybozu.com`.
    #[arg(short = 'd', long, env = "KINTONE_DOMAIN")]
    domain: Option<String>,

    /// API token.
    #[arg(short = 't', long = "token", env = "KINTONE_API_TOKEN", hide_env_values = true)]
    api_token: Option<String>,

    /// App id.
    #[arg(short = 'a', long = "app", env = "KINTONE_APP_ID")]
    app_id: Option<String>,

    /// Output format: csv or json.
    #[arg(short = 'o', long)]
    format: Option<String>,

    /// Query filter for export.
    #[arg(short = 'q', long)]
    query: Option<String>,

    /// Fields to export, comma separated.
    #[arg(short = 'c', long = "columns")]
    fields: Option<String>,

    /// CSV file to import.
    #[arg(short = 'f', long = "file")]
    input: Option<PathBuf>,

    /// Delete all records before importing.
    #[arg(short = 'D', long = "delete-all")]
    delete_all: bool,

    /// Character encoding: utf-8, utf-16, utf-16be-with-signature,
    /// utf-16le-with-signature, sjis or euc-jp.
    #[arg(short = 'e', long)]
    encoding: Option<String>,

    /// Write the export to this file instead of stdout.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Fail when a record has fields outside the exported columns.
    #[arg(long)]
    strict_columns: bool,

    /// Path to configuration file.
    #[arg(long, env = "KINTONE_TRANSFER_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short = 'v', long)]
    verbose: bool,
}

impl Cli {
    fn into_overrides(self) -> (Option<PathBuf>, ConfigOverrides) {
        let overrides = ConfigOverrides {
            domain: self.domain,
            login: self.login,
            password: self.password,
            basic_auth_user: self.basic_auth_user,
            basic_auth_password: self.basic_auth_password,
            api_token: self.api_token,
            app_id: self.app_id,
            query: self.query,
            fields: self.fields,
            format: self.format,
            encoding: self.encoding,
            delete_all: self.delete_all,
            input: self.input,
            output: self.output,
            strict_columns: self.strict_columns,
            verbose: self.verbose,
        };
        (self.config, overrides)
    }
}

fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let (config_path, overrides) = Cli::parse().into_overrides();

    let config = match TransferConfig::load(config_path.as_deref(), overrides) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        },
    };

    if let Err(e) = observability::init(&config.logging) {
        eprintln!("Failed to initialize observability: {e}");
        return ExitCode::FAILURE;
    }
    config.origin.log();

    match run(&config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::debug!(error = ?e, "Transfer failed");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        },
    }
}

fn run(config: &TransferConfig) -> kintone_transfer::Result<()> {
    let client = cli::build_client(config, &PromptingCredentials)?;
    cli::run(config, Arc::new(client))
}
