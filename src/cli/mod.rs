//! CLI module - command-line interface
//!
//! - `stroi-monitor control-points` - control-point reconciliation report
//! - `stroi-monitor photos` - stalled-camera report
//! - `stroi-monitor videos` - video-link presence report
//! - `stroi-monitor plan-fact` - stage progress report
//! - `stroi-monitor config` - inspect and validate settings

pub mod config;
pub mod control_points;
pub mod photos;
pub mod plan_fact;
pub mod videos;

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;

use crate::backends::{AuthSession, CatalogClient};
use crate::core::{AuthError, Credential};
use crate::report::{self, ReportFormat};
use crate::settings::Settings;

/// Exit codes
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const UNEXPECTED_FAILURE: i32 = 1;
    pub const AUTH_FAILURE: i32 = 2;
    pub const CONFIG_ERROR: i32 = 3;
}

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("GIT_COMMIT"),
    ", built ",
    env!("BUILD_DATE"),
    ")"
);

/// Stroi Monitor - construction-project monitoring reports
///
/// Pulls object, control-point and photo data from the municipal construction
/// dashboard, cross-checks schedules against the work ledger and writes one
/// flat report file per run.
#[derive(Parser, Debug)]
#[command(name = "stroi-monitor")]
#[command(author, version, long_version = LONG_VERSION, about, long_about = None)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit machine-readable logs (JSON) to stderr
    #[arg(long = "json-output", global = true)]
    pub json_output: bool,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(long = "log-level", global = true, value_parser = ["trace", "verbose", "debug", "info", "warning", "warn", "error", "critical"])]
    pub log_level: Option<String>,

    /// Settings file to use instead of the default location
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Reconcile dashboard control points against the work ledger
    ControlPoints(control_points::ControlPointsArgs),

    /// Check allow-listed objects for stalled cameras
    Photos(photos::PhotosArgs),

    /// Report which objects have video links
    Videos(videos::VideosArgs),

    /// Flatten stage fact/plan progress per object
    PlanFact(plan_fact::PlanFactArgs),

    /// Validate, dump or locate the settings file
    Config(config::ConfigArgs),
}

/// Dashboard single sign-on credentials
#[derive(Args, Debug, Clone, Default)]
pub struct SsoArgs {
    /// SSO login
    #[arg(long = "sso-login", env = "STROI_SSO_LOGIN")]
    pub sso_login: Option<String>,

    /// SSO password
    #[arg(long = "sso-password", env = "STROI_SSO_PASSWORD", hide_env_values = true)]
    pub sso_password: Option<String>,
}

impl SsoArgs {
    pub fn credential(&self) -> Result<Credential, AuthError> {
        credential_from(&self.sso_login, &self.sso_password, "dashboard SSO")
    }
}

/// Work-ledger credentials
#[derive(Args, Debug, Clone, Default)]
pub struct LedgerArgs {
    /// Work ledger login
    #[arg(long = "ledger-login", env = "STROI_LEDGER_LOGIN")]
    pub ledger_login: Option<String>,

    /// Work ledger password
    #[arg(long = "ledger-password", env = "STROI_LEDGER_PASSWORD", hide_env_values = true)]
    pub ledger_password: Option<String>,
}

impl LedgerArgs {
    pub fn credential(&self) -> Result<Credential, AuthError> {
        credential_from(&self.ledger_login, &self.ledger_password, "work ledger")
    }
}

fn credential_from(
    login: &Option<String>,
    secret: &Option<String>,
    what: &'static str,
) -> Result<Credential, AuthError> {
    match (login, secret) {
        (Some(login), Some(secret)) => {
            let credential = Credential::new(login.trim(), secret.as_str());
            if credential.is_complete() {
                Ok(credential)
            } else {
                Err(AuthError::MissingCredentials(what))
            }
        }
        _ => Err(AuthError::MissingCredentials(what)),
    }
}

/// Where and how a report is written
#[derive(Args, Debug, Clone, Default)]
pub struct OutputArgs {
    /// Directory for the report file (default from settings)
    #[arg(short, long = "output-dir")]
    pub output_dir: Option<PathBuf>,

    /// Report format: csv or json (default from settings)
    #[arg(short, long, value_parser = ["csv", "json"])]
    pub format: Option<String>,
}

impl OutputArgs {
    /// Write `rows` as `<report>_<date>` and return the file path
    pub fn write<T: Serialize>(
        &self,
        settings: &Settings,
        report_name: &str,
        date: NaiveDate,
        rows: &[T],
    ) -> anyhow::Result<PathBuf> {
        let format: ReportFormat = self
            .format
            .as_deref()
            .unwrap_or(&settings.reports.format)
            .parse()?;
        let dir = self
            .output_dir
            .clone()
            .unwrap_or_else(|| settings.reports.output_dir.clone());

        let path = report::report_path(&dir, report_name, date, format);
        report::write_rows(&path, rows, format)
            .with_context(|| format!("writing {} report", report_name))?;
        Ok(path)
    }
}

/// Build a dashboard client and run the SSO flow
pub(crate) async fn open_catalog(
    settings: &Settings,
    sso: &SsoArgs,
) -> anyhow::Result<CatalogClient> {
    let credential = sso.credential()?;
    let session = AuthSession::new(settings.dashboard.clone(), settings.http.timeout())?;
    let mut client = CatalogClient::new(
        session,
        settings.retry.policy(),
        settings.http.photo_timeout(),
    );
    let auth = client.authorize(&credential).await?;
    tracing::debug!(
        csrf = auth.csrf_present,
        "Dashboard token received ({} chars)",
        auth.token.len()
    );
    println!("Dashboard SSO authorization passed");
    Ok(client)
}

/// Local calendar date used for overdue and yesterday checks
pub(crate) fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_control_points() {
        let cli = Cli::try_parse_from([
            "stroi-monitor",
            "--verbose",
            "control-points",
            "--sso-login",
            "user",
            "--sso-password",
            "pw",
            "--format",
            "json",
        ])
        .unwrap();

        assert!(cli.verbose);
        match cli.command {
            Commands::ControlPoints(args) => {
                assert_eq!(args.sso.sso_login.as_deref(), Some("user"));
                assert_eq!(args.output.format.as_deref(), Some("json"));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_cli_rejects_unknown_format() {
        let parsed = Cli::try_parse_from(["stroi-monitor", "videos", "--format", "xlsx"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_credentials_require_both_parts() {
        let sso = SsoArgs {
            sso_login: Some("user".to_string()),
            sso_password: None,
        };
        assert!(matches!(sso.credential(), Err(AuthError::MissingCredentials(_))));

        let blank = LedgerArgs {
            ledger_login: Some("  ".to_string()),
            ledger_password: Some("pw".to_string()),
        };
        assert!(blank.credential().is_err());

        let ok = LedgerArgs {
            ledger_login: Some(" planner ".to_string()),
            ledger_password: Some("pw".to_string()),
        };
        assert_eq!(ok.credential().unwrap().login(), "planner");
    }

    #[test]
    fn test_output_args_write_uses_settings_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = Settings::default();
        settings.reports.output_dir = dir.path().to_path_buf();
        settings.reports.format = "json".to_string();

        #[derive(Serialize)]
        struct Row {
            id: i64,
        }

        let date = NaiveDate::from_ymd_opt(2025, 1, 2).unwrap();
        let path = OutputArgs::default()
            .write(&settings, "videos", date, &[Row { id: 1 }])
            .unwrap();
        assert_eq!(path, dir.path().join("videos_2025-01-02.json"));
        assert!(path.exists());
    }
}
