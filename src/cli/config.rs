//! Config command implementation
//!
//! Utilities for validating and inspecting settings.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use crate::report::{self, ReportFormat};
use crate::settings::Settings;

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Validate the settings file and the allow-lists it points to
    Validate,
    /// Dump effective settings to stdout
    Dump {
        /// Output format: json or toml
        #[arg(short, long, default_value = "json")]
        format: String,
    },
    /// Show the settings file path
    Path,
    /// Write default settings to the settings file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Run the config command
pub async fn run(args: ConfigArgs, explicit: Option<PathBuf>) -> anyhow::Result<()> {
    let path = explicit.or_else(Settings::settings_path);
    match args.command {
        ConfigCommand::Validate => validate_config(path.as_deref()),
        ConfigCommand::Dump { format } => dump_config(path.as_deref(), &format),
        ConfigCommand::Path => show_path(path.as_deref()),
        ConfigCommand::Init { force } => init_config(path.as_deref(), force),
    }
}

/// Validate settings and the files they reference
fn validate_config(path: Option<&Path>) -> anyhow::Result<()> {
    let mut errors: Vec<String> = Vec::new();
    let mut warnings: Vec<String> = Vec::new();

    print!("Checking settings.json... ");
    let settings = match path {
        Some(path) if path.exists() => match Settings::load_from(path) {
            Ok(settings) => {
                println!("OK");
                settings
            }
            Err(e) => {
                println!("INVALID");
                errors.push(format!("{}: {}", path.display(), e));
                Settings::default()
            }
        },
        Some(_) => {
            println!("NOT FOUND (using defaults)");
            warnings.push("settings.json: File does not exist, using defaults".to_string());
            Settings::default()
        }
        None => {
            println!("ERROR");
            errors.push("settings.json: Could not determine config path".to_string());
            Settings::default()
        }
    };

    for (label, url) in [
        ("dashboard.base_url", &settings.dashboard.base_url),
        ("dashboard.sso_entry_url", &settings.dashboard.sso_entry_url),
        ("ledger.token_url", &settings.ledger.token_url),
        ("ledger.api_base", &settings.ledger.api_base),
    ] {
        if let Err(e) = url::Url::parse(url) {
            errors.push(format!("{}: invalid URL '{}': {}", label, url, e));
        }
    }

    if let Err(e) = settings.reports.format.parse::<ReportFormat>() {
        errors.push(format!("reports.format: {}", e));
    }

    for (label, list) in [
        ("reports.excluded_objects", &settings.reports.excluded_objects),
        ("reports.supplementary_points", &settings.reports.supplementary_points),
        ("reports.photo_objects", &settings.reports.photo_objects),
    ] {
        print!("Checking {}... ", list.display());
        if !list.exists() {
            println!("NOT FOUND (empty list)");
            warnings.push(format!("{}: {} does not exist", label, list.display()));
            continue;
        }
        match report::read_column(list, "") {
            Ok(values) => println!("OK ({} entries)", values.len()),
            Err(e) => {
                println!("INVALID");
                errors.push(format!("{}: {}", label, e));
            }
        }
    }

    println!();
    if errors.is_empty() && warnings.is_empty() {
        println!("Configuration is valid.");
    } else {
        if !warnings.is_empty() {
            println!("Warnings:");
            for w in &warnings {
                println!("  - {}", w);
            }
        }
        if !errors.is_empty() {
            println!("Errors:");
            for e in &errors {
                println!("  - {}", e);
            }
            anyhow::bail!("Configuration validation failed with {} error(s).", errors.len());
        }
    }

    Ok(())
}

fn render(settings: &Settings, format: &str) -> anyhow::Result<String> {
    match format.to_lowercase().as_str() {
        "json" => Ok(serde_json::to_string_pretty(settings)?),
        "toml" => Ok(toml::to_string_pretty(settings)?),
        _ => anyhow::bail!("Unknown format '{}'. Supported formats: json, toml", format),
    }
}

/// Dump configuration to stdout
fn dump_config(path: Option<&Path>, format: &str) -> anyhow::Result<()> {
    let settings = match path {
        Some(path) if path.exists() => Settings::load_from(path)?,
        _ => Settings::default(),
    };
    println!("{}", render(&settings, format)?);
    Ok(())
}

/// Show the settings file path
fn show_path(path: Option<&Path>) -> anyhow::Result<()> {
    match path {
        Some(path) => {
            let exists = if path.exists() { "" } else { " (not found)" };
            println!("Settings: {}{}", path.display(), exists);
        }
        None => println!("Settings: (could not determine path)"),
    }
    Ok(())
}

/// Write defaults, refusing to clobber an existing file unless forced
fn init_config(path: Option<&Path>, force: bool) -> anyhow::Result<()> {
    let Some(path) = path else {
        anyhow::bail!("Could not determine config path");
    };
    if path.exists() && !force {
        anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
    }
    Settings::default().save(path)?;
    println!("Wrote default settings to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_formats() {
        let settings = Settings::default();
        assert!(render(&settings, "json").unwrap().contains("\"dashboard\""));
        assert!(render(&settings, "TOML").unwrap().contains("[dashboard]"));
        assert!(render(&settings, "yaml").is_err());
    }

    #[test]
    fn test_init_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");

        init_config(Some(&path), false).unwrap();
        assert!(Settings::load_from(&path).is_ok());
        assert!(init_config(Some(&path), false).is_err());
        assert!(init_config(Some(&path), true).is_ok());
    }

    #[test]
    fn test_validate_reports_bad_settings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(validate_config(Some(&path)).is_err());

        let mut settings = Settings::default();
        settings.reports.format = "xlsx".to_string();
        settings.save(&path).unwrap();
        assert!(validate_config(Some(&path)).is_err());
    }
}
