//! Report files and operator allow-lists
//!
//! - Reports are written once per run as CSV (default) or pretty JSON,
//!   named `<report>_<YYYY-MM-DD>.<ext>`
//! - Allow-lists are small CSV files with a header row; a missing file is an
//!   empty list, not an error

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

use crate::core::dates::format_iso;
use crate::core::ledger_key;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error on {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("JSON error on {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("unknown report format '{0}' (expected csv or json)")]
    UnknownFormat(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReportFormat {
    #[default]
    Csv,
    Json,
}

impl ReportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ReportFormat::Csv => "csv",
            ReportFormat::Json => "json",
        }
    }
}

impl FromStr for ReportFormat {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "csv" => Ok(ReportFormat::Csv),
            "json" => Ok(ReportFormat::Json),
            other => Err(ReportError::UnknownFormat(other.to_string())),
        }
    }
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// `<dir>/<report>_<date>.<ext>`
pub fn report_path(dir: &Path, report: &str, date: NaiveDate, format: ReportFormat) -> PathBuf {
    dir.join(format!("{}_{}.{}", report, format_iso(date), format.extension()))
}

/// Write all rows to `path`, creating parent directories as needed
pub fn write_rows<T: Serialize>(
    path: &Path,
    rows: &[T],
    format: ReportFormat,
) -> Result<(), ReportError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| ReportError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    match format {
        ReportFormat::Csv => {
            let csv_err = |source| ReportError::Csv {
                path: path.to_path_buf(),
                source,
            };
            let mut writer = csv::Writer::from_path(path).map_err(csv_err)?;
            for row in rows {
                writer.serialize(row).map_err(csv_err)?;
            }
            writer.flush().map_err(|source| ReportError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        }
        ReportFormat::Json => {
            let file = File::create(path).map_err(|source| ReportError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            serde_json::to_writer_pretty(BufWriter::new(file), rows).map_err(|source| {
                ReportError::Json {
                    path: path.to_path_buf(),
                    source,
                }
            })?;
        }
    }

    tracing::info!("Wrote {} rows to {}", rows.len(), path.display());
    Ok(())
}

/// Non-empty trimmed values of `column`; the first column when the header
/// has no such name
pub fn read_column(path: &Path, column: &str) -> Result<Vec<String>, ReportError> {
    if !path.exists() {
        tracing::warn!("Allow-list {} not found; using an empty list", path.display());
        return Ok(Vec::new());
    }

    let csv_err = |source| ReportError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(csv_err)?;

    let index = reader
        .headers()
        .map_err(csv_err)?
        .iter()
        .position(|h| h.eq_ignore_ascii_case(column))
        .unwrap_or(0);

    let mut values = Vec::new();
    for record in reader.records() {
        let record = record.map_err(csv_err)?;
        if let Some(value) = record.get(index).filter(|v| !v.is_empty()) {
            values.push(value.to_string());
        }
    }

    tracing::debug!("Read {} entries from {}", values.len(), path.display());
    Ok(values)
}

/// Object ids from the `id` column. Spreadsheet exports may render ids as
/// `1257.0`; those are accepted, anything else non-integral is skipped.
pub fn read_id_list(path: &Path) -> Result<HashSet<i64>, ReportError> {
    let ids = read_column(path, "id")?
        .into_iter()
        .filter_map(|raw| match parse_object_id(&raw) {
            Some(id) => Some(id),
            None => {
                tracing::warn!("Ignoring non-numeric id '{}' in {}", raw, path.display());
                None
            }
        })
        .collect();
    Ok(ids)
}

/// Supplementary control-point names from the `points` column, normalized
/// for ledger matching, duplicates dropped
pub fn read_name_list(path: &Path) -> Result<Vec<String>, ReportError> {
    let mut seen = HashSet::new();
    let names = read_column(path, "points")?
        .iter()
        .filter_map(|raw| ledger_key(raw))
        .filter(|name| seen.insert(name.clone()))
        .collect();
    Ok(names)
}

fn parse_object_id(raw: &str) -> Option<i64> {
    if let Ok(id) = raw.parse::<i64>() {
        return Some(id);
    }
    let value = raw.parse::<f64>().ok()?;
    (value.fract() == 0.0 && value.is_finite()).then_some(value as i64)
}
