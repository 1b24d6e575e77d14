//! Settings management for Stroi Monitor
//!
//! Handles persistent configuration including:
//! - Dashboard and identity-provider endpoints
//! - Work-ledger endpoints
//! - Throttle intervals and retry policy
//! - Report output and allow-list locations

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::{RetryPolicy, Throttle};

const APP_DIR: &str = "StroiMonitor";

/// Application settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub dashboard: DashboardEndpoints,
    pub ledger: LedgerEndpoints,
    pub throttle: ThrottleSettings,
    pub retry: RetrySettings,
    pub http: HttpSettings,
    pub reports: ReportSettings,
}

/// Dashboard backend and the identity provider in front of it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardEndpoints {
    /// Origin that relative API paths resolve against; the SSO flow must
    /// land on this host
    pub base_url: String,
    /// Entry page of the password login, carrying the OAuth parameters
    pub sso_entry_url: String,
    /// "Multiple accounts" request, sent only for its cookies
    pub sso_accounts_url: String,
    /// Password form target
    pub sso_password_url: String,
}

impl Default for DashboardEndpoints {
    fn default() -> Self {
        Self {
            base_url: "https://dashboard-stroi.mos.ru".to_string(),
            sso_entry_url: "https://sudir.mos.ru/blitz/login/methods/password?bo=%2Fblitz%2Foauth%2Fae%3Fclient_id%3Ddashboard-stroi.mos.ru%26redirect_uri%3Dhttps%253A%252F%252Fdashboard-stroi.mos.ru%252Foauth%252Flogin-internal%26response_type%3Dcode%26scope%3Dopenid%2Bprofile%2Bemail%2Bemployee%2Bgroups%26state%3DENZPq1I93b184s6FxZzvh4yOwKZN5eyhjDBDJsfg%26access_type%3Doffline".to_string(),
            sso_accounts_url: "https://sudir.mos.ru/blitz/login/mus".to_string(),
            sso_password_url: "https://sudir.mos.ru/blitz/login/methods/password".to_string(),
        }
    }
}

/// Secondary scheduling backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerEndpoints {
    pub token_url: String,
    pub client_id: String,
    /// Works are listed at `<api_base>/<reference id>/all`
    pub api_base: String,
    /// The ledger host serves a certificate chain most trust stores reject,
    /// so verification is off unless a settings file turns it back on
    pub accept_invalid_certs: bool,
}

impl Default for LedgerEndpoints {
    fn default() -> Self {
        Self {
            token_url: "https://suid.mos.ru/auth/realms/SpringBoot/protocol/openid-connect/token"
                .to_string(),
            client_id: "ExonReactApp".to_string(),
            api_base: "https://suid.mos.ru/api/isr-new-service/common".to_string(),
            accept_invalid_certs: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThrottleSettings {
    /// Gap between objects in the dashboard pass
    pub object_delay_ms: u64,
    /// Gap between objects in work-ledger passes
    pub ledger_delay_ms: u64,
    /// Gap between objects in the photo check
    pub photo_delay_ms: u64,
    /// Gap between objects in the video and plan-fact reports
    pub snapshot_delay_ms: u64,
}

impl Default for ThrottleSettings {
    fn default() -> Self {
        Self {
            object_delay_ms: 700,
            ledger_delay_ms: 500,
            photo_delay_ms: 500,
            snapshot_delay_ms: 500,
        }
    }
}

impl ThrottleSettings {
    pub fn objects(&self) -> Throttle {
        Throttle::from_millis(self.object_delay_ms)
    }

    pub fn ledger(&self) -> Throttle {
        Throttle::from_millis(self.ledger_delay_ms)
    }

    pub fn photos(&self) -> Throttle {
        Throttle::from_millis(self.photo_delay_ms)
    }

    pub fn snapshots(&self) -> Throttle {
        Throttle::from_millis(self.snapshot_delay_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_retries: u32,
    pub backoff_step_secs: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_retries: policy.max_retries,
            backoff_step_secs: policy.step.as_secs(),
        }
    }
}

impl RetrySettings {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, Duration::from_secs(self.backoff_step_secs))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    pub timeout_secs: u64,
    pub ledger_timeout_secs: u64,
    pub photo_timeout_secs: u64,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 60,
            ledger_timeout_secs: 10,
            photo_timeout_secs: 5,
        }
    }
}

impl HttpSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn ledger_timeout(&self) -> Duration {
        Duration::from_secs(self.ledger_timeout_secs)
    }

    pub fn photo_timeout(&self) -> Duration {
        Duration::from_secs(self.photo_timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportSettings {
    pub output_dir: PathBuf,
    /// `csv` or `json`
    pub format: String,
    /// Catalog status filter (`oksStatusArrayName`), e.g. "СМР"
    pub catalog_status: Option<String>,
    /// Object ids marked `exclude_from_check`
    pub excluded_objects: PathBuf,
    /// Extra control-point names checked against the ledger
    pub supplementary_points: PathBuf,
    /// Object ids that get the photo check
    pub photo_objects: PathBuf,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            format: "csv".to_string(),
            catalog_status: None,
            excluded_objects: PathBuf::from("excluded_objects.csv"),
            supplementary_points: PathBuf::from("control_points.csv"),
            photo_objects: PathBuf::from("yesterday_photo_objects.csv"),
        }
    }
}

impl Settings {
    /// Get the settings file path
    pub fn settings_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join(APP_DIR).join("settings.json"))
    }

    /// Load settings from the default location, falling back to defaults
    pub fn load() -> Self {
        Self::settings_path()
            .filter(|path| path.exists())
            .and_then(|path| match Self::load_from(&path) {
                Ok(settings) => Some(settings),
                Err(e) => {
                    tracing::warn!("Ignoring unreadable settings at {}: {}", path.display(), e);
                    None
                }
            })
            .unwrap_or_default()
    }

    /// Load settings from an explicit file; errors are reported, not masked
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let settings = serde_json::from_str(&content)?;
        Ok(settings)
    }

    /// Resolve `--config` if given, otherwise the default location
    pub fn resolve(explicit: Option<&Path>) -> anyhow::Result<Self> {
        match explicit {
            Some(path) => Self::load_from(path),
            None => Ok(Self::load()),
        }
    }

    /// Save settings to disk
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;

        Ok(())
    }
}
