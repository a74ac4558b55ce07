use crate::error::EtlError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub portal: Portal,
    #[serde(default)]
    pub sso: Sso,
    #[serde(default)]
    pub scrape: Scrape,
    #[serde(default)]
    pub transform: Transform,
    #[serde(default)]
    pub retry: Retry,
    #[serde(default)]
    pub database: Database,
    #[serde(default)]
    pub output: Output,
    #[serde(default)]
    pub logging: Logging,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config: {}", path.display()))?;
        let cfg: Config = toml::from_str(&raw).with_context(|| "parsing TOML")?;
        Ok(cfg)
    }

    /// Reads the SSO username/password from the environment variables named in `[sso]`.
    pub fn sso_credentials(&self) -> Result<(String, String), EtlError> {
        self.sso_credentials_from(|key| std::env::var(key).ok())
    }

    pub fn sso_credentials_from<F>(&self, lookup: F) -> Result<(String, String), EtlError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let username = lookup(&self.sso.username_env).filter(|v| !v.trim().is_empty());
        let password = lookup(&self.sso.password_env).filter(|v| !v.is_empty());
        match (username, password) {
            (Some(u), Some(p)) => Ok((u, p)),
            _ => Err(EtlError::Configuration(format!(
                "{} and {} must be set (environment or .env)",
                self.sso.username_env, self.sso.password_env
            ))),
        }
    }

    /// Database path, with the `[database].path_env` variable taking precedence.
    pub fn database_path(&self) -> String {
        self.database_path_from(|key| std::env::var(key).ok())
    }

    pub fn database_path_from<F>(&self, lookup: F) -> String
    where
        F: Fn(&str) -> Option<String>,
    {
        if !self.database.path_env.is_empty() {
            if let Some(p) = lookup(&self.database.path_env).filter(|v| !v.trim().is_empty()) {
                return p;
            }
        }
        self.database.path.clone()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Portal {
    pub base_url: String,
    pub table_id: String,
    pub timeout_seconds: u64,
    pub default_region: String,
    pub user_agent: String,
}
impl Default for Portal {
    fn default() -> Self {
        Self {
            base_url: "https://webmonitoring.bps.go.id/sen/progress".into(),
            table_id: "tabel-progress".into(),
            timeout_seconds: 30,
            default_region: "65".into(),
            user_agent: concat!("susenas-monitor/", env!("CARGO_PKG_VERSION")).into(),
        }
    }
}
impl Portal {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sso {
    pub entry_url: String,
    pub username_env: String,
    pub password_env: String,
}
impl Default for Sso {
    fn default() -> Self {
        Self {
            entry_url: "https://webmonitoring.bps.go.id/sen".into(),
            username_env: "SSO_USERNAME".into(),
            password_env: "SSO_PASSWORD".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scrape {
    pub normalize_unicode: bool,
}
impl Default for Scrape {
    fn default() -> Self {
        Self {
            normalize_unicode: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transform {
    pub region_column: usize,
    pub percent_column: usize,
    pub region_marker: String,
    pub error_stage_marker: String,
}
impl Default for Transform {
    fn default() -> Self {
        Self {
            region_column: 0,
            percent_column: 5,
            region_marker: "(65".into(),
            error_stage_marker: "Pengolahan".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Retry {
    pub max_retries: u32,
    pub delay_seconds: u64,
}
impl Default for Retry {
    fn default() -> Self {
        Self {
            max_retries: 3,
            delay_seconds: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Database {
    pub path: String,
    pub path_env: String,
}
impl Default for Database {
    fn default() -> Self {
        Self {
            path: "susenas-monitor.db".into(),
            path_env: "DATABASE_PATH".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Output {
    pub write_report_json: bool,
    pub report_dir: String,
    pub print_summary: bool,
}
impl Default for Output {
    fn default() -> Self {
        Self {
            write_report_json: false,
            report_dir: "out".into(),
            print_summary: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Logging {
    pub level: String,
    pub json: bool,
    pub write_to_file: bool,
    pub file_path: String,
}
impl Default for Logging {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
            write_to_file: false,
            file_path: "logs/susenas-monitor.log".into(),
        }
    }
}
