//! Startup configuration read from the environment

use std::path::PathBuf;

use thiserror::Error;

const DEFAULT_DATA_DIR: &str = ".notedown";
const SESSION_FILE: &str = "session.json";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Unknown backend '{0}', expected 'supabase' or 'memory'")]
    UnknownBackend(String),

    #[error("Missing {0} (required by the supabase backend)")]
    Missing(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendConfig {
    Supabase {
        url: String,
        anon_key: String,
        auto_refresh: bool,
    },
    Memory {
        confirm_email: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub backend: BackendConfig,
    pub data_dir: PathBuf,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the config from `lookup`, which maps a variable name to its value
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let flag = |name: &str, default: bool| parse_flag(value(name).as_deref(), default);

        let data_dir = value("NOTEDOWN_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));

        let kind = value("NOTEDOWN_BACKEND")
            .unwrap_or_else(|| "supabase".into())
            .to_ascii_lowercase();
        let backend = match kind.as_str() {
            "supabase" => BackendConfig::Supabase {
                url: value("NOTEDOWN_SUPABASE_URL")
                    .or_else(|| value("SUPABASE_URL"))
                    .ok_or(ConfigError::Missing("NOTEDOWN_SUPABASE_URL"))?,
                anon_key: value("NOTEDOWN_SUPABASE_ANON_KEY")
                    .or_else(|| value("SUPABASE_ANON_KEY"))
                    .ok_or(ConfigError::Missing("NOTEDOWN_SUPABASE_ANON_KEY"))?,
                auto_refresh: flag("NOTEDOWN_AUTO_REFRESH", true),
            },
            "memory" => BackendConfig::Memory {
                confirm_email: flag("NOTEDOWN_MEMORY_CONFIRM_EMAIL", false),
            },
            _ => return Err(ConfigError::UnknownBackend(kind)),
        };

        Ok(Self { backend, data_dir })
    }

    pub fn session_path(&self) -> PathBuf {
        self.data_dir.join(SESSION_FILE)
    }
}

fn parse_flag(raw: Option<&str>, default: bool) -> bool {
    match raw {
        Some(raw) => match raw.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => default,
        },
        None => default,
    }
}
