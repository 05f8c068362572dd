use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::report::format::DEFAULT_REPORT_URL_TEMPLATE;
use crate::platform::{NativePlatform, Platform};

pub const DEFAULT_SITE_URL: &str = "https://iceout.org/en/";
pub const DEFAULT_FETCH_LIMIT: usize = 30;
pub const DEFAULT_FIRST_RUN_LIMIT: usize = 3;
pub const STATE_FILE_NAME: &str = "last_seen.json";
pub const CONFIG_FILE_NAME: &str = "config.toml";
const DISPATCH_SLACK: Duration = Duration::from_secs(5);

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{key} is required (set the {env} environment variable or `{key}` in config.toml)")]
    Missing { key: &'static str, env: &'static str },
    #[error("invalid value for {key}: {value:?} ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: &'static str,
    },
    #[error("failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Optional TOML layer. Every key may be omitted.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileConfig {
    telegram_bot_token: Option<String>,
    telegram_chat_id: Option<String>,
    site_url: Option<String>,
    report_url_template: Option<String>,
    state_file: Option<PathBuf>,
    fetch_limit: Option<usize>,
    first_run_limit: Option<usize>,
    dispatch_delay_ms: Option<u64>,
    fetch_timeout_secs: Option<u64>,
    dispatch_timeout_secs: Option<u64>,
    media_timeout_secs: Option<u64>,
    log_file: Option<PathBuf>,
}

/// Flags parsed from the command line; they win over every other layer.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CliOverrides {
    pub config_path: Option<PathBuf>,
    pub state_file: Option<PathBuf>,
    pub fetch_limit: Option<String>,
    pub first_run_limit: Option<String>,
    pub log_file: Option<PathBuf>,
    pub verbose: bool,
    pub no_lock: bool,
    pub dry_run: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelegramCredentials {
    pub bot_token: String,
    pub chat_id: String,
}

/// Resolved configuration, built once at start and passed by reference.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    telegram_bot_token: Option<String>,
    telegram_chat_id: Option<String>,
    pub site_url: String,
    pub report_url_template: String,
    pub state_file: PathBuf,
    pub fetch_limit: usize,
    pub first_run_limit: usize,
    pub dispatch_delay: Duration,
    pub fetch_timeout: Duration,
    pub dispatch_timeout: Duration,
    pub media_timeout: Duration,
    pub log_file: Option<PathBuf>,
    pub verbose: bool,
    pub use_lock: bool,
    pub dry_run: bool,
}

impl RelayConfig {
    /// Loads from the process environment and the platform data directory.
    pub fn load(overrides: &CliOverrides) -> Result<Self, ConfigError> {
        Self::from_sources(overrides, &NativePlatform::data_dir(), |key| {
            std::env::var(key).ok()
        })
    }

    /// Layers defaults, then the TOML file, then `env`, then `overrides`.
    /// Credentials are not validated here; see [`RelayConfig::telegram`].
    pub fn from_sources<F>(
        overrides: &CliOverrides,
        data_dir: &Path,
        lookup: F,
    ) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let file = match &overrides.config_path {
            Some(path) => read_file_config(path)?,
            None => {
                let default_path = data_dir.join(CONFIG_FILE_NAME);
                if default_path.exists() {
                    read_file_config(&default_path)?
                } else {
                    FileConfig::default()
                }
            }
        };

        let fetch_limit = match overrides
            .fetch_limit
            .clone()
            .or_else(|| env("ICEOUT_FETCH_LIMIT"))
        {
            Some(raw) => parse_number("fetch_limit", &raw)?,
            None => file.fetch_limit.unwrap_or(DEFAULT_FETCH_LIMIT),
        };
        if fetch_limit == 0 {
            return Err(ConfigError::Invalid {
                key: "fetch_limit",
                value: "0".to_string(),
                reason: "must be greater than zero",
            });
        }

        let first_run_limit = match overrides
            .first_run_limit
            .clone()
            .or_else(|| env("ICEOUT_FIRST_RUN_LIMIT"))
        {
            Some(raw) => parse_number("first_run_limit", &raw)?,
            None => file.first_run_limit.unwrap_or(DEFAULT_FIRST_RUN_LIMIT),
        };

        let state_file = overrides
            .state_file
            .clone()
            .or_else(|| env("ICEOUT_STATE_FILE").map(PathBuf::from))
            .or(file.state_file)
            .unwrap_or_else(|| data_dir.join(STATE_FILE_NAME));

        let site_url = env("ICEOUT_SITE_URL")
            .or(file.site_url)
            .unwrap_or_else(|| DEFAULT_SITE_URL.to_string());
        if url::Url::parse(&site_url).is_err() {
            return Err(ConfigError::Invalid {
                key: "site_url",
                value: site_url,
                reason: "not an absolute URL",
            });
        }

        Ok(Self {
            telegram_bot_token: env("TELEGRAM_BOT_TOKEN").or(file.telegram_bot_token),
            telegram_chat_id: env("TELEGRAM_CHAT_ID").or(file.telegram_chat_id),
            site_url,
            report_url_template: env("ICEOUT_REPORT_URL")
                .or(file.report_url_template)
                .unwrap_or_else(|| DEFAULT_REPORT_URL_TEMPLATE.to_string()),
            state_file,
            fetch_limit,
            first_run_limit,
            dispatch_delay: Duration::from_millis(file.dispatch_delay_ms.unwrap_or(1500)),
            fetch_timeout: Duration::from_secs(file.fetch_timeout_secs.unwrap_or(45)),
            dispatch_timeout: Duration::from_secs(file.dispatch_timeout_secs.unwrap_or(30)),
            media_timeout: Duration::from_secs(file.media_timeout_secs.unwrap_or(30)),
            log_file: overrides
                .log_file
                .clone()
                .or_else(|| env("ICEOUT_LOG_FILE").map(PathBuf::from))
                .or(file.log_file),
            verbose: overrides.verbose,
            use_lock: !overrides.no_lock,
            dry_run: overrides.dry_run,
        })
    }

    /// The bot credentials, required before any cycle runs.
    pub fn telegram(&self) -> Result<TelegramCredentials, ConfigError> {
        let bot_token = self
            .telegram_bot_token
            .clone()
            .filter(|t| !t.trim().is_empty())
            .ok_or(ConfigError::Missing {
                key: "telegram_bot_token",
                env: "TELEGRAM_BOT_TOKEN",
            })?;
        let chat_id = self
            .telegram_chat_id
            .clone()
            .filter(|c| !c.trim().is_empty())
            .ok_or(ConfigError::Missing {
                key: "telegram_chat_id",
                env: "TELEGRAM_CHAT_ID",
            })?;
        Ok(TelegramCredentials {
            bot_token: bot_token.trim().to_string(),
            chat_id: chat_id.trim().to_string(),
        })
    }

    /// Upper bound for one whole dispatch: the photo download, the HTML send
    /// and a plain-text retry, each already bounded on its own.
    pub fn dispatch_budget(&self) -> Duration {
        self.media_timeout + self.dispatch_timeout * 2 + DISPATCH_SLACK
    }

    pub fn lock_path(&self) -> PathBuf {
        let mut name = self
            .state_file
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| STATE_FILE_NAME.into());
        name.push(".lock");
        self.state_file.with_file_name(name)
    }

    /// Footer label for messages: the site's host name.
    pub fn source_label(&self) -> String {
        url::Url::parse(&self.site_url)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.trim_start_matches("www.").to_string()))
            .unwrap_or_else(|| self.site_url.clone())
    }
}

fn read_file_config(path: &Path) -> Result<FileConfig, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn parse_number(key: &'static str, raw: &str) -> Result<usize, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::Invalid {
        key,
        value: raw.to_string(),
        reason: "expected a non-negative integer",
    })
}
