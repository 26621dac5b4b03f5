//! Process configuration.
//!
//! Settings come from environment variables (the binary loads a `.env` file
//! first when one exists). Everything is validated once at startup; a bad or
//! missing value is a [`ConfigError`] and the process exits.
//!
//! | Variable | Default |
//! |---|---|
//! | `CONSUL_HTTP_ADDR` | required |
//! | `CONSUL_HTTP_TOKEN` | none |
//! | `CONSUL_HTTP_SSL` | `false` |
//! | `CONSUL_KV_PREFIX` | `""` (every key) |
//! | `TLS_SKIP_VERIFY` | `false` |
//! | `POLL_INTERVAL_MINUTES` | required |
//! | `GIT_ENABLED` | required |
//! | `GIT_REPO_PATH` | required |
//! | `STORAGE_FILENAME` | `consul_kv_diff.json` |
//! | `GIT_REMOTE_URL`, `GIT_TOKEN` | required when git is enabled |
//! | `GIT_AUTHOR_NAME` | `git` |
//! | `GIT_AUTHOR_EMAIL` | `consuldiff@consuldiff.com` |
//! | `GIT_COMMIT_MESSAGE` | `Consul KV Diff Update` |

use crate::ConfigError;
use consuldiff_consul::{parse_address, ConsulConfig};
use consuldiff_git::{GitSettings, DEFAULT_AUTHOR_EMAIL, DEFAULT_AUTHOR_NAME, DEFAULT_COMMIT_MESSAGE};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

/// Default name of the raw snapshot file.
pub const DEFAULT_STORAGE_FILENAME: &str = "consul_kv_diff.json";

/// Suffix of the base64 sibling file.
pub const BASE64_SUFFIX: &str = ".b64";

/// Immutable settings for one watcher process.
#[derive(Debug, Clone)]
pub struct Config {
    /// Consul connection.
    pub consul: ConsulConfig,
    /// Key prefix to snapshot. Empty means every key.
    pub key_prefix: String,
    /// Time between the end of one cycle and the start of the next.
    pub poll_interval: Duration,
    /// Directory holding the snapshot files (the git working tree when publishing).
    pub storage_dir: PathBuf,
    /// File name of the raw snapshot.
    pub storage_filename: String,
    /// Publishing settings; `None` disables publishing.
    pub git: Option<GitSettings>,
}

impl Config {
    /// Create a configuration with defaults for everything but the essentials.
    pub fn new(consul: ConsulConfig, storage_dir: impl Into<PathBuf>) -> Self {
        Self {
            consul,
            key_prefix: String::new(),
            poll_interval: Duration::from_secs(60),
            storage_dir: storage_dir.into(),
            storage_filename: DEFAULT_STORAGE_FILENAME.to_string(),
            git: None,
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_storage_filename(mut self, name: impl Into<String>) -> Self {
        self.storage_filename = name.into();
        self
    }

    pub fn with_git(mut self, git: GitSettings) -> Self {
        self.git = Some(git);
        self
    }

    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.is_empty());

        let use_ssl = parse_bool_var(&get, "CONSUL_HTTP_SSL", false)?;
        let tls_skip_verify = parse_bool_var(&get, "TLS_SKIP_VERIFY", false)?;
        let address = get("CONSUL_HTTP_ADDR").ok_or(ConfigError::Missing("CONSUL_HTTP_ADDR"))?;
        let address = parse_address(&address, use_ssl)
            .map_err(|e| ConfigError::invalid("CONSUL_HTTP_ADDR", e.to_string()))?;
        let mut consul = ConsulConfig::new(address).with_tls_skip_verify(tls_skip_verify);
        if let Some(token) = get("CONSUL_HTTP_TOKEN") {
            consul = consul.with_token(token);
        }

        let key_prefix = get("CONSUL_KV_PREFIX").unwrap_or_default();
        let poll_interval = parse_interval(get("POLL_INTERVAL_MINUTES"))?;

        let git_enabled = match get("GIT_ENABLED") {
            Some(value) => parse_bool("GIT_ENABLED", &value)?,
            None => return Err(ConfigError::Missing("GIT_ENABLED")),
        };

        let repo_path = get("GIT_REPO_PATH").ok_or(ConfigError::Missing("GIT_REPO_PATH"))?;
        let storage_dir = PathBuf::from(trim_trailing_slash(&repo_path));
        if !storage_dir.is_dir() {
            return Err(ConfigError::invalid(
                "GIT_REPO_PATH",
                format!("{} is not an existing directory", storage_dir.display()),
            ));
        }

        let storage_filename =
            get("STORAGE_FILENAME").unwrap_or_else(|| DEFAULT_STORAGE_FILENAME.to_string());
        if storage_filename.contains('/')
            || storage_filename.contains('\\')
            || storage_filename == "."
            || storage_filename == ".."
        {
            return Err(ConfigError::invalid(
                "STORAGE_FILENAME",
                "must be a plain file name inside GIT_REPO_PATH",
            ));
        }

        let git = if git_enabled {
            let remote = get("GIT_REMOTE_URL").ok_or(ConfigError::Missing("GIT_REMOTE_URL"))?;
            let token = get("GIT_TOKEN").ok_or(ConfigError::Missing("GIT_TOKEN"))?;
            Some(
                GitSettings::new(&storage_dir)
                    .with_remote(remote)
                    .with_token(token)
                    .with_author(
                        get("GIT_AUTHOR_NAME").unwrap_or_else(|| DEFAULT_AUTHOR_NAME.to_string()),
                        get("GIT_AUTHOR_EMAIL").unwrap_or_else(|| DEFAULT_AUTHOR_EMAIL.to_string()),
                    )
                    .with_message(
                        get("GIT_COMMIT_MESSAGE")
                            .unwrap_or_else(|| DEFAULT_COMMIT_MESSAGE.to_string()),
                    ),
            )
        } else {
            None
        };

        Ok(Self {
            consul,
            key_prefix,
            poll_interval,
            storage_dir,
            storage_filename,
            git,
        })
    }

    /// Store location of the raw snapshot; also where "previous" is read from.
    pub fn raw_location(&self) -> &str {
        &self.storage_filename
    }

    /// Store location of the base64 snapshot.
    pub fn base64_location(&self) -> String {
        format!("{}{BASE64_SUFFIX}", self.storage_filename)
    }

    pub fn publish_enabled(&self) -> bool {
        self.git.is_some()
    }

    /// Log the effective configuration. Secrets are redacted.
    pub fn log_summary(&self) {
        info!(
            consul = %self.consul.address,
            consul_token = self.consul.token.is_some(),
            tls_skip_verify = self.consul.tls_skip_verify,
            prefix = %self.key_prefix,
            poll_interval_secs = self.poll_interval.as_secs(),
            storage_dir = %self.storage_dir.display(),
            storage_filename = %self.storage_filename,
            git_enabled = self.publish_enabled(),
            "Initialized configuration"
        );
        if let Some(git) = &self.git {
            info!(
                remote = git.remote_url.as_deref().unwrap_or(""),
                author = %git.author_name,
                email = %git.author_email,
                message = %git.message,
                token = "[REDACTED]",
                "Git publishing enabled"
            );
        }
    }
}

fn trim_trailing_slash(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/"
    } else {
        trimmed
    }
}

/// Accepts the spellings `1 t true 0 f false`, case-insensitively.
fn parse_bool(name: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "t" | "true" => Ok(true),
        "0" | "f" | "false" => Ok(false),
        _ => Err(ConfigError::invalid(
            name,
            format!("{value:?} is not a boolean, use 'true' or 'false'"),
        )),
    }
}

fn parse_bool_var<G>(get: &G, name: &'static str, default: bool) -> Result<bool, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    match get(name) {
        Some(value) => parse_bool(name, &value),
        None => Ok(default),
    }
}

fn parse_interval(value: Option<String>) -> Result<Duration, ConfigError> {
    const NAME: &str = "POLL_INTERVAL_MINUTES";
    let value = value.ok_or(ConfigError::Missing(NAME))?;
    let minutes: u64 = value
        .trim()
        .parse()
        .map_err(|_| ConfigError::invalid(NAME, format!("{value:?} is not a whole number of minutes")))?;
    if minutes == 0 {
        return Err(ConfigError::invalid(NAME, "must be greater than zero"));
    }
    let secs = minutes
        .checked_mul(60)
        .ok_or_else(|| ConfigError::invalid(NAME, format!("{minutes} minutes is too large")))?;
    Ok(Duration::from_secs(secs))
}
