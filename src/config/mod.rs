//! Runtime configuration.
//!
//! [`ConciergeConfig`] is read from a TOML file through a `cap-std`
//! directory capability. Every section has defaults, so an empty file is a
//! valid configuration. Two settings may be supplied from the environment
//! instead of the file: [`DATABASE_URL_ENV`] and [`WORKER_SECRET_ENV`].

use crate::agent::domain::{
    DEFAULT_HISTORY_LIMIT, DEFAULT_TEXT_FLUSH_CHARS, StatusTemplates, TurnSettings,
};
use crate::queue::{
    domain::{DEFAULT_MAX_ATTEMPTS, RetryPolicy, TRIGGER},
    services::QueueSettings,
};
use crate::task::services::DEFAULT_BATCH_LIMIT;
use crate::worker::services::{
    DEFAULT_BATCH_SIZE, DEFAULT_SESSION_CACHE_CAPACITY, SessionCache, WorkerSettings,
};
use camino::Utf8Path;
use cap_std::{ambient_authority, fs_utf8::Dir};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

/// Environment variable overriding `database.url`.
pub const DATABASE_URL_ENV: &str = "CONCIERGE_DATABASE_URL";
/// Environment variable overriding `worker.secret`.
pub const WORKER_SECRET_ENV: &str = "CONCIERGE_WORKER_SECRET";

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be opened or read.
    #[error("failed to read config file '{path}': {source}")]
    Read {
        /// File addressed.
        path: String,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
    /// The file is not valid TOML for [`ConciergeConfig`].
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    /// A value is out of range.
    #[error("invalid config value for {key}: {reason}")]
    Invalid {
        /// Dotted key of the offending setting.
        key: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}

/// Database connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL.
    pub url: String,
    /// Maximum pooled connections.
    pub pool_size: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            pool_size: 8,
        }
    }
}

/// Retry policy and attempt budget defaults.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// First retry delay in seconds.
    pub retry_base_seconds: u64,
    /// Retry delay ceiling in seconds.
    pub retry_max_seconds: u64,
    /// Attempts granted to jobs that do not set their own budget.
    pub default_max_attempts: u32,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            retry_base_seconds: 30,
            retry_max_seconds: 3_600,
            default_max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

/// Worker invocation settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Jobs claimed per invocation.
    pub batch_size: usize,
    /// Claim lease in seconds.
    pub lease_seconds: u64,
    /// Per-job handler budget in seconds.
    pub job_timeout_seconds: u64,
    /// Expose the HTTP invocation surface.
    pub http_enabled: bool,
    /// Shared secret expected in the `x-worker-secret` header.
    pub secret: String,
    /// Maximum cached sessions.
    pub session_cache_capacity: u64,
    /// Cached session lifetime in seconds.
    pub session_cache_ttl_seconds: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            lease_seconds: 300,
            job_timeout_seconds: 240,
            http_enabled: true,
            secret: String::new(),
            session_cache_capacity: DEFAULT_SESSION_CACHE_CAPACITY,
            session_cache_ttl_seconds: 600,
        }
    }
}

/// Scheduler tick settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Seconds between ticks of the scheduler binary.
    pub interval_seconds: u64,
    /// Tasks dispatched per tick.
    pub batch_limit: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval_seconds: 60,
            batch_limit: DEFAULT_BATCH_LIMIT,
        }
    }
}

/// Agent turn settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// History rows sent to the model.
    pub history_limit: usize,
    /// Overall turn deadline in seconds.
    pub model_timeout_seconds: u64,
    /// Per-event wait bound while a tool call runs, in seconds.
    pub tool_timeout_seconds: u64,
    /// Tool names offered to the model.
    pub tools: Vec<String>,
    /// Mirror tool calls as channel status messages.
    pub mirror_tool_calls: bool,
    /// Stream draft text while generating.
    pub stream_text: bool,
    /// Draft flush interval in milliseconds.
    pub text_flush_interval_ms: u64,
    /// Draft flush threshold in characters.
    pub text_flush_chars: usize,
    /// Status and task prompt templates.
    pub templates: StatusTemplates,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            history_limit: DEFAULT_HISTORY_LIMIT,
            model_timeout_seconds: 180,
            tool_timeout_seconds: 60,
            tools: Vec::new(),
            mirror_tool_calls: true,
            stream_text: false,
            text_flush_interval_ms: 750,
            text_flush_chars: DEFAULT_TEXT_FLUSH_CHARS,
            templates: StatusTemplates::default(),
        }
    }
}

/// Settings for the manual trigger endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TriggerConfig {
    /// Job types callers may enqueue directly.
    pub allowed_types: Vec<String>,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            allowed_types: vec![TRIGGER.to_owned()],
        }
    }
}

/// Top-level configuration document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ConciergeConfig {
    /// `[database]`
    pub database: DatabaseConfig,
    /// `[queue]`
    pub queue: QueueConfig,
    /// `[worker]`
    pub worker: WorkerConfig,
    /// `[scheduler]`
    pub scheduler: SchedulerConfig,
    /// `[agent]`
    pub agent: AgentConfig,
    /// `[trigger]`
    pub trigger: TriggerConfig,
}

impl ConciergeConfig {
    /// Parses a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed input.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Reads `relative` from `dir`, applies environment overrides and
    /// validates the result.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file cannot be read or parsed, or a
    /// value is out of range.
    pub fn load_from_dir(dir: &Dir, relative: &Utf8Path) -> Result<Self, ConfigError> {
        let text = dir
            .read_to_string(relative)
            .map_err(|source| ConfigError::Read {
                path: relative.to_string(),
                source,
            })?;
        let config = Self::from_toml_str(&text)?.with_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Opens the parent directory of `path` with ambient authority and
    /// loads the file from it.
    ///
    /// # Errors
    ///
    /// See [`Self::load_from_dir`].
    pub fn load(path: &Utf8Path) -> Result<Self, ConfigError> {
        let parent = match path.parent() {
            Some(parent) if !parent.as_str().is_empty() => parent,
            _ => Utf8Path::new("."),
        };
        let file_name = path.file_name().ok_or_else(|| ConfigError::Invalid {
            key: "path",
            reason: format!("'{path}' does not name a file"),
        })?;
        let dir = Dir::open_ambient_dir(parent, ambient_authority()).map_err(|source| {
            ConfigError::Read {
                path: path.to_string(),
                source,
            }
        })?;
        Self::load_from_dir(&dir, Utf8Path::new(file_name))
    }

    /// Replaces the database URL and worker secret with values returned by
    /// `lookup` for [`DATABASE_URL_ENV`] and [`WORKER_SECRET_ENV`].
    #[must_use]
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = lookup(DATABASE_URL_ENV).filter(|value| !value.trim().is_empty()) {
            self.database.url = url;
        }
        if let Some(secret) = lookup(WORKER_SECRET_ENV).filter(|value| !value.is_empty()) {
            self.worker.secret = secret;
        }
        self
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let checks: [(&'static str, bool, &str); 9] = [
            ("database.pool_size", self.database.pool_size == 0, "must be positive"),
            ("queue.retry_base_seconds", self.queue.retry_base_seconds == 0, "must be positive"),
            (
                "queue.retry_max_seconds",
                self.queue.retry_max_seconds < self.queue.retry_base_seconds,
                "must not be below queue.retry_base_seconds",
            ),
            ("queue.default_max_attempts", self.queue.default_max_attempts == 0, "must be positive"),
            ("worker.batch_size", self.worker.batch_size == 0, "must be positive"),
            ("worker.job_timeout_seconds", self.worker.job_timeout_seconds == 0, "must be positive"),
            (
                "worker.lease_seconds",
                self.worker.lease_seconds <= self.worker.job_timeout_seconds,
                "must exceed worker.job_timeout_seconds",
            ),
            ("scheduler.interval_seconds", self.scheduler.interval_seconds == 0, "must be positive"),
            (
                "worker.secret",
                self.worker.http_enabled && self.worker.secret.is_empty(),
                "required while worker.http_enabled is set",
            ),
        ];
        if let Some((key, _, reason)) = checks.into_iter().find(|(_, failed, _)| *failed) {
            return Err(ConfigError::Invalid {
                key,
                reason: reason.to_owned(),
            });
        }
        if self.agent.model_timeout_seconds == 0 || self.agent.tool_timeout_seconds == 0 {
            return Err(ConfigError::Invalid {
                key: "agent",
                reason: "timeouts must be positive".to_owned(),
            });
        }
        Ok(())
    }

    /// Queue settings for [`crate::queue::services::JobQueue`].
    #[must_use]
    pub fn queue_settings(&self) -> QueueSettings {
        QueueSettings {
            retry: RetryPolicy::new(
                Duration::from_secs(self.queue.retry_base_seconds),
                Duration::from_secs(self.queue.retry_max_seconds),
            ),
            default_max_attempts: self.queue.default_max_attempts,
        }
    }

    /// Settings for [`crate::worker::services::Worker`].
    #[must_use]
    pub const fn worker_settings(&self) -> WorkerSettings {
        WorkerSettings {
            batch_size: self.worker.batch_size,
            lease: Duration::from_secs(self.worker.lease_seconds),
            job_timeout: Duration::from_secs(self.worker.job_timeout_seconds),
        }
    }

    /// Session cache sized from `[worker]`.
    #[must_use]
    pub fn session_cache(&self) -> SessionCache {
        SessionCache::new(
            self.worker.session_cache_capacity,
            Duration::from_secs(self.worker.session_cache_ttl_seconds),
        )
    }

    /// Settings for [`crate::agent::services::TurnExecutor`].
    #[must_use]
    pub fn turn_settings(&self) -> TurnSettings {
        TurnSettings {
            history_limit: self.agent.history_limit,
            model_timeout: Duration::from_secs(self.agent.model_timeout_seconds),
            tool_timeout: Duration::from_secs(self.agent.tool_timeout_seconds),
            tools: self.agent.tools.clone(),
            mirror_tool_calls: self.agent.mirror_tool_calls,
            stream_text: self.agent.stream_text,
            text_flush_interval: Duration::from_millis(self.agent.text_flush_interval_ms),
            text_flush_chars: self.agent.text_flush_chars,
            templates: self.agent.templates.clone(),
        }
    }

    /// Interval between scheduler ticks.
    #[must_use]
    pub const fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.scheduler.interval_seconds)
    }
}
