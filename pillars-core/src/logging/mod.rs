//! Tracing setup for binaries and tests.
//!
//! Library code only emits `tracing` events; whoever owns `main` decides where
//! they go. `RUST_LOG` always wins over the configured filters.
//!
//! ```text
//! TracingConfig ──► "info,pillars_core::session=info,..." ──► EnvFilter
//!                                                  ▲
//!                                         RUST_LOG (if set)
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Once;
use tracing_subscriber::EnvFilter;

/// Filter level, parsed case-insensitively
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }

    pub fn all() -> [LogLevel; 5] {
        [
            LogLevel::Trace,
            LogLevel::Debug,
            LogLevel::Info,
            LogLevel::Warn,
            LogLevel::Error,
        ]
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown log level '{0}'")]
pub struct UnknownLevel(String);

impl FromStr for LogLevel {
    type Err = UnknownLevel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LogLevel::all()
            .into_iter()
            .find(|level| level.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownLevel(s.to_string()))
    }
}

/// Subscriber settings, rendered into an `EnvFilter` directive string
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TracingConfig {
    pub default_level: LogLevel,
    /// `(target, level)`, rendered after the default level
    pub module_filters: Vec<(String, LogLevel)>,
    pub show_thread_ids: bool,
    pub show_targets: bool,
    pub show_file_line: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            default_level: LogLevel::Info,
            module_filters: vec![
                ("pillars_core::session".to_string(), LogLevel::Info),
                ("pillars_core::structure".to_string(), LogLevel::Info),
                ("pillars_core::loot".to_string(), LogLevel::Info),
                ("pillars_core::hotreload".to_string(), LogLevel::Info),
            ],
            show_thread_ids: false,
            show_targets: true,
            show_file_line: false,
        }
    }
}

impl TracingConfig {
    /// Verbose growth and break detail for debugging a match
    pub fn verbose() -> Self {
        Self {
            module_filters: vec![
                ("pillars_core::session".to_string(), LogLevel::Debug),
                ("pillars_core::structure".to_string(), LogLevel::Debug),
            ],
            ..Self::default()
        }
    }

    pub fn with_filter(mut self, target: impl Into<String>, level: LogLevel) -> Self {
        self.module_filters.push((target.into(), level));
        self
    }

    /// Replace the default level with a textual one, as read from the
    /// environment. `None` keeps the current level.
    pub fn with_level_override(mut self, level: Option<&str>) -> Result<Self, UnknownLevel> {
        if let Some(level) = level {
            self.default_level = level.parse()?;
        }
        Ok(self)
    }

    pub fn to_env_filter_string(&self) -> String {
        let mut parts = vec![self.default_level.as_str().to_string()];
        for (module, level) in &self.module_filters {
            parts.push(format!("{module}={level}"));
        }
        parts.join(",")
    }
}

static TRACING_INIT: Once = Once::new();

/// Install the global subscriber with default filters. Idempotent.
pub fn init_tracing_default() {
    init_tracing(&TracingConfig::default());
}

/// Install the global subscriber. The first call wins; later calls are no-ops.
pub fn init_tracing(config: &TracingConfig) {
    let config = config.clone();
    TRACING_INIT.call_once(move || {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.to_env_filter_string()));

        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(config.show_targets)
            .with_thread_ids(config.show_thread_ids)
            .with_file(config.show_file_line)
            .with_line_number(config.show_file_line)
            .compact();

        // Another subscriber (a test harness, the host) may already be installed
        let _ = subscriber.try_init();
    });
}

/// Entered span around a named operation; closes on drop
pub struct TimingSpan {
    _span: tracing::span::EnteredSpan,
}

impl TimingSpan {
    pub fn new(name: &str) -> Self {
        let span = tracing::info_span!("operation", name = name);
        Self {
            _span: span.entered(),
        }
    }
}
