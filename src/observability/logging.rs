//! Structured logging configuration.

use crate::config::LoggingSettings;
use std::path::PathBuf;
use std::str::FromStr;

/// Filter used when nothing else is configured.
pub const DEFAULT_FILTER: &str = "warn";

/// Filter used with `--verbose`.
pub const VERBOSE_FILTER: &str = "debug";

/// Log line format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human readable lines.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

impl FromStr for LogFormat {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "pretty" | "text" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            _ => Err(crate::Error::InvalidInput(format!("Unknown log format: {s}"))),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Line format.
    pub format: LogFormat,
    /// `EnvFilter` directive string.
    pub filter: String,
    /// Log file; stderr when `None`.
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            filter: DEFAULT_FILTER.to_string(),
            file: None,
        }
    }
}

impl LoggingConfig {
    /// Builds logging configuration from the `[logging]` config section.
    ///
    /// An unknown format name falls back to pretty output.
    #[must_use]
    pub fn from_settings(settings: Option<&LoggingSettings>) -> Self {
        let mut config = Self::default();
        let Some(settings) = settings else {
            return config;
        };

        if let Some(format) = settings.format.as_deref() {
            config.format = LogFormat::from_str(format).unwrap_or_else(|e| {
                tracing::warn!("{e}, using pretty logs");
                LogFormat::Pretty
            });
        }
        if let Some(level) = settings.level.as_deref().filter(|l| !l.trim().is_empty()) {
            config.filter = level.trim().to_string();
        }
        config.file.clone_from(&settings.file);
        config
    }

    /// Applies environment variable overrides.
    ///
    /// `KINTONE_TRANSFER_LOG` wins over `RUST_LOG` for the filter.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        let filter = env_value("KINTONE_TRANSFER_LOG").or_else(|| env_value("RUST_LOG"));
        if let Some(filter) = filter {
            self.filter = filter;
        }
        if let Some(format) = env_value("KINTONE_TRANSFER_LOG_FORMAT")
            .and_then(|f| LogFormat::from_str(&f).ok())
        {
            self.format = format;
        }
        if let Some(file) = env_value("KINTONE_TRANSFER_LOG_FILE") {
            self.file = Some(PathBuf::from(file));
        }
        self
    }

    /// Switches to debug logging when `verbose` is set.
    #[must_use]
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        if verbose {
            self.filter = VERBOSE_FILTER.to_string();
        }
        self
    }
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
