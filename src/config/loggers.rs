//! Log sink configuration
//!
//! Describes the extra sinks a configuration file can add to the console
//! output: a size-rotated log file and a webhook.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use super::env::expand_home;
use crate::error::{BackeeError, BackeeResult};

/// Default size at which a log file rolls over
pub const DEFAULT_MAX_FILE_SIZE: u64 = 1024 * 1024;

/// Log severity, ordered from least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl Severity {
    /// Severity of a tracing level; trace folds into debug
    pub fn of(level: &tracing::Level) -> Self {
        match *level {
            tracing::Level::TRACE | tracing::Level::DEBUG => Self::Debug,
            tracing::Level::INFO => Self::Info,
            tracing::Level::WARN => Self::Warning,
            _ => Self::Error,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Inclusive severity range a sink accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LevelRange {
    pub min: Severity,
    pub max: Severity,
}

impl LevelRange {
    fn new(min: Option<Severity>, max: Option<Severity>) -> Self {
        Self {
            min: min.unwrap_or(Severity::Debug),
            max: max.unwrap_or(Severity::Critical),
        }
    }

    pub fn contains(&self, severity: Severity) -> bool {
        self.min <= severity && severity <= self.max
    }

    pub fn accepts(&self, level: &tracing::Level) -> bool {
        self.contains(Severity::of(level))
    }
}

impl Default for LevelRange {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// A configured log sink
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoggerConfig {
    File(FileLoggerConfig),
    Web(WebLoggerConfig),
}

/// Log file with size-based rollover
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileLoggerConfig {
    pub file: PathBuf,
    pub levels: LevelRange,
    /// Size in bytes at which the file rolls over
    pub max_size: u64,
    /// Number of rolled files kept; 0 never rolls over
    pub backup_count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Get => write!(f, "GET"),
            Self::Post => write!(f, "POST"),
        }
    }
}

/// Credentials sent with webhook requests
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebAuth {
    Basic {
        username: String,
        password: Zeroizing<String>,
    },
}

/// Webhook receiving log messages
///
/// `{{ message }}` and `{{ name }}` in the url, headers and body are
/// replaced with the log message and the configured instance name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebLoggerConfig {
    pub method: HttpMethod,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub body: Option<String>,
    pub auth: Option<WebAuth>,
    pub levels: LevelRange,
    /// Instance name from the `settings` block
    pub name: String,
}

/// Logger entry as written in the configuration file
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub(crate) enum RawLogger {
    File {
        file: String,
        min_level: Option<Severity>,
        max_level: Option<Severity>,
        max_size: Option<RawFileSize>,
        #[serde(default)]
        backup_count: u32,
        format: Option<String>,
    },
    Web {
        method: HttpMethod,
        url: String,
        #[serde(default)]
        headers: BTreeMap<String, String>,
        body: Option<String>,
        auth: Option<RawAuth>,
        min_level: Option<Severity>,
        max_level: Option<Severity>,
    },
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum RawFileSize {
    Bytes(u64),
    Text(String),
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub(crate) enum RawAuth {
    Basic { username: String, password: String },
}

impl RawLogger {
    pub(crate) fn resolve(self, name: &str) -> BackeeResult<LoggerConfig> {
        match self {
            Self::File {
                file,
                min_level,
                max_level,
                max_size,
                backup_count,
                format,
            } => {
                if format.is_some() {
                    tracing::warn!(file = %file, "custom log formats are not supported, using the default");
                }
                let max_size = match max_size {
                    None => DEFAULT_MAX_FILE_SIZE,
                    Some(RawFileSize::Bytes(bytes)) => bytes,
                    Some(RawFileSize::Text(text)) => parse_file_size(&text)?,
                };
                Ok(LoggerConfig::File(FileLoggerConfig {
                    file: PathBuf::from(expand_home(&file)),
                    levels: LevelRange::new(min_level, max_level),
                    max_size,
                    backup_count,
                }))
            }
            Self::Web {
                method,
                url,
                headers,
                body,
                auth,
                min_level,
                max_level,
            } => Ok(LoggerConfig::Web(WebLoggerConfig {
                method,
                url,
                headers,
                body,
                auth: auth.map(|RawAuth::Basic { username, password }| WebAuth::Basic {
                    username,
                    password: Zeroizing::new(password),
                }),
                levels: LevelRange::new(min_level, max_level),
                name: name.to_string(),
            })),
        }
    }
}

/// Parse a size such as `512`, `100k`, `10m` or `1g` into bytes
pub fn parse_file_size(text: &str) -> BackeeResult<u64> {
    let invalid = || BackeeError::Config(format!("file size {} not supported", text));

    let text = text.trim();
    let (digits, multiplier) = match text.char_indices().last() {
        Some((idx, 'b')) => (&text[..idx], 1),
        Some((idx, 'k')) => (&text[..idx], 1 << 10),
        Some((idx, 'm')) => (&text[..idx], 1 << 20),
        Some((idx, 'g')) => (&text[..idx], 1 << 30),
        _ => (text, 1),
    };

    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }

    digits
        .parse::<u64>()
        .ok()
        .and_then(|n| n.checked_mul(multiplier))
        .ok_or_else(invalid)
}
