use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("Unknown integrity policy '{0}' (expected 'report' or 'fail')")]
    UnknownPolicy(String),
}

/// What to do when a realignment pass emits a group count different from the
/// track count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IntegrityPolicy {
    /// Log the mismatch and hand the output to the caller.
    #[default]
    Report,
    /// Turn the mismatch into an error at the workflow level.
    Fail,
}

impl FromStr for IntegrityPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "report" => Ok(IntegrityPolicy::Report),
            "fail" => Ok(IntegrityPolicy::Fail),
            _ => Err(ConfigError::UnknownPolicy(s.to_string())),
        }
    }
}

impl fmt::Display for IntegrityPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntegrityPolicy::Report => f.write_str("report"),
            IntegrityPolicy::Fail => f.write_str("fail"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RealignConfig {
    pub integrity_policy: IntegrityPolicy,
    /// Emit a log record for every out-of-range label. They are collected either way.
    pub log_label_warnings: bool,
}

impl Default for RealignConfig {
    fn default() -> Self {
        Self {
            integrity_policy: IntegrityPolicy::Report,
            log_label_warnings: true,
        }
    }
}

#[derive(Default)]
pub struct RealignConfigBuilder {
    integrity_policy: Option<IntegrityPolicy>,
    log_label_warnings: Option<bool>,
}

impl RealignConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn integrity_policy(mut self, policy: IntegrityPolicy) -> Self {
        self.integrity_policy = Some(policy);
        self
    }
    pub fn log_label_warnings(mut self, enabled: bool) -> Self {
        self.log_label_warnings = Some(enabled);
        self
    }

    pub fn build(self) -> Result<RealignConfig, ConfigError> {
        Ok(RealignConfig {
            integrity_policy: self
                .integrity_policy
                .ok_or(ConfigError::MissingParameter("integrity_policy"))?,
            log_label_warnings: self
                .log_label_warnings
                .ok_or(ConfigError::MissingParameter("log_label_warnings"))?,
        })
    }
}
