//! Section-based TOML configuration for notification runs.
//!
//! # Responsibility
//! - Load one named section (the CLI selector) from a TOML file.
//! - Supply the eligible organization universe, report key and collaborator
//!   commands as explicit values.
//!
//! # Invariants
//! - The report key is never rendered by `Debug`.
//! - A loaded section has passed [`SectionConfig::validate`].

use crate::model::organization::{validate_org_id, OrgId, DEFAULT_REPORT_TYPE};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Config path used when neither `--config` nor `ORGNOTIFY_CONFIG` is set.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/orgnotify/orgnotify.toml";
pub const DEFAULT_OUTPUT_BASE_DIR: &str = "/var/cyhy/reports/output";
pub const DEFAULT_DELIVERY_TIMEOUT_SECS: u64 = 60 * 60;

static SECTION_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_.-]+$").expect("valid section name regex"));

#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: std::io::Error },
    Parse(toml::de::Error),
    InvalidSectionName(String),
    UnknownSection { section: String, available: Vec<String> },
    Validation(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "cannot read config `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "invalid config: {err}"),
            Self::InvalidSectionName(name) => write!(f, "invalid config section name `{name}`"),
            Self::UnknownSection { section, available } => write!(
                f,
                "config section `{section}` not found (available: {})",
                available.join(", ")
            ),
            Self::Validation(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            _ => None,
        }
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(value: toml::de::Error) -> Self {
        Self::Parse(value)
    }
}

/// Shared key used by the renderer to encrypt every artifact of a run.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct ReportKey(String);

impl ReportKey {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl Debug for ReportKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("ReportKey(<redacted>)")
    }
}

/// External program invocation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CommandConfig {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Working directory for the child; inherits ours when unset.
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DeliveryConfig {
    #[serde(flatten)]
    pub command: CommandConfig,
    #[serde(default = "default_delivery_timeout_secs")]
    pub timeout_secs: u64,
}

impl DeliveryConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// One configuration section, selected by name on the command line.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SectionConfig {
    /// SQLite database holding organizations and notifications.
    pub database: PathBuf,
    pub report_key: ReportKey,
    #[serde(default = "default_report_type")]
    pub report_type: String,
    /// Organizations this deployment may ever notify. Records owned by
    /// anything outside this set are deleted at the end of every run.
    pub eligible_orgs: BTreeSet<OrgId>,
    /// Accepts an empty `eligible_orgs`, which makes every run delete all
    /// stored notification records.
    #[serde(default)]
    pub allow_empty_eligible_orgs: bool,
    #[serde(default = "default_output_base_dir")]
    pub output_base_dir: PathBuf,
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
    pub renderer: CommandConfig,
    pub delivery: DeliveryConfig,
}

impl SectionConfig {
    /// Reads `path` and returns the validated section `section`.
    pub fn load(path: &Path, section: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content, section)
    }

    /// Parses `content` and returns the validated section `section`.
    pub fn from_toml(content: &str, section: &str) -> Result<Self, ConfigError> {
        if !SECTION_NAME_RE.is_match(section) {
            return Err(ConfigError::InvalidSectionName(section.to_string()));
        }

        let mut table: toml::Table = content.parse()?;
        let Some(raw) = table.remove(section) else {
            let mut available: Vec<String> = table
                .iter()
                .filter(|(_, value)| value.is_table())
                .map(|(name, _)| name.clone())
                .collect();
            available.sort();
            return Err(ConfigError::UnknownSection {
                section: section.to_string(),
                available,
            });
        };

        let config: Self = raw.try_into()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.report_key.expose().trim().is_empty() {
            return Err(ConfigError::Validation("report_key cannot be empty".into()));
        }
        if self.report_type.trim().is_empty() {
            return Err(ConfigError::Validation("report_type cannot be empty".into()));
        }
        if self.eligible_orgs.is_empty() && !self.allow_empty_eligible_orgs {
            return Err(ConfigError::Validation(
                "eligible_orgs cannot be empty unless allow_empty_eligible_orgs = true".into(),
            ));
        }
        for org_id in &self.eligible_orgs {
            validate_org_id(org_id)
                .map_err(|err| ConfigError::Validation(format!("eligible_orgs: {err}")))?;
        }
        if self.renderer.program.trim().is_empty() {
            return Err(ConfigError::Validation(
                "renderer.program cannot be empty".into(),
            ));
        }
        if self.delivery.command.program.trim().is_empty() {
            return Err(ConfigError::Validation(
                "delivery.program cannot be empty".into(),
            ));
        }
        if self.delivery.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "delivery.timeout_secs must be positive".into(),
            ));
        }
        Ok(())
    }
}

fn default_report_type() -> String {
    DEFAULT_REPORT_TYPE.to_string()
}

fn default_output_base_dir() -> PathBuf {
    PathBuf::from(DEFAULT_OUTPUT_BASE_DIR)
}

fn default_delivery_timeout_secs() -> u64 {
    DEFAULT_DELIVERY_TIMEOUT_SECS
}
