//! Contract with the external notification renderer.
//!
//! # Responsibility
//! - Describe what the renderer is asked to do and what it reports back.
//! - Collapse the renderer's raw `(was_encrypted, result?)` report into the
//!   three outcomes the pipeline acts on.
//! - Provide [`CommandRenderer`], which runs the renderer out of process.

use crate::config::{CommandConfig, ReportKey};
use crate::logging::sanitize_message;
use crate::process::{run_captured, ProcessError};
use log::debug;
use rusqlite::Connection;
use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

/// Environment variable carrying the report key to [`CommandRenderer`]
/// children. Kept off the argument list so it never shows up in `ps`.
pub const REPORT_KEY_ENV: &str = "ORGNOTIFY_REPORT_KEY";
const MAX_DIAGNOSTIC_CHARS: usize = 2000;

/// One artifact generation request.
#[derive(Debug, Clone, Copy)]
pub struct RenderRequest<'a> {
    pub org_id: &'a str,
    /// Always `true` for scheduled runs; drafts are produced elsewhere.
    pub final_report: bool,
    pub report_key: &'a ReportKey,
    /// Directory the artifact is written to.
    pub output_dir: &'a Path,
}

/// Structured part of a renderer report.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RenderResult {
    /// Notifications included in the artifact.
    #[serde(default)]
    pub notifications: Vec<serde_json::Value>,
}

/// Raw renderer report.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RenderReport {
    pub was_encrypted: bool,
    #[serde(default)]
    pub result: Option<RenderResult>,
}

/// Renderer-side failure that produced no report at all.
#[derive(Debug)]
pub enum RenderError {
    Process(ProcessError),
    Failed {
        exit_code: Option<i32>,
        stderr: String,
    },
    InvalidReport(serde_json::Error),
}

impl Display for RenderError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Process(err) => write!(f, "{err}"),
            Self::Failed { exit_code, stderr } => match exit_code {
                Some(code) => write!(f, "renderer exited with status {code}: {stderr}"),
                None => write!(f, "renderer terminated by signal: {stderr}"),
            },
            Self::InvalidReport(err) => write!(f, "renderer report is not valid JSON: {err}"),
        }
    }
}

impl Error for RenderError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Process(err) => Some(err),
            Self::InvalidReport(err) => Some(err),
            Self::Failed { .. } => None,
        }
    }
}

impl From<ProcessError> for RenderError {
    fn from(value: ProcessError) -> Self {
        Self::Process(value)
    }
}

/// What one render attempt means for the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderOutcome {
    /// An encrypted artifact was written.
    Encrypted,
    /// The organization had no notifications; nothing was written.
    NoContentFound,
    /// Anything else. Fatal to the run.
    UnknownFailure { detail: String },
}

impl RenderOutcome {
    pub fn classify(report: Result<RenderReport, RenderError>) -> Self {
        match report {
            Ok(RenderReport {
                was_encrypted: true,
                ..
            }) => Self::Encrypted,
            Ok(RenderReport {
                result: Some(result),
                ..
            }) if result.notifications.is_empty() => Self::NoContentFound,
            Ok(RenderReport { result: None, .. }) => Self::UnknownFailure {
                detail: "renderer returned no result".to_string(),
            },
            Ok(RenderReport {
                result: Some(result),
                ..
            }) => Self::UnknownFailure {
                detail: format!(
                    "renderer found {} notifications but did not encrypt an artifact",
                    result.notifications.len()
                ),
            },
            Err(err) => Self::UnknownFailure {
                detail: err.to_string(),
            },
        }
    }
}

/// Produces one notification artifact per call.
pub trait NotificationRenderer {
    /// Renders the artifact for `request.org_id`. Implementations may mark
    /// included notifications as generated through `store`.
    fn render(
        &self,
        store: &Connection,
        request: &RenderRequest<'_>,
    ) -> Result<RenderReport, RenderError>;
}

/// Runs the renderer as an external program.
///
/// The child receives `--org <id> [--final] --database <path>
/// --output-dir <dir>`, the key in [`REPORT_KEY_ENV`], and must print a JSON
/// [`RenderReport`] on stdout.
#[derive(Debug, Clone)]
pub struct CommandRenderer {
    command: CommandConfig,
    database: PathBuf,
}

impl CommandRenderer {
    pub fn new(command: CommandConfig, database: impl Into<PathBuf>) -> Self {
        Self {
            command,
            database: database.into(),
        }
    }

    fn arguments(&self, request: &RenderRequest<'_>) -> Vec<String> {
        let mut args = vec!["--org".to_string(), request.org_id.to_string()];
        if request.final_report {
            args.push("--final".to_string());
        }
        args.push("--database".to_string());
        args.push(self.database.display().to_string());
        args.push("--output-dir".to_string());
        args.push(request.output_dir.display().to_string());
        args
    }
}

impl NotificationRenderer for CommandRenderer {
    fn render(
        &self,
        _store: &Connection,
        request: &RenderRequest<'_>,
    ) -> Result<RenderReport, RenderError> {
        let output = run_captured(
            &self.command,
            &self.arguments(request),
            &[(REPORT_KEY_ENV, request.report_key.expose())],
            None,
        )?;
        let stderr = sanitize_message(
            &String::from_utf8_lossy(&output.stderr),
            MAX_DIAGNOSTIC_CHARS,
        );
        if !stderr.trim().is_empty() {
            debug!(
                "event=renderer_stderr module=renderer org_id={} stderr={}",
                request.org_id, stderr
            );
        }
        if !output.success() {
            return Err(RenderError::Failed {
                exit_code: output.exit_code,
                stderr,
            });
        }
        serde_json::from_slice(&output.stdout).map_err(RenderError::InvalidReport)
    }
}

#[cfg(test)]
mod tests {
    use super::{RenderError, RenderOutcome, RenderReport, RenderResult};
    use serde_json::json;

    fn report(was_encrypted: bool, notifications: Option<usize>) -> RenderReport {
        RenderReport {
            was_encrypted,
            result: notifications.map(|count| RenderResult {
                notifications: vec![json!({"ticket": "T"}); count],
            }),
        }
    }

    #[test]
    fn encrypted_report_wins_over_result_content() {
        assert_eq!(
            RenderOutcome::classify(Ok(report(true, None))),
            RenderOutcome::Encrypted
        );
        assert_eq!(
            RenderOutcome::classify(Ok(report(true, Some(3)))),
            RenderOutcome::Encrypted
        );
    }

    #[test]
    fn empty_notification_list_means_no_content() {
        assert_eq!(
            RenderOutcome::classify(Ok(report(false, Some(0)))),
            RenderOutcome::NoContentFound
        );
    }

    #[test]
    fn everything_else_is_an_unknown_failure() {
        assert!(matches!(
            RenderOutcome::classify(Ok(report(false, None))),
            RenderOutcome::UnknownFailure { .. }
        ));
        assert!(matches!(
            RenderOutcome::classify(Ok(report(false, Some(2)))),
            RenderOutcome::UnknownFailure { .. }
        ));
        let failed = Err(RenderError::Failed {
            exit_code: Some(1),
            stderr: "boom".to_string(),
        });
        match RenderOutcome::classify(failed) {
            RenderOutcome::UnknownFailure { detail } => assert!(detail.contains("boom")),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn report_parses_from_renderer_json() {
        let parsed: RenderReport =
            serde_json::from_str(r#"{"was_encrypted": false, "result": {"notifications": []}}"#)
                .unwrap();
        assert_eq!(parsed, report(false, Some(0)));

        let parsed: RenderReport =
            serde_json::from_str(r#"{"was_encrypted": false, "result": null}"#).unwrap();
        assert_eq!(parsed.result, None);
    }
}
