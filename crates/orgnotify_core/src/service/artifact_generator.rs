//! Per-organization artifact generation.
//!
//! # Responsibility
//! - Ask the renderer for one final, encrypted artifact per organization.
//! - Count created artifacts; the count gates delivery.
//!
//! # Invariants
//! - Organizations are processed in ascending id order, one at a time.
//! - The first `UnknownFailure` stops the loop; no later organization is
//!   rendered in that run.
//! - "No content" is not an error.

use crate::config::ReportKey;
use crate::model::organization::OrgId;
use crate::service::renderer::{NotificationRenderer, RenderOutcome, RenderRequest};
use log::{error, info};
use rusqlite::Connection;
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;

/// Fatal generation error; aborts the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationError {
    UnknownFailure { org_id: OrgId, detail: String },
}

impl Display for GenerationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownFailure { org_id, detail } => write!(
                f,
                "unknown generation failure for organization {org_id}: {detail}"
            ),
        }
    }
}

impl Error for GenerationError {}

/// Aggregate of one generation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationSummary {
    /// Organizations that received an encrypted artifact.
    pub created: BTreeSet<OrgId>,
    /// Organizations with nothing to report.
    pub no_content: BTreeSet<OrgId>,
}

impl GenerationSummary {
    pub fn created_count(&self) -> usize {
        self.created.len()
    }
}

/// Drives the renderer across a set of organizations.
pub struct ArtifactGenerator<'a, R: NotificationRenderer> {
    renderer: &'a R,
    store: &'a Connection,
    report_key: &'a ReportKey,
    output_dir: &'a Path,
}

impl<'a, R: NotificationRenderer> ArtifactGenerator<'a, R> {
    pub fn new(
        renderer: &'a R,
        store: &'a Connection,
        report_key: &'a ReportKey,
        output_dir: &'a Path,
    ) -> Self {
        Self {
            renderer,
            store,
            report_key,
            output_dir,
        }
    }

    /// Renders one artifact per organization in `org_ids`.
    ///
    /// # Errors
    /// Returns [`GenerationError::UnknownFailure`] for the first organization
    /// whose render attempt is neither encrypted nor empty.
    pub fn generate_all(
        &self,
        org_ids: &BTreeSet<OrgId>,
    ) -> Result<GenerationSummary, GenerationError> {
        let mut summary = GenerationSummary::default();

        for org_id in org_ids {
            info!("event=artifact_render module=generator status=start org_id={org_id}");
            match self.generate_one(org_id) {
                RenderOutcome::Encrypted => {
                    info!("event=artifact_render module=generator status=created org_id={org_id}");
                    summary.created.insert(org_id.clone());
                }
                RenderOutcome::NoContentFound => {
                    info!(
                        "event=artifact_render module=generator status=no_content org_id={org_id}"
                    );
                    summary.no_content.insert(org_id.clone());
                }
                RenderOutcome::UnknownFailure { detail } => {
                    error!(
                        "event=artifact_render module=generator status=error org_id={org_id} error={detail}"
                    );
                    return Err(GenerationError::UnknownFailure {
                        org_id: org_id.clone(),
                        detail,
                    });
                }
            }
        }

        info!(
            "event=generation_done module=generator created={} no_content={}",
            summary.created.len(),
            summary.no_content.len()
        );
        Ok(summary)
    }

    fn generate_one(&self, org_id: &str) -> RenderOutcome {
        let request = RenderRequest {
            org_id,
            final_report: true,
            report_key: self.report_key,
            output_dir: self.output_dir,
        };
        RenderOutcome::classify(self.renderer.render(self.store, &request))
    }
}
