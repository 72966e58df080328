//! End-to-end notification run.
//!
//! # Responsibility
//! - Sequence resolve, generate, link, deliver and reap for one run.
//! - Thread the run's configuration as an explicit [`RunContext`].
//!
//! # Invariants
//! - Steps run strictly in order on the calling thread.
//! - A generation failure aborts before linking, delivery or any cleanup.
//! - Delivered-batch cleanup runs only after `DeliveryOutcome::Delivered`;
//!   ineligible-owner cleanup runs whenever generation completed.
//! - Two runs must not overlap on the same store. Scheduling (for example a
//!   locked cron job) is responsible for that; nothing here detects it.

use crate::archive::{ArchiveError, ArchiveLayout};
use crate::config::{ReportKey, SectionConfig};
use crate::model::organization::OrgId;
use crate::repo::notification_repo::SqliteNotificationRepository;
use crate::repo::org_repo::SqliteOrganizationRepository;
use crate::repo::RepoError;
use crate::service::artifact_generator::{ArtifactGenerator, GenerationError, GenerationSummary};
use crate::service::delivery::{DeliveryCollaborator, DeliveryOutcome, DeliveryTrigger};
use crate::service::org_resolver::OrgResolver;
use crate::service::record_reaper::RecordReaper;
use crate::service::renderer::NotificationRenderer;
use chrono::NaiveDate;
use log::{info, warn};
use rusqlite::Connection;
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Fatal run error.
#[derive(Debug)]
pub enum RunError {
    Repo(RepoError),
    Generation(GenerationError),
    Archive(ArchiveError),
}

impl Display for RunError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Repo(err) => write!(f, "{err}"),
            Self::Generation(err) => write!(f, "{err}"),
            Self::Archive(err) => write!(f, "{err}"),
        }
    }
}

impl Error for RunError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            Self::Generation(err) => Some(err),
            Self::Archive(err) => Some(err),
        }
    }
}

impl From<RepoError> for RunError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<GenerationError> for RunError {
    fn from(value: GenerationError) -> Self {
        Self::Generation(value)
    }
}

impl From<ArchiveError> for RunError {
    fn from(value: ArchiveError) -> Self {
        Self::Archive(value)
    }
}

/// Inputs of one run.
#[derive(Debug, Clone)]
pub struct RunContext {
    /// Subscription marker organizations need to be notified.
    pub report_type: String,
    /// Organizations this deployment may ever notify. Supplied by
    /// configuration; also the keep-list for ineligible-owner cleanup.
    pub eligible_orgs: BTreeSet<OrgId>,
    pub report_key: ReportKey,
    pub archive: ArchiveLayout,
}

impl RunContext {
    pub fn from_config(config: &SectionConfig, run_date: NaiveDate) -> Self {
        Self {
            report_type: config.report_type.clone(),
            eligible_orgs: config.eligible_orgs.clone(),
            report_key: config.report_key.clone(),
            archive: ArchiveLayout::for_date(&config.output_base_dir, run_date),
        }
    }
}

/// What a completed run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// Resolver output before eligibility gating.
    pub resolved: BTreeSet<OrgId>,
    pub generation: GenerationSummary,
    pub delivery: DeliveryOutcome,
    /// `None` when delivered-batch cleanup did not run.
    pub delivered_deleted: Option<usize>,
    pub ineligible_deleted: usize,
}

/// One notification run over a store and two collaborators.
pub struct NotificationRun<'a, R: NotificationRenderer, D: DeliveryCollaborator> {
    store: &'a Connection,
    renderer: &'a R,
    delivery: &'a D,
}

impl<'a, R: NotificationRenderer, D: DeliveryCollaborator> NotificationRun<'a, R, D> {
    pub fn new(store: &'a Connection, renderer: &'a R, delivery: &'a D) -> Self {
        Self {
            store,
            renderer,
            delivery,
        }
    }

    pub fn execute(&self, ctx: &RunContext) -> Result<RunReport, RunError> {
        let organizations = SqliteOrganizationRepository::try_new(self.store)?;
        let notifications = SqliteNotificationRepository::try_new(self.store)?;

        ctx.archive.prepare()?;

        let resolved =
            OrgResolver::new(&organizations, &notifications, &ctx.report_type).resolve()?;
        let targets = gate_eligible(&resolved, &ctx.eligible_orgs);

        let generation = ArtifactGenerator::new(
            self.renderer,
            self.store,
            &ctx.report_key,
            ctx.archive.run_dir(),
        )
        .generate_all(&targets)?;
        info!(
            "event=run_generated module=run artifacts={}",
            generation.created_count()
        );

        ctx.archive.point_latest()?;

        let delivery = DeliveryTrigger::new(self.delivery).trigger(generation.created_count());

        let reaper = RecordReaper::new(&notifications);
        let delivered_deleted = if delivery.is_delivered() {
            Some(reaper.reap_delivered()?)
        } else {
            None
        };
        let ineligible_deleted = reaper.reap_ineligible(&ctx.eligible_orgs)?;

        Ok(RunReport {
            resolved,
            generation,
            delivery,
            delivered_deleted,
            ineligible_deleted,
        })
    }
}

fn gate_eligible(resolved: &BTreeSet<OrgId>, eligible: &BTreeSet<OrgId>) -> BTreeSet<OrgId> {
    let (targets, skipped): (BTreeSet<OrgId>, BTreeSet<OrgId>) = resolved
        .iter()
        .cloned()
        .partition(|org_id| eligible.contains(org_id));
    for org_id in &skipped {
        warn!("event=org_gated module=run org_id={org_id} reason=not_in_eligible_orgs");
    }
    targets
}
