//! Core of the organization notification pipeline.
//!
//! A run resolves which organizations are owed a notification artifact,
//! renders one encrypted artifact per organization, hands the batch to an
//! external delivery program and reaps delivered or ineligible records.

pub mod archive;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod process;
pub mod repo;
pub mod service;

pub use archive::{ArchiveError, ArchiveLayout};
pub use config::{CommandConfig, ConfigError, DeliveryConfig, ReportKey, SectionConfig};
pub use logging::{init_logging, logging_status, LogLevel};
pub use model::notification::{NotificationId, NotificationRecord};
pub use model::organization::{OrgId, Organization, DEFAULT_REPORT_TYPE};
pub use process::{CapturedOutput, ProcessError};
pub use repo::notification_repo::{
    NotificationPredicate, NotificationRepository, SqliteNotificationRepository,
};
pub use repo::org_repo::{OrganizationRepository, SqliteOrganizationRepository};
pub use repo::{RepoError, RepoResult};
pub use service::artifact_generator::{ArtifactGenerator, GenerationError, GenerationSummary};
pub use service::delivery::{
    CommandDelivery, DeliveryCollaborator, DeliveryOutcome, DeliveryTrigger,
};
pub use service::notification_run::{NotificationRun, RunContext, RunError, RunReport};
pub use service::org_resolver::OrgResolver;
pub use service::record_reaper::RecordReaper;
pub use service::renderer::{
    CommandRenderer, NotificationRenderer, RenderError, RenderOutcome, RenderReport,
    RenderRequest, RenderResult,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
