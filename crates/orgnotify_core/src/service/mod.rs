//! Notification pipeline services.
//!
//! # Responsibility
//! - Orchestrate repository calls and external collaborators into the
//!   resolve, generate, deliver and reap steps of a run.
//! - Keep the CLI decoupled from storage and process details.

pub mod artifact_generator;
pub mod delivery;
pub mod notification_run;
pub mod org_resolver;
pub mod record_reaper;
pub mod renderer;
