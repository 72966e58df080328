//! Cleanup of stored notification records.
//!
//! # Invariants
//! - Each pass is one declarative bulk delete; rerunning a pass on an
//!   unchanged store deletes nothing.
//! - Store errors propagate; a partially applied cleanup is never reported
//!   as success.

use crate::model::organization::OrgId;
use crate::repo::notification_repo::{NotificationPredicate, NotificationRepository};
use crate::repo::RepoResult;
use log::info;
use std::collections::BTreeSet;

pub struct RecordReaper<'a, N: NotificationRepository> {
    notifications: &'a N,
}

impl<'a, N: NotificationRepository> RecordReaper<'a, N> {
    pub fn new(notifications: &'a N) -> Self {
        Self { notifications }
    }

    /// Deletes records already included in an artifact. Only call after the
    /// batch was delivered.
    pub fn reap_delivered(&self) -> RepoResult<usize> {
        let deleted = self
            .notifications
            .delete_where(&NotificationPredicate::Generated)?;
        info!("event=reap module=reaper pass=delivered deleted={deleted}");
        Ok(deleted)
    }

    /// Deletes records whose ticket owner is outside `eligible_orgs`.
    pub fn reap_ineligible(&self, eligible_orgs: &BTreeSet<OrgId>) -> RepoResult<usize> {
        let deleted = self
            .notifications
            .delete_where(&NotificationPredicate::TicketOwnerNotIn(eligible_orgs))?;
        info!("event=reap module=reaper pass=ineligible_owner deleted={deleted}");
        Ok(deleted)
    }
}
