//! Organization resolution for a notification run.
//!
//! # Responsibility
//! - Derive the seed set: ticket owners of stored notifications that
//!   subscribe to the run's report type.
//! - Extend the seeds with every subscribed ancestor, at any depth.
//!
//! # Invariants
//! - Traversal keeps a visited set, so cyclic parent links terminate and
//!   each organization is expanded at most once.
//! - The result only contains seeds and organizations reachable from a seed
//!   through subscribed-parent edges.

use crate::model::organization::OrgId;
use crate::repo::notification_repo::NotificationRepository;
use crate::repo::org_repo::OrganizationRepository;
use crate::repo::RepoResult;
use log::debug;
use std::collections::BTreeSet;

/// Resolves the organizations owed a notification artifact.
pub struct OrgResolver<'a, O: OrganizationRepository, N: NotificationRepository> {
    organizations: &'a O,
    notifications: &'a N,
    report_type: &'a str,
}

impl<'a, O: OrganizationRepository, N: NotificationRepository> OrgResolver<'a, O, N> {
    pub fn new(organizations: &'a O, notifications: &'a N, report_type: &'a str) -> Self {
        Self {
            organizations,
            notifications,
            report_type,
        }
    }

    /// Returns the seed set united with its ancestor closure.
    pub fn resolve(&self) -> RepoResult<BTreeSet<OrgId>> {
        let seeds = self.seed_set()?;
        let resolved = self.ancestor_closure(&seeds)?;
        debug!(
            "event=orgs_resolved module=resolver seeds={} resolved={}",
            seeds.len(),
            resolved.len()
        );
        Ok(resolved)
    }

    /// Ticket owners of stored notifications that carry the report type.
    pub fn seed_set(&self) -> RepoResult<BTreeSet<OrgId>> {
        let owners = self.notifications.distinct_ticket_owners()?;
        self.organizations.find_subscribed(&owners, self.report_type)
    }

    /// Returns `seeds` plus all subscribed ancestors of any seed.
    pub fn ancestor_closure(&self, seeds: &BTreeSet<OrgId>) -> RepoResult<BTreeSet<OrgId>> {
        let mut visited = seeds.clone();
        let mut pending: Vec<OrgId> = seeds.iter().cloned().collect();

        while let Some(org_id) = pending.pop() {
            for parent in self
                .organizations
                .find_subscribed_parents(&org_id, self.report_type)?
            {
                if visited.insert(parent.clone()) {
                    debug!(
                        "event=parent_found module=resolver org_id={org_id} parent_id={parent}"
                    );
                    pending.push(parent);
                }
            }
        }

        Ok(visited)
    }
}
