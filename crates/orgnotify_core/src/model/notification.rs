//! Pending notification record model.
//!
//! # Invariants
//! - Every record belongs to exactly one ticket owner.
//! - A non-empty `generated_for` set means the renderer already placed the
//!   record into an artifact; such records are reaped after delivery.

use crate::model::organization::OrgId;
use std::collections::BTreeSet;
use uuid::Uuid;

/// Stable notification record identifier.
pub type NotificationId = Uuid;

/// One pending notification as persisted in the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationRecord {
    pub uuid: NotificationId,
    /// Organization the underlying ticket is attributed to.
    pub ticket_owner: OrgId,
    /// Organizations whose artifact included this record.
    pub generated_for: BTreeSet<OrgId>,
}

impl NotificationRecord {
    /// Creates a fresh, not yet rendered record for `ticket_owner`.
    pub fn new(ticket_owner: impl Into<OrgId>) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            ticket_owner: ticket_owner.into(),
            generated_for: BTreeSet::new(),
        }
    }

    /// Returns whether the renderer has already included this record.
    pub fn is_generated(&self) -> bool {
        !self.generated_for.is_empty()
    }
}
