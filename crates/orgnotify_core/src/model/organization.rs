//! Organization domain model.
//!
//! # Responsibility
//! - Describe one organization, its report subscriptions and its children.
//! - Validate identifiers before they reach the store.

use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Opaque organization identifier (for example `"DHS"` or `"ACME-CORP"`).
pub type OrgId = String;

/// Report-type marker subscribed to by organizations in the notification
/// program.
pub const DEFAULT_REPORT_TYPE: &str = "CYHY";

/// Validation failure for organization data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrganizationValidationError {
    /// Identifier is empty after trimming.
    EmptyId,
    /// Identifier carries leading or trailing whitespace.
    UntrimmedId(String),
    /// A report type entry is empty.
    EmptyReportType(OrgId),
    /// A child identifier is empty.
    EmptyChildId(OrgId),
}

impl Display for OrganizationValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyId => write!(f, "organization id cannot be empty"),
            Self::UntrimmedId(id) => {
                write!(f, "organization id `{id}` has surrounding whitespace")
            }
            Self::EmptyReportType(id) => {
                write!(f, "organization `{id}` declares an empty report type")
            }
            Self::EmptyChildId(id) => write!(f, "organization `{id}` lists an empty child id"),
        }
    }
}

impl Error for OrganizationValidationError {}

/// One organization as stored in the request collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Organization {
    pub id: OrgId,
    /// Report programs this organization is subscribed to.
    pub report_types: BTreeSet<String>,
    /// Direct children; a parent is any organization listing this one here.
    pub children: BTreeSet<OrgId>,
}

impl Organization {
    pub fn new(id: impl Into<OrgId>) -> Self {
        Self {
            id: id.into(),
            report_types: BTreeSet::new(),
            children: BTreeSet::new(),
        }
    }

    /// Adds a report-type subscription.
    pub fn with_report_type(mut self, report_type: impl Into<String>) -> Self {
        self.report_types.insert(report_type.into());
        self
    }

    /// Adds a direct child organization.
    pub fn with_child(mut self, child: impl Into<OrgId>) -> Self {
        self.children.insert(child.into());
        self
    }

    /// Returns whether the organization subscribes to `report_type`.
    pub fn subscribes_to(&self, report_type: &str) -> bool {
        self.report_types.contains(report_type)
    }

    pub fn validate(&self) -> Result<(), OrganizationValidationError> {
        validate_org_id(&self.id)?;
        if self.report_types.iter().any(|kind| kind.trim().is_empty()) {
            return Err(OrganizationValidationError::EmptyReportType(
                self.id.clone(),
            ));
        }
        if self.children.iter().any(|child| child.trim().is_empty()) {
            return Err(OrganizationValidationError::EmptyChildId(self.id.clone()));
        }
        Ok(())
    }
}

/// Checks that `id` is usable as an organization key.
pub fn validate_org_id(id: &str) -> Result<(), OrganizationValidationError> {
    if id.trim().is_empty() {
        return Err(OrganizationValidationError::EmptyId);
    }
    if id.trim() != id {
        return Err(OrganizationValidationError::UntrimmedId(id.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{validate_org_id, Organization, OrganizationValidationError};

    #[test]
    fn builder_collects_report_types_and_children() {
        let org = Organization::new("PARENT")
            .with_report_type("CYHY")
            .with_child("CHILD-A")
            .with_child("CHILD-A");
        assert!(org.subscribes_to("CYHY"));
        assert!(!org.subscribes_to("PHISHING"));
        assert_eq!(org.children.len(), 1);
        assert!(org.validate().is_ok());
    }

    #[test]
    fn validate_rejects_blank_and_untrimmed_ids() {
        assert_eq!(
            validate_org_id("  "),
            Err(OrganizationValidationError::EmptyId)
        );
        assert!(matches!(
            validate_org_id(" ORG"),
            Err(OrganizationValidationError::UntrimmedId(_))
        ));
    }

    #[test]
    fn validate_rejects_empty_child() {
        let org = Organization::new("ORG").with_child("");
        assert!(matches!(
            org.validate(),
            Err(OrganizationValidationError::EmptyChildId(_))
        ));
    }
}
