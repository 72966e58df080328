//! Organization repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Look up organizations by id set and by child membership, filtered by a
//!   report-type marker.
//! - Persist organizations with their subscriptions and children.
//!
//! # Invariants
//! - `upsert_organization` replaces report types and children atomically.
//! - Query results are sets; duplicate rows are collapsed.

use crate::model::organization::{OrgId, Organization};
use crate::repo::{ensure_tables, json_id_array, RepoResult};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeSet;

/// Repository interface for organization lookups.
pub trait OrganizationRepository {
    /// Inserts or fully replaces one organization.
    fn upsert_organization(&self, org: &Organization) -> RepoResult<()>;
    /// Loads one organization by id.
    fn get_organization(&self, id: &str) -> RepoResult<Option<Organization>>;
    /// Returns the members of `ids` that subscribe to `report_type`.
    fn find_subscribed(
        &self,
        ids: &BTreeSet<OrgId>,
        report_type: &str,
    ) -> RepoResult<BTreeSet<OrgId>>;
    /// Returns organizations subscribed to `report_type` that list `child`
    /// among their children.
    fn find_subscribed_parents(
        &self,
        child: &str,
        report_type: &str,
    ) -> RepoResult<BTreeSet<OrgId>>;
}

/// SQLite-backed organization repository.
pub struct SqliteOrganizationRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteOrganizationRepository<'conn> {
    /// Creates a repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_tables(
            conn,
            &[
                "organizations",
                "organization_report_types",
                "organization_children",
            ],
        )?;
        Ok(Self { conn })
    }
}

impl OrganizationRepository for SqliteOrganizationRepository<'_> {
    fn upsert_organization(&self, org: &Organization) -> RepoResult<()> {
        org.validate()?;

        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT OR IGNORE INTO organizations (id) VALUES (?1);",
            [org.id.as_str()],
        )?;
        tx.execute(
            "DELETE FROM organization_report_types WHERE org_id = ?1;",
            [org.id.as_str()],
        )?;
        tx.execute(
            "DELETE FROM organization_children WHERE parent_id = ?1;",
            [org.id.as_str()],
        )?;
        for report_type in &org.report_types {
            tx.execute(
                "INSERT INTO organization_report_types (org_id, report_type) VALUES (?1, ?2);",
                params![org.id.as_str(), report_type.as_str()],
            )?;
        }
        for child in &org.children {
            tx.execute(
                "INSERT INTO organization_children (parent_id, child_id) VALUES (?1, ?2);",
                params![org.id.as_str(), child.as_str()],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn get_organization(&self, id: &str) -> RepoResult<Option<Organization>> {
        let found: Option<String> = self
            .conn
            .query_row(
                "SELECT id FROM organizations WHERE id = ?1;",
                [id],
                |row| row.get(0),
            )
            .optional()?;
        let Some(id) = found else {
            return Ok(None);
        };

        let report_types = collect_strings(
            self.conn,
            "SELECT report_type FROM organization_report_types WHERE org_id = ?1;",
            &id,
        )?;
        let children = collect_strings(
            self.conn,
            "SELECT child_id FROM organization_children WHERE parent_id = ?1;",
            &id,
        )?;
        Ok(Some(Organization {
            id,
            report_types,
            children,
        }))
    }

    fn find_subscribed(
        &self,
        ids: &BTreeSet<OrgId>,
        report_type: &str,
    ) -> RepoResult<BTreeSet<OrgId>> {
        if ids.is_empty() {
            return Ok(BTreeSet::new());
        }

        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT rt.org_id
             FROM organization_report_types rt
             WHERE rt.report_type = ?2
               AND rt.org_id IN (SELECT value FROM json_each(?1));",
        )?;
        let mut rows = stmt.query(params![json_id_array(ids)?, report_type])?;
        let mut found = BTreeSet::new();
        while let Some(row) = rows.next()? {
            found.insert(row.get::<_, String>(0)?);
        }
        Ok(found)
    }

    fn find_subscribed_parents(
        &self,
        child: &str,
        report_type: &str,
    ) -> RepoResult<BTreeSet<OrgId>> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT c.parent_id
             FROM organization_children c
             INNER JOIN organization_report_types rt ON rt.org_id = c.parent_id
             WHERE c.child_id = ?1
               AND rt.report_type = ?2;",
        )?;
        let mut rows = stmt.query(params![child, report_type])?;
        let mut parents = BTreeSet::new();
        while let Some(row) = rows.next()? {
            parents.insert(row.get::<_, String>(0)?);
        }
        Ok(parents)
    }
}

fn collect_strings(conn: &Connection, sql: &str, key: &str) -> RepoResult<BTreeSet<String>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query([key])?;
    let mut values = BTreeSet::new();
    while let Some(row) = rows.next()? {
        values.insert(row.get::<_, String>(0)?);
    }
    Ok(values)
}
