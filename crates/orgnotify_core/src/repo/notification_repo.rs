//! Notification record repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Expose the distinct ticket owners of pending records.
//! - Apply bulk deletions described by [`NotificationPredicate`].
//! - Let rendering collaborators create records and mark them generated.
//!
//! # Invariants
//! - `delete_where` issues exactly one `DELETE` statement; the returned count
//!   covers notification rows only, not cascaded generated_for rows.
//! - Deleting with the same predicate twice removes nothing the second time.

use crate::model::notification::{NotificationId, NotificationRecord};
use crate::model::organization::{validate_org_id, OrgId};
use crate::repo::{ensure_tables, json_id_array, RepoError, RepoResult};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection};
use std::collections::BTreeSet;
use uuid::Uuid;

/// Declarative selection over stored notification records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationPredicate<'a> {
    /// Records whose generated_for set is non-empty.
    Generated,
    /// Records whose ticket owner is outside the given set. An empty set
    /// selects every record.
    TicketOwnerNotIn(&'a BTreeSet<OrgId>),
}

impl NotificationPredicate<'_> {
    fn where_clause(&self) -> RepoResult<(&'static str, Vec<Value>)> {
        match self {
            Self::Generated => Ok((
                "EXISTS (
                    SELECT 1
                    FROM notification_generated_for g
                    WHERE g.notification_uuid = notifications.uuid
                )",
                Vec::new(),
            )),
            Self::TicketOwnerNotIn(owners) => Ok((
                "ticket_owner NOT IN (SELECT value FROM json_each(?))",
                vec![Value::Text(json_id_array(owners.iter())?)],
            )),
        }
    }
}

/// Repository interface for notification records.
pub trait NotificationRepository {
    /// Persists a new record together with its generated_for entries.
    fn create_notification(&self, record: &NotificationRecord) -> RepoResult<NotificationId>;
    /// Loads one record by id.
    fn get_notification(&self, id: NotificationId) -> RepoResult<Option<NotificationRecord>>;
    /// Adds `org_id` to the record's generated_for set.
    fn mark_generated_for(&self, id: NotificationId, org_id: &str) -> RepoResult<()>;
    /// Returns the distinct ticket owners referenced by stored records.
    fn distinct_ticket_owners(&self) -> RepoResult<BTreeSet<OrgId>>;
    /// Counts records matching `predicate`.
    fn count_where(&self, predicate: &NotificationPredicate<'_>) -> RepoResult<usize>;
    /// Deletes records matching `predicate` and returns how many were removed.
    fn delete_where(&self, predicate: &NotificationPredicate<'_>) -> RepoResult<usize>;
}

/// SQLite-backed notification repository.
pub struct SqliteNotificationRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteNotificationRepository<'conn> {
    /// Creates a repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_tables(conn, &["notifications", "notification_generated_for"])?;
        Ok(Self { conn })
    }
}

impl NotificationRepository for SqliteNotificationRepository<'_> {
    fn create_notification(&self, record: &NotificationRecord) -> RepoResult<NotificationId> {
        validate_org_id(&record.ticket_owner)?;
        for org_id in &record.generated_for {
            validate_org_id(org_id)?;
        }

        let uuid = record.uuid.to_string();
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO notifications (uuid, ticket_owner) VALUES (?1, ?2);",
            params![uuid.as_str(), record.ticket_owner.as_str()],
        )?;
        for org_id in &record.generated_for {
            tx.execute(
                "INSERT INTO notification_generated_for (notification_uuid, org_id)
                 VALUES (?1, ?2);",
                params![uuid.as_str(), org_id.as_str()],
            )?;
        }
        tx.commit()?;
        Ok(record.uuid)
    }

    fn get_notification(&self, id: NotificationId) -> RepoResult<Option<NotificationRecord>> {
        let uuid = id.to_string();
        let mut stmt = self.conn.prepare(
            "SELECT n.uuid, n.ticket_owner, g.org_id
             FROM notifications n
             LEFT JOIN notification_generated_for g ON g.notification_uuid = n.uuid
             WHERE n.uuid = ?1
             ORDER BY g.org_id ASC;",
        )?;
        let mut rows = stmt.query([uuid.as_str()])?;

        let mut record: Option<NotificationRecord> = None;
        while let Some(row) = rows.next()? {
            if record.is_none() {
                let uuid_text: String = row.get(0)?;
                record = Some(NotificationRecord {
                    uuid: parse_uuid(&uuid_text)?,
                    ticket_owner: row.get(1)?,
                    generated_for: BTreeSet::new(),
                });
            }
            let org_id: Option<String> = row.get(2)?;
            if let (Some(current), Some(org_id)) = (record.as_mut(), org_id) {
                current.generated_for.insert(org_id);
            }
        }
        Ok(record)
    }

    fn mark_generated_for(&self, id: NotificationId, org_id: &str) -> RepoResult<()> {
        validate_org_id(org_id)?;
        let changed = self.conn.execute(
            "INSERT OR IGNORE INTO notification_generated_for (notification_uuid, org_id)
             SELECT uuid, ?2 FROM notifications WHERE uuid = ?1;",
            params![id.to_string(), org_id],
        )?;
        if changed == 0 && self.get_notification(id)?.is_none() {
            return Err(RepoError::NotFound(id));
        }
        Ok(())
    }

    fn distinct_ticket_owners(&self) -> RepoResult<BTreeSet<OrgId>> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT ticket_owner FROM notifications;")?;
        let mut rows = stmt.query([])?;
        let mut owners = BTreeSet::new();
        while let Some(row) = rows.next()? {
            owners.insert(row.get::<_, String>(0)?);
        }
        Ok(owners)
    }

    fn count_where(&self, predicate: &NotificationPredicate<'_>) -> RepoResult<usize> {
        let (clause, bind_values) = predicate.where_clause()?;
        let sql = format!("SELECT COUNT(*) FROM notifications WHERE {clause};");
        let count: i64 =
            self.conn
                .query_row(&sql, params_from_iter(bind_values), |row| row.get(0))?;
        usize::try_from(count)
            .map_err(|_| RepoError::InvalidData(format!("negative row count `{count}`")))
    }

    fn delete_where(&self, predicate: &NotificationPredicate<'_>) -> RepoResult<usize> {
        let (clause, bind_values) = predicate.where_clause()?;
        let sql = format!("DELETE FROM notifications WHERE {clause};");
        let deleted = self.conn.execute(&sql, params_from_iter(bind_values))?;
        Ok(deleted)
    }
}

fn parse_uuid(value: &str) -> RepoResult<NotificationId> {
    Uuid::parse_str(value).map_err(|_| {
        RepoError::InvalidData(format!("invalid uuid value `{value}` in notifications.uuid"))
    })
}
