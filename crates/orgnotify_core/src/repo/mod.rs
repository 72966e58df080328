//! Store contracts and SQLite implementations.
//!
//! # Responsibility
//! - Define the queries the notification pipeline issues against the store.
//! - Keep SQL details out of the resolver, generator and reaper services.
//!
//! # Invariants
//! - Bulk deletions are single declarative statements, never per-record
//!   loops, so concurrent writers cannot interleave with a half-applied
//!   cleanup.
//! - Repository constructors verify the schema before returning.

use crate::db::DbError;
use crate::model::notification::NotificationId;
use crate::model::organization::OrganizationValidationError;
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod notification_repo;
pub mod org_repo;

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error shared by organization and notification stores.
#[derive(Debug)]
pub enum RepoError {
    Validation(OrganizationValidationError),
    Db(DbError),
    NotFound(NotificationId),
    /// Connection was not migrated to the notification schema.
    MissingRequiredTable(&'static str),
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "notification not found: {id}"),
            Self::MissingRequiredTable(table) => {
                write!(f, "store is missing required table `{table}`")
            }
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::NotFound(_) | Self::MissingRequiredTable(_) | Self::InvalidData(_) => None,
        }
    }
}

impl From<OrganizationValidationError> for RepoError {
    fn from(value: OrganizationValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<serde_json::Error> for RepoError {
    fn from(value: serde_json::Error) -> Self {
        Self::InvalidData(format!("cannot encode query parameter: {value}"))
    }
}

fn ensure_tables(conn: &Connection, tables: &[&'static str]) -> RepoResult<()> {
    for table in tables {
        let exists: i64 = conn.query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table],
            |row| row.get(0),
        )?;
        if exists != 1 {
            return Err(RepoError::MissingRequiredTable(*table));
        }
    }
    Ok(())
}

/// Encodes an id set as a JSON array bound to a single `json_each(?)`
/// parameter, which keeps set-membership queries free of placeholder limits.
fn json_id_array<'a>(ids: impl IntoIterator<Item = &'a String>) -> RepoResult<String> {
    let ids: Vec<&String> = ids.into_iter().collect();
    Ok(serde_json::to_string(&ids)?)
}
