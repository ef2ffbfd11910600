//! Object repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide get/insert/update/delete/count over untyped object rows.
//! - Keep SQL details inside the persistence boundary.
//!
//! # Invariants
//! - One table per `OType`, keyed by `oid`.
//! - `update_record` only succeeds when the stored version equals the
//!   caller's expected version.
//! - Read paths reject rows whose body cannot be decoded as JSON.

use crate::db::migrations::{current_user_version, latest_version};
use crate::db::DbError;
use crate::model::oref::ORef;
use crate::model::otype::OType;
use crate::model::update::WaveObjTombstone;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RepoResult<T> = Result<T, RepoError>;

/// Errors from object row persistence.
#[derive(Debug)]
pub enum RepoError {
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// No row exists for the reference.
    NotFound(ORef),
    /// A row already exists for the reference.
    DuplicateKey(ORef),
    /// Stored version differs from the expected one.
    VersionConflict {
        oref: ORef,
        expected: i64,
        actual: i64,
    },
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Persisted data cannot be converted to a valid record.
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(oref) => write!(f, "object not found: {oref}"),
            Self::DuplicateKey(oref) => write!(f, "object already exists: {oref}"),
            Self::VersionConflict {
                oref,
                expected,
                actual,
            } => write!(
                f,
                "version conflict for {oref}: expected {expected}, stored {actual}"
            ),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "object repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::InvalidData(message) => write!(f, "invalid persisted object data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
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

/// One persisted object row.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    pub oref: ORef,
    pub version: i64,
    /// Full JSON body of the object.
    pub data: Value,
}

/// Repository interface for object rows.
pub trait ObjectRepository {
    /// Loads one row, `None` when absent.
    fn get_record(&self, oref: &ORef) -> RepoResult<Option<StoredRecord>>;
    /// Inserts a new row; `DuplicateKey` when the reference is taken.
    fn insert_record(&self, record: &StoredRecord) -> RepoResult<()>;
    /// Replaces a row whose stored version equals `expected_version`.
    fn update_record(&self, record: &StoredRecord, expected_version: i64) -> RepoResult<()>;
    /// Deletes a row, returning whether one existed.
    fn delete_record(&self, oref: &ORef) -> RepoResult<bool>;
    /// Counts rows of one kind.
    fn count_records(&self, otype: OType) -> RepoResult<u64>;
    /// Lists all rows of one kind ordered by `oid`.
    fn list_records(&self, otype: OType) -> RepoResult<Vec<StoredRecord>>;
    /// Records that an object was deleted.
    fn insert_tombstone(&self, tombstone: &WaveObjTombstone) -> RepoResult<()>;
    /// Lists tombstones, optionally restricted to one kind.
    fn list_tombstones(&self, otype: Option<OType>) -> RepoResult<Vec<WaveObjTombstone>>;
}

/// SQLite-backed object repository.
#[derive(Clone, Copy)]
pub struct SqliteObjectRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteObjectRepository<'conn> {
    /// Creates a repository after checking the connection is migrated.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        let expected_version = latest_version();
        let actual_version = current_user_version(conn)?;
        if actual_version != expected_version {
            return Err(RepoError::UninitializedConnection {
                expected_version,
                actual_version,
            });
        }
        Ok(Self { conn })
    }

    /// Creates a repository over a connection already known to be migrated.
    pub(crate) fn new_unchecked(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl ObjectRepository for SqliteObjectRepository<'_> {
    fn get_record(&self, oref: &ORef) -> RepoResult<Option<StoredRecord>> {
        let row: Option<(i64, String)> = self
            .conn
            .query_row(
                &format!(
                    "SELECT version, data FROM {} WHERE oid = ?1;",
                    oref.otype.table_name()
                ),
                [oref.oid.as_str()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        match row {
            None => Ok(None),
            Some((version, data)) => Ok(Some(StoredRecord {
                oref: oref.clone(),
                version,
                data: parse_body(&data, oref)?,
            })),
        }
    }

    fn insert_record(&self, record: &StoredRecord) -> RepoResult<()> {
        let result = self.conn.execute(
            &format!(
                "INSERT INTO {} (oid, version, data) VALUES (?1, ?2, ?3);",
                record.oref.otype.table_name()
            ),
            params![
                record.oref.oid.as_str(),
                record.version,
                record.data.to_string()
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == ErrorCode::ConstraintViolation =>
            {
                Err(RepoError::DuplicateKey(record.oref.clone()))
            }
            Err(err) => Err(err.into()),
        }
    }

    fn update_record(&self, record: &StoredRecord, expected_version: i64) -> RepoResult<()> {
        let table = record.oref.otype.table_name();
        let changed = self.conn.execute(
            &format!("UPDATE {table} SET version = ?2, data = ?3 WHERE oid = ?1 AND version = ?4;"),
            params![
                record.oref.oid.as_str(),
                record.version,
                record.data.to_string(),
                expected_version,
            ],
        )?;
        if changed > 0 {
            return Ok(());
        }

        let actual: Option<i64> = self
            .conn
            .query_row(
                &format!("SELECT version FROM {table} WHERE oid = ?1;"),
                [record.oref.oid.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        match actual {
            None => Err(RepoError::NotFound(record.oref.clone())),
            Some(actual) => Err(RepoError::VersionConflict {
                oref: record.oref.clone(),
                expected: expected_version,
                actual,
            }),
        }
    }

    fn delete_record(&self, oref: &ORef) -> RepoResult<bool> {
        let changed = self.conn.execute(
            &format!("DELETE FROM {} WHERE oid = ?1;", oref.otype.table_name()),
            [oref.oid.as_str()],
        )?;
        Ok(changed > 0)
    }

    fn count_records(&self, otype: OType) -> RepoResult<u64> {
        let count: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {};", otype.table_name()),
            [],
            |row| row.get(0),
        )?;
        u64::try_from(count)
            .map_err(|_| RepoError::InvalidData(format!("negative row count {count}")))
    }

    fn list_records(&self, otype: OType) -> RepoResult<Vec<StoredRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT oid, version, data FROM {} ORDER BY oid ASC;",
            otype.table_name()
        ))?;
        let mut rows = stmt.query([])?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            let oref = ORef::new(otype, row.get::<_, String>(0)?);
            let data: String = row.get(2)?;
            records.push(StoredRecord {
                data: parse_body(&data, &oref)?,
                version: row.get(1)?,
                oref,
            });
        }
        Ok(records)
    }

    fn insert_tombstone(&self, tombstone: &WaveObjTombstone) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO db_tombstone (otype, oid)
             VALUES (?1, ?2)
             ON CONFLICT(otype, oid) DO UPDATE
             SET deleted_at = (strftime('%s', 'now') * 1000);",
            params![tombstone.otype.as_str(), tombstone.oid.as_str()],
        )?;
        Ok(())
    }

    fn list_tombstones(&self, otype: Option<OType>) -> RepoResult<Vec<WaveObjTombstone>> {
        let mut stmt = self.conn.prepare(
            "SELECT otype, oid
             FROM db_tombstone
             WHERE (?1 IS NULL OR otype = ?1)
             ORDER BY deleted_at ASC, otype ASC, oid ASC;",
        )?;
        let mut rows = stmt.query([otype.map(OType::as_str)])?;
        let mut tombstones = Vec::new();
        while let Some(row) = rows.next()? {
            let tag: String = row.get(0)?;
            let otype = OType::from_tag(&tag).map_err(|err| {
                RepoError::InvalidData(format!("{err} in db_tombstone.otype"))
            })?;
            tombstones.push(WaveObjTombstone {
                otype,
                oid: row.get(1)?,
            });
        }
        Ok(tombstones)
    }
}

fn parse_body(data: &str, oref: &ORef) -> RepoResult<Value> {
    serde_json::from_str(data).map_err(|err| {
        RepoError::InvalidData(format!(
            "invalid json body for {oref} in {}: {err}",
            oref.otype.table_name()
        ))
    })
}
