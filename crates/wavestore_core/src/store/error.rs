//! Error taxonomy surfaced by the store, accessors and domain operations.

use crate::config::ConfigError;
use crate::db::DbError;
use crate::model::oref::ORef;
use crate::model::otype::UnknownTypeError;
use crate::repo::object_repo::RepoError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type StoreResult<T> = Result<T, StoreError>;

/// Misuse of update-context scopes.
///
/// Never produced by the transaction wrapper itself; it only arises when
/// scopes are driven by hand past the base frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxDisciplineError {
    NoScopeToCommit,
    NoScopeToRollback,
}

impl Display for TxDisciplineError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoScopeToCommit => write!(f, "no updates transaction to commit"),
            Self::NoScopeToRollback => write!(f, "no updates transaction to rollback"),
        }
    }
}

impl Error for TxDisciplineError {}

/// Errors from store operations.
#[derive(Debug)]
pub enum StoreError {
    /// Referenced object does not exist.
    NotFound(ORef),
    /// Insert collided with an existing object.
    DuplicateKey(ORef),
    /// Update was based on a stale version.
    VersionConflict {
        oref: ORef,
        expected: i64,
        actual: i64,
    },
    /// A type tag outside the registry reached the store.
    UnknownType(UnknownTypeError),
    /// Update-context scopes were closed out of order.
    TxDiscipline(TxDisciplineError),
    /// Substrate failure.
    Repo(RepoError),
    /// Object body could not be encoded or decoded.
    Serialization(serde_json::Error),
    /// Store settings were rejected at open.
    Config(ConfigError),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(oref) => write!(f, "{} not found: {:?}", oref.otype, oref.oid),
            Self::DuplicateKey(oref) => write!(f, "object already exists: {oref}"),
            Self::VersionConflict {
                oref,
                expected,
                actual,
            } => write!(
                f,
                "version conflict for {oref}: expected {expected}, stored {actual}"
            ),
            Self::UnknownType(err) => write!(f, "{err}"),
            Self::TxDiscipline(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::Serialization(err) => write!(f, "object serialization failed: {err}"),
            Self::Config(err) => write!(f, "invalid store config: {err}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::UnknownType(err) => Some(err),
            Self::TxDiscipline(err) => Some(err),
            Self::Repo(err) => Some(err),
            Self::Serialization(err) => Some(err),
            Self::Config(err) => Some(err),
            Self::NotFound(_) | Self::DuplicateKey(_) | Self::VersionConflict { .. } => None,
        }
    }
}

impl From<RepoError> for StoreError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(oref) => Self::NotFound(oref),
            RepoError::DuplicateKey(oref) => Self::DuplicateKey(oref),
            RepoError::VersionConflict {
                oref,
                expected,
                actual,
            } => Self::VersionConflict {
                oref,
                expected,
                actual,
            },
            other => Self::Repo(other),
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Repo(RepoError::Db(value))
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Repo(RepoError::from(value))
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization(value)
    }
}

impl From<UnknownTypeError> for StoreError {
    fn from(value: UnknownTypeError) -> Self {
        Self::UnknownType(value)
    }
}

impl From<ConfigError> for StoreError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<TxDisciplineError> for StoreError {
    fn from(value: TxDisciplineError) -> Self {
        Self::TxDiscipline(value)
    }
}

#[cfg(test)]
mod tests {
    use super::StoreError;
    use crate::model::oref::ORef;
    use crate::model::otype::OType;
    use crate::repo::object_repo::RepoError;

    #[test]
    fn semantic_repo_errors_are_lifted() {
        let oref = ORef::new(OType::Tab, "t1");
        let err = StoreError::from(RepoError::NotFound(oref.clone()));
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "tab not found: \"t1\"");

        let err = StoreError::from(RepoError::DuplicateKey(oref));
        assert!(matches!(err, StoreError::DuplicateKey(_)));

        let err = StoreError::from(RepoError::InvalidData("bad".to_string()));
        assert!(matches!(err, StoreError::Repo(RepoError::InvalidData(_))));
    }
}
