//! Object references: the `(otype, oid)` address of every stored object.

use crate::model::otype::{OType, UnknownTypeError};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Value-typed address of one stored object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ORef {
    pub otype: OType,
    pub oid: String,
}

impl ORef {
    pub fn new(otype: OType, oid: impl Into<String>) -> Self {
        Self {
            otype,
            oid: oid.into(),
        }
    }

    /// Parses the `otype:oid` display form.
    pub fn parse(value: &str) -> Result<Self, ORefParseError> {
        let (tag, oid) = value
            .split_once(':')
            .ok_or_else(|| ORefParseError::Malformed(value.to_string()))?;
        if oid.is_empty() {
            return Err(ORefParseError::Malformed(value.to_string()));
        }
        let otype = OType::from_tag(tag).map_err(ORefParseError::UnknownType)?;
        Ok(Self::new(otype, oid))
    }
}

impl Display for ORef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.otype, self.oid)
    }
}

/// Errors from parsing an `otype:oid` string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ORefParseError {
    Malformed(String),
    UnknownType(UnknownTypeError),
}

impl Display for ORefParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Malformed(value) => write!(f, "malformed object reference: {value:?}"),
            Self::UnknownType(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ORefParseError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Malformed(_) => None,
            Self::UnknownType(err) => Some(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ORef, ORefParseError};
    use crate::model::otype::OType;
    use std::collections::HashMap;

    #[test]
    fn display_and_parse_agree() {
        let oref = ORef::new(OType::Tab, "3f2a");
        assert_eq!(oref.to_string(), "tab:3f2a");
        assert_eq!(ORef::parse("tab:3f2a").unwrap(), oref);
    }

    #[test]
    fn parse_rejects_missing_separator_and_empty_id() {
        assert!(matches!(
            ORef::parse("tab"),
            Err(ORefParseError::Malformed(_))
        ));
        assert!(matches!(
            ORef::parse("tab:"),
            Err(ORefParseError::Malformed(_))
        ));
    }

    #[test]
    fn parse_rejects_unknown_tag() {
        assert!(matches!(
            ORef::parse("pane:1"),
            Err(ORefParseError::UnknownType(_))
        ));
    }

    #[test]
    fn equal_refs_hash_to_same_key() {
        let mut map = HashMap::new();
        map.insert(ORef::new(OType::Block, "b1"), 1);
        map.insert(ORef::new(OType::Block, "b1".to_string()), 2);
        map.insert(ORef::new(OType::Tab, "b1"), 3);
        assert_eq!(map.len(), 2);
        assert_eq!(map[&ORef::new(OType::Block, "b1")], 2);
    }
}
