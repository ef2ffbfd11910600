//! Closed registry of stored object types.
//!
//! # Responsibility
//! - Map each entity kind to its short type tag and backing table.
//! - Reject tags that do not name a known kind.
//!
//! # Invariants
//! - `OType::ALL` is the complete, fixed set of stored kinds.
//! - `as_str` and `from_tag` are exact inverses.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Tag for every kind of object the store can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OType {
    Client,
    Window,
    Workspace,
    Tab,
    Block,
}

impl OType {
    /// Every registered kind, in schema creation order.
    pub const ALL: [OType; 5] = [
        OType::Client,
        OType::Window,
        OType::Workspace,
        OType::Tab,
        OType::Block,
    ];

    /// Short tag carried next to every stored and transmitted object.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Client => "client",
            Self::Window => "window",
            Self::Workspace => "workspace",
            Self::Tab => "tab",
            Self::Block => "block",
        }
    }

    /// Resolves a tag string back to its kind.
    ///
    /// # Errors
    /// - Returns `UnknownTypeError` when `tag` names no registered kind.
    pub fn from_tag(tag: &str) -> Result<Self, UnknownTypeError> {
        match tag {
            "client" => Ok(Self::Client),
            "window" => Ok(Self::Window),
            "workspace" => Ok(Self::Workspace),
            "tab" => Ok(Self::Tab),
            "block" => Ok(Self::Block),
            other => Err(UnknownTypeError(other.to_string())),
        }
    }

    pub(crate) fn table_name(self) -> &'static str {
        match self {
            Self::Client => "db_client",
            Self::Window => "db_window",
            Self::Workspace => "db_workspace",
            Self::Tab => "db_tab",
            Self::Block => "db_block",
        }
    }
}

impl Display for OType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OType {
    type Err = UnknownTypeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::from_tag(value)
    }
}

/// A type tag that is not part of the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownTypeError(pub String);

impl Display for UnknownTypeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown object type: {:?}", self.0)
    }
}

impl Error for UnknownTypeError {}
