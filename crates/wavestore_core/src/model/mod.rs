//! Object model for persisted UI/session state.
//!
//! # Responsibility
//! - Define the closed set of stored kinds and their record shapes.
//! - Define object references and the update/tombstone records built on them.
//!
//! # Invariants
//! - Every stored object is addressed by exactly one `ORef`.
//! - Deletion is announced through `UpdateType::Delete` records and persisted
//!   as tombstones.

pub mod entity;
pub mod oref;
pub mod otype;
pub mod update;
