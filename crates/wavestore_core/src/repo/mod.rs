//! Repository layer over the SQLite substrate.
//!
//! # Responsibility
//! - Define the untyped row contract the accessor layer is built on.
//! - Isolate SQL text from typed access and domain orchestration.
//!
//! # Invariants
//! - Repository APIs return semantic errors (`NotFound`, `DuplicateKey`,
//!   `VersionConflict`) in addition to DB transport errors.

pub mod object_repo;
