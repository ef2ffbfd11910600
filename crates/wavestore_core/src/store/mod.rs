//! Transactional object store.
//!
//! # Responsibility
//! - Pair substrate transactions with per-call-chain update tracking.
//! - Expose typed accessors that record every mutation.
//! - Deliver committed update sets to registered sinks.
//!
//! # Invariants
//! - All mutations go through `accessor`, so every change is recorded.
//! - Update contexts are owned by one call chain and never shared.

pub mod accessor;
pub mod broadcast;
pub mod context;
pub mod error;
pub mod tx;

pub use accessor::{
    db_count, db_delete, db_get, db_get_all, db_get_oref, db_insert, db_must_get, db_tombstones,
    db_update,
};
pub use broadcast::{ChannelSink, UpdateBus, UpdateBusError, UpdateSink};
pub use context::UpdateContext;
pub use error::{StoreError, StoreResult, TxDisciplineError};
pub use tx::{TxWrap, WaveStore};
