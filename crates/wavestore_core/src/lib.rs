//! Versioned object store for windows, workspaces, tabs and blocks.
//! Every committed mutation is reported as an update record.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod store;

pub use config::{ConfigError, StoreConfig};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::entity::{
    AnyWaveObj, Block, BlockDef, Client, FileDef, MetaMap, Point, RuntimeOpts, Tab, TermSize,
    UIContext, WaveObj, WinSize, Window, Workspace,
};
pub use model::oref::{ORef, ORefParseError};
pub use model::otype::{OType, UnknownTypeError};
pub use model::update::{UpdateType, WaveObjTombstone, WaveObjUpdate};
pub use repo::object_repo::{ObjectRepository, RepoError, RepoResult, SqliteObjectRepository};
pub use service::WaveService;
pub use store::{
    ChannelSink, StoreError, StoreResult, TxDisciplineError, TxWrap, UpdateBus, UpdateBusError,
    UpdateSink, WaveStore,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
