//! Request-handler facade over the domain operations.
//!
//! # Responsibility
//! - Run each domain operation as one outermost transaction.
//! - Let committed updates reach the store's sinks.
//!
//! # Invariants
//! - Every call is atomic: on error the store is unchanged and nothing is
//!   published.

use crate::model::entity::{Block, BlockDef, Client, RuntimeOpts, Tab, UIContext, Workspace};
use crate::service::domain;
use crate::store::error::StoreResult;
use crate::store::tx::WaveStore;
use std::sync::Arc;

/// Use-case service shared by request handlers.
#[derive(Clone)]
pub struct WaveService {
    store: Arc<WaveStore>,
}

impl WaveService {
    pub fn new(store: Arc<WaveStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &WaveStore {
        &self.store
    }

    /// Seeds first-run data; `true` when anything was written.
    pub fn ensure_initial_data(&self) -> StoreResult<bool> {
        domain::ensure_initial_data(&self.store)
    }

    pub fn create_workspace(&self, name: &str) -> StoreResult<Workspace> {
        self.store.with_tx_rtn(|tx| domain::create_workspace(tx, name))
    }

    pub fn create_tab(&self, workspace_id: &str, name: &str) -> StoreResult<Tab> {
        self.store
            .with_tx_rtn(|tx| domain::create_tab(tx, workspace_id, name))
    }

    pub fn create_block(
        &self,
        tab_id: &str,
        block_def: BlockDef,
        runtime_opts: Option<RuntimeOpts>,
    ) -> StoreResult<Block> {
        self.store
            .with_tx_rtn(|tx| domain::create_block(tx, tab_id, block_def, runtime_opts))
    }

    pub fn delete_block(&self, tab_id: &str, block_id: &str) -> StoreResult<()> {
        self.store
            .with_tx(|tx| domain::delete_block(tx, tab_id, block_id))
    }

    pub fn set_active_tab(&self, window_id: &str, tab_id: &str) -> StoreResult<()> {
        self.store
            .with_tx(|tx| domain::set_active_tab(tx, window_id, tab_id))
    }

    pub fn set_active_block(
        &self,
        window_id: &str,
        tab_id: &str,
        block_id: &str,
    ) -> StoreResult<()> {
        self.store
            .with_tx(|tx| domain::set_active_block(tx, window_id, tab_id, block_id))
    }

    pub fn get_client(&self) -> StoreResult<Client> {
        self.store.with_tx_rtn(domain::get_client)
    }

    /// UI context of the client's main window.
    pub fn get_ui_context(&self) -> StoreResult<UIContext> {
        self.store.with_tx_rtn(|tx| {
            let client = domain::get_client(tx)?;
            domain::get_ui_context(tx, &client.main_window_id)
        })
    }
}
