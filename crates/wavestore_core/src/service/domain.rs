//! Domain operations over the window/workspace/tab/block graph.
//!
//! # Responsibility
//! - Create and link workspaces, tabs and blocks.
//! - Track which tab and block each window shows.
//! - Seed the first-run client/window/workspace/tab set.
//!
//! # Invariants
//! - Multi-write operations run in their own nested scope, so a failure
//!   leaves neither rows nor update records behind.
//! - A child is inserted before its parent links it.
//! - Parents only list ids of children that exist.

use crate::model::entity::{
    Block, BlockDef, Client, Point, RuntimeOpts, Tab, UIContext, WinSize, Window, Workspace,
};
use crate::model::oref::ORef;
use crate::model::otype::OType;
use crate::store::accessor::{
    db_count, db_delete, db_get_all, db_insert, db_must_get, db_update,
};
use crate::store::error::{StoreError, StoreResult};
use crate::store::tx::{TxWrap, WaveStore};
use log::info;

pub const DEFAULT_WORKSPACE_NAME: &str = "default";
pub const DEFAULT_TAB_NAME: &str = "Tab-1";
pub const DEFAULT_WINDOW_POS: Point = Point { x: 100, y: 100 };
pub const DEFAULT_WINDOW_SIZE: WinSize = WinSize {
    width: 800,
    height: 600,
};

/// Inserts an empty workspace.
pub fn create_workspace(tx: &mut TxWrap<'_>, name: &str) -> StoreResult<Workspace> {
    let mut workspace = Workspace::new(name);
    db_insert(tx, &mut workspace)?;
    Ok(workspace)
}

/// Creates an empty tab and appends it to `workspace_id`.
pub fn create_tab(tx: &mut TxWrap<'_>, workspace_id: &str, name: &str) -> StoreResult<Tab> {
    tx.with_tx_rtn(|tx| {
        let mut workspace = db_must_get::<Workspace>(tx, workspace_id)?;
        let mut tab = Tab::new(name);
        db_insert(tx, &mut tab)?;
        workspace.tab_ids.push(tab.oid.clone());
        db_update(tx, &mut workspace)?;
        Ok(tab)
    })
}

/// Creates a block from `block_def` and appends it to `tab_id`.
pub fn create_block(
    tx: &mut TxWrap<'_>,
    tab_id: &str,
    block_def: BlockDef,
    runtime_opts: Option<RuntimeOpts>,
) -> StoreResult<Block> {
    tx.with_tx_rtn(|tx| {
        let mut tab = db_must_get::<Tab>(tx, tab_id)?;
        let mut block = Block::new(block_def, runtime_opts);
        db_insert(tx, &mut block)?;
        tab.block_ids.push(block.oid.clone());
        db_update(tx, &mut tab)?;
        Ok(block)
    })
}

/// Unlinks `block_id` from `tab_id` and deletes the block.
///
/// Windows are not scanned; readers tolerate a stale active-block entry.
pub fn delete_block(tx: &mut TxWrap<'_>, tab_id: &str, block_id: &str) -> StoreResult<()> {
    tx.with_tx(|tx| {
        let mut tab = db_must_get::<Tab>(tx, tab_id)?;
        let before = tab.block_ids.len();
        tab.block_ids.retain(|id| id != block_id);
        if tab.block_ids.len() == before {
            return Err(StoreError::NotFound(ORef::new(OType::Block, block_id)));
        }
        db_update(tx, &mut tab)?;
        db_delete::<Block>(tx, block_id)?;
        Ok(())
    })
}

/// Points `window_id` at `tab_id`.
pub fn set_active_tab(tx: &mut TxWrap<'_>, window_id: &str, tab_id: &str) -> StoreResult<()> {
    tx.with_tx(|tx| {
        let mut window = db_must_get::<Window>(tx, window_id)?;
        let tab = db_must_get::<Tab>(tx, tab_id)?;
        window.active_tab_id = tab.oid;
        db_update(tx, &mut window)
    })
}

/// Remembers `block_id` as the active block of `tab_id` in `window_id`.
pub fn set_active_block(
    tx: &mut TxWrap<'_>,
    window_id: &str,
    tab_id: &str,
    block_id: &str,
) -> StoreResult<()> {
    tx.with_tx(|tx| {
        let mut window = db_must_get::<Window>(tx, window_id)?;
        let tab = db_must_get::<Tab>(tx, tab_id)?;
        if !tab.block_ids.iter().any(|id| id == block_id) {
            return Err(StoreError::NotFound(ORef::new(OType::Block, block_id)));
        }
        window
            .active_block_map
            .insert(tab.oid, block_id.to_string());
        db_update(tx, &mut window)
    })
}

/// Returns the client record; the lowest id wins if several exist.
pub fn get_client(tx: &mut TxWrap<'_>) -> StoreResult<Client> {
    db_get_all::<Client>(tx)?
        .into_iter()
        .next()
        .ok_or_else(|| StoreError::NotFound(ORef::new(OType::Client, "")))
}

/// Returns the window id and its active tab.
pub fn get_ui_context(tx: &mut TxWrap<'_>, window_id: &str) -> StoreResult<UIContext> {
    let window = db_must_get::<Window>(tx, window_id)?;
    Ok(UIContext {
        window_id: window.oid,
        active_tab_id: window.active_tab_id,
    })
}

/// Seeds one client, window, workspace and tab unless a client exists.
///
/// Runs untracked: nothing is recorded or published. Returns `true` when
/// data was written.
pub fn ensure_initial_data(store: &WaveStore) -> StoreResult<bool> {
    let seeded = store.with_untracked_tx(|tx| -> StoreResult<Option<Client>> {
        if db_count::<Client>(tx)? > 0 {
            return Ok(None);
        }

        let mut tab = Tab::new(DEFAULT_TAB_NAME);
        db_insert(tx, &mut tab)?;

        let mut workspace = Workspace::new(DEFAULT_WORKSPACE_NAME);
        workspace.tab_ids.push(tab.oid.clone());
        db_insert(tx, &mut workspace)?;

        let mut window = Window::new(
            workspace.oid.as_str(),
            tab.oid.as_str(),
            DEFAULT_WINDOW_POS,
            DEFAULT_WINDOW_SIZE,
        );
        db_insert(tx, &mut window)?;

        let mut client = Client::new(window.oid.as_str());
        db_insert(tx, &mut client)?;
        Ok(Some(client))
    })?;

    match seeded {
        Some(client) => {
            info!(
                "event=initial_data module=service status=seeded client_id={}",
                client.oid
            );
            Ok(true)
        }
        None => {
            info!("event=initial_data module=service status=skipped");
            Ok(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ensure_initial_data, get_client, DEFAULT_WINDOW_POS, DEFAULT_WINDOW_SIZE};
    use crate::model::entity::{Tab, Window, Workspace};
    use crate::store::accessor::{db_get_all, db_must_get};
    use crate::store::error::StoreResult;
    use crate::store::tx::WaveStore;

    #[test]
    fn seeded_graph_is_linked() {
        let store = WaveStore::in_memory().unwrap();
        assert!(ensure_initial_data(&store).unwrap());

        store
            .with_tx(|tx| -> StoreResult<()> {
                let client = get_client(tx)?;
                let window = db_must_get::<Window>(tx, &client.main_window_id)?;
                let workspace = db_must_get::<Workspace>(tx, &window.workspace_id)?;
                let tab = db_must_get::<Tab>(tx, &window.active_tab_id)?;

                assert_eq!(window.pos, DEFAULT_WINDOW_POS);
                assert_eq!(window.win_size, DEFAULT_WINDOW_SIZE);
                assert!(window.active_block_map.is_empty());
                assert_eq!(workspace.name, "default");
                assert_eq!(workspace.tab_ids, vec![tab.oid.clone()]);
                assert_eq!(tab.name, "Tab-1");
                assert!(tab.block_ids.is_empty());
                assert_eq!(db_get_all::<Window>(tx)?.len(), 1);
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn get_client_on_empty_store_is_not_found() {
        let store = WaveStore::in_memory().unwrap();
        let err = store.with_tx_rtn(get_client).unwrap_err();
        assert!(err.is_not_found());
    }
}
