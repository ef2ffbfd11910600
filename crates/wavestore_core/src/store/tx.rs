//! Transaction scopes pairing substrate transactions with update tracking.
//!
//! # Responsibility
//! - Open the outermost SQLite transaction for one call chain and deliver its
//!   committed update set to the registered sinks.
//! - Open nested scopes as savepoints plus update-context frames.
//!
//! # Invariants
//! - Every scope opened here is closed exactly once: released and committed
//!   on `Ok`, rolled back on `Err` or panic.
//! - A rolled-back scope leaves neither substrate rows nor update records.
//! - Sinks are invoked only after the outermost commit, with the connection
//!   lock released.

use crate::config::StoreConfig;
use crate::db::{open_db, open_db_in_memory};
use crate::model::oref::ORef;
use crate::model::update::WaveObjUpdate;
use crate::repo::object_repo::SqliteObjectRepository;
use crate::store::broadcast::UpdateBus;
use crate::store::context::UpdateContext;
use crate::store::error::{StoreError, StoreResult};
use log::{debug, error, info, log_enabled, warn, Level};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Handle threaded through every accessor and domain call of one call chain.
///
/// Owns the chain's update context (absent for untracked bootstrap work) and
/// borrows the connection inside the chain's outermost transaction.
pub struct TxWrap<'conn> {
    conn: &'conn Connection,
    updates: Option<UpdateContext>,
    savepoint_depth: usize,
    /// Versions written per open scope, innermost last.
    written: Vec<HashMap<ORef, VersionSpan>>,
    /// Versions undone by rolled-back scopes, still held by caller values.
    rolled_back: HashMap<ORef, VersionSpan>,
}

/// Stored version before a scope's first write to an object, and after its last.
#[derive(Debug, Clone, Copy)]
struct VersionSpan {
    base: i64,
    latest: i64,
}

impl<'conn> TxWrap<'conn> {
    fn tracked(conn: &'conn Connection) -> Self {
        Self {
            conn,
            updates: Some(UpdateContext::new()),
            savepoint_depth: 0,
            written: Vec::new(),
            rolled_back: HashMap::new(),
        }
    }

    fn untracked(conn: &'conn Connection) -> Self {
        Self {
            conn,
            updates: None,
            savepoint_depth: 0,
            written: Vec::new(),
            rolled_back: HashMap::new(),
        }
    }

    /// Returns `true` when mutations on this handle are recorded.
    pub fn is_tracked(&self) -> bool {
        self.updates.is_some()
    }

    /// Number of open nested scopes.
    pub fn scope_depth(&self) -> usize {
        self.savepoint_depth
    }

    pub(crate) fn repo(&self) -> SqliteObjectRepository<'conn> {
        SqliteObjectRepository::new_unchecked(self.conn)
    }

    /// Version the substrate should hold for a caller value at `version`.
    ///
    /// A value updated inside a scope that later rolled back still carries the
    /// undone version; it maps back to the version the rollback restored.
    pub(crate) fn expected_version(&self, oref: &ORef, version: i64) -> i64 {
        match self.rolled_back.get(oref) {
            Some(span) if span.latest == version => span.base,
            _ => version,
        }
    }

    /// Notes that this chain moved `oref` from version `from` to `to`.
    pub(crate) fn note_version_write(&mut self, oref: &ORef, from: i64, to: i64) {
        self.rolled_back.remove(oref);
        if let Some(top) = self.written.last_mut() {
            top.entry(oref.clone())
                .or_insert(VersionSpan {
                    base: from,
                    latest: from,
                })
                .latest = to;
        }
    }

    /// Records `update` in the innermost scope; no-op when untracked.
    pub fn record_update(&mut self, update: WaveObjUpdate) {
        if let Some(updates) = self.updates.as_mut() {
            updates.record_update(update);
        }
    }

    /// Innermost pending record for `oref` across all open scopes.
    pub fn pending_update(&self, oref: &ORef) -> Option<&WaveObjUpdate> {
        self.updates.as_ref().and_then(|updates| updates.lookup(oref))
    }

    /// Everything recorded so far, without closing any scope.
    pub fn pending_updates(&self) -> HashMap<ORef, WaveObjUpdate> {
        self.updates
            .as_ref()
            .map(UpdateContext::snapshot)
            .unwrap_or_default()
    }

    /// Runs `work` in a nested scope.
    pub fn with_tx<E, F>(&mut self, work: F) -> Result<(), E>
    where
        F: FnOnce(&mut TxWrap<'conn>) -> Result<(), E>,
        E: From<StoreError>,
    {
        self.with_tx_rtn(work)
    }

    /// Runs `work` in a nested scope and returns its value.
    ///
    /// On `Ok` the scope's substrate writes and update records join the
    /// enclosing scope. On `Err` or panic both are discarded and the same
    /// error (or panic) reaches the caller.
    ///
    /// Caller values updated inside a discarded scope keep their field edits
    /// and the undone version; a later `db_update` on the same handle accepts
    /// them against the restored row.
    pub fn with_tx_rtn<T, E, F>(&mut self, work: F) -> Result<T, E>
    where
        F: FnOnce(&mut TxWrap<'conn>) -> Result<T, E>,
        E: From<StoreError>,
    {
        self.begin_scope()?;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| work(&mut *self)));
        match outcome {
            Ok(Ok(value)) => {
                self.commit_scope()?;
                Ok(value)
            }
            Ok(Err(err)) => {
                if let Err(rollback_err) = self.rollback_scope() {
                    error!(
                        "event=tx_rollback module=store status=error depth={} error={}",
                        self.savepoint_depth, rollback_err
                    );
                }
                Err(err)
            }
            Err(payload) => {
                if let Err(rollback_err) = self.rollback_scope() {
                    error!(
                        "event=tx_rollback module=store status=error depth={} error={}",
                        self.savepoint_depth, rollback_err
                    );
                }
                panic::resume_unwind(payload)
            }
        }
    }

    fn begin_scope(&mut self) -> StoreResult<()> {
        let depth = self.savepoint_depth + 1;
        self.conn
            .execute_batch(&format!("SAVEPOINT {};", savepoint_name(depth)))?;
        self.savepoint_depth = depth;
        self.written.push(HashMap::new());
        if let Some(updates) = self.updates.as_mut() {
            updates.begin_scope();
        }
        debug!("event=tx_begin module=store status=ok depth={depth}");
        Ok(())
    }

    fn commit_scope(&mut self) -> StoreResult<()> {
        let depth = self.savepoint_depth;
        if let Err(err) = self
            .conn
            .execute_batch(&format!("RELEASE {};", savepoint_name(depth)))
        {
            self.rollback_scope()?;
            return Err(err.into());
        }
        self.savepoint_depth = depth - 1;
        if let Some(top) = self.written.pop() {
            if let Some(parent) = self.written.last_mut() {
                for (oref, span) in top {
                    parent
                        .entry(oref)
                        .or_insert(VersionSpan {
                            base: span.base,
                            latest: span.base,
                        })
                        .latest = span.latest;
                }
            }
        }
        if let Some(updates) = self.updates.as_mut() {
            updates.commit_scope()?;
        }
        debug!("event=tx_commit module=store status=ok depth={depth}");
        Ok(())
    }

    fn rollback_scope(&mut self) -> StoreResult<()> {
        let depth = self.savepoint_depth;
        let name = savepoint_name(depth);
        self.savepoint_depth = depth.saturating_sub(1);
        if let Some(top) = self.written.pop() {
            self.rolled_back.extend(top);
        }
        if let Some(updates) = self.updates.as_mut() {
            if log_enabled!(Level::Debug) {
                updates.dump();
            }
            updates.rollback_scope()?;
        }
        self.conn
            .execute_batch(&format!("ROLLBACK TO {name}; RELEASE {name};"))?;
        debug!("event=tx_rollback module=store status=ok depth={depth}");
        Ok(())
    }

    fn finish(self) -> Vec<WaveObjUpdate> {
        self.updates.map(UpdateContext::drain).unwrap_or_default()
    }
}

fn savepoint_name(depth: usize) -> String {
    format!("wavestore_scope_{depth}")
}

/// Shared handle to the object store.
///
/// Request handlers share one `WaveStore` (typically behind an `Arc`); each
/// call chain gets its own `TxWrap` from one of the `with_tx*` entry points.
pub struct WaveStore {
    conn: Mutex<Connection>,
    config: StoreConfig,
    bus: UpdateBus,
}

impl WaveStore {
    /// Opens the store described by `config`.
    pub fn open(config: StoreConfig) -> StoreResult<Self> {
        config.validate()?;
        let conn = match &config.db_path {
            Some(path) => open_db(path)?,
            None => open_db_in_memory()?,
        };
        conn.busy_timeout(config.busy_timeout)?;
        info!(
            "event=store_open module=store status=ok mode={}",
            if config.db_path.is_some() { "file" } else { "memory" }
        );
        Ok(Self {
            conn: Mutex::new(conn),
            config,
            bus: UpdateBus::new(),
        })
    }

    /// Opens a private in-memory store with default settings.
    pub fn in_memory() -> StoreResult<Self> {
        Self::open(StoreConfig::default())
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Sinks receiving every outermost commit's update set.
    pub fn updates(&self) -> &UpdateBus {
        &self.bus
    }

    /// Runs `work` as one outermost tracked transaction.
    pub fn with_tx<E, F>(&self, work: F) -> Result<(), E>
    where
        F: FnOnce(&mut TxWrap<'_>) -> Result<(), E>,
        E: From<StoreError>,
    {
        self.with_tx_updates(work).map(|(value, _)| value)
    }

    /// Runs `work` as one outermost tracked transaction and returns its value.
    pub fn with_tx_rtn<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(&mut TxWrap<'_>) -> Result<T, E>,
        E: From<StoreError>,
    {
        self.with_tx_updates(work).map(|(value, _)| value)
    }

    /// Like `with_tx_rtn`, also returning the committed update set.
    pub fn with_tx_updates<T, E, F>(&self, work: F) -> Result<(T, Vec<WaveObjUpdate>), E>
    where
        F: FnOnce(&mut TxWrap<'_>) -> Result<T, E>,
        E: From<StoreError>,
    {
        let (value, updates) = {
            let conn = self.lock_conn();
            run_outermost(&conn, TxWrap::tracked, work)?
        };
        self.bus.publish(&updates);
        Ok((value, updates))
    }

    /// Runs `work` in a substrate transaction that records no updates.
    ///
    /// Used for first-run bootstrap. Waiting on a database file locked by
    /// another connection is bounded by `config.init_timeout`; waiting for
    /// other call chains of this store to release the connection is not.
    pub fn with_untracked_tx<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(&mut TxWrap<'_>) -> Result<T, E>,
        E: From<StoreError>,
    {
        let conn = self.lock_conn();
        set_busy_timeout(&conn, self.config.init_timeout)?;
        let result = run_outermost(&conn, TxWrap::untracked, work);
        if let Err(err) = set_busy_timeout(&conn, self.config.busy_timeout) {
            warn!("event=busy_timeout_restore module=store status=error error={err}");
        }
        result.map(|(value, _)| value)
    }

    /// Busy timeout currently set on the connection.
    pub fn busy_timeout(&self) -> StoreResult<Duration> {
        let conn = self.lock_conn();
        let millis: u64 = conn.query_row("PRAGMA busy_timeout;", [], |row| row.get(0))?;
        Ok(Duration::from_millis(millis))
    }

    fn lock_conn(&self) -> MutexGuard<'_, Connection> {
        // A panicking call chain rolls its transaction back before the lock is
        // released, so the connection is consistent even when poisoned.
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn set_busy_timeout(conn: &Connection, timeout: Duration) -> StoreResult<()> {
    conn.busy_timeout(timeout)?;
    Ok(())
}

fn run_outermost<'conn, T, E, F>(
    conn: &'conn Connection,
    make_wrap: fn(&'conn Connection) -> TxWrap<'conn>,
    work: F,
) -> Result<(T, Vec<WaveObjUpdate>), E>
where
    F: FnOnce(&mut TxWrap<'conn>) -> Result<T, E>,
    E: From<StoreError>,
{
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)
        .map_err(StoreError::from)?;
    let mut wrap = make_wrap(conn);
    let tracked = wrap.is_tracked();

    match wrap.with_tx_rtn(work) {
        Ok(value) => {
            let updates = wrap.finish();
            tx.commit().map_err(StoreError::from)?;
            debug!(
                "event=tx_outer_commit module=store status=ok tracked={tracked} updates={}",
                updates.len()
            );
            Ok((value, updates))
        }
        Err(err) => {
            drop(wrap);
            if let Err(rollback_err) = tx.rollback() {
                error!(
                    "event=tx_outer_rollback module=store status=error error={rollback_err}"
                );
            } else {
                debug!("event=tx_outer_rollback module=store status=ok tracked={tracked}");
            }
            Err(err)
        }
    }
}
