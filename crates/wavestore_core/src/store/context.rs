//! Per-call-chain stack of pending object updates.
//!
//! # Responsibility
//! - Accumulate update records as mutations happen.
//! - Give nested transaction scopes commit (merge into parent) and rollback
//!   (discard) semantics over those records.
//!
//! # Invariants
//! - The stack always holds at least the base frame.
//! - Within a frame the last record for an `ORef` wins.
//! - Committing or rolling back never touches the base frame; its contents
//!   are drained by whoever created the context.

use crate::model::oref::ORef;
use crate::model::update::WaveObjUpdate;
use crate::store::error::TxDisciplineError;
use log::debug;
use std::collections::HashMap;

type Frame = HashMap<ORef, WaveObjUpdate>;

/// Stack of pending-update frames owned by one call chain.
#[derive(Debug, Clone)]
pub struct UpdateContext {
    stack: Vec<Frame>,
}

impl Default for UpdateContext {
    fn default() -> Self {
        Self::new()
    }
}

impl UpdateContext {
    /// Creates a context holding only the base frame.
    pub fn new() -> Self {
        Self {
            stack: vec![Frame::new()],
        }
    }

    /// Number of frames, base frame included.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Returns `true` when no frame holds a record.
    pub fn is_empty(&self) -> bool {
        self.stack.iter().all(HashMap::is_empty)
    }

    /// Pushes an empty frame for a nested scope.
    pub fn begin_scope(&mut self) {
        self.stack.push(Frame::new());
    }

    /// Stores `update` in the innermost frame, replacing any earlier record
    /// for the same object in that frame.
    pub fn record_update(&mut self, update: WaveObjUpdate) {
        if let Some(top) = self.stack.last_mut() {
            top.insert(update.oref.clone(), update);
        }
    }

    /// Merges the innermost frame into its parent and pops it.
    pub fn commit_scope(&mut self) -> Result<(), TxDisciplineError> {
        if self.stack.len() <= 1 {
            return Err(TxDisciplineError::NoScopeToCommit);
        }
        if let Some(top) = self.stack.pop() {
            if let Some(parent) = self.stack.last_mut() {
                parent.extend(top);
            }
        }
        Ok(())
    }

    /// Discards the innermost frame.
    pub fn rollback_scope(&mut self) -> Result<(), TxDisciplineError> {
        if self.stack.len() <= 1 {
            return Err(TxDisciplineError::NoScopeToRollback);
        }
        self.stack.pop();
        Ok(())
    }

    /// Flattened view of every pending record; inner frames win.
    pub fn snapshot(&self) -> HashMap<ORef, WaveObjUpdate> {
        if let [only] = self.stack.as_slice() {
            return only.clone();
        }
        let mut merged = HashMap::new();
        for frame in &self.stack {
            merged.extend(frame.iter().map(|(oref, update)| (oref.clone(), update.clone())));
        }
        merged
    }

    /// Innermost pending record for `oref`, if any.
    pub fn lookup(&self, oref: &ORef) -> Option<&WaveObjUpdate> {
        self.stack.iter().rev().find_map(|frame| frame.get(oref))
    }

    /// Consumes the context, returning the flattened records ordered by `ORef`.
    pub fn drain(self) -> Vec<WaveObjUpdate> {
        let mut merged = Frame::new();
        for frame in self.stack {
            merged.extend(frame);
        }
        let mut updates: Vec<_> = merged.into_values().collect();
        updates.sort_by(|left, right| left.oref.cmp(&right.oref));
        updates
    }

    /// Logs the keys held by every frame at debug level.
    pub fn dump(&self) {
        debug!(
            "event=update_stack_dump module=store depth={}",
            self.stack.len()
        );
        for (index, frame) in self.stack.iter().enumerate() {
            let mut keys: Vec<String> = frame.keys().map(ToString::to_string).collect();
            keys.sort_unstable();
            debug!(
                "event=update_stack_frame module=store index={index} keys=[{}]",
                keys.join(" ")
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::UpdateContext;
    use crate::model::entity::{Tab, WaveObj, Workspace};
    use crate::model::oref::ORef;
    use crate::model::otype::OType;
    use crate::model::update::{UpdateType, WaveObjUpdate};
    use crate::store::error::TxDisciplineError;

    fn tab_update(oid: &str, name: &str) -> WaveObjUpdate {
        let mut tab = Tab::new(name);
        tab.oid = oid.to_string();
        WaveObjUpdate::updated(tab.into_any())
    }

    fn name_of(update: &WaveObjUpdate) -> String {
        let obj = update.obj.clone().expect("update record carries object");
        Tab::from_any(obj).expect("record holds a tab").name
    }

    #[test]
    fn last_write_wins_within_one_scope() {
        let mut ctx = UpdateContext::new();
        ctx.begin_scope();
        ctx.record_update(tab_update("t1", "first"));
        ctx.record_update(tab_update("t1", "second"));
        ctx.record_update(tab_update("t1", "third"));

        let snapshot = ctx.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(name_of(&snapshot[&ORef::new(OType::Tab, "t1")]), "third");
    }

    #[test]
    fn commit_merges_child_over_parent() {
        let mut ctx = UpdateContext::new();
        ctx.begin_scope();
        ctx.record_update(tab_update("t1", "parent"));
        ctx.record_update(tab_update("t2", "parent-only"));

        ctx.begin_scope();
        ctx.record_update(tab_update("t1", "child"));
        ctx.record_update(tab_update("t3", "child-only"));
        ctx.commit_scope().unwrap();

        assert_eq!(ctx.depth(), 2);
        let snapshot = ctx.snapshot();
        assert_eq!(snapshot.len(), 3);
        assert_eq!(name_of(&snapshot[&ORef::new(OType::Tab, "t1")]), "child");
        assert_eq!(
            name_of(&snapshot[&ORef::new(OType::Tab, "t2")]),
            "parent-only"
        );
        assert_eq!(
            name_of(&snapshot[&ORef::new(OType::Tab, "t3")]),
            "child-only"
        );
    }

    #[test]
    fn rollback_discards_only_child_entries() {
        let mut ctx = UpdateContext::new();
        ctx.begin_scope();
        ctx.record_update(tab_update("t1", "parent"));

        ctx.begin_scope();
        ctx.record_update(tab_update("t1", "child"));
        ctx.record_update(tab_update("t2", "child"));
        ctx.rollback_scope().unwrap();

        let snapshot = ctx.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(name_of(&snapshot[&ORef::new(OType::Tab, "t1")]), "parent");
    }

    #[test]
    fn closing_the_base_frame_is_a_discipline_error() {
        let mut ctx = UpdateContext::new();
        assert_eq!(ctx.commit_scope(), Err(TxDisciplineError::NoScopeToCommit));
        assert_eq!(
            ctx.rollback_scope(),
            Err(TxDisciplineError::NoScopeToRollback)
        );
        assert_eq!(ctx.depth(), 1);
    }

    #[test]
    fn lookup_prefers_innermost_frame() {
        let mut ctx = UpdateContext::new();
        ctx.begin_scope();
        ctx.record_update(tab_update("t1", "outer"));
        ctx.begin_scope();
        assert_eq!(
            name_of(ctx.lookup(&ORef::new(OType::Tab, "t1")).unwrap()),
            "outer"
        );

        ctx.record_update(WaveObjUpdate::deleted(ORef::new(OType::Tab, "t1")));
        let found = ctx.lookup(&ORef::new(OType::Tab, "t1")).unwrap();
        assert_eq!(found.update_type, UpdateType::Delete);
        assert!(ctx.lookup(&ORef::new(OType::Tab, "missing")).is_none());
    }

    #[test]
    fn snapshot_does_not_close_scopes() {
        let mut ctx = UpdateContext::new();
        ctx.begin_scope();
        ctx.record_update(tab_update("t1", "x"));
        let _ = ctx.snapshot();
        assert_eq!(ctx.depth(), 2);
        assert!(!ctx.is_empty());
    }

    #[test]
    fn drain_flattens_and_orders_by_reference() {
        let mut ctx = UpdateContext::new();
        let workspace = Workspace::new("ws");
        ctx.record_update(tab_update("t2", "b"));
        ctx.begin_scope();
        ctx.record_update(WaveObjUpdate::updated(workspace.clone().into_any()));
        ctx.record_update(tab_update("t1", "a"));

        let drained = ctx.drain();
        let refs: Vec<_> = drained.iter().map(|update| update.oref.clone()).collect();
        assert_eq!(
            refs,
            vec![
                workspace.oref(),
                ORef::new(OType::Tab, "t1"),
                ORef::new(OType::Tab, "t2"),
            ]
        );
    }
}
