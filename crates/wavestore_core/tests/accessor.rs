use wavestore_core::store::{
    db_count, db_delete, db_get, db_get_oref, db_insert, db_tombstones, db_update,
};
use wavestore_core::{
    AnyWaveObj, ORef, OType, StoreError, StoreResult, Tab, UpdateType, WaveObj,
    WaveObjTombstone, WaveStore, Workspace,
};

fn store() -> WaveStore {
    WaveStore::in_memory().unwrap()
}

#[test]
fn insert_sets_version_one_and_records_update() {
    let store = store();
    let (tab, updates) = store
        .with_tx_updates(|tx| -> StoreResult<Tab> {
            let mut tab = Tab::new("shell");
            db_insert(tx, &mut tab)?;
            Ok(tab)
        })
        .unwrap();

    assert_eq!(tab.version, 1);
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].update_type, UpdateType::Update);
    assert_eq!(updates[0].obj, Some(AnyWaveObj::Tab(tab.clone())));

    let loaded = store
        .with_tx_rtn(|tx| db_get::<Tab>(tx, &tab.oid))
        .unwrap()
        .unwrap();
    assert_eq!(loaded, tab);
}

#[test]
fn get_missing_object_is_none() {
    let store = store();
    let loaded = store
        .with_tx_rtn(|tx| db_get::<Workspace>(tx, "nope"))
        .unwrap();
    assert!(loaded.is_none());
}

#[test]
fn duplicate_insert_fails_and_keeps_caller_version() {
    let store = store();
    let mut tab = Tab::new("one");
    store.with_tx(|tx| db_insert(tx, &mut tab)).unwrap();

    let mut copy = tab.clone();
    copy.version = 0;
    let err = store.with_tx(|tx| db_insert(tx, &mut copy)).unwrap_err();
    assert!(matches!(err, StoreError::DuplicateKey(ref oref) if *oref == tab.oref()));
    assert_eq!(copy.version, 0);
}

#[test]
fn update_bumps_version_each_time() {
    let store = store();
    let mut workspace = Workspace::new("ws");
    store
        .with_tx(|tx| -> StoreResult<()> {
            db_insert(tx, &mut workspace)?;
            workspace.name = "renamed".to_string();
            db_update(tx, &mut workspace)?;
            db_update(tx, &mut workspace)
        })
        .unwrap();

    assert_eq!(workspace.version, 3);
    let stored = store
        .with_tx_rtn(|tx| db_get::<Workspace>(tx, &workspace.oid))
        .unwrap()
        .unwrap();
    assert_eq!(stored.version, 3);
    assert_eq!(stored.name, "renamed");
}

#[test]
fn stale_update_is_a_version_conflict() {
    let store = store();
    let mut workspace = Workspace::new("ws");
    store.with_tx(|tx| db_insert(tx, &mut workspace)).unwrap();

    let mut stale = workspace.clone();
    store.with_tx(|tx| db_update(tx, &mut workspace)).unwrap();

    stale.name = "lost".to_string();
    let err = store.with_tx(|tx| db_update(tx, &mut stale)).unwrap_err();
    match err {
        StoreError::VersionConflict {
            oref,
            expected,
            actual,
        } => {
            assert_eq!(oref, workspace.oref());
            assert_eq!(expected, 1);
            assert_eq!(actual, 2);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(stale.version, 1);
}

#[test]
fn update_of_missing_object_is_not_found() {
    let store = store();
    let mut tab = Tab::new("ghost");
    let err = store.with_tx(|tx| db_update(tx, &mut tab)).unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn delete_records_reference_only_and_writes_tombstone() {
    let store = store();
    let mut tab = Tab::new("doomed");
    store.with_tx(|tx| db_insert(tx, &mut tab)).unwrap();

    let (existed, updates) = store
        .with_tx_updates(|tx| db_delete::<Tab>(tx, &tab.oid))
        .unwrap();
    assert!(existed);
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].update_type, UpdateType::Delete);
    assert_eq!(updates[0].oref, tab.oref());
    assert!(updates[0].obj.is_none());

    let (tombstones, count) = store
        .with_tx_rtn(|tx| -> StoreResult<_> { Ok((db_tombstones(tx)?, db_count::<Tab>(tx)?)) })
        .unwrap();
    assert_eq!(tombstones, vec![WaveObjTombstone::from(tab.oref())]);
    assert_eq!(count, 0);
}

#[test]
fn deleting_missing_object_records_nothing() {
    let store = store();
    let (existed, updates) = store
        .with_tx_updates(|tx| db_delete::<Tab>(tx, "missing"))
        .unwrap();
    assert!(!existed);
    assert!(updates.is_empty());
}

#[test]
fn get_by_reference_dispatches_on_type() {
    let store = store();
    let mut workspace = Workspace::new("ws");
    store.with_tx(|tx| db_insert(tx, &mut workspace)).unwrap();

    let found = store
        .with_tx_rtn(|tx| db_get_oref(tx, &workspace.oref()))
        .unwrap();
    assert_eq!(found, Some(AnyWaveObj::Workspace(workspace.clone())));

    let missing = store
        .with_tx_rtn(|tx| db_get_oref(tx, &ORef::new(OType::Block, workspace.oid.clone())))
        .unwrap();
    assert!(missing.is_none());
}

#[test]
fn reads_see_own_uncommitted_writes() {
    let store = store();
    store
        .with_tx(|tx| -> StoreResult<()> {
            let mut tab = Tab::new("pending");
            db_insert(tx, &mut tab)?;
            let seen = db_get::<Tab>(tx, &tab.oid)?;
            assert_eq!(seen, Some(tab));
            assert_eq!(db_count::<Tab>(tx)?, 1);
            Ok(())
        })
        .unwrap();
}

#[test]
fn untracked_mutations_persist_without_updates() {
    let store = store();
    let tab = store
        .with_untracked_tx(|tx| -> StoreResult<Tab> {
            assert!(!tx.is_tracked());
            let mut tab = Tab::new("quiet");
            db_insert(tx, &mut tab)?;
            assert!(tx.pending_updates().is_empty());
            Ok(tab)
        })
        .unwrap();

    let count = store.with_tx_rtn(|tx| db_count::<Tab>(tx)).unwrap();
    assert_eq!(count, 1);
    assert_eq!(tab.version, 1);
}
