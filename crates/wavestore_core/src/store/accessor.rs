//! Typed object accessors over one transaction handle.
//!
//! # Responsibility
//! - Translate typed records to and from stored rows.
//! - Record one update per successful mutation on the handle's context.
//!
//! # Invariants
//! - A record's version is written back to the caller only after the
//!   substrate accepted the write.
//! - A value still carrying a version undone by a rolled-back scope of the
//!   same handle is checked against the restored row.
//! - Missing rows are `Ok(None)` on reads and never an error.
//! - Deleting a missing row records nothing and writes no tombstone.

use crate::model::entity::{AnyWaveObj, WaveObj};
use crate::model::oref::ORef;
use crate::model::update::{WaveObjTombstone, WaveObjUpdate};
use crate::repo::object_repo::{ObjectRepository, StoredRecord};
use crate::store::error::{StoreError, StoreResult};
use crate::store::tx::TxWrap;
use log::debug;
use serde_json::Value;

/// Loads one object by id.
pub fn db_get<T: WaveObj>(tx: &mut TxWrap<'_>, oid: &str) -> StoreResult<Option<T>> {
    let oref = ORef::new(T::OTYPE, oid);
    match tx.repo().get_record(&oref)? {
        None => Ok(None),
        Some(record) => decode::<T>(record).map(Some),
    }
}

/// Loads one object by id, `NotFound` when absent.
pub fn db_must_get<T: WaveObj>(tx: &mut TxWrap<'_>, oid: &str) -> StoreResult<T> {
    db_get::<T>(tx, oid)?.ok_or_else(|| StoreError::NotFound(ORef::new(T::OTYPE, oid)))
}

/// Loads any object from its reference.
pub fn db_get_oref(tx: &mut TxWrap<'_>, oref: &ORef) -> StoreResult<Option<AnyWaveObj>> {
    match tx.repo().get_record(oref)? {
        None => Ok(None),
        Some(record) => {
            let otype = record.oref.otype;
            let data = with_column_version(record.data, record.version);
            Ok(Some(AnyWaveObj::from_json(otype, data)?))
        }
    }
}

/// Loads every object of one kind ordered by id.
pub fn db_get_all<T: WaveObj>(tx: &mut TxWrap<'_>) -> StoreResult<Vec<T>> {
    tx.repo()
        .list_records(T::OTYPE)?
        .into_iter()
        .map(decode::<T>)
        .collect()
}

/// Inserts `obj` as version 1.
pub fn db_insert<T: WaveObj>(tx: &mut TxWrap<'_>, obj: &mut T) -> StoreResult<()> {
    let mut candidate = obj.clone();
    candidate.set_version(1);
    let record = encode(&candidate)?;
    tx.repo().insert_record(&record)?;

    debug!(
        "event=db_insert module=store status=ok otype={} version=1",
        T::OTYPE
    );
    *obj = candidate;
    tx.record_update(WaveObjUpdate::updated(obj.clone().into_any()));
    Ok(())
}

/// Replaces `obj` if its version still matches the stored one, then bumps it.
pub fn db_update<T: WaveObj>(tx: &mut TxWrap<'_>, obj: &mut T) -> StoreResult<()> {
    let oref = obj.oref();
    let expected = tx.expected_version(&oref, obj.version());
    let mut candidate = obj.clone();
    candidate.set_version(expected + 1);
    let record = encode(&candidate)?;
    tx.repo().update_record(&record, expected)?;
    tx.note_version_write(&oref, expected, expected + 1);

    debug!(
        "event=db_update module=store status=ok otype={} version={}",
        T::OTYPE,
        expected + 1
    );
    *obj = candidate;
    tx.record_update(WaveObjUpdate::updated(obj.clone().into_any()));
    Ok(())
}

/// Deletes one object, returning whether it existed.
pub fn db_delete<T: WaveObj>(tx: &mut TxWrap<'_>, oid: &str) -> StoreResult<bool> {
    let oref = ORef::new(T::OTYPE, oid);
    let repo = tx.repo();
    if !repo.delete_record(&oref)? {
        return Ok(false);
    }
    repo.insert_tombstone(&WaveObjTombstone::from(oref.clone()))?;

    debug!("event=db_delete module=store status=ok otype={}", T::OTYPE);
    tx.record_update(WaveObjUpdate::deleted(oref));
    Ok(true)
}

/// Counts objects of one kind.
pub fn db_count<T: WaveObj>(tx: &mut TxWrap<'_>) -> StoreResult<u64> {
    Ok(tx.repo().count_records(T::OTYPE)?)
}

/// Tombstones written so far, oldest first.
pub fn db_tombstones(tx: &mut TxWrap<'_>) -> StoreResult<Vec<WaveObjTombstone>> {
    Ok(tx.repo().list_tombstones(None)?)
}

fn encode<T: WaveObj>(obj: &T) -> StoreResult<StoredRecord> {
    Ok(StoredRecord {
        oref: obj.oref(),
        version: obj.version(),
        data: serde_json::to_value(obj)?,
    })
}

fn decode<T: WaveObj>(record: StoredRecord) -> StoreResult<T> {
    let mut obj: T = serde_json::from_value(record.data)?;
    // The column is authoritative for the version.
    obj.set_version(record.version);
    Ok(obj)
}

fn with_column_version(data: Value, version: i64) -> Value {
    match data {
        Value::Object(mut map) => {
            map.insert("version".to_string(), Value::from(version));
            Value::Object(map)
        }
        other => other,
    }
}
