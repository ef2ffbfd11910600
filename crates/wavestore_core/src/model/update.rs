//! Update records describing one object's change, and deletion tombstones.
//!
//! # Responsibility
//! - Carry the delta unit collected by update contexts and handed to sinks.
//! - Define the flat wire form: envelope fields plus the entity's own fields.
//!
//! # Invariants
//! - An `Update` record always carries the full current object.
//! - A `Delete` record carries only the object reference.

use crate::model::entity::AnyWaveObj;
use crate::model::oref::ORef;
use crate::model::otype::OType;
use serde::de::Error as _;
use serde::ser::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

const FIELD_UPDATE_TYPE: &str = "updatetype";
const FIELD_OTYPE: &str = "otype";
const FIELD_OID: &str = "oid";

/// Kind of change an update record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateType {
    /// Object was inserted or modified.
    Update,
    /// Object was removed.
    Delete,
}

/// One object's pending or committed change.
#[derive(Debug, Clone, PartialEq)]
pub struct WaveObjUpdate {
    pub update_type: UpdateType,
    pub oref: ORef,
    /// Present only for `UpdateType::Update`.
    pub obj: Option<AnyWaveObj>,
}

impl WaveObjUpdate {
    /// Record for an inserted or modified object.
    pub fn updated(obj: AnyWaveObj) -> Self {
        Self {
            update_type: UpdateType::Update,
            oref: obj.oref(),
            obj: Some(obj),
        }
    }

    /// Record for a removed object.
    pub fn deleted(oref: ORef) -> Self {
        Self {
            update_type: UpdateType::Delete,
            oref,
            obj: None,
        }
    }

    pub fn is_delete(&self) -> bool {
        self.update_type == UpdateType::Delete
    }
}

impl Serialize for WaveObjUpdate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = match (&self.update_type, &self.obj) {
            (UpdateType::Update, Some(obj)) => obj.to_json_map().map_err(S::Error::custom)?,
            _ => Map::new(),
        };
        map.insert(
            FIELD_UPDATE_TYPE.to_string(),
            serde_json::to_value(self.update_type).map_err(S::Error::custom)?,
        );
        map.insert(
            FIELD_OTYPE.to_string(),
            Value::String(self.oref.otype.as_str().to_string()),
        );
        map.insert(FIELD_OID.to_string(), Value::String(self.oref.oid.clone()));
        map.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for WaveObjUpdate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut map = Map::<String, Value>::deserialize(deserializer)?;

        let update_type = match map.remove(FIELD_UPDATE_TYPE) {
            Some(value) => UpdateType::deserialize(value).map_err(D::Error::custom)?,
            None => return Err(D::Error::missing_field(FIELD_UPDATE_TYPE)),
        };
        let otype = match map.get(FIELD_OTYPE) {
            Some(Value::String(tag)) => OType::from_tag(tag).map_err(D::Error::custom)?,
            Some(_) => return Err(D::Error::custom("`otype` must be a string")),
            None => return Err(D::Error::missing_field(FIELD_OTYPE)),
        };
        let oid = match map.get(FIELD_OID) {
            Some(Value::String(oid)) => oid.clone(),
            Some(_) => return Err(D::Error::custom("`oid` must be a string")),
            None => return Err(D::Error::missing_field(FIELD_OID)),
        };
        let oref = ORef::new(otype, oid);

        match update_type {
            UpdateType::Delete => Ok(Self::deleted(oref)),
            UpdateType::Update => {
                let obj =
                    AnyWaveObj::from_json(otype, Value::Object(map)).map_err(D::Error::custom)?;
                Ok(Self {
                    update_type,
                    oref,
                    obj: Some(obj),
                })
            }
        }
    }
}

/// Identity of a deleted object, kept for substrate bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WaveObjTombstone {
    pub otype: OType,
    pub oid: String,
}

impl WaveObjTombstone {
    pub fn oref(&self) -> ORef {
        ORef::new(self.otype, self.oid.clone())
    }
}

impl From<ORef> for WaveObjTombstone {
    fn from(value: ORef) -> Self {
        Self {
            otype: value.otype,
            oid: value.oid,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{UpdateType, WaveObjTombstone, WaveObjUpdate};
    use crate::model::entity::{Tab, WaveObj};
    use crate::model::oref::ORef;
    use crate::model::otype::OType;
    use serde_json::json;

    fn sample_tab() -> Tab {
        Tab {
            oid: "tab-1".to_string(),
            version: 3,
            name: "Tab-1".to_string(),
            block_ids: vec!["b1".to_string(), "b2".to_string()],
        }
    }

    #[test]
    fn update_record_is_flat_on_the_wire() {
        let update = WaveObjUpdate::updated(sample_tab().into_any());
        let value = serde_json::to_value(&update).unwrap();
        assert_eq!(
            value,
            json!({
                "updatetype": "update",
                "otype": "tab",
                "oid": "tab-1",
                "version": 3,
                "name": "Tab-1",
                "blockids": ["b1", "b2"]
            })
        );
        assert!(value.get("obj").is_none());
    }

    #[test]
    fn delete_record_omits_entity_fields() {
        let update = WaveObjUpdate::deleted(ORef::new(OType::Block, "b9"));
        let value = serde_json::to_value(&update).unwrap();
        assert_eq!(
            value,
            json!({"updatetype": "delete", "otype": "block", "oid": "b9"})
        );
    }

    #[test]
    fn wire_form_decodes_back_through_tag_dispatch() {
        let update = WaveObjUpdate::updated(sample_tab().into_any());
        let text = serde_json::to_string(&update).unwrap();
        let decoded: WaveObjUpdate = serde_json::from_str(&text).unwrap();
        assert_eq!(decoded, update);
    }

    #[test]
    fn decode_rejects_unknown_otype() {
        let result = serde_json::from_value::<WaveObjUpdate>(json!({
            "updatetype": "delete",
            "otype": "pane",
            "oid": "p1"
        }));
        let err = result.unwrap_err();
        assert!(err.to_string().contains("unknown object type"));
    }

    #[test]
    fn decode_requires_update_type() {
        let result = serde_json::from_value::<WaveObjUpdate>(json!({"otype": "tab", "oid": "t"}));
        assert!(result.is_err());
    }

    #[test]
    fn deleted_constructor_has_no_payload() {
        let update = WaveObjUpdate::deleted(ORef::new(OType::Tab, "t"));
        assert_eq!(update.update_type, UpdateType::Delete);
        assert!(update.obj.is_none());
        assert!(update.is_delete());
    }

    #[test]
    fn tombstone_uses_short_field_names() {
        let tombstone = WaveObjTombstone::from(ORef::new(OType::Window, "w1"));
        assert_eq!(
            serde_json::to_value(&tombstone).unwrap(),
            json!({"otype": "window", "oid": "w1"})
        );
        assert_eq!(tombstone.oref(), ORef::new(OType::Window, "w1"));
    }
}
