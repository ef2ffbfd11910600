//! Typed entity records persisted by the store.
//!
//! # Responsibility
//! - Define the client/window/workspace/tab/block record shapes.
//! - Provide the `WaveObj` capability every stored record implements.
//! - Provide `AnyWaveObj`, the single tag-dispatched (de)serialization point.
//!
//! # Invariants
//! - `oid` is stable and never reused for another object of the same kind.
//! - Cross-references are plain ids; no record owns another.
//! - `version` is managed by the accessor layer, never by callers.

use crate::model::oref::ORef;
use crate::model::otype::OType;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Free-form metadata attached to blocks and files.
pub type MetaMap = Map<String, Value>;

/// Generates a fresh object id.
pub fn new_oid() -> String {
    Uuid::new_v4().to_string()
}

/// Capability shared by every stored record.
pub trait WaveObj: Serialize + DeserializeOwned + Clone + Send + 'static {
    /// Fixed type tag for this record shape.
    const OTYPE: OType;

    fn oid(&self) -> &str;
    fn version(&self) -> i64;
    fn set_version(&mut self, version: i64);
    fn into_any(self) -> AnyWaveObj;
    fn from_any(obj: AnyWaveObj) -> Option<Self>;

    fn otype(&self) -> OType {
        Self::OTYPE
    }

    fn oref(&self) -> ORef {
        ORef::new(Self::OTYPE, self.oid())
    }
}

/// Singleton root record pointing at the main window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Client {
    pub oid: String,
    #[serde(default)]
    pub version: i64,
    #[serde(rename = "mainwindowid")]
    pub main_window_id: String,
}

impl Client {
    pub fn new(main_window_id: impl Into<String>) -> Self {
        Self {
            oid: new_oid(),
            version: 0,
            main_window_id: main_window_id.into(),
        }
    }
}

/// Screen position in pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

/// Window dimensions in pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WinSize {
    pub width: i32,
    pub height: i32,
}

/// Terminal grid dimensions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermSize {
    pub rows: i32,
    pub cols: i32,
}

/// UI state of one window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window {
    pub oid: String,
    #[serde(default)]
    pub version: i64,
    #[serde(rename = "workspaceid")]
    pub workspace_id: String,
    #[serde(rename = "activetabid")]
    pub active_tab_id: String,
    /// Last active block per tab, keyed by tab id.
    #[serde(rename = "activeblockmap", default)]
    pub active_block_map: BTreeMap<String, String>,
    pub pos: Point,
    #[serde(rename = "winsize")]
    pub win_size: WinSize,
    /// Unix epoch milliseconds of the last focus event; `0` if never focused.
    #[serde(rename = "lastfocusts", default)]
    pub last_focus_ts: i64,
}

impl Window {
    pub fn new(
        workspace_id: impl Into<String>,
        active_tab_id: impl Into<String>,
        pos: Point,
        win_size: WinSize,
    ) -> Self {
        Self {
            oid: new_oid(),
            version: 0,
            workspace_id: workspace_id.into(),
            active_tab_id: active_tab_id.into(),
            active_block_map: BTreeMap::new(),
            pos,
            win_size,
            last_focus_ts: 0,
        }
    }
}

/// Named, ordered collection of tabs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workspace {
    pub oid: String,
    #[serde(default)]
    pub version: i64,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "tabids", default)]
    pub tab_ids: Vec<String>,
}

impl Workspace {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            oid: new_oid(),
            version: 0,
            name: name.into(),
            tab_ids: Vec::new(),
        }
    }
}

/// Named, ordered collection of blocks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tab {
    pub oid: String,
    #[serde(default)]
    pub version: i64,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "blockids", default)]
    pub block_ids: Vec<String>,
}

impl Tab {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            oid: new_oid(),
            version: 0,
            name: name.into(),
            block_ids: Vec::new(),
        }
    }
}

/// File attachment referenced by a block definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileDef {
    #[serde(rename = "filetype", skip_serializing_if = "String::is_empty")]
    pub file_type: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub path: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub url: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub content: String,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub meta: MetaMap,
}

/// Caller-supplied description of the block to create.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockDef {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub controller: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub view: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub files: BTreeMap<String, FileDef>,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub meta: MetaMap,
}

/// Runtime sizing used when the block's controller starts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeOpts {
    #[serde(rename = "termsize")]
    pub term_size: TermSize,
    #[serde(rename = "winsize")]
    pub win_size: WinSize,
}

/// One command/view block inside a tab.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub oid: String,
    #[serde(default)]
    pub version: i64,
    #[serde(rename = "blockdef", default)]
    pub block_def: BlockDef,
    /// Copied from `block_def.controller` at creation.
    #[serde(default)]
    pub controller: String,
    /// Copied from `block_def.view` at creation.
    #[serde(default)]
    pub view: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub meta: MetaMap,
    #[serde(rename = "runtimeopts", default, skip_serializing_if = "Option::is_none")]
    pub runtime_opts: Option<RuntimeOpts>,
}

impl Block {
    /// Creates a block whose denormalized fields mirror `block_def`.
    pub fn new(block_def: BlockDef, runtime_opts: Option<RuntimeOpts>) -> Self {
        Self {
            oid: new_oid(),
            version: 0,
            controller: block_def.controller.clone(),
            view: block_def.view.clone(),
            meta: block_def.meta.clone(),
            block_def,
            runtime_opts,
        }
    }
}

/// Window id plus its active tab, handed to UI callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UIContext {
    #[serde(rename = "windowid")]
    pub window_id: String,
    #[serde(rename = "activetabid")]
    pub active_tab_id: String,
}

macro_rules! impl_wave_obj {
    ($($kind:ident),+ $(,)?) => {
        $(
            impl WaveObj for $kind {
                const OTYPE: OType = OType::$kind;

                fn oid(&self) -> &str {
                    &self.oid
                }

                fn version(&self) -> i64 {
                    self.version
                }

                fn set_version(&mut self, version: i64) {
                    self.version = version;
                }

                fn into_any(self) -> AnyWaveObj {
                    AnyWaveObj::$kind(self)
                }

                fn from_any(obj: AnyWaveObj) -> Option<Self> {
                    match obj {
                        AnyWaveObj::$kind(value) => Some(value),
                        _ => None,
                    }
                }
            }
        )+
    };
}

impl_wave_obj!(Client, Window, Workspace, Tab, Block);

/// Any stored record, tagged by its kind.
#[derive(Debug, Clone, PartialEq)]
pub enum AnyWaveObj {
    Client(Client),
    Window(Window),
    Workspace(Workspace),
    Tab(Tab),
    Block(Block),
}

impl AnyWaveObj {
    pub fn otype(&self) -> OType {
        match self {
            Self::Client(_) => OType::Client,
            Self::Window(_) => OType::Window,
            Self::Workspace(_) => OType::Workspace,
            Self::Tab(_) => OType::Tab,
            Self::Block(_) => OType::Block,
        }
    }

    pub fn oid(&self) -> &str {
        match self {
            Self::Client(obj) => &obj.oid,
            Self::Window(obj) => &obj.oid,
            Self::Workspace(obj) => &obj.oid,
            Self::Tab(obj) => &obj.oid,
            Self::Block(obj) => &obj.oid,
        }
    }

    pub fn version(&self) -> i64 {
        match self {
            Self::Client(obj) => obj.version,
            Self::Window(obj) => obj.version,
            Self::Workspace(obj) => obj.version,
            Self::Tab(obj) => obj.version,
            Self::Block(obj) => obj.version,
        }
    }

    pub fn oref(&self) -> ORef {
        ORef::new(self.otype(), self.oid())
    }

    /// Decodes a record body for a known kind.
    pub fn from_json(otype: OType, value: Value) -> Result<Self, serde_json::Error> {
        match otype {
            OType::Client => serde_json::from_value(value).map(Self::Client),
            OType::Window => serde_json::from_value(value).map(Self::Window),
            OType::Workspace => serde_json::from_value(value).map(Self::Workspace),
            OType::Tab => serde_json::from_value(value).map(Self::Tab),
            OType::Block => serde_json::from_value(value).map(Self::Block),
        }
    }

    /// Encodes the record's own fields plus its `otype` tag as one JSON object.
    pub fn to_json_map(&self) -> Result<Map<String, Value>, serde_json::Error> {
        let value = match self {
            Self::Client(obj) => serde_json::to_value(obj)?,
            Self::Window(obj) => serde_json::to_value(obj)?,
            Self::Workspace(obj) => serde_json::to_value(obj)?,
            Self::Tab(obj) => serde_json::to_value(obj)?,
            Self::Block(obj) => serde_json::to_value(obj)?,
        };
        let mut map = match value {
            Value::Object(map) => map,
            // Every entity is a struct, so this arm is unreachable in practice.
            other => {
                let mut map = Map::new();
                map.insert("value".to_string(), other);
                map
            }
        };
        map.insert(
            "otype".to_string(),
            Value::String(self.otype().as_str().to_string()),
        );
        Ok(map)
    }
}

#[cfg(test)]
mod tests {
    use super::{AnyWaveObj, Block, BlockDef, RuntimeOpts, Tab, TermSize, WaveObj, Window};
    use super::{Point, WinSize};
    use crate::model::otype::OType;
    use serde_json::json;

    #[test]
    fn block_copies_controller_view_and_meta_from_def() {
        let mut def = BlockDef {
            controller: "shell".to_string(),
            view: "term".to_string(),
            ..BlockDef::default()
        };
        def.meta.insert("cwd".to_string(), json!("/tmp"));

        let block = Block::new(
            def.clone(),
            Some(RuntimeOpts {
                term_size: TermSize { rows: 24, cols: 80 },
                ..RuntimeOpts::default()
            }),
        );
        assert_eq!(block.controller, "shell");
        assert_eq!(block.view, "term");
        assert_eq!(block.meta.get("cwd"), Some(&json!("/tmp")));
        assert_eq!(block.block_def, def);
        assert_eq!(block.version, 0);
    }

    #[test]
    fn new_records_get_distinct_ids() {
        let first = Tab::new("a");
        let second = Tab::new("a");
        assert_ne!(first.oid, second.oid);
        assert_eq!(first.oref().otype, OType::Tab);
    }

    #[test]
    fn json_map_carries_otype_and_wire_field_names() {
        let window = Window::new(
            "ws-1",
            "tab-1",
            Point { x: 1, y: 2 },
            WinSize {
                width: 3,
                height: 4,
            },
        );
        let map = window.clone().into_any().to_json_map().unwrap();
        assert_eq!(map["otype"], json!("window"));
        assert_eq!(map["workspaceid"], json!("ws-1"));
        assert_eq!(map["activetabid"], json!("tab-1"));
        assert_eq!(map["winsize"], json!({"width": 3, "height": 4}));
        assert_eq!(map["oid"], json!(window.oid));
    }

    #[test]
    fn from_json_dispatches_on_tag() {
        let value = json!({"oid": "t1", "version": 4, "name": "Tab-1", "blockids": ["b1"]});
        let obj = AnyWaveObj::from_json(OType::Tab, value).unwrap();
        assert_eq!(obj.otype(), OType::Tab);
        assert_eq!(obj.version(), 4);
        let tab = Tab::from_any(obj).unwrap();
        assert_eq!(tab.block_ids, vec!["b1".to_string()]);
    }

    #[test]
    fn from_json_rejects_shape_of_wrong_kind() {
        let value = json!({"oid": "w1", "version": 1});
        assert!(AnyWaveObj::from_json(OType::Window, value).is_err());
    }

    #[test]
    fn empty_block_def_fields_are_omitted() {
        let value = serde_json::to_value(BlockDef::default()).unwrap();
        assert_eq!(value, json!({}));
    }
}
