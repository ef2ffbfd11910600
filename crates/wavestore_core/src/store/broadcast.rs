//! Delivery of committed update sets to registered sinks.
//!
//! # Responsibility
//! - Keep the set of sinks interested in committed updates.
//! - Hand each outermost commit's update set to every sink.
//!
//! # Invariants
//! - Sinks are invoked outside the bus lock and outside any substrate lock.
//! - Empty update sets are never published.

use crate::model::update::WaveObjUpdate;
use log::{debug, warn};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::mpsc::Sender;
use std::sync::{Arc, PoisonError, RwLock};

/// Receiver of committed update sets, e.g. a UI-sync layer.
pub trait UpdateSink: Send + Sync {
    fn publish(&self, updates: &[WaveObjUpdate]);
}

/// Forwards each update set over an mpsc channel.
pub struct ChannelSink {
    sender: Sender<Vec<WaveObjUpdate>>,
}

impl ChannelSink {
    pub fn new(sender: Sender<Vec<WaveObjUpdate>>) -> Self {
        Self { sender }
    }
}

impl UpdateSink for ChannelSink {
    fn publish(&self, updates: &[WaveObjUpdate]) {
        if self.sender.send(updates.to_vec()).is_err() {
            warn!("event=updates_publish module=store status=dropped reason=receiver_closed");
        }
    }
}

/// Sink registration errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateBusError {
    InvalidSinkId(String),
    DuplicateSinkId(String),
    SinkNotFound(String),
}

impl Display for UpdateBusError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidSinkId(value) => write!(f, "sink id is invalid: {value:?}"),
            Self::DuplicateSinkId(value) => write!(f, "sink id already registered: {value}"),
            Self::SinkNotFound(value) => write!(f, "sink not found: {value}"),
        }
    }
}

impl Error for UpdateBusError {}

/// Registry of update sinks keyed by id.
#[derive(Default)]
pub struct UpdateBus {
    sinks: RwLock<BTreeMap<String, Arc<dyn UpdateSink>>>,
}

impl UpdateBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers one sink under a unique, non-blank id.
    pub fn register(
        &self,
        sink_id: &str,
        sink: Arc<dyn UpdateSink>,
    ) -> Result<(), UpdateBusError> {
        let sink_id = sink_id.trim();
        if sink_id.is_empty() {
            return Err(UpdateBusError::InvalidSinkId(sink_id.to_string()));
        }

        let mut sinks = self.sinks.write().unwrap_or_else(PoisonError::into_inner);
        if sinks.contains_key(sink_id) {
            return Err(UpdateBusError::DuplicateSinkId(sink_id.to_string()));
        }
        sinks.insert(sink_id.to_string(), sink);
        Ok(())
    }

    pub fn unregister(&self, sink_id: &str) -> Result<(), UpdateBusError> {
        let mut sinks = self.sinks.write().unwrap_or_else(PoisonError::into_inner);
        sinks
            .remove(sink_id.trim())
            .map(|_| ())
            .ok_or_else(|| UpdateBusError::SinkNotFound(sink_id.to_string()))
    }

    /// Returns sorted sink ids.
    pub fn sink_ids(&self) -> Vec<String> {
        let sinks = self.sinks.read().unwrap_or_else(PoisonError::into_inner);
        sinks.keys().cloned().collect()
    }

    /// Hands `updates` to every registered sink.
    pub fn publish(&self, updates: &[WaveObjUpdate]) {
        if updates.is_empty() {
            return;
        }
        let targets: Vec<Arc<dyn UpdateSink>> = {
            let sinks = self.sinks.read().unwrap_or_else(PoisonError::into_inner);
            sinks.values().cloned().collect()
        };
        for sink in &targets {
            sink.publish(updates);
        }
        debug!(
            "event=updates_published module=store status=ok updates={} sinks={}",
            updates.len(),
            targets.len()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::{ChannelSink, UpdateBus, UpdateBusError};
    use crate::model::oref::ORef;
    use crate::model::otype::OType;
    use crate::model::update::WaveObjUpdate;
    use std::sync::mpsc;
    use std::sync::Arc;

    #[test]
    fn register_rejects_blank_and_duplicate_ids() {
        let bus = UpdateBus::new();
        let (sender, _receiver) = mpsc::channel();
        let sink = Arc::new(ChannelSink::new(sender));

        assert_eq!(
            bus.register("  ", sink.clone()),
            Err(UpdateBusError::InvalidSinkId(String::new()))
        );
        bus.register("ui", sink.clone()).unwrap();
        assert_eq!(
            bus.register(" ui ", sink),
            Err(UpdateBusError::DuplicateSinkId("ui".to_string()))
        );
        assert_eq!(bus.sink_ids(), vec!["ui".to_string()]);
    }

    #[test]
    fn publish_reaches_every_sink_and_skips_empty_sets() {
        let bus = UpdateBus::new();
        let (first_tx, first_rx) = mpsc::channel();
        let (second_tx, second_rx) = mpsc::channel();
        bus.register("a", Arc::new(ChannelSink::new(first_tx)))
            .unwrap();
        bus.register("b", Arc::new(ChannelSink::new(second_tx)))
            .unwrap();

        bus.publish(&[]);
        let update = WaveObjUpdate::deleted(ORef::new(OType::Block, "b1"));
        bus.publish(std::slice::from_ref(&update));

        assert_eq!(first_rx.try_recv().unwrap(), vec![update.clone()]);
        assert_eq!(second_rx.try_recv().unwrap(), vec![update]);
        assert!(first_rx.try_recv().is_err());
    }

    #[test]
    fn unregister_unknown_sink_fails() {
        let bus = UpdateBus::new();
        assert_eq!(
            bus.unregister("ghost"),
            Err(UpdateBusError::SinkNotFound("ghost".to_string()))
        );
    }
}
