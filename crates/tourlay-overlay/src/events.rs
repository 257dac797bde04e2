//! Lifecycle events and the bus they are published on.

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded, unbounded};
use glam::DVec3;
use serde::{Deserialize, Serialize};
use tourlay_scene::AnchorType;

use crate::model::{AnchorId, OverlayId, OverlayType};

/// Something that happened to an anchor or overlay.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum OverlayEvent {
    AnchorPlaced {
        anchor_id: AnchorId,
        site_id: String,
        tenant_id: String,
        position: DVec3,
        anchor_type: AnchorType,
    },
    AnchorsOptimized {
        site_id: String,
        tenant_id: String,
        anchor_ids: Vec<AnchorId>,
        optimized_count: usize,
    },
    OverlayGenerated {
        overlay_id: OverlayId,
        site_id: String,
        tenant_id: String,
        overlay_type: OverlayType,
    },
    AnchorDeleted {
        anchor_id: AnchorId,
        tenant_id: String,
    },
}

impl OverlayEvent {
    /// Bus subject the event is published under.
    pub fn subject(&self) -> &'static str {
        match self {
            OverlayEvent::AnchorPlaced { .. } => "anchor.placed",
            OverlayEvent::AnchorsOptimized { .. } => "anchors.optimized",
            OverlayEvent::OverlayGenerated { .. } => "overlay.generated",
            OverlayEvent::AnchorDeleted { .. } => "anchor.deleted",
        }
    }

    /// JSON body for transports that carry text.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum BusError {
    #[error("event bus is full")]
    Full,
    #[error("event bus has no subscribers")]
    Closed,
}

/// Destination for coordinator events.
pub trait EventBus: Send + Sync {
    fn publish(&self, event: &OverlayEvent) -> Result<(), BusError>;
}

/// In-process bus backed by a crossbeam channel.
pub struct ChannelEventBus {
    sender: Sender<OverlayEvent>,
}

impl ChannelEventBus {
    /// A bus holding at most `capacity` undelivered events.
    pub fn bounded(capacity: usize) -> (Self, Receiver<OverlayEvent>) {
        let (sender, receiver) = bounded(capacity);
        (Self { sender }, receiver)
    }

    pub fn unbounded() -> (Self, Receiver<OverlayEvent>) {
        let (sender, receiver) = unbounded();
        (Self { sender }, receiver)
    }
}

impl EventBus for ChannelEventBus {
    fn publish(&self, event: &OverlayEvent) -> Result<(), BusError> {
        self.sender.try_send(event.clone()).map_err(|e| match e {
            TrySendError::Full(_) => BusError::Full,
            TrySendError::Disconnected(_) => BusError::Closed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deleted() -> OverlayEvent {
        OverlayEvent::AnchorDeleted {
            anchor_id: AnchorId::new(),
            tenant_id: "t1".into(),
        }
    }

    #[test]
    fn test_subjects() {
        assert_eq!(deleted().subject(), "anchor.deleted");
        let optimized = OverlayEvent::AnchorsOptimized {
            site_id: "s".into(),
            tenant_id: "t".into(),
            anchor_ids: vec![],
            optimized_count: 0,
        };
        assert_eq!(optimized.subject(), "anchors.optimized");
    }

    #[test]
    fn test_json_payload_is_tagged() {
        let json = deleted().to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["event"], "anchor_deleted");
        assert_eq!(value["tenant_id"], "t1");
    }

    #[test]
    fn test_bounded_bus_reports_full() {
        let (bus, receiver) = ChannelEventBus::bounded(1);
        bus.publish(&deleted()).unwrap();
        assert_eq!(bus.publish(&deleted()), Err(BusError::Full));
        assert!(receiver.try_recv().is_ok());
    }

    #[test]
    fn test_dropped_receiver_reports_closed() {
        let (bus, receiver) = ChannelEventBus::unbounded();
        drop(receiver);
        assert_eq!(bus.publish(&deleted()), Err(BusError::Closed));
    }
}
