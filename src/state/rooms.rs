use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::broadcast;

/// Dispatched payload carried across a trip room, serialized once and fanned
/// out to every member's socket writer.
#[derive(Clone, Debug)]
pub struct RoomEvent {
    /// JSON text frame to push onto each member's connection.
    pub data: String,
}

impl RoomEvent {
    /// Convenience wrapper that serialises `payload` into the event data.
    pub fn json<T>(payload: &T) -> serde_json::Result<Self>
    where
        T: Serialize,
    {
        Ok(Self {
            data: serde_json::to_string(payload)?,
        })
    }
}

/// Registry of per-trip broadcast rooms keyed by trip identifier.
pub struct RoomRegistry {
    rooms: DashMap<String, RoomHub>,
    capacity: usize,
}

impl RoomRegistry {
    /// Build an empty registry whose hubs use the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            rooms: DashMap::new(),
            capacity,
        }
    }

    /// Join the room for `trip_id`, creating it on first use.
    pub fn join(&self, trip_id: &str) -> broadcast::Receiver<RoomEvent> {
        self.rooms
            .entry(trip_id.to_owned())
            .or_insert_with(|| RoomHub::new(self.capacity))
            .subscribe()
    }

    /// Send an event to every current member of the room, if the room exists.
    pub fn broadcast(&self, trip_id: &str, event: RoomEvent) {
        if let Some(hub) = self.rooms.get(trip_id) {
            hub.broadcast(event);
        }
    }

    /// Number of live connections currently joined to the room.
    pub fn member_count(&self, trip_id: &str) -> usize {
        self.rooms
            .get(trip_id)
            .map(|hub| hub.receiver_count())
            .unwrap_or(0)
    }
}

/// Broadcast hub backing a single trip room.
struct RoomHub {
    sender: broadcast::Sender<RoomEvent>,
}

impl RoomHub {
    /// Construct a new hub backed by a Tokio broadcast channel with the given capacity.
    fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Register a new member that will receive subsequent events.
    fn subscribe(&self) -> broadcast::Receiver<RoomEvent> {
        self.sender.subscribe()
    }

    /// Send an event to all current members, ignoring delivery errors.
    fn broadcast(&self, event: RoomEvent) {
        let _ = self.sender.send(event);
    }

    /// Count of live members.
    fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn broadcast_reaches_every_member_including_late_joiners() {
        let registry = RoomRegistry::new(8);
        let mut first = registry.join("trip-1");
        let mut second = registry.join("trip-1");
        assert_eq!(registry.member_count("trip-1"), 2);

        registry.broadcast(
            "trip-1",
            RoomEvent {
                data: "hello".into(),
            },
        );

        assert_eq!(first.recv().await.expect("first member").data, "hello");
        assert_eq!(second.recv().await.expect("second member").data, "hello");
    }

    #[tokio::test]
    async fn rooms_are_isolated_per_trip() {
        let registry = RoomRegistry::new(8);
        let mut member = registry.join("trip-1");
        let _other = registry.join("trip-2");

        registry.broadcast(
            "trip-2",
            RoomEvent {
                data: "elsewhere".into(),
            },
        );

        assert!(member.try_recv().is_err());
        assert_eq!(registry.member_count("trip-2"), 1);
    }
}
