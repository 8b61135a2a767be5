use serde::Serialize;
use tracing::warn;

use crate::{
    dto::{
        plan::{SectionItem, SectionPatch},
        ws::{PlanOutboundMessage, SaveStatus, UserDescriptor},
    },
    state::{SharedState, plan::SectionKind, rooms::RoomEvent},
};

/// Broadcast a freshly added item to the trip room, originator included.
pub fn broadcast_item_added(
    state: &SharedState,
    trip_id: &str,
    item: SectionItem,
    added_by: &UserDescriptor,
) {
    let payload = PlanOutboundMessage::OnPlanItemAdded {
        item,
        added_by: added_by.clone(),
    };
    send_room_event(state, trip_id, &payload);
}

/// Broadcast an accepted update, echoing the payload as applied.
pub fn broadcast_item_updated(
    state: &SharedState,
    trip_id: &str,
    item: SectionPatch,
    updated_by: &UserDescriptor,
) {
    let payload = PlanOutboundMessage::OnPlanItemUpdated {
        item,
        updated_by: updated_by.clone(),
    };
    send_room_event(state, trip_id, &payload);
}

/// Broadcast an accepted deletion.
pub fn broadcast_item_deleted(
    state: &SharedState,
    trip_id: &str,
    section: SectionKind,
    item_id: String,
    deleted_by: &UserDescriptor,
) {
    let payload = PlanOutboundMessage::OnPlanItemDeleted {
        section,
        item_id,
        deleted_by: deleted_by.clone(),
    };
    send_room_event(state, trip_id, &payload);
}

/// Relay a save-status transition of the debounced persistence cycle.
pub fn broadcast_save_status(
    state: &SharedState,
    trip_id: &str,
    status: SaveStatus,
    message: Option<String>,
) {
    let payload = PlanOutboundMessage::OnSaveStatusChanged { status, message };
    send_room_event(state, trip_id, &payload);
}

fn send_room_event(state: &SharedState, trip_id: &str, payload: &impl Serialize) {
    match RoomEvent::json(payload) {
        Ok(event) => state.rooms().broadcast(trip_id, event),
        Err(err) => warn!(trip_id, error = %err, "failed to serialize room event"),
    }
}
