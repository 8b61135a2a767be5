use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::{
    dto::{
        plan::{SectionItem, SectionPatch},
        validation::{validate_email, validate_trip_id},
    },
    state::plan::SectionKind,
};

/// Identity asserted by a connecting client and echoed on broadcast events.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserDescriptor {
    /// User identifier in the surrounding application.
    pub id: String,
    /// Email address checked against the trip's tripmate list.
    pub email: String,
    /// Display name stamped onto authored items.
    pub full_name: String,
}

/// Error raised when an inbound frame cannot be accepted.
#[derive(Debug, Error)]
pub enum ParseMessageError {
    /// The frame was not valid JSON for any known command.
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),
    /// The join handshake carried unusable field values.
    #[error("invalid handshake: {0}")]
    InvalidHandshake(String),
}

/// Messages accepted from plan WebSocket clients.
#[derive(Debug, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum PlanInboundMessage {
    /// Authorization handshake; must be the first frame on the socket.
    Join {
        /// Trip whose room the client wants to join.
        trip_id: String,
        /// Identity of the connecting tripmate.
        user: UserDescriptor,
    },
    /// Add an item to a section (or replace the scalar budget).
    PlanItemAdded {
        /// Section-tagged payload.
        #[serde(flatten)]
        patch: SectionPatch,
    },
    /// Merge fields into an existing section item.
    PlanItemUpdated {
        /// Section-tagged payload carrying the target id.
        #[serde(flatten)]
        patch: SectionPatch,
    },
    /// Remove an item from a section.
    PlanItemDeleted {
        /// Section to remove from.
        section: SectionKind,
        /// Identifier of the item to remove.
        item_id: String,
    },
    /// Liveness probe, echoed back as `pong`.
    Ping,
}

impl PlanInboundMessage {
    /// Parse a text frame and validate handshake fields when applicable.
    pub fn from_json_str(raw: &str) -> Result<Self, ParseMessageError> {
        let message: Self = serde_json::from_str(raw)?;

        if let PlanInboundMessage::Join { trip_id, user } = &message {
            validate_trip_id(trip_id)
                .and_then(|()| validate_email(&user.email))
                .map_err(|err| ParseMessageError::InvalidHandshake(err.to_string()))?;
        }

        Ok(message)
    }
}

/// Current state of the debounced persistence cycle for a trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SaveStatus {
    /// A flush is in flight.
    Saving,
    /// The last flush completed.
    Saved,
    /// The last flush failed; the in-memory plan is still editable.
    Error,
}

/// Messages pushed to plan WebSocket clients.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum PlanOutboundMessage {
    /// A tripmate added an item; carries the server-assigned id.
    OnPlanItemAdded {
        /// Finalized section-tagged item.
        #[serde(flatten)]
        item: SectionItem,
        /// Tripmate who added the item.
        added_by: UserDescriptor,
    },
    /// A tripmate updated an item; echoes the accepted payload.
    OnPlanItemUpdated {
        /// Section-tagged payload as applied.
        #[serde(flatten)]
        item: SectionPatch,
        /// Tripmate who updated the item.
        updated_by: UserDescriptor,
    },
    /// A tripmate removed an item.
    OnPlanItemDeleted {
        /// Section the item was removed from.
        section: SectionKind,
        /// Identifier of the removed item.
        item_id: String,
        /// Tripmate who removed the item.
        deleted_by: UserDescriptor,
    },
    /// The persistence cycle for this trip changed state.
    OnSaveStatusChanged {
        /// New status.
        status: SaveStatus,
        /// Failure message, present for `error`.
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    /// The join handshake was rejected; the socket closes after this frame.
    UnauthorizedJoin {
        /// Human-readable rejection reason.
        reason: String,
    },
    /// A mutation command was rejected; nothing was applied or broadcast.
    CommandRejected {
        /// Human-readable rejection reason.
        message: String,
    },
    /// Reply to a client `ping`.
    Pong,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_handshake_parses_with_all_fields() {
        let message = PlanInboundMessage::from_json_str(
            r#"{
                "type": "join",
                "tripId": "trip-1",
                "user": { "id": "u1", "email": "ana@example.com", "fullName": "Ana" }
            }"#,
        )
        .expect("valid handshake");

        let PlanInboundMessage::Join { trip_id, user } = message else {
            panic!("expected a join message");
        };
        assert_eq!(trip_id, "trip-1");
        assert_eq!(user.full_name, "Ana");
    }

    #[test]
    fn join_handshake_without_user_is_rejected() {
        let result =
            PlanInboundMessage::from_json_str(r#"{ "type": "join", "tripId": "trip-1" }"#);
        assert!(matches!(result, Err(ParseMessageError::Malformed(_))));
    }

    #[test]
    fn join_handshake_with_garbage_email_is_rejected() {
        let result = PlanInboundMessage::from_json_str(
            r#"{
                "type": "join",
                "tripId": "trip-1",
                "user": { "id": "u1", "email": "not-an-email", "fullName": "Ana" }
            }"#,
        );
        assert!(matches!(result, Err(ParseMessageError::InvalidHandshake(_))));
    }

    #[test]
    fn add_command_parses_into_section_patch() {
        let message = PlanInboundMessage::from_json_str(
            r#"{
                "type": "planItemAdded",
                "section": "notes",
                "item": { "content": "pack sunscreen" }
            }"#,
        )
        .expect("valid command");

        let PlanInboundMessage::PlanItemAdded { patch } = message else {
            panic!("expected an add command");
        };
        assert_eq!(patch.kind(), SectionKind::Notes);
    }

    #[test]
    fn delete_command_parses_section_and_item_id() {
        let message = PlanInboundMessage::from_json_str(
            r#"{ "type": "planItemDeleted", "section": "notes", "itemId": "n1" }"#,
        )
        .expect("valid command");

        let PlanInboundMessage::PlanItemDeleted { section, item_id } = message else {
            panic!("expected a delete command");
        };
        assert_eq!(section, SectionKind::Notes);
        assert_eq!(item_id, "n1");
    }

    #[test]
    fn ping_parses() {
        let message =
            PlanInboundMessage::from_json_str(r#"{ "type": "ping" }"#).expect("valid command");
        assert!(matches!(message, PlanInboundMessage::Ping));
    }

    #[test]
    fn added_event_serializes_section_item_and_actor() {
        let event = PlanOutboundMessage::OnPlanItemAdded {
            item: crate::dto::plan::SectionItem::Notes(crate::state::plan::Note {
                id: "n1".into(),
                content: "pack sunscreen".into(),
                author: Some("Ana".into()),
            }),
            added_by: UserDescriptor {
                id: "u1".into(),
                email: "ana@example.com".into(),
                full_name: "Ana".into(),
            },
        };

        let value = serde_json::to_value(&event).expect("serializable");
        assert_eq!(value["type"], "onPlanItemAdded");
        assert_eq!(value["section"], "notes");
        assert_eq!(value["item"]["id"], "n1");
        assert_eq!(value["addedBy"]["fullName"], "Ana");
    }

    #[test]
    fn save_status_event_omits_absent_message() {
        let event = PlanOutboundMessage::OnSaveStatusChanged {
            status: SaveStatus::Saved,
            message: None,
        };
        let value = serde_json::to_value(&event).expect("serializable");
        assert_eq!(value["status"], "saved");
        assert!(value.get("message").is_none());
    }
}
