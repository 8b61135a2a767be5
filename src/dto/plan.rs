use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::state::plan::{
    Budget, Expense, ItineraryEntry, Note, PlaceNote, Plan, SectionKind, Transit,
};

/// Client-supplied fields for a note item.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotePatch {
    /// Target item for updates; ignored on add.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Note text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Author display name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
}

/// Client-supplied fields for a place note.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacePatch {
    /// Target item for updates; ignored on add.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Display name of the place.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Free-form note about the place.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    /// Visited flag.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visited: Option<bool>,
}

/// Client-supplied fields for a transit leg.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitPatch {
    /// Target item for updates; ignored on add.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Mode of transport.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    /// Departure location.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub departure: Option<String>,
    /// Arrival location.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arrival: Option<String>,
    /// Departure time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub departs_at: Option<String>,
}

/// Client-supplied fields for an itinerary entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItineraryPatch {
    /// Target item for updates; ignored on add.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Short description of the activity.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Day the entry belongs to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub day: Option<String>,
}

/// Client-supplied fields for an expense.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpensePatch {
    /// Target item for updates; ignored on add.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// What the money was spent on.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Amount spent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    /// Display name of the tripmate who paid.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paid_by: Option<String>,
}

/// Section-tagged mutation payload. Each variant carries the patch shape of
/// its section, so a payload can only ever target fields that exist there;
/// the scalar `budget` variant carries the raw value, which the mutation
/// engine validates as number-or-string.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "section", content = "item", rename_all = "camelCase")]
pub enum SectionPatch {
    /// Patch against the notes section.
    Notes(NotePatch),
    /// Patch against the places section.
    Places(PlacePatch),
    /// Patch against the transits section.
    Transits(TransitPatch),
    /// Patch against the itineraries section.
    Itineraries(ItineraryPatch),
    /// Replacement value for the scalar budget.
    Budget(serde_json::Value),
    /// Patch against the expenses section.
    Expenses(ExpensePatch),
}

impl SectionPatch {
    /// Section targeted by this patch.
    pub fn kind(&self) -> SectionKind {
        match self {
            SectionPatch::Notes(_) => SectionKind::Notes,
            SectionPatch::Places(_) => SectionKind::Places,
            SectionPatch::Transits(_) => SectionKind::Transits,
            SectionPatch::Itineraries(_) => SectionKind::Itineraries,
            SectionPatch::Budget(_) => SectionKind::Budget,
            SectionPatch::Expenses(_) => SectionKind::Expenses,
        }
    }

    /// Identifier of the item targeted by an update, when present.
    pub fn item_id(&self) -> Option<&str> {
        match self {
            SectionPatch::Notes(patch) => patch.id.as_deref(),
            SectionPatch::Places(patch) => patch.id.as_deref(),
            SectionPatch::Transits(patch) => patch.id.as_deref(),
            SectionPatch::Itineraries(patch) => patch.id.as_deref(),
            SectionPatch::Budget(_) => None,
            SectionPatch::Expenses(patch) => patch.id.as_deref(),
        }
    }
}

/// Section-tagged finalized item, broadcast to the room after a successful
/// add with its server-assigned id (the budget variant has none).
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "section", content = "item", rename_all = "camelCase")]
pub enum SectionItem {
    /// Finalized note.
    Notes(Note),
    /// Finalized place note.
    Places(PlaceNote),
    /// Finalized transit leg.
    Transits(Transit),
    /// Finalized itinerary entry.
    Itineraries(ItineraryEntry),
    /// Accepted budget value.
    Budget(Budget),
    /// Finalized expense.
    Expenses(Expense),
}

impl SectionItem {
    /// Section this item belongs to.
    pub fn kind(&self) -> SectionKind {
        match self {
            SectionItem::Notes(_) => SectionKind::Notes,
            SectionItem::Places(_) => SectionKind::Places,
            SectionItem::Transits(_) => SectionKind::Transits,
            SectionItem::Itineraries(_) => SectionKind::Itineraries,
            SectionItem::Budget(_) => SectionKind::Budget,
            SectionItem::Expenses(_) => SectionKind::Expenses,
        }
    }

    /// Server-assigned identifier, absent for the scalar budget.
    pub fn item_id(&self) -> Option<&str> {
        match self {
            SectionItem::Notes(item) => Some(&item.id),
            SectionItem::Places(item) => Some(&item.id),
            SectionItem::Transits(item) => Some(&item.id),
            SectionItem::Itineraries(item) => Some(&item.id),
            SectionItem::Budget(_) => None,
            SectionItem::Expenses(item) => Some(&item.id),
        }
    }
}

/// Plan snapshot returned by the REST "open plan" route.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlanSnapshot {
    /// Trip the plan belongs to.
    pub trip_id: String,
    /// Current in-memory plan document.
    pub plan: Plan,
}

/// Acknowledgement returned by the explicit save route.
#[derive(Debug, Serialize, ToSchema)]
pub struct SaveAck {
    /// Outcome of the forced flush ("saved").
    pub status: String,
}

impl SaveAck {
    /// Acknowledge a completed flush.
    pub fn saved() -> Self {
        Self {
            status: "saved".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn section_patch_parses_tagged_payload() {
        let patch: SectionPatch = serde_json::from_str(
            r#"{ "section": "notes", "item": { "content": "pack sunscreen" } }"#,
        )
        .expect("valid patch");
        assert_eq!(patch.kind(), SectionKind::Notes);
        assert_eq!(patch.item_id(), None);
        let SectionPatch::Notes(note) = patch else {
            panic!("expected a notes patch");
        };
        assert_eq!(note.content.as_deref(), Some("pack sunscreen"));
    }

    #[test]
    fn budget_patch_keeps_raw_value() {
        let patch: SectionPatch =
            serde_json::from_str(r#"{ "section": "budget", "item": 5000 }"#).expect("valid patch");
        let SectionPatch::Budget(value) = patch else {
            panic!("expected a budget patch");
        };
        assert_eq!(value, serde_json::json!(5000));
    }

    #[test]
    fn section_item_serializes_with_tag_and_id() {
        let item = SectionItem::Notes(Note {
            id: "n1".into(),
            content: "pack sunscreen".into(),
            author: None,
        });
        let value = serde_json::to_value(&item).expect("serializable");
        assert_eq!(value["section"], "notes");
        assert_eq!(value["item"]["id"], "n1");
    }
}
