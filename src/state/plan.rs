use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::dao::models::{
    BudgetEntity, ExpenseEntity, ItineraryEntity, NoteEntity, PlaceNoteEntity, PlanEntity,
    TransitEntity,
};

/// Named part of a [`Plan`]. Five sections hold ordered item collections,
/// `budget` is a single scalar value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum SectionKind {
    /// Free-form shared notes.
    Notes,
    /// Place notes with a visited flag.
    Places,
    /// Transit legs between locations.
    Transits,
    /// Day-by-day itinerary entries.
    Itineraries,
    /// Scalar trip budget.
    Budget,
    /// Recorded expenses.
    Expenses,
}

impl SectionKind {
    /// Wire name of the section, matching the serde representation.
    pub fn as_str(self) -> &'static str {
        match self {
            SectionKind::Notes => "notes",
            SectionKind::Places => "places",
            SectionKind::Transits => "transits",
            SectionKind::Itineraries => "itineraries",
            SectionKind::Budget => "budget",
            SectionKind::Expenses => "expenses",
        }
    }

    /// Whether this section holds a single scalar instead of an item collection.
    pub fn is_scalar(self) -> bool {
        matches!(self, SectionKind::Budget)
    }
}

impl fmt::Display for SectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scalar budget of a plan, either an amount or a free-form label.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(untagged)]
pub enum Budget {
    /// Numeric budget amount.
    Amount(f64),
    /// Free-form budget label such as `"low"`.
    Label(String),
}

impl Default for Budget {
    fn default() -> Self {
        Budget::Amount(0.0)
    }
}

/// Shared note visible to all tripmates.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    /// Server-assigned identifier, unique within the section.
    pub id: String,
    /// Note text.
    pub content: String,
    /// Display name of the tripmate who wrote the note.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
}

/// Note attached to a place the group considers visiting.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlaceNote {
    /// Server-assigned identifier, unique within the section.
    pub id: String,
    /// Display name of the place.
    pub name: String,
    /// Free-form note about the place.
    pub note: String,
    /// Whether the group already visited the place.
    pub visited: bool,
}

/// Transit leg between two locations.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Transit {
    /// Server-assigned identifier, unique within the section.
    pub id: String,
    /// Mode of transport (flight, train, bus, ...).
    pub mode: String,
    /// Departure location.
    pub departure: String,
    /// Arrival location.
    pub arrival: String,
    /// Optional departure time as entered by a tripmate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub departs_at: Option<String>,
}

/// Single entry of the day-by-day itinerary.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ItineraryEntry {
    /// Server-assigned identifier, unique within the section.
    pub id: String,
    /// Short description of the activity.
    pub title: String,
    /// Day the entry belongs to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub day: Option<String>,
    /// Display name of the tripmate who created the entry.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    /// RFC3339 creation timestamp, stamped when the creator is known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

/// Expense recorded against the trip.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Expense {
    /// Server-assigned identifier, unique within the section.
    pub id: String,
    /// What the money was spent on.
    pub label: String,
    /// Amount spent.
    pub amount: f64,
    /// Display name of the tripmate who paid.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paid_by: Option<String>,
}

/// Shared trip-plan document edited collaboratively by a trip's members.
#[derive(Debug, Clone, Default, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    /// Free-form shared notes.
    pub notes: Vec<Note>,
    /// Place notes.
    pub places: Vec<PlaceNote>,
    /// Transit legs.
    pub transits: Vec<Transit>,
    /// Itinerary entries.
    pub itineraries: Vec<ItineraryEntry>,
    /// Scalar budget.
    pub budget: Budget,
    /// Recorded expenses.
    pub expenses: Vec<Expense>,
}

/// Allocate a fresh identifier for a newly added section item.
pub fn new_item_id() -> String {
    Uuid::new_v4().to_string()
}

/// Per-trip record owned by the plan store: the live document plus the
/// debounce and save bookkeeping used by the flush scheduler.
#[derive(Debug, Default)]
pub struct PlanState {
    /// The live in-memory plan, authoritative while the process runs.
    pub plan: Plan,
    /// Handle of the pending debounce timer, if a flush is scheduled.
    pub pending_flush: Option<JoinHandle<()>>,
    /// Set while a flush for this trip is in flight.
    pub saving: bool,
    /// Set when a flush was requested while another was in flight; the
    /// running flush performs one more pass with a fresh snapshot.
    pub flush_queued: bool,
    /// Identifier of the tripmate whose mutation armed the current window.
    pub last_actor: Option<String>,
}

impl PlanState {
    /// Build a record around a plan loaded from storage, with no pending timer.
    pub fn hydrated(plan: Plan) -> Self {
        Self {
            plan,
            ..Self::default()
        }
    }

    /// Abort and clear the pending debounce timer, if any.
    pub fn cancel_pending_flush(&mut self) {
        if let Some(handle) = self.pending_flush.take() {
            handle.abort();
        }
    }
}

impl From<NoteEntity> for Note {
    fn from(value: NoteEntity) -> Self {
        Self {
            id: value.id,
            content: value.content,
            author: value.author,
        }
    }
}

impl From<Note> for NoteEntity {
    fn from(value: Note) -> Self {
        Self {
            id: value.id,
            content: value.content,
            author: value.author,
        }
    }
}

impl From<PlaceNoteEntity> for PlaceNote {
    fn from(value: PlaceNoteEntity) -> Self {
        Self {
            id: value.id,
            name: value.name,
            note: value.note,
            visited: value.visited,
        }
    }
}

impl From<PlaceNote> for PlaceNoteEntity {
    fn from(value: PlaceNote) -> Self {
        Self {
            id: value.id,
            name: value.name,
            note: value.note,
            visited: value.visited,
        }
    }
}

impl From<TransitEntity> for Transit {
    fn from(value: TransitEntity) -> Self {
        Self {
            id: value.id,
            mode: value.mode,
            departure: value.departure,
            arrival: value.arrival,
            departs_at: value.departs_at,
        }
    }
}

impl From<Transit> for TransitEntity {
    fn from(value: Transit) -> Self {
        Self {
            id: value.id,
            mode: value.mode,
            departure: value.departure,
            arrival: value.arrival,
            departs_at: value.departs_at,
        }
    }
}

impl From<ItineraryEntity> for ItineraryEntry {
    fn from(value: ItineraryEntity) -> Self {
        Self {
            id: value.id,
            title: value.title,
            day: value.day,
            created_by: value.created_by,
            created_at: value.created_at,
        }
    }
}

impl From<ItineraryEntry> for ItineraryEntity {
    fn from(value: ItineraryEntry) -> Self {
        Self {
            id: value.id,
            title: value.title,
            day: value.day,
            created_by: value.created_by,
            created_at: value.created_at,
        }
    }
}

impl From<ExpenseEntity> for Expense {
    fn from(value: ExpenseEntity) -> Self {
        Self {
            id: value.id,
            label: value.label,
            amount: value.amount,
            paid_by: value.paid_by,
        }
    }
}

impl From<Expense> for ExpenseEntity {
    fn from(value: Expense) -> Self {
        Self {
            id: value.id,
            label: value.label,
            amount: value.amount,
            paid_by: value.paid_by,
        }
    }
}

impl From<BudgetEntity> for Budget {
    fn from(value: BudgetEntity) -> Self {
        match value {
            BudgetEntity::Amount(amount) => Budget::Amount(amount),
            BudgetEntity::Label(label) => Budget::Label(label),
        }
    }
}

impl From<Budget> for BudgetEntity {
    fn from(value: Budget) -> Self {
        match value {
            Budget::Amount(amount) => BudgetEntity::Amount(amount),
            Budget::Label(label) => BudgetEntity::Label(label),
        }
    }
}

impl From<PlanEntity> for Plan {
    fn from(value: PlanEntity) -> Self {
        Self {
            notes: value.notes.into_iter().map(Into::into).collect(),
            places: value.places.into_iter().map(Into::into).collect(),
            transits: value.transits.into_iter().map(Into::into).collect(),
            itineraries: value.itineraries.into_iter().map(Into::into).collect(),
            budget: value.budget.into(),
            expenses: value.expenses.into_iter().map(Into::into).collect(),
        }
    }
}

impl From<Plan> for PlanEntity {
    fn from(value: Plan) -> Self {
        Self {
            notes: value.notes.into_iter().map(Into::into).collect(),
            places: value.places.into_iter().map(Into::into).collect(),
            transits: value.transits.into_iter().map(Into::into).collect(),
            itineraries: value.itineraries.into_iter().map(Into::into).collect(),
            budget: value.budget.into(),
            expenses: value.expenses.into_iter().map(Into::into).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_plan_is_empty_with_zero_budget() {
        let plan = Plan::default();
        assert!(plan.notes.is_empty());
        assert!(plan.places.is_empty());
        assert!(plan.transits.is_empty());
        assert!(plan.itineraries.is_empty());
        assert!(plan.expenses.is_empty());
        assert_eq!(plan.budget, Budget::Amount(0.0));
    }

    #[test]
    fn section_names_match_wire_representation() {
        let json = serde_json::to_string(&SectionKind::Itineraries).expect("serializable");
        assert_eq!(json, "\"itineraries\"");
        assert_eq!(SectionKind::Itineraries.as_str(), "itineraries");
        assert!(SectionKind::Budget.is_scalar());
        assert!(!SectionKind::Notes.is_scalar());
    }

    #[test]
    fn generated_item_ids_are_unique() {
        assert_ne!(new_item_id(), new_item_id());
    }
}
