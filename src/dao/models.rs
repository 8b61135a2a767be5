use serde::{Deserialize, Serialize};

/// Persisted representation of a trip's shared plan document.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PlanEntity {
    /// Free-form shared notes.
    #[serde(default)]
    pub notes: Vec<NoteEntity>,
    /// Place notes.
    #[serde(default)]
    pub places: Vec<PlaceNoteEntity>,
    /// Transit legs.
    #[serde(default)]
    pub transits: Vec<TransitEntity>,
    /// Itinerary entries.
    #[serde(default)]
    pub itineraries: Vec<ItineraryEntity>,
    /// Scalar budget.
    #[serde(default)]
    pub budget: BudgetEntity,
    /// Recorded expenses.
    #[serde(default)]
    pub expenses: Vec<ExpenseEntity>,
}

/// Persisted scalar budget, an amount or a free-form label.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum BudgetEntity {
    /// Numeric budget amount.
    Amount(f64),
    /// Free-form budget label.
    Label(String),
}

impl Default for BudgetEntity {
    fn default() -> Self {
        BudgetEntity::Amount(0.0)
    }
}

/// Persisted shared note.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NoteEntity {
    /// Identifier, unique within the section.
    pub id: String,
    /// Note text.
    pub content: String,
    /// Display name of the author, when known.
    pub author: Option<String>,
}

/// Persisted place note.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlaceNoteEntity {
    /// Identifier, unique within the section.
    pub id: String,
    /// Display name of the place.
    pub name: String,
    /// Free-form note about the place.
    pub note: String,
    /// Whether the group already visited the place.
    pub visited: bool,
}

/// Persisted transit leg.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransitEntity {
    /// Identifier, unique within the section.
    pub id: String,
    /// Mode of transport.
    pub mode: String,
    /// Departure location.
    pub departure: String,
    /// Arrival location.
    pub arrival: String,
    /// Optional departure time.
    pub departs_at: Option<String>,
}

/// Persisted itinerary entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ItineraryEntity {
    /// Identifier, unique within the section.
    pub id: String,
    /// Short description of the activity.
    pub title: String,
    /// Day the entry belongs to.
    pub day: Option<String>,
    /// Display name of the creator, when known.
    pub created_by: Option<String>,
    /// RFC3339 creation timestamp, when known.
    pub created_at: Option<String>,
}

/// Persisted expense.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExpenseEntity {
    /// Identifier, unique within the section.
    pub id: String,
    /// What the money was spent on.
    pub label: String,
    /// Amount spent.
    pub amount: f64,
    /// Display name of the tripmate who paid.
    pub paid_by: Option<String>,
}

/// Trip membership record maintained by the surrounding application; this
/// service only reads it to authorize plan-room joins.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TripEntity {
    /// Trip identifier.
    pub id: String,
    /// Display name of the trip.
    #[serde(default)]
    pub name: String,
    /// Email addresses of the users allowed to edit this trip's plan.
    #[serde(default)]
    pub tripmates: Vec<String>,
}
