use mongodb::bson::{DateTime, Document, doc};
use serde::{Deserialize, Serialize};

use crate::dao::models::{
    BudgetEntity, ExpenseEntity, ItineraryEntity, NoteEntity, PlaceNoteEntity, PlanEntity,
    TripEntity, TransitEntity,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoPlanDocument {
    #[serde(rename = "_id")]
    trip_id: String,
    #[serde(default)]
    notes: Vec<NoteEntity>,
    #[serde(default)]
    places: Vec<PlaceNoteEntity>,
    #[serde(default)]
    transits: Vec<TransitEntity>,
    #[serde(default)]
    itineraries: Vec<ItineraryEntity>,
    #[serde(default)]
    budget: BudgetEntity,
    #[serde(default)]
    expenses: Vec<ExpenseEntity>,
    updated_at: DateTime,
    #[serde(default)]
    last_edited_by: Option<String>,
}

impl MongoPlanDocument {
    /// Build the document persisted for one flush of a trip's plan.
    pub fn new(trip_id: String, plan: PlanEntity, actor_id: Option<String>) -> Self {
        Self {
            trip_id,
            notes: plan.notes,
            places: plan.places,
            transits: plan.transits,
            itineraries: plan.itineraries,
            budget: plan.budget,
            expenses: plan.expenses,
            updated_at: DateTime::now(),
            last_edited_by: actor_id,
        }
    }
}

impl From<MongoPlanDocument> for PlanEntity {
    fn from(value: MongoPlanDocument) -> Self {
        Self {
            notes: value.notes,
            places: value.places,
            transits: value.transits,
            itineraries: value.itineraries,
            budget: value.budget,
            expenses: value.expenses,
        }
    }
}

/// Trip document owned by the surrounding application; only the fields needed
/// for membership checks are mapped.
#[derive(Debug, Clone, Deserialize)]
pub struct MongoTripDocument {
    #[serde(rename = "_id")]
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    tripmates: Vec<String>,
}

impl From<MongoTripDocument> for TripEntity {
    fn from(value: MongoTripDocument) -> Self {
        Self {
            id: value.id,
            name: value.name,
            tripmates: value.tripmates,
        }
    }
}

pub fn doc_id(trip_id: &str) -> Document {
    doc! {"_id": trip_id}
}
