use std::{sync::Arc, time::SystemTime};

use dashmap::mapref::entry::Entry;
use tokio::sync::Mutex;

use crate::{
    dto::{
        format_system_time,
        plan::{SectionItem, SectionPatch},
        ws::UserDescriptor,
    },
    error::ServiceError,
    services::flush_scheduler,
    state::{
        SharedState,
        plan::{
            Budget, Expense, ItineraryEntry, Note, PlaceNote, Plan, PlanState, SectionKind,
            Transit, new_item_id,
        },
    },
};

/// Activate a trip for editing, returning the current plan.
///
/// The first activation loads the persisted document through the plan store
/// (or installs an empty default when none exists); later calls return the
/// already-installed record. Wire mutations only reach a trip through this
/// path, so a lazily-created empty plan can never shadow persisted data.
pub async fn open_for_editing(state: &SharedState, trip_id: &str) -> Result<Plan, ServiceError> {
    if let Some(record) = state.plan_record(trip_id) {
        let guard = record.lock().await;
        return Ok(guard.plan.clone());
    }

    let store = state.require_plan_store().await?;
    let loaded = store.find_plan(trip_id.to_owned()).await?;
    let plan: Plan = loaded.map(Into::into).unwrap_or_default();

    // Another task may have activated the trip while we were loading; the
    // first installer wins and later openers read its record.
    let record = match state.plans().entry(trip_id.to_owned()) {
        Entry::Occupied(slot) => slot.get().clone(),
        Entry::Vacant(slot) => {
            let record = Arc::new(Mutex::new(PlanState::hydrated(plan)));
            slot.insert(record.clone());
            record
        }
    };

    let guard = record.lock().await;
    Ok(guard.plan.clone())
}

/// Install a plan loaded out of band, overwriting any existing record.
pub fn hydrate(state: &SharedState, trip_id: &str, plan: Plan) {
    state
        .plans()
        .insert(trip_id.to_owned(), Arc::new(Mutex::new(PlanState::hydrated(plan))));
}

/// Fetch the plan record for `trip_id`, registering an empty one on first use.
pub fn get_or_create(state: &SharedState, trip_id: &str) -> Arc<Mutex<PlanState>> {
    state.plans().entry(trip_id.to_owned()).or_default().clone()
}

/// Apply an add command to one section of a trip's plan.
///
/// Array sections get a server-assigned id; the `notes` and `itineraries`
/// sections are additionally stamped with the acting tripmate's display name
/// (and, for itineraries, a creation timestamp) when an actor is supplied.
/// The scalar `budget` section is replaced outright. Returns the finalized
/// section item for broadcast.
pub async fn add_item(
    state: &SharedState,
    trip_id: &str,
    patch: SectionPatch,
    actor: Option<&UserDescriptor>,
) -> Result<SectionItem, ServiceError> {
    let record = get_or_create(state, trip_id);
    let added = {
        let mut guard = record.lock().await;
        let added = match patch {
            SectionPatch::Notes(patch) => {
                let note = Note {
                    id: new_item_id(),
                    content: patch.content.unwrap_or_default(),
                    author: actor.map(|user| user.full_name.clone()).or(patch.author),
                };
                guard.plan.notes.push(note.clone());
                SectionItem::Notes(note)
            }
            SectionPatch::Places(patch) => {
                let place = PlaceNote {
                    id: new_item_id(),
                    name: patch.name.unwrap_or_default(),
                    note: patch.note.unwrap_or_default(),
                    visited: patch.visited.unwrap_or(false),
                };
                guard.plan.places.push(place.clone());
                SectionItem::Places(place)
            }
            SectionPatch::Transits(patch) => {
                let transit = Transit {
                    id: new_item_id(),
                    mode: patch.mode.unwrap_or_default(),
                    departure: patch.departure.unwrap_or_default(),
                    arrival: patch.arrival.unwrap_or_default(),
                    departs_at: patch.departs_at,
                };
                guard.plan.transits.push(transit.clone());
                SectionItem::Transits(transit)
            }
            SectionPatch::Itineraries(patch) => {
                let entry = ItineraryEntry {
                    id: new_item_id(),
                    title: patch.title.unwrap_or_default(),
                    day: patch.day,
                    created_by: actor.map(|user| user.full_name.clone()),
                    created_at: actor.map(|_| format_system_time(SystemTime::now())),
                };
                guard.plan.itineraries.push(entry.clone());
                SectionItem::Itineraries(entry)
            }
            SectionPatch::Budget(value) => {
                let budget = budget_from_value(value)?;
                guard.plan.budget = budget.clone();
                SectionItem::Budget(budget)
            }
            SectionPatch::Expenses(patch) => {
                let expense = Expense {
                    id: new_item_id(),
                    label: patch.label.unwrap_or_default(),
                    amount: patch.amount.unwrap_or(0.0),
                    paid_by: patch.paid_by,
                };
                guard.plan.expenses.push(expense.clone());
                SectionItem::Expenses(expense)
            }
        };
        guard.last_actor = actor.map(|user| user.id.clone());
        added
    };

    flush_scheduler::arm(state, trip_id).await;
    Ok(added)
}

/// Apply an update command: shallow-merge the patch into the item matching
/// its id.
///
/// Unknown ids fall through silently so redelivered updates stay idempotent;
/// the scheduler is armed either way. The scalar `budget` section cannot be
/// updated, only re-added.
pub async fn update_item(
    state: &SharedState,
    trip_id: &str,
    patch: &SectionPatch,
) -> Result<(), ServiceError> {
    let record = get_or_create(state, trip_id);
    {
        let mut guard = record.lock().await;
        let plan = &mut guard.plan;
        match patch {
            SectionPatch::Budget(_) => {
                return Err(ServiceError::UnsupportedSection(SectionKind::Budget));
            }
            SectionPatch::Notes(patch) => {
                if let Some(note) = find_by_id(&mut plan.notes, patch.id.as_deref(), |n| &n.id) {
                    merge_field(&mut note.content, &patch.content);
                    merge_optional_field(&mut note.author, &patch.author);
                }
            }
            SectionPatch::Places(patch) => {
                if let Some(place) = find_by_id(&mut plan.places, patch.id.as_deref(), |p| &p.id) {
                    merge_field(&mut place.name, &patch.name);
                    merge_field(&mut place.note, &patch.note);
                    if let Some(visited) = patch.visited {
                        place.visited = visited;
                    }
                }
            }
            SectionPatch::Transits(patch) => {
                if let Some(transit) = find_by_id(&mut plan.transits, patch.id.as_deref(), |t| &t.id)
                {
                    merge_field(&mut transit.mode, &patch.mode);
                    merge_field(&mut transit.departure, &patch.departure);
                    merge_field(&mut transit.arrival, &patch.arrival);
                    merge_optional_field(&mut transit.departs_at, &patch.departs_at);
                }
            }
            SectionPatch::Itineraries(patch) => {
                if let Some(entry) =
                    find_by_id(&mut plan.itineraries, patch.id.as_deref(), |e| &e.id)
                {
                    merge_field(&mut entry.title, &patch.title);
                    merge_optional_field(&mut entry.day, &patch.day);
                }
            }
            SectionPatch::Expenses(patch) => {
                if let Some(expense) = find_by_id(&mut plan.expenses, patch.id.as_deref(), |e| &e.id)
                {
                    merge_field(&mut expense.label, &patch.label);
                    if let Some(amount) = patch.amount {
                        expense.amount = amount;
                    }
                    merge_optional_field(&mut expense.paid_by, &patch.paid_by);
                }
            }
        }
    }

    flush_scheduler::arm(state, trip_id).await;
    Ok(())
}

/// Apply a delete command: remove the first item matching `item_id`.
///
/// Deleting from the scalar `budget` section is a no-op. The scheduler is
/// armed unconditionally.
pub async fn delete_item(
    state: &SharedState,
    trip_id: &str,
    section: SectionKind,
    item_id: &str,
) -> Result<(), ServiceError> {
    let record = get_or_create(state, trip_id);
    {
        let mut guard = record.lock().await;
        let plan = &mut guard.plan;
        match section {
            SectionKind::Notes => remove_by_id(&mut plan.notes, item_id, |n| &n.id),
            SectionKind::Places => remove_by_id(&mut plan.places, item_id, |p| &p.id),
            SectionKind::Transits => remove_by_id(&mut plan.transits, item_id, |t| &t.id),
            SectionKind::Itineraries => remove_by_id(&mut plan.itineraries, item_id, |e| &e.id),
            SectionKind::Expenses => remove_by_id(&mut plan.expenses, item_id, |e| &e.id),
            SectionKind::Budget => {}
        }
    }

    flush_scheduler::arm(state, trip_id).await;
    Ok(())
}

fn budget_from_value(value: serde_json::Value) -> Result<Budget, ServiceError> {
    match value {
        serde_json::Value::Number(number) => number
            .as_f64()
            .map(Budget::Amount)
            .ok_or_else(|| ServiceError::InvalidPayload("budget amount is out of range".into())),
        serde_json::Value::String(label) => Ok(Budget::Label(label)),
        other => Err(ServiceError::InvalidPayload(format!(
            "budget must be a number or string, got {}",
            value_kind(&other)
        ))),
    }
}

fn value_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

fn find_by_id<'a, T>(
    items: &'a mut [T],
    id: Option<&str>,
    item_id: impl Fn(&T) -> &String,
) -> Option<&'a mut T> {
    let id = id?;
    let index = items.iter().position(|item| item_id(item) == id)?;
    items.get_mut(index)
}

fn remove_by_id<T>(items: &mut Vec<T>, id: &str, item_id: impl Fn(&T) -> &String) {
    if let Some(index) = items.iter().position(|item| item_id(item) == id) {
        items.remove(index);
    }
}

fn merge_field(target: &mut String, patch: &Option<String>) {
    if let Some(value) = patch {
        *target = value.clone();
    }
}

fn merge_optional_field(target: &mut Option<String>, patch: &Option<String>) {
    if let Some(value) = patch {
        *target = Some(value.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::AppConfig,
        dto::plan::{ExpensePatch, NotePatch},
        state::AppState,
    };

    fn test_state() -> SharedState {
        AppState::new(AppConfig::default())
    }

    fn test_user() -> UserDescriptor {
        UserDescriptor {
            id: "u1".into(),
            email: "ana@example.com".into(),
            full_name: "Ana".into(),
        }
    }

    fn note_patch(content: &str) -> SectionPatch {
        SectionPatch::Notes(NotePatch {
            content: Some(content.into()),
            ..Default::default()
        })
    }

    async fn notes_of(state: &SharedState, trip_id: &str) -> Vec<Note> {
        let record = state.plan_record(trip_id).expect("trip activated");
        let guard = record.lock().await;
        guard.plan.notes.clone()
    }

    #[tokio::test]
    async fn add_then_delete_restores_section_length() {
        let state = test_state();

        let added = add_item(&state, "trip-1", note_patch("pack sunscreen"), None)
            .await
            .expect("note accepted");
        let id = added.item_id().expect("array sections get an id").to_owned();
        assert_eq!(notes_of(&state, "trip-1").await.len(), 1);

        delete_item(&state, "trip-1", SectionKind::Notes, &id)
            .await
            .expect("delete accepted");
        assert!(notes_of(&state, "trip-1").await.is_empty());
    }

    #[tokio::test]
    async fn update_with_unknown_id_is_a_silent_noop() {
        let state = test_state();
        add_item(&state, "trip-1", note_patch("original"), None)
            .await
            .expect("note accepted");

        let patch = SectionPatch::Notes(NotePatch {
            id: Some("no-such-id".into()),
            content: Some("rewritten".into()),
            ..Default::default()
        });
        update_item(&state, "trip-1", &patch)
            .await
            .expect("unknown ids are not errors");

        let notes = notes_of(&state, "trip-1").await;
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].content, "original");
    }

    #[tokio::test]
    async fn update_merges_only_present_fields() {
        let state = test_state();
        let added = add_item(&state, "trip-1", note_patch("draft"), Some(&test_user()))
            .await
            .expect("note accepted");
        let id = added.item_id().expect("note id").to_owned();

        let patch = SectionPatch::Notes(NotePatch {
            id: Some(id),
            content: Some("final".into()),
            ..Default::default()
        });
        update_item(&state, "trip-1", &patch)
            .await
            .expect("update accepted");

        let notes = notes_of(&state, "trip-1").await;
        assert_eq!(notes[0].content, "final");
        assert_eq!(notes[0].author.as_deref(), Some("Ana"));
    }

    #[tokio::test]
    async fn budget_accepts_numbers_and_strings() {
        let state = test_state();

        add_item(
            &state,
            "trip-1",
            SectionPatch::Budget(serde_json::json!(5000)),
            None,
        )
        .await
        .expect("numeric budget accepted");
        {
            let record = state.plan_record("trip-1").expect("trip activated");
            assert_eq!(record.lock().await.plan.budget, Budget::Amount(5000.0));
        }

        add_item(
            &state,
            "trip-1",
            SectionPatch::Budget(serde_json::json!("low")),
            None,
        )
        .await
        .expect("label budget accepted");
        {
            let record = state.plan_record("trip-1").expect("trip activated");
            assert_eq!(record.lock().await.plan.budget, Budget::Label("low".into()));
        }
    }

    #[tokio::test]
    async fn budget_rejects_non_scalar_payloads() {
        let state = test_state();
        let result = add_item(
            &state,
            "trip-1",
            SectionPatch::Budget(serde_json::json!({ "amount": 5000 })),
            None,
        )
        .await;
        assert!(matches!(result, Err(ServiceError::InvalidPayload(_))));
    }

    #[tokio::test]
    async fn budget_cannot_be_updated() {
        let state = test_state();
        let patch = SectionPatch::Budget(serde_json::json!(100));
        let result = update_item(&state, "trip-1", &patch).await;
        assert!(matches!(
            result,
            Err(ServiceError::UnsupportedSection(SectionKind::Budget))
        ));
    }

    #[tokio::test]
    async fn deleting_from_budget_is_a_noop() {
        let state = test_state();
        add_item(
            &state,
            "trip-1",
            SectionPatch::Budget(serde_json::json!(5000)),
            None,
        )
        .await
        .expect("budget accepted");

        delete_item(&state, "trip-1", SectionKind::Budget, "whatever")
            .await
            .expect("scalar delete is not an error");

        let record = state.plan_record("trip-1").expect("trip activated");
        assert_eq!(record.lock().await.plan.budget, Budget::Amount(5000.0));
    }

    #[tokio::test]
    async fn actor_stamping_applies_to_notes_and_itineraries() {
        let state = test_state();
        let user = test_user();

        let note = add_item(&state, "trip-1", note_patch("pack sunscreen"), Some(&user))
            .await
            .expect("note accepted");
        let SectionItem::Notes(note) = note else {
            panic!("expected a note");
        };
        assert_eq!(note.author.as_deref(), Some("Ana"));

        let entry = add_item(
            &state,
            "trip-1",
            SectionPatch::Itineraries(crate::dto::plan::ItineraryPatch {
                title: Some("Louvre".into()),
                ..Default::default()
            }),
            Some(&user),
        )
        .await
        .expect("entry accepted");
        let SectionItem::Itineraries(entry) = entry else {
            panic!("expected an itinerary entry");
        };
        assert_eq!(entry.created_by.as_deref(), Some("Ana"));
        assert!(entry.created_at.is_some());
    }

    #[tokio::test]
    async fn expense_defaults_fill_missing_fields() {
        let state = test_state();
        let added = add_item(
            &state,
            "trip-1",
            SectionPatch::Expenses(ExpensePatch {
                label: Some("museum tickets".into()),
                amount: Some(34.0),
                ..Default::default()
            }),
            None,
        )
        .await
        .expect("expense accepted");

        let SectionItem::Expenses(expense) = added else {
            panic!("expected an expense");
        };
        assert_eq!(expense.label, "museum tickets");
        assert_eq!(expense.amount, 34.0);
        assert!(expense.paid_by.is_none());
    }

    #[tokio::test]
    async fn hydrated_plans_are_returned_without_a_store() {
        let state = test_state();
        let mut plan = Plan::default();
        plan.notes.push(Note {
            id: "n1".into(),
            content: "from storage".into(),
            author: None,
        });
        hydrate(&state, "trip-1", plan);

        let opened = open_for_editing(&state, "trip-1")
            .await
            .expect("already-activated trips need no store");
        assert_eq!(opened.notes.len(), 1);
        assert_eq!(opened.notes[0].content, "from storage");
    }

    #[tokio::test]
    async fn opening_an_unknown_trip_without_a_store_is_degraded() {
        let state = test_state();
        let result = open_for_editing(&state, "trip-1").await;
        assert!(matches!(result, Err(ServiceError::Degraded)));
    }
}
