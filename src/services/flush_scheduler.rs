use tracing::warn;

use crate::{
    dto::ws::SaveStatus,
    error::ServiceError,
    services::room_events,
    state::{SharedState, plan::Plan},
};

/// Cancel any pending timer for the trip and start a new debounce window.
///
/// Called after every accepted mutation; a burst of edits keeps pushing the
/// window forward so the whole burst is persisted by a single flush.
pub async fn arm(state: &SharedState, trip_id: &str) {
    let Some(record) = state.plan_record(trip_id) else {
        return;
    };
    let delay = state.config().flush_delay();

    let mut guard = record.lock().await;
    guard.cancel_pending_flush();

    let task_state = state.clone();
    let task_trip = trip_id.to_owned();
    guard.pending_flush = Some(tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        // Take this timer out of the record before flushing so a later arm
        // cannot abort an in-flight persistence call.
        if let Some(record) = task_state.plan_record(&task_trip) {
            let mut guard = record.lock().await;
            guard.pending_flush = None;
        }
        let _ = flush(&task_state, &task_trip).await;
    }));
}

/// Persist the trip's current plan, serializing concurrent flush requests.
///
/// A flush arriving while another is in flight queues a single rerun instead
/// of running concurrently; the rerun snapshots the plan at dequeue time.
/// Failures are reported through the room's save status and never block
/// further editing; there is no automatic retry.
pub async fn flush(state: &SharedState, trip_id: &str) -> Result<(), ServiceError> {
    let Some(record) = state.plan_record(trip_id) else {
        return Ok(());
    };

    loop {
        let (snapshot, actor_id) = {
            let mut guard = record.lock().await;
            if guard.saving {
                guard.flush_queued = true;
                return Ok(());
            }
            guard.saving = true;
            (guard.plan.clone(), guard.last_actor.clone())
        };

        room_events::broadcast_save_status(state, trip_id, SaveStatus::Saving, None);
        let result = persist_snapshot(state, trip_id, snapshot, actor_id).await;

        let queued = {
            let mut guard = record.lock().await;
            guard.saving = false;
            std::mem::take(&mut guard.flush_queued)
        };

        match &result {
            Ok(()) => {
                room_events::broadcast_save_status(state, trip_id, SaveStatus::Saved, None);
            }
            Err(err) => {
                warn!(trip_id, error = %err, "plan flush failed");
                room_events::broadcast_save_status(
                    state,
                    trip_id,
                    SaveStatus::Error,
                    Some(err.to_string()),
                );
            }
        }

        if !queued {
            return result;
        }
    }
}

/// Cancel the pending timer and flush immediately.
pub async fn force_flush(state: &SharedState, trip_id: &str) -> Result<(), ServiceError> {
    if let Some(record) = state.plan_record(trip_id) {
        let mut guard = record.lock().await;
        guard.cancel_pending_flush();
    }
    flush(state, trip_id).await
}

/// Whether a flush for the trip is currently in flight.
pub async fn is_saving(state: &SharedState, trip_id: &str) -> bool {
    match state.plan_record(trip_id) {
        Some(record) => record.lock().await.saving,
        None => false,
    }
}

/// Whether a debounce window is currently open for the trip.
pub async fn has_pending_flush(state: &SharedState, trip_id: &str) -> bool {
    match state.plan_record(trip_id) {
        Some(record) => record.lock().await.pending_flush.is_some(),
        None => false,
    }
}

/// Force-flush every trip with an open debounce window; used at shutdown.
pub async fn flush_all(state: &SharedState) {
    let trip_ids: Vec<String> = state
        .plans()
        .iter()
        .map(|entry| entry.key().clone())
        .collect();

    for trip_id in trip_ids {
        if has_pending_flush(state, &trip_id).await {
            if let Err(err) = force_flush(state, &trip_id).await {
                warn!(trip_id = %trip_id, error = %err, "failed to flush plan during shutdown");
            }
        }
    }
}

async fn persist_snapshot(
    state: &SharedState,
    trip_id: &str,
    plan: Plan,
    actor_id: Option<String>,
) -> Result<(), ServiceError> {
    let store = state.require_plan_store().await?;
    store
        .save_plan(trip_id.to_owned(), plan.into(), actor_id)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            Arc,
            atomic::{AtomicUsize, Ordering},
        },
        time::Duration,
    };

    use futures::future::BoxFuture;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::{
            models::{PlanEntity, TripEntity},
            plan_store::PlanStore,
            storage::{StorageError, StorageResult},
        },
        dto::plan::{NotePatch, SectionPatch},
        services::plan_service,
        state::AppState,
    };

    #[derive(Default)]
    struct RecordingStore {
        saves: AtomicUsize,
        fail: bool,
    }

    impl PlanStore for RecordingStore {
        fn save_plan(
            &self,
            _trip_id: String,
            _plan: PlanEntity,
            _actor_id: Option<String>,
        ) -> BoxFuture<'static, StorageResult<()>> {
            self.saves.fetch_add(1, Ordering::SeqCst);
            let fail = self.fail;
            Box::pin(async move {
                if fail {
                    Err(StorageError::unavailable(
                        "disk full".into(),
                        std::io::Error::other("disk full"),
                    ))
                } else {
                    Ok(())
                }
            })
        }

        fn find_plan(
            &self,
            _trip_id: String,
        ) -> BoxFuture<'static, StorageResult<Option<PlanEntity>>> {
            Box::pin(async move { Ok(None) })
        }

        fn find_trip(
            &self,
            _trip_id: String,
        ) -> BoxFuture<'static, StorageResult<Option<TripEntity>>> {
            Box::pin(async move { Ok(None) })
        }

        fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
            Box::pin(async move { Ok(()) })
        }

        fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
            Box::pin(async move { Ok(()) })
        }
    }

    async fn state_with_store(store: Arc<RecordingStore>) -> SharedState {
        let state = AppState::new(AppConfig::default());
        state.install_plan_store(store).await;
        state
    }

    fn note_patch(content: &str) -> SectionPatch {
        SectionPatch::Notes(NotePatch {
            content: Some(content.into()),
            ..Default::default()
        })
    }

    fn status_of(event: &crate::state::rooms::RoomEvent) -> (String, Option<String>) {
        let value: serde_json::Value = serde_json::from_str(&event.data).expect("valid JSON");
        assert_eq!(value["type"], "onSaveStatusChanged");
        (
            value["status"].as_str().expect("status string").to_owned(),
            value
                .get("message")
                .and_then(|m| m.as_str())
                .map(ToOwned::to_owned),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn burst_of_mutations_is_coalesced_into_one_save() {
        let store = Arc::new(RecordingStore::default());
        let state = state_with_store(store.clone()).await;

        for i in 0..19 {
            plan_service::add_item(&state, "trip-1", note_patch(&format!("note {i}")), None)
                .await
                .expect("note accepted");
        }

        tokio::time::sleep(Duration::from_secs(25)).await;
        assert_eq!(store.saves.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn idle_trips_are_never_persisted() {
        let store = Arc::new(RecordingStore::default());
        let state = state_with_store(store.clone()).await;

        plan_service::open_for_editing(&state, "trip-1")
            .await
            .expect("trip opened");

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(store.saves.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn force_flush_persists_immediately_and_cancels_the_window() {
        let store = Arc::new(RecordingStore::default());
        let state = state_with_store(store.clone()).await;

        plan_service::add_item(&state, "trip-1", note_patch("pack sunscreen"), None)
            .await
            .expect("note accepted");

        force_flush(&state, "trip-1").await.expect("flush succeeds");
        assert_eq!(store.saves.load(Ordering::SeqCst), 1);

        // The debounce timer was cancelled, so no second save follows.
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(store.saves.load(Ordering::SeqCst), 1);
        assert!(!has_pending_flush(&state, "trip-1").await);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_flush_reports_error_status_and_does_not_rearm() {
        let store = Arc::new(RecordingStore {
            fail: true,
            ..Default::default()
        });
        let state = state_with_store(store.clone()).await;
        let mut room = state.rooms().join("trip-1");

        plan_service::add_item(&state, "trip-1", note_patch("pack sunscreen"), None)
            .await
            .expect("note accepted");
        tokio::time::sleep(Duration::from_secs(25)).await;

        let (saving, _) = status_of(&room.recv().await.expect("saving status"));
        assert_eq!(saving, "saving");
        let (error, message) = status_of(&room.recv().await.expect("error status"));
        assert_eq!(error, "error");
        assert!(message.is_some_and(|m| !m.is_empty()));

        // No automatic retry: a later mutation or force flush is required.
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(store.saves.load(Ordering::SeqCst), 1);
        assert!(room.try_recv().is_err());
        assert!(!is_saving(&state, "trip-1").await);
    }

    #[tokio::test(start_paused = true)]
    async fn successful_flush_reports_saving_then_saved() {
        let store = Arc::new(RecordingStore::default());
        let state = state_with_store(store.clone()).await;
        let mut room = state.rooms().join("trip-1");

        plan_service::add_item(&state, "trip-1", note_patch("pack sunscreen"), None)
            .await
            .expect("note accepted");
        tokio::time::sleep(Duration::from_secs(25)).await;

        let (first, _) = status_of(&room.recv().await.expect("saving status"));
        let (second, message) = status_of(&room.recv().await.expect("saved status"));
        assert_eq!(first, "saving");
        assert_eq!(second, "saved");
        assert!(message.is_none());
    }

    #[tokio::test]
    async fn flushing_an_unknown_trip_is_a_noop() {
        let store = Arc::new(RecordingStore::default());
        let state = state_with_store(store.clone()).await;

        flush(&state, "ghost-trip").await.expect("noop flush");
        assert_eq!(store.saves.load(Ordering::SeqCst), 0);
    }
}
