#[cfg(feature = "mongo-store")]
pub mod mongodb;

use futures::future::BoxFuture;

use crate::dao::models::{PlanEntity, TripEntity};
use crate::dao::storage::StorageResult;

/// Abstraction over the persistence layer for plan documents and trip
/// membership lookups.
pub trait PlanStore: Send + Sync {
    /// Upsert the plan document for `trip_id`, optionally recording the last
    /// editing tripmate.
    fn save_plan(
        &self,
        trip_id: String,
        plan: PlanEntity,
        actor_id: Option<String>,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Load the plan document for `trip_id`, if one has been persisted.
    fn find_plan(&self, trip_id: String) -> BoxFuture<'static, StorageResult<Option<PlanEntity>>>;
    /// Load the trip membership record for `trip_id`.
    fn find_trip(&self, trip_id: String) -> BoxFuture<'static, StorageResult<Option<TripEntity>>>;
    /// Cheap liveness probe against the backend.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    /// Attempt to re-establish a dropped backend connection.
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
