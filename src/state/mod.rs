//! Shared in-process state: the plan store, trip rooms, and the installable
//! storage backend handle.

pub mod plan;
pub mod rooms;

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, RwLock, watch};

use crate::{config::AppConfig, dao::plan_store::PlanStore, error::ServiceError};

pub use self::plan::{Plan, PlanState};
pub use self::rooms::{RoomEvent, RoomRegistry};

/// Cheaply clonable handle to the process-wide [`AppState`].
pub type SharedState = Arc<AppState>;

/// Central application state storing per-trip plan records, broadcast rooms,
/// and the storage backend handle.
pub struct AppState {
    config: AppConfig,
    plan_store: RwLock<Option<Arc<dyn PlanStore>>>,
    plans: DashMap<String, Arc<Mutex<PlanState>>>,
    rooms: RoomRegistry,
    degraded: watch::Sender<bool>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        Arc::new(Self {
            rooms: RoomRegistry::new(config.room_capacity()),
            config,
            plan_store: RwLock::new(None),
            plans: DashMap::new(),
            degraded: degraded_tx,
        })
    }

    /// Immutable runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Obtain a handle to the current plan store, if one is installed.
    pub async fn plan_store(&self) -> Option<Arc<dyn PlanStore>> {
        let guard = self.plan_store.read().await;
        guard.as_ref().cloned()
    }

    /// Obtain the current plan store or fail with [`ServiceError::Degraded`].
    pub async fn require_plan_store(&self) -> Result<Arc<dyn PlanStore>, ServiceError> {
        self.plan_store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a new plan store implementation and leave degraded mode.
    pub async fn install_plan_store(&self, store: Arc<dyn PlanStore>) {
        {
            let mut guard = self.plan_store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false);
    }

    /// Remove the current plan store and enter degraded mode.
    pub async fn clear_plan_store(&self) {
        {
            let mut guard = self.plan_store.write().await;
            guard.take();
        }
        self.update_degraded(true);
    }

    /// Current degraded flag.
    pub fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Update the degraded flag when the value changes.
    pub fn update_degraded(&self, value: bool) {
        if self.is_degraded() == value {
            return;
        }

        let _ = self.degraded.send(value);
    }

    /// Registry of per-trip plan records keyed by trip identifier.
    pub fn plans(&self) -> &DashMap<String, Arc<Mutex<PlanState>>> {
        &self.plans
    }

    /// Fetch the plan record for `trip_id`, if the trip has been activated.
    pub fn plan_record(&self, trip_id: &str) -> Option<Arc<Mutex<PlanState>>> {
        self.plans.get(trip_id).map(|entry| entry.value().clone())
    }

    /// Registry of trip broadcast rooms.
    pub fn rooms(&self) -> &RoomRegistry {
        &self.rooms
    }
}
