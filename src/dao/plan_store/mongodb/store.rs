use std::sync::Arc;

use futures::future::BoxFuture;
use mongodb::{Client, Collection, Database, bson::doc, options::IndexOptions};
use tokio::{sync::RwLock, time::sleep};

use super::{
    config::MongoConfig,
    error::{MongoDaoError, MongoResult},
    models::{MongoPlanDocument, MongoTripDocument, doc_id},
};
use crate::dao::{
    models::{PlanEntity, TripEntity},
    plan_store::PlanStore,
    storage::StorageResult,
};

const PLAN_COLLECTION_NAME: &str = "plans";
const TRIP_COLLECTION_NAME: &str = "trips";

/// MongoDB-backed implementation of [`PlanStore`].
#[derive(Clone)]
pub struct MongoPlanStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    client: Client,
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (client, database) = establish_connection(&self.config).await?;
        let mut guard = self.state.write().await;
        guard.client = client;
        guard.database = database;
        Ok(())
    }
}

/// Build a client from the config and ping the database until it answers,
/// backing off between attempts within the configured bounds.
async fn establish_connection(config: &MongoConfig) -> MongoResult<(Client, Database)> {
    let client = Client::with_options(config.options.clone())
        .map_err(|source| MongoDaoError::ClientConstruction { source })?;
    let database = client.database(&config.database_name);

    let mut attempts = 0;
    let mut delay = config.initial_retry_delay;

    loop {
        match database.run_command(doc! { "ping": 1 }).await {
            Ok(_) => return Ok((client, database)),
            Err(err) => {
                attempts += 1;
                if attempts >= config.connect_attempts {
                    return Err(MongoDaoError::InitialPing {
                        attempts,
                        source: err,
                    });
                }
                sleep(delay).await;
                delay = (delay * 2).min(config.max_retry_delay);
            }
        }
    }
}

impl MongoPlanStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) = establish_connection(&config).await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { client, database }),
            config,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let database = self.database().await;

        // Plans are keyed by trip id (`_id`); the secondary index supports
        // housekeeping queries over recently edited plans.
        let collection = database.collection::<mongodb::bson::Document>(PLAN_COLLECTION_NAME);
        let index = mongodb::IndexModel::builder()
            .keys(doc! {"updated_at": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("plan_updated_idx".to_owned()))
                    .build(),
            )
            .build();

        collection
            .create_index(index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: PLAN_COLLECTION_NAME,
                index: "updated_at",
                source,
            })?;

        Ok(())
    }

    async fn database(&self) -> Database {
        let guard = self.inner.state.read().await;
        guard.database.clone()
    }

    async fn plan_collection(&self) -> Collection<MongoPlanDocument> {
        let guard = self.inner.state.read().await;
        guard
            .database
            .collection::<MongoPlanDocument>(PLAN_COLLECTION_NAME)
    }

    async fn trip_collection(&self) -> Collection<MongoTripDocument> {
        let guard = self.inner.state.read().await;
        guard
            .database
            .collection::<MongoTripDocument>(TRIP_COLLECTION_NAME)
    }

    async fn save_plan(
        &self,
        trip_id: String,
        plan: PlanEntity,
        actor_id: Option<String>,
    ) -> MongoResult<()> {
        let document = MongoPlanDocument::new(trip_id.clone(), plan, actor_id);
        let collection = self.plan_collection().await;
        collection
            .replace_one(doc_id(&trip_id), &document)
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::SavePlan { trip_id, source })?;

        Ok(())
    }

    async fn find_plan(&self, trip_id: String) -> MongoResult<Option<PlanEntity>> {
        let collection = self.plan_collection().await;

        let document = collection
            .find_one(doc_id(&trip_id))
            .await
            .map_err(|source| MongoDaoError::LoadPlan { trip_id, source })?;

        Ok(document.map(Into::into))
    }

    async fn find_trip(&self, trip_id: String) -> MongoResult<Option<TripEntity>> {
        let collection = self.trip_collection().await;

        let document = collection
            .find_one(doc_id(&trip_id))
            .await
            .map_err(|source| MongoDaoError::LoadTrip { trip_id, source })?;

        Ok(document.map(Into::into))
    }
}

impl PlanStore for MongoPlanStore {
    fn save_plan(
        &self,
        trip_id: String,
        plan: PlanEntity,
        actor_id: Option<String>,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .save_plan(trip_id, plan, actor_id)
                .await
                .map_err(Into::into)
        })
    }

    fn find_plan(&self, trip_id: String) -> BoxFuture<'static, StorageResult<Option<PlanEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_plan(trip_id).await.map_err(Into::into) })
    }

    fn find_trip(&self, trip_id: String) -> BoxFuture<'static, StorageResult<Option<TripEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_trip(trip_id).await.map_err(Into::into) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
