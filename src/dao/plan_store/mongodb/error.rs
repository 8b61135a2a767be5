use mongodb::error::Error as MongoError;
use thiserror::Error;

pub type MongoResult<T> = std::result::Result<T, MongoDaoError>;

#[derive(Debug, Error)]
pub enum MongoDaoError {
    #[error("failed to parse MongoDB connection URI `{uri}`")]
    InvalidUri {
        uri: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to build MongoDB client from options")]
    ClientConstruction {
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping failed during initial connection after {attempts} attempt(s)")]
    InitialPing {
        attempts: u32,
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping health check failed")]
    HealthPing {
        #[source]
        source: MongoError,
    },
    #[error("failed to ensure index `{index}` on collection `{collection}`")]
    EnsureIndex {
        collection: &'static str,
        index: &'static str,
        #[source]
        source: MongoError,
    },
    #[error("failed to save plan for trip `{trip_id}`")]
    SavePlan {
        trip_id: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to load plan for trip `{trip_id}`")]
    LoadPlan {
        trip_id: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to load trip `{trip_id}`")]
    LoadTrip {
        trip_id: String,
        #[source]
        source: MongoError,
    },
}
