use std::time::Duration;

use mongodb::options::ClientOptions;

use super::error::{MongoDaoError, MongoResult};

const DEFAULT_DATABASE_NAME: &str = "tripflow";
const DEFAULT_CONNECT_ATTEMPTS: u32 = 10;
const DEFAULT_INITIAL_RETRY_DELAY: Duration = Duration::from_millis(250);
const DEFAULT_MAX_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Connection settings for the MongoDB plan store.
#[derive(Clone)]
pub struct MongoConfig {
    /// Parsed client options.
    pub options: ClientOptions,
    /// Name of the database holding the plan and trip collections.
    pub database_name: String,
    /// How many ping attempts to make before giving up on a connection.
    pub connect_attempts: u32,
    /// Delay before the first ping retry; doubled on each further attempt.
    pub initial_retry_delay: Duration,
    /// Upper bound on the ping retry delay.
    pub max_retry_delay: Duration,
}

impl MongoConfig {
    /// Parse a connection URI, defaulting the database name when none is given.
    pub async fn from_uri(uri: &str, db_name: Option<&str>) -> MongoResult<Self> {
        let database_name = db_name.unwrap_or(DEFAULT_DATABASE_NAME).to_owned();
        let options =
            ClientOptions::parse(uri)
                .await
                .map_err(|source| MongoDaoError::InvalidUri {
                    uri: uri.to_owned(),
                    source,
                })?;

        Ok(Self {
            options,
            database_name,
            connect_attempts: DEFAULT_CONNECT_ATTEMPTS,
            initial_retry_delay: DEFAULT_INITIAL_RETRY_DELAY,
            max_retry_delay: DEFAULT_MAX_RETRY_DELAY,
        })
    }
}
