use std::sync::Arc;

use board::{Database, MemoryDatabase};
use tracing::info;

use super::{config::Config, database::RedisDatabase};

pub struct State {
    pub config: Config,
    pub database: Arc<dyn Database>,
}

impl State {
    pub async fn new(config: Config) -> anyhow::Result<Arc<Self>> {
        let database: Arc<dyn Database> = match &config.redis_url {
            Some(redis_url) => {
                info!("Connecting to redis...");
                Arc::new(RedisDatabase::connect(redis_url).await?)
            }
            None => {
                info!("Using in-memory database");
                Arc::new(MemoryDatabase::new())
            }
        };

        Ok(Self::with_database(config, database))
    }

    pub fn with_database(config: Config, database: Arc<dyn Database>) -> Arc<Self> {
        Arc::new(Self { config, database })
    }
}
