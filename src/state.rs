use std::sync::Arc;

use crate::backend::Database;
use crate::config::Config;
use crate::metadata::{FetchError, MetadataFetcher};

pub struct AppState {
    pub config: Config,
    pub database: Database,
    pub fetcher: MetadataFetcher,
}

impl AppState {
    pub fn new(config: Config, database: Database) -> Result<Arc<Self>, FetchError> {
        let fetcher = MetadataFetcher::new(&config.fetch)?;

        Ok(Arc::new(Self {
            config,
            database,
            fetcher,
        }))
    }
}
