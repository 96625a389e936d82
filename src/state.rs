use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::errors::StoreError;
use crate::service::ProfileService;
use crate::storage::{JsonFileStore, JsonlHistory};
use std::sync::Arc;

pub type Service = ProfileService<JsonFileStore, JsonlHistory>;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<Service>,
}

impl AppState {
    pub fn new(
        store: JsonFileStore,
        history: JsonlHistory,
        clock: Arc<dyn Clock>,
        config: &Config,
    ) -> Self {
        Self {
            service: Arc::new(ProfileService::new(store, history, clock, config.reset_policy)),
        }
    }

    pub async fn from_config(config: &Config) -> Result<Self, StoreError> {
        let store = JsonFileStore::open(config.data_path.clone()).await?;
        let history = JsonlHistory::new(config.history_path.clone());
        Ok(Self::new(store, history, Arc::new(SystemClock), config))
    }
}
