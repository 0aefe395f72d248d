//! Context shared by every request, built once at startup.

use sqlx::PgPool;
use std::sync::Arc;

use crate::auth::Authorizer;
use crate::config::{ApiConfig, AppConfig};
use crate::resource::{ResourceError, ResourceStore, StoreOptions};

#[derive(Clone)]
pub struct AppState {
    pub store: ResourceStore,
    pub authorizer: Authorizer,
    pub api: Arc<ApiConfig>,
}

impl AppState {
    pub fn new(config: &AppConfig, pool: PgPool) -> Result<Self, ResourceError> {
        let store = ResourceStore::new(
            pool,
            &config.database.table,
            StoreOptions::from(&config.database),
        )?;

        Ok(Self {
            store,
            authorizer: Authorizer::new(&config.security),
            api: Arc::new(config.api.clone()),
        })
    }
}
