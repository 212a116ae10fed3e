//! Business logic services

pub mod auth;
pub mod catalog;
pub mod circulation;

use std::sync::Arc;

use mockable::Clock;

use crate::{config::AppConfig, repository::Repository};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub repository: Repository,
    pub auth: auth::AuthService,
    pub catalog: catalog::CatalogService,
    pub circulation: circulation::CirculationService,
}

impl Services {
    /// Create all services with the given repository
    pub fn new(
        repository: Repository,
        config: &AppConfig,
        clock: Arc<dyn Clock + Send + Sync>,
    ) -> Self {
        Self {
            auth: auth::AuthService::new(repository.clone(), config.auth.clone()),
            catalog: catalog::CatalogService::new(repository.clone()),
            circulation: circulation::CirculationService::new(
                repository.clone(),
                config.circulation.clone(),
                clock,
            ),
            repository,
        }
    }
}
