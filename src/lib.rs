//! Bookshelf Library Circulation Server
//!
//! A REST JSON API for a small library: a catalog of books, student and
//! librarian accounts, and the borrow/return workflow with late fines.

use std::sync::Arc;

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod services;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

use mockable::Clock;

use repository::Repository;
use services::Services;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<Services>,
}

impl AppState {
    /// Wire the services over a storage backend
    pub fn new(
        config: AppConfig,
        repository: Repository,
        clock: Arc<dyn Clock + Send + Sync>,
    ) -> Self {
        let services = Services::new(repository, &config, clock);
        Self {
            config: Arc::new(config),
            services: Arc::new(services),
        }
    }
}
