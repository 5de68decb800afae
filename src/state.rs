//! # Application State
//!
//! Shared state handed to every HTTP handler: the loaded configuration, the
//! model manager, and the server start time for uptime reporting. The
//! manager is internally synchronized, so the state itself needs no locks.

use crate::config::AppConfig;
use crate::manager::ModelManager;
use std::time::Instant;

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub manager: ModelManager,
    start_time: Instant,
}

impl AppState {
    pub fn new(config: AppConfig, manager: ModelManager) -> Self {
        Self {
            config,
            manager,
            start_time: Instant::now(),
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
