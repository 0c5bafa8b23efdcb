// Application state module
// Holds everything a request handler may read; nothing here changes after startup

use std::sync::atomic::AtomicBool;

use super::types::Config;
use crate::handler::templates::TemplateStore;
use crate::routing::RouteTable;

/// Application state
pub struct AppState {
    pub config: Config,
    /// Route table for the configured service variant
    pub routes: RouteTable,
    pub templates: TemplateStore,

    // Cached config values for fast access without locks
    pub cached_access_log: AtomicBool,
}

impl AppState {
    /// Build state with the route table of `config.service.variant`
    pub fn new(config: Config, templates: TemplateStore) -> Self {
        let routes = RouteTable::for_variant(config.service.variant);
        let cached_access_log = AtomicBool::new(config.logging.access_log);

        Self {
            config,
            routes,
            templates,
            cached_access_log,
        }
    }
}
