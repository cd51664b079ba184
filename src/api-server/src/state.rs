//! Application state shared with the public routes
//!
//! Discovered handlers own their own state; this only carries what the
//! service-level routes report about the running process.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::config::Config;
use crate::discovery::{DiscoveredEndpoints, SkippedEndpoint};
use crate::graphql::{BindingSummary, GraphQLSchema};
use crate::routing::{RouteSummary, RouteTable};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub routes: Arc<Vec<RouteSummary>>,
    pub graphql_fields: Arc<Vec<BindingSummary>>,
    pub skipped: Arc<Vec<SkippedEndpoint>>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        config: Config,
        discovered: &DiscoveredEndpoints,
        routes: &RouteTable,
        schema: &GraphQLSchema,
    ) -> Self {
        Self {
            config: Arc::new(config),
            routes: Arc::new(routes.summaries()),
            graphql_fields: Arc::new(schema.bindings().to_vec()),
            skipped: Arc::new(discovered.skipped.clone()),
            started_at: Utc::now(),
        }
    }

    pub fn uptime_seconds(&self) -> i64 {
        (Utc::now() - self.started_at).num_seconds()
    }
}
