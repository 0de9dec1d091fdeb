//! Axum router setup for the Strata API

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post, put},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{ServerState, handlers::*};

/// Create the axum router with all routes
pub fn create_router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        // Registry
        .route("/api/symbols", get(list_symbols).post(register_symbol))
        .route(
            "/api/symbols/:id",
            get(get_symbol).put(update_symbol).delete(delete_symbol),
        )
        .route("/api/symbols/:id/status", put(set_status))
        .route("/api/symbols/:id/contains", get(contains))
        .route("/api/symbols/:id/contained-by", get(contained_by))
        .route("/api/symbols/:id/dependents", get(dependents))
        .route("/api/symbols/:id/implementors", get(implementors))
        .route("/api/symbols/:id/extenders", get(extenders))
        .route("/api/search", get(search))
        // Graph
        .route("/api/graph", get(get_graph))
        .route("/api/subgraph/:id", get(get_subgraph))
        .route("/api/cycles", get(get_cycles))
        .route("/api/topological-order", get(get_topological_order))
        .route("/api/stats", get(get_stats))
        .route("/api/validation", get(get_validation))
        // Generation
        .route("/api/eligibility/:id", get(get_eligibility))
        .route("/api/implementation/:id", get(get_has_implementation))
        .route("/api/preview/:id", post(preview))
        .route("/api/generation", post(generate_all))
        .route("/api/generation/:id", post(generate))
        .route("/api/batch-generation", post(generate_multiple))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_store::SymbolStore;
    use strata_synth::GenerationOptions;

    #[test]
    fn test_router_creation() {
        let store = Arc::new(SymbolStore::open_in_memory().unwrap());
        let state = Arc::new(ServerState::new(store, GenerationOptions::default()));
        let _router = create_router(state);
    }
}
