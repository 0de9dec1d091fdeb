//! HTTP API over the symbol registry

pub mod handlers;
pub mod router;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use strata_core::{GenerationMeta, GraphEngine};
use strata_store::SymbolStore;
use strata_synth::{CodeSynthesizer, GenerationOptions, GenerationResult};

pub use router::create_router;

/// Listen address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 7890,
        }
    }
}

/// Shared state: one long-lived store, a synthesizer reading from it, and the
/// generation defaults requests fall back to.
pub struct ServerState {
    pub store: Arc<SymbolStore>,
    pub synth: CodeSynthesizer<Arc<SymbolStore>>,
    pub generation: GenerationOptions,
}

impl ServerState {
    pub fn new(store: Arc<SymbolStore>, generation: GenerationOptions) -> Self {
        ServerState {
            synth: CodeSynthesizer::new(Arc::clone(&store)),
            store,
            generation,
        }
    }

    /// A graph engine borrowing the store for one operation.
    pub fn engine(&self) -> GraphEngine<&SymbolStore> {
        GraphEngine::new(self.store.as_ref())
    }

    /// Copy generation bookkeeping onto the symbol. Failure here does not
    /// undo the generation, so it is only logged.
    pub fn record_generation(&self, result: &GenerationResult) {
        let meta = GenerationMeta {
            generated_path: Some(result.generated_path.display().to_string()),
            implementation_path: Some(result.implementation_path.display().to_string()),
            content_hash: Some(result.content_hash.clone()),
            last_generated_at: Some(result.generated_at),
        };
        if let Err(e) = self.store.record_generation(&result.symbol_id, meta) {
            tracing::warn!("Could not record generation for {}: {}", result.symbol_id, e);
        }
    }
}

pub struct StrataServer {
    state: Arc<ServerState>,
    config: ServerConfig,
}

impl StrataServer {
    pub fn new(state: ServerState, config: ServerConfig) -> Self {
        StrataServer {
            state: Arc::new(state),
            config,
        }
    }

    pub fn state(&self) -> Arc<ServerState> {
        Arc::clone(&self.state)
    }

    pub async fn start(self) -> anyhow::Result<()> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        tracing::info!("Strata API listening on http://{}", addr);
        axum::serve(listener, create_router(self.state)).await?;
        Ok(())
    }
}
