//! REST API handlers for the Strata server
//!
//! Every operation answers with an [`Envelope`]. Store and synthesizer calls
//! block, so they run on the blocking pool.

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use strata_core::{
    ComponentSymbol, Envelope, ErrorKind, GraphReport, GraphStats, StrataError, StrataResult, SymbolDraft, SymbolId,
    SymbolStatus, ValidationReport,
};
use strata_store::SymbolFilter;
use strata_synth::{BatchOutcome, BatchResult, Eligibility, GenerationOptions, GenerationResult, PreviewResult};

use crate::ServerState;

pub type Reply<T> = (StatusCode, Json<Envelope<T>>);

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Validation | ErrorKind::Config => StatusCode::BAD_REQUEST,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::Io | ErrorKind::Storage => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub fn reply<T>(result: StrataResult<T>) -> Reply<T> {
    let envelope = Envelope::from(result);
    let status = envelope.error().map_or(StatusCode::OK, |e| status_for(e.kind));
    (status, Json(envelope))
}

/// Run `op` on the blocking pool against the shared state.
async fn run<T, F>(state: &Arc<ServerState>, op: F) -> Reply<T>
where
    T: Send + 'static,
    F: FnOnce(&ServerState) -> StrataResult<T> + Send + 'static,
{
    let state = Arc::clone(state);
    let result = tokio::task::spawn_blocking(move || op(&state))
        .await
        .unwrap_or_else(|e| Err(StrataError::Storage(format!("worker task failed: {e}"))));
    reply(result)
}

fn require<T>(found: Option<T>, id: &SymbolId) -> StrataResult<T> {
    found.ok_or_else(|| StrataError::NotFound(id.to_string()))
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub symbols: usize,
}

/// Health check endpoint
pub async fn health_check(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    let symbols = state.store.count().unwrap_or(0);
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        symbols,
    })
}

pub async fn list_symbols(
    State(state): State<Arc<ServerState>>,
    Query(filter): Query<SymbolFilter>,
) -> Reply<Vec<ComponentSymbol>> {
    run(&state, move |s| Ok(s.store.query(&filter)?)).await
}

pub async fn register_symbol(
    State(state): State<Arc<ServerState>>,
    Json(draft): Json<SymbolDraft>,
) -> Reply<ComponentSymbol> {
    run(&state, move |s| Ok(s.store.register(draft)?)).await
}

/// A miss is `data: null`, not an error.
pub async fn get_symbol(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
) -> Reply<Option<ComponentSymbol>> {
    run(&state, move |s| Ok(s.store.find(&SymbolId::new(id))?)).await
}

pub async fn update_symbol(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
    Json(draft): Json<SymbolDraft>,
) -> Reply<ComponentSymbol> {
    run(&state, move |s| {
        let id = SymbolId::new(id);
        require(s.store.update(&id, draft)?, &id)
    })
    .await
}

pub async fn delete_symbol(State(state): State<Arc<ServerState>>, Path(id): Path<String>) -> Reply<bool> {
    run(&state, move |s| Ok(s.store.delete(&SymbolId::new(id))?)).await
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate {
    pub status: SymbolStatus,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub changed_by: Option<String>,
}

pub async fn set_status(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
    Json(update): Json<StatusUpdate>,
) -> Reply<ComponentSymbol> {
    run(&state, move |s| {
        let id = SymbolId::new(id);
        require(
            s.store.set_status(&id, update.status, update.message, update.changed_by)?,
            &id,
        )
    })
    .await
}

pub async fn contains(State(state): State<Arc<ServerState>>, Path(id): Path<String>) -> Reply<Vec<ComponentSymbol>> {
    run(&state, move |s| Ok(s.store.find_contains(&SymbolId::new(id))?)).await
}

pub async fn contained_by(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
) -> Reply<Vec<ComponentSymbol>> {
    run(&state, move |s| Ok(s.store.find_contained_by(&SymbolId::new(id))?)).await
}

pub async fn dependents(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
) -> Reply<Vec<ComponentSymbol>> {
    run(&state, move |s| Ok(s.store.find_dependents(&SymbolId::new(id))?)).await
}

pub async fn implementors(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
) -> Reply<Vec<ComponentSymbol>> {
    run(&state, move |s| Ok(s.store.find_implementors(&SymbolId::new(id))?)).await
}

pub async fn extenders(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
) -> Reply<Vec<ComponentSymbol>> {
    run(&state, move |s| Ok(s.store.find_extenders(&SymbolId::new(id))?)).await
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
}

pub async fn search(
    State(state): State<Arc<ServerState>>,
    Query(params): Query<SearchParams>,
) -> Reply<Vec<ComponentSymbol>> {
    run(&state, move |s| Ok(s.store.search(&params.q)?)).await
}

pub async fn get_graph(State(state): State<Arc<ServerState>>) -> Reply<GraphReport> {
    run(&state, |s| s.engine().build_graph()).await
}

pub async fn get_subgraph(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
) -> Reply<Option<GraphReport>> {
    run(&state, move |s| s.engine().build_subgraph(&SymbolId::new(id))).await
}

pub async fn get_cycles(State(state): State<Arc<ServerState>>) -> Reply<Vec<Vec<SymbolId>>> {
    run(&state, |s| s.engine().detect_cycles()).await
}

/// `data: null` when the graph has a cycle.
pub async fn get_topological_order(State(state): State<Arc<ServerState>>) -> Reply<Option<Vec<SymbolId>>> {
    run(&state, |s| s.engine().topological_order()).await
}

pub async fn get_stats(State(state): State<Arc<ServerState>>) -> Reply<GraphStats> {
    run(&state, |s| s.engine().stats()).await
}

pub async fn get_validation(State(state): State<Arc<ServerState>>) -> Reply<ValidationReport> {
    run(&state, |s| s.engine().validate()).await
}

/// Per-request overrides of the server's generation defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
    #[serde(default)]
    pub overwrite_generated: Option<bool>,
    #[serde(default)]
    pub include_docs: Option<bool>,
}

impl GenerationRequest {
    pub fn resolve(self, defaults: &GenerationOptions) -> GenerationOptions {
        GenerationOptions {
            output_dir: self.output_dir.unwrap_or_else(|| defaults.output_dir.clone()),
            overwrite_generated: self.overwrite_generated.unwrap_or(defaults.overwrite_generated),
            include_docs: self.include_docs.unwrap_or(defaults.include_docs),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputDirParams {
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
}

pub async fn get_eligibility(State(state): State<Arc<ServerState>>, Path(id): Path<String>) -> Reply<Eligibility> {
    run(&state, move |s| s.synth.eligibility(&SymbolId::new(id))).await
}

pub async fn get_has_implementation(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
    Query(params): Query<OutputDirParams>,
) -> Reply<bool> {
    run(&state, move |s| {
        let dir = params.output_dir.unwrap_or_else(|| s.generation.output_dir.clone());
        s.synth.has_user_implementation(&SymbolId::new(id), &dir)
    })
    .await
}

pub async fn preview(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
    Json(request): Json<GenerationRequest>,
) -> Reply<PreviewResult> {
    run(&state, move |s| {
        let options = request.resolve(&s.generation);
        s.synth.preview(&SymbolId::new(id), &options)
    })
    .await
}

pub async fn generate(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
    Json(request): Json<GenerationRequest>,
) -> Reply<GenerationResult> {
    run(&state, move |s| {
        let options = request.resolve(&s.generation);
        let result = s.synth.generate(&SymbolId::new(id), &options)?;
        s.record_generation(&result);
        Ok(result)
    })
    .await
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRequest {
    pub symbol_ids: Vec<SymbolId>,
    #[serde(flatten)]
    pub options: GenerationRequest,
}

fn record_batch(state: &ServerState, batch: &BatchResult) {
    for entry in &batch.results {
        if let BatchOutcome::Succeeded { result } = &entry.outcome {
            state.record_generation(result);
        }
    }
}

pub async fn generate_multiple(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<BatchRequest>,
) -> Reply<BatchResult> {
    run(&state, move |s| {
        let options = request.options.resolve(&s.generation);
        let batch = s.synth.generate_multiple(&request.symbol_ids, &options)?;
        record_batch(s, &batch);
        Ok(batch)
    })
    .await
}

pub async fn generate_all(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<GenerationRequest>,
) -> Reply<BatchResult> {
    run(&state, move |s| {
        let options = request.resolve(&s.generation);
        let batch = s.synth.generate_all(&options)?;
        record_batch(s, &batch);
        Ok(batch)
    })
    .await
}
