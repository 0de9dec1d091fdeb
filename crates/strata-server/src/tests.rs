//! Handler tests against an in-memory store

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use strata_core::*;
use strata_store::{SymbolFilter, SymbolStore};
use strata_synth::{BatchOutcome, GenerationOptions};
use tempfile::TempDir;

use crate::ServerState;
use crate::handlers::*;

fn state_in(dir: &TempDir) -> Arc<ServerState> {
    let store = Arc::new(SymbolStore::open_in_memory().unwrap());
    Arc::new(ServerState::new(store, GenerationOptions::new(dir.path())))
}

fn seeded(dir: &TempDir) -> Arc<ServerState> {
    let state = state_in(dir);
    for draft in [
        SymbolDraft::new("app", "Api").with_id("a").depends_on("b"),
        SymbolDraft::new("app", "Service").with_id("b").depends_on("c"),
        SymbolDraft::new("app", "Repo").with_id("c"),
        SymbolDraft::new("app", "Port").with_id("port").with_kind(SymbolKind::Interface),
    ] {
        state.store.register(draft).unwrap();
    }
    state
}

fn into_parts<T>(reply: Reply<T>) -> (StatusCode, Envelope<T>) {
    let (status, Json(envelope)) = reply;
    (status, envelope)
}

fn id(s: &str) -> Path<String> {
    Path(s.to_string())
}

#[tokio::test]
async fn test_health_check() {
    let dir = TempDir::new().unwrap();
    let response = health_check(State(seeded(&dir))).await.into_response();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_register_and_get() {
    let dir = TempDir::new().unwrap();
    let state = state_in(&dir);

    let (status, env) = into_parts(
        register_symbol(State(state.clone()), Json(SymbolDraft::new("crm", "Customer").with_id("cust"))).await,
    );
    assert_eq!(status, StatusCode::OK);
    assert_eq!(env.data().map(|s| s.name.as_str()), Some("Customer"));

    let (status, env) = into_parts(get_symbol(State(state.clone()), id("cust")).await);
    assert_eq!(status, StatusCode::OK);
    assert!(env.data().unwrap().is_some());

    // Lookup misses are successful and empty
    let (status, env) = into_parts(get_symbol(State(state), id("ghost")).await);
    assert_eq!(status, StatusCode::OK);
    assert_eq!(env.data(), Some(&None));
}

#[tokio::test]
async fn test_duplicate_register_is_conflict() {
    let dir = TempDir::new().unwrap();
    let state = seeded(&dir);
    let (status, env) =
        into_parts(register_symbol(State(state), Json(SymbolDraft::new("app", "Again").with_id("a"))).await);
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(env.error().map(|e| e.kind), Some(ErrorKind::Conflict));
}

#[tokio::test]
async fn test_update_missing_is_not_found() {
    let dir = TempDir::new().unwrap();
    let state = seeded(&dir);
    let (status, env) =
        into_parts(update_symbol(State(state), id("ghost"), Json(SymbolDraft::new("app", "Ghost"))).await);
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(env.error().map(|e| e.kind), Some(ErrorKind::NotFound));
}

#[tokio::test]
async fn test_invalid_draft_is_bad_request() {
    let dir = TempDir::new().unwrap();
    let state = state_in(&dir);
    let draft = SymbolDraft::new("app", "Bad").with_id("bad").with_version("one");
    let (status, env) = into_parts(register_symbol(State(state), Json(draft)).await);
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(env.error().map(|e| e.kind), Some(ErrorKind::Validation));
}

#[tokio::test]
async fn test_set_status() {
    let dir = TempDir::new().unwrap();
    let state = seeded(&dir);
    let update: StatusUpdate =
        serde_json::from_str(r#"{"status":"deprecated","message":"replaced","changedBy":"ops"}"#).unwrap();
    let (status, env) = into_parts(set_status(State(state.clone()), id("c"), Json(update)).await);
    assert_eq!(status, StatusCode::OK);
    assert_eq!(env.data().map(|s| s.status), Some(SymbolStatus::Deprecated));

    let stored = state.store.find(&SymbolId::new("c")).unwrap().unwrap();
    let info = stored.status_info.unwrap();
    assert_eq!(info.message.as_deref(), Some("replaced"));
    assert_eq!(info.changed_by.as_deref(), Some("ops"));
}

#[tokio::test]
async fn test_list_with_filter() {
    let dir = TempDir::new().unwrap();
    let state = seeded(&dir);
    let filter = SymbolFilter::default().with_kind(SymbolKind::Interface);
    let (_, env) = into_parts(list_symbols(State(state), Query(filter)).await);
    let ids: Vec<_> = env.data().unwrap().iter().map(|s| s.id.as_str().to_string()).collect();
    assert_eq!(ids, vec!["port"]);
}

#[tokio::test]
async fn test_dependents_and_delete() {
    let dir = TempDir::new().unwrap();
    let state = seeded(&dir);

    let (_, env) = into_parts(dependents(State(state.clone()), id("b")).await);
    let ids: Vec<_> = env.data().unwrap().iter().map(|s| s.id.as_str().to_string()).collect();
    assert_eq!(ids, vec!["a"]);

    let (_, env) = into_parts(delete_symbol(State(state.clone()), id("a")).await);
    assert_eq!(env.data(), Some(&true));
    let (_, env) = into_parts(delete_symbol(State(state), id("a")).await);
    assert_eq!(env.data(), Some(&false));
}

#[tokio::test]
async fn test_search_blank_query() {
    let dir = TempDir::new().unwrap();
    let state = seeded(&dir);
    let (_, env) = into_parts(search(State(state.clone()), Query(SearchParams { q: "  ".into() })).await);
    assert!(env.data().unwrap().is_empty());

    let (_, env) = into_parts(search(State(state), Query(SearchParams { q: "serv".into() })).await);
    assert_eq!(env.data().unwrap().len(), 1);
}

#[tokio::test]
async fn test_graph_endpoints() {
    let dir = TempDir::new().unwrap();
    let state = seeded(&dir);

    let (_, env) = into_parts(get_topological_order(State(state.clone())).await);
    let order = env.data().unwrap().clone().unwrap();
    let pos = |s: &str| order.iter().position(|x| x.as_str() == s).unwrap();
    assert!(pos("c") < pos("b") && pos("b") < pos("a"));

    let (_, env) = into_parts(get_stats(State(state.clone())).await);
    let stats = env.data().unwrap();
    assert_eq!(stats.node_count, 4);
    assert_eq!(stats.edge_count, 2);
    assert_eq!(stats.max_depth, 2);

    let (_, env) = into_parts(get_subgraph(State(state.clone()), id("ghost")).await);
    assert_eq!(env.data(), Some(&None));

    // Close the loop c -> a
    let draft = SymbolDraft::new("app", "Repo").with_id("c").depends_on("a");
    let (status, _) = into_parts(update_symbol(State(state.clone()), id("c"), Json(draft)).await);
    assert_eq!(status, StatusCode::OK);

    let (_, env) = into_parts(get_topological_order(State(state.clone())).await);
    assert_eq!(env.data(), Some(&None));
    let (_, env) = into_parts(get_cycles(State(state.clone())).await);
    assert_eq!(
        env.data().unwrap(),
        &vec![vec![SymbolId::new("a"), SymbolId::new("b"), SymbolId::new("c")]]
    );

    let (_, env) = into_parts(get_validation(State(state)).await);
    let report = env.data().unwrap();
    assert!(report.valid);
    assert_eq!(report.with_code(IssueCode::DependencyCycle).count(), 1);
}

#[tokio::test]
async fn test_generate_records_metadata() {
    let dir = TempDir::new().unwrap();
    let state = seeded(&dir);

    let (status, env) = into_parts(generate(State(state.clone()), id("a"), Json(GenerationRequest::default())).await);
    assert_eq!(status, StatusCode::OK);
    let result = env.data().unwrap().clone();
    assert!(result.generated_path.starts_with(dir.path()));
    assert!(result.user_file_created);

    let stored = state.store.find(&SymbolId::new("a")).unwrap().unwrap();
    let meta = stored.generation_meta.unwrap();
    assert_eq!(meta.content_hash.as_deref(), Some(result.content_hash.as_str()));

    let (_, env) = into_parts(
        get_has_implementation(State(state), id("a"), Query(OutputDirParams::default())).await,
    );
    assert_eq!(env.data(), Some(&true));
}

#[tokio::test]
async fn test_generate_interface_is_rejected() {
    let dir = TempDir::new().unwrap();
    let state = seeded(&dir);

    let (_, env) = into_parts(get_eligibility(State(state.clone()), id("port")).await);
    assert!(!env.data().unwrap().is_eligible());

    let (status, env) = into_parts(generate(State(state), id("port"), Json(GenerationRequest::default())).await);
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(env.error().map(|e| e.kind), Some(ErrorKind::Validation));
}

#[tokio::test]
async fn test_preview_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let state = seeded(&dir);
    let (_, env) = into_parts(preview(State(state), id("b"), Json(GenerationRequest::default())).await);
    let preview = env.data().unwrap();
    assert!(!preview.implementation_exists);
    assert!(!preview.generated_path.exists());
}

#[tokio::test]
async fn test_batch_generation() {
    let dir = TempDir::new().unwrap();
    let state = seeded(&dir);
    let request: BatchRequest = serde_json::from_str(r#"{"symbolIds":["a","ghost","port"],"includeDocs":false}"#).unwrap();
    assert_eq!(request.options.include_docs, Some(false));

    let (status, env) = into_parts(generate_multiple(State(state.clone()), Json(request)).await);
    assert_eq!(status, StatusCode::OK);
    let batch = env.data().unwrap();
    assert_eq!(batch.total, 3);
    assert_eq!(batch.succeeded, 1);
    assert_eq!(batch.failed, 1);
    assert_eq!(batch.skipped, 1);
    assert!(matches!(
        batch.entry(&SymbolId::new("ghost")).map(|e| &e.outcome),
        Some(BatchOutcome::Failed { .. })
    ));

    let (_, env) = into_parts(generate_all(State(state), Json(GenerationRequest::default())).await);
    let batch = env.data().unwrap();
    assert_eq!(batch.total, 4);
    assert_eq!(batch.succeeded, 3);
    assert_eq!(batch.skipped, 1);
}

#[test]
fn test_generation_request_overrides() {
    let defaults = GenerationOptions::new("out");
    let request: GenerationRequest = serde_json::from_str(r#"{"overwriteGenerated":false}"#).unwrap();
    let resolved = request.resolve(&defaults);
    assert_eq!(resolved.output_dir, defaults.output_dir);
    assert!(!resolved.overwrite_generated);
    assert!(resolved.include_docs);
}
