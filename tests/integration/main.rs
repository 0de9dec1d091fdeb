//! Integration tests for Strata
//!
//! These tests verify that the store, graph engine, synthesizer and CLI work
//! together on one registry.

use std::process::Command;
use std::sync::Arc;

use serde_json::Value;
use strata_core::{GraphEngine, SymbolDraft, SymbolId, SymbolKind};
use strata_server::{ServerConfig, ServerState, StrataServer};
use strata_store::SymbolStore;
use strata_synth::{CodeSynthesizer, GenerationOptions};
use tempfile::TempDir;

fn ids(list: &[&str]) -> Vec<SymbolId> {
    list.iter().map(|s| SymbolId::new(*s)).collect()
}

fn chain_store(dir: &TempDir) -> SymbolStore {
    let store = SymbolStore::open(dir.path().join("registry.db")).unwrap();
    store.register(SymbolDraft::new("app", "Api").with_id("A").depends_on("B")).unwrap();
    store.register(SymbolDraft::new("app", "Service").with_id("B").depends_on("C")).unwrap();
    store.register(SymbolDraft::new("app", "Repo").with_id("C")).unwrap();
    store
}

/// Chain A -> B -> C through a persisted store
#[test]
fn test_dependency_chain() {
    let dir = TempDir::new().unwrap();
    let store = chain_store(&dir);
    let engine = GraphEngine::new(&store);

    let report = engine.build_graph().unwrap();
    assert_eq!(report.nodes.len(), 3);
    assert_eq!(report.edges.len(), 2);
    assert!(report.cycles.is_empty());
    assert_eq!(report.topological_order, Some(ids(&["C", "B", "A"])));

    let stats = engine.stats().unwrap();
    assert_eq!(stats.root_count, 1);
    assert_eq!(stats.leaf_count, 1);
    assert_eq!(stats.connected_component_count, 1);
    assert_eq!(stats.max_depth, 2);
    assert!(!stats.has_cycles);
}

/// Closing the chain with C -> A
#[test]
fn test_cycle_after_update() {
    let dir = TempDir::new().unwrap();
    let store = chain_store(&dir);
    store
        .update(&SymbolId::new("C"), SymbolDraft::new("app", "Repo").with_id("C").depends_on("A"))
        .unwrap()
        .unwrap();

    let engine = GraphEngine::new(&store);
    assert_eq!(engine.detect_cycles().unwrap(), vec![ids(&["A", "B", "C"])]);
    assert_eq!(engine.topological_order().unwrap(), None);

    let stats = engine.stats().unwrap();
    assert!(stats.has_cycles);
    assert_eq!(stats.root_count, 0);
    assert_eq!(stats.leaf_count, 0);

    let dependents: Vec<_> = store
        .find_dependents(&SymbolId::new("A"))
        .unwrap()
        .into_iter()
        .map(|s| s.id)
        .collect();
    assert_eq!(dependents, ids(&["C"]));
}

#[test]
fn test_reopen_preserves_registry() {
    let dir = TempDir::new().unwrap();
    drop(chain_store(&dir));

    let store = SymbolStore::open(dir.path().join("registry.db")).unwrap();
    assert_eq!(store.count().unwrap(), 3);
    let b = store.find(&SymbolId::new("B")).unwrap().unwrap();
    assert_eq!(b.relationships.dependencies[0].symbol_id, SymbolId::new("C"));
}

#[test]
fn test_search_ranking() {
    let dir = TempDir::new().unwrap();
    let store = SymbolStore::open(dir.path().join("registry.db")).unwrap();
    store.register(SymbolDraft::new("misc", "barfoo").with_id("x1")).unwrap();
    store.register(SymbolDraft::new("misc", "foo").with_id("x2")).unwrap();
    store.register(SymbolDraft::new("misc", "unrelated").with_id("x3")).unwrap();

    let names: Vec<_> = store.search("foo").unwrap().into_iter().map(|s| s.name).collect();
    assert_eq!(names, vec!["foo", "barfoo"]);
}

/// Generation leaves user edits alone and rewrites the generated half
#[test]
fn test_generation_idempotence() {
    let dir = TempDir::new().unwrap();
    let store = chain_store(&dir);
    let synth = CodeSynthesizer::new(&store);
    let options = GenerationOptions::new(dir.path().join("out"));

    let first = synth.generate(&SymbolId::new("B"), &options).unwrap();
    assert!(first.user_file_created);
    std::fs::write(&first.implementation_path, "// hand written\n").unwrap();

    let second = synth.generate(&SymbolId::new("B"), &options).unwrap();
    assert!(!second.user_file_created);
    assert_eq!(second.content_hash, first.content_hash);
    assert_eq!(
        std::fs::read_to_string(&second.implementation_path).unwrap(),
        "// hand written\n"
    );
}

#[test]
fn test_batch_accounting() {
    let dir = TempDir::new().unwrap();
    let store = chain_store(&dir);
    store
        .register(SymbolDraft::new("app", "Port").with_id("P").with_kind(SymbolKind::Interface))
        .unwrap();
    let synth = CodeSynthesizer::new(&store);
    let options = GenerationOptions::new(dir.path().join("out"));

    let batch = synth.generate_multiple(&ids(&["A", "P", "missing"]), &options).unwrap();
    assert_eq!(batch.total, 3);
    assert_eq!(batch.succeeded, 1);
    assert_eq!(batch.skipped, 1);
    assert_eq!(batch.failed, 1);
    assert_eq!(batch.total, batch.succeeded + batch.skipped + batch.failed);
}

#[test]
fn test_server_state_records_generation() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(chain_store(&dir));
    let server = StrataServer::new(
        ServerState::new(Arc::clone(&store), GenerationOptions::new(dir.path().join("out"))),
        ServerConfig::default(),
    );
    let state = server.state();
    let before = store.find(&SymbolId::new("A")).unwrap().unwrap().updated_at;

    let result = state.synth.generate(&SymbolId::new("A"), &state.generation).unwrap();
    state.record_generation(&result);

    let stored = store.find(&SymbolId::new("A")).unwrap().unwrap();
    let meta = stored.generation_meta.unwrap();
    assert_eq!(meta.content_hash, Some(result.content_hash));
    assert_eq!(stored.updated_at, before);
}

fn strata(dir: &TempDir, args: &[&str]) -> (bool, Value) {
    let output = Command::new(env!("CARGO_BIN_EXE_strata"))
        .current_dir(dir.path())
        .arg("--database")
        .arg(dir.path().join("cli.db"))
        .args(args)
        .output()
        .expect("Failed to execute strata");
    let stdout = String::from_utf8_lossy(&output.stdout);
    let json = serde_json::from_str(&stdout).unwrap_or(Value::Null);
    (output.status.success(), json)
}

/// Import, query and analyse through the binary
#[test]
fn test_cli_round_trip() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("drafts.json");
    std::fs::write(
        &file,
        r#"[
            {"id": "A", "namespace": "app", "name": "Api", "dependencies": [{"symbolId": "B", "name": "service"}]},
            {"id": "B", "namespace": "app", "name": "Service"}
        ]"#,
    )
    .unwrap();

    let (ok, json) = strata(&dir, &["import", file.to_str().unwrap()]);
    assert!(ok);
    assert_eq!(json["success"], Value::Bool(true));
    assert_eq!(json["data"]["registered"], serde_json::json!(["A", "B"]));

    let (ok, json) = strata(&dir, &["topo"]);
    assert!(ok);
    assert_eq!(json["data"], serde_json::json!(["B", "A"]));

    let (ok, json) = strata(&dir, &["show", "missing"]);
    assert!(ok);
    assert_eq!(json["data"], Value::Null);

    let (ok, json) = strata(&dir, &["generate", "interface-that-is-not-there"]);
    assert!(!ok);
    assert_eq!(json["error"]["kind"], Value::String("notFound".into()));
}
