//! CLI command implementations
//!
//! Every command prints the operation's envelope as JSON on stdout and
//! reports whether it succeeded.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use strata_core::{Envelope, GraphEngine, StrataError, StrataResult, SymbolDraft, SymbolId};
use strata_server::{ServerState, StrataServer};
use strata_store::{SymbolFilter, SymbolStore};
use strata_synth::BatchResult;

use crate::config::StrataConfig;

pub async fn serve(config: &StrataConfig) -> anyhow::Result<()> {
    let store = open_store(config)?;
    tracing::info!(
        "Serving {} symbol(s) from {}",
        store.count().map_err(StrataError::from)?,
        config.database_path.display()
    );
    let state = ServerState::new(Arc::new(store), config.generation_options());
    let server = StrataServer::new(state, config.server_config());
    server.start().await
}

/// Import file contents: a single draft or a list of drafts.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ImportFile {
    Many(Vec<SymbolDraft>),
    One(Box<SymbolDraft>),
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    pub registered: Vec<SymbolId>,
    pub replaced: Vec<SymbolId>,
    pub failed: Vec<ImportFailure>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportFailure {
    /// Position of the draft in the file.
    pub index: usize,
    pub id: Option<SymbolId>,
    pub message: String,
}

fn read_drafts(file: &Path) -> StrataResult<Vec<SymbolDraft>> {
    let content = std::fs::read_to_string(file).map_err(|e| StrataError::io(file, e))?;
    let parsed: ImportFile = serde_json::from_str(&content)
        .map_err(|e| StrataError::Validation(format!("{}: {}", file.display(), e)))?;
    Ok(match parsed {
        ImportFile::Many(drafts) => drafts,
        ImportFile::One(draft) => vec![*draft],
    })
}

/// Register each draft independently; one bad draft does not stop the rest.
pub fn import_drafts(store: &SymbolStore, drafts: Vec<SymbolDraft>, replace: bool) -> ImportReport {
    let mut report = ImportReport::default();
    for (index, draft) in drafts.into_iter().enumerate() {
        let id = draft.id.clone();
        let outcome = match id.as_ref() {
            Some(existing) if replace => match store.update(existing, draft.clone()) {
                Ok(Some(symbol)) => Ok((symbol.id, true)),
                Ok(None) => store.register(draft).map(|s| (s.id, false)),
                Err(e) => Err(e),
            },
            _ => store.register(draft).map(|s| (s.id, false)),
        };
        match outcome {
            Ok((id, true)) => report.replaced.push(id),
            Ok((id, false)) => report.registered.push(id),
            Err(e) => {
                tracing::warn!("Import of draft #{} failed: {}", index, e);
                report.failed.push(ImportFailure {
                    index,
                    id,
                    message: StrataError::from(e).to_string(),
                });
            }
        }
    }
    tracing::info!(
        "Imported {} new, {} replaced, {} failed",
        report.registered.len(),
        report.replaced.len(),
        report.failed.len()
    );
    report
}

pub fn import(config: &StrataConfig, file: &Path, replace: bool) -> anyhow::Result<bool> {
    let result = open_store(config).and_then(|store| {
        let drafts = read_drafts(file)?;
        Ok(import_drafts(&store, drafts, replace))
    });
    let ok = matches!(&result, Ok(report) if report.failed.is_empty());
    emit(result)?;
    Ok(ok)
}

pub fn list(config: &StrataConfig, filter: &SymbolFilter) -> anyhow::Result<bool> {
    with_store(config, |store| Ok(store.query(filter)?))
}

pub fn show(config: &StrataConfig, id: &str) -> anyhow::Result<bool> {
    with_store(config, |store| Ok(store.find(&SymbolId::new(id))?))
}

pub fn search(config: &StrataConfig, query: &str) -> anyhow::Result<bool> {
    with_store(config, |store| Ok(store.search(query)?))
}

pub fn delete(config: &StrataConfig, id: &str) -> anyhow::Result<bool> {
    with_store(config, |store| Ok(store.delete(&SymbolId::new(id))?))
}

pub fn graph(config: &StrataConfig, around: Option<&str>) -> anyhow::Result<bool> {
    match around {
        Some(id) => with_store(config, |store| GraphEngine::new(store).build_subgraph(&SymbolId::new(id))),
        None => with_store(config, |store| GraphEngine::new(store).build_graph()),
    }
}

pub fn cycles(config: &StrataConfig) -> anyhow::Result<bool> {
    with_store(config, |store| GraphEngine::new(store).detect_cycles())
}

pub fn topo(config: &StrataConfig) -> anyhow::Result<bool> {
    with_store(config, |store| GraphEngine::new(store).topological_order())
}

pub fn stats(config: &StrataConfig) -> anyhow::Result<bool> {
    with_store(config, |store| GraphEngine::new(store).stats())
}

pub fn validate(config: &StrataConfig) -> anyhow::Result<bool> {
    let result = open_store(config).and_then(|store| GraphEngine::new(&store).validate());
    let ok = matches!(&result, Ok(report) if report.valid);
    emit(result)?;
    Ok(ok)
}

pub fn generate(config: &StrataConfig, ids: &[String], all: bool) -> anyhow::Result<bool> {
    if !all && ids.is_empty() {
        return emit::<()>(Err(StrataError::Config(
            "no symbol ids given; pass ids or --all".to_string(),
        )));
    }
    let state = match open_store(config) {
        Ok(store) => ServerState::new(Arc::new(store), config.generation_options()),
        Err(e) => return emit::<()>(Err(e)),
    };
    let options = &state.generation;

    if let [id] = ids {
        let result = state.synth.generate(&SymbolId::new(id.as_str()), options);
        if let Ok(generated) = &result {
            state.record_generation(generated);
        }
        return emit(result);
    }

    let result = if all {
        state.synth.generate_all(options)
    } else {
        let ids: Vec<SymbolId> = ids.iter().map(|id| SymbolId::new(id.as_str())).collect();
        state.synth.generate_multiple(&ids, options)
    };
    if let Ok(batch) = &result {
        record_batch(&state, batch);
    }
    let ok = matches!(&result, Ok(batch) if batch.failed == 0);
    emit(result)?;
    Ok(ok)
}

fn record_batch(state: &ServerState, batch: &BatchResult) {
    for entry in &batch.results {
        if let strata_synth::BatchOutcome::Succeeded { result } = &entry.outcome {
            state.record_generation(result);
        }
    }
}

pub fn preview(config: &StrataConfig, id: &str) -> anyhow::Result<bool> {
    let options = config.generation_options();
    let result = open_store(config).and_then(|store| {
        let state = ServerState::new(Arc::new(store), options);
        state.synth.preview(&SymbolId::new(id), &state.generation)
    });
    emit(result)
}

pub fn clear(config: &StrataConfig) -> anyhow::Result<bool> {
    tracing::info!("Clearing registry at {}", config.database_path.display());
    with_store(config, |store| Ok(store.clear()?))
}

fn open_store(config: &StrataConfig) -> StrataResult<SymbolStore> {
    Ok(SymbolStore::open(&config.database_path)?)
}

fn with_store<T: Serialize>(
    config: &StrataConfig,
    op: impl FnOnce(&SymbolStore) -> StrataResult<T>,
) -> anyhow::Result<bool> {
    emit(open_store(config).and_then(|store| op(&store)))
}

/// Print the envelope for `result`; `Ok(false)` for a failure envelope.
fn emit<T: Serialize>(result: StrataResult<T>) -> anyhow::Result<bool> {
    let envelope = Envelope::from(result);
    println!("{}", serde_json::to_string_pretty(&envelope)?);
    Ok(envelope.is_success())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_import_single_and_many() {
        let dir = tempfile::TempDir::new().unwrap();
        let one = dir.path().join("one.json");
        std::fs::write(&one, r#"{"id":"a","namespace":"app","name":"Api"}"#).unwrap();
        let many = dir.path().join("many.json");
        std::fs::write(
            &many,
            r#"[{"id":"b","name":"Service","dependencies":[{"symbolId":"a","name":"api"}]},{"name":"Anon"}]"#,
        )
        .unwrap();

        assert_eq!(read_drafts(&one).unwrap().len(), 1);
        let drafts = read_drafts(&many).unwrap();
        assert_eq!(drafts.len(), 2);
        assert_eq!(drafts[0].relationships.dependencies[0].symbol_id, SymbolId::new("a"));
    }

    #[test]
    fn test_import_reports_failures() {
        let store = SymbolStore::open_in_memory().unwrap();
        let drafts = vec![
            SymbolDraft::new("app", "Api").with_id("a"),
            SymbolDraft::new("app", "Twice").with_id("a"),
            SymbolDraft::new("app", "").with_id("blank"),
        ];
        let report = import_drafts(&store, drafts, false);
        assert_eq!(report.registered, vec![SymbolId::new("a")]);
        assert_eq!(report.failed.len(), 2);
        assert_eq!(report.failed[0].index, 1);
        assert_eq!(report.failed[1].id, Some(SymbolId::new("blank")));
    }

    #[test]
    fn test_import_replace() {
        let store = SymbolStore::open_in_memory().unwrap();
        store.register(SymbolDraft::new("app", "Api").with_id("a")).unwrap();
        let drafts = vec![
            SymbolDraft::new("app", "Gateway").with_id("a"),
            SymbolDraft::new("app", "Fresh").with_id("f"),
        ];
        let report = import_drafts(&store, drafts, true);
        assert_eq!(report.replaced, vec![SymbolId::new("a")]);
        assert_eq!(report.registered, vec![SymbolId::new("f")]);
        assert_eq!(store.find(&SymbolId::new("a")).unwrap().unwrap().name, "Gateway");
    }

    #[test]
    fn test_malformed_import_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, "{not json").unwrap();
        assert_eq!(read_drafts(&bad).unwrap_err().kind(), strata_core::ErrorKind::Validation);
    }
}
