//! Generation-gap code synthesis
//!
//! Each eligible symbol owns two files side by side: a generated base file
//! that is rewritten on every run, and an implementation file that is created
//! once as a stub and never touched again.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use strata_core::{ComponentSymbol, StrataError, StrataResult, SymbolId, SymbolKind, SymbolSource, SymbolStatus};

use crate::fs::{FileSystem, LocalFs};
use crate::options::GenerationOptions;
use crate::result::{BatchOutcome, BatchResult, GenerationResult, PreviewResult};
use crate::template::{self, Language, Reference, Unit, pascal_case};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum Eligibility {
    Eligible,
    Ineligible { reason: String },
}

impl Eligibility {
    pub fn is_eligible(&self) -> bool {
        matches!(self, Eligibility::Eligible)
    }
}

/// Why `symbol` cannot be generated, if it cannot.
pub fn ineligibility(symbol: &ComponentSymbol) -> Option<String> {
    if symbol.kind == SymbolKind::Interface {
        return Some("interfaces have no generated code".to_string());
    }
    if symbol.status == SymbolStatus::Deprecated {
        return Some("symbol is deprecated".to_string());
    }
    if Language::from_name(&symbol.language).is_none() {
        return Some(format!("no template for language {:?}", symbol.language));
    }
    if pascal_case(&symbol.name).is_empty() {
        return Some(format!("name {:?} has no identifier characters", symbol.name));
    }
    None
}

/// Split a namespace into directory segments, refusing anything that could
/// escape the output directory.
pub fn namespace_segments(namespace: &str) -> StrataResult<Vec<String>> {
    if namespace.starts_with('/') || namespace.starts_with('\\') {
        return Err(StrataError::Config(format!("namespace {namespace:?} is absolute")));
    }
    let mut segments = Vec::new();
    for seg in namespace.split('/').map(str::trim).filter(|s| !s.is_empty()) {
        if seg == "." || seg == ".." || seg.contains('\\') || seg.contains(':') {
            return Err(StrataError::Config(format!(
                "namespace {namespace:?} has an unsafe segment {seg:?}"
            )));
        }
        segments.push(seg.to_string());
    }
    Ok(segments)
}

pub fn content_hash(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}

/// Everything `generate` would do, before doing it.
#[derive(Debug, Clone)]
struct Plan {
    generated_path: PathBuf,
    implementation_path: PathBuf,
    generated: String,
    implementation: String,
    content_hash: String,
    warnings: Vec<String>,
}

pub struct CodeSynthesizer<S, F = LocalFs> {
    source: S,
    fs: F,
    locks: DashMap<SymbolId, Arc<Mutex<()>>>,
}

impl<S: SymbolSource> CodeSynthesizer<S, LocalFs> {
    pub fn new(source: S) -> Self {
        Self::with_fs(source, LocalFs)
    }
}

impl<S: SymbolSource, F: FileSystem> CodeSynthesizer<S, F> {
    pub fn with_fs(source: S, fs: F) -> Self {
        CodeSynthesizer {
            source,
            fs,
            locks: DashMap::new(),
        }
    }

    pub fn can_generate(&self, id: &SymbolId) -> StrataResult<bool> {
        Ok(self.eligibility(id)?.is_eligible())
    }

    pub fn eligibility(&self, id: &SymbolId) -> StrataResult<Eligibility> {
        let reason = match self.source.symbol(id)? {
            None => Some(format!("symbol not found: {id}")),
            Some(symbol) => ineligibility(&symbol),
        };
        Ok(match reason {
            None => Eligibility::Eligible,
            Some(reason) => Eligibility::Ineligible { reason },
        })
    }

    fn require(&self, id: &SymbolId) -> StrataResult<ComponentSymbol> {
        let symbol = self
            .source
            .symbol(id)?
            .ok_or_else(|| StrataError::NotFound(id.to_string()))?;
        if let Some(reason) = ineligibility(&symbol) {
            return Err(StrataError::Validation(format!("cannot generate {id}: {reason}")));
        }
        Ok(symbol)
    }

    /// Write the generated file and, if missing, the implementation stub.
    pub fn generate(&self, id: &SymbolId, options: &GenerationOptions) -> StrataResult<GenerationResult> {
        options.validate()?;
        let symbol = self.require(id)?;
        self.generate_symbol(&symbol, options)
    }

    fn generate_symbol(&self, symbol: &ComponentSymbol, options: &GenerationOptions) -> StrataResult<GenerationResult> {
        let plan = self.plan(symbol, options)?;

        let lock = self.locks.entry(symbol.id.clone()).or_default().clone();
        let result = {
            let _guard = lock.lock();
            self.write_plan(symbol, plan, options)
        };
        drop(lock);
        self.locks.remove_if(&symbol.id, |_, lock| Arc::strong_count(lock) == 1);
        result
    }

    #[cfg(test)]
    pub(crate) fn held_locks(&self) -> usize {
        self.locks.len()
    }

    /// Refuse to write over a file that another symbol or the user owns.
    /// The generated path may hold nothing or this symbol's generated file;
    /// the implementation path may hold anything but a generated file.
    fn check_ownership(&self, id: &SymbolId, plan: &Plan) -> StrataResult<()> {
        let read = |path: &Path| self.fs.read(path).map_err(|e| StrataError::io(path, e));
        if let Some(existing) = read(plan.generated_path.as_path())? {
            if !template::generated_by(&existing, id) {
                return Err(StrataError::Conflict(format!(
                    "{} is not the generated file of {id}; refusing to overwrite it",
                    plan.generated_path.display()
                )));
            }
        }
        if let Some(existing) = read(plan.implementation_path.as_path())? {
            if template::is_generated(&existing) {
                return Err(StrataError::Conflict(format!(
                    "{} is a generated file and cannot be the implementation of {id}",
                    plan.implementation_path.display()
                )));
            }
        }
        Ok(())
    }

    fn write_plan(&self, symbol: &ComponentSymbol, plan: Plan, options: &GenerationOptions) -> StrataResult<GenerationResult> {
        self.check_ownership(&symbol.id, &plan)?;
        let mut warnings = plan.warnings;

        if let Some(dir) = plan.generated_path.parent() {
            self.fs
                .create_dir_all(dir)
                .map_err(|e| StrataError::io(dir, e))?;
        }

        let generated_written = if options.overwrite_generated || !self.fs.exists(&plan.generated_path) {
            self.fs
                .write(&plan.generated_path, &plan.generated)
                .map_err(|e| StrataError::io(&plan.generated_path, e))?;
            true
        } else {
            warnings.push(format!(
                "{} exists and overwriteGenerated is off; left unchanged",
                plan.generated_path.display()
            ));
            false
        };

        let user_file_created = self
            .fs
            .write_new(&plan.implementation_path, &plan.implementation)
            .map_err(|e| StrataError::io(&plan.implementation_path, e))?;

        for warning in &warnings {
            tracing::warn!("{}: {}", symbol.id, warning);
        }
        tracing::info!(
            "Generated {} -> {}{}",
            symbol.id,
            plan.generated_path.display(),
            if user_file_created { " (new implementation stub)" } else { "" }
        );

        Ok(GenerationResult {
            symbol_id: symbol.id.clone(),
            generated_path: plan.generated_path,
            implementation_path: plan.implementation_path,
            content_hash: plan.content_hash,
            user_file_created,
            generated_written,
            generated_at: Utc::now(),
            warnings,
        })
    }

    /// Compute what `generate` would write, with no filesystem writes.
    pub fn preview(&self, id: &SymbolId, options: &GenerationOptions) -> StrataResult<PreviewResult> {
        options.validate()?;
        let symbol = self.require(id)?;
        let mut plan = self.plan(&symbol, options)?;
        if let Err(conflict) = self.check_ownership(&symbol.id, &plan) {
            plan.warnings.push(conflict.to_string());
        }
        Ok(PreviewResult {
            symbol_id: symbol.id,
            implementation_exists: self.fs.exists(&plan.implementation_path),
            generated_path: plan.generated_path,
            implementation_path: plan.implementation_path,
            generated_content: plan.generated,
            implementation_stub: plan.implementation,
            content_hash: plan.content_hash,
            warnings: plan.warnings,
        })
    }

    /// Whether the implementation file exists. `false` for unknown symbols
    /// and languages without a template.
    pub fn has_user_implementation(&self, id: &SymbolId, output_dir: &Path) -> StrataResult<bool> {
        let Some(symbol) = self.source.symbol(id)? else {
            return Ok(false);
        };
        let Some(language) = Language::from_name(&symbol.language) else {
            return Ok(false);
        };
        let dir = self.symbol_dir(&symbol, output_dir)?;
        let stem = language.stem(&symbol.name);
        Ok(self.fs.exists(&dir.join(language.implementation_file(&stem))))
    }

    /// Generate each id independently. Missing ids and I/O errors are failed
    /// entries; ineligible symbols are skipped entries.
    pub fn generate_multiple(&self, ids: &[SymbolId], options: &GenerationOptions) -> StrataResult<BatchResult> {
        options.validate()?;
        let mut batch = BatchResult::default();
        for id in ids {
            let outcome = match self.source.symbol(id) {
                Ok(Some(symbol)) => self.attempt(&symbol, options),
                Ok(None) => BatchOutcome::Failed {
                    message: StrataError::NotFound(id.to_string()).to_string(),
                },
                Err(e) => BatchOutcome::Failed { message: e.to_string() },
            };
            batch.push(id.clone(), outcome);
        }
        log_batch(&batch);
        Ok(batch)
    }

    /// Generate every registered symbol.
    pub fn generate_all(&self, options: &GenerationOptions) -> StrataResult<BatchResult> {
        options.validate()?;
        let mut batch = BatchResult::default();
        for symbol in self.source.symbols()? {
            let outcome = self.attempt(&symbol, options);
            batch.push(symbol.id, outcome);
        }
        log_batch(&batch);
        Ok(batch)
    }

    fn attempt(&self, symbol: &ComponentSymbol, options: &GenerationOptions) -> BatchOutcome {
        if let Some(reason) = ineligibility(symbol) {
            tracing::debug!("Skipping {}: {}", symbol.id, reason);
            return BatchOutcome::Skipped { reason };
        }
        match self.generate_symbol(symbol, options) {
            Ok(result) => BatchOutcome::Succeeded { result },
            Err(e) => {
                tracing::warn!("Generation failed for {}: {}", symbol.id, e);
                BatchOutcome::Failed { message: e.to_string() }
            }
        }
    }

    fn symbol_dir(&self, symbol: &ComponentSymbol, output_dir: &Path) -> StrataResult<PathBuf> {
        Ok(namespace_segments(&symbol.namespace)?
            .iter()
            .fold(output_dir.to_path_buf(), |dir, seg| dir.join(seg)))
    }

    fn plan(&self, symbol: &ComponentSymbol, options: &GenerationOptions) -> StrataResult<Plan> {
        let language = Language::from_name(&symbol.language)
            .ok_or_else(|| StrataError::Validation(format!("no template for language {:?}", symbol.language)))?;
        let segments = namespace_segments(&symbol.namespace)?;
        let dir = self.symbol_dir(symbol, &options.output_dir)?;
        let stem = language.stem(&symbol.name);
        let mut warnings = Vec::new();

        let mut refs = BTreeMap::new();
        for rel in symbol.relationships.entries() {
            let target = rel.target();
            if refs.contains_key(target) {
                continue;
            }
            let reference = match self.source.symbol(target)? {
                Some(found) => Reference {
                    type_name: fallback_type_name(&pascal_case(&found.name), target),
                    location: namespace_segments(&found.namespace)
                        .ok()
                        .map(|segs| (segs, language.stem(&found.name))),
                },
                None => {
                    warnings.push(format!(
                        "{} target {} is not registered; rendered by id",
                        rel.edge_kind(),
                        target
                    ));
                    Reference {
                        type_name: fallback_type_name(&pascal_case(target.as_str()), target),
                        location: None,
                    }
                }
            };
            refs.insert(target.clone(), reference);
        }

        let unit = Unit {
            symbol,
            language,
            type_name: pascal_case(&symbol.name),
            segments,
            stem: stem.clone(),
            refs,
            include_docs: options.include_docs,
        };
        let rendered = template::render(&unit, &mut warnings);

        Ok(Plan {
            generated_path: dir.join(language.generated_file(&stem)),
            implementation_path: dir.join(language.implementation_file(&stem)),
            content_hash: content_hash(&rendered.generated),
            generated: rendered.generated,
            implementation: rendered.implementation,
            warnings,
        })
    }
}

fn fallback_type_name(candidate: &str, id: &SymbolId) -> String {
    if candidate.is_empty() {
        format!("Unresolved{}", content_hash(id.as_str()).get(..8).unwrap_or_default())
    } else {
        candidate.to_string()
    }
}

fn log_batch(batch: &BatchResult) {
    tracing::info!(
        "Generation batch: {} total, {} succeeded, {} failed, {} skipped",
        batch.total,
        batch.succeeded,
        batch.failed,
        batch.skipped
    );
}
