//! Outcomes reported by the synthesizer

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strata_core::SymbolId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResult {
    pub symbol_id: SymbolId,
    pub generated_path: PathBuf,
    pub implementation_path: PathBuf,
    /// SHA-256 of the rendered generated content, hex encoded.
    pub content_hash: String,
    /// The implementation stub was created by this call.
    pub user_file_created: bool,
    /// The generated file was written by this call.
    pub generated_written: bool,
    pub generated_at: DateTime<Utc>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

/// What `generate` would produce, computed without touching the filesystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewResult {
    pub symbol_id: SymbolId,
    pub generated_path: PathBuf,
    pub implementation_path: PathBuf,
    pub generated_content: String,
    pub implementation_stub: String,
    pub content_hash: String,
    pub implementation_exists: bool,
    #[serde(default)]
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum BatchOutcome {
    Succeeded { result: GenerationResult },
    Failed { message: String },
    Skipped { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchEntry {
    pub symbol_id: SymbolId,
    #[serde(flatten)]
    pub outcome: BatchOutcome,
}

/// `total == succeeded + failed + skipped`, one entry per attempted symbol.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResult {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub results: Vec<BatchEntry>,
}

impl BatchResult {
    pub fn push(&mut self, symbol_id: SymbolId, outcome: BatchOutcome) {
        match &outcome {
            BatchOutcome::Succeeded { .. } => self.succeeded += 1,
            BatchOutcome::Failed { .. } => self.failed += 1,
            BatchOutcome::Skipped { .. } => self.skipped += 1,
        }
        self.total += 1;
        self.results.push(BatchEntry { symbol_id, outcome });
    }

    pub fn entry(&self, id: &SymbolId) -> Option<&BatchEntry> {
        self.results.iter().find(|e| &e.symbol_id == id)
    }
}
