//! Generation options

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use strata_core::{StrataError, StrataResult};

pub const DEFAULT_OUTPUT_DIR: &str = "generated";

fn yes() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationOptions {
    pub output_dir: PathBuf,
    /// Rewrite the generated file even if it already exists.
    #[serde(default = "yes")]
    pub overwrite_generated: bool,
    /// Render descriptions and classification as doc comments.
    #[serde(default = "yes")]
    pub include_docs: bool,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        GenerationOptions {
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            overwrite_generated: true,
            include_docs: true,
        }
    }
}

impl GenerationOptions {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        GenerationOptions {
            output_dir: output_dir.into(),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> StrataResult<()> {
        if self.output_dir.as_os_str().is_empty() {
            return Err(StrataError::Config("outputDir must not be empty".to_string()));
        }
        Ok(())
    }
}
