//! Strata Synth: generation-gap code synthesis from registered symbols

pub mod fs;
pub mod options;
pub mod result;
pub mod synthesizer;
pub mod template;

#[cfg(test)]
mod tests;

pub use fs::{FileSystem, LocalFs};
pub use options::{DEFAULT_OUTPUT_DIR, GenerationOptions};
pub use result::{BatchEntry, BatchOutcome, BatchResult, GenerationResult, PreviewResult};
pub use synthesizer::{CodeSynthesizer, Eligibility, content_hash, ineligibility, namespace_segments};
pub use template::Language;
