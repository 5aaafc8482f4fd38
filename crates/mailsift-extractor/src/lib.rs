//! mailsift Extractor
//!
//! Turns unstructured email documents into canonical records using an LLM.
//!
//! # Overview
//!
//! Each document is handled independently: a prompt is built from the
//! instruction block, the few-shot exemplars and the document; the backend
//! answers with either one record object or a sequence of labeled fragments;
//! reconciliation folds that answer into a validated [`CanonicalRecord`].
//!
//! # Architecture
//!
//! ```text
//! Document → PromptBuilder → GenerationClient → LLM → Reconciler → CanonicalRecord
//! ```
//!
//! The [`BatchDriver`] runs many documents with bounded concurrency, isolating
//! per-document failures.
//!
//! # Example Usage
//!
//! ```no_run
//! use mailsift_extractor::{BatchDriver, Extractor, ExtractorConfig, discover_documents};
//! use mailsift_llm::{GeminiConfig, GeminiProvider};
//! use std::path::Path;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let provider = GeminiProvider::new(GeminiConfig::from_env()?)?;
//! let extractor = Extractor::new(provider, ExtractorConfig::default())?;
//!
//! let documents = discover_documents(Path::new("mail"), &[], false)?;
//! let report = BatchDriver::new(extractor).run(documents).await;
//!
//! println!("Succeeded: {}", report.succeeded());
//! println!("Failed: {}", report.failed());
//! report.write_json(Path::new("extraction_results.json"))?;
//! # Ok(())
//! # }
//! ```
//!
//! [`CanonicalRecord`]: mailsift_domain::CanonicalRecord

#![warn(missing_docs)]

mod batch;
mod client;
mod config;
mod error;
mod exemplars;
mod extractor;
mod honorific;
mod parser;
mod prompt;
mod reconcile;
mod types;

#[cfg(test)]
mod tests;

pub use batch::{discover_documents, BatchDriver, BatchReport, BatchStatus, DEFAULT_EXTENSIONS};
pub use client::{GenerationClient, GenerationRequest, GenerationResponse, RECORD_FRAGMENT_CLASS};
pub use config::{ExtractorConfig, ResponseMode};
pub use error::ExtractorError;
pub use exemplars::{locate, Exemplar, ExemplarSet};
pub use extractor::Extractor;
pub use honorific::{HonorificTable, NormalizedName, DEFAULT_HONORIFICS};
pub use parser::{parse_fragments, parse_record_object};
pub use prompt::{PromptBuilder, EXTRACTION_INSTRUCTIONS};
pub use reconcile::{Reconciler, Reconciliation};
pub use types::{
    DocumentFailure, ExtractionMetadata, ExtractionOutcome, Highlight, ProcessedRecord,
    SourceDocument,
};
