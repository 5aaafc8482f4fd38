//! mailsift Domain Layer
//!
//! This crate contains the data model shared by every other mailsift crate:
//! the canonical record an email is reduced to, the raw fragments a
//! generation backend returns, and the trait interface the backend implements.
//!
//! ## Key Concepts
//!
//! - **Fragment**: One labeled unit of extracted information, prior to reconciliation
//! - **Canonical Record**: The final, schema-validated, per-document output
//! - **Importance**: Triage level, serialized with the corpus labels
//!
//! ## Architecture
//!
//! - No I/O, no async runtime
//! - Trait definitions for all external interactions
//! - Infrastructure implementations live in other crates

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod fragment;
pub mod importance;
pub mod record;
pub mod traits;

// Re-exports for convenience
pub use fragment::{AttributeValue, ExtractionFragment, SourceSpan};
pub use importance::Importance;
pub use record::{
    parse_received_at, CanonicalRecord, RecordField, SchemaViolation, UNKNOWN_SENDER,
    UNKNOWN_SUBJECT,
};
