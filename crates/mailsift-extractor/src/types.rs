//! Request and result types for extraction

use crate::config::ResponseMode;
use crate::error::ExtractorError;
use chrono::{DateTime, Utc};
use mailsift_domain::{CanonicalRecord, SourceSpan};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
enum DocumentBody {
    File(PathBuf),
    Inline(String),
}

/// One email document queued for extraction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDocument {
    /// Identifier reported in results and failure logs
    pub id: String,
    body: DocumentBody,
}

impl SourceDocument {
    /// A document read lazily from disk, identified by its file name
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let id = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self {
            id,
            body: DocumentBody::File(path),
        }
    }

    /// A document whose text is already in memory
    pub fn inline(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            body: DocumentBody::Inline(text.into()),
        }
    }

    /// Override the identifier
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Backing file, if any
    pub fn path(&self) -> Option<&Path> {
        match &self.body {
            DocumentBody::File(path) => Some(path),
            DocumentBody::Inline(_) => None,
        }
    }

    /// Load the document text
    ///
    /// Unreadable files and bytes that are not valid UTF-8 are input errors.
    pub async fn read(&self) -> Result<String, ExtractorError> {
        match &self.body {
            DocumentBody::Inline(text) => Ok(text.clone()),
            DocumentBody::File(path) => {
                let bytes = tokio::fs::read(path).await.map_err(|e| {
                    ExtractorError::Input(format!("Failed to read {}: {}", path.display(), e))
                })?;
                let text = String::from_utf8(bytes).map_err(|e| {
                    ExtractorError::Input(format!("{} is not valid UTF-8: {}", path.display(), e))
                })?;
                Ok(match text.strip_prefix('\u{feff}') {
                    Some(stripped) => stripped.to_string(),
                    None => text,
                })
            }
        }
    }
}

/// A labeled span of the source document, for the highlight viewer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Highlight {
    /// Fragment class that produced the span
    pub class_label: String,

    /// Text as recorded after normalization
    pub text: String,

    /// Character interval into the source document
    pub span: SourceSpan,
}

/// Metadata about an extraction operation
#[derive(Debug, Clone)]
pub struct ExtractionMetadata {
    /// Source identifier
    pub source_id: String,

    /// Name of the LLM model used
    pub model_name: String,

    /// Response shape that was requested
    pub response_mode: ResponseMode,

    /// Fragments returned by the backend
    pub fragment_count: usize,

    /// Fragments whose class was recognized
    pub recognized_fragments: usize,

    /// Processing time in milliseconds
    pub processing_time_ms: u64,
}

/// Result of extracting one document
#[derive(Debug, Clone)]
pub struct ExtractionOutcome {
    /// The validated record
    pub record: CanonicalRecord,

    /// Spans for the highlight viewer, ordered by position
    pub highlights: Vec<Highlight>,

    /// Metadata about the extraction
    pub metadata: ExtractionMetadata,
}

/// One element of the batch output array
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedRecord {
    /// Extracted fields, flattened into the element
    #[serde(flatten)]
    pub record: CanonicalRecord,

    /// Source document identifier
    pub filename: String,

    /// When the document finished processing
    pub processed_at: DateTime<Utc>,
}

impl ProcessedRecord {
    /// Stamp a record with its document and the current time
    pub fn new(record: CanonicalRecord, filename: impl Into<String>) -> Self {
        Self {
            record,
            filename: filename.into(),
            processed_at: Utc::now(),
        }
    }
}

/// A document that did not produce a record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentFailure {
    /// Source document identifier
    pub document_id: String,

    /// Error kind, e.g. `GenerationError`
    pub kind: String,

    /// Human-readable reason
    pub reason: String,
}

impl DocumentFailure {
    /// Record a failed document
    pub fn new(document_id: impl Into<String>, error: &ExtractorError) -> Self {
        Self {
            document_id: document_id.into(),
            kind: error.kind().to_string(),
            reason: error.to_string(),
        }
    }
}
