//! Error types for the Extractor

use mailsift_domain::SchemaViolation;
use thiserror::Error;

/// Errors that can occur during extraction
///
/// `Input`, `Generation`, `EmptyExtraction` and `SchemaViolation` are scoped to a
/// single document; the batch driver records them and moves on. `Config` and
/// `Output` are fatal to the run.
#[derive(Error, Debug)]
pub enum ExtractorError {
    /// Document unreadable or not representable as text
    #[error("Input error: {0}")]
    Input(String),

    /// Backend call failed, timed out, or returned a malformed payload
    #[error("Generation error: {0}")]
    Generation(String),

    /// Backend returned no usable fragments
    #[error("Empty extraction: {0}")]
    EmptyExtraction(String),

    /// A typed field could not be coerced into the record schema
    #[error(transparent)]
    SchemaViolation(#[from] SchemaViolation),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Results could not be written
    #[error("Output error: {0}")]
    Output(String),
}

impl ExtractorError {
    /// Stable name of the error kind, used in logs and failure reports
    pub fn kind(&self) -> &'static str {
        match self {
            ExtractorError::Input(_) => "InputError",
            ExtractorError::Generation(_) => "GenerationError",
            ExtractorError::EmptyExtraction(_) => "EmptyExtractionError",
            ExtractorError::SchemaViolation(_) => "SchemaViolation",
            ExtractorError::Config(_) => "ConfigurationError",
            ExtractorError::Output(_) => "OutputError",
        }
    }

    /// True when the error only invalidates the current document
    pub fn is_document_scoped(&self) -> bool {
        matches!(
            self,
            ExtractorError::Input(_)
                | ExtractorError::Generation(_)
                | ExtractorError::EmptyExtraction(_)
                | ExtractorError::SchemaViolation(_)
        )
    }
}

impl From<serde_json::Error> for ExtractorError {
    fn from(err: serde_json::Error) -> Self {
        ExtractorError::Generation(format!("JSON parse error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        assert_eq!(ExtractorError::Input("x".into()).kind(), "InputError");
        assert_eq!(ExtractorError::Generation("x".into()).kind(), "GenerationError");
        assert_eq!(ExtractorError::EmptyExtraction("x".into()).kind(), "EmptyExtractionError");
        assert_eq!(ExtractorError::Config("x".into()).kind(), "ConfigurationError");
    }

    #[test]
    fn test_document_scope() {
        assert!(ExtractorError::Generation("timeout".into()).is_document_scoped());
        assert!(!ExtractorError::Config("missing key".into()).is_document_scoped());
        assert!(!ExtractorError::Output("disk full".into()).is_document_scoped());
    }

    #[test]
    fn test_schema_violation_conversion() {
        let violation = SchemaViolation {
            field: "importance".to_string(),
            value: "urgent".to_string(),
            reason: "unknown level".to_string(),
        };
        let err: ExtractorError = violation.into();
        assert_eq!(err.kind(), "SchemaViolation");
        assert!(err.to_string().contains("importance"));
    }
}
