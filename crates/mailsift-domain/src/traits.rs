//! Trait definitions for external interactions
//!
//! These traits define the boundaries between domain logic and infrastructure.
//! Infrastructure implementations live in other crates.

/// Trait for LLM provider operations
///
/// Implemented by the infrastructure layer (mailsift-llm). Implementations
/// must be stateless per call so a single provider can serve concurrent
/// documents.
pub trait LlmProvider {
    /// Error type for LLM operations
    type Error;

    /// Generate text completion
    fn generate(&self, prompt: &str) -> Result<String, Self::Error>;

    /// Generate JSON output, constrained by `schema` when it is non-empty
    ///
    /// `schema` is a JSON document in the backend's response-schema dialect.
    fn generate_structured(&self, prompt: &str, schema: &str) -> Result<String, Self::Error>;

    /// Model identifier reported in logs
    fn model_name(&self) -> &str {
        "llm"
    }
}
