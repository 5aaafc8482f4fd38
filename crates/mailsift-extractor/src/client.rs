//! Generation client: one backend call per document

use crate::config::ResponseMode;
use crate::error::ExtractorError;
use crate::parser::{parse_fragments, parse_record_object};
use mailsift_domain::traits::LlmProvider;
use mailsift_domain::{AttributeValue, ExtractionFragment};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OwnedSemaphorePermit;
use tokio::time::timeout;
use tracing::debug;

/// Class label given to the synthetic fragment wrapping a record-object response
pub const RECORD_FRAGMENT_CLASS: &str = "email_info";

/// Everything the backend needs for one document
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// Full prompt text (instructions, exemplars, document, format reminder)
    pub prompt: String,

    /// Response shape to ask for
    pub mode: ResponseMode,

    /// Structured-output schema, when the mode has one
    pub schema: Option<serde_json::Value>,
}

/// Parsed backend answer
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationResponse {
    /// A single record object, as an attribute map
    Record(BTreeMap<String, AttributeValue>),

    /// A sequence of labeled fragments
    Fragments(Vec<ExtractionFragment>),
}

impl GenerationResponse {
    /// Flatten into fragments so both modes share reconciliation
    ///
    /// A record object becomes one attribute-bearing fragment.
    pub fn into_fragments(self) -> Vec<ExtractionFragment> {
        match self {
            GenerationResponse::Fragments(fragments) => fragments,
            GenerationResponse::Record(attributes) => {
                let mut fragment = ExtractionFragment::new(RECORD_FRAGMENT_CLASS, "");
                fragment.attributes = attributes;
                vec![fragment]
            }
        }
    }
}

/// Calls the backend and parses what comes back
///
/// The provider is synchronous; calls run on the blocking pool under a timeout.
/// A timeout abandons the wait, not the call: the blocking task runs to
/// completion and keeps any permit it was given until then.
/// Every failure surfaces as [`ExtractorError::Generation`]. No retries here.
pub struct GenerationClient<L> {
    provider: Arc<L>,
    timeout: Duration,
}

impl<L> GenerationClient<L>
where
    L: LlmProvider + Send + Sync + 'static,
    L::Error: std::fmt::Display,
{
    /// Wrap a provider
    pub fn new(provider: Arc<L>, timeout: Duration) -> Self {
        Self { provider, timeout }
    }

    /// Model name reported by the provider
    pub fn model_name(&self) -> &str {
        self.provider.model_name()
    }

    /// Run one request
    pub async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse, ExtractorError> {
        self.generate_holding(request, None).await
    }

    /// Run one request, keeping `permit` until the backend call has returned
    pub async fn generate_holding(
        &self,
        request: GenerationRequest,
        permit: Option<OwnedSemaphorePermit>,
    ) -> Result<GenerationResponse, ExtractorError> {
        let mode = request.mode;
        let raw = timeout(self.timeout, self.call_provider(request, permit))
            .await
            .map_err(|_| {
                ExtractorError::Generation(format!(
                    "Backend did not answer within {:?}",
                    self.timeout
                ))
            })??;

        debug!("Backend response length: {} chars", raw.len());

        match mode {
            ResponseMode::Record => parse_record_object(&raw).map(GenerationResponse::Record),
            ResponseMode::Fragments => parse_fragments(&raw).map(GenerationResponse::Fragments),
        }
    }

    async fn call_provider(
        &self,
        request: GenerationRequest,
        permit: Option<OwnedSemaphorePermit>,
    ) -> Result<String, ExtractorError> {
        let provider = Arc::clone(&self.provider);
        let schema = match &request.schema {
            Some(schema) => schema.to_string(),
            None => String::new(),
        };

        // Call in a blocking context since LlmProvider is not async
        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            provider
                .generate_structured(&request.prompt, &schema)
                .map_err(|e| ExtractorError::Generation(e.to_string()))
        })
        .await
        .map_err(|e| ExtractorError::Generation(format!("Task join error: {}", e)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mailsift_llm::MockProvider;

    fn request(mode: ResponseMode) -> GenerationRequest {
        GenerationRequest {
            prompt: "prompt".to_string(),
            mode,
            schema: None,
        }
    }

    #[tokio::test]
    async fn test_fragments_mode() {
        let provider = MockProvider::new(r#"[{"extraction_class": "person", "extraction_text": "木村"}]"#);
        let client = GenerationClient::new(Arc::new(provider), Duration::from_secs(5));

        let response = client.generate(request(ResponseMode::Fragments)).await.unwrap();
        match response {
            GenerationResponse::Fragments(fragments) => assert_eq!(fragments[0].matched_text, "木村"),
            other => panic!("Expected fragments, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_record_mode_becomes_one_fragment() {
        let provider = MockProvider::new(r#"{"subject": "ご請求", "importance": "低"}"#);
        let client = GenerationClient::new(Arc::new(provider), Duration::from_secs(5));

        let response = client.generate(request(ResponseMode::Record)).await.unwrap();
        let fragments = response.into_fragments();
        assert_eq!(fragments.len(), 1);
        assert_eq!(fragments[0].class_label, RECORD_FRAGMENT_CLASS);
        assert_eq!(fragments[0].attributes.len(), 2);
    }

    #[tokio::test]
    async fn test_schema_is_forwarded() {
        let provider = MockProvider::new("{}");
        let client = GenerationClient::new(Arc::new(provider.clone()), Duration::from_secs(5));

        let mut req = request(ResponseMode::Record);
        req.schema = Some(serde_json::json!({"type": "OBJECT"}));
        client.generate(req).await.unwrap();

        assert_eq!(provider.last_schema().as_deref(), Some(r#"{"type":"OBJECT"}"#));
    }

    #[tokio::test]
    async fn test_provider_failure_is_generation_error() {
        let provider = MockProvider::failing("401 Unauthorized");
        let client = GenerationClient::new(Arc::new(provider), Duration::from_secs(5));

        let err = client.generate(request(ResponseMode::Fragments)).await.unwrap_err();
        assert_eq!(err.kind(), "GenerationError");
        assert!(err.to_string().contains("401"));
    }

    #[tokio::test]
    async fn test_malformed_payload_is_generation_error() {
        let provider = MockProvider::new("I could not find anything, sorry!");
        let client = GenerationClient::new(Arc::new(provider), Duration::from_secs(5));

        let err = client.generate(request(ResponseMode::Fragments)).await.unwrap_err();
        assert!(matches!(err, ExtractorError::Generation(_)));
    }

    #[tokio::test]
    async fn test_permit_outlives_timed_out_call() {
        let provider = MockProvider::new("[]").with_delay(Duration::from_millis(400));
        let client = GenerationClient::new(Arc::new(provider), Duration::from_millis(50));
        let slots = Arc::new(tokio::sync::Semaphore::new(1));

        let permit = Arc::clone(&slots).acquire_owned().await.unwrap();
        let err = client
            .generate_holding(request(ResponseMode::Fragments), Some(permit))
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractorError::Generation(_)));

        // the abandoned call still occupies the slot
        assert_eq!(slots.available_permits(), 0);
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(slots.available_permits(), 1);
    }

    #[tokio::test]
    async fn test_timeout_is_generation_error() {
        let provider = MockProvider::new("[]").with_delay(Duration::from_millis(500));
        let client = GenerationClient::new(Arc::new(provider), Duration::from_millis(50));

        let err = client.generate(request(ResponseMode::Fragments)).await.unwrap_err();
        assert!(matches!(err, ExtractorError::Generation(ref msg) if msg.contains("did not answer")));
    }
}
