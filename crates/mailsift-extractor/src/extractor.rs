//! Core Extractor implementation

use crate::client::GenerationClient;
use crate::config::ExtractorConfig;
use crate::error::ExtractorError;
use crate::exemplars::ExemplarSet;
use crate::honorific::HonorificTable;
use crate::prompt::PromptBuilder;
use crate::reconcile::Reconciler;
use crate::types::{ExtractionMetadata, ExtractionOutcome};
use mailsift_domain::traits::LlmProvider;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::OwnedSemaphorePermit;
use tracing::{debug, info};

/// The Extractor turns one email document into a canonical record
///
/// Prompt building, generation and reconciliation run in sequence; the
/// extractor holds no per-document state and can be shared across tasks.
pub struct Extractor<L> {
    client: GenerationClient<L>,
    reconciler: Reconciler,
    exemplars: ExemplarSet,
    instructions: Option<String>,
    config: ExtractorConfig,
}

impl<L> Extractor<L>
where
    L: LlmProvider + Send + Sync + 'static,
    L::Error: std::fmt::Display,
{
    /// Create a new Extractor
    ///
    /// Fails with a configuration error when the config is invalid or the
    /// instructions file cannot be read.
    pub fn new(llm_provider: L, config: ExtractorConfig) -> Result<Self, ExtractorError> {
        Self::with_shared_provider(Arc::new(llm_provider), config)
    }

    /// Create a new Extractor around an already shared provider
    pub fn with_shared_provider(
        llm_provider: Arc<L>,
        config: ExtractorConfig,
    ) -> Result<Self, ExtractorError> {
        config.validate().map_err(ExtractorError::Config)?;

        let instructions = match &config.instructions_file {
            Some(path) => Some(std::fs::read_to_string(path).map_err(|e| {
                ExtractorError::Config(format!(
                    "Failed to read instructions file {}: {}",
                    path.display(),
                    e
                ))
            })?),
            None => None,
        };

        let honorifics = match &config.honorifics {
            Some(suffixes) => HonorificTable::new(suffixes),
            None => HonorificTable::default(),
        };

        Ok(Self {
            client: GenerationClient::new(llm_provider, config.generation_timeout()),
            reconciler: Reconciler::new(honorifics),
            exemplars: ExemplarSet::builtin(),
            instructions,
            config,
        })
    }

    /// Replace the built-in exemplars
    pub fn with_exemplars(mut self, exemplars: ExemplarSet) -> Self {
        self.exemplars = exemplars;
        self
    }

    /// Active configuration
    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Model name reported by the provider
    pub fn model_name(&self) -> &str {
        self.client.model_name()
    }

    /// Extract a record from one document
    pub async fn extract(
        &self,
        source_id: &str,
        text: &str,
    ) -> Result<ExtractionOutcome, ExtractorError> {
        self.extract_holding(source_id, text, None).await
    }

    /// Extract a record, keeping `permit` until the backend call has returned
    ///
    /// The permit outlives a generation timeout, so a caller bounding backend
    /// calls with a semaphore never has more calls running than permits.
    pub async fn extract_holding(
        &self,
        source_id: &str,
        text: &str,
        permit: Option<OwnedSemaphorePermit>,
    ) -> Result<ExtractionOutcome, ExtractorError> {
        let start_time = Instant::now();

        let length = text.chars().count();
        if length > self.config.max_text_length {
            return Err(ExtractorError::Input(format!(
                "Document is {} characters, limit is {}",
                length, self.config.max_text_length
            )));
        }

        info!("Starting extraction for '{}', text length {}", source_id, length);

        let mut builder = PromptBuilder::new(text, &self.exemplars)
            .with_mode(self.config.response_mode)
            .with_reconciler(&self.reconciler);
        if let Some(instructions) = &self.instructions {
            builder = builder.with_instructions(instructions);
        }
        let request = builder.build()?;

        debug!("Prompt length: {} chars", request.prompt.len());

        let fragments = self
            .client
            .generate_holding(request, permit)
            .await?
            .into_fragments();
        let fragment_count = fragments.len();

        debug!("Backend returned {} fragments for '{}'", fragment_count, source_id);

        let reconciliation = self.reconciler.reconcile(&fragments, text)?;

        let metadata = ExtractionMetadata {
            source_id: source_id.to_string(),
            model_name: self.model_name().to_string(),
            response_mode: self.config.response_mode,
            fragment_count,
            recognized_fragments: reconciliation.recognized,
            processing_time_ms: start_time.elapsed().as_millis() as u64,
        };

        info!(
            "Extraction complete for '{}': {} fragments, {} recognized, importance {}",
            source_id, fragment_count, reconciliation.recognized, reconciliation.record.importance
        );

        Ok(ExtractionOutcome {
            record: reconciliation.record,
            highlights: reconciliation.highlights,
            metadata,
        })
    }
}
