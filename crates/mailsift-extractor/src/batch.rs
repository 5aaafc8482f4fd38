//! Batch driver: many documents, bounded concurrency, failures isolated

use crate::error::ExtractorError;
use crate::extractor::Extractor;
use crate::types::{DocumentFailure, ProcessedRecord, SourceDocument};
use mailsift_domain::traits::LlmProvider;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{error, info, warn};
use walkdir::WalkDir;

/// Extensions picked up by directory discovery when none are configured
pub const DEFAULT_EXTENSIONS: &[&str] = &["md"];

/// Overall result of a batch run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    /// Every document produced a record
    Complete,
    /// Some documents failed
    Partial,
    /// No document produced a record
    AllFailed,
    /// There was nothing to process
    Empty,
}

/// Collected output of a batch run, in input order
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    /// One element per successful document
    pub records: Vec<ProcessedRecord>,

    /// One element per failed document
    pub failures: Vec<DocumentFailure>,
}

impl BatchReport {
    /// Number of documents that produced a record
    pub fn succeeded(&self) -> usize {
        self.records.len()
    }

    /// Number of documents that failed
    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    /// Summarize the run
    pub fn status(&self) -> BatchStatus {
        match (self.succeeded(), self.failed()) {
            (0, 0) => BatchStatus::Empty,
            (0, _) => BatchStatus::AllFailed,
            (_, 0) => BatchStatus::Complete,
            _ => BatchStatus::Partial,
        }
    }

    /// The records as a pretty-printed JSON array
    pub fn to_json(&self) -> Result<String, ExtractorError> {
        serde_json::to_string_pretty(&self.records)
            .map_err(|e| ExtractorError::Output(format!("Failed to serialize results: {}", e)))
    }

    /// Write the records array to `path`
    ///
    /// An all-failed run still writes `[]`.
    pub fn write_json(&self, path: &Path) -> Result<(), ExtractorError> {
        let json = self.to_json()?;
        std::fs::write(path, json + "\n").map_err(|e| {
            ExtractorError::Output(format!("Failed to write {}: {}", path.display(), e))
        })?;
        info!("Wrote {} records to {}", self.succeeded(), path.display());
        Ok(())
    }
}

type ProgressFn = dyn Fn(&str, bool) + Send + Sync;

/// Runs the extractor over many documents
pub struct BatchDriver<L> {
    extractor: Arc<Extractor<L>>,
    concurrency: usize,
    on_progress: Option<Arc<ProgressFn>>,
}

impl<L> BatchDriver<L>
where
    L: LlmProvider + Send + Sync + 'static,
    L::Error: std::fmt::Display,
{
    /// Create a driver using the extractor's configured concurrency
    pub fn new(extractor: Extractor<L>) -> Self {
        let concurrency = extractor.config().concurrency;
        Self {
            extractor: Arc::new(extractor),
            concurrency,
            on_progress: None,
        }
    }

    /// Override the number of documents in flight (minimum 1)
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Call `callback(document_id, succeeded)` as each document finishes
    pub fn with_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(&str, bool) + Send + Sync + 'static,
    {
        self.on_progress = Some(Arc::new(callback));
        self
    }

    /// Process every document, never aborting on a per-document failure
    pub async fn run(&self, documents: Vec<SourceDocument>) -> BatchReport {
        info!(
            "Processing {} documents with concurrency {}",
            documents.len(),
            self.concurrency
        );

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut handles = Vec::with_capacity(documents.len());

        for document in documents {
            let semaphore = Arc::clone(&semaphore);
            let extractor = Arc::clone(&self.extractor);
            let on_progress = self.on_progress.clone();
            let id = document.id.clone();

            let handle = tokio::spawn(async move {
                let result = match semaphore.acquire_owned().await {
                    Ok(permit) => process_document(&extractor, &document, permit).await,
                    Err(e) => Err(ExtractorError::Generation(format!("Worker pool closed: {}", e))),
                };
                if let Some(callback) = on_progress {
                    callback(&document.id, result.is_ok());
                }
                result
            });
            handles.push((id, handle));
        }

        let mut report = BatchReport::default();
        for (id, handle) in handles {
            let result = handle
                .await
                .unwrap_or_else(|e| Err(ExtractorError::Generation(format!("Task join error: {}", e))));

            match result {
                Ok(record) => {
                    info!("Processed successfully: {}", id);
                    report.records.push(record);
                }
                Err(e) => {
                    error!(document = %id, kind = e.kind(), "Processing failed: {}", e);
                    report.failures.push(DocumentFailure::new(id, &e));
                }
            }
        }

        info!(
            "Batch finished: {} succeeded, {} failed",
            report.succeeded(),
            report.failed()
        );
        report
    }
}

async fn process_document<L>(
    extractor: &Extractor<L>,
    document: &SourceDocument,
    permit: OwnedSemaphorePermit,
) -> Result<ProcessedRecord, ExtractorError>
where
    L: LlmProvider + Send + Sync + 'static,
    L::Error: std::fmt::Display,
{
    let text = document.read().await?;
    let outcome = extractor
        .extract_holding(&document.id, &text, Some(permit))
        .await?;
    Ok(ProcessedRecord::new(outcome.record, document.id.clone()))
}

/// Find documents under `dir`, sorted by path
///
/// Matching is on file extension, case-insensitive. Identifiers are paths
/// relative to `dir`. A missing directory is an input error.
pub fn discover_documents(
    dir: &Path,
    extensions: &[String],
    recursive: bool,
) -> Result<Vec<SourceDocument>, ExtractorError> {
    if !dir.is_dir() {
        return Err(ExtractorError::Input(format!(
            "Input directory not found: {}",
            dir.display()
        )));
    }

    let wanted: Vec<String> = if extensions.is_empty() {
        DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect()
    } else {
        extensions
            .iter()
            .map(|e| e.trim().trim_start_matches('.').to_ascii_lowercase())
            .collect()
    };

    let walker = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(if recursive { usize::MAX } else { 1 })
        .sort_by_file_name();

    let mut documents = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry: {}", e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let matches = entry
            .path()
            .extension()
            .map(|ext| wanted.contains(&ext.to_string_lossy().to_ascii_lowercase()))
            .unwrap_or(false);
        if !matches {
            continue;
        }

        let id = entry
            .path()
            .strip_prefix(dir)
            .unwrap_or(entry.path())
            .to_string_lossy()
            .replace('\\', "/");
        documents.push(SourceDocument::from_path(entry.path()).with_id(id));
    }

    info!("Found {} documents in {}", documents.len(), dir.display());
    Ok(documents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExtractorConfig;
    use mailsift_llm::MockProvider;
    use std::fs;

    #[test]
    fn test_discover_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.md"), "b").unwrap();
        fs::write(dir.path().join("a.MD"), "a").unwrap();
        fs::write(dir.path().join("notes.txt"), "n").unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("nested").join("c.md"), "c").unwrap();

        let flat = discover_documents(dir.path(), &[], false).unwrap();
        let ids: Vec<_> = flat.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["a.MD", "b.md"]);

        let deep = discover_documents(dir.path(), &[], true).unwrap();
        let ids: Vec<_> = deep.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["a.MD", "b.md", "nested/c.md"]);
    }

    #[test]
    fn test_discover_custom_extensions() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.md"), "a").unwrap();
        fs::write(dir.path().join("b.eml"), "b").unwrap();
        fs::write(dir.path().join("c.txt"), "c").unwrap();

        let docs = discover_documents(dir.path(), &[".eml".to_string(), "TXT".to_string()], false).unwrap();
        let ids: Vec<_> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["b.eml", "c.txt"]);
    }

    #[test]
    fn test_discover_missing_dir() {
        let err = discover_documents(Path::new("/no/such/mailbox"), &[], false).unwrap_err();
        assert_eq!(err.kind(), "InputError");
    }

    #[test]
    fn test_status() {
        let mut report = BatchReport::default();
        assert_eq!(report.status(), BatchStatus::Empty);

        report.failures.push(DocumentFailure::new("x", &ExtractorError::Generation("boom".into())));
        assert_eq!(report.status(), BatchStatus::AllFailed);

        report.records.push(ProcessedRecord::new(Default::default(), "y"));
        assert_eq!(report.status(), BatchStatus::Partial);

        report.failures.clear();
        assert_eq!(report.status(), BatchStatus::Complete);
    }

    #[test]
    fn test_empty_report_writes_empty_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        BatchReport::default().write_json(&path).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap().trim(), "[]");
    }

    #[test]
    fn test_write_to_missing_dir_is_output_error() {
        let err = BatchReport::default()
            .write_json(Path::new("/no/such/dir/out.json"))
            .unwrap_err();
        assert_eq!(err.kind(), "OutputError");
    }

    #[tokio::test]
    async fn test_progress_callback_sees_every_document() {
        let provider = MockProvider::new(r#"[{"extraction_class": "keyword", "extraction_text": "請求"}]"#);
        let extractor = Extractor::new(provider, ExtractorConfig::default()).unwrap();

        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let driver = BatchDriver::new(extractor).with_progress(move |id, ok| {
            sink.lock().unwrap().push((id.to_string(), ok));
        });

        let docs = vec![
            SourceDocument::inline("one", "請求書"),
            SourceDocument::inline("two", "請求書"),
        ];
        let report = driver.run(docs).await;

        assert_eq!(report.succeeded(), 2);
        let mut seen = seen.lock().unwrap().clone();
        seen.sort();
        assert_eq!(seen, vec![("one".to_string(), true), ("two".to_string(), true)]);
    }
}
