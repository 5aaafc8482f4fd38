//! Batch command implementation.

use crate::cli::BatchArgs;
use crate::error::Result;
use crate::output::Formatter;
use indicatif::{ProgressBar, ProgressStyle};
use mailsift_domain::traits::LlmProvider;
use mailsift_extractor::{discover_documents, BatchDriver, BatchReport, Extractor, ExtractorConfig};
use std::sync::Arc;
use tracing::info;

const PROGRESS_TEMPLATE: &str = "{spinner} [{elapsed_precise}] {bar:40} {pos}/{len} {msg}";

/// Execute the batch command.
///
/// Per-document failures end up in the returned report. Only setup problems,
/// a missing input directory and an unwritable output file are errors.
pub async fn execute_batch<L>(
    args: BatchArgs,
    provider: Arc<L>,
    mut config: ExtractorConfig,
    formatter: &Formatter,
) -> Result<BatchReport>
where
    L: LlmProvider + Send + Sync + 'static,
    L::Error: std::fmt::Display,
{
    if let Some(concurrency) = args.concurrency {
        config.concurrency = concurrency;
    }
    let extractor = Extractor::with_shared_provider(provider, config)?;

    let documents = discover_documents(&args.input_dir, &args.extensions, args.recursive)?;
    info!(
        "Found {} documents in {}",
        documents.len(),
        args.input_dir.display()
    );

    let progress = if args.no_progress {
        ProgressBar::hidden()
    } else {
        let bar = ProgressBar::new(documents.len() as u64);
        let style = ProgressStyle::with_template(PROGRESS_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        bar.set_style(style);
        bar
    };

    let bar = progress.clone();
    let driver = BatchDriver::new(extractor).with_progress(move |id, succeeded| {
        if !succeeded {
            bar.println(format!("failed: {}", id));
        }
        bar.set_message(id.to_string());
        bar.inc(1);
    });

    let report = driver.run(documents).await;
    progress.finish_and_clear();

    report.write_json(&args.output)?;

    println!("{}", formatter.format_batch_summary(&report)?);
    println!(
        "{}",
        formatter.info(&format!("Results written to {}", args.output.display()))
    );

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::BackendArgs;
    use crate::config::OutputFormat;
    use crate::error::CliError;
    use mailsift_extractor::{BatchStatus, ExtractorError};
    use mailsift_llm::MockProvider;
    use std::path::Path;

    const FRAGMENTS: &str = r#"{"extractions": [
        {"extraction_class": "header_info", "extraction_text": "", "attributes": {
            "subject": "定例会議のお知らせ", "sender": "info@example.com"}},
        {"extraction_class": "analysis_result", "extraction_text": "", "attributes": {
            "importance": "低", "summary": "定例会議の日程連絡。"}}
    ]}"#;

    fn batch_args(input: &Path, output: &Path) -> BatchArgs {
        BatchArgs {
            input_dir: input.to_path_buf(),
            output: output.to_path_buf(),
            concurrency: Some(2),
            recursive: false,
            extensions: Vec::new(),
            no_progress: true,
            backend: BackendArgs::default(),
        }
    }

    fn quiet() -> Formatter {
        Formatter::new(OutputFormat::Quiet, false)
    }

    #[tokio::test]
    async fn test_batch_isolates_failures() {
        let dir = tempfile::tempdir().unwrap();
        let inbox = dir.path().join("inbox");
        std::fs::create_dir(&inbox).unwrap();
        std::fs::write(inbox.join("01.md"), "一通目").unwrap();
        std::fs::write(inbox.join("02.md"), "二通目 BROKEN").unwrap();
        std::fs::write(inbox.join("03.md"), "三通目").unwrap();
        std::fs::write(inbox.join("notes.txt"), "ignored").unwrap();

        let mut provider = MockProvider::new(FRAGMENTS);
        provider.fail_when_contains("BROKEN");
        let output = dir.path().join("results.json");

        let report = execute_batch(
            batch_args(&inbox, &output),
            Arc::new(provider),
            ExtractorConfig::default(),
            &quiet(),
        )
        .await
        .unwrap();

        assert_eq!(report.status(), BatchStatus::Partial);
        assert_eq!(report.failures[0].document_id, "02.md");

        let written: Vec<serde_json::Value> =
            serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
        assert_eq!(written.len(), 2);
        assert_eq!(written[0]["filename"], "01.md");
        assert_eq!(written[1]["filename"], "03.md");
        assert_eq!(written[0]["importance"], "低");
    }

    #[tokio::test]
    async fn test_missing_directory_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("results.json");

        let result = execute_batch(
            batch_args(&dir.path().join("nowhere"), &output),
            Arc::new(MockProvider::new(FRAGMENTS)),
            ExtractorConfig::default(),
            &quiet(),
        )
        .await;

        assert!(matches!(result, Err(CliError::Extractor(ExtractorError::Input(_)))));
        assert!(!output.exists());
    }

    #[tokio::test]
    async fn test_all_failed_still_writes_empty_array() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.md"), "本文").unwrap();
        let output = dir.path().join("out").join("results.json");
        std::fs::create_dir(dir.path().join("out")).unwrap();

        let report = execute_batch(
            batch_args(dir.path(), &output),
            Arc::new(MockProvider::failing("unavailable")),
            ExtractorConfig::default(),
            &quiet(),
        )
        .await
        .unwrap();

        assert_eq!(report.status(), BatchStatus::AllFailed);
        assert_eq!(std::fs::read_to_string(&output).unwrap().trim(), "[]");
    }

    #[tokio::test]
    async fn test_zero_concurrency_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut args = batch_args(dir.path(), &dir.path().join("results.json"));
        args.concurrency = Some(0);

        let result = execute_batch(
            args,
            Arc::new(MockProvider::new(FRAGMENTS)),
            ExtractorConfig::default(),
            &quiet(),
        )
        .await;

        assert!(matches!(result, Err(CliError::Extractor(ExtractorError::Config(_)))));
    }
}
