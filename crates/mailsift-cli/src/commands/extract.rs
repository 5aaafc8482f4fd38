//! Extract command implementation.

use crate::cli::ExtractArgs;
use crate::config::OutputFormat;
use crate::error::Result;
use crate::output::Formatter;
use crate::viewer::write_viewer;
use mailsift_domain::traits::LlmProvider;
use mailsift_extractor::{Extractor, ExtractorConfig, SourceDocument};
use std::sync::Arc;
use tracing::info;

/// Execute the extract command.
pub async fn execute_extract<L>(
    args: ExtractArgs,
    provider: Arc<L>,
    config: ExtractorConfig,
    formatter: &Formatter,
) -> Result<()>
where
    L: LlmProvider + Send + Sync + 'static,
    L::Error: std::fmt::Display,
{
    let document = SourceDocument::from_path(&args.file);
    let text = document.read().await?;
    let extractor = Extractor::with_shared_provider(provider, config)?;

    info!("Processing file: {}", document.id);
    let outcome = extractor.extract(&document.id, &text).await?;

    let json = serde_json::to_string_pretty(&outcome.record)?;
    std::fs::write(&args.output, json + "\n")?;

    if let Some(html) = &args.html {
        write_viewer(html, &text, &outcome.highlights, &outcome.record)?;
    }

    println!("{}", formatter.format_record(&outcome.record)?);
    if formatter.format() != OutputFormat::Quiet {
        println!("{}", formatter.extraction_stats(&outcome.metadata));
        println!(
            "{}",
            formatter.success(&format!("Saved result to {}", args.output.display()))
        );
        if let Some(html) = &args.html {
            println!("{}", formatter.success(&format!("Saved viewer to {}", html.display())));
        }
    }

    Ok(())
}
