use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use icf_generator::generator::load_fallback_response;
use icf_generator::llm::{CompletionModel, OfflineModel, OllamaClient};
use icf_generator::{AppConfig, IcfGenerator};

#[derive(Parser, Debug)]
#[command(name = "icf-extract")]
#[command(about = "Generate a consent-form draft from a local protocol PDF or DOCX")]
struct Cli {
    #[arg(long)]
    input: PathBuf,
    #[arg(long)]
    output: PathBuf,
    /// Skip the model service and use the fallback response.
    #[arg(long, default_value_t = false)]
    offline: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let config = AppConfig::from_env();
    let fallback = load_fallback_response(&config).await?;

    let model: Arc<dyn CompletionModel> = if cli.offline {
        Arc::new(OfflineModel)
    } else {
        Arc::new(OllamaClient::new(
            config.ollama_base_url.clone(),
            config.models.extraction_model.clone(),
            config.models.max_output_tokens,
        ))
    };
    let generator = IcfGenerator::new(config, model, fallback);

    let file_name = cli
        .input
        .file_name()
        .and_then(|name| name.to_str())
        .context("input path has no usable file name")?
        .to_string();
    let bytes = tokio::fs::read(&cli.input)
        .await
        .with_context(|| format!("failed to read {}", cli.input.display()))?;

    let report = generator.generate(&file_name, bytes).await?;
    tokio::fs::write(&cli.output, &report.document)
        .await
        .with_context(|| format!("failed to write {}", cli.output.display()))?;

    println!("{}", serde_json::to_string_pretty(&report.audit_log)?);
    eprintln!(
        "Wrote {} (sections={} pages={} fallback={})",
        cli.output.display(),
        report.sections.len(),
        report.page_log.len(),
        report.used_fallback
    );

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
