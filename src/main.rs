use std::sync::Arc;

use anyhow::Result;
use tracing_subscriber::EnvFilter;

use icf_generator::generator::load_fallback_response;
use icf_generator::llm::OllamaClient;
use icf_generator::store::OutputStore;
use icf_generator::{run_server, AppConfig, IcfGenerator};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = AppConfig::from_env();
    let fallback = load_fallback_response(&config).await?;

    let model = Arc::new(OllamaClient::new(
        config.ollama_base_url.clone(),
        config.models.extraction_model.clone(),
        config.models.max_output_tokens,
    ));
    let generator = IcfGenerator::new(config.clone(), model, fallback);
    let store = OutputStore::new(config.output.dir.clone(), config.output.ttl);

    run_server(config, generator, store).await
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
