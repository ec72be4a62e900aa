//! Policy question-answering HTTP service.
//!
//! Run with: cargo run -p policy-rag-server --bin policy-rag-server -- --corpus-dir corpus

use std::sync::Arc;

use clap::Parser;
use policy_rag_server::{AppState, ServerConfig, Settings, build_pipeline, init_telemetry, run_server};

#[derive(Parser)]
#[command(name = "policy-rag-server", version, about = "Answer policy questions over HTTP")]
struct Cli {
    #[command(flatten)]
    settings: Settings,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let Cli { settings } = Cli::parse();
    init_telemetry(settings.log_format);

    let boot = build_pipeline(&settings).await?;
    let state = AppState { pipeline: Arc::new(boot.pipeline), chunks: boot.chunks };
    let config = ServerConfig {
        host: settings.host.clone(),
        port: settings.port,
        max_body_bytes: settings.max_body_bytes,
    };

    run_server(config, state).await
}
