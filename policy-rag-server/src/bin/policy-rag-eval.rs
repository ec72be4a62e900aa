//! Run a labelled question set through the pipeline and print a JSON report.
//!
//! Run with: cargo run -p policy-rag-server --bin policy-rag-eval -- eval.json
//!
//! With `--top-k-variants 2,8` the corpus is indexed once and the cases run
//! against the configured baseline and then each variant; the output is then
//! an array of `{profile, top_k, report}`.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use policy_rag::{EvalReport, RagConfig, parse_eval_cases, run_evaluation};
use policy_rag_server::{Settings, index_corpus, init_telemetry};
use serde::Serialize;
use tracing::info;

#[derive(Parser)]
#[command(name = "policy-rag-eval", version, about = "Evaluate answer quality and latency")]
struct Cli {
    /// JSON array of `{id, query, ground_truth?, expected_source?, query_type?, expect_decline?}` cases.
    eval_file: PathBuf,

    /// Write the report here instead of stdout.
    #[arg(long, short)]
    output: Option<PathBuf>,

    /// Extra `top_k` values to compare against the baseline, comma separated.
    #[arg(long, value_delimiter = ',')]
    top_k_variants: Vec<usize>,

    #[command(flatten)]
    settings: Settings,
}

#[derive(Serialize)]
struct ProfileReport {
    profile: String,
    top_k: usize,
    report: EvalReport,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(cli.settings.log_format);

    let raw = tokio::fs::read_to_string(&cli.eval_file)
        .await
        .with_context(|| format!("failed to read {}", cli.eval_file.display()))?;
    let cases = parse_eval_cases(&raw)?;

    let baseline = cli.settings.rag_config().context("invalid answering settings")?;
    let corpus = index_corpus(&cli.settings).await?;

    let rendered = if cli.top_k_variants.is_empty() {
        let report = run_evaluation(&corpus.pipeline(baseline)?, &cases).await;
        serde_json::to_string_pretty(&report)?
    } else {
        let mut profiles = vec![("baseline".to_string(), baseline.clone())];
        for &top_k in &cli.top_k_variants {
            profiles.push((format!("top_k={top_k}"), RagConfig { top_k, ..baseline.clone() }));
        }

        let mut reports = Vec::with_capacity(profiles.len());
        for (profile, config) in profiles {
            let top_k = config.top_k;
            let pipeline = corpus
                .pipeline(config)
                .with_context(|| format!("invalid profile {profile}"))?;
            info!(%profile, cases = cases.len(), "evaluating profile");
            let report = run_evaluation(&pipeline, &cases).await;
            reports.push(ProfileReport { profile, top_k, report });
        }
        serde_json::to_string_pretty(&reports)?
    };

    match &cli.output {
        Some(path) => tokio::fs::write(path, rendered)
            .await
            .with_context(|| format!("failed to write {}", path.display()))?,
        None => println!("{rendered}"),
    }
    Ok(())
}
