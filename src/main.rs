use anyhow::{Context, Result};
use clap::Parser;
use dotenv::dotenv;
use log::{error, info};
use std::path::PathBuf;
use std::sync::Arc;

use contract_rag::analysis::analyze_contract;
use contract_rag::chunking::ChunkConfig;
use contract_rag::document::ContractMetadata;
use contract_rag::gemini::{GeminiClient, GeminiConfig};
use contract_rag::index::{ContractId, ContractIndex};
use contract_rag::rag::RagEngine;

/// Ask questions about contracts with keyword retrieval and Gemini
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Contract files to load (text or PDF); ids are assigned 1, 2, ... in order
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Only answer from this contract id
    #[arg(long)]
    contract: Option<ContractId>,

    /// Print metadata, summary, key clauses and risk for each contract before the Q&A loop
    #[arg(long)]
    analyze: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize environment
    dotenv().ok();
    env_logger::init();

    let args = Args::parse();

    let chunk_config = ChunkConfig::from_env().context("Invalid chunking configuration")?;
    let gemini_config = GeminiConfig::from_env().context("Missing GEMINI_API_KEY")?;

    let index = Arc::new(ContractIndex::new(chunk_config));
    let engine = RagEngine::new(Arc::clone(&index), GeminiClient::new(gemini_config));

    let chunking = index.chunk_config();
    info!(
        "Using model {}, chunking contracts into {}-char windows overlapping by {}",
        engine.generator().config().model,
        chunking.window_size(),
        chunking.overlap()
    );

    info!("Loading {} contract files...", args.files.len());
    for (id, path) in (1..).zip(&args.files) {
        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("contract-{}", id));
        engine.load_contract_from_file(id, path, ContractMetadata::named(name));
    }

    if index.is_empty() {
        error!("No contracts could be loaded");
        return Err(anyhow::anyhow!("No contracts loaded"));
    }
    info!("Index ready with {} contracts", index.len());

    if let Some(id) = args.contract {
        if !index.contains(id) {
            return Err(anyhow::anyhow!("Contract {} is not loaded", id));
        }
    }

    if args.analyze {
        for id in index.ids() {
            let Some(contract) = index.get(id) else {
                continue;
            };
            let analysis = analyze_contract(engine.generator(), &contract.text)
                .await
                .with_context(|| format!("Failed to analyze contract {}", id))?;
            println!("{}", serde_json::to_string_pretty(&analysis)?);
        }
    }

    // Enter interactive Q&A loop
    engine
        .run_query_loop(args.contract)
        .await
        .context("Error in query loop")?;

    Ok(())
}
