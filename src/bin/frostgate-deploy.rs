//! frostgate-deploy
//!
//! Deploys the identity verifier to an EVM chain or Solana and writes the
//! deployment record the frontend reads its address from.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use frostgate_wallet::deploy::{
    ContractArtifact, DeploymentRecorder, EvmContractFactory, EvmDeployConfig, SolanaDeployConfig,
    SolanaProgramLoader,
};

#[derive(Parser)]
#[command(
    name = "frostgate-deploy",
    about = "Deploy the verifier and record where it landed"
)]
struct Cli {
    /// Directory the deployment record is written to.
    #[arg(long, env = "FROSTGATE_OUT_DIR", default_value = ".", global = true)]
    out_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Deploy the verifier contract from a Hardhat artifact.
    Evm(EvmArgs),
    /// Load the verifier program through the upgradeable BPF loader.
    Solana(SolanaArgs),
}

#[derive(Args)]
struct EvmArgs {
    /// Hardhat artifact JSON (abi + bytecode).
    #[arg(long)]
    artifact: PathBuf,
    #[arg(long, env = "FROSTGATE_RPC_URL", default_value = "http://127.0.0.1:8545")]
    rpc_url: String,
    /// Hex-encoded deployer key.
    #[arg(long, env = "FROSTGATE_PRIVATE_KEY", hide_env_values = true)]
    private_key: String,
    #[arg(long, env = "FROSTGATE_CONFIRMATIONS", default_value_t = 1)]
    confirmations: usize,
    /// HTTP timeout per RPC request, in seconds.
    #[arg(long, default_value_t = 30)]
    rpc_timeout: u64,
}

#[derive(Args)]
struct SolanaArgs {
    /// Compiled program (`.so`).
    #[arg(long)]
    program: PathBuf,
    #[arg(long, env = "FROSTGATE_SOLANA_RPC_URL", default_value = "http://127.0.0.1:8899")]
    rpc_url: String,
    /// Payer keypair file, which also becomes the upgrade authority.
    #[arg(long, env = "FROSTGATE_KEYPAIR")]
    keypair: PathBuf,
    /// Network label written into the record.
    #[arg(long, default_value = "solana")]
    network: String,
    #[arg(long, default_value_t = frostgate_wallet::deploy::solana::DEFAULT_WRITE_CHUNK)]
    chunk_size: usize,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("deployment failed: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let recorder = DeploymentRecorder::new(cli.out_dir);

    let record = match cli.command {
        Commands::Evm(args) => {
            let artifact = ContractArtifact::load(&args.artifact).await?;
            let config = EvmDeployConfig::new(&args.rpc_url)
                .with_confirmations(args.confirmations)
                .with_rpc_timeout(Duration::from_secs(args.rpc_timeout));
            let factory = EvmContractFactory::connect(config, &args.private_key).await?;
            recorder.record_deployment(&factory, artifact).await?
        }
        Commands::Solana(args) => {
            let program = tokio::fs::read(&args.program)
                .await
                .with_context(|| format!("failed to read {}", args.program.display()))?;
            let config = SolanaDeployConfig::new(&args.rpc_url)
                .with_network_label(&args.network)
                .with_chunk_size(args.chunk_size);
            let loader = SolanaProgramLoader::from_keypair_file(config, &args.keypair)?;
            recorder.record_deployment(&loader, program).await?
        }
    };

    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}
