//! Operator tool for drafting, running and forwarding FaceFusion jobs by hand.

use clap::{Parser, Subcommand};
use fusion_relay::{build_pipeline, init_tracing, RelayConfig};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "fusion-job", about = "Draft, run and forward FaceFusion jobs")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Draft a job from the template and print its id
    Draft(JobPaths),
    /// Submit and run an already drafted job
    Run { job_id: String },
    /// Draft a job, then submit and run it
    DraftAndRun(JobPaths),
    /// Send a file to the result server
    Forward { file: PathBuf },
}

#[derive(clap::Args, Debug)]
struct JobPaths {
    #[arg(long)]
    source: PathBuf,
    #[arg(long)]
    target: PathBuf,
    #[arg(long)]
    output: PathBuf,
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> fusion_relay::Result<()> {
    let config = RelayConfig::from_env()?;
    let pipeline = build_pipeline(&config)?;

    match cli.command {
        Command::Draft(paths) => {
            let job_id = pipeline
                .draft(&paths.source, &paths.target, &paths.output)
                .await?;
            println!("{}", job_id);
        }
        Command::Run { job_id } => {
            pipeline.execute(&job_id).await?;
        }
        Command::DraftAndRun(paths) => {
            let job_id = pipeline
                .draft(&paths.source, &paths.target, &paths.output)
                .await?;
            tracing::info!("Job created with ID: {}", job_id);
            pipeline.execute(&job_id).await?;
            println!("{}", job_id);
        }
        Command::Forward { file } => {
            let status = pipeline.forward(&file).await?;
            println!("{}", status);
        }
    }
    Ok(())
}
