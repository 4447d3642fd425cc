use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tractor_orchestrator::{
    ApiClient, MiningOrchestrator, OrchestratorConfig, TractorFilter, create_orchestrator,
    line_sink, load_config, load_config_from, report_file_name,
};

#[derive(Parser)]
#[command(name = "tractor-orchestrator")]
#[command(about = "Sequential tractor specification miner")]
struct Cli {
    /// Config file (overrides the default lookup order)
    #[arg(long, global = true, env = "TRACTOR_ORCHESTRATOR_CONFIG")]
    config: Option<PathBuf>,
    /// Base URL of the extraction backend
    #[arg(long, global = true, env = "TRACTOR_API_URL")]
    api_url: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Research one tractor
    Investigate {
        company: String,
        /// Model, possibly several words
        #[arg(required = true, num_args = 1..)]
        model: Vec<String>,
    },
    /// Research every tractor of the catalogue
    InvestigateAll,
    /// Send one chat message, exactly as typed in the console
    Send {
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },
    /// Serve the chat console over HTTP
    Serve {
        #[arg(long, default_value = "127.0.0.1:8090")]
        bind: String,
    },
    /// Download the PDF report for a model
    Pdf {
        model: String,
        /// Output path (defaults to informe_<model>.pdf)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// List the tractors stored by the backend
    Tractors {
        /// Partial match on the company name
        #[arg(long)]
        company: Option<String>,
        /// Partial match on the model name
        #[arg(long)]
        model: Option<String>,
        /// Exact drive type, e.g. 4WD
        #[arg(long)]
        drive_type: Option<String>,
    },
}

fn resolve_config(cli: &Cli) -> Result<OrchestratorConfig> {
    let config = match &cli.config {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    match &cli.api_url {
        Some(url) => config
            .with_api_base_url(url)
            .context("invalid --api-url / TRACTOR_API_URL"),
        None => Ok(config),
    }
}

/// First Ctrl-C stops the in-flight run, a second one exits.
fn cancel_on_interrupt(orchestrator: Arc<MiningOrchestrator>) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling run (press Ctrl-C again to exit)");
            orchestrator.cancel_runs();
        }
        if tokio::signal::ctrl_c().await.is_ok() {
            std::process::exit(130);
        }
    });
}

async fn shutdown_signal(orchestrator: Arc<MiningOrchestrator>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down; cancelling in-flight runs");
    orchestrator.cancel_runs();
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("tractor_orchestrator=info".parse()?)
                .add_directive("hyper=warn".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = resolve_config(&cli)?;
    info!("Using extraction backend at {}", config.api_base_url);

    let orchestrator = Arc::new(create_orchestrator(&config)?);
    let mut sink = line_sink(|line| println!("{}", line));

    match cli.command {
        Commands::Investigate { company, model } => {
            cancel_on_interrupt(orchestrator.clone());
            let summary = orchestrator
                .run_single(&company, &model.join(" "), &mut sink)
                .await;
            println!("{}", summary);
        }
        Commands::InvestigateAll => {
            cancel_on_interrupt(orchestrator.clone());
            let summary = orchestrator.run_catalogue(&mut sink).await;
            println!("{}", summary);
        }
        Commands::Send { text } => {
            cancel_on_interrupt(orchestrator.clone());
            let reply = orchestrator.handle_message(&text.join(" "), &mut sink).await;
            println!("{}", reply);
        }
        Commands::Serve { bind } => {
            let app = tractor_orchestrator::api::create_router(orchestrator.clone());
            let listener = tokio::net::TcpListener::bind(&bind).await?;

            info!("Chat console listening on http://{}", bind);
            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown_signal(orchestrator))
                .await?;
        }
        Commands::Pdf { model, out } => {
            let client = ApiClient::new(config.api_base_url.clone(), config.request_timeout)?;
            let bytes = client.generate_pdf(&model).await?;
            let path = out.unwrap_or_else(|| PathBuf::from(report_file_name(&model)));
            tokio::fs::write(&path, &bytes)
                .await
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("Informe guardado en {}", path.display());
        }
        Commands::Tractors {
            company,
            model,
            drive_type,
        } => {
            let client = ApiClient::new(config.api_base_url.clone(), config.request_timeout)?;
            let filter = TractorFilter {
                company,
                model,
                drive_type,
            };
            let tractors = client.fetch_tractors(&filter).await;
            println!("{}", serde_json::to_string_pretty(&tractors)?);
            println!("{} tractores encontrados.", tractors.len());
        }
    }

    Ok(())
}
