use std::sync::Arc;

use clap::{Parser, Subcommand};
use hookrelay::{
    config::AppConfig,
    delivery::StdoutSender,
    intake::{IntakeService, OwnerIdentity, ResolvedRoute, StaticRouteResolver, WebhookPayload},
    models::DeliveryRoute,
    persistence::LogOutcomeStore,
    supervisor::Supervisor,
};
use tokio::io::AsyncBufReadExt;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory holding app.yaml.
    #[arg(long)]
    config_dir: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Runs the relay pipeline until interrupted, submitting alert lines
    /// read from standard input in place of the external HTTP boundary.
    Run {
        /// Owner id used for stdin submissions.
        #[arg(long, default_value_t = 1)]
        owner_id: i64,

        /// Owner name used for stdin submissions.
        #[arg(long, default_value = "local")]
        owner_name: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let subscriber =
        FmtSubscriber::builder().with_env_filter(EnvFilter::from_default_env()).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { owner_id, owner_name } => {
            run_relay(cli.config_dir.as_deref(), OwnerIdentity { id: owner_id, name: owner_name })
                .await?
        }
    }

    Ok(())
}

async fn run_relay(
    config_dir: Option<&str>,
    owner: OwnerIdentity,
) -> Result<(), Box<dyn std::error::Error>> {
    tracing::debug!("Loading application configuration...");
    let config = AppConfig::new(config_dir)?;
    tracing::info!(
        workers = config.workers,
        queue_size = config.queue_size,
        routes = config.routes.len(),
        "Configuration loaded."
    );

    let mut resolver = StaticRouteResolver::new();
    for route in &config.routes {
        resolver.insert(
            route.owner_id,
            route.identifier.clone(),
            ResolvedRoute {
                channel_name: route.channel_name.clone(),
                route: DeliveryRoute {
                    bot_token: route.bot_token.clone(),
                    channel_id: route.channel_id.clone(),
                    channel_ref: route.channel_ref,
                },
            },
        );
    }

    let supervisor = Supervisor::builder()
        .config(config)
        .sender(Arc::new(StdoutSender::new()))
        .outcome_store(Arc::new(LogOutcomeStore::new()))
        .build()?;

    // Stand-in for the external HTTP boundary: each stdin line is one
    // webhook submission, using the message's "----" suffix for routing.
    let intake = IntakeService::new(Arc::new(resolver), supervisor.queue());
    let shutdown = supervisor.cancellation_token();
    tokio::spawn(async move {
        let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                maybe_line = lines.next_line() => match maybe_line {
                    Ok(Some(line)) if !line.trim().is_empty() => {
                        let payload =
                            WebhookPayload { message: line, priority: None, data: None };
                        match intake.submit(&owner, payload).await {
                            Ok(receipt) => tracing::info!(
                                alert_id = %receipt.alert_id,
                                channel = %receipt.channel_name,
                                "Alert queued"
                            ),
                            Err(error) => tracing::warn!(%error, "Submission rejected"),
                        }
                    }
                    Ok(Some(_)) => {}
                    Ok(None) | Err(_) => break,
                },
            }
        }
    });

    tracing::info!("Supervisor initialized, starting relay...");
    supervisor.run().await?;

    Ok(())
}
