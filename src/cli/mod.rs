pub mod commands;
pub mod utils;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "fieldops")]
#[command(about = "Field Ops CLI - serve the API and run ledger and op-log maintenance")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Run the HTTP and WebSocket server")]
    Serve {
        #[arg(long, help = "Port to listen on (defaults to configured port)")]
        port: Option<u16>,
    },

    #[command(about = "Apply database migrations")]
    Migrate,

    #[command(about = "Mint a bearer token for a principal")]
    Token {
        #[arg(long, help = "Principal id (random when omitted)")]
        user_id: Option<uuid::Uuid>,
        #[arg(long, default_value = "cli", help = "Display name")]
        name: String,
        #[arg(long, default_value = "approver", help = "admin | approver | mason | field")]
        role: String,
    },

    #[command(about = "Re-sum ledgers and repair cached balances")]
    Reconcile {
        #[arg(long, help = "Only this mason (all masons when omitted)")]
        mason: Option<uuid::Uuid>,
    },

    #[command(about = "Rebuild the journey projection from the op log")]
    RebuildJourneys,
}

#[derive(Debug, Clone, Copy)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);
    let config = crate::config::config().clone();

    match cli.command {
        Commands::Serve { port } => commands::server::serve(config, port).await,
        Commands::Migrate => commands::server::migrate(config, output_format).await,
        Commands::Token { user_id, name, role } => {
            commands::token::handle(&config, user_id, name, &role, output_format)
        }
        Commands::Reconcile { mason } => commands::ledger::reconcile(config, mason, output_format).await,
        Commands::RebuildJourneys => commands::journeys::rebuild(config, output_format).await,
    }
}
