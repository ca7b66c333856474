//! Command-line interface for marketbrief

use clap::{Parser, Subcommand};
use marketbrief_research::{Orchestrator, Settings, models::ConversationTurn, render_report};
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "marketbrief")]
#[command(about = "Agent-driven stock research briefings", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a full research briefing for a ticker
    Research {
        /// Stock ticker symbol, e.g. MSFT
        ticker: String,

        /// Append the raw source links to the report
        #[arg(long)]
        sources: bool,
    },
    /// Ask a follow-up question about a ticker
    Ask {
        /// Stock ticker symbol, e.g. MSFT
        ticker: String,

        /// The follow-up question
        message: String,

        /// Summary of the previous briefing, for context
        #[arg(long)]
        summary: Option<String>,
    },
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let args = Args::parse();
    let settings = Settings::from_env()?;
    let orchestrator = Orchestrator::from_settings(&settings)?;

    match args.command {
        Command::Research { ticker, sources } => {
            info!(ticker, "running research briefing");
            let report = orchestrator.run_fresh(&ticker).await?;
            println!("{}", render_report(&report, sources));
        }
        Command::Ask {
            ticker,
            message,
            summary,
        } => {
            info!(ticker, "asking follow-up");
            let history: Vec<ConversationTurn> = Vec::new();
            let report = orchestrator
                .run_follow_up(&ticker, &message, summary.as_deref(), &history)
                .await?;
            match report.reply.as_deref() {
                Some(reply) if !reply.is_empty() => println!("{reply}"),
                _ => println!("{}", report.formatted_summary()),
            }
        }
    }

    Ok(())
}
