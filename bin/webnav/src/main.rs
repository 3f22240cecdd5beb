mod commands;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "webnav")]
#[command(about = "Drive a live browser through accessibility trees and tool calls", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration and create the data directories
    Onboard {
        /// Force overwrite existing configuration
        #[arg(long)]
        force: bool,
    },

    /// Show configuration and browser discovery status
    Status,

    /// Open a page and print its reconciled tree
    Dom {
        /// Page to open
        #[arg(short, long)]
        url: String,

        /// all_fields, input_fields or text_only
        #[arg(short, long, default_value = "all_fields")]
        content_type: String,

        /// Browser profile name
        #[arg(short, long, default_value = "default")]
        session: String,
    },

    /// Execute tool call turns against the browser
    Run {
        /// Page to open before the first turn
        #[arg(short, long)]
        url: Option<String>,

        /// JSON tool calls: an array of calls for one turn, or an array of
        /// such arrays for several turns. Prefix with @ to read a file.
        #[arg(short, long)]
        calls: String,

        /// Browser profile and conversation log name
        #[arg(short, long, default_value = "default")]
        session: String,
    },

    /// Inspect the available tools
    Tools {
        #[command(subcommand)]
        command: ToolsCommands,
    },
}

#[derive(Subcommand)]
enum ToolsCommands {
    /// List all registered tools
    List,
    /// Show detailed info for a specific tool
    Info {
        /// Tool name
        tool_name: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    match cli.command {
        Commands::Onboard { force } => {
            commands::onboard::run(force).await?;
        }
        Commands::Status => {
            commands::status::run().await?;
        }
        Commands::Dom {
            url,
            content_type,
            session,
        } => {
            commands::dom::run(&url, &content_type, &session).await?;
        }
        Commands::Run { url, calls, session } => {
            commands::run_cmd::run(url.as_deref(), &calls, &session).await?;
        }
        Commands::Tools { command } => match command {
            ToolsCommands::List => {
                commands::tools_cmd::list().await?;
            }
            ToolsCommands::Info { tool_name } => {
                commands::tools_cmd::info(&tool_name).await?;
            }
        },
    }

    Ok(())
}
