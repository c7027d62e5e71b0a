mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::{
    config::ConfigSubcommand, feedback::FeedbackSubcommand, flow::FlowSubcommand,
    one_on_one::OneOnOneSubcommand, survey::SurveySubcommand,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "laddrr",
    about = "Anonymous feedback, pulse surveys and coaching flows backed by a language model",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from .laddrr/)
    #[arg(long, global = true, env = "LADDRR_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write .laddrr/config.yaml with defaults
    Init,

    /// Run the HTTP server
    Serve {
        /// Port to listen on (default: server.port from config)
        #[arg(long)]
        port: Option<u16>,
    },

    /// List and run flows
    Flow {
        #[command(subcommand)]
        subcommand: FlowSubcommand,
    },

    /// Deploy and manage pulse surveys
    Survey {
        #[command(subcommand)]
        subcommand: SurveySubcommand,
    },

    /// Submit, track and review anonymous feedback
    Feedback {
        #[command(subcommand)]
        subcommand: FeedbackSubcommand,
    },

    /// Review recorded 1-on-1 sessions and prepare briefings
    OneOnOne {
        #[command(subcommand)]
        subcommand: OneOnOneSubcommand,
    },

    /// Inspect the project configuration
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Serve { .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root = root::resolve_root(cli.root.as_deref());

    let result = match cli.command {
        Commands::Init => cmd::init::run(&root),
        Commands::Serve { port } => cmd::serve::run(&root, port),
        Commands::Flow { subcommand } => cmd::flow::run(&root, subcommand, cli.json),
        Commands::Survey { subcommand } => cmd::survey::run(&root, subcommand, cli.json),
        Commands::Feedback { subcommand } => cmd::feedback::run(&root, subcommand, cli.json),
        Commands::OneOnOne { subcommand } => cmd::one_on_one::run(&root, subcommand, cli.json),
        Commands::Config { subcommand } => cmd::config::run(&root, subcommand, cli.json),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
