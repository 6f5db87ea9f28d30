pub mod commands;

use std::process::ExitCode;

use cartwise_core::config::{AppConfig, LoadOptions, LogFormat};
use clap::{Parser, Subcommand};
use tracing::Level;

use crate::commands::chat::ChatArgs;
use crate::commands::extract::ExtractArgs;
use crate::commands::retrieve::RetrieveArgs;

#[derive(Debug, Parser)]
#[command(
    name = "cartwise",
    about = "Cartwise shopping assistant operator CLI",
    long_about = "Run candidate retrieval, reply extraction, and the full chat pipeline against a JSON catalog.",
    after_help = "Examples:\n  cartwise retrieve --catalog products.json --message \"red jacket under $100\"\n  cartwise extract --catalog products.json --reply-file reply.txt\n  cartwise chat --catalog products.json --message \"something for hiking\"\n  cartwise config"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Extract intent and select the bounded candidate set for a message")]
    Retrieve(RetrieveArgs),
    #[command(about = "Recover catalog-validated recommendations from an assistant reply")]
    Extract(ExtractArgs),
    #[command(about = "Run one message through the full assistant pipeline")]
    Chat(ChatArgs),
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    init_logging();

    let result = match cli.command {
        Command::Retrieve(args) => commands::retrieve::run(args),
        Command::Extract(args) => commands::extract::run(args),
        Command::Chat(args) => commands::chat::run(args),
        Command::Config => commands::config::run(),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

/// Logs go to stderr so stdout carries only the JSON command result.
fn init_logging() {
    let Ok(config) = AppConfig::load(LoadOptions::default()) else {
        return;
    };
    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(log_level)
        .with_writer(std::io::stderr);

    let _ = match config.logging.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}
