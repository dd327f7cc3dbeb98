mod console;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use dropgate_core::core_store::model::UserId;
use dropgate_core::core_store::{EntityStore, JsonFileRepository};
use dropgate_core::logging::{init_logging_with_config, LogConfig, LogLevel};
use dropgate_core::{Config, Engine};

use console::{classify_line, ConsoleMessenger};

#[derive(Parser, Debug)]
#[command(name = "dropgate")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a TOML config file; environment variables apply otherwise
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Set the log level (trace, debug, info, warn, error); overrides the
    /// config file's logging section
    #[arg(short, long)]
    log_level: Option<String>,

    /// Enable JSON formatted logging
    #[arg(long)]
    json_logs: bool,

    /// Identity to act as on the console
    #[arg(long, default_value_t = 1)]
    user: i64,

    /// Display name for the console identity
    #[arg(long, default_value = "console")]
    name: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => Config::from_env().context("loading config from environment")?,
    };
    config.validate().context("validating config")?;

    let level_name = args
        .log_level
        .as_deref()
        .unwrap_or(&config.logging.level);
    let log_level = LogLevel::parse(level_name).unwrap_or_else(|| {
        eprintln!("Invalid log level '{level_name}', using 'info'");
        LogLevel::Info
    });
    init_logging_with_config(
        LogConfig::new(log_level)
            .json_format(args.json_logs || config.logging.json_format)
            .with_target(config.logging.with_target),
    )?;

    let repo = JsonFileRepository::new(&config.storage.data_dir)
        .context("opening data directory")?;
    let store = EntityStore::load(
        Arc::new(repo),
        config.access.main_admins.iter().copied().map(UserId),
        config.access.default_categories.clone(),
        config.access.code_length,
    )
    .await
    .context("loading entity store")?;

    let messenger = Arc::new(ConsoleMessenger::new());
    let engine = Engine::new(store, messenger, config);

    info!("dropgate console up; type /help (ctrl-d to exit)");

    let sender = UserId(args.user);
    let stdin = std::io::stdin();
    let mut msg_id: i64 = 1;
    let mut line = String::new();
    loop {
        line.clear();
        if stdin.read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim_end();
        if line.is_empty() {
            continue;
        }
        msg_id += 1;
        engine
            .handle_event(classify_line(sender, &args.name, line, msg_id))
            .await;
    }

    info!("dropgate console shutting down");
    Ok(())
}
