use anyhow::{Context, Result};
use clap::Parser;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod app;
mod client;
mod clipboard;
mod config;
mod controller;
mod conversation;
mod export;
mod handler;
mod history;
mod storage;
mod theme;
mod transcript;
mod tui;
mod ui;

use app::App;
use client::ChatClient;
use config::Config;
use controller::Controller;
use storage::LocalStorage;

const LOG_ENV: &str = "GEMINI_CHAT_LOG";

#[derive(Parser)]
#[command(name = "gemini-chat")]
#[command(version, about = "Terminal chat client for a Gemini chat endpoint")]
struct Cli {
    /// Chat endpoint URL (overrides GEMINI_CHAT_ENDPOINT and the config file)
    #[arg(long)]
    endpoint: Option<String>,

    /// Directory holding chat history and preferences
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Directory exports are written to
    #[arg(long)]
    export_dir: Option<PathBuf>,

    /// Remember the given options in the config file
    #[arg(long)]
    save_config: bool,
}

/// Logs go to a file; the terminal belongs to the UI
fn init_logging(data_dir: &Path) -> Result<()> {
    let log_file = File::create(data_dir.join("gemini-chat.log"))
        .context("Failed to create log file")?;
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(log_file))
        .with_ansi(false)
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load().unwrap_or_else(|_| Config::new());
    if cli.data_dir.is_some() {
        config.data_dir = cli.data_dir;
    }
    if cli.export_dir.is_some() {
        config.export_dir = cli.export_dir;
    }
    let endpoint = match cli.endpoint {
        Some(endpoint) => {
            config.endpoint = Some(endpoint.clone());
            endpoint
        }
        None => config.endpoint(),
    };
    if cli.save_config {
        config.save()?;
    }

    let storage = LocalStorage::open(&config.data_dir()?)?;
    init_logging(storage.dir())?;
    info!(endpoint = %endpoint, data_dir = %storage.dir().display(), "starting gemini-chat");

    let controller = Controller::new(storage, ChatClient::new(&endpoint), config.export_dir());
    let mut app = App::new(controller);

    tui::install_panic_hook();
    let mut session = tui::TerminalSession::enter()?;
    let result = run(&mut session.terminal, &mut app).await;

    // Leave the alternate screen before any error is printed
    drop(session);
    result
}

async fn run(terminal: &mut tui::Tui, app: &mut App) -> Result<()> {
    let mut events = tui::EventHandler::new();

    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        match events.next().await {
            Some(event) => handler::handle_event(app, event).await?,
            None => break,
        }
    }

    Ok(())
}
