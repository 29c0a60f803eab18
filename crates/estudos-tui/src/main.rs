use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use estudos_core::{
    AnswerClient, ChatSession, Config, ContextClient, JsonFileStore, KeyValueStore, MemoryStore,
};

mod app;
mod handler;
mod tui;
mod ui;

use app::App;
use tui::{EventHandler, Tui};

const DEFAULT_LOG_FILTER: &str = "estudos=info,estudos_core=info";

#[derive(Parser)]
#[command(name = "estudos")]
#[command(version, about = "Ask questions about your study notes from the terminal")]
struct Cli {
    /// Backend base URL (overrides ESTUDOS_BASE_URL and the config file)
    #[arg(long)]
    base_url: Option<String>,

    /// Log filter, e.g. "debug" or "estudos_core=trace"
    #[arg(long)]
    log_level: Option<String>,

    /// Path to an alternative config.json
    #[arg(short, long)]
    config: Option<PathBuf>,
}

/// Log to `<config_dir>/estudos/estudos.log`; the terminal belongs to the UI
fn init_logging(filter: &str) -> Result<PathBuf> {
    let dir = Config::config_dir()?;
    fs::create_dir_all(&dir)?;
    let path = dir.join("estudos.log");

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("opening {}", path.display()))?;

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(filter))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(true)
        .init();

    Ok(path)
}

fn open_store() -> Box<dyn KeyValueStore> {
    match JsonFileStore::open_default() {
        Ok(store) => Box::new(store),
        Err(e) => {
            warn!(error = %e, "preferences unavailable, theme will not persist");
            Box::new(MemoryStore::new())
        }
    }
}

async fn run(terminal: &mut Tui, app: &mut App) -> Result<()> {
    let mut events = EventHandler::new();

    // Contexts arrive on a later tick; keys keep working meanwhile
    app.session.begin_loading_contexts();

    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        let Some(event) = events.next().await else {
            break;
        };
        handler::handle_event(app, event);
        app.sync_session().await;
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load().unwrap_or_else(|e| {
            eprintln!("Ignoring unreadable config: {e:#}");
            Config::new()
        }),
    };

    let filter = cli
        .log_level
        .clone()
        .or_else(|| config.log_level.clone())
        .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());
    match init_logging(&filter) {
        Ok(path) => info!(log = %path.display(), "logging initialized"),
        Err(e) => eprintln!("Logging disabled: {e:#}"),
    }

    let base_url = cli.base_url.clone().unwrap_or_else(|| config.base_url());
    info!(%base_url, "starting estudos");

    let http = config.http_client()?;
    let answers = AnswerClient::with_client(http.clone(), &base_url, config.endpoints.clone());
    let registry = ContextClient::with_client(http, &base_url, config.endpoints.clone());
    let session = ChatSession::new(Arc::new(answers), Arc::new(registry));

    let mut app = App::new(session, open_store(), config.accent_color.as_deref());

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let result = run(&mut terminal, &mut app).await;
    tui::restore()?;

    result
}
