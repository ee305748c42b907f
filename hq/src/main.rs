//! hookqueue - offline-tolerant webhook message queue
//!
//! CLI entry point.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use colored::*;
use eyre::{Context, Result, eyre};
use tracing::{debug, info, warn};

use hookqueue::cli::{Cli, Command, OutputFormat};
use hookqueue::config::{Config, ConnectivityMode};
use hookqueue::connectivity::{ConnectivityMonitor, ProbeMonitor, StaticMonitor};
use hookqueue::coordinator::{Coordinator, CoordinatorState, Status};
use hookqueue::domain::{IdResolver, short_id};
use hookqueue::sender::WebhookSender;
use hookqueue::store::{QueueStore, SqliteStore};
use hookqueue::view::ViewState;

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    // Note: Can't log params here since logging isn't initialized yet
    let log_path = hookqueue::cli::get_log_path();
    let log_dir = log_path.parent().map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."));
    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Determine log level with priority: CLI --log-level > config file > default (INFO)
    let level = match cli_log_level.or(config_log_level) {
        Some(s) => match s.to_uppercase().as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    let log_file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .context("Failed to open log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load log level from config file early (before full config load)
    let config_log_level = Config::load_log_level(cli.config.as_ref());

    // Setup logging with priority: CLI > config > INFO default
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let mut config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    if let Some(path) = &cli.store {
        debug!(path = %path.display(), "main: store path overridden");
        config.storage.path = path.clone();
    }
    if cli.assume_online {
        config.connectivity.mode = ConnectivityMode::Online;
    }

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Some(Command::Add {
            text,
            no_wait,
            timeout,
        }) => cmd_add(&config, &text.join(" "), no_wait, Duration::from_secs(timeout)).await,
        Some(Command::Cancel { id }) => cmd_cancel(&config, &id),
        Some(Command::List { format }) => cmd_list(&config, format),
        Some(Command::Status { format }) => cmd_status(&config, format).await,
        Some(Command::Endpoint { url, no_wait }) => match url {
            Some(url) => cmd_set_endpoint(&config, &url, no_wait).await,
            None => cmd_show_endpoint(&config),
        },
        Some(Command::Clear) => cmd_clear(&config),
        Some(Command::Run { exit_when_idle }) => cmd_run(&config, exit_when_idle).await,
        None => cmd_status(&config, OutputFormat::Text).await,
    }
}

fn open_store(config: &Config) -> Result<SqliteStore> {
    debug!(path = %config.storage.path.display(), "open_store: called");
    SqliteStore::open(&config.storage.path)
        .with_context(|| format!("Failed to open queue at {}", config.storage.path.display()))
}

async fn open_monitor(config: &Config) -> Box<dyn ConnectivityMonitor> {
    match config.connectivity.mode {
        ConnectivityMode::Online => {
            debug!("open_monitor: assuming online");
            Box::new(StaticMonitor::online())
        }
        ConnectivityMode::Probe => Box::new(ProbeMonitor::from_config(&config.connectivity).await),
    }
}

/// Start a coordinator over the configured store
///
/// The monitor is returned alongside so it lives as long as the coordinator.
async fn start_coordinator(config: &Config) -> Result<(Coordinator, Box<dyn ConnectivityMonitor>)> {
    let store = open_store(config)?;
    let monitor = open_monitor(config).await;
    let sender = WebhookSender::from_config(&config.sender).context("Failed to create HTTP client")?;
    let coordinator = Coordinator::spawn(store, monitor.as_ref(), Arc::new(sender), config.coordinator.clone())
        .context("Failed to start coordinator")?;
    Ok((coordinator, monitor))
}

/// Wait for a running delivery loop to finish, bounded by `limit`
async fn wait_settled(coordinator: &Coordinator, limit: Duration) -> Result<CoordinatorState> {
    match tokio::time::timeout(limit, coordinator.settled()).await {
        Ok(state) => Ok(state?),
        Err(_) => {
            warn!(?limit, "wait_settled: delivery still running");
            Ok(coordinator.snapshot())
        }
    }
}

fn print_outcome(state: &CoordinatorState) {
    if let Some(error) = &state.last_error {
        println!("{} Delivery failed: {}", "✗".red(), error);
    }
    if !state.endpoint_configured() {
        println!(
            "{} No endpoint configured; set one with {}",
            "!".yellow(),
            "hq endpoint <url>".cyan()
        );
    }
    match state.status() {
        Status::OnlineReady | Status::Empty if state.messages.is_empty() => {
            println!("{} Queue empty", "✓".green());
        }
        Status::Sending => println!("{} Still sending {} message(s)", "…".cyan(), state.messages.len()),
        _ => println!(
            "{} {} message(s) queued ({})",
            "•".yellow(),
            state.messages.len(),
            state.status()
        ),
    }
}

async fn cmd_add(config: &Config, text: &str, no_wait: bool, limit: Duration) -> Result<()> {
    debug!(text_len = text.len(), no_wait, "cmd_add: called");
    let (coordinator, _monitor) = start_coordinator(config).await?;

    let Some(id) = coordinator.add_message(text).await? else {
        return Err(eyre!("Message is empty"));
    };
    println!("{} Queued {}", "✓".green(), short_id(&id).cyan());

    if !no_wait {
        let state = wait_settled(&coordinator, limit).await?;
        print_outcome(&state);
    }

    coordinator.shutdown().await?;
    Ok(())
}

fn cmd_cancel(config: &Config, reference: &str) -> Result<()> {
    debug!(%reference, "cmd_cancel: called");
    let mut store = open_store(config)?;
    let messages = store.list()?;

    let id = match IdResolver::new(&messages).resolve(reference) {
        Ok(Some(id)) => id,
        // A full id that is no longer queued was already delivered or cancelled
        Ok(None) if uuid::Uuid::parse_str(reference).is_ok() => {
            info!(id = %reference, "Cancel of a message that is no longer queued");
            println!("{} {} is not queued", "✓".green(), reference);
            return Ok(());
        }
        Ok(None) => return Err(eyre!("No queued message matches '{}'", reference)),
        Err(candidates) => {
            let short: Vec<_> = candidates.iter().map(|c| short_id(c)).collect();
            return Err(eyre!("'{}' is ambiguous: {}", reference, short.join(", ")));
        }
    };

    store.remove(&id)?;
    info!(%id, "Message cancelled");
    println!("{} Cancelled {}", "✓".green(), id);
    Ok(())
}

fn cmd_list(config: &Config, format: OutputFormat) -> Result<()> {
    debug!(?format, "cmd_list: called");
    let mut store = open_store(config)?;
    let messages = store.list()?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&messages)?),
        OutputFormat::Text => {
            if messages.is_empty() {
                println!("No queued messages");
            }
            for message in &messages {
                let queued_at = chrono::DateTime::from_timestamp_millis(message.timestamp)
                    .map(|t| t.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M:%S").to_string())
                    .unwrap_or_else(|| message.timestamp.to_string());
                println!("{}  {}  {}", message.short_id().yellow(), queued_at.dimmed(), message.content);
            }
        }
    }
    Ok(())
}

async fn cmd_status(config: &Config, format: OutputFormat) -> Result<()> {
    debug!(?format, "cmd_status: called");
    let mut store = open_store(config)?;
    let monitor = open_monitor(config).await;

    let state = CoordinatorState {
        messages: store.list()?,
        deliverable: monitor.subscribe().current(),
        endpoint: store.endpoint()?,
        ..Default::default()
    };
    let view = ViewState::project(&state);

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&view)?),
        OutputFormat::Text => {
            println!("hookqueue Status");
            println!("----------------");
            println!("Status:   {}", view.status);
            println!("Queued:   {}", view.messages.len());
            match &view.webhook_url {
                Some(url) if !url.trim().is_empty() => println!("Endpoint: {}", url),
                _ => println!("Endpoint: {}", "not configured".yellow()),
            }
            println!("Store:    {}", config.storage.path.display());
        }
    }
    Ok(())
}

fn cmd_show_endpoint(config: &Config) -> Result<()> {
    debug!("cmd_show_endpoint: called");
    let mut store = open_store(config)?;
    match store.endpoint()? {
        Some(url) if !url.trim().is_empty() => println!("{}", url),
        _ => println!("{}", "No endpoint configured".yellow()),
    }
    Ok(())
}

async fn cmd_set_endpoint(config: &Config, url: &str, no_wait: bool) -> Result<()> {
    debug!(%url, no_wait, "cmd_set_endpoint: called");
    if url.trim().is_empty() {
        return Err(eyre!("Endpoint URL is empty"));
    }

    let (coordinator, _monitor) = start_coordinator(config).await?;
    coordinator.set_endpoint(url).await?;
    println!("{} Endpoint set to {}", "✓".green(), url.trim().cyan());

    if !no_wait {
        let state = wait_settled(&coordinator, config.sender.timeout()).await?;
        if !state.messages.is_empty() || state.last_error.is_some() {
            print_outcome(&state);
        }
    }

    coordinator.shutdown().await?;
    Ok(())
}

fn cmd_clear(config: &Config) -> Result<()> {
    debug!("cmd_clear: called");
    let mut store = open_store(config)?;
    let count = store.list()?.len();
    store.clear()?;
    info!(count, "Queue cleared");
    println!("{} Removed {} message(s)", "✓".green(), count);
    Ok(())
}

/// Nothing is sending and nothing will be sent without outside help
fn is_idle(state: &CoordinatorState) -> bool {
    !state.sending
        && (state.messages.is_empty()
            || state.last_error.is_some()
            || !state.deliverable
            || !state.endpoint_configured())
}

async fn cmd_run(config: &Config, exit_when_idle: bool) -> Result<()> {
    debug!(exit_when_idle, "cmd_run: called");
    let (coordinator, _monitor) = start_coordinator(config).await?;
    let mut updates = coordinator.subscribe();

    let mut last_status = None;
    let mut last_error = None;
    let mut report = |state: &CoordinatorState| {
        let status = state.status();
        if last_status != Some(status) {
            println!("[{}] {} ({} queued)", chrono::Local::now().format("%H:%M:%S"), status, state.messages.len());
            last_status = Some(status);
        }
        if state.last_error != last_error {
            if let Some(error) = &state.last_error {
                println!("{} {}", "✗".red(), error);
            }
            last_error = state.last_error.clone();
        }
    };

    let initial = coordinator.snapshot();
    report(&initial);
    if exit_when_idle && is_idle(&initial) {
        coordinator.shutdown().await?;
        return Ok(());
    }

    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    warn!("cmd_run: coordinator stopped");
                    break;
                }
                let state = updates.borrow_and_update().clone();
                report(&state);
                if exit_when_idle && is_idle(&state) {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("cmd_run: interrupted");
                break;
            }
        }
    }

    coordinator.shutdown().await?;
    Ok(())
}
