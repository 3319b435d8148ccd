//! dashpoll - CLI entry point
//!
//! Loads the panel list, registers one HTTP fetch per panel with a polling
//! coordinator and prints a summary after every round.

use clap::{CommandFactory, Parser};
use colored::Colorize;
use eyre::{Context, Result};
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use dashpoll::cli::{Cli, Command, OutputFormat};
use dashpoll::config::Config;
use dashpoll::events::PollEvent;
use dashpoll::panels::{HttpPanel, PanelStatus};
use dashpoll::polling::{PollingCoordinator, Registration, VisibilitySource};

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    // Priority: CLI --log-level > config file > default (INFO)
    let level = match cli_log_level.or(config_log_level).map(|s| s.to_uppercase()) {
        Some(s) => match s.as_str() {
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

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .try_init()
        .map_err(|e| eyre::eyre!("Failed to initialize logging: {}", e))?;

    debug!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load log level from config file early (before full config load)
    let config_log_level = Config::load_log_level(cli.config.as_ref());
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let mut config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Some(Command::Run { interval_ms, format }) => {
            if let Some(interval_ms) = interval_ms {
                config.polling.interval_ms = interval_ms;
            }
            config.validate().context("Invalid configuration")?;
            cmd_run(&config, format).await
        }
        Some(Command::Config) => cmd_config(&config),
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    }
}

fn cmd_config(config: &Config) -> Result<()> {
    let yaml = serde_yaml::to_string(config).context("Failed to serialize config")?;
    print!("{yaml}");
    Ok(())
}

async fn cmd_run(config: &Config, format: OutputFormat) -> Result<()> {
    if config.panels.is_empty() {
        warn!("No panels configured; rounds will be empty");
    }

    let visibility = VisibilitySource::new();
    let (handle, task) = PollingCoordinator::new(config.polling.clone(), visibility.monitor()).spawn();

    let client = reqwest::Client::builder()
        .user_agent(concat!("dashpoll/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to build HTTP client")?;

    let panels: Vec<HttpPanel> = config
        .panels
        .iter()
        .cloned()
        .map(|panel| HttpPanel::new(panel, client.clone()))
        .collect();

    let printer = tokio::spawn(print_events(handle.subscribe(), panels.clone(), format));

    let registrations: Vec<Registration> = panels
        .iter()
        .map(|panel| handle.attach(panel.id(), panel.callback()))
        .collect();

    info!(
        panels = registrations.len(),
        interval_ms = config.polling.interval_ms,
        "Polling started"
    );

    let mut hide = signal(SignalKind::user_defined1()).context("Failed to install SIGUSR1 handler")?;
    let mut show = signal(SignalKind::user_defined2()).context("Failed to install SIGUSR2 handler")?;
    let mut refresh = signal(SignalKind::hangup()).context("Failed to install SIGHUP handler")?;

    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result.context("Failed to listen for Ctrl-C")?;
                info!("Interrupted, shutting down");
                break;
            }
            _ = hide.recv() => {
                visibility.hide();
            }
            _ = show.recv() => {
                visibility.show();
            }
            _ = refresh.recv() => {
                handle.refresh();
            }
        }
    }

    drop(registrations);
    handle.shutdown().await.context("Failed to stop polling coordinator")?;
    task.await.context("Polling coordinator task failed")?;
    printer.await.context("Event printer task failed")?;
    Ok(())
}

async fn print_events(mut rx: broadcast::Receiver<PollEvent>, panels: Vec<HttpPanel>, format: OutputFormat) {
    loop {
        let event = match rx.recv().await {
            Ok(event) => event,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "Event printer lagging, skipped events");
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };

        match format {
            OutputFormat::Json => match serde_json::to_string(&event) {
                Ok(line) => println!("{line}"),
                Err(e) => warn!(error = %e, "Failed to serialize event"),
            },
            OutputFormat::Text => print_text(&event, &panels),
        }

        if event == PollEvent::Stopped {
            break;
        }
    }
}

fn print_text(event: &PollEvent, panels: &[HttpPanel]) {
    let now = chrono::Local::now().format("%H:%M:%S");
    match event {
        PollEvent::RoundCompleted {
            round,
            trigger,
            succeeded,
            failed,
            elapsed_ms,
        } => {
            let failed = if *failed > 0 {
                format!("{failed} failed").red()
            } else {
                format!("{failed} failed").normal()
            };
            println!(
                "[{now}] round {} ({trigger}): {} ok, {failed} in {elapsed_ms}ms",
                round.to_string().bold(),
                succeeded.to_string().green()
            );
            for panel in panels {
                println!("  {:<20} {}", panel.id(), describe(&panel.status()));
            }
        }
        PollEvent::Paused => println!("[{now}] {}", "hidden, polling paused".yellow()),
        PollEvent::Resumed => println!("[{now}] {}", "visible, polling resumed".green()),
        PollEvent::TriggerDropped { trigger, in_flight } => {
            println!("[{now}] {trigger} dropped, round {in_flight} still running")
        }
        _ => {}
    }
}

fn describe(status: &PanelStatus) -> String {
    match status {
        PanelStatus::Pending => "pending".dimmed().to_string(),
        PanelStatus::Ready { status, bytes, .. } => format!("{} {bytes} bytes", status.to_string().green()),
        PanelStatus::Failed { error, .. } => error.red().to_string(),
    }
}
