//! Terminal job list watcher.
//!
//! Keeps one page of a cluster's job list on screen, refreshed through
//! blocking queries, and pages through it on command.
//!
//! Usage:
//!   joblist --address http://127.0.0.1:4646 --namespace default
//!
//! Type `n`/`p` to page, `a` to apply a pending change, `l` to toggle live
//! updates, `q` to quit.

use std::{path::PathBuf, sync::Arc};
use anyhow::{Context, Result};
use clap::Parser;
use joblist_cli::{parse_command, render_page, Command, HELP};
use joblist_types::{ContinuationToken, Scope, ALL_NAMESPACES};
use joblist_watch::{
    HttpConfig, HttpTransport, SqlitePreferences, WatchConfig, WatchCoordinator, WatchError,
    WatchNotification,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "joblist")]
#[command(about = "Watch a paginated cluster job list")]
struct Args {
    /// Cluster API address
    #[arg(short, long, default_value = "http://127.0.0.1:4646")]
    address: String,

    /// ACL token
    #[arg(short, long)]
    token: Option<String>,

    /// Namespace to watch ("*" for all)
    #[arg(short, long, default_value = ALL_NAMESPACES)]
    namespace: String,

    /// Server-side filter expression
    #[arg(short, long)]
    filter: Option<String>,

    /// Start at this continuation token instead of the first page
    #[arg(long)]
    cursor: Option<String>,

    /// Jobs per page (remembered across runs)
    #[arg(long)]
    page_size: Option<usize>,

    /// Path to the preference database
    #[arg(long, default_value = "joblist-prefs.db")]
    prefs: PathBuf,

    /// Longest the server may hold a blocking query (seconds)
    #[arg(long, default_value = "60")]
    wait: u64,

    /// Hold membership changes until applied (remembered across runs)
    #[arg(long)]
    no_live: bool,

    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let log_level = if args.verbose { Level::DEBUG } else { Level::WARN };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let prefs = SqlitePreferences::open(&args.prefs).context("Failed to open preference store")?;
    let transport = HttpTransport::new(HttpConfig {
        address: args.address.clone(),
        token: args.token.clone(),
        wait_secs: args.wait,
        request_timeout_secs: args.wait + 30,
    })
    .context("Failed to create HTTP transport")?;
    let coordinator = WatchCoordinator::new(
        Arc::new(transport),
        Arc::new(prefs),
        WatchConfig::default(),
    );

    if let Some(page_size) = args.page_size {
        coordinator
            .set_page_size(page_size)
            .await
            .context("Invalid page size")?;
    }
    if args.no_live {
        coordinator.set_live_updates(false).await;
    }

    let mut scope = Scope::namespace(args.namespace.as_str());
    if let Some(filter) = &args.filter {
        scope = scope.with_filter(filter.as_str());
    }

    let mut notes = coordinator.subscribe();
    info!("Connecting to {}", args.address);
    coordinator
        .enter(scope, args.cursor.map(ContinuationToken::from))
        .await
        .with_context(|| format!("Failed to load job list from {}", args.address))?;
    print_page(&coordinator).await;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            note = notes.recv() => match note {
                Ok(WatchNotification::Forbidden { reason }) => {
                    print_page(&coordinator).await;
                    eprintln!("Access denied: {reason}");
                    break;
                }
                Ok(WatchNotification::PendingAvailable { ids }) => {
                    println!("{} jobs changed on this page, press [a] to show them", ids.len());
                }
                Ok(_) => print_page(&coordinator).await,
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Skipped {} notifications", skipped);
                    print_page(&coordinator).await;
                }
                Err(RecvError::Closed) => break,
            },
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read stdin")? else {
                    break;
                };
                match parse_command(&line) {
                    Some(Command::Quit) => break,
                    Some(command) => run_command(&coordinator, command).await,
                    None if line.trim().is_empty() => {}
                    None => println!("{HELP}"),
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    coordinator.leave().await;
    Ok(())
}

async fn run_command(coordinator: &WatchCoordinator, command: Command) {
    let result = match command {
        Command::Page(direction) => coordinator.change_page(direction).await.map(|_| ()),
        Command::ApplyPending => {
            if !coordinator.apply_pending().await {
                println!("Nothing pending");
            }
            Ok(())
        }
        Command::ToggleLive => {
            let enabled = !coordinator.live_updates_enabled().await;
            coordinator.set_live_updates(enabled).await;
            Ok(())
        }
        Command::PageSize(page_size) => coordinator.set_page_size(page_size).await,
        Command::Refresh | Command::Quit => Ok(()),
    };

    match result {
        Ok(()) => print_page(coordinator).await,
        Err(e) if e.is_boundary() => println!("{e}"),
        Err(WatchError::Forbidden(reason)) => eprintln!("Access denied: {reason}"),
        Err(e) => eprintln!("{e}"),
    }
}

async fn print_page(coordinator: &WatchCoordinator) {
    let page = coordinator.current_page().await;
    let live = coordinator.live_updates_enabled().await;
    println!("\n{}", render_page(&page, live));
}
