//! Dashboard commands.

use anyhow::Result;
use autoserv_sync::{ConnectionStatus, DashboardSession, DashboardSnapshot, SnapshotFetcher};
use clap::{Args, Subcommand};
use colored::Colorize;
use serde::Serialize;
use tabled::Tabled;
use tracing::debug;

use crate::error::CliError;
use crate::output::{print_info, print_output, print_single, print_warning, OutputFormat};

use super::CommandContext;

/// Show or follow the customer dashboard.
#[derive(Debug, Args)]
pub struct DashboardCommand {
    #[command(subcommand)]
    command: DashboardSubcommand,
}

#[derive(Debug, Subcommand)]
enum DashboardSubcommand {
    /// Fetch the current counters once.
    Show,

    /// Follow live updates until interrupted.
    Watch(WatchArgs),
}

#[derive(Debug, Args)]
struct WatchArgs {
    /// Exit after printing this many snapshots.
    #[arg(long)]
    count: Option<usize>,
}

#[derive(Debug, Serialize, Tabled)]
struct CounterRow {
    #[tabled(rename = "COUNTER")]
    counter: &'static str,
    #[tabled(rename = "VALUE")]
    value: u64,
}

fn counter_rows(snapshot: &DashboardSnapshot) -> Vec<CounterRow> {
    vec![
        CounterRow {
            counter: "Active services",
            value: snapshot.active_services,
        },
        CounterRow {
            counter: "Completed services",
            value: snapshot.completed_services,
        },
        CounterRow {
            counter: "Upcoming appointments",
            value: snapshot.upcoming_appointments,
        },
        CounterRow {
            counter: "Active projects",
            value: snapshot.active_projects,
        },
        CounterRow {
            counter: "Completed projects",
            value: snapshot.completed_projects,
        },
    ]
}

fn print_snapshot(snapshot: &DashboardSnapshot, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_single(snapshot),
        OutputFormat::Table => print_output(&counter_rows(snapshot), format),
    }
}

fn describe_status(status: &ConnectionStatus) -> String {
    match status {
        ConnectionStatus::Idle => "idle".dimmed().to_string(),
        ConnectionStatus::Connecting => "connecting".yellow().to_string(),
        ConnectionStatus::Connected => "live".green().to_string(),
        ConnectionStatus::Reconnecting { attempt, error } => {
            format!("{} (attempt {attempt}): {error}", "reconnecting".yellow())
        }
        ConnectionStatus::Closed => "closed".dimmed().to_string(),
    }
}

impl DashboardCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        match self.command {
            DashboardSubcommand::Show => show(ctx).await,
            DashboardSubcommand::Watch(args) => watch(ctx, args).await,
        }
    }
}

async fn show(ctx: CommandContext) -> Result<()> {
    let fetcher = SnapshotFetcher::new(ctx.client()?);
    let snapshot = fetcher.fetch().await.ok_or(CliError::DashboardUnavailable)?;
    print_snapshot(&snapshot, ctx.format);
    Ok(())
}

async fn watch(ctx: CommandContext, args: WatchArgs) -> Result<()> {
    if args.count == Some(0) {
        return Err(CliError::InvalidArgument("--count must be at least 1".into()).into());
    }

    let creds = ctx.require_credentials()?;
    let mut session =
        DashboardSession::mount(&ctx.sync_config(), creds).map_err(CliError::from)?;
    let mut snapshots = session.subscribe();
    let mut status = session.connection_status();

    if ctx.format == OutputFormat::Table {
        print_info("Watching dashboard, press Ctrl-C to stop.");
    }

    let mut printed = 0usize;
    loop {
        tokio::select! {
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let Some(snapshot) = *snapshots.borrow_and_update() else {
                    continue;
                };
                print_snapshot(&snapshot, ctx.format);
                printed += 1;
                if args.count.is_some_and(|n| printed >= n) {
                    break;
                }
            }
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = status.borrow_and_update().clone();
                debug!(status = ?current, "Live channel status");
                if ctx.format == OutputFormat::Table {
                    eprintln!("{} {}", "Channel:".bold(), describe_status(&current));
                }
            }
            _ = tokio::signal::ctrl_c() => {
                break;
            }
        }
    }

    session.unmount().await;
    if printed == 0 {
        print_warning("No dashboard data received.");
    }
    Ok(())
}
