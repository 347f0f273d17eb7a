//! Schedule board commands.

use std::sync::Arc;

use anyhow::Result;
use autoserv_id::{EmployeeId, TaskId};
use autoserv_sync::{
    ApiClient, BoardController, DateRange, MoveRequest, Notification, Notifier,
    RebalanceCoordinator, RebalanceResult, ScheduleBoard, TimeWindow,
};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use clap::{Args, Subcommand};
use colored::Colorize;
use serde::Serialize;
use tabled::Tabled;
use tokio::sync::broadcast;

use crate::error::CliError;
use crate::output::{print_output, print_single, print_success, OutputFormat};

use super::CommandContext;

/// Inspect and rearrange the schedule board.
#[derive(Debug, Args)]
pub struct ScheduleCommand {
    #[command(subcommand)]
    command: ScheduleSubcommand,
}

#[derive(Debug, Subcommand)]
enum ScheduleSubcommand {
    /// List tasks grouped by assignee.
    List(RangeArgs),

    /// Move a task to another assignee or time.
    Move(MoveArgs),

    /// Ask the portal to redistribute tasks across assignees.
    Rebalance(RangeArgs),
}

#[derive(Debug, Args)]
struct RangeArgs {
    /// First day (YYYY-MM-DD). Defaults to Monday of the current week.
    #[arg(long)]
    from: Option<NaiveDate>,

    /// Last day (YYYY-MM-DD). Defaults to six days after `--from`.
    #[arg(long)]
    to: Option<NaiveDate>,
}

impl RangeArgs {
    fn range(&self) -> Result<DateRange, CliError> {
        let week = DateRange::week_of(self.from.unwrap_or_else(|| Utc::now().date_naive()));
        let from = self.from.unwrap_or(week.from());
        let to = self.to.unwrap_or(from + chrono::Duration::days(6));
        DateRange::new(from, to).map_err(|e| CliError::InvalidArgument(e.to_string()))
    }
}

#[derive(Debug, Args)]
struct MoveArgs {
    /// Task to move.
    task: TaskId,

    /// New assignee. Defaults to the current one.
    #[arg(long)]
    assignee: Option<EmployeeId>,

    /// New start (RFC 3339, or `YYYY-MM-DDTHH:MM` in UTC).
    #[arg(long, value_parser = parse_time)]
    start: Option<DateTime<Utc>>,

    /// New end. Defaults to keeping the task's duration.
    #[arg(long, value_parser = parse_time)]
    end: Option<DateTime<Utc>>,

    #[command(flatten)]
    range: RangeArgs,
}

fn parse_time(value: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(time) = DateTime::parse_from_rfc3339(value) {
        return Ok(time.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .map(|naive| naive.and_utc())
        .ok_or_else(|| format!("invalid time '{value}'"))
}

#[derive(Debug, Serialize, Tabled)]
struct TaskRow {
    #[tabled(rename = "ASSIGNEE")]
    assignee: String,
    #[tabled(rename = "TASK")]
    id: String,
    #[tabled(rename = "WINDOW")]
    window: String,
    #[tabled(rename = "STATUS")]
    status: String,
    #[tabled(rename = "TITLE")]
    title: String,
}

fn task_rows(board: &ScheduleBoard) -> Vec<TaskRow> {
    board
        .groups()
        .iter()
        .flat_map(|(assignee, tasks)| {
            tasks.iter().map(move |task| TaskRow {
                assignee: assignee.to_string(),
                id: task.id.to_string(),
                window: task.window.to_string(),
                status: task.status.to_string(),
                title: task.title.clone().unwrap_or_else(|| "-".to_string()),
            })
        })
        .collect()
}

impl ScheduleCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        match self.command {
            ScheduleSubcommand::List(args) => list(ctx, args).await,
            ScheduleSubcommand::Move(args) => move_task(ctx, args).await,
            ScheduleSubcommand::Rebalance(args) => rebalance(ctx, args).await,
        }
    }
}

async fn load_board(
    ctx: &CommandContext,
    range: DateRange,
    notifier: Notifier,
) -> Result<BoardController<ApiClient>> {
    let api = Arc::new(ctx.client()?);
    let timeout = ctx.sync_config().mutation_timeout;
    let mut board = BoardController::new(api, range, timeout, notifier);
    board.load().await.map_err(CliError::from)?;
    Ok(board)
}

fn drain_notifications(notes: &mut broadcast::Receiver<Notification>) {
    while let Ok(note) = notes.try_recv() {
        match note {
            Notification::Success(message) => print_success(&message),
            Notification::Error(message) => {
                eprintln!("{} {}", "Failed:".red().bold(), message)
            }
        }
    }
}

async fn list(ctx: CommandContext, args: RangeArgs) -> Result<()> {
    let range = args.range()?;
    let board = load_board(&ctx, range, Notifier::default()).await?;
    print_output(&task_rows(board.board()), ctx.format);
    Ok(())
}

async fn move_task(ctx: CommandContext, args: MoveArgs) -> Result<()> {
    let notifier = Notifier::default();
    let mut notes = notifier.subscribe();
    let mut board = load_board(&ctx, args.range.range()?, notifier).await?;

    let current = board
        .board()
        .find(&args.task)
        .cloned()
        .ok_or_else(|| CliError::InvalidArgument(format!("task {} not in range", args.task)))?;

    let start = args.start.unwrap_or(current.window.start());
    let end = args.end.unwrap_or(start + current.window.duration());
    let window = TimeWindow::new(start, end).map_err(|e| CliError::InvalidArgument(e.to_string()))?;

    let request = MoveRequest {
        task_id: current.id.clone(),
        from: current.employee_id.clone(),
        to: args.assignee.unwrap_or_else(|| current.employee_id.clone()),
        window,
    };

    let result = board.move_task(request).await;
    if ctx.format == OutputFormat::Table {
        drain_notifications(&mut notes);
    }
    let updated = result.map_err(CliError::from)?;

    if ctx.format == OutputFormat::Json {
        print_single(&updated);
    }
    Ok(())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RebalanceView {
    #[serde(flatten)]
    result: RebalanceResult,
    tasks: Vec<TaskRow>,
}

async fn rebalance(ctx: CommandContext, args: RangeArgs) -> Result<()> {
    let notifier = Notifier::default();
    let mut notes = notifier.subscribe();
    let mut board = load_board(&ctx, args.range()?, notifier).await?;

    let coordinator = RebalanceCoordinator::new();
    let result = coordinator.request_rebalance(&mut board).await;
    if ctx.format == OutputFormat::Table {
        drain_notifications(&mut notes);
    }
    let result = result.map_err(CliError::from)?;

    match ctx.format {
        OutputFormat::Json => print_single(&RebalanceView {
            result,
            tasks: task_rows(board.board()),
        }),
        OutputFormat::Table => {
            let flag = |ok: bool| if ok { "yes".green() } else { "no".red() };
            println!("  No one overworked: {}", flag(result.no_employee_overworked));
            println!("  Conflicts resolved: {}", flag(result.all_conflicts_resolved));
            println!();
            print_output(&task_rows(board.board()), ctx.format);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_time_formats() {
        let expected = NaiveDate::from_ymd_opt(2025, 11, 4)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap()
            .and_utc();
        assert_eq!(parse_time("2025-11-04T09:30:00Z").unwrap(), expected);
        assert_eq!(parse_time("2025-11-04T10:30:00+01:00").unwrap(), expected);
        assert_eq!(parse_time("2025-11-04T09:30").unwrap(), expected);
        assert_eq!(parse_time("2025-11-04 09:30").unwrap(), expected);
        assert!(parse_time("tomorrow").is_err());
    }

    #[test]
    fn test_range_defaults_to_a_week() {
        let args = RangeArgs {
            from: NaiveDate::from_ymd_opt(2025, 11, 5),
            to: None,
        };
        let range = args.range().unwrap();
        assert_eq!(range.from(), NaiveDate::from_ymd_opt(2025, 11, 5).unwrap());
        assert_eq!(range.to(), NaiveDate::from_ymd_opt(2025, 11, 11).unwrap());

        let args = RangeArgs {
            from: NaiveDate::from_ymd_opt(2025, 11, 5),
            to: NaiveDate::from_ymd_opt(2025, 11, 1),
        };
        assert!(args.range().is_err());
    }
}
