//! Schedule data model.

use std::fmt;

use autoserv_id::{EmployeeId, TaskId};
use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A time window whose end is strictly after its start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

/// Returned when `end <= start`.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("end time {end} must be after start time {start}")]
pub struct InvalidWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, InvalidWindow> {
        if end <= start {
            return Err(InvalidWindow { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Calendar day (UTC) the window starts on.
    pub fn day(&self) -> NaiveDate {
        self.start.date_naive()
    }

    /// Returns true if the windows share any instant.
    pub fn overlaps(&self, other: &TimeWindow) -> bool {
        self.start < other.end && other.start < self.end
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}..{}",
            self.start.format("%Y-%m-%d %H:%M"),
            self.end.format("%H:%M")
        )
    }
}

/// Task status on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskStatus {
    #[serde(rename = "scheduled", alias = "SCHEDULED")]
    Scheduled,
    #[serde(rename = "in-progress", alias = "IN_PROGRESS", alias = "in_progress")]
    InProgress,
    #[serde(rename = "on-hold", alias = "ON_HOLD", alias = "on_hold")]
    OnHold,
    #[serde(rename = "completed", alias = "COMPLETED")]
    Completed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::InProgress => "in-progress",
            Self::OnHold => "on-hold",
            Self::Completed => "completed",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One scheduled piece of work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "WireTask", into = "WireTask")]
pub struct ScheduleTask {
    pub id: TaskId,
    pub employee_id: EmployeeId,
    pub window: TimeWindow,
    pub status: TaskStatus,

    /// Display grouping only.
    pub color: Option<String>,
    pub title: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireTask {
    id: TaskId,
    employee_id: EmployeeId,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    title: Option<String>,
}

impl TryFrom<WireTask> for ScheduleTask {
    type Error = InvalidWindow;

    fn try_from(wire: WireTask) -> Result<Self, Self::Error> {
        Ok(Self {
            window: TimeWindow::new(wire.start_time, wire.end_time)?,
            id: wire.id,
            employee_id: wire.employee_id,
            status: wire.status,
            color: wire.color,
            title: wire.title,
        })
    }
}

impl From<ScheduleTask> for WireTask {
    fn from(task: ScheduleTask) -> Self {
        Self {
            id: task.id,
            employee_id: task.employee_id,
            start_time: task.window.start(),
            end_time: task.window.end(),
            status: task.status,
            color: task.color,
            title: task.title,
        }
    }
}

/// Body of `PUT /api/schedule/task/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskUpdate {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub employee_id: Option<EmployeeId>,
}

impl TaskUpdate {
    pub fn new(window: TimeWindow, employee_id: Option<EmployeeId>) -> Self {
        Self {
            start_time: window.start(),
            end_time: window.end(),
            employee_id,
        }
    }
}

/// Outcome of an auto-balance request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RebalanceResult {
    /// Tasks moved off an overloaded assignee.
    #[serde(alias = "movedFromOverloaded")]
    pub tasks_moved: u32,
    pub tasks_reassigned: u32,
    pub no_employee_overworked: bool,
    pub all_conflicts_resolved: bool,
}

/// Inclusive date range for schedule queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    from: NaiveDate,
    to: NaiveDate,
}

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("date range ends ({to}) before it starts ({from})")]
pub struct InvalidRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl DateRange {
    pub fn new(from: NaiveDate, to: NaiveDate) -> Result<Self, InvalidRange> {
        if to < from {
            return Err(InvalidRange { from, to });
        }
        Ok(Self { from, to })
    }

    /// Monday through Sunday of the week containing `day`.
    pub fn week_of(day: NaiveDate) -> Self {
        let from = day - Duration::days(i64::from(day.weekday().num_days_from_monday()));
        Self {
            from,
            to: from + Duration::days(6),
        }
    }

    pub fn from(&self) -> NaiveDate {
        self.from
    }

    pub fn to(&self) -> NaiveDate {
        self.to
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        self.from <= day && day <= self.to
    }

    /// `from=YYYY-MM-DD&to=YYYY-MM-DD`
    pub fn query(&self) -> String {
        format!(
            "from={}&to={}",
            self.from.format("%Y-%m-%d"),
            self.to.format("%Y-%m-%d")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 11, 4, h, 0, 0).unwrap()
    }

    #[test]
    fn test_window_invariant() {
        assert!(TimeWindow::new(at(9), at(10)).is_ok());
        assert!(TimeWindow::new(at(10), at(10)).is_err());
        assert!(TimeWindow::new(at(11), at(10)).is_err());
    }

    #[test]
    fn test_overlap() {
        let a = TimeWindow::new(at(9), at(11)).unwrap();
        let b = TimeWindow::new(at(10), at(12)).unwrap();
        let c = TimeWindow::new(at(11), at(12)).unwrap();
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
        assert_eq!(a.duration(), Duration::hours(2));
    }

    #[test]
    fn test_task_wire_format() {
        let json = r##"{
            "id": "t1",
            "employeeId": 7,
            "startTime": "2025-11-04T09:00:00Z",
            "endTime": "2025-11-04T10:00:00Z",
            "status": "IN_PROGRESS",
            "color": "#3b82f6"
        }"##;
        let task: ScheduleTask = serde_json::from_str(json).unwrap();
        assert_eq!(task.id.as_str(), "t1");
        assert_eq!(task.employee_id.as_str(), "7");
        assert_eq!(task.status, TaskStatus::InProgress);
        assert_eq!(task.window.day(), NaiveDate::from_ymd_opt(2025, 11, 4).unwrap());

        let out = serde_json::to_value(&task).unwrap();
        assert_eq!(out["status"], "in-progress");
        assert_eq!(out["employeeId"], "7");
        assert!(out.get("title").is_none());
    }

    #[test]
    fn test_task_rejects_inverted_window() {
        let json = r#"{
            "id": "t1",
            "employeeId": "alice",
            "startTime": "2025-11-04T10:00:00Z",
            "endTime": "2025-11-04T09:00:00Z",
            "status": "scheduled"
        }"#;
        assert!(serde_json::from_str::<ScheduleTask>(json).is_err());
    }

    #[test]
    fn test_update_body() {
        let window = TimeWindow::new(at(9), at(10)).unwrap();
        let body = serde_json::to_value(TaskUpdate::new(window, None)).unwrap();
        assert_eq!(body["startTime"], "2025-11-04T09:00:00Z");
        assert!(body.get("employeeId").is_none());

        let body =
            serde_json::to_value(TaskUpdate::new(window, Some("bob".parse().unwrap()))).unwrap();
        assert_eq!(body["employeeId"], "bob");
    }

    #[test]
    fn test_rebalance_result() {
        let result: RebalanceResult = serde_json::from_str(
            r#"{"movedFromOverloaded":3,"tasksReassigned":2,"noEmployeeOverworked":true,"allConflictsResolved":false}"#,
        )
        .unwrap();
        assert_eq!(result.tasks_moved, 3);
        assert_eq!(result.tasks_reassigned, 2);
        assert!(result.no_employee_overworked);
        assert!(!result.all_conflicts_resolved);
    }

    #[test]
    fn test_week_of() {
        // 2025-11-06 is a Thursday.
        let range = DateRange::week_of(NaiveDate::from_ymd_opt(2025, 11, 6).unwrap());
        assert_eq!(range.query(), "from=2025-11-03&to=2025-11-09");
        assert!(range.contains(NaiveDate::from_ymd_opt(2025, 11, 9).unwrap()));
        assert!(!range.contains(NaiveDate::from_ymd_opt(2025, 11, 10).unwrap()));
    }

    #[test]
    fn test_invalid_range() {
        let a = NaiveDate::from_ymd_opt(2025, 11, 6).unwrap();
        let b = NaiveDate::from_ymd_opt(2025, 11, 5).unwrap();
        assert!(DateRange::new(a, b).is_err());
        assert!(DateRange::new(a, a).is_ok());
    }
}
