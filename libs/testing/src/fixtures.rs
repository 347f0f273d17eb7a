//! Test fixtures.

use std::sync::{Arc, Once};

use autoserv_id::{EmployeeId, Username};
use autoserv_sync::{
    CredentialProvider, DashboardSnapshot, ScheduleTask, StaticCredentials, SyncConfig,
    TaskStatus, TimeWindow,
};
use chrono::{DateTime, Utc};
use serde_json::json;

static INIT_TRACING: Once = Once::new();

/// Install a test-writer subscriber once per process. `RUST_LOG` applies.
pub fn init_tracing() {
    INIT_TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "warn,autoserv_sync=debug".into()),
            )
            .with_test_writer()
            .try_init();
    });
}

/// Credentials for `username` with a deterministic session cookie.
pub fn session(username: &str) -> Arc<dyn CredentialProvider> {
    let username: Username = username.parse().expect("valid username");
    let cookie = format!("SESSION=test-{username}");
    Arc::new(StaticCredentials::new(username, cookie))
}

/// Config pointing at local test servers, with short timings.
pub fn test_config(api_url: &str, ws_url: &str) -> SyncConfig {
    SyncConfig {
        api_url: api_url.to_string(),
        ws_url: ws_url.to_string(),
        reconnect_delay: std::time::Duration::from_millis(50),
        handshake_timeout: std::time::Duration::from_secs(5),
        heart_beat: autoserv_stomp::HeartBeat::disabled(),
        mutation_timeout: std::time::Duration::from_secs(5),
        ..SyncConfig::default()
    }
}

/// Dashboard counters in field order.
pub fn snapshot(
    active_services: u64,
    completed_services: u64,
    upcoming_appointments: u64,
    active_projects: u64,
    completed_projects: u64,
) -> DashboardSnapshot {
    DashboardSnapshot {
        active_services,
        completed_services,
        upcoming_appointments,
        active_projects,
        completed_projects,
    }
}

/// Wire form of a snapshot.
pub fn snapshot_json(s: &DashboardSnapshot) -> serde_json::Value {
    json!({
        "activeServices": s.active_services,
        "completedServices": s.completed_services,
        "upcomingAppointments": s.upcoming_appointments,
        "activeProjects": s.active_projects,
        "completedProjects": s.completed_projects,
    })
}

/// Task on 2025-11-04 from `hour` for one hour.
pub fn task(id: &str, employee: &str, hour: u32) -> ScheduleTask {
    ScheduleTask {
        id: id.parse().expect("valid task id"),
        employee_id: employee.parse().expect("valid employee id"),
        window: window(hour, hour + 1),
        status: TaskStatus::Scheduled,
        color: None,
        title: None,
    }
}

/// Window on 2025-11-04 between two whole hours (UTC).
pub fn window(start_hour: u32, end_hour: u32) -> TimeWindow {
    let at = |h: u32| -> DateTime<Utc> {
        format!("2025-11-04T{h:02}:00:00Z")
            .parse()
            .expect("valid timestamp")
    };
    TimeWindow::new(at(start_hour), at(end_hour)).expect("valid window")
}

pub fn employee(id: &str) -> EmployeeId {
    id.parse().expect("valid employee id")
}
