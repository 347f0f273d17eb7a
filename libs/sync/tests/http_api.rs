//! REST endpoints against a mock server.

use std::sync::Arc;

use autoserv_sync::schedule::TaskUpdate;
use autoserv_sync::{
    ApiClient, DateRange, ScheduleApi, SnapshotFetcher, StaticCredentials, SyncError,
    DASHBOARD_OVERVIEW_PATH, IDEMPOTENCY_KEY_HEADER,
};
use autoserv_testing::{employee, session, snapshot, snapshot_json, window};
use chrono::NaiveDate;
use serde_json::json;
use wiremock::matchers::{body_json, header, header_exists, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> ApiClient {
    ApiClient::new(&server.uri(), session("alice")).unwrap()
}

#[tokio::test]
async fn test_snapshot_fetch_success() {
    let server = MockServer::start().await;
    let expected = snapshot(2, 5, 1, 0, 3);
    Mock::given(method("GET"))
        .and(path(DASHBOARD_OVERVIEW_PATH))
        .and(header("cookie", "SESSION=test-alice"))
        .respond_with(ResponseTemplate::new(200).set_body_json(snapshot_json(&expected)))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = SnapshotFetcher::new(client(&server));
    assert_eq!(fetcher.fetch().await, Some(expected));
}

#[tokio::test]
async fn test_snapshot_fetch_failures_are_unknown() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(DASHBOARD_OVERVIEW_PATH))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let fetcher = SnapshotFetcher::new(client(&server));
    assert_eq!(fetcher.fetch().await, None);
}

#[tokio::test]
async fn test_snapshot_fetch_without_session() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(DASHBOARD_OVERVIEW_PATH))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let api = ApiClient::new(&server.uri(), Arc::new(StaticCredentials::anonymous())).unwrap();
    assert_eq!(SnapshotFetcher::new(api).fetch().await, None);

    let requests = server.received_requests().await.unwrap();
    assert!(requests[0].headers.get("cookie").is_none());
}

#[tokio::test]
async fn test_snapshot_fetch_network_failure() {
    // Nothing listens on the discard port.
    let api = ApiClient::new("http://127.0.0.1:9", session("alice")).unwrap();
    assert_eq!(SnapshotFetcher::new(api).fetch().await, None);
}

#[tokio::test]
async fn test_list_tasks_for_range() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/schedule"))
        .and(query_param("from", "2025-11-03"))
        .and(query_param("to", "2025-11-09"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "id": "t1",
                "employeeId": "alice",
                "startTime": "2025-11-04T09:00:00Z",
                "endTime": "2025-11-04T10:00:00Z",
                "status": "scheduled"
            },
            {
                "id": "t2",
                "employeeId": "bob",
                "startTime": "2025-11-05T13:00:00Z",
                "endTime": "2025-11-05T15:30:00Z",
                "status": "on-hold",
                "title": "Brake inspection"
            }
        ])))
        .mount(&server)
        .await;

    let range = DateRange::week_of(NaiveDate::from_ymd_opt(2025, 11, 4).unwrap());
    let tasks = client(&server).list_tasks(range).await.unwrap();
    assert_eq!(tasks.len(), 2);
    assert_eq!(tasks[1].employee_id, employee("bob"));
    assert_eq!(tasks[1].window.duration().num_minutes(), 150);
    assert_eq!(tasks[1].title.as_deref(), Some("Brake inspection"));
}

#[tokio::test]
async fn test_update_task_sends_idempotency_key() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/api/schedule/task/t1"))
        .and(header_exists(IDEMPOTENCY_KEY_HEADER))
        .and(body_json(json!({
            "startTime": "2025-11-04T09:00:00Z",
            "endTime": "2025-11-04T10:00:00Z",
            "employeeId": "bob"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "t1",
            "employeeId": "bob",
            "startTime": "2025-11-04T09:00:00Z",
            "endTime": "2025-11-04T10:00:00Z",
            "status": "scheduled"
        })))
        .expect(2)
        .mount(&server)
        .await;

    let api = client(&server);
    let update = TaskUpdate::new(window(9, 10), Some(employee("bob")));
    let task_id = "t1".parse().unwrap();
    let updated = api.update_task(&task_id, &update).await.unwrap();
    assert_eq!(updated.employee_id, employee("bob"));

    // Retrying the same update reuses the key.
    api.update_task(&task_id, &update).await.unwrap();
    let requests = server.received_requests().await.unwrap();
    assert_eq!(
        requests[0].headers.get(IDEMPOTENCY_KEY_HEADER),
        requests[1].headers.get(IDEMPOTENCY_KEY_HEADER)
    );
}

#[tokio::test]
async fn test_update_conflict_message() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/api/schedule/task/t1"))
        .respond_with(
            ResponseTemplate::new(409).set_body_json(json!({"message": "overlaps t7"})),
        )
        .mount(&server)
        .await;

    let update = TaskUpdate::new(window(9, 10), None);
    let err = client(&server)
        .update_task(&"t1".parse().unwrap(), &update)
        .await
        .unwrap_err();
    match err {
        SyncError::Api { status, message } => {
            assert_eq!(status, 409);
            assert_eq!(message, "overlaps t7");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_auto_balance() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/schedule/auto-balance"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "movedFromOverloaded": 3,
            "tasksReassigned": 2,
            "noEmployeeOverworked": true,
            "allConflictsResolved": true
        })))
        .expect(1)
        .mount(&server)
        .await;

    let result = client(&server).auto_balance().await.unwrap();
    assert_eq!(result.tasks_moved, 3);
    assert_eq!(result.tasks_reassigned, 2);
    assert!(result.all_conflicts_resolved);
}

#[tokio::test]
async fn test_unauthorized_is_auth_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/schedule/auto-balance"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let err = client(&server).auto_balance().await.unwrap_err();
    assert!(err.is_auth());
}
