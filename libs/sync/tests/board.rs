//! Schedule board moves and rebalancing against an in-memory backend.

use std::sync::Arc;
use std::time::Duration;

use autoserv_sync::{
    BoardController, BoardError, DateRange, MoveRequest, Notification, Notifier,
    RebalanceCoordinator, RebalanceResult, RebalanceStatus, ScheduleBoard, SyncError,
};
use autoserv_testing::{employee, init_tracing, task, window, FakeScheduleApi, ScheduleCall};
use chrono::NaiveDate;
use rstest::rstest;

fn week() -> DateRange {
    DateRange::week_of(NaiveDate::from_ymd_opt(2025, 11, 4).unwrap())
}

async fn board_with(
    api: &Arc<FakeScheduleApi>,
    timeout: Duration,
) -> (BoardController<FakeScheduleApi>, Notifier) {
    init_tracing();
    let notifier = Notifier::default();
    let mut board = BoardController::new(Arc::clone(api), week(), timeout, notifier.clone())
        .with_roster([employee("alice"), employee("bob")]);
    board.load().await.unwrap();
    (board, notifier)
}

fn move_t1_to_bob() -> MoveRequest {
    MoveRequest {
        task_id: "t1".parse().unwrap(),
        from: employee("alice"),
        to: employee("bob"),
        window: window(9, 10),
    }
}

fn alice_t1_t2() -> Arc<FakeScheduleApi> {
    Arc::new(FakeScheduleApi::new(vec![
        task("t1", "alice", 8),
        task("t2", "alice", 11),
    ]))
}

#[tokio::test]
async fn test_load_groups_by_assignee() {
    let api = alice_t1_t2();
    let (board, _) = board_with(&api, Duration::from_secs(5)).await;

    assert_eq!(board.board().task_ids(&employee("alice")), vec!["t1", "t2"]);
    assert!(board.board().tasks_for(&employee("bob")).is_empty());
    assert_eq!(
        board.board().assignees().map(|e| e.as_str()).collect::<Vec<_>>(),
        vec!["alice", "bob"]
    );
    assert_eq!(api.calls(), vec![ScheduleCall::List(week())]);
}

#[tokio::test]
async fn test_move_is_optimistic_and_rolls_back_on_failure() {
    let api = alice_t1_t2();
    api.fail_updates(409, "overlaps another task");
    let (mut board, notifier) = board_with(&api, Duration::from_secs(5)).await;
    let mut notes = notifier.subscribe();
    let before = board.board().clone();

    let pending = board.begin_move(move_t1_to_bob()).unwrap();
    assert_eq!(board.board().task_ids(&employee("alice")), vec!["t2"]);
    assert_eq!(board.board().task_ids(&employee("bob")), vec!["t1"]);
    assert_eq!(board.confirmed_board(), &before);
    assert!(board.has_pending_move());

    let err = board.confirm_move(pending).await.unwrap_err();
    assert!(matches!(err, SyncError::Api { status: 409, .. }));

    assert_eq!(board.board(), &before);
    assert_eq!(board.board().task_ids(&employee("alice")), vec!["t1", "t2"]);
    assert!(board.board().tasks_for(&employee("bob")).is_empty());
    assert!(!board.has_pending_move());

    let note = notes.recv().await.unwrap();
    assert!(note.is_error());
    assert!(note.message().contains("overlaps another task"));
}

#[tokio::test]
async fn test_confirmed_move_refetches_board() {
    let api = alice_t1_t2();
    let (mut board, notifier) = board_with(&api, Duration::from_secs(5)).await;
    let mut notes = notifier.subscribe();
    let mut watcher = board.subscribe();

    let updated = board.move_task(move_t1_to_bob()).await.unwrap();
    assert_eq!(updated.employee_id, employee("bob"));
    assert_eq!(updated.window, window(9, 10));

    assert_eq!(api.list_count(), 2);
    assert_eq!(board.board().task_ids(&employee("bob")), vec!["t1"]);
    assert_eq!(board.board(), board.confirmed_board());
    assert!(watcher.has_changed().unwrap());
    assert_eq!(
        watcher.borrow_and_update().task_ids(&employee("bob")),
        vec!["t1"]
    );

    assert_eq!(
        notes.recv().await.unwrap(),
        Notification::Success("Task t1 moved to bob".to_string())
    );

    match &api.calls()[1] {
        ScheduleCall::Update(id, update) => {
            assert_eq!(id.as_str(), "t1");
            assert_eq!(update.employee_id, Some(employee("bob")));
        }
        other => panic!("unexpected call {other:?}"),
    }
}

#[tokio::test]
async fn test_same_assignee_move_omits_employee() {
    let api = alice_t1_t2();
    let (mut board, _) = board_with(&api, Duration::from_secs(5)).await;

    board
        .move_task(MoveRequest {
            task_id: "t2".parse().unwrap(),
            from: employee("alice"),
            to: employee("alice"),
            window: window(14, 16),
        })
        .await
        .unwrap();

    let ScheduleCall::Update(_, update) = &api.calls()[1] else {
        panic!("expected update");
    };
    assert_eq!(update.employee_id, None);
    assert_eq!(board.board().task_ids(&employee("alice")), vec!["t1", "t2"]);
    let day = NaiveDate::from_ymd_opt(2025, 11, 4).unwrap();
    assert_eq!(board.board().booked_minutes(&employee("alice"), day), 180);
}

#[tokio::test]
async fn test_refetch_failure_keeps_confirmed_board() {
    let api = alice_t1_t2();
    let (mut board, _) = board_with(&api, Duration::from_secs(5)).await;
    api.fail_lists(503, "unavailable");

    board.move_task(move_t1_to_bob()).await.unwrap();
    assert_eq!(board.board().task_ids(&employee("bob")), vec!["t1"]);
    assert_eq!(board.board(), board.confirmed_board());
}

#[tokio::test]
async fn test_timeout_rolls_back() {
    let api = alice_t1_t2();
    api.delay_mutations(Duration::from_millis(500));
    let (mut board, _) = board_with(&api, Duration::from_millis(50)).await;
    let before = board.board().clone();

    let err = board.move_task(move_t1_to_bob()).await.unwrap_err();
    assert!(matches!(err, SyncError::Timeout { .. }));
    assert_eq!(board.board(), &before);
}

#[tokio::test]
async fn test_second_move_refused_while_pending() {
    let api = alice_t1_t2();
    let (mut board, _) = board_with(&api, Duration::from_secs(5)).await;

    let pending = board.begin_move(move_t1_to_bob()).unwrap();
    let err = board
        .begin_move(MoveRequest {
            task_id: "t2".parse().unwrap(),
            from: employee("alice"),
            to: employee("bob"),
            window: window(12, 13),
        })
        .unwrap_err();
    assert!(matches!(err, SyncError::Board(BoardError::Reconcile(_))));

    board.confirm_move(pending).await.unwrap();
    assert!(!board.has_pending_move());
}

#[tokio::test]
async fn test_reload_refused_while_move_pending() {
    let api = alice_t1_t2();
    let (mut board, notifier) = board_with(&api, Duration::from_secs(5)).await;
    let mut notes = notifier.subscribe();

    let pending = board.begin_move(move_t1_to_bob()).unwrap();

    let err = board.load().await.unwrap_err();
    assert!(matches!(err, SyncError::Board(BoardError::MovePending)));
    let next_week = DateRange::week_of(NaiveDate::from_ymd_opt(2025, 11, 11).unwrap());
    let err = board.set_range(next_week).await.unwrap_err();
    assert!(matches!(err, SyncError::Board(BoardError::MovePending)));
    assert_eq!(board.range(), week());
    assert_eq!(api.list_count(), 1);

    // The optimistic move survives and still confirms normally.
    assert_eq!(board.board().task_ids(&employee("bob")), vec!["t1"]);
    board.confirm_move(pending).await.unwrap();
    assert_eq!(board.board().task_ids(&employee("bob")), vec!["t1"]);
    assert_eq!(board.board(), board.confirmed_board());
    assert_eq!(api.list_count(), 2);
    assert!(!notes.recv().await.unwrap().is_error());

    board.load().await.unwrap();
}

#[rstest]
#[case::unknown_task("t9", "alice")]
#[case::wrong_assignee("t1", "bob")]
#[tokio::test]
async fn test_invalid_move_leaves_board(#[case] task_id: &str, #[case] from: &str) {
    let api = alice_t1_t2();
    let (mut board, _) = board_with(&api, Duration::from_secs(5)).await;
    let before = board.board().clone();

    let err = board
        .begin_move(MoveRequest {
            task_id: task_id.parse().unwrap(),
            from: employee(from),
            to: employee("carol"),
            window: window(9, 10),
        })
        .unwrap_err();
    assert!(matches!(
        err,
        SyncError::Board(BoardError::TaskNotFound { .. })
    ));
    assert_eq!(board.board(), &before);
    assert!(!board.has_pending_move());
}

#[tokio::test]
async fn test_rebalance_success_refetches() {
    let api = alice_t1_t2();
    let result = RebalanceResult {
        tasks_moved: 1,
        tasks_reassigned: 1,
        no_employee_overworked: true,
        all_conflicts_resolved: true,
    };
    api.set_rebalance_outcome(result, vec![task("t1", "alice", 8), task("t2", "bob", 11)]);
    let (mut board, notifier) = board_with(&api, Duration::from_secs(5)).await;
    let mut notes = notifier.subscribe();

    let coordinator = RebalanceCoordinator::new();
    let mut status = coordinator.subscribe();
    assert_eq!(coordinator.status(), RebalanceStatus::Idle);

    let outcome = coordinator.request_rebalance(&mut board).await.unwrap();
    assert_eq!(outcome, result);
    assert_eq!(coordinator.status(), RebalanceStatus::Completed(result));
    assert!(status.has_changed().unwrap());

    assert_eq!(board.board().task_ids(&employee("alice")), vec!["t1"]);
    assert_eq!(board.board().task_ids(&employee("bob")), vec!["t2"]);
    assert!(!notes.recv().await.unwrap().is_error());
}

#[tokio::test]
async fn test_rebalance_failure_leaves_board() {
    let api = alice_t1_t2();
    api.fail_rebalance(500, "solver crashed");
    let (mut board, notifier) = board_with(&api, Duration::from_secs(5)).await;
    let mut notes = notifier.subscribe();
    let before = board.board().clone();

    let coordinator = RebalanceCoordinator::new();
    assert!(coordinator.request_rebalance(&mut board).await.is_err());

    assert_eq!(coordinator.status(), RebalanceStatus::Failed);
    assert_eq!(board.board(), &before);
    assert_eq!(api.list_count(), 1);

    let note = notes.recv().await.unwrap();
    assert!(note.is_error());
    assert!(notes.try_recv().is_err());
}

#[tokio::test]
async fn test_rebalance_refused_with_pending_move() {
    let api = alice_t1_t2();
    let (mut board, _) = board_with(&api, Duration::from_secs(5)).await;
    let _pending = board.begin_move(move_t1_to_bob()).unwrap();

    let coordinator = RebalanceCoordinator::new();
    let err = coordinator.request_rebalance(&mut board).await.unwrap_err();
    assert!(matches!(err, SyncError::Board(BoardError::MovePending)));
    assert_eq!(coordinator.status(), RebalanceStatus::Idle);
    assert!(!api.calls().contains(&ScheduleCall::AutoBalance));
}

#[tokio::test]
async fn test_cancelled_rebalance_resets_status() {
    let api = alice_t1_t2();
    api.delay_mutations(Duration::from_secs(5));
    let (mut board, _) = board_with(&api, Duration::from_secs(10)).await;

    let coordinator = RebalanceCoordinator::new();
    let mut status = coordinator.subscribe();
    tokio::select! {
        _ = coordinator.request_rebalance(&mut board) => panic!("rebalance finished early"),
        _ = status.wait_for(RebalanceStatus::is_processing) => {}
    }

    assert_eq!(coordinator.status(), RebalanceStatus::Idle);
}

#[tokio::test]
async fn test_set_range_filters_tasks() {
    let api = alice_t1_t2();
    let (mut board, _) = board_with(&api, Duration::from_secs(5)).await;
    let next_week = DateRange::week_of(NaiveDate::from_ymd_opt(2025, 11, 11).unwrap());

    board.set_range(next_week).await.unwrap();
    assert_eq!(board.range(), next_week);
    assert!(board.board().is_empty());
    assert_eq!(board.board().assignees().count(), 2);
}

#[test]
fn test_board_from_empty_task_list() {
    let board = ScheduleBoard::from_tasks(Vec::new()).unwrap();
    assert!(board.groups().is_empty());
}
