//! Integration tests for the life planner
//!
//! These tests drive a full `Planner` (store, session, hydration, sync queue)
//! against in-memory and SQLite remotes.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use lifeplanner::domain::{PlannerEntry, UserId};
use lifeplanner::{
    Authenticator, Credentials, MemoryRemote, NoticeTone, Planner, PlannerOptions, RemoteStore, SessionError,
    SessionFile, SignUp, SqliteRemote, StepCatalog, Transition, WeeklyError, WeeklyPlanForm, WriteOutcome,
};
use tempfile::TempDir;

fn options(resume_position: bool) -> PlannerOptions {
    PlannerOptions {
        resume_position,
        queue_capacity: 64,
        notice_ttl: Duration::from_millis(3000),
        goal_cache_path: None,
    }
}

fn planner_with(remote: Arc<MemoryRemote>, resume_position: bool) -> Planner {
    let store: Arc<dyn RemoteStore> = remote.clone();
    let auth: Arc<dyn Authenticator> = remote;
    Planner::new(StepCatalog::builtin(), Some(store), Some(auth), options(resume_position))
}

fn values(pairs: &[(&str, &str)]) -> PlannerEntry {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

fn week(week_of_month: u32, focus: &str) -> WeeklyPlanForm {
    WeeklyPlanForm {
        year: 2025,
        month: 3,
        week_of_month,
        focus: focus.to_string(),
        wins: "Shipped v1\nHired lead eng\n\n".to_string(),
        schedule_notes: String::new(),
    }
}

// =============================================================================
// Session Tests
// =============================================================================

#[tokio::test]
async fn test_sign_out_resets_flow() {
    let remote = Arc::new(MemoryRemote::new());
    let planner = planner_with(remote, false);
    planner
        .sign_up(&SignUp::new("sam@example.com", "secret", "secret"))
        .await
        .expect("sign up");

    planner.flow().submit(values(&[("commitment_author", "Sam")]));
    planner.flow().submit(values(&[("vision_self", "Calm")]));
    assert_eq!(planner.state().current_step_index(), 2);

    planner.sign_out().await;

    let state = planner.state().snapshot();
    assert!(state.entries.is_empty());
    assert!(state.weekly_plans.is_empty());
    assert_eq!(state.current_step_index, 0);
    assert!(planner.session().current_user().is_none());
    assert!(planner.hydration().is_ready());
    planner.shutdown().await;
}

#[tokio::test]
async fn test_mismatched_confirm_password_is_rejected_before_backend() {
    let remote = Arc::new(MemoryRemote::new());
    let planner = planner_with(remote.clone(), false);

    let err = planner
        .sign_up(&SignUp::new("sam@example.com", "secret", "secrets"))
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::PasswordMismatch));
    assert_eq!(err.to_string(), "Passwords must match.");

    // No account was created
    let sign_in = planner.sign_in(&Credentials::new("sam@example.com", "secret")).await;
    assert!(matches!(sign_in, Err(SessionError::InvalidCredentials)));
    planner.shutdown().await;
}

#[tokio::test]
async fn test_sign_in_hydrates_previous_work() {
    let remote = Arc::new(MemoryRemote::new());

    let first = planner_with(remote.clone(), true);
    first
        .sign_up(&SignUp::new("sam@example.com", "secret", "secret"))
        .await
        .expect("sign up");
    first.flow().submit(values(&[("commitment_author", "Sam")]));
    first.flow().submit(values(&[("vision_self", "Calm")]));
    first.weekly().save(&week(1, "Ship")).expect("save week");
    first.shutdown().await;

    let second = planner_with(remote, true);
    assert!(second.state().entries().is_empty());
    second
        .sign_in(&Credentials::new("SAM@example.com ", "secret"))
        .await
        .expect("sign in");

    let state = second.state().snapshot();
    assert_eq!(state.entries.len(), 2);
    assert_eq!(state.entries["commitment"]["commitment_author"], "Sam");
    assert!(state.weekly_plans.contains_key("2025-3-1"));
    // Position restored from the remote
    assert_eq!(state.current_step_index, 2);
    assert_eq!(second.flow().progress().max_reachable_index, 2);
    second.shutdown().await;
}

#[tokio::test]
async fn test_switching_users_never_mixes_state() {
    let remote = Arc::new(MemoryRemote::new());
    let (u1, u2) = (UserId::new("u1"), UserId::new("u2"));
    remote
        .upsert_entry(&u1, "commitment", &values(&[("x", "1")]), chrono::Utc::now())
        .await
        .expect("seed u1");
    remote
        .upsert_entry(&u2, "vision", &values(&[("x", "2")]), chrono::Utc::now())
        .await
        .expect("seed u2");

    let planner = planner_with(remote, false);
    planner.session().set_user(Some(u1));
    planner.session().set_user(Some(u2.clone()));
    planner.ready().await;

    let entries = planner.state().entries();
    assert_eq!(planner.hydration().readiness().user, Some(u2));
    assert!(entries.contains_key("vision"));
    assert!(!entries.contains_key("commitment"));
    planner.shutdown().await;
}

#[tokio::test]
async fn test_switching_users_resets_step_index() {
    let remote = Arc::new(MemoryRemote::new());
    let planner = planner_with(remote, true);
    planner.restore(UserId::new("u1")).await;
    for _ in 0..5 {
        planner.flow().submit(values(&[("x", "1")]));
    }
    assert_eq!(planner.state().current_step_index(), 5);

    planner.restore(UserId::new("u2")).await;
    let progress = planner.flow().progress();
    assert!(planner.state().entries().is_empty());
    assert_eq!(planner.state().current_step_index(), 0);
    assert_eq!(progress.max_reachable_index, 0);
    assert!(!progress.can_navigate_to(5));
    planner.shutdown().await;
}

#[tokio::test]
async fn test_entries_for_unknown_steps_are_not_hydrated() {
    let remote = Arc::new(MemoryRemote::new());
    let user = UserId::new("u1");
    remote
        .upsert_entry(&user, "retired-step", &values(&[("x", "1")]), chrono::Utc::now())
        .await
        .expect("seed retired step");

    let planner = planner_with(remote, false);
    planner.restore(user).await;
    assert!(planner.state().entries().is_empty());
    assert_eq!(planner.flow().progress().max_reachable_index, 0);
    planner.shutdown().await;
}

// =============================================================================
// Flow Tests
// =============================================================================

#[tokio::test]
async fn test_remote_failure_surfaces_notice_without_rollback() {
    let remote = Arc::new(MemoryRemote::new());
    let planner = planner_with(remote.clone(), false);
    planner.restore(UserId::new("u1")).await;
    let mut notices = planner.subscribe_notices();

    remote.set_offline(true);
    let outcome = planner.flow().submit(values(&[("commitment_author", "Sam")]));
    assert_eq!(outcome.transition, Transition::Advance(1));
    assert!(outcome.ticket.settled().await.is_err());

    let notice = notices.recv().await.expect("notice");
    assert_eq!(notice.tone, NoticeTone::Error);
    assert_eq!(notice.message, "Something went wrong while saving. Please try again.");
    assert_eq!(planner.state().current_step_index(), 1);
    assert!(planner.state().entries().contains_key("commitment"));

    // Re-submitting the step retries the remote write
    remote.set_offline(false);
    planner.flow().navigate(0).expect("navigate back");
    let retry = planner.flow().submit(values(&[("commitment_letter", "Dear me")]));
    assert_eq!(retry.ticket.settled().await.expect("retry"), WriteOutcome::Persisted);

    let stored = remote.fetch_entries(&UserId::new("u1")).await.expect("fetch");
    // The merged entry reaches the remote
    assert_eq!(stored["commitment"]["commitment_author"], "Sam");
    assert_eq!(stored["commitment"]["commitment_letter"], "Dear me");
    planner.shutdown().await;
}

#[tokio::test]
async fn test_full_flow_completes_local_only() {
    let planner = Planner::new(StepCatalog::builtin(), None, None, options(true));
    planner.ready().await;

    let step_count = planner.catalog().len();
    let mut last = None;
    for _ in 0..step_count {
        let outcome = planner.flow().submit(values(&[]));
        assert_eq!(outcome.ticket.settled().await.expect("local only"), WriteOutcome::LocalOnly);
        last = Some(outcome.transition);
    }

    assert_eq!(last, Some(Transition::Complete));
    let summary = planner.dashboard();
    assert_eq!(summary.progress_percent, 100);
    assert!(summary.is_complete);
    planner.shutdown().await;
}

// =============================================================================
// Weekly Plan Tests
// =============================================================================

#[tokio::test]
async fn test_weekly_plans_upsert_and_delete() {
    let remote = Arc::new(MemoryRemote::new());
    let planner = planner_with(remote.clone(), false);
    let weekly = planner.weekly();

    // Signed out: saving works locally, deleting needs an account
    weekly.save(&week(1, "Draft")).expect("save");
    assert!(matches!(weekly.request_delete("2025-3-1"), Err(WeeklyError::SignInRequired)));

    planner.restore(UserId::new("u1")).await;
    let tickets = vec![
        weekly.save(&week(1, "first")).expect("save").ticket,
        weekly.save(&week(1, "second")).expect("save").ticket,
        weekly.save(&week(2, "other")).expect("save").ticket,
    ];
    for result in join_all(tickets.into_iter().map(|t| t.settled())).await {
        assert_eq!(result.expect("upsert"), WriteOutcome::Persisted);
    }

    let plans = weekly.list();
    assert_eq!(plans.len(), 2);
    assert_eq!(plans[0].id, "2025-3-2");
    assert_eq!(plans[1].focus, "second");
    assert_eq!(plans[1].wins, vec!["Shipped v1", "Hired lead eng"]);

    weekly.request_delete("2025-3-1").expect("request delete");
    weekly.confirm_delete().await.expect("delete");
    assert_eq!(weekly.list().len(), 1);
    let remote_plans = remote.fetch_weekly_plans(&UserId::new("u1")).await.expect("fetch");
    assert!(!remote_plans.contains_key("2025-3-1"));
    planner.shutdown().await;
}

// =============================================================================
// SQLite Tests
// =============================================================================

#[tokio::test]
async fn test_sqlite_session_survives_restart() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = temp_dir.path().join("planner.db");
    let session_file = SessionFile::new(temp_dir.path().join("session.json"));

    let open = |options: PlannerOptions| {
        let sqlite = Arc::new(SqliteRemote::open(&db_path).expect("open sqlite"));
        let store: Arc<dyn RemoteStore> = sqlite.clone();
        let auth: Arc<dyn Authenticator> = sqlite;
        Planner::new(StepCatalog::builtin(), Some(store), Some(auth), options)
    };
    let mut opts = options(true);
    opts.goal_cache_path = Some(temp_dir.path().join("goal-scores.json"));

    {
        let planner = open(opts.clone());
        let user = planner
            .sign_up(&SignUp::new("sam@example.com", "secret", "secret"))
            .await
            .expect("sign up");
        session_file.save(&user).expect("save session");
        planner.flow().submit(values(&[("commitment_author", "Sam")]));
        planner.goals().set("goal_self", 9).expect("rate goal");
        planner.shutdown().await;
    }

    let planner = open(opts);
    let user = session_file.load().expect("load session").expect("stored user");
    planner.restore(user).await;

    assert!(planner.state().entries().contains_key("commitment"));
    assert_eq!(planner.state().current_step_index(), 1);
    assert_eq!(planner.goals().get("goal_self"), 9);

    planner.sign_out().await;
    assert!(planner.state().entries().is_empty());
    assert_eq!(planner.state().current_step_index(), 0);
    planner.shutdown().await;
}
