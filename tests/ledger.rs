use chrono::{NaiveDate, TimeZone, Utc};
use serde_json::json;
use tempfile::TempDir;

use logicloop::{
    engine::validator::InputError,
    server::ledger::{LEADERBOARD_LIMIT, LedgerError, STATS_RECENT, ScoreLedger, ScoreSubmission},
    types::Timestamp,
};

fn now() -> Timestamp {
    Utc.with_ymd_and_hms(2026, 2, 10, 18, 0, 0).single().expect("ts")
}

fn day(s: &str) -> NaiveDate {
    s.parse().expect("date")
}

fn submission(user: &str, score: i64, time_taken: i64, solved_at: &str) -> ScoreSubmission {
    ScoreSubmission {
        user_id: Some(user.to_string()),
        puzzle_id: Some(format!("p-{}", &solved_at[..10])),
        score: json!(score),
        time_taken: json!(time_taken),
        solved_at: Some(solved_at.to_string()),
    }
}

#[test]
fn resubmitting_the_same_day_overwrites() {
    let mut ledger = ScoreLedger::open_in_memory().expect("ledger");
    let first = ledger
        .submit(&submission("ava", 150, 40, "2026-02-10T08:00:00Z"), now())
        .expect("first");
    let second = ledger
        .submit(&submission("ava", 210, 25, "2026-02-10T23:59:59Z"), now())
        .expect("second");

    assert_eq!(first.id, second.id);
    assert_eq!(second.date, day("2026-02-10"));
    assert_eq!(second.score, 210);

    let board = ledger.leaderboard(day("2026-02-10"), LEADERBOARD_LIMIT).expect("board");
    assert_eq!(board.len(), 1);
    assert_eq!(board[0].score, 210);
    assert_eq!(board[0].time_taken, 25);
}

#[test]
fn solved_at_is_truncated_to_its_utc_day() {
    let mut ledger = ScoreLedger::open_in_memory().expect("ledger");
    // 23:30 at -05:00 is already the next UTC day.
    let row = ledger
        .submit(&submission("ava", 100, 10, "2026-02-10T23:30:00-05:00"), now())
        .expect("submit");
    assert_eq!(row.date, day("2026-02-11"));

    let mut missing = submission("noah", 100, 10, "2026-02-01T00:00:00Z");
    missing.solved_at = None;
    let row = ledger.submit(&missing, now()).expect("defaults to now");
    assert_eq!(row.date, day("2026-02-10"));
}

#[test]
fn invalid_submissions_are_rejected_individually() {
    let mut ledger = ScoreLedger::open_in_memory().expect("ledger");

    let mut no_user = submission("ava", 100, 10, "2026-02-10T08:00:00Z");
    no_user.user_id = Some(String::new());
    assert!(matches!(
        ledger.submit(&no_user, now()),
        Err(LedgerError::Input(InputError::MissingField("userId")))
    ));

    let mut text_score = submission("ava", 100, 10, "2026-02-10T08:00:00Z");
    text_score.score = json!("lots");
    assert!(matches!(
        ledger.submit(&text_score, now()),
        Err(LedgerError::Input(InputError::NonNumeric("score")))
    ));

    let bad_time = submission("ava", 100, 10, "yesterday-ish");
    assert!(matches!(
        ledger.submit(&bad_time, now()),
        Err(LedgerError::Input(InputError::InvalidTimestamp("solvedAt")))
    ));
}

#[test]
fn batch_skips_invalid_records_and_reports_processed() {
    let mut ledger = ScoreLedger::open_in_memory().expect("ledger");
    let mut broken = submission("mia", 90, 10, "2026-02-10T08:00:00Z");
    broken.puzzle_id = None;

    let batch = vec![
        submission("ava", 150, 40, "2026-02-10T08:00:00Z"),
        broken,
        submission("noah", 120, 30, "2026-02-10T09:00:00Z"),
    ];
    assert_eq!(ledger.submit_batch(&batch, now()).expect("batch"), 2);
    // Replaying the batch changes nothing.
    assert_eq!(ledger.submit_batch(&batch, now()).expect("replay"), 2);

    let board = ledger.leaderboard(day("2026-02-10"), LEADERBOARD_LIMIT).expect("board");
    let users: Vec<&str> = board.iter().map(|e| e.user_id.as_str()).collect();
    assert_eq!(users, vec!["ava", "noah"]);

    assert!(matches!(
        ledger.submit_batch(&[], now()),
        Err(LedgerError::Input(InputError::MissingField("records")))
    ));
}

#[test]
fn batch_payload_parses_from_wire_json() {
    let raw = r#"[
        {"userId": "ava", "puzzleId": "p-2026-02-10", "score": 170, "timeTaken": 10, "solvedAt": "2026-02-10T09:00:10Z"},
        {"userId": "noah", "puzzleId": "p-2026-02-10", "score": "170", "timeTaken": 10}
    ]"#;
    let batch: Vec<ScoreSubmission> = serde_json::from_str(raw).expect("parse");
    let mut ledger = ScoreLedger::open_in_memory().expect("ledger");
    assert_eq!(ledger.submit_batch(&batch, now()).expect("batch"), 1);
}

#[test]
fn leaderboard_orders_by_score_then_time_and_ranks() {
    let mut ledger = ScoreLedger::open_in_memory().expect("ledger");
    let batch = vec![
        submission("slow@example.com", 200, 60, "2026-02-10T08:00:00Z"),
        submission("fast", 200, 20, "2026-02-10T08:00:00Z"),
        submission("top", 300, 90, "2026-02-10T08:00:00Z"),
        submission("other-day", 999, 1, "2026-02-09T08:00:00Z"),
    ];
    ledger.submit_batch(&batch, now()).expect("batch");

    let board = ledger.leaderboard(day("2026-02-10"), LEADERBOARD_LIMIT).expect("board");
    let ordered: Vec<(usize, &str)> = board.iter().map(|e| (e.rank, e.user_id.as_str())).collect();
    assert_eq!(
        ordered,
        vec![(1, "top"), (2, "fast"), (3, "slow@example.com")]
    );
    assert_eq!(board[2].display_name, "slow@example.com");
    assert_eq!(board[0].display_name, "Anonymous");

    let limited = ledger.leaderboard(day("2026-02-10"), 2).expect("limited");
    assert_eq!(limited.len(), 2);
    assert!(ledger.leaderboard(day("2026-02-11"), 10).expect("empty").is_empty());
}

#[test]
fn user_stats_average_recent_history() {
    let mut ledger = ScoreLedger::open_in_memory().expect("ledger");
    let batch: Vec<ScoreSubmission> = (1..=12)
        .map(|d| submission("ava", 100 + d, d, &format!("2026-01-{d:02}T10:00:00Z")))
        .collect();
    ledger.submit_batch(&batch, now()).expect("batch");

    let stats = ledger.user_stats("ava").expect("stats").expect("known user");
    assert_eq!(stats.puzzles_solved, 12);
    // Mean of 1..=12 is 6.5, rounded away from zero.
    assert_eq!(stats.avg_solve_time, 7);
    assert_eq!(stats.recent_scores.len(), STATS_RECENT);
    assert_eq!(stats.recent_scores[0].date, day("2026-01-12"));
    assert_eq!(stats.email, None);

    assert!(ledger.user_stats("nobody").expect("stats").is_none());
}

#[test]
fn update_streak_touches_known_users_only() {
    let mut ledger = ScoreLedger::open_in_memory().expect("ledger");
    ledger
        .submit(&submission("ava", 150, 40, "2026-02-10T08:00:00Z"), now())
        .expect("submit");

    assert!(ledger.update_streak("ava", 6, Some(now()), Some(900)).expect("update"));
    assert!(!ledger.update_streak("ghost", 1, None, None).expect("unknown"));

    // Missing fields keep their stored values.
    assert!(ledger.update_streak("ava", 7, None, None).expect("update"));
    let stats = ledger.user_stats("ava").expect("stats").expect("known");
    assert_eq!(stats.streak_count, 7);
    assert_eq!(stats.total_points, 900);
    assert_eq!(stats.last_played, Some(now()));

    let board = ledger.leaderboard(day("2026-02-10"), 10).expect("board");
    assert_eq!(board[0].streak, 7);
}

#[test]
fn ledger_persists_across_reopen() {
    let tmp = TempDir::new().expect("tmp");
    let path = tmp.path().join("ledger.db");
    {
        let mut ledger = ScoreLedger::open(&path).expect("open");
        ledger
            .submit(&submission("ava", 150, 40, "2026-02-10T08:00:00Z"), now())
            .expect("submit");
    }
    let ledger = ScoreLedger::open(&path).expect("reopen");
    assert_eq!(ledger.leaderboard(day("2026-02-10"), 10).expect("board").len(), 1);
}
