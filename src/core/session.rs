use std::collections::BTreeMap;

use thiserror::Error;

use crate::{
    engine::{
        generator::{Puzzle, generate},
        scoring::score,
        validator::{Validation, validate},
    },
    persist::{PersistError, PersistResult, SolveCommit},
    progress::{ProgressRecord, StreakState, SyncRecord},
    sync::SyncStatus,
    types::{CalendarDay, Timestamp},
};

/// Feedback after bootstrapping an already-solved day.
pub const MSG_ALREADY_SOLVED: &str = "Already solved today. Come back tomorrow for a fresh loop!";
/// Feedback when a correct solve could not be saved.
pub const MSG_SAVE_FAILED: &str = "Couldn't save your solve. Please submit again.";

/// Where the day's session stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Spawned, nothing loaded yet.
    Idle,
    /// Stored state is being read.
    Bootstrapping,
    /// Ready for guesses and hints.
    AwaitingGuess,
    /// Terminal for the calendar day.
    Solved,
}

/// Operation not valid in the current phase. Always a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StateError {
    /// Bootstrap has not finished.
    #[error("session has not been bootstrapped")]
    NotReady,
    /// The day is over for scoring.
    #[error("today's puzzle is already solved")]
    AlreadySolved,
    /// Today's hint budget is spent.
    #[error("no hints remaining")]
    NoHintsRemaining,
}

/// Which bootstrap read failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapPart {
    /// Today's progress record.
    TodayProgress,
    /// Streak aggregate.
    Streak,
    /// Full progress history.
    History,
}

/// One failed bootstrap read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapFailure {
    /// Which read failed.
    pub part: BootstrapPart,
    /// Rendered storage error.
    pub error: String,
}

/// Independent results of the bootstrap reads.
#[derive(Debug)]
pub struct BootstrapLoads {
    /// Progress stored for the puzzle's day.
    pub today: PersistResult<Option<ProgressRecord>>,
    /// Stored streak aggregate.
    pub streak: PersistResult<Option<StreakState>>,
    /// Every stored progress record.
    pub history: PersistResult<Vec<ProgressRecord>>,
}

/// What bootstrap managed to restore.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapReport {
    /// Puzzle now in play.
    pub puzzle: Puzzle,
    /// True when the day was found solved.
    pub already_solved: bool,
    /// Empty when every read succeeded.
    pub failures: Vec<BootstrapFailure>,
}

/// Result of spending a hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HintOutcome {
    /// Hints left today.
    pub remaining: u32,
}

/// Read-only snapshot for rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameView {
    /// Current phase.
    pub phase: Phase,
    /// Puzzle in play.
    pub puzzle: Puzzle,
    /// Last message for the player.
    pub feedback: String,
    /// Points for today; 0 until solved.
    pub score: u32,
    /// Sticky once a hint is spent.
    pub hint_used: bool,
    /// Hints left today.
    pub hints_remaining: u32,
    /// Start of today's solve timer.
    pub started_at: Timestamp,
    /// Streak aggregate as last loaded or saved.
    pub streak: StreakState,
    /// Heatmap source, ordered by date.
    pub history: BTreeMap<CalendarDay, ProgressRecord>,
    /// Outbound sync state.
    pub sync_status: SyncStatus,
}

impl GameView {
    /// True once today is solved.
    pub fn solved(&self) -> bool {
        self.phase == Phase::Solved
    }
}

/// One player's state for one calendar day. Performs no I/O.
#[derive(Debug, Clone)]
pub struct GameSession {
    phase: Phase,
    puzzle: Puzzle,
    feedback: String,
    score: u32,
    hint_used: bool,
    hints_per_day: u32,
    hints_remaining: u32,
    started_at: Timestamp,
    streak: StreakState,
    streak_loaded: bool,
    /// Today's stored progress has been read, or the day was solved here.
    today_loaded: bool,
    /// Survives re-bootstraps until the calendar day rolls over.
    day_solved: bool,
    history: BTreeMap<CalendarDay, ProgressRecord>,
    sync_status: SyncStatus,
}

impl GameSession {
    /// Idle session for `today` whose solve timer starts at `now`.
    pub fn new(today: CalendarDay, now: Timestamp, hints_per_day: u32) -> Self {
        Self {
            phase: Phase::Idle,
            puzzle: generate(today),
            feedback: String::new(),
            score: 0,
            hint_used: false,
            hints_per_day,
            hints_remaining: hints_per_day,
            started_at: now,
            streak: StreakState::default(),
            streak_loaded: false,
            today_loaded: false,
            day_solved: false,
            history: BTreeMap::new(),
            sync_status: SyncStatus::Idle,
        }
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Puzzle in play.
    pub fn puzzle(&self) -> &Puzzle {
        &self.puzzle
    }

    /// True once the stored streak has been read.
    pub fn streak_loaded(&self) -> bool {
        self.streak_loaded
    }

    /// False until today's stored progress is known. A solve must not be
    /// committed before then, or an already-solved day could score twice.
    pub fn today_loaded(&self) -> bool {
        self.today_loaded
    }

    /// Switches to `today`'s puzzle if the calendar day has rolled over.
    /// Returns true when the day changed.
    pub fn roll_over(&mut self, today: CalendarDay, now: Timestamp) -> bool {
        if self.puzzle.date == today {
            return false;
        }
        self.puzzle = generate(today);
        self.feedback.clear();
        self.score = 0;
        self.hint_used = false;
        self.hints_remaining = self.hints_per_day;
        self.started_at = now;
        self.today_loaded = false;
        self.day_solved = false;
        if self.phase == Phase::Solved {
            self.phase = Phase::AwaitingGuess;
        }
        true
    }

    /// Rolls over if needed and enters [`Phase::Bootstrapping`].
    pub fn begin_bootstrap(&mut self, today: CalendarDay, now: Timestamp) {
        self.roll_over(today, now);
        self.phase = Phase::Bootstrapping;
    }

    /// Applies whatever loaded; each failed read is reported, not fatal.
    ///
    /// A day already solved in this session stays solved even if today's read
    /// fails, and a loaded history can stand in for a failed today read.
    pub fn finish_bootstrap(&mut self, loads: BootstrapLoads) -> BootstrapReport {
        let mut failures = Vec::new();
        let mut already_solved = self.day_solved;

        match loads.today {
            Ok(Some(record)) if record.solved && record.date == self.puzzle.date => {
                self.restore_solved(record);
                already_solved = true;
            }
            Ok(_) => self.today_loaded = true,
            Err(err) => failures.push(failure(BootstrapPart::TodayProgress, err)),
        }

        match loads.streak {
            Ok(state) => self.set_streak(state.unwrap_or_default()),
            Err(err) => failures.push(failure(BootstrapPart::Streak, err)),
        }

        match loads.history {
            Ok(records) => {
                for record in records {
                    self.history.insert(record.date, record);
                }
                if !already_solved {
                    let stored = self
                        .history
                        .get(&self.puzzle.date)
                        .filter(|r| r.solved)
                        .cloned();
                    if let Some(record) = stored {
                        self.restore_solved(record);
                        already_solved = true;
                    }
                }
            }
            Err(err) => failures.push(failure(BootstrapPart::History, err)),
        }

        if already_solved {
            self.feedback = MSG_ALREADY_SOLVED.to_string();
            self.phase = Phase::Solved;
        } else {
            self.phase = Phase::AwaitingGuess;
        }

        BootstrapReport {
            puzzle: self.puzzle.clone(),
            already_solved,
            failures,
        }
    }

    fn restore_solved(&mut self, record: ProgressRecord) {
        self.score = record.score;
        self.hint_used = record.hint_used;
        self.today_loaded = true;
        self.day_solved = true;
        self.history.insert(record.date, record);
    }

    /// Applies a late read of today's progress, taken before committing a solve.
    ///
    /// A solved record for today ends the day; the guess is refused.
    pub fn apply_today_progress(&mut self, record: Option<ProgressRecord>) -> Result<(), StateError> {
        self.today_loaded = true;
        match record {
            Some(record) if record.solved && record.date == self.puzzle.date => {
                self.restore_solved(record);
                self.feedback = MSG_ALREADY_SOLVED.to_string();
                self.phase = Phase::Solved;
                Err(StateError::AlreadySolved)
            }
            _ => Ok(()),
        }
    }

    /// Replaces the streak with a freshly read value.
    pub fn set_streak(&mut self, state: StreakState) {
        self.streak = state;
        self.streak_loaded = true;
    }

    fn ensure_playable(&self) -> Result<(), StateError> {
        match self.phase {
            Phase::AwaitingGuess => Ok(()),
            Phase::Solved => Err(StateError::AlreadySolved),
            Phase::Idle | Phase::Bootstrapping => Err(StateError::NotReady),
        }
    }

    /// Validates a guess. A wrong guess only updates feedback.
    pub fn check_guess(&mut self, raw_guess: &str) -> Result<Validation, StateError> {
        self.ensure_playable()?;
        let result = validate(&self.puzzle, raw_guess);
        if !result.valid {
            self.feedback = result.message.clone();
        }
        Ok(result)
    }

    /// Builds the writes for a correct guess at `now`. Does not change state.
    pub fn plan_solve(&self, now: Timestamp, user_id: &str, solved_count: u64) -> SolveCommit {
        let duration_sec = u64::try_from((now - self.started_at).num_seconds()).unwrap_or(0);
        let points = score(true, self.hint_used, duration_sec, self.puzzle.difficulty);

        let progress = ProgressRecord {
            date: self.puzzle.date,
            puzzle_id: self.puzzle.id.clone(),
            solved: true,
            score: points,
            duration_sec,
            hint_used: self.hint_used,
            completed_at: now,
        };
        let sync = SyncRecord {
            user_id: user_id.to_string(),
            puzzle_id: progress.puzzle_id.clone(),
            score: points,
            time_taken: duration_sec,
            solved_at: now,
        };

        SolveCommit {
            streak: self.streak.after_solve(now, points),
            solved_count: solved_count.saturating_add(1),
            progress,
            sync,
        }
    }

    /// Marks the day solved once `commit` is durable.
    pub fn confirm_solve(&mut self, commit: &SolveCommit, message: &str) {
        self.phase = Phase::Solved;
        self.today_loaded = true;
        self.day_solved = true;
        self.score = commit.progress.score;
        self.feedback = message.to_string();
        self.streak = commit.streak.clone();
        self.history
            .insert(commit.progress.date, commit.progress.clone());
    }

    /// Leaves the session unsolved after a failed save.
    pub fn record_save_failure(&mut self, _err: &PersistError) {
        self.feedback = MSG_SAVE_FAILED.to_string();
    }

    /// Spends a hint. Using any hint marks the day as hinted for good.
    pub fn trigger_hint(&mut self) -> Result<HintOutcome, StateError> {
        self.ensure_playable()?;
        if self.hints_remaining == 0 {
            return Err(StateError::NoHintsRemaining);
        }
        self.hints_remaining -= 1;
        self.hint_used = true;
        let answer = self.puzzle.answer;
        self.feedback = format!(
            "Hint: the answer is between {} and {}.",
            answer - 4,
            answer + 4
        );
        Ok(HintOutcome {
            remaining: self.hints_remaining,
        })
    }

    /// Records the sync worker's latest state.
    pub fn set_sync_status(&mut self, status: SyncStatus) {
        self.sync_status = status;
    }

    /// Snapshot for rendering.
    pub fn view(&self) -> GameView {
        GameView {
            phase: self.phase,
            puzzle: self.puzzle.clone(),
            feedback: self.feedback.clone(),
            score: self.score,
            hint_used: self.hint_used,
            hints_remaining: self.hints_remaining,
            started_at: self.started_at,
            streak: self.streak.clone(),
            history: self.history.clone(),
            sync_status: self.sync_status,
        }
    }
}

fn failure(part: BootstrapPart, err: PersistError) -> BootstrapFailure {
    BootstrapFailure {
        part,
        error: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::*;
    use crate::engine::validator::{MSG_CORRECT, MSG_INCORRECT};

    fn t0() -> Timestamp {
        Utc.with_ymd_and_hms(2026, 2, 10, 9, 0, 0).single().expect("ts")
    }

    fn ready_session() -> GameSession {
        let mut s = GameSession::new(t0().date_naive(), t0(), 2);
        s.begin_bootstrap(t0().date_naive(), t0());
        s.finish_bootstrap(BootstrapLoads {
            today: Ok(None),
            streak: Ok(None),
            history: Ok(Vec::new()),
        });
        s
    }

    #[test]
    fn guess_before_bootstrap_is_not_ready() {
        let mut s = GameSession::new(t0().date_naive(), t0(), 2);
        assert_eq!(s.check_guess("1"), Err(StateError::NotReady));
        assert_eq!(s.trigger_hint(), Err(StateError::NotReady));
    }

    #[test]
    fn wrong_guess_only_touches_feedback() {
        let mut s = ready_session();
        let before = s.view();
        let wrong = (s.puzzle().answer + 1).to_string();
        let v = s.check_guess(&wrong).expect("playable");
        assert!(!v.valid);
        let after = s.view();
        assert_eq!(after.feedback, MSG_INCORRECT);
        assert_eq!(after.phase, before.phase);
        assert_eq!(after.score, before.score);
        assert_eq!(after.streak, before.streak);
    }

    #[test]
    fn plan_then_confirm_solves_for_the_day() {
        let mut s = ready_session();
        let answer = s.puzzle().answer.to_string();
        assert!(s.check_guess(&answer).expect("playable").valid);

        let now = t0() + Duration::seconds(10);
        let commit = s.plan_solve(now, "local-player", 4);
        // 2026-02-10 is difficulty 1: 100 + (80 - 10).
        assert_eq!(commit.progress.score, 170);
        assert_eq!(commit.progress.duration_sec, 10);
        assert_eq!(commit.solved_count, 5);
        assert_eq!(commit.streak.streak, 1);
        assert_eq!(commit.sync.time_taken, 10);
        assert_eq!(s.phase(), Phase::AwaitingGuess);

        s.confirm_solve(&commit, MSG_CORRECT);
        assert_eq!(s.phase(), Phase::Solved);
        assert_eq!(s.check_guess(&answer), Err(StateError::AlreadySolved));
        assert_eq!(s.trigger_hint(), Err(StateError::AlreadySolved));
        assert!(s.view().history.contains_key(&t0().date_naive()));
    }

    #[test]
    fn hints_are_sticky_and_bounded() {
        let mut s = ready_session();
        assert_eq!(s.trigger_hint(), Ok(HintOutcome { remaining: 1 }));
        assert!(s.view().feedback.starts_with("Hint: the answer is between"));
        assert_eq!(s.trigger_hint(), Ok(HintOutcome { remaining: 0 }));
        assert_eq!(s.trigger_hint(), Err(StateError::NoHintsRemaining));
        assert!(s.view().hint_used);

        let commit = s.plan_solve(t0() + Duration::seconds(10), "p", 0);
        assert_eq!(commit.progress.score, 140);
        assert!(commit.progress.hint_used);
    }

    #[test]
    fn bootstrap_restores_solved_day() {
        let mut s = GameSession::new(t0().date_naive(), t0(), 2);
        s.begin_bootstrap(t0().date_naive(), t0());
        let record = ProgressRecord {
            date: t0().date_naive(),
            puzzle_id: "p-2026-02-10".to_string(),
            solved: true,
            score: 155,
            duration_sec: 25,
            hint_used: false,
            completed_at: t0(),
        };
        let report = s.finish_bootstrap(BootstrapLoads {
            today: Ok(Some(record)),
            streak: Ok(Some(StreakState {
                streak: 6,
                last_played: Some(t0()),
                total_points: 2000,
            })),
            history: Ok(Vec::new()),
        });
        assert!(report.already_solved);
        assert!(report.failures.is_empty());
        let view = s.view();
        assert_eq!(view.phase, Phase::Solved);
        assert_eq!(view.score, 155);
        assert_eq!(view.feedback, MSG_ALREADY_SOLVED);
        assert_eq!(view.streak.streak, 6);
        assert_eq!(view.history.len(), 1);
    }

    #[test]
    fn partial_bootstrap_keeps_what_loaded() {
        let mut s = GameSession::new(t0().date_naive(), t0(), 2);
        s.begin_bootstrap(t0().date_naive(), t0());
        let report = s.finish_bootstrap(BootstrapLoads {
            today: Ok(None),
            streak: Err(PersistError::Unavailable("disk".to_string())),
            history: Ok(Vec::new()),
        });
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].part, BootstrapPart::Streak);
        assert_eq!(s.phase(), Phase::AwaitingGuess);
        assert!(!s.streak_loaded());
    }

    fn solved_record() -> ProgressRecord {
        ProgressRecord {
            date: t0().date_naive(),
            puzzle_id: "p-2026-02-10".to_string(),
            solved: true,
            score: 170,
            duration_sec: 10,
            hint_used: false,
            completed_at: t0(),
        }
    }

    fn all_failed() -> BootstrapLoads {
        BootstrapLoads {
            today: Err(PersistError::Unavailable("disk".to_string())),
            streak: Ok(None),
            history: Err(PersistError::Unavailable("disk".to_string())),
        }
    }

    #[test]
    fn failed_today_read_does_not_reopen_solved_day() {
        let mut s = ready_session();
        let commit = s.plan_solve(t0() + Duration::seconds(10), "p", 0);
        s.confirm_solve(&commit, MSG_CORRECT);

        s.begin_bootstrap(t0().date_naive(), t0());
        let report = s.finish_bootstrap(all_failed());
        assert!(report.already_solved);
        assert_eq!(s.phase(), Phase::Solved);
        assert_eq!(s.check_guess("1"), Err(StateError::AlreadySolved));
    }

    #[test]
    fn loaded_history_marks_day_solved_when_today_read_fails() {
        let mut s = GameSession::new(t0().date_naive(), t0(), 2);
        s.begin_bootstrap(t0().date_naive(), t0());
        let report = s.finish_bootstrap(BootstrapLoads {
            today: Err(PersistError::Unavailable("disk".to_string())),
            streak: Ok(None),
            history: Ok(vec![solved_record()]),
        });
        assert!(report.already_solved);
        assert_eq!(s.phase(), Phase::Solved);
        assert_eq!(s.view().score, 170);
        assert!(s.today_loaded());
    }

    #[test]
    fn late_today_read_refuses_stored_solve() {
        let mut s = GameSession::new(t0().date_naive(), t0(), 2);
        s.begin_bootstrap(t0().date_naive(), t0());
        s.finish_bootstrap(all_failed());
        assert!(!s.today_loaded());
        assert_eq!(s.phase(), Phase::AwaitingGuess);

        assert_eq!(
            s.apply_today_progress(Some(solved_record())),
            Err(StateError::AlreadySolved)
        );
        assert_eq!(s.phase(), Phase::Solved);
        assert_eq!(s.view().feedback, MSG_ALREADY_SOLVED);

        let mut fresh = GameSession::new(t0().date_naive(), t0(), 2);
        fresh.begin_bootstrap(t0().date_naive(), t0());
        fresh.finish_bootstrap(all_failed());
        assert_eq!(fresh.apply_today_progress(None), Ok(()));
        assert!(fresh.today_loaded());
        assert_eq!(fresh.phase(), Phase::AwaitingGuess);
    }

    #[test]
    fn roll_over_resets_daily_state() {
        let mut s = ready_session();
        s.trigger_hint().expect("hint");
        let tomorrow = t0() + Duration::days(1);
        assert!(!s.roll_over(t0().date_naive(), t0()));
        assert!(s.roll_over(tomorrow.date_naive(), tomorrow));
        let view = s.view();
        assert_eq!(view.puzzle.id, "p-2026-02-11");
        assert!(!view.hint_used);
        assert_eq!(view.hints_remaining, 2);
        assert_eq!(view.started_at, tomorrow);
    }
}
