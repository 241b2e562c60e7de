//! Point values for solves.

/// Points per difficulty level.
const BASE_PER_DIFFICULTY: i64 = 100;
/// Seconds under which each second saved is worth a point.
const SPEED_WINDOW_SEC: i64 = 80;
/// Flat deduction once a hint has been used.
pub const HINT_PENALTY: i64 = 30;
/// Any genuine solve earns at least this much.
pub const MIN_SOLVE_SCORE: u32 = 25;

/// Scores a solve attempt. Unsolved attempts are worth nothing.
pub fn score(solved: bool, hint_used: bool, duration_sec: u64, difficulty: u8) -> u32 {
    if !solved {
        return 0;
    }

    let base = i64::from(difficulty) * BASE_PER_DIFFICULTY;
    let duration = i64::try_from(duration_sec).unwrap_or(i64::MAX);
    let speed_bonus = (SPEED_WINDOW_SEC - duration).max(0);
    let hint_penalty = if hint_used { HINT_PENALTY } else { 0 };

    let total = (base + speed_bonus - hint_penalty).max(i64::from(MIN_SOLVE_SCORE));
    u32::try_from(total).unwrap_or(u32::MAX)
}
