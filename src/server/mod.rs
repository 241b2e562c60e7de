//! Server-side collaborators: the idempotent score ledger and request rate limiting.

/// Daily score ledger, leaderboard, and per-user stats.
pub mod ledger;
/// Fixed-window rate limiter.
pub mod rate_limit;
