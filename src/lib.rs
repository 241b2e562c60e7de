//! Deterministic daily logic puzzles with local-first progress and queued score sync.
//!
//! # Examples
//!
//! Pure puzzle engine:
//! ```
//! use logicloop::engine::{generator::generate, scoring::score, validator::validate};
//!
//! let puzzle = generate("2026-02-10".parse().expect("date"));
//! assert_eq!(puzzle.id, "p-2026-02-10");
//! assert!(validate(&puzzle, &puzzle.answer.to_string()).valid);
//! assert_eq!(score(true, false, 10, 2), 270);
//! ```
//!
//! Runtime usage with a SQLite store and an in-process ledger:
//! ```no_run
//! use std::sync::Arc;
//!
//! use logicloop::{
//!     persist::{shared, sqlite::SqliteLocalStore},
//!     runtime::handle::{spawn_game, GameConfig, GuessOutcome},
//!     server::ledger::{LedgerRemote, ScoreLedger},
//!     types::SystemClock,
//! };
//!
//! # #[tokio::main]
//! # async fn main() {
//! let store = shared(Box::new(SqliteLocalStore::open("logicloop.db").expect("open sqlite")));
//! let clock = Arc::new(SystemClock);
//! let remote = Arc::new(LedgerRemote::new(
//!     ScoreLedger::open("ledger.db").expect("open ledger"),
//!     clock.clone(),
//! ));
//! let game = spawn_game(store, remote, clock, GameConfig::default());
//! let report = game.bootstrap().await.expect("bootstrap");
//! if let Ok(GuessOutcome::Solved { score, .. }) =
//!     game.submit_guess(report.puzzle.answer.to_string()).await
//! {
//!     println!("solved for {score} points");
//! }
//! game.shutdown().await.expect("shutdown");
//! # }
//! ```
#![deny(missing_docs)]

/// Daily session state machine.
pub mod core;
/// Puzzle generation, validation, and scoring.
pub mod engine;
/// Local persistence abstraction and SQLite implementation.
pub mod persist;
/// Progress, streak, and sync-queue records.
pub mod progress;
/// Single-writer game runtime and events.
pub mod runtime;
/// Server-side score ledger and rate limiting.
pub mod server;
/// Outbound score sync.
pub mod sync;
/// Shared primitive types and the clock seam.
pub mod types;
