//! Runtime event stream payloads.

use crate::{sync::SyncStatus, types::CalendarDay};

/// Events emitted from the game runtime and its sync worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameEvent {
    /// Bootstrap finished, possibly with some reads failed.
    Bootstrapped {
        /// Puzzle day now in play.
        date: CalendarDay,
        /// True when today's solve was restored from storage.
        already_solved: bool,
        /// Number of reads that failed.
        failed_reads: usize,
    },
    /// A guess was checked and rejected.
    GuessRejected,
    /// A solve became durable.
    Solved {
        /// Solved day.
        date: CalendarDay,
        /// Points awarded.
        score: u32,
        /// Streak after the solve.
        streak: u32,
    },
    /// A hint was spent.
    HintUsed {
        /// Hints left today.
        remaining: u32,
    },
    /// Sync worker state changed.
    SyncStatusChanged(SyncStatus),
    /// A flush removed this many entries from the queue.
    Synced {
        /// Entries acknowledged.
        count: usize,
    },
}
