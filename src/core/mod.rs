//! In-memory session state machine for one calendar day of play.

/// Daily game session: phases, guesses, hints, and solve planning.
pub mod session;
