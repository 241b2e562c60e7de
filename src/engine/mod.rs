//! Pure puzzle engine: generation, validation, and scoring.

/// Date-seeded puzzle generation.
pub mod generator;
/// Point values for solves.
pub mod scoring;
/// Guess parsing and answer checking.
pub mod validator;
