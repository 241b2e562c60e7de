//! Guess parsing and answer checking.

use thiserror::Error;

use super::generator::Puzzle;

/// Shown when a guess is not a number.
pub const MSG_NOT_A_NUMBER: &str = "Please enter a valid number.";
/// Shown on a correct answer.
pub const MSG_CORRECT: &str = "Perfect logic!";
/// Shown on a wrong answer.
pub const MSG_INCORRECT: &str = "Not quite, try another path.";

/// Malformed caller input. Never mutates state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    /// Guess text did not parse as a number.
    #[error("guess is not a number")]
    NotANumber,
    /// A required payload field was absent.
    #[error("missing field `{0}`")]
    MissingField(&'static str),
    /// A payload field that must be numeric was not.
    #[error("field `{0}` is not numeric")]
    NonNumeric(&'static str),
    /// A timestamp field did not parse as RFC 3339.
    #[error("field `{0}` is not a valid timestamp")]
    InvalidTimestamp(&'static str),
}

/// Outcome of checking a guess. `valid` is authoritative; `message` is for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validation {
    /// True iff the guess equals the answer exactly.
    pub valid: bool,
    /// Human-readable feedback.
    pub message: String,
}

impl Validation {
    fn accepted() -> Self {
        Self {
            valid: true,
            message: MSG_CORRECT.to_string(),
        }
    }

    fn rejected(message: &str) -> Self {
        Self {
            valid: false,
            message: message.to_string(),
        }
    }
}

/// Parses raw guess text. Surrounding whitespace is ignored.
pub fn parse_guess(raw: &str) -> Result<f64, InputError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(InputError::NotANumber);
    }
    match trimmed.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(InputError::NotANumber),
    }
}

/// Checks raw guess text against `puzzle`.
pub fn validate(puzzle: &Puzzle, raw_guess: &str) -> Validation {
    match parse_guess(raw_guess) {
        Ok(value) => validate_number(puzzle, value),
        Err(_) => Validation::rejected(MSG_NOT_A_NUMBER),
    }
}

/// Checks an already-numeric guess. Exact match only, no rounding.
pub fn validate_number(puzzle: &Puzzle, guess: f64) -> Validation {
    if !guess.is_finite() {
        return Validation::rejected(MSG_NOT_A_NUMBER);
    }
    if guess.fract() == 0.0 && guess == puzzle.answer as f64 {
        Validation::accepted()
    } else {
        Validation::rejected(MSG_INCORRECT)
    }
}
