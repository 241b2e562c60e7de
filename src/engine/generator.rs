//! Date-seeded puzzle generation.
//!
//! A puzzle is a pure function of its UTC calendar day: the day is formatted as
//! `YYYY-MM-DD`, hashed with SHA-256, and fixed hex windows of the digest drive
//! the puzzle type and every per-type parameter.

use std::fmt;

use chrono::Datelike;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::types::CalendarDay;

/// Days per difficulty step (a 365-day year split into five ramps).
const DAYS_PER_DIFFICULTY: u32 = 73;
/// Highest difficulty.
pub const MAX_DIFFICULTY: u8 = 5;

/// Enumerated puzzle kinds, in seed-selection order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PuzzleType {
    /// Sum a generated digit sequence.
    #[serde(rename = "Number Matrix")]
    NumberMatrix,
    /// Count even values in a generated list.
    #[serde(rename = "Pattern Matching")]
    PatternMatching,
    /// Next term of an arithmetic progression.
    #[serde(rename = "Sequence Solver")]
    SequenceSolver,
    /// Cyclic-shift lookup over a small mapping.
    #[serde(rename = "Deduction Grid")]
    DeductionGrid,
    /// `(A AND B) OR C` over three derived bits.
    #[serde(rename = "Binary Logic")]
    BinaryLogic,
}

impl PuzzleType {
    /// All types in selection order.
    pub const ALL: [PuzzleType; 5] = [
        PuzzleType::NumberMatrix,
        PuzzleType::PatternMatching,
        PuzzleType::SequenceSolver,
        PuzzleType::DeductionGrid,
        PuzzleType::BinaryLogic,
    ];

    /// Display name.
    pub fn name(self) -> &'static str {
        match self {
            PuzzleType::NumberMatrix => "Number Matrix",
            PuzzleType::PatternMatching => "Pattern Matching",
            PuzzleType::SequenceSolver => "Sequence Solver",
            PuzzleType::DeductionGrid => "Deduction Grid",
            PuzzleType::BinaryLogic => "Binary Logic",
        }
    }
}

impl fmt::Display for PuzzleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Fully derived daily puzzle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Puzzle {
    /// `p-<date>`.
    pub id: String,
    /// Calendar day this puzzle belongs to.
    pub date: CalendarDay,
    /// Puzzle kind.
    #[serde(rename = "type")]
    pub puzzle_type: PuzzleType,
    /// 1 through 5.
    pub difficulty: u8,
    /// Expected integer answer.
    pub answer: i64,
    /// Human-readable question.
    pub prompt: String,
    /// Seconds allowed.
    pub time_limit: u32,
}

/// Common shape every per-type builder returns.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Payload {
    prompt: String,
    answer: i64,
}

/// Hex digest of the day seed, read through fixed windows.
struct SeedDigest {
    hex: String,
}

impl SeedDigest {
    fn of(seed: &str) -> Self {
        Self {
            hex: hex::encode(Sha256::digest(seed.as_bytes())),
        }
    }

    /// Interprets `len` hex characters starting at `start` as an integer.
    fn window(&self, start: usize, len: usize) -> u64 {
        self.hex
            .get(start..start + len)
            .and_then(|slice| u64::from_str_radix(slice, 16).ok())
            .unwrap_or(0)
    }
}

/// Seed string for `date`.
pub fn seed_for(date: CalendarDay) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Difficulty ramp over day-of-year (1-based ordinal).
pub fn difficulty_for(date: CalendarDay) -> u8 {
    let step = date.ordinal() / DAYS_PER_DIFFICULTY + 1;
    step.min(u32::from(MAX_DIFFICULTY)) as u8
}

/// Seconds allowed for a puzzle of `difficulty`.
pub fn time_limit_for(difficulty: u8) -> u32 {
    45 + u32::from(difficulty) * 20
}

/// Builds the puzzle for `date`.
///
/// Callers normalize to the UTC calendar day first; the same day always yields
/// the same puzzle on every host.
pub fn generate(date: CalendarDay) -> Puzzle {
    let seed = seed_for(date);
    let digest = SeedDigest::of(&seed);
    let difficulty = difficulty_for(date);
    let puzzle_type = PuzzleType::ALL[(digest.window(0, 4) % PuzzleType::ALL.len() as u64) as usize];

    let payload = match puzzle_type {
        PuzzleType::NumberMatrix => number_matrix(&digest, difficulty),
        PuzzleType::PatternMatching => pattern_matching(&digest, difficulty),
        PuzzleType::SequenceSolver => sequence_solver(&digest, difficulty),
        PuzzleType::DeductionGrid => deduction_grid(&digest),
        PuzzleType::BinaryLogic => binary_logic(&digest),
    };

    Puzzle {
        id: format!("p-{seed}"),
        date,
        puzzle_type,
        difficulty,
        answer: payload.answer,
        prompt: payload.prompt,
        time_limit: time_limit_for(difficulty),
    }
}

fn join(values: &[i64], sep: &str) -> String {
    values
        .iter()
        .map(i64::to_string)
        .collect::<Vec<_>>()
        .join(sep)
}

fn number_matrix(digest: &SeedDigest, difficulty: u8) -> Payload {
    let len = 4 + usize::from(difficulty);
    let values: Vec<i64> = (0..len)
        .map(|i| (digest.window(i * 2, 6) % 9 + 1) as i64)
        .collect();
    Payload {
        prompt: format!(
            "Add the sequence values to unlock today's loop: {}",
            join(&values, " + ")
        ),
        answer: values.iter().sum(),
    }
}

fn pattern_matching(digest: &SeedDigest, difficulty: u8) -> Payload {
    let len = 4 + usize::from(difficulty);
    let items: Vec<i64> = (0..len)
        .map(|i| (digest.window(i * 3, 3) % 9 + 1) as i64)
        .collect();
    Payload {
        prompt: format!("Count how many even numbers appear: {}", join(&items, ", ")),
        answer: items.iter().filter(|v| *v % 2 == 0).count() as i64,
    }
}

fn sequence_solver(digest: &SeedDigest, difficulty: u8) -> Payload {
    let base = (digest.window(7, 3) % 5 + 2) as i64;
    let step = (digest.window(11, 3) % 4 + 1) as i64;
    let len = 3 + i64::from(difficulty);
    let terms: Vec<i64> = (0..len).map(|i| base + i * step).collect();
    let last = terms.last().copied().unwrap_or(base);
    Payload {
        prompt: format!(
            "Find the next number in the sequence: {}, ?",
            join(&terms, ", ")
        ),
        answer: last + step,
    }
}

fn deduction_grid(digest: &SeedDigest) -> Payload {
    const PEOPLE: [&str; 3] = ["Ava", "Noah", "Mia"];
    const PETS: [&str; 3] = ["Cat", "Dog", "Bird"];

    let shift = (digest.window(9, 2) % PETS.len() as u64) as usize;
    let mapping = PEOPLE
        .iter()
        .enumerate()
        .map(|(i, person)| format!("{person}→{}", PETS[(i + shift) % PETS.len()]))
        .collect::<Vec<_>>()
        .join(", ");
    Payload {
        prompt: format!(
            "If mapping is {mapping}, what is Ava's pet position in [Cat,Dog,Bird]?"
        ),
        answer: shift as i64 + 1,
    }
}

fn binary_logic(digest: &SeedDigest) -> Payload {
    let a = digest.window(4, 2) % 2;
    let b = digest.window(6, 2) % 2;
    let c = digest.window(8, 2) % 2;
    Payload {
        prompt: format!("Evaluate (A AND B) OR C for A={a}, B={b}, C={c}."),
        answer: ((a & b) | c) as i64,
    }
}
