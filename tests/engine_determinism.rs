use chrono::{Datelike, NaiveDate};
use hashbrown::HashSet;
use proptest::prelude::*;

use logicloop::engine::{
    generator::{PuzzleType, generate, time_limit_for},
    scoring::{MIN_SOLVE_SCORE, score},
    validator::{validate, validate_number},
};

fn day(s: &str) -> NaiveDate {
    s.parse().expect("date")
}

fn date_strategy() -> impl Strategy<Value = NaiveDate> {
    (1970i32..2200, 1u32..=366).prop_filter_map("valid ordinal", |(y, o)| NaiveDate::from_yo_opt(y, o))
}

fn days_of_year(year: i32) -> Vec<NaiveDate> {
    (1..=366)
        .filter_map(|o| NaiveDate::from_yo_opt(year, o))
        .collect()
}

#[test]
fn pinned_puzzle_for_2026_02_10() {
    let p = generate(day("2026-02-10"));
    assert_eq!(p.id, "p-2026-02-10");
    assert_eq!(p.date, day("2026-02-10"));
    assert_eq!(p.puzzle_type, PuzzleType::SequenceSolver);
    assert_eq!(p.difficulty, 1);
    assert_eq!(p.answer, 9);
    assert_eq!(p.prompt, "Find the next number in the sequence: 5, 6, 7, 8, ?");
    assert_eq!(p.time_limit, 65);
    assert_eq!(generate(day("2026-02-10")), p);
}

#[test]
fn pinned_puzzles_cover_every_type() {
    let pattern = generate(day("2026-02-11"));
    assert_eq!(pattern.puzzle_type, PuzzleType::PatternMatching);
    assert_eq!(pattern.prompt, "Count how many even numbers appear: 5, 7, 6, 3, 4");
    assert_eq!(pattern.answer, 2);

    let grid = generate(day("2026-12-31"));
    assert_eq!(grid.puzzle_type, PuzzleType::DeductionGrid);
    assert_eq!(grid.difficulty, 5);
    assert_eq!(
        grid.prompt,
        "If mapping is Ava→Bird, Noah→Cat, Mia→Dog, what is Ava's pet position in [Cat,Dog,Bird]?"
    );
    assert_eq!(grid.answer, 3);
    assert_eq!(grid.time_limit, 145);

    let logic = generate(day("2026-07-04"));
    assert_eq!(logic.puzzle_type, PuzzleType::BinaryLogic);
    assert_eq!(logic.difficulty, 3);
    assert_eq!(logic.answer, 1);

    let matrix = generate(day("2026-01-12"));
    assert_eq!(matrix.puzzle_type, PuzzleType::NumberMatrix);
    assert_eq!(
        matrix.prompt,
        "Add the sequence values to unlock today's loop: 1 + 3 + 9 + 5 + 2"
    );
    assert_eq!(matrix.answer, 20);
}

#[test]
fn puzzle_serializes_with_wire_field_names() {
    let json = serde_json::to_value(generate(day("2026-02-10"))).expect("json");
    assert_eq!(json["type"], "Sequence Solver");
    assert_eq!(json["timeLimit"], 65);
    assert_eq!(json["date"], "2026-02-10");
}

#[test]
fn ids_are_unique_within_a_year() {
    let days = days_of_year(2026);
    let ids: HashSet<String> = days.iter().map(|d| generate(*d).id).collect();
    assert_eq!(ids.len(), days.len());
}

#[test]
fn difficulty_and_time_limit_never_decrease_through_a_year() {
    for year in [2024, 2026] {
        let puzzles: Vec<_> = days_of_year(year).into_iter().map(generate).collect();
        for pair in puzzles.windows(2) {
            assert!(pair[0].difficulty <= pair[1].difficulty);
            assert!(pair[0].time_limit <= pair[1].time_limit);
        }
        assert_eq!(puzzles.first().map(|p| p.difficulty), Some(1));
        assert_eq!(puzzles.last().map(|p| p.difficulty), Some(5));
    }
}

#[test]
fn time_limit_is_monotonic_in_difficulty() {
    for d in 1..5u8 {
        assert!(time_limit_for(d) < time_limit_for(d + 1));
    }
}

proptest! {
    #[test]
    fn generation_is_a_function_of_the_date(date in date_strategy()) {
        let a = generate(date);
        let b = generate(date);
        prop_assert_eq!(&a, &b);
        prop_assert_eq!(a.id, format!("p-{}", date.format("%Y-%m-%d")));
        prop_assert!((1..=5).contains(&a.difficulty));
        prop_assert_eq!(a.time_limit, 45 + u32::from(a.difficulty) * 20);
        prop_assert_eq!(u32::from(a.difficulty), (date.ordinal() / 73 + 1).min(5));
    }

    #[test]
    fn only_the_exact_answer_validates(date in date_strategy()) {
        let p = generate(date);
        prop_assert!(validate(&p, &p.answer.to_string()).valid);
        prop_assert!(validate_number(&p, p.answer as f64).valid);
        prop_assert!(!validate(&p, &(p.answer + 1).to_string()).valid);
        prop_assert!(!validate(&p, "not a number").valid);
        prop_assert!(!validate_number(&p, p.answer as f64 + 0.5).valid);
    }

    #[test]
    fn scoring_properties(duration in 0u64..10_000, difficulty in 1u8..=5, hint in any::<bool>()) {
        prop_assert_eq!(score(false, hint, duration, difficulty), 0);
        prop_assert!(score(true, hint, duration, difficulty) >= MIN_SOLVE_SCORE);
        prop_assert!(score(true, true, duration, difficulty) < score(true, false, duration, difficulty));
    }

    #[test]
    fn faster_solves_score_higher(difficulty in 1u8..=5) {
        prop_assert!(score(true, false, 5, difficulty) > score(true, false, 40, difficulty));
    }
}
