//src/progression.rs
//! Pure progression rules: next target, goal check and one-rep-max estimate.
//!
//! Only the first three working sets of a session count towards progression.
use crate::models::{normal_sets, Exercise, ProgressionType, SetRecord, Target};

pub const TARGET_SETS: u32 = 3;
pub const LINEAR_GOAL_REPS: u32 = 12;
pub const DOUBLE_BASE_REPS: u32 = 8;
const DOUBLE_TOP_REPS: u32 = 10;
const WINDOW: usize = 3;

const LINEAR_LIGHT_STEP: f64 = 1.25;
const LINEAR_HEAVY_STEP: f64 = 2.5;
const LINEAR_HEAVY_THRESHOLD: f64 = 40.0;
const DOUBLE_STEP: f64 = 1.25;
const DOUBLE_FALLBACK_WEIGHT: f64 = 20.0;

/// Rounds to the nearest 0.25, ties to even.
fn round_to_quarter(weight: f64) -> f64 {
    (weight * 4.0).round_ties_even() / 4.0
}

fn max_weight<'a>(sets: impl IntoIterator<Item = &'a SetRecord>) -> Option<f64> {
    sets.into_iter().map(|s| s.weight).reduce(f64::max)
}

fn positive(weight: f64) -> Option<f64> {
    (weight > 0.0).then_some(weight)
}

fn default_target(progression_type: ProgressionType) -> Target {
    let reps = match progression_type {
        ProgressionType::Linear => LINEAR_GOAL_REPS,
        ProgressionType::Double => DOUBLE_BASE_REPS,
    };
    Target {
        weight: None,
        sets: TARGET_SETS,
        reps,
        text: format!("{TARGET_SETS} sets of {reps} reps at max weight"),
    }
}

fn linear_target(weight: Option<f64>) -> Target {
    Target {
        weight,
        sets: TARGET_SETS,
        reps: LINEAR_GOAL_REPS,
        text: format!("{TARGET_SETS} sets of {LINEAR_GOAL_REPS} reps"),
    }
}

fn double_target(weight: f64, reps: u32) -> Target {
    Target {
        weight: Some(weight),
        sets: TARGET_SETS,
        reps,
        text: format!("{TARGET_SETS} sets x {reps} reps"),
    }
}

/// Computes the target for the next session from the last recorded sets.
///
/// `last_workout` may include non-working sets; they are ignored.
#[must_use]
pub fn calculate_next_target(
    exercise: &Exercise,
    last_workout: Option<&[SetRecord]>,
    progression_type: ProgressionType,
) -> Target {
    let working = last_workout.map(normal_sets).unwrap_or_default();
    if working.is_empty() {
        return default_target(progression_type);
    }

    match progression_type {
        ProgressionType::Linear => next_linear(&working),
        ProgressionType::Double => next_double(exercise, &working),
    }
}

fn next_linear(working: &[SetRecord]) -> Target {
    let first_three = &working[..working.len().min(WINDOW)];

    // Not enough data to progress: hold at the heaviest weight seen.
    if first_three.len() < WINDOW {
        return linear_target(max_weight(first_three).and_then(positive));
    }

    let all_hit_goal = first_three.iter().all(|s| s.reps >= LINEAR_GOAL_REPS);
    if all_hit_goal {
        let heaviest = max_weight(first_three).unwrap_or_default();
        let lightest = first_three
            .iter()
            .map(|s| s.weight)
            .reduce(f64::min)
            .unwrap_or_default();

        let new_weight = if (heaviest - lightest).abs() < 1e-9 {
            let step = if heaviest > LINEAR_HEAVY_THRESHOLD {
                LINEAR_HEAVY_STEP
            } else {
                LINEAR_LIGHT_STEP
            };
            round_to_quarter(heaviest + step)
        } else {
            // Mixed weights: consolidate 3x12 at the heaviest one first.
            heaviest
        };
        return linear_target(Some(new_weight));
    }

    let target_weight = max_weight(first_three.iter().filter(|s| s.reps >= LINEAR_GOAL_REPS))
        .or_else(|| max_weight(first_three))
        .unwrap_or_default();
    linear_target(positive(target_weight))
}

/// Baseline `(weight, reps)` for double progression.
fn double_baseline(exercise: &Exercise, working: &[SetRecord]) -> (f64, u32) {
    if let Some((weight, reps)) = exercise
        .next_target
        .as_ref()
        .and_then(|t| t.weight.map(|w| (w, t.reps)))
    {
        return (weight, reps);
    }

    let weight = max_weight(working.iter().filter(|s| s.reps >= DOUBLE_BASE_REPS))
        .or_else(|| {
            let top_reps = working.iter().map(|s| s.reps).max()?;
            working
                .iter()
                .filter(|s| s.reps == top_reps)
                .map(|s| s.weight)
                .reduce(f64::min)
        })
        .unwrap_or(DOUBLE_FALLBACK_WEIGHT);
    (weight, DOUBLE_BASE_REPS)
}

fn next_double(exercise: &Exercise, working: &[SetRecord]) -> Target {
    let (base_weight, base_reps) = double_baseline(exercise, working);

    let first_three = &working[..working.len().min(WINDOW)];
    if first_three.len() < WINDOW {
        return double_target(base_weight, base_reps);
    }

    let achieved = first_three
        .iter()
        .all(|s| s.reps >= base_reps && s.weight >= base_weight);
    if !achieved {
        return double_target(base_weight, base_reps);
    }

    let min_reps = first_three
        .iter()
        .map(|s| s.reps)
        .min()
        .unwrap_or(base_reps);
    if min_reps >= DOUBLE_TOP_REPS {
        double_target(round_to_quarter(base_weight + DOUBLE_STEP), DOUBLE_BASE_REPS)
    } else {
        double_target(base_weight, min_reps + 1)
    }
}

/// Whether the first three working sets met the exercise's stored target.
///
/// An exercise without a target always counts as achieved. A target without a
/// usable weight also counts as achieved (fail-open).
#[must_use]
pub fn check_goal_achievement(
    exercise: &Exercise,
    new_working_sets: &[SetRecord],
    progression_type: ProgressionType,
) -> bool {
    let Some(target) = exercise.next_target.as_ref() else {
        return true;
    };
    let Some(target_weight) = target.weight.filter(|w| w.is_finite()) else {
        log::debug!(
            "Target for '{}' has no usable weight, treating goal as achieved",
            exercise.name
        );
        return true;
    };
    let target_reps = match progression_type {
        ProgressionType::Linear => LINEAR_GOAL_REPS,
        ProgressionType::Double => target.reps,
    };

    let sets = normal_sets(new_working_sets);
    if sets.len() < WINDOW {
        return false;
    }
    sets[..WINDOW]
        .iter()
        .all(|s| s.reps >= target_reps && s.weight >= target_weight)
}

/// Epley estimate, maximum across the given sets. 0 for an empty slice.
#[must_use]
pub fn calculate_one_rep_max(sets: &[SetRecord]) -> f64 {
    sets.iter()
        .map(|s| estimate_one_rep_max(s.weight, s.reps))
        .fold(0.0, f64::max)
}

fn estimate_one_rep_max(weight: f64, reps: u32) -> f64 {
    if reps == 0 || weight <= 0.0 {
        0.0
    } else if reps == 1 {
        weight
    } else {
        weight * (1.0 + f64::from(reps) / 30.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SetType;

    fn sets(pairs: &[(f64, u32)]) -> Vec<SetRecord> {
        pairs
            .iter()
            .enumerate()
            .map(|(i, &(weight, reps))| SetRecord {
                id: i as u64 + 1,
                set_type: SetType::Normal,
                weight,
                reps,
            })
            .collect()
    }

    fn exercise(target: Option<(Option<f64>, u32)>) -> Exercise {
        Exercise {
            id: 1,
            name: "Press".to_string(),
            next_target: target.map(|(weight, reps)| Target {
                weight,
                sets: 3,
                reps,
                text: String::new(),
            }),
        }
    }

    #[test]
    fn test_defaults_without_working_sets() {
        let ex = exercise(None);
        let linear = calculate_next_target(&ex, None, ProgressionType::Linear);
        assert_eq!((linear.weight, linear.sets, linear.reps), (None, 3, 12));

        let double = calculate_next_target(&ex, Some(&[]), ProgressionType::Double);
        assert_eq!((double.weight, double.sets, double.reps), (None, 3, 8));

        let mut warmups = sets(&[(20.0, 10)]);
        warmups[0].set_type = SetType::Warmup;
        let only_warmups = calculate_next_target(&ex, Some(&warmups), ProgressionType::Linear);
        assert_eq!(only_warmups.weight, None);
    }

    #[test]
    fn test_linear_too_few_sets_holds_max_weight() {
        let ex = exercise(None);
        let t = calculate_next_target(
            &ex,
            Some(&sets(&[(30.0, 12), (32.5, 12)])),
            ProgressionType::Linear,
        );
        assert_eq!(t.weight, Some(32.5));
        assert_eq!(t.reps, 12);

        let zero = calculate_next_target(&ex, Some(&sets(&[(0.0, 15)])), ProgressionType::Linear);
        assert_eq!(zero.weight, None);
    }

    #[test]
    fn test_linear_increments_uniform_weight() {
        let ex = exercise(None);
        let light = calculate_next_target(
            &ex,
            Some(&sets(&[(20.0, 12), (20.0, 12), (20.0, 13)])),
            ProgressionType::Linear,
        );
        assert_eq!(light.weight, Some(21.25));

        let heavy = calculate_next_target(
            &ex,
            Some(&sets(&[(50.0, 12), (50.0, 12), (50.0, 12), (10.0, 1)])),
            ProgressionType::Linear,
        );
        assert_eq!(heavy.weight, Some(52.5));
    }

    #[test]
    fn test_linear_mixed_weights_consolidate() {
        let ex = exercise(None);
        let t = calculate_next_target(
            &ex,
            Some(&sets(&[(20.0, 12), (22.5, 12), (20.0, 12)])),
            ProgressionType::Linear,
        );
        assert_eq!(t.weight, Some(22.5));
    }

    #[test]
    fn test_linear_partial_success_uses_weights_that_hit_goal() {
        let ex = exercise(None);
        let t = calculate_next_target(
            &ex,
            Some(&sets(&[(25.0, 12), (30.0, 9), (27.5, 12)])),
            ProgressionType::Linear,
        );
        assert_eq!(t.weight, Some(27.5));

        let none_hit = calculate_next_target(
            &ex,
            Some(&sets(&[(25.0, 10), (30.0, 9), (27.5, 8)])),
            ProgressionType::Linear,
        );
        assert_eq!(none_hit.weight, Some(30.0));
        assert_eq!(none_hit.reps, 12);
    }

    #[test]
    fn test_double_adds_weight_after_top_reps() {
        let ex = exercise(Some((Some(20.0), 8)));
        let t = calculate_next_target(
            &ex,
            Some(&sets(&[(20.0, 10), (20.0, 10), (20.0, 10)])),
            ProgressionType::Double,
        );
        assert_eq!(t.weight, Some(21.25));
        assert_eq!(t.reps, 8);
    }

    #[test]
    fn test_double_adds_rep_below_top_reps() {
        let ex = exercise(Some((Some(20.0), 8)));
        let t = calculate_next_target(
            &ex,
            Some(&sets(&[(20.0, 9), (20.0, 9), (20.0, 9)])),
            ProgressionType::Double,
        );
        assert_eq!(t.weight, Some(20.0));
        assert_eq!(t.reps, 10);
        assert_eq!(t.text, "3 sets x 10 reps");
    }

    #[test]
    fn test_double_missed_baseline_repeats() {
        let ex = exercise(Some((Some(40.0), 9)));
        let t = calculate_next_target(
            &ex,
            Some(&sets(&[(40.0, 9), (40.0, 8), (40.0, 9)])),
            ProgressionType::Double,
        );
        assert_eq!((t.weight, t.reps), (Some(40.0), 9));

        let short = calculate_next_target(
            &ex,
            Some(&sets(&[(40.0, 12), (40.0, 12)])),
            ProgressionType::Double,
        );
        assert_eq!((short.weight, short.reps), (Some(40.0), 9));
    }

    #[test]
    fn test_double_derives_baseline_from_history() {
        // Heaviest set with at least 8 reps becomes the baseline.
        let ex = exercise(None);
        let t = calculate_next_target(
            &ex,
            Some(&sets(&[(30.0, 8), (35.0, 6), (32.5, 8)])),
            ProgressionType::Double,
        );
        assert_eq!((t.weight, t.reps), (Some(32.5), 8));

        // No set reached 8: lightest weight among the best rep count.
        let low_reps = calculate_next_target(
            &ex,
            Some(&sets(&[(50.0, 6), (45.0, 6), (55.0, 4)])),
            ProgressionType::Double,
        );
        assert_eq!((low_reps.weight, low_reps.reps), (Some(45.0), 8));

        // A target without weight is treated as no target.
        let weightless = exercise(Some((None, 8)));
        let t = calculate_next_target(
            &weightless,
            Some(&sets(&[(30.0, 10), (30.0, 10), (30.0, 11)])),
            ProgressionType::Double,
        );
        assert_eq!((t.weight, t.reps), (Some(31.25), 8));
    }

    #[test]
    fn test_goal_without_target_is_always_achieved() {
        let ex = exercise(None);
        assert!(check_goal_achievement(&ex, &[], ProgressionType::Linear));
        assert!(check_goal_achievement(
            &ex,
            &sets(&[(1.0, 1)]),
            ProgressionType::Double
        ));
    }

    #[test]
    fn test_goal_check_uses_first_three_working_sets() {
        let linear = exercise(Some((Some(30.0), 12)));
        assert!(check_goal_achievement(
            &linear,
            &sets(&[(30.0, 12), (30.0, 12), (32.5, 12), (10.0, 1)]),
            ProgressionType::Linear
        ));
        assert!(!check_goal_achievement(
            &linear,
            &sets(&[(30.0, 12), (30.0, 11), (30.0, 12)]),
            ProgressionType::Linear
        ));
        assert!(!check_goal_achievement(
            &linear,
            &sets(&[(30.0, 12), (30.0, 12)]),
            ProgressionType::Linear
        ));

        let double = exercise(Some((Some(30.0), 9)));
        assert!(check_goal_achievement(
            &double,
            &sets(&[(30.0, 9), (30.0, 9), (30.0, 10)]),
            ProgressionType::Double
        ));
        assert!(!check_goal_achievement(
            &double,
            &sets(&[(27.5, 9), (30.0, 9), (30.0, 10)]),
            ProgressionType::Double
        ));
    }

    #[test]
    fn test_goal_check_fails_open_on_weightless_target() {
        let ex = exercise(Some((None, 12)));
        assert!(check_goal_achievement(
            &ex,
            &sets(&[(5.0, 1)]),
            ProgressionType::Linear
        ));

        let nan = exercise(Some((Some(f64::NAN), 8)));
        assert!(check_goal_achievement(&nan, &[], ProgressionType::Double));
    }

    #[test]
    fn test_one_rep_max() {
        assert_eq!(calculate_one_rep_max(&sets(&[(100.0, 1)])), 100.0);
        let est = calculate_one_rep_max(&sets(&[(100.0, 10)]));
        assert!((est - 133.333_333).abs() < 1e-3);
        assert_eq!(calculate_one_rep_max(&[]), 0.0);
        assert_eq!(calculate_one_rep_max(&sets(&[(0.0, 5), (50.0, 0)])), 0.0);
        let best = calculate_one_rep_max(&sets(&[(100.0, 1), (90.0, 6)]));
        assert!((best - 108.0).abs() < 1e-9);
    }

    #[test]
    fn test_round_to_quarter_ties_to_even() {
        assert_eq!(round_to_quarter(21.25), 21.25);
        assert_eq!(round_to_quarter(21.3), 21.25);
        // 20.125 * 4 = 80.5, which rounds to the even 80.
        assert_eq!(round_to_quarter(20.125), 20.0);
    }
}
