//src/models.rs
use chrono::Utc;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

/// Identifier shared by programs, exercises, sets and history sessions.
/// Values are derived from the millisecond clock.
pub type Id = u64;

#[derive(
    Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ProgressionType {
    /// Fixed 3x12 goal, weight goes up once all three sets reach 12 reps.
    Linear,
    /// Reps climb from 8 towards 10, then weight goes up and reps reset.
    Double,
}

#[derive(
    Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum SetType {
    #[default]
    Normal,
    Warmup,
    Dropset,
}

/// Editable scalar fields of a draft set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum SetField {
    Weight,
    Reps,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Target {
    pub weight: Option<f64>,
    pub sets: u32,
    pub reps: u32,
    pub text: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Exercise {
    pub id: Id,
    pub name: String,
    #[serde(default)]
    pub next_target: Option<Target>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Program {
    pub id: Id,
    pub name: String,
    pub progression_type: ProgressionType,
    #[serde(default)]
    pub exercises: Vec<Exercise>,
}

impl Program {
    #[must_use]
    pub fn exercise(&self, exercise_id: Id) -> Option<&Exercise> {
        self.exercises.iter().find(|ex| ex.id == exercise_id)
    }

    pub fn exercise_mut(&mut self, exercise_id: Id) -> Option<&mut Exercise> {
        self.exercises.iter_mut().find(|ex| ex.id == exercise_id)
    }
}

/// A committed set. Validation state never reaches history.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SetRecord {
    pub id: Id,
    #[serde(rename = "type", default)]
    pub set_type: SetType,
    pub weight: f64,
    pub reps: u32,
}

impl SetRecord {
    #[must_use]
    pub const fn is_normal(&self) -> bool {
        matches!(self.set_type, SetType::Normal)
    }
}

/// Keeps only working sets, preserving recorded order.
#[must_use]
pub fn normal_sets(sets: &[SetRecord]) -> Vec<SetRecord> {
    sets.iter().filter(|s| s.is_normal()).cloned().collect()
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExerciseResult {
    pub exercise_id: Id,
    pub exercise_name: String,
    pub sets: Vec<SetRecord>,
}

impl ExerciseResult {
    #[must_use]
    pub fn normal_sets(&self) -> Vec<SetRecord> {
        normal_sets(&self.sets)
    }

    /// Renders working sets as `"12x20kg, 10x22.5kg"`.
    #[must_use]
    pub fn sets_summary(&self, weight_label: &str) -> String {
        self.sets
            .iter()
            .filter(|s| s.is_normal())
            .map(|s| format!("{}x{}{weight_label}", s.reps, s.weight))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkoutSession {
    pub id: Id,
    /// Local time, `%Y-%m-%d %H:%M:%S`. Sorts lexicographically.
    pub date: String,
    pub program_id: Id,
    pub program_name: String,
    pub exercises: Vec<ExerciseResult>,
}

impl WorkoutSession {
    #[must_use]
    pub fn exercise_result(&self, exercise_id: Id) -> Option<&ExerciseResult> {
        self.exercises.iter().find(|e| e.exercise_id == exercise_id)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct AppState {
    pub programs: Vec<Program>,
    pub workout_history: Vec<WorkoutSession>,
    pub user_setup_complete: bool,
    pub active_program_id: Option<Id>,
}

impl AppState {
    #[must_use]
    pub fn active_program(&self) -> Option<&Program> {
        let active_id = self.active_program_id?;
        self.program_by_id(active_id)
    }

    pub fn active_program_mut(&mut self) -> Option<&mut Program> {
        let active_id = self.active_program_id?;
        self.program_by_id_mut(active_id)
    }

    #[must_use]
    pub fn program_by_id(&self, program_id: Id) -> Option<&Program> {
        self.programs.iter().find(|p| p.id == program_id)
    }

    pub fn program_by_id_mut(&mut self, program_id: Id) -> Option<&mut Program> {
        self.programs.iter_mut().find(|p| p.id == program_id)
    }

    /// Searches every program. Returns the owning program id alongside the exercise.
    #[must_use]
    pub fn find_exercise_by_id(&self, exercise_id: Id) -> Option<(Id, &Exercise)> {
        self.programs
            .iter()
            .find_map(|p| p.exercise(exercise_id).map(|ex| (p.id, ex)))
    }

    /// Most recent recorded result for the exercise, scanning history newest-first.
    #[must_use]
    pub fn last_workout_for_exercise(&self, exercise_id: Id) -> Option<&ExerciseResult> {
        self.workout_history
            .iter()
            .rev()
            .find_map(|session| session.exercise_result(exercise_id))
    }

    #[must_use]
    pub fn history_newest_first(&self) -> Vec<WorkoutSession> {
        let mut history = self.workout_history.clone();
        history.sort_by(|a, b| b.date.cmp(&a.date));
        history
    }

    /// Largest id in use anywhere in the state, 0 when empty.
    #[must_use]
    pub fn max_id(&self) -> Id {
        let program_ids = self
            .programs
            .iter()
            .flat_map(|p| std::iter::once(p.id).chain(p.exercises.iter().map(|ex| ex.id)));
        let history_ids = self.workout_history.iter().flat_map(|s| {
            std::iter::once(s.id).chain(
                s.exercises
                    .iter()
                    .flat_map(|e| e.sets.iter().map(|set| set.id)),
            )
        });
        program_ids.chain(history_ids).max().unwrap_or(0)
    }
}

/// Hands out unique, strictly increasing ids based on the millisecond clock.
#[derive(Debug, Default, Clone)]
pub struct IdGenerator {
    last: Id,
}

impl IdGenerator {
    #[must_use]
    pub const fn seeded(last: Id) -> Self {
        Self { last }
    }

    pub fn next_id(&mut self) -> Id {
        let now = Id::try_from(Utc::now().timestamp_millis()).unwrap_or_default();
        let id = now.max(self.last + 1);
        self.last = id;
        id
    }
}
