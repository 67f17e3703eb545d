// src/lib.rs
use anyhow::{bail, Context, Result};
use chrono::Local;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

// --- Declare modules ---
mod config;
pub mod models;
pub mod progression;
pub mod session;
pub mod storage;

// --- Expose public types ---
pub use config::{
    get_config_path as get_config_path_util, load_config as load_config_util,
    save_config as save_config_util, Config, ConfigError, Units,
};
pub use models::{
    AppState, Exercise, ExerciseResult, Id, Program, ProgressionType, SetField, SetRecord,
    SetType, Target, WorkoutSession,
};
pub use progression::{calculate_next_target, calculate_one_rep_max, check_goal_achievement};
pub use session::{DraftSet, FieldErrors, SessionState};
pub use storage::{get_data_path as get_data_path_util, Storage, StorageError};

use models::{normal_sets, IdGenerator};

pub const MAX_PROGRAM_NAME_LEN: usize = 30;
const HISTORY_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ServiceError {
    #[error("Program name is {0} characters long; the limit is {}.", MAX_PROGRAM_NAME_LEN)]
    ProgramNameTooLong(usize),
    #[error("{0} name cannot be empty.")]
    EmptyName(&'static str),
}

/// One exercise's worth of sets about to be committed.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkoutItem {
    pub exercise_id: Id,
    pub exercise_name: String,
    /// Program the exercise belongs to. Summaries resolve the exercise through it.
    pub program_id: Id,
    pub sets: Vec<SetRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryStatus {
    Success,
    Failure,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SummaryDetail {
    pub exercise_name: String,
    pub status: SummaryStatus,
    pub message: String,
    pub next_target_text: String,
    /// The target the exercise will carry after saving these sets.
    pub next_target: Target,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WorkoutSummary {
    pub all_goals_achieved: bool,
    pub details: Vec<SummaryDetail>,
}

/// Estimated one-rep-max per session, oldest first.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartSeries {
    pub labels: Vec<String>,
    pub data: Vec<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    FirstTarget,
    Achieved,
    Missed,
}

/// Shared by `save_workout` and `generate_workout_summary` so the preview always
/// shows the target that saving will store.
fn evaluate_sets(
    exercise: &Exercise,
    working_sets: &[SetRecord],
    progression_type: ProgressionType,
) -> (Outcome, Target) {
    match &exercise.next_target {
        None => (
            Outcome::FirstTarget,
            calculate_next_target(exercise, Some(working_sets), progression_type),
        ),
        Some(current) => {
            if check_goal_achievement(exercise, working_sets, progression_type) {
                (
                    Outcome::Achieved,
                    calculate_next_target(exercise, Some(working_sets), progression_type),
                )
            } else {
                (Outcome::Missed, current.clone())
            }
        }
    }
}

/// Drops sets whose weight cannot be written to the store and read back.
fn storable_items(items: &[WorkoutItem]) -> Vec<WorkoutItem> {
    items
        .iter()
        .map(|item| {
            let sets: Vec<SetRecord> = item
                .sets
                .iter()
                .filter(|s| s.weight.is_finite() && s.weight >= 0.0)
                .cloned()
                .collect();
            if sets.len() < item.sets.len() {
                log::warn!(
                    "Dropping {} set(s) with an invalid weight for '{}'",
                    item.sets.len() - sets.len(),
                    item.exercise_name
                );
            }
            WorkoutItem {
                exercise_id: item.exercise_id,
                exercise_name: item.exercise_name.clone(),
                program_id: item.program_id,
                sets,
            }
        })
        .collect()
}

fn describe_target(target: &Target, units: Units) -> String {
    match target.weight {
        Some(weight) => format!("{} at {weight} {}", target.text, units.weight_label()),
        None => target.text.clone(),
    }
}

pub struct WorkoutService {
    pub config: Config,
    pub config_path: PathBuf,
    storage: Storage,
    session: SessionState,
    ids: IdGenerator,
    load_error: Option<StorageError>,
}

impl WorkoutService {
    /// Initializes the service from the default config and data locations.
    /// # Errors
    /// Returns `anyhow::Error` if the config or data path cannot be determined or the config cannot be loaded.
    /// An unreadable store is not an error here; see [`Self::take_load_error`].
    pub fn initialize() -> Result<Self> {
        let config_path =
            config::get_config_path().context("Failed to determine configuration file path")?;
        let config = config::load_config(&config_path)
            .with_context(|| format!("Failed to load config from {config_path:?}"))?;

        let data_path = match &config.data_file {
            Some(path) => path.clone(),
            None => storage::get_data_path().context("Failed to determine data file path")?,
        };

        Ok(Self::open(config, config_path, data_path))
    }

    /// Builds a service over explicit paths and loads the store.
    pub fn open(config: Config, config_path: PathBuf, data_path: PathBuf) -> Self {
        let mut storage = Storage::new(&data_path).with_pretty(config.pretty_json);
        let load_error = storage.load().err();
        if let Some(e) = &load_error {
            log::warn!("Starting with empty data: {e}");
        }

        let state = storage.get_mut();
        if state.user_setup_complete && state.active_program().is_none() {
            state.active_program_id = state.programs.first().map(|p| p.id);
        }

        let ids = IdGenerator::seeded(storage.get().max_id());
        let mut session = SessionState::new();
        session.init_for_program(storage.get().active_program());

        Self {
            config,
            config_path,
            storage,
            session,
            ids,
            load_error,
        }
    }

    /// Returns the error hit while loading the store, if any. The service runs on defaults in that case.
    pub fn take_load_error(&mut self) -> Option<StorageError> {
        self.load_error.take()
    }

    pub fn data_path(&self) -> &Path {
        self.storage.path()
    }

    /// Sets the measurement units and saves the config.
    /// # Errors
    /// Returns `ConfigError` variants if saving fails.
    pub fn set_units(&mut self, units: Units) -> Result<(), ConfigError> {
        self.config.units = units;
        config::save_config(&self.config_path, &self.config)
    }

    fn persist(&self, action: &str) -> Result<()> {
        self.storage
            .save()
            .with_context(|| format!("Failed to save data after {action}"))
    }

    fn reseed_session(&mut self) {
        self.session.init_for_program(self.storage.get().active_program());
    }

    // --- Read accessors ---

    pub const fn state(&self) -> &AppState {
        self.storage.get()
    }

    pub fn active_program(&self) -> Option<&Program> {
        self.storage.get().active_program()
    }

    pub fn program_by_id(&self, program_id: Id) -> Option<&Program> {
        self.storage.get().program_by_id(program_id)
    }

    pub fn find_exercise_by_id(&self, exercise_id: Id) -> Option<(Id, &Exercise)> {
        self.storage.get().find_exercise_by_id(exercise_id)
    }

    pub fn list_programs(&self) -> &[Program] {
        &self.storage.get().programs
    }

    pub fn list_workout_history(&self) -> &[WorkoutSession] {
        &self.storage.get().workout_history
    }

    pub fn history_newest_first(&self) -> Vec<WorkoutSession> {
        self.storage.get().history_newest_first()
    }

    /// Working sets from the most recent workout containing the exercise,
    /// rendered as `"12x60kg, 10x62.5kg"` in the configured units.
    pub fn last_workout_summary(&self, exercise_id: Id) -> Option<String> {
        let result = self.storage.get().last_workout_for_exercise(exercise_id)?;
        let summary = result.sets_summary(self.config.units.weight_label());
        (!summary.is_empty()).then_some(summary)
    }

    pub fn current_workout_state(&self) -> BTreeMap<Id, Vec<DraftSet>> {
        self.session.snapshot()
    }

    // --- Programs ---

    /// Creates a program, makes it active and resets the draft.
    /// # Errors
    /// - `ServiceError::ProgramNameTooLong` / `ServiceError::EmptyName` on invalid names (state unchanged).
    /// - `anyhow::Error` wrapping `StorageError` if saving fails.
    pub fn create_program(&mut self, name: &str, progression_type: ProgressionType) -> Result<Id> {
        let name_len = name.chars().count();
        if name.trim().is_empty() {
            bail!(ServiceError::EmptyName("Program"));
        }
        if name_len > MAX_PROGRAM_NAME_LEN {
            bail!(ServiceError::ProgramNameTooLong(name_len));
        }

        let id = self.ids.next_id();
        let state = self.storage.get_mut();
        state.programs.push(Program {
            id,
            name: name.to_string(),
            progression_type,
            exercises: Vec::new(),
        });
        state.active_program_id = Some(id);
        log::info!("Created {progression_type} program '{name}' ({id})");

        self.reseed_session();
        self.persist("creating a program")?;
        Ok(id)
    }

    /// Deletes a program. The last remaining program can never be deleted.
    /// # Returns
    /// `false` if this is the only program or the id is unknown.
    /// # Errors
    /// Returns `anyhow::Error` wrapping `StorageError` if saving fails.
    pub fn delete_program(&mut self, program_id: Id) -> Result<bool> {
        let state = self.storage.get_mut();
        if state.programs.len() <= 1 {
            log::debug!("Refusing to delete the last program ({program_id})");
            return Ok(false);
        }
        let before = state.programs.len();
        state.programs.retain(|p| p.id != program_id);
        if state.programs.len() == before {
            return Ok(false);
        }
        if state.active_program_id == Some(program_id) {
            state.active_program_id = state.programs.first().map(|p| p.id);
        }
        log::info!("Deleted program {program_id}");

        self.persist("deleting a program")?;
        self.reseed_session();
        Ok(true)
    }

    /// Makes a program active and reseeds the draft from it.
    /// # Errors
    /// Returns `anyhow::Error` wrapping `StorageError` if saving fails.
    pub fn select_program(&mut self, program_id: Id) -> Result<bool> {
        let state = self.storage.get_mut();
        if state.program_by_id(program_id).is_none() {
            return Ok(false);
        }
        state.active_program_id = Some(program_id);
        self.reseed_session();
        self.persist("selecting a program")?;
        Ok(true)
    }

    pub fn mark_setup_complete(&mut self) -> Result<()> {
        self.storage.get_mut().user_setup_complete = true;
        self.persist("completing setup")
    }

    // --- Exercises ---

    /// Adds an exercise to the active program.
    /// # Returns
    /// The new exercise id, or `None` if no program is active.
    /// # Errors
    /// - `ServiceError::EmptyName` if the name is blank.
    /// - `anyhow::Error` wrapping `StorageError` if saving fails.
    pub fn add_exercise(&mut self, name: &str) -> Result<Option<Id>> {
        if name.trim().is_empty() {
            bail!(ServiceError::EmptyName("Exercise"));
        }
        let id = self.ids.next_id();
        let Some(program) = self.storage.get_mut().active_program_mut() else {
            return Ok(None);
        };
        program.exercises.push(Exercise {
            id,
            name: name.to_string(),
            next_target: None,
        });
        self.session.track_exercise(id);
        self.persist("adding an exercise")?;
        Ok(Some(id))
    }

    /// Removes an exercise from the active program and from the draft.
    /// # Errors
    /// Returns `anyhow::Error` wrapping `StorageError` if saving fails.
    pub fn delete_exercise(&mut self, exercise_id: Id) -> Result<bool> {
        let Some(program) = self.storage.get_mut().active_program_mut() else {
            return Ok(false);
        };
        let before = program.exercises.len();
        program.exercises.retain(|ex| ex.id != exercise_id);
        if program.exercises.len() == before {
            return Ok(false);
        }
        self.session.untrack_exercise(exercise_id);
        self.persist("deleting an exercise")?;
        Ok(true)
    }

    // --- Draft sets ---

    pub fn add_set(&mut self, exercise_id: Id) -> Id {
        self.session.add_set(exercise_id, &mut self.ids)
    }

    pub fn delete_set(&mut self, exercise_id: Id, set_id: Id) {
        self.session.delete_set(exercise_id, set_id);
    }

    pub fn update_set(&mut self, exercise_id: Id, set_id: Id, field: SetField, value: &str) {
        self.session.update_set(exercise_id, set_id, field, value);
    }

    pub fn update_set_type(&mut self, exercise_id: Id, set_id: Id, set_type: SetType) {
        self.session.update_set_type(exercise_id, set_id, set_type);
    }

    pub fn update_set_error(
        &mut self,
        exercise_id: Id,
        set_id: Id,
        field: SetField,
        has_error: bool,
    ) {
        self.session
            .update_set_error(exercise_id, set_id, field, has_error);
    }

    pub fn has_validation_errors(&self) -> bool {
        self.session.has_validation_errors()
    }

    /// Turns the draft into save items, one per exercise of the active program
    /// that has at least one filled-in set. Blank or unparsable sets are skipped.
    pub fn collect_workout_items(&self) -> Vec<WorkoutItem> {
        let Some(program) = self.active_program() else {
            return Vec::new();
        };
        program
            .exercises
            .iter()
            .filter_map(|ex| {
                let sets: Vec<SetRecord> = self
                    .session
                    .sets_for(ex.id)
                    .iter()
                    .filter_map(DraftSet::to_record)
                    .collect();
                (!sets.is_empty()).then(|| WorkoutItem {
                    exercise_id: ex.id,
                    exercise_name: ex.name.clone(),
                    program_id: program.id,
                    sets,
                })
            })
            .collect()
    }

    // --- Workouts ---

    /// Commits a workout to history and advances targets where earned.
    /// # Returns
    /// The new history session id, or `None` if no program is active.
    /// # Errors
    /// Returns `anyhow::Error` wrapping `StorageError` if saving fails.
    pub fn save_workout(&mut self, items: &[WorkoutItem]) -> Result<Option<Id>> {
        let items = storable_items(items);
        let session_id = self.ids.next_id();
        let state = self.storage.get_mut();
        let Some(program) = state.active_program_mut() else {
            return Ok(None);
        };
        let progression_type = program.progression_type;

        for item in &items {
            let working_sets = normal_sets(&item.sets);
            if working_sets.is_empty() {
                continue;
            }
            let Some(exercise) = program.exercise_mut(item.exercise_id) else {
                continue;
            };
            let (outcome, next_target) = evaluate_sets(exercise, &working_sets, progression_type);
            if outcome != Outcome::Missed {
                log::debug!(
                    "'{}' target -> {:?} x {} ({outcome:?})",
                    exercise.name,
                    next_target.weight,
                    next_target.reps
                );
                exercise.next_target = Some(next_target);
            }
        }

        let workout = WorkoutSession {
            id: session_id,
            date: Local::now().format(HISTORY_DATE_FORMAT).to_string(),
            program_id: program.id,
            program_name: program.name.clone(),
            exercises: items
                .into_iter()
                .map(|item| ExerciseResult {
                    exercise_id: item.exercise_id,
                    exercise_name: item.exercise_name,
                    sets: item.sets,
                })
                .collect(),
        };
        log::info!(
            "Saved workout {session_id} for '{}' with {} exercise(s)",
            workout.program_name,
            workout.exercises.len()
        );
        state.workout_history.push(workout);

        self.reseed_session();
        self.persist("saving a workout")?;
        Ok(Some(session_id))
    }

    /// Previews what `save_workout` would do with the same items without changing anything.
    pub fn generate_workout_summary(&self, items: &[WorkoutItem]) -> WorkoutSummary {
        let items = storable_items(items);
        let state = self.storage.get();
        let units = self.config.units;
        let mut all_goals_achieved = true;
        let mut details = Vec::new();

        for item in &items {
            let working_sets = normal_sets(&item.sets);
            if working_sets.is_empty() {
                continue;
            }
            let Some(program) = state.program_by_id(item.program_id) else {
                continue;
            };
            let Some(exercise) = program.exercise(item.exercise_id) else {
                continue;
            };

            let (outcome, next_target) =
                evaluate_sets(exercise, &working_sets, program.progression_type);
            let target_text = describe_target(&next_target, units);
            let (status, message, next_target_text) = match outcome {
                Outcome::FirstTarget => (
                    SummaryStatus::Success,
                    "Great start! ",
                    format!("Next workout target: {target_text}"),
                ),
                Outcome::Achieved => (
                    SummaryStatus::Success,
                    "Goal achieved! ",
                    format!("Next target: {target_text}"),
                ),
                Outcome::Missed => {
                    all_goals_achieved = false;
                    (
                        SummaryStatus::Failure,
                        "Goal not achieved. ",
                        format!("Repeat: {target_text}"),
                    )
                }
            };

            details.push(SummaryDetail {
                exercise_name: exercise.name.clone(),
                status,
                message: message.to_string(),
                next_target_text,
                next_target,
            });
        }

        WorkoutSummary {
            all_goals_achieved,
            details,
        }
    }

    // --- History ---

    /// Deletes a history session and recomputes every active-program target from
    /// the newest remaining session for that exercise. Stored targets are discarded.
    /// # Returns
    /// `false` if no session has this id.
    /// # Errors
    /// Returns `anyhow::Error` wrapping `StorageError` if saving fails.
    pub fn delete_history_session(&mut self, session_id: Id) -> Result<bool> {
        let state = self.storage.get_mut();
        let Some(position) = state
            .workout_history
            .iter()
            .position(|s| s.id == session_id)
        else {
            return Ok(false);
        };
        state.workout_history.remove(position);

        let recomputed: Vec<(Id, Target)> = match state.active_program() {
            Some(program) => program
                .exercises
                .iter()
                .map(|ex| {
                    let last_sets = state
                        .last_workout_for_exercise(ex.id)
                        .map(ExerciseResult::normal_sets);
                    let cleared = Exercise {
                        next_target: None,
                        ..ex.clone()
                    };
                    let target = calculate_next_target(
                        &cleared,
                        last_sets.as_deref(),
                        program.progression_type,
                    );
                    (ex.id, target)
                })
                .collect(),
            None => Vec::new(),
        };

        if let Some(program) = state.active_program_mut() {
            for (exercise_id, target) in recomputed {
                if let Some(exercise) = program.exercise_mut(exercise_id) {
                    log::debug!(
                        "Recomputed '{}' target -> {:?} x {}",
                        exercise.name,
                        target.weight,
                        target.reps
                    );
                    exercise.next_target = Some(target);
                }
            }
        }
        log::info!("Deleted history session {session_id}");

        self.persist("deleting a history session")?;
        Ok(true)
    }

    /// One-rep-max estimate per session containing the exercise, sorted by date.
    /// Returns `None` if the exercise has no history.
    pub fn get_progress_chart_data(&self, exercise_id: Id) -> Option<ChartSeries> {
        let mut points: Vec<(&str, &[SetRecord])> = self
            .storage
            .get()
            .workout_history
            .iter()
            .flat_map(|session| {
                session
                    .exercises
                    .iter()
                    .filter(move |e| e.exercise_id == exercise_id)
                    .map(move |e| (session.date.as_str(), e.sets.as_slice()))
            })
            .collect();
        if points.is_empty() {
            return None;
        }
        points.sort_by(|a, b| a.0.cmp(b.0));

        let (labels, data) = points
            .into_iter()
            .map(|(date, sets)| (date.to_string(), calculate_one_rep_max(&normal_sets(sets))))
            .unzip();
        Some(ChartSeries { labels, data })
    }

    /// Wipes all programs and history.
    /// # Errors
    /// Returns `anyhow::Error` wrapping `StorageError` if saving fails.
    pub fn reset_all_data(&mut self) -> Result<()> {
        self.storage.set(AppState::default());
        self.session.reset();
        log::info!("Reset all data");
        self.persist("resetting data")
    }
}
