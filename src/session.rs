//src/session.rs
//! In-memory draft of the workout currently being performed.
//!
//! Nothing here is persisted. The draft is rebuilt from program data whenever
//! the active program changes or a workout is committed.
use std::collections::BTreeMap;

use crate::models::{Id, IdGenerator, Program, SetField, SetRecord, SetType};

const MAX_WEIGHT: f64 = 1000.0;
const MAX_REPS: u32 = 100;

impl SetField {
    /// Input rule for a raw field value. Blank input is allowed (not yet filled in).
    #[must_use]
    pub fn validate(self, value: &str) -> bool {
        let value = value.trim();
        if value.is_empty() {
            return true;
        }
        match self {
            Self::Weight => value
                .parse::<f64>()
                .is_ok_and(|w| (0.0..MAX_WEIGHT).contains(&w)),
            Self::Reps => value.parse::<u32>().is_ok_and(|r| r < MAX_REPS),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FieldErrors {
    pub weight: bool,
    pub reps: bool,
}

impl FieldErrors {
    #[must_use]
    pub const fn get(&self, field: SetField) -> bool {
        match field {
            SetField::Weight => self.weight,
            SetField::Reps => self.reps,
        }
    }

    pub fn set(&mut self, field: SetField, has_error: bool) {
        match field {
            SetField::Weight => self.weight = has_error,
            SetField::Reps => self.reps = has_error,
        }
    }

    #[must_use]
    pub const fn any(&self) -> bool {
        self.weight || self.reps
    }
}

/// A set as typed by the user: raw text plus per-field validity.
#[derive(Debug, Clone, PartialEq)]
pub struct DraftSet {
    pub id: Id,
    pub set_type: SetType,
    pub weight: String,
    pub reps: String,
    pub errors: FieldErrors,
}

impl DraftSet {
    fn blank(id: Id) -> Self {
        Self {
            id,
            set_type: SetType::Normal,
            weight: String::new(),
            reps: String::new(),
            errors: FieldErrors::default(),
        }
    }

    /// Converts a filled-in draft set into a committed record.
    /// Returns `None` when either field is blank or fails its input rule.
    #[must_use]
    pub fn to_record(&self) -> Option<SetRecord> {
        let weight = self.weight.trim();
        let reps = self.reps.trim();
        if weight.is_empty() || reps.is_empty() {
            return None;
        }
        if !SetField::Weight.validate(weight) || !SetField::Reps.validate(reps) {
            return None;
        }
        Some(SetRecord {
            id: self.id,
            set_type: self.set_type,
            weight: weight.parse().ok()?,
            reps: reps.parse().ok()?,
        })
    }
}

#[derive(Debug, Default)]
pub struct SessionState {
    sets: BTreeMap<Id, Vec<DraftSet>>,
}

impl SessionState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.sets.clear();
    }

    /// Clears the draft and seeds an empty set list for every exercise of `program`.
    pub fn init_for_program(&mut self, program: Option<&Program>) {
        self.reset();
        let Some(program) = program else {
            return;
        };
        for ex in &program.exercises {
            self.sets.insert(ex.id, Vec::new());
        }
    }

    pub fn track_exercise(&mut self, exercise_id: Id) {
        self.sets.entry(exercise_id).or_default();
    }

    pub fn untrack_exercise(&mut self, exercise_id: Id) {
        self.sets.remove(&exercise_id);
    }

    /// Appends a blank normal set and returns its id. The id comes from the
    /// same generator as programs and exercises so it never collides with them.
    pub fn add_set(&mut self, exercise_id: Id, ids: &mut IdGenerator) -> Id {
        let id = ids.next_id();
        self.sets
            .entry(exercise_id)
            .or_default()
            .push(DraftSet::blank(id));
        id
    }

    pub fn delete_set(&mut self, exercise_id: Id, set_id: Id) {
        if let Some(sets) = self.sets.get_mut(&exercise_id) {
            sets.retain(|s| s.id != set_id);
        }
    }

    pub fn update_set(&mut self, exercise_id: Id, set_id: Id, field: SetField, value: &str) {
        if let Some(set) = self.find_mut(exercise_id, set_id) {
            match field {
                SetField::Weight => set.weight = value.to_string(),
                SetField::Reps => set.reps = value.to_string(),
            }
        }
    }

    pub fn update_set_type(&mut self, exercise_id: Id, set_id: Id, set_type: SetType) {
        if let Some(set) = self.find_mut(exercise_id, set_id) {
            set.set_type = set_type;
        }
    }

    pub fn update_set_error(
        &mut self,
        exercise_id: Id,
        set_id: Id,
        field: SetField,
        has_error: bool,
    ) {
        if let Some(set) = self.find_mut(exercise_id, set_id) {
            set.errors.set(field, has_error);
        }
    }

    #[must_use]
    pub fn has_validation_errors(&self) -> bool {
        self.sets.values().flatten().any(|s| s.errors.any())
    }

    #[must_use]
    pub fn sets_for(&self, exercise_id: Id) -> &[DraftSet] {
        self.sets.get(&exercise_id).map_or(&[], Vec::as_slice)
    }

    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<Id, Vec<DraftSet>> {
        self.sets.clone()
    }

    fn find_mut(&mut self, exercise_id: Id, set_id: Id) -> Option<&mut DraftSet> {
        self.sets
            .get_mut(&exercise_id)?
            .iter_mut()
            .find(|s| s.id == set_id)
    }
}
