use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::error::StoreError;
use crate::piles::Piles;
use crate::types::{FirstMover, GameState, Snapshot};

/// Names of the persisted session slots.
pub mod slot {
    pub const PILES: &str = "piles";
    pub const PILES_BACKUP: &str = "piles_backup";
    pub const SELECTED_ROW: &str = "selected_row";
    pub const MATCHES_TAKEN: &str = "matches_taken";
    pub const GAME_STATE: &str = "game_state";
    pub const USER_WON: &str = "user_won";
    pub const FIRST_MOVER: &str = "first_mover";
    pub const SKILL: &str = "skill";
}

/// Key/value backend scoped to one browser session.
pub trait SlotStore {
    fn get(&self, slot: &str) -> Option<String>;
    fn set(&mut self, slot: &str, value: &str) -> Result<(), StoreError>;
    fn clear(&mut self) -> Result<(), StoreError>;
}

/// In-process slot backend.
///
/// Clones share the same slots, like two page loads reading one tab's
/// session storage.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    slots: Rc<RefCell<BTreeMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    fn is_empty(&self) -> bool {
        self.slots.borrow().is_empty()
    }
}

impl SlotStore for MemoryStore {
    fn get(&self, slot: &str) -> Option<String> {
        self.slots.borrow().get(slot).cloned()
    }

    fn set(&mut self, slot: &str, value: &str) -> Result<(), StoreError> {
        self.slots
            .borrow_mut()
            .insert(slot.to_string(), value.to_string());
        Ok(())
    }

    fn clear(&mut self) -> Result<(), StoreError> {
        self.slots.borrow_mut().clear();
        Ok(())
    }
}

/// Session state with write-through persistence.
///
/// The store performs no validation beyond the pile layout itself; deciding
/// which mutations are legal is the controller's job.
pub struct StateStore {
    backend: Box<dyn SlotStore>,
    piles: Piles,
    backup: Piles,
    selected_row: Option<usize>,
    matches_taken: u8,
    game_state: GameState,
    user_won: bool,
    first_mover: FirstMover,
    skill: u8,
    resumed: bool,
}

impl StateStore {
    /// Loads every slot from `backend`. Missing or unreadable slots take their
    /// defaults; the settings fall back to the given values.
    pub fn open(backend: Box<dyn SlotStore>, first_mover: FirstMover, skill: u8) -> Self {
        let stored_state: Option<GameState> = load(backend.as_ref(), slot::GAME_STATE);

        Self {
            piles: load(backend.as_ref(), slot::PILES).unwrap_or_default(),
            backup: load(backend.as_ref(), slot::PILES_BACKUP).unwrap_or_default(),
            selected_row: load::<Option<usize>>(backend.as_ref(), slot::SELECTED_ROW)
                .flatten()
                .filter(|row| *row < crate::piles::ROW_COUNT),
            matches_taken: load(backend.as_ref(), slot::MATCHES_TAKEN).unwrap_or(0),
            game_state: stored_state.unwrap_or_default(),
            user_won: load(backend.as_ref(), slot::USER_WON).unwrap_or(false),
            first_mover: load(backend.as_ref(), slot::FIRST_MOVER).unwrap_or(first_mover),
            skill: load(backend.as_ref(), slot::SKILL).unwrap_or(skill),
            resumed: stored_state.is_some(),
            backend,
        }
    }

    /// `true` when the backend already held a session when it was opened.
    pub fn is_resumed(&self) -> bool {
        self.resumed
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            state: self.game_state,
            piles: self.piles,
            selected_row: self.selected_row,
            matches_taken: self.matches_taken,
            user_won: self.user_won,
        }
    }

    pub fn reset_piles(&mut self) {
        self.piles = Piles::new();
        self.backup = self.piles;
        persist(self.backend.as_mut(), slot::PILES, &self.piles);
        persist(self.backend.as_mut(), slot::PILES_BACKUP, &self.backup);
    }

    pub fn piles(&self) -> Piles {
        self.piles
    }

    pub fn backup(&self) -> Piles {
        self.backup
    }

    pub fn pile(&self, row: usize) -> u8 {
        self.piles.get(row)
    }

    pub fn set_pile(&mut self, row: usize, count: u8) {
        self.piles.set(row, count);
        persist(self.backend.as_mut(), slot::PILES, &self.piles);
    }

    /// Panics when the row holds fewer than `count` matches.
    pub fn decrement_pile(&mut self, row: usize, count: u8) {
        self.piles.take(row, count);
        persist(self.backend.as_mut(), slot::PILES, &self.piles);
    }

    pub fn backup_piles(&mut self) {
        self.backup = self.piles;
        persist(self.backend.as_mut(), slot::PILES_BACKUP, &self.backup);
    }

    pub fn restore_pile(&mut self, row: usize) {
        self.piles.set(row, self.backup.get(row));
        persist(self.backend.as_mut(), slot::PILES, &self.piles);
    }

    pub fn total_matches(&self) -> u8 {
        self.piles.total()
    }

    pub fn selected_row(&self) -> Option<usize> {
        self.selected_row
    }

    pub fn set_selected_row(&mut self, row: Option<usize>) {
        self.selected_row = row;
        persist(self.backend.as_mut(), slot::SELECTED_ROW, &self.selected_row);
    }

    pub fn matches_taken(&self) -> u8 {
        self.matches_taken
    }

    pub fn set_matches_taken(&mut self, count: u8) {
        self.matches_taken = count;
        persist(self.backend.as_mut(), slot::MATCHES_TAKEN, &self.matches_taken);
    }

    pub fn game_state(&self) -> GameState {
        self.game_state
    }

    pub fn set_game_state(&mut self, state: GameState) {
        self.game_state = state;
        persist(self.backend.as_mut(), slot::GAME_STATE, &self.game_state);
    }

    pub fn user_won(&self) -> bool {
        self.user_won
    }

    pub fn set_user_won(&mut self, won: bool) {
        self.user_won = won;
        persist(self.backend.as_mut(), slot::USER_WON, &self.user_won);
    }

    pub fn first_mover(&self) -> FirstMover {
        self.first_mover
    }

    pub fn set_first_mover(&mut self, first_mover: FirstMover) {
        self.first_mover = first_mover;
        persist(self.backend.as_mut(), slot::FIRST_MOVER, &self.first_mover);
    }

    pub fn skill(&self) -> u8 {
        self.skill
    }

    pub fn set_skill(&mut self, skill: u8) {
        self.skill = skill;
        persist(self.backend.as_mut(), slot::SKILL, &self.skill);
    }

    /// Ends the session: wipes the backend and returns every value to its
    /// default. Settings survive in memory but are no longer persisted.
    pub fn clear(&mut self) {
        if let Err(err) = self.backend.clear() {
            warn!(%err, "failed to clear session storage");
        }
        self.piles = Piles::new();
        self.backup = Piles::new();
        self.selected_row = None;
        self.matches_taken = 0;
        self.game_state = GameState::NotStarted;
        self.user_won = false;
        self.resumed = false;
    }
}

fn load<T: DeserializeOwned>(backend: &dyn SlotStore, slot: &str) -> Option<T> {
    let raw = backend.get(slot)?;
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(err) => {
            warn!(slot, %err, "discarding unreadable session slot");
            None
        }
    }
}

fn persist<T: Serialize>(backend: &mut dyn SlotStore, slot: &str, value: &T) {
    let result = serde_json::to_string(value)
        .map_err(|source| StoreError::Encode {
            slot: slot.to_string(),
            source,
        })
        .and_then(|raw| backend.set(slot, &raw));
    if let Err(err) = result {
        warn!(slot, %err, "failed to persist session slot");
    }
}
