use serde::{Deserialize, Serialize};

use crate::piles::{Piles, ROW_COUNT};

/// Phase of the session. Exactly one is active at any time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameState {
    #[default]
    NotStarted,
    OpponentTurn,
    UserTurn,
    SelectingRow,
    GameOver,
}

/// Who moves first when a game starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FirstMover {
    #[default]
    User,
    Opponent,
}

/// One complete turn: `count` matches taken from `row`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Move {
    pub row: usize,
    pub count: u8,
}

/// The persisted facts the UI text and controls are derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Snapshot {
    pub state: GameState,
    pub piles: Piles,
    pub selected_row: Option<usize>,
    pub matches_taken: u8,
    pub user_won: bool,
}

/// Transient feedback for the UI. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notice {
    /// The clicked row holds no matches.
    EmptyRow { row: usize },
    /// No more matches can be taken from the selected row this turn.
    LimitReached,
    /// Another row was clicked while a row is selected.
    FinishRowFirst { selected: usize },
    /// Quit was clicked; the UI must ask before sending the confirmation.
    ConfirmQuit,
    /// The opponent failed; the game was ended in the user's favor.
    OpponentFailed { reason: String },
}

/// Which buttons the UI should offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Controls {
    pub ok_label: &'static str,
    pub ok_enabled: bool,
    pub cancel_enabled: bool,
    pub quit_enabled: bool,
    pub rows_clickable: bool,
}

/// Read-only snapshot of a session returned to the UI after every event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionView {
    pub piles: [u8; ROW_COUNT],
    pub state: GameState,
    pub selected_row: Option<usize>,
    pub matches_taken: u8,
    /// Contract:
    /// - `Some(..)` only while `state` is `GameOver`.
    pub user_won: Option<bool>,
    pub first_mover: FirstMover,
    pub skill: u8,
    pub message: String,
    pub controls: Controls,
    pub notice: Option<Notice>,
    /// Ticket of the move request the session is waiting for, if any.
    pub pending_ticket: Option<u64>,
}
