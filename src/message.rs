use crate::piles::MAX_TAKE;
use crate::types::{Controls, GameState, Snapshot};

pub fn derive_message(snapshot: &Snapshot) -> String {
    match snapshot.state {
        GameState::NotStarted => "Click Start to begin the game.".to_string(),
        GameState::UserTurn => "Take matches by clicking on them.".to_string(),
        GameState::SelectingRow => {
            let Some(row) = snapshot.selected_row else {
                return "Click OK or Cancel.".to_string();
            };
            let left = snapshot.piles.get(row);
            let more = MAX_TAKE.saturating_sub(snapshot.matches_taken).min(left);
            let status = if more > 0 {
                let noun = if more > 1 { "matches" } else { "match" };
                format!("You can take {more} more {noun} from this row.")
            } else if left > 0 {
                "You can take no more matches from this row.".to_string()
            } else {
                "You took the last match from this row.".to_string()
            };
            format!("{status} Click OK or Cancel.")
        }
        GameState::OpponentTurn => "Wait for the opponent to take matches.".to_string(),
        GameState::GameOver if snapshot.user_won => "You won! :-)".to_string(),
        GameState::GameOver => "You lost :-(".to_string(),
    }
}

pub fn derive_controls(state: GameState) -> Controls {
    let (ok_enabled, cancel_enabled, quit_enabled) = match state {
        GameState::NotStarted => (true, false, false),
        GameState::UserTurn => (false, false, true),
        GameState::SelectingRow => (true, true, true),
        GameState::OpponentTurn => (false, false, false),
        GameState::GameOver => (true, false, false),
    };
    Controls {
        ok_label: if state == GameState::NotStarted {
            "Start"
        } else {
            "OK"
        },
        ok_enabled,
        cancel_enabled,
        quit_enabled,
        rows_clickable: matches!(state, GameState::UserTurn | GameState::SelectingRow),
    }
}
