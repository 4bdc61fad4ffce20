use serde::{Deserialize, Serialize};

use crate::error::{OpponentError, ProtocolError};
use crate::piles::Piles;
use crate::types::Move;

/// One outstanding move request. `ticket` identifies the request so a late
/// reply for an abandoned game can be recognised and dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MoveRequest {
    pub ticket: u64,
    pub piles: Piles,
    pub skill: u8,
}

impl MoveRequest {
    /// Path part of the request, e.g. `/next_move/10323/1`.
    pub fn path(&self) -> String {
        format!("/next_move/{}/{}", self.piles.to_digits(), self.skill)
    }

    pub fn url(&self, endpoint: &str) -> String {
        format!("{}{}", endpoint.trim_end_matches('/'), self.path())
    }
}

/// A decoded, successful opponent answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpponentReply {
    /// The opponent could not move; the user won.
    NoMove,
    /// The opponent's move. `continues == false` announces the end of the game.
    Move { mv: Move, continues: bool },
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    game_continues: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    row_index: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    number_of_matches: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Decodes a response body: `{"gameContinues": -1}` (no move),
/// `{"gameContinues": 0|1, "rowIndex": r, "numberOfMatches": n}` (a move, `0`
/// ending the game) or `{"error": "..."}`.
///
/// An `error` payload becomes [`OpponentError::Remote`]; anything that is not
/// a well-formed response becomes [`OpponentError::Malformed`]. Whether the
/// move is legal on the current board is checked by the controller.
pub fn parse_response(body: &str) -> Result<OpponentReply, OpponentError> {
    let wire: WireResponse =
        serde_json::from_str(body).map_err(|err| ProtocolError::Json(err.to_string()))?;

    let Some(flag) = wire.game_continues else {
        return match wire.error {
            Some(message) => Err(OpponentError::Remote(message)),
            None => Err(ProtocolError::MissingFields.into()),
        };
    };

    let continues = match flag {
        -1 => return Ok(OpponentReply::NoMove),
        0 => false,
        1 => true,
        other => return Err(ProtocolError::BadContinuation(other).into()),
    };

    let row = wire
        .row_index
        .ok_or(ProtocolError::MissingMoveField("rowIndex"))?;
    let count = wire
        .number_of_matches
        .ok_or(ProtocolError::MissingMoveField("numberOfMatches"))?;

    let row = usize::try_from(row)
        .map_err(|_| OpponentError::IllegalMove(format!("row index {row}")))?;
    let count = u8::try_from(count)
        .map_err(|_| OpponentError::IllegalMove(format!("match count {count}")))?;

    Ok(OpponentReply::Move {
        mv: Move { row, count },
        continues,
    })
}

/// Encodes a reply the way the endpoint sends it.
pub fn encode_reply(reply: &OpponentReply) -> String {
    let wire = match *reply {
        OpponentReply::NoMove => WireResponse {
            game_continues: Some(-1),
            ..WireResponse::default()
        },
        OpponentReply::Move { mv, continues } => WireResponse {
            game_continues: Some(i64::from(continues)),
            row_index: Some(mv.row as i64),
            number_of_matches: Some(i64::from(mv.count)),
            error: None,
        },
    };
    to_json(&wire)
}

/// Encodes an endpoint error payload.
pub fn encode_error(message: &str) -> String {
    to_json(&WireResponse {
        error: Some(message.to_string()),
        ..WireResponse::default()
    })
}

fn to_json(wire: &WireResponse) -> String {
    // Plain integers, strings and options; serialization cannot fail.
    serde_json::to_string(wire).unwrap_or_else(|_| String::from("{}"))
}
