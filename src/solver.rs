use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::debug;
use web_time::{SystemTime, UNIX_EPOCH};

use crate::error::{PileError, SolverError};
use crate::piles::{MAX_TAKE, Piles};
use crate::protocol::{self, OpponentReply};
use crate::types::Move;

pub const MAX_SKILL: u8 = 1;

/// Move selection of the opponent-move endpoint. Skill 0 plays a random legal
/// move, skill 1 takes as much as it can from the largest row.
pub struct Solver {
    rng: StdRng,
}

impl Solver {
    /// Creates a solver with a fixed seed, for reproducible play.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Creates a solver seeded from the wall clock.
    pub fn from_clock() -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or_default();
        Self::seeded(nanos)
    }

    /// Computes the next move for `piles` at `skill`.
    ///
    /// Returns [`OpponentReply::NoMove`] when at most one match is left, since
    /// taking the last match loses.
    pub fn solve(&mut self, piles: &Piles, skill: u8) -> Result<OpponentReply, SolverError> {
        if skill > MAX_SKILL {
            return Err(SolverError::UnsupportedSkill(skill));
        }
        let total = piles.total();
        if total == 0 {
            return Err(PileError::NoMatches.into());
        }
        if total == 1 {
            return Ok(OpponentReply::NoMove);
        }

        let mv = match skill {
            0 => self.random_move(piles),
            _ => largest_row_move(piles),
        };
        debug!(skill, row = mv.row, count = mv.count, "solver picked a move");

        Ok(OpponentReply::Move {
            mv,
            continues: total - mv.count > 1,
        })
    }

    /// Answers one endpoint query given in route form, e.g. `("10340", 1)`,
    /// with a JSON response body.
    pub fn answer(&mut self, rows: &str, skill: u8) -> String {
        let reply = Piles::from_digits(rows)
            .map_err(SolverError::from)
            .and_then(|piles| self.solve(&piles, skill));
        match reply {
            Ok(reply) => protocol::encode_reply(&reply),
            Err(err) => protocol::encode_error(&err.to_string()),
        }
    }

    fn random_move(&mut self, piles: &Piles) -> Move {
        let rows: Vec<usize> = piles.non_empty_rows().collect();
        let row = *rows
            .choose(&mut self.rng)
            .unwrap_or_else(|| unreachable!("solve() checked that a match is left"));
        let count = self.rng.gen_range(1..=max_take(piles, row, rows.len()));
        Move { row, count }
    }
}

impl Default for Solver {
    fn default() -> Self {
        Self::from_clock()
    }
}

/// Takes as many matches as allowed from the fullest row, preferring the
/// highest index on ties. The board must hold at least two matches.
pub(crate) fn largest_row_move(piles: &Piles) -> Move {
    let row = piles
        .non_empty_rows()
        .max_by_key(|&row| (piles.get(row), row))
        .unwrap_or_else(|| unreachable!("caller checked that a match is left"));
    let count = max_take(piles, row, piles.non_empty_rows().count());
    Move { row, count }
}

/// Largest legal take from `row`: at most three, and never the last match on
/// the board.
fn max_take(piles: &Piles, row: usize, non_empty_rows: usize) -> u8 {
    let count = piles.get(row);
    let mut max = count.min(MAX_TAKE);
    if non_empty_rows == 1 {
        max = max.min(count - 1);
    }
    max
}
