use crate::error::OpponentError;
use crate::piles::{MAX_TAKE, Piles};
use crate::protocol::{MoveRequest, OpponentReply};
use crate::solver::Solver;
use crate::types::Move;

/// Result of handing a move request to an opponent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// The opponent answered on the spot.
    Ready(Result<OpponentReply, OpponentError>),
    /// The answer arrives later as `Event::OpponentReplied` carrying the
    /// request's ticket.
    InFlight,
}

/// Source of opponent moves. The controller does not know which one is wired
/// in.
pub trait Opponent {
    fn request_move(&mut self, request: &MoveRequest) -> Dispatch;

    /// Short name used in logs.
    fn name(&self) -> &'static str;
}

/// Picks the highest non-empty row and takes up to three matches, leaving the
/// last match on the board.
///
/// Returns `None` when no move avoids taking the last match.
pub fn heuristic_move(piles: &Piles) -> Option<Move> {
    let total = piles.total();
    let row = piles.non_empty_rows().next_back()?;
    let mut count = piles.get(row).min(MAX_TAKE);
    if count == total {
        count -= 1;
    }
    (count > 0).then_some(Move { row, count })
}

#[derive(Debug, Default, Clone, Copy)]
pub struct HeuristicOpponent;

impl Opponent for HeuristicOpponent {
    fn request_move(&mut self, request: &MoveRequest) -> Dispatch {
        let reply = match heuristic_move(&request.piles) {
            Some(mv) => OpponentReply::Move {
                mv,
                continues: request.piles.total() - mv.count > 1,
            },
            None => OpponentReply::NoMove,
        };
        Dispatch::Ready(Ok(reply))
    }

    fn name(&self) -> &'static str {
        "heuristic"
    }
}

/// Runs the endpoint's solver in-process at the requested skill.
#[derive(Default)]
pub struct SolverOpponent {
    solver: Solver,
}

impl SolverOpponent {
    pub fn new(solver: Solver) -> Self {
        Self { solver }
    }
}

impl Opponent for SolverOpponent {
    fn request_move(&mut self, request: &MoveRequest) -> Dispatch {
        Dispatch::Ready(
            self.solver
                .solve(&request.piles, request.skill)
                .map_err(OpponentError::from),
        )
    }

    fn name(&self) -> &'static str {
        "solver"
    }
}

/// Carries a move request to the remote endpoint. The reply is fed back to
/// the controller by whoever owns the transport.
pub trait Transport {
    fn send(&mut self, request: &MoveRequest) -> Result<(), OpponentError>;
}

pub struct RemoteOpponent {
    transport: Box<dyn Transport>,
}

impl RemoteOpponent {
    pub fn new(transport: Box<dyn Transport>) -> Self {
        Self { transport }
    }
}

impl Opponent for RemoteOpponent {
    fn request_move(&mut self, request: &MoveRequest) -> Dispatch {
        match self.transport.send(request) {
            Ok(()) => Dispatch::InFlight,
            Err(err) => Dispatch::Ready(Err(err)),
        }
    }

    fn name(&self) -> &'static str {
        "remote"
    }
}
