use std::collections::VecDeque;

use tracing::{debug, info, instrument, warn};
use web_time::Instant;

use crate::error::OpponentError;
use crate::message::{derive_controls, derive_message};
use crate::opponent::{Dispatch, Opponent};
use crate::piles::{MAX_TAKE, ROW_COUNT};
use crate::protocol::{MoveRequest, OpponentReply};
use crate::store::StateStore;
use crate::types::{FirstMover, GameState, Move, Notice, SessionView};

/// Everything that can drive the session. UI clicks and opponent replies go
/// through the same [`Controller::handle`] entry point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// The OK button, labelled "Start" before a game.
    Confirm,
    RowClicked(usize),
    Cancel,
    /// Quit was clicked. The UI asks for confirmation and sends
    /// `QuitConfirmed`.
    Quit,
    QuitConfirmed,
    OpponentReplied {
        ticket: u64,
        reply: Result<OpponentReply, OpponentError>,
    },
}

#[derive(Debug, Clone, Copy)]
struct Pending {
    ticket: u64,
    sent_at: Instant,
}

/// The game session state machine.
///
/// Sole writer of the game state and turn progress. Whoever takes the last
/// match loses.
pub struct Controller {
    store: StateStore,
    opponent: Box<dyn Opponent>,
    pending: Option<Pending>,
    next_ticket: u64,
    notice: Option<Notice>,
    queue: VecDeque<Event>,
}

impl Controller {
    /// Call [`Controller::resume`] once before feeding events.
    pub fn new(store: StateStore, opponent: Box<dyn Opponent>) -> Self {
        Self {
            store,
            opponent,
            pending: None,
            next_ticket: 1,
            notice: None,
            queue: VecDeque::new(),
        }
    }

    /// Reconstructs the session after a page load.
    ///
    /// A fresh session enters `NotStarted`. A session persisted mid-turn is
    /// kept as is; one persisted while waiting for the opponent re-issues the
    /// request, since the previous page took the reply handler with it.
    pub fn resume(&mut self) -> SessionView {
        self.notice = None;
        if !self.store.is_resumed() {
            self.enter(GameState::NotStarted);
        } else {
            let state = self.store.game_state();
            info!(?state, piles = %self.store.piles().to_digits(), "resuming session");
            match state {
                GameState::SelectingRow if !self.turn_progress_is_valid() => {
                    warn!("discarding inconsistent turn progress");
                    for row in 0..ROW_COUNT {
                        self.store.restore_pile(row);
                    }
                    self.enter(GameState::UserTurn);
                }
                GameState::OpponentTurn => self.request_opponent_move(),
                _ => {}
            }
        }
        self.drain();
        self.view()
    }

    /// Applies one event and every event it triggers, then returns the new
    /// view.
    #[instrument(level = "debug", skip(self))]
    pub fn handle(&mut self, event: Event) -> SessionView {
        self.notice = None;
        self.queue.push_back(event);
        self.drain();
        self.view()
    }

    pub fn view(&self) -> SessionView {
        let snapshot = self.store.snapshot();
        SessionView {
            piles: snapshot.piles.counts(),
            state: snapshot.state,
            selected_row: snapshot.selected_row,
            matches_taken: snapshot.matches_taken,
            user_won: (snapshot.state == GameState::GameOver).then_some(snapshot.user_won),
            first_mover: self.store.first_mover(),
            skill: self.store.skill(),
            message: derive_message(&snapshot),
            controls: derive_controls(snapshot.state),
            notice: self.notice.clone(),
            pending_ticket: self.pending.map(|pending| pending.ticket),
        }
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    /// Takes effect when the next game starts.
    pub fn set_first_mover(&mut self, first_mover: FirstMover) -> SessionView {
        info!(?first_mover, "first mover changed");
        self.store.set_first_mover(first_mover);
        self.view()
    }

    /// Takes effect with the next move request.
    pub fn set_skill(&mut self, skill: u8) -> SessionView {
        info!(skill, "opponent skill changed");
        self.store.set_skill(skill);
        self.view()
    }

    /// Wipes the persisted session and returns to `NotStarted`.
    pub fn end_session(&mut self) -> SessionView {
        info!("ending session");
        let first_mover = self.store.first_mover();
        let skill = self.store.skill();
        self.store.clear();
        self.queue.clear();
        self.notice = None;
        self.enter(GameState::NotStarted);
        // Settings outlive the game but are rewritten into the fresh session.
        self.store.set_first_mover(first_mover);
        self.store.set_skill(skill);
        self.view()
    }

    fn drain(&mut self) {
        while let Some(event) = self.queue.pop_front() {
            self.dispatch(event);
        }
    }

    fn dispatch(&mut self, event: Event) {
        let state = self.store.game_state();
        match (state, event) {
            (_, Event::RowClicked(row)) if row >= ROW_COUNT => {
                debug!(row, "click outside the board has no effect");
            }
            (GameState::NotStarted, Event::Confirm) => self.start_game(),
            (GameState::UserTurn, Event::RowClicked(row)) => self.first_take(row),
            (GameState::SelectingRow, Event::RowClicked(row)) => self.take_more(row),
            (GameState::SelectingRow, Event::Confirm) => self.commit_turn(),
            (GameState::SelectingRow, Event::Cancel) => self.cancel_turn(),
            (GameState::UserTurn | GameState::SelectingRow, Event::Quit) => {
                self.notice = Some(Notice::ConfirmQuit);
            }
            (GameState::UserTurn | GameState::SelectingRow, Event::QuitConfirmed) => {
                info!("game quit");
                self.enter(GameState::NotStarted);
            }
            (GameState::GameOver, Event::Confirm) => self.enter(GameState::NotStarted),
            (_, Event::OpponentReplied { ticket, reply }) => self.receive_reply(ticket, reply),
            (state, event) => debug!(?state, ?event, "event has no effect"),
        }
    }

    /// Entry actions shared by every way into a state.
    fn enter(&mut self, state: GameState) {
        match state {
            GameState::NotStarted => {
                self.store.reset_piles();
                self.clear_turn();
                self.store.set_user_won(false);
                self.pending = None;
            }
            GameState::UserTurn => {
                self.clear_turn();
                self.store.backup_piles();
            }
            GameState::SelectingRow | GameState::OpponentTurn | GameState::GameOver => {}
        }
        self.store.set_game_state(state);
        info!(?state, piles = %self.store.piles().to_digits(), "entered state");

        if state == GameState::OpponentTurn {
            self.request_opponent_move();
        }
    }

    fn start_game(&mut self) {
        self.store.reset_piles();
        self.store.backup_piles();
        self.store.set_user_won(false);
        match self.store.first_mover() {
            FirstMover::User => self.enter(GameState::UserTurn),
            FirstMover::Opponent => self.enter(GameState::OpponentTurn),
        }
    }

    fn first_take(&mut self, row: usize) {
        if self.store.pile(row) == 0 {
            self.notice = Some(Notice::EmptyRow { row });
            return;
        }
        self.store.backup_piles();
        self.store.set_selected_row(Some(row));
        self.store.decrement_pile(row, 1);
        self.store.set_matches_taken(1);
        self.enter(GameState::SelectingRow);
    }

    fn take_more(&mut self, row: usize) {
        let selected = self.selected_row();
        if row != selected {
            self.notice = Some(Notice::FinishRowFirst { selected });
            return;
        }

        let taken = self.store.matches_taken();
        if taken >= MAX_TAKE || self.store.pile(row) == 0 {
            self.notice = Some(Notice::LimitReached);
            return;
        }
        self.store.decrement_pile(row, 1);
        self.store.set_matches_taken(taken + 1);
        debug!(row, taken = taken + 1, "took another match");
    }

    fn commit_turn(&mut self) {
        let row = self.selected_row();
        let count = self.store.matches_taken();
        assert!(
            (1..=MAX_TAKE).contains(&count),
            "committing a turn with {count} matches taken"
        );
        info!(row, count, "user move committed");
        self.clear_turn();

        if self.store.piles().is_empty() {
            info!("user took the last match");
            self.finish(false);
        } else {
            self.enter(GameState::OpponentTurn);
        }
    }

    fn cancel_turn(&mut self) {
        let row = self.selected_row();
        self.store.restore_pile(row);
        self.enter(GameState::UserTurn);
    }

    fn request_opponent_move(&mut self) {
        let ticket = self.next_ticket;
        self.next_ticket += 1;
        let request = MoveRequest {
            ticket,
            piles: self.store.piles(),
            skill: self.store.skill(),
        };
        self.pending = Some(Pending {
            ticket,
            sent_at: Instant::now(),
        });
        info!(
            ticket,
            opponent = self.opponent.name(),
            path = %request.path(),
            "requesting opponent move"
        );

        match self.opponent.request_move(&request) {
            Dispatch::Ready(reply) => self
                .queue
                .push_back(Event::OpponentReplied { ticket, reply }),
            Dispatch::InFlight => {}
        }
    }

    fn receive_reply(&mut self, ticket: u64, reply: Result<OpponentReply, OpponentError>) {
        let state = self.store.game_state();
        let expected = self.pending.map(|pending| pending.ticket);
        if state != GameState::OpponentTurn || expected != Some(ticket) {
            debug!(ticket, ?expected, ?state, "ignoring stale opponent reply");
            return;
        }
        if let Some(pending) = self.pending.take() {
            debug!(
                ticket,
                elapsed_ms = pending.sent_at.elapsed().as_millis() as u64,
                "opponent answered"
            );
        }

        match reply.and_then(|reply| self.check_reply(reply)) {
            Ok(OpponentReply::NoMove) => {
                info!("opponent has no move left");
                self.finish(true);
            }
            Ok(OpponentReply::Move { mv, continues }) => {
                info!(row = mv.row, count = mv.count, "opponent move applied");
                self.store.decrement_pile(mv.row, mv.count);
                let total = self.store.total_matches();
                if continues != (total > 1) {
                    warn!(continues, total, "opponent's continuation flag disagrees with the board");
                }
                if total <= 1 {
                    self.finish(false);
                } else {
                    self.enter(GameState::UserTurn);
                }
            }
            Err(err) => {
                warn!(%err, "opponent failed, ending the game in the user's favor");
                self.notice = Some(Notice::OpponentFailed {
                    reason: err.to_string(),
                });
                self.finish(true);
            }
        }
    }

    /// Rejects moves that break the rules on the current board.
    fn check_reply(&self, reply: OpponentReply) -> Result<OpponentReply, OpponentError> {
        let OpponentReply::Move { mv: Move { row, count }, .. } = reply else {
            return Ok(reply);
        };
        if row >= ROW_COUNT {
            return Err(OpponentError::IllegalMove(format!("row {row} does not exist")));
        }
        if !(1..=MAX_TAKE).contains(&count) {
            return Err(OpponentError::IllegalMove(format!(
                "cannot take {count} matches in one turn"
            )));
        }
        let left = self.store.pile(row);
        if count > left {
            return Err(OpponentError::IllegalMove(format!(
                "row {row} holds only {left} matches, {count} requested"
            )));
        }
        if count == self.store.total_matches() {
            return Err(OpponentError::IllegalMove(
                "move would take the last match".to_string(),
            ));
        }
        Ok(reply)
    }

    fn finish(&mut self, user_won: bool) {
        self.store.set_user_won(user_won);
        self.enter(GameState::GameOver);
    }

    fn clear_turn(&mut self) {
        self.store.set_selected_row(None);
        self.store.set_matches_taken(0);
    }

    fn selected_row(&self) -> usize {
        self.store
            .selected_row()
            .unwrap_or_else(|| panic!("no row selected in state {:?}", self.store.game_state()))
    }

    fn turn_progress_is_valid(&self) -> bool {
        let taken = self.store.matches_taken();
        let Some(row) = self.store.selected_row() else {
            return false;
        };
        let backup = self.store.backup();
        (1..=MAX_TAKE).contains(&taken)
            && backup.get(row).checked_sub(self.store.pile(row)) == Some(taken)
            && (0..ROW_COUNT)
                .filter(|&other| other != row)
                .all(|other| self.store.pile(other) == backup.get(other))
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::opponent::HeuristicOpponent;
    use crate::piles::Piles;
    use crate::store::MemoryStore;

    /// Records requests and leaves them in flight.
    #[derive(Clone, Default)]
    struct ParkedOpponent {
        requests: Rc<RefCell<Vec<MoveRequest>>>,
    }

    impl Opponent for ParkedOpponent {
        fn request_move(&mut self, request: &MoveRequest) -> Dispatch {
            self.requests.borrow_mut().push(*request);
            Dispatch::InFlight
        }

        fn name(&self) -> &'static str {
            "parked"
        }
    }

    fn controller_with(backend: &MemoryStore, opponent: Box<dyn Opponent>) -> Controller {
        let store = StateStore::open(Box::new(backend.clone()), FirstMover::User, 1);
        let mut controller = Controller::new(store, opponent);
        controller.resume();
        controller
    }

    fn started(opponent: Box<dyn Opponent>) -> Controller {
        let mut controller = controller_with(&MemoryStore::new(), opponent);
        controller.handle(Event::Confirm);
        controller
    }

    fn move_reply(row: usize, count: u8, continues: bool) -> Result<OpponentReply, OpponentError> {
        Ok(OpponentReply::Move {
            mv: Move { row, count },
            continues,
        })
    }

    #[test]
    fn fresh_session_waits_for_start() {
        let controller = controller_with(&MemoryStore::new(), Box::new(HeuristicOpponent));
        let view = controller.view();

        assert_eq!(view.state, GameState::NotStarted);
        assert_eq!(view.piles, [1, 2, 3, 4, 5]);
        assert_eq!(view.controls.ok_label, "Start");
        assert_eq!(view.message, "Click Start to begin the game.");
    }

    #[test]
    fn start_hands_the_first_turn_to_the_user() {
        let view = started(Box::new(HeuristicOpponent)).view();

        assert_eq!(view.state, GameState::UserTurn);
        assert_eq!(view.selected_row, None);
        assert_eq!(view.matches_taken, 0);
    }

    #[test]
    fn start_with_opponent_first_resolves_a_local_move() {
        let backend = MemoryStore::new();
        let store = StateStore::open(Box::new(backend), FirstMover::Opponent, 1);
        let mut controller = Controller::new(store, Box::new(HeuristicOpponent));
        controller.resume();

        let view = controller.handle(Event::Confirm);

        assert_eq!(view.state, GameState::UserTurn);
        assert_eq!(view.piles, [1, 2, 3, 4, 2]);
        assert_eq!(view.pending_ticket, None);
    }

    #[test]
    fn clicking_an_empty_row_is_rejected() {
        let mut controller = started(Box::new(HeuristicOpponent));
        controller.handle(Event::RowClicked(0));
        controller.handle(Event::Confirm);
        assert_eq!(controller.view().piles, [0, 2, 3, 4, 2]);

        let view = controller.handle(Event::RowClicked(0));

        assert_eq!(view.state, GameState::UserTurn);
        assert_eq!(view.notice, Some(Notice::EmptyRow { row: 0 }));
    }

    #[test]
    fn other_row_click_asks_to_finish_the_selected_row() {
        let mut controller = started(Box::new(HeuristicOpponent));
        controller.handle(Event::RowClicked(3));

        let view = controller.handle(Event::RowClicked(2));

        assert_eq!(view.notice, Some(Notice::FinishRowFirst { selected: 3 }));
        assert_eq!(view.piles, [1, 2, 3, 3, 5]);
        assert_eq!(view.matches_taken, 1);
    }

    #[test]
    fn emptied_row_reports_the_limit() {
        let mut controller = started(Box::new(HeuristicOpponent));
        controller.handle(Event::RowClicked(1));
        controller.handle(Event::RowClicked(1));

        let view = controller.handle(Event::RowClicked(1));

        assert_eq!(view.notice, Some(Notice::LimitReached));
        assert_eq!(view.piles[1], 0);
        assert_eq!(view.matches_taken, 2);
        assert_eq!(
            view.message,
            "You took the last match from this row. Click OK or Cancel."
        );
    }

    #[test]
    fn commit_hands_over_and_applies_the_heuristic_reply() {
        let mut controller = started(Box::new(HeuristicOpponent));
        controller.handle(Event::RowClicked(2));
        controller.handle(Event::RowClicked(2));

        let view = controller.handle(Event::Confirm);

        // User took 2 from row 2, heuristic took 3 from row 4.
        assert_eq!(view.piles, [1, 2, 1, 4, 2]);
        assert_eq!(view.state, GameState::UserTurn);
        assert_eq!(view.selected_row, None);
        assert_eq!(controller.store().backup(), Piles::from_counts([1, 2, 1, 4, 2]).unwrap());
    }

    #[test]
    fn quit_needs_confirmation() {
        let mut controller = started(Box::new(HeuristicOpponent));
        controller.handle(Event::RowClicked(4));

        let view = controller.handle(Event::Quit);
        assert_eq!(view.notice, Some(Notice::ConfirmQuit));
        assert_eq!(view.state, GameState::SelectingRow);

        let view = controller.handle(Event::QuitConfirmed);
        assert_eq!(view.state, GameState::NotStarted);
        assert_eq!(view.piles, [1, 2, 3, 4, 5]);
        assert_eq!(view.selected_row, None);
    }

    #[test]
    fn remote_reply_with_the_right_ticket_is_applied() {
        let opponent = ParkedOpponent::default();
        let mut controller = started(Box::new(opponent.clone()));
        controller.handle(Event::RowClicked(4));
        let view = controller.handle(Event::Confirm);

        assert_eq!(view.state, GameState::OpponentTurn);
        let ticket = view.pending_ticket.unwrap();
        assert_eq!(opponent.requests.borrow()[0].path(), "/next_move/12344/1");

        let view = controller.handle(Event::OpponentReplied {
            ticket,
            reply: move_reply(3, 2, true),
        });

        assert_eq!(view.state, GameState::UserTurn);
        assert_eq!(view.piles, [1, 2, 3, 2, 4]);
        assert_eq!(view.pending_ticket, None);
    }

    #[test]
    fn stale_replies_are_ignored() {
        let opponent = ParkedOpponent::default();
        let mut controller = started(Box::new(opponent));
        controller.handle(Event::RowClicked(4));
        let ticket = controller.handle(Event::Confirm).pending_ticket.unwrap();

        let view = controller.handle(Event::OpponentReplied {
            ticket: ticket + 1,
            reply: move_reply(3, 2, true),
        });
        assert_eq!(view.state, GameState::OpponentTurn);
        assert_eq!(view.piles, [1, 2, 3, 4, 4]);

        // Same ticket once the game is over: dropped as well.
        controller.handle(Event::OpponentReplied {
            ticket,
            reply: Ok(OpponentReply::NoMove),
        });
        let view = controller.handle(Event::OpponentReplied {
            ticket,
            reply: move_reply(3, 2, true),
        });
        assert_eq!(view.state, GameState::GameOver);
        assert_eq!(view.piles, [1, 2, 3, 4, 4]);
    }

    #[test]
    fn illegal_remote_move_ends_the_game_for_the_user() {
        let mut controller = started(Box::new(ParkedOpponent::default()));
        controller.handle(Event::RowClicked(0));
        let ticket = controller.handle(Event::Confirm).pending_ticket.unwrap();

        let view = controller.handle(Event::OpponentReplied {
            ticket,
            reply: move_reply(0, 1, true),
        });

        assert_eq!(view.state, GameState::GameOver);
        assert_eq!(view.user_won, Some(true));
        assert!(matches!(view.notice, Some(Notice::OpponentFailed { .. })));
        assert_eq!(view.piles, [0, 2, 3, 4, 5]);
    }

    #[test]
    fn opponent_leaving_one_match_wins() {
        let backend = MemoryStore::new();
        let mut store = StateStore::open(Box::new(backend.clone()), FirstMover::User, 1);
        store.reset_piles();
        for (row, count) in [0, 0, 0, 1, 2].into_iter().enumerate() {
            store.set_pile(row, count);
        }
        store.set_game_state(GameState::OpponentTurn);
        drop(store);

        // Resuming in OpponentTurn issues a fresh request.
        let mut controller = controller_with(&backend, Box::new(ParkedOpponent::default()));
        let ticket = controller.view().pending_ticket.unwrap();

        let view = controller.handle(Event::OpponentReplied {
            ticket,
            reply: move_reply(4, 2, false),
        });

        assert_eq!(view.state, GameState::GameOver);
        assert_eq!(view.user_won, Some(false));
        assert_eq!(view.message, "You lost :-(");
    }

    #[test]
    fn game_over_confirm_returns_to_not_started() {
        let mut controller = started(Box::new(ParkedOpponent::default()));
        controller.handle(Event::RowClicked(4));
        let ticket = controller.handle(Event::Confirm).pending_ticket.unwrap();
        controller.handle(Event::OpponentReplied {
            ticket,
            reply: Ok(OpponentReply::NoMove),
        });

        let view = controller.handle(Event::Confirm);

        assert_eq!(view.state, GameState::NotStarted);
        assert_eq!(view.user_won, None);
        assert_eq!(view.piles, [1, 2, 3, 4, 5]);
    }

    #[test]
    fn end_session_wipes_storage_but_keeps_settings() {
        let backend = MemoryStore::new();
        let mut controller = controller_with(&backend, Box::new(HeuristicOpponent));
        controller.set_skill(0);
        controller.handle(Event::Confirm);
        controller.handle(Event::RowClicked(4));

        let view = controller.end_session();

        assert_eq!(view.state, GameState::NotStarted);
        assert_eq!(view.piles, [1, 2, 3, 4, 5]);
        assert_eq!(view.skill, 0);
    }

    #[test]
    #[should_panic(expected = "no row selected")]
    fn cancel_without_selection_fails_fast() {
        let backend = MemoryStore::new();
        let mut store = StateStore::open(Box::new(backend), FirstMover::User, 1);
        store.set_game_state(GameState::SelectingRow);
        // Bypass resume(): it would repair this state.
        let mut controller = Controller::new(store, Box::new(HeuristicOpponent));

        controller.handle(Event::Cancel);
    }
}
