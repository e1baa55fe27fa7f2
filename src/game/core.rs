//! The per-session turn state machine.
//!
//! One GameCore owns one board and two players and is the only writer of
//! either while the session lives. Inputs arrive pre-validated from the
//! protocol layer; anything well-formed but semantically impossible (wrong
//! turn, no armed counter, target that does not fit the armed effect) is a
//! silent no-op. The protocol has no request/response correlation, so
//! "drop it" is the correct answer to stale or desynchronized input.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use super::board::{Board, Occupant};
use super::cards::Catalog;
use super::player::{PendingKind, Player, Side};
use super::resolver::{self, CardFate};
use super::{BOARD_N, FROST_TURNS, ROCK_TURNS};

/// Cards each player starts with.
const OPENING_HAND: u32 = 3;

/// Elo K-factor for end-of-game rating updates.
const ELO_K: f64 = 32.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    AwaitingPlayer,
    Active,
    Ended,
}

/// A validated player input, decoded from the wire by the protocol layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameInput {
    PlayCard { hand_index: usize },
    TargetSquare { row: usize, col: usize },
    EndTurn,
    Draw,
}

/// What a processed input did to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Silently dropped: wrong phase, wrong turn, or target mismatch.
    Ignored,
    Applied,
    Won(Side),
}

/// The periodic state payload pushed to both clients, and the record
/// synced to the shared store for cross-instance recovery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Turn indicator: +1 host, -1 client.
    pub tu: i8,
    pub bo: Board,
    pub hp: super::player::PendingActions,
    pub hh: Vec<String>,
    pub hd: Vec<String>,
    pub cp: super::player::PendingActions,
    pub ch: Vec<String>,
    pub cd: Vec<String>,
    /// Server-local tick clock.
    pub t: u64,
}

#[derive(Debug, Error)]
pub enum RestoreError {
    #[error("snapshot names unknown card `{0}`")]
    UnknownCard(String),
}

pub struct GameCore {
    catalog: Arc<Catalog>,
    board: Board,
    host: Player,
    client: Player,
    /// +1 while the host acts, -1 while the client does.
    turn: i8,
    /// Monotonic tick clock, advanced by the session loop.
    time: u64,
    phase: Phase,
    last_snapshot: Option<Snapshot>,
}

impl GameCore {
    pub fn new(catalog: Arc<Catalog>, rng: &mut impl rand::Rng) -> Self {
        let host = Player::new(&catalog, rng);
        let client = Player::new(&catalog, rng);
        Self {
            catalog,
            board: Board::new(),
            host,
            client,
            turn: 1,
            time: 0,
            phase: Phase::AwaitingPlayer,
            last_snapshot: None,
        }
    }

    /// Rebuild a session from a snapshot synced by another instance.
    pub fn from_snapshot(catalog: Arc<Catalog>, snap: &Snapshot) -> Result<Self, RestoreError> {
        let restore = |names: &[String]| -> Result<Vec<_>, RestoreError> {
            names
                .iter()
                .map(|n| {
                    catalog
                        .find(n)
                        .ok_or_else(|| RestoreError::UnknownCard(n.clone()))
                })
                .collect()
        };
        let host = Player {
            pending: snap.hp,
            deck: restore(&snap.hd)?,
            hand: restore(&snap.hh)?,
            discard: Vec::new(),
            mmr: 1000.0,
        };
        let client = Player {
            pending: snap.cp,
            deck: restore(&snap.cd)?,
            hand: restore(&snap.ch)?,
            discard: Vec::new(),
            mmr: 1000.0,
        };
        Ok(Self {
            catalog,
            board: snap.bo.clone(),
            host,
            client,
            turn: snap.tu,
            time: snap.t,
            phase: Phase::Active,
            last_snapshot: None,
        })
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// A recovered session that never seated its second player goes back
    /// to waiting; `start` runs when the seat fills.
    pub fn set_awaiting(&mut self) {
        self.phase = Phase::AwaitingPlayer;
    }

    pub fn turn(&self) -> i8 {
        self.turn
    }

    pub fn time(&self) -> u64 {
        self.time
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    #[cfg(test)]
    pub fn board_mut_for_test(&mut self) -> &mut Board {
        &mut self.board
    }

    pub fn player(&self, side: Side) -> &Player {
        match side {
            Side::Host => &self.host,
            Side::Client => &self.client,
        }
    }

    fn players_mut(&mut self, side: Side) -> (&mut Player, &mut Player) {
        match side {
            Side::Host => (&mut self.host, &mut self.client),
            Side::Client => (&mut self.client, &mut self.host),
        }
    }

    fn split_mut(&mut self, side: Side) -> (&mut Player, &mut Player, &mut Board) {
        match side {
            Side::Host => (&mut self.host, &mut self.client, &mut self.board),
            Side::Client => (&mut self.client, &mut self.host, &mut self.board),
        }
    }

    pub fn set_mmr(&mut self, side: Side, mmr: f64) {
        self.players_mut(side).0.mmr = mmr;
    }

    /// Both seats are filled; deal opening hands and give the host the
    /// first turn's credits.
    pub fn start(&mut self) {
        self.phase = Phase::Active;
        self.turn = 1;
        self.host.draw(OPENING_HAND);
        self.client.draw(OPENING_HAND);
        self.host.pending.arm(PendingKind::CardsToPlay, 1);
        self.host.pending.arm(PendingKind::PiecesToPlay, 1);
    }

    fn is_turn(&self, side: Side) -> bool {
        self.phase == Phase::Active && self.turn == side.sign()
    }

    pub fn process(&mut self, side: Side, input: GameInput) -> StepOutcome {
        if !self.is_turn(side) {
            return StepOutcome::Ignored;
        }
        match input {
            GameInput::PlayCard { hand_index } => self.play_card(side, hand_index),
            GameInput::TargetSquare { row, col } => self.target_square(side, row, col),
            GameInput::EndTurn => self.end_turn(side),
            GameInput::Draw => {
                let (actor, _) = self.players_mut(side);
                actor.draw(1);
                StepOutcome::Applied
            }
        }
    }

    fn play_card(&mut self, side: Side, hand_index: usize) -> StepOutcome {
        let (actor, _) = self.players_mut(side);
        // An armed discard consumes the chosen card instead of playing it.
        if actor.pending.discarding > 0 {
            let Some(card) = actor.take_from_hand(hand_index) else {
                return StepOutcome::Ignored;
            };
            actor.discard.push(card);
            actor.pending.consume(PendingKind::Discarding);
            return StepOutcome::Applied;
        }
        if actor.pending.cards_to_play == 0 {
            return StepOutcome::Ignored;
        }
        let Some(card_id) = actor.take_from_hand(hand_index) else {
            return StepOutcome::Ignored;
        };
        actor.pending.consume(PendingKind::CardsToPlay);

        let catalog = Arc::clone(&self.catalog);
        let card = catalog.card(card_id);
        let (actor, opponent, board) = self.split_mut(side);
        let resolution = resolver::resolve_card(card, side, actor, opponent, board);
        match resolution.fate {
            CardFate::Discard => actor.discard.push(card_id),
            CardFate::ReturnToHand => actor.hand.push(card_id),
        }
        if resolution.end_turn {
            return self.end_turn(side);
        }
        StepOutcome::Applied
    }

    /// Match the cell against the armed counter's precondition. A mismatch
    /// is a no-op, never an error: the player may "waste" the input.
    fn target_square(&mut self, side: Side, row: usize, col: usize) -> StepOutcome {
        let own = side.occupant();
        let enemy = side.other().occupant();
        let Some(armed) = self.player(side).pending.armed() else {
            return StepOutcome::Ignored;
        };
        let occ = self.board.get_cell(row, col);
        let applied = match armed {
            PendingKind::DamagingSelf if occ == own => {
                resolver::damage_cell(&mut self.board, row, col);
                true
            }
            PendingKind::DamagingEnemy if occ == enemy => {
                resolver::damage_cell(&mut self.board, row, col);
                true
            }
            PendingKind::DamagingAny if occ != Occupant::Empty => {
                resolver::damage_cell(&mut self.board, row, col);
                true
            }
            // Destroy removes the piece outright; the shield goes with it.
            PendingKind::DestroyingEnemy if occ == enemy => {
                self.board.set_cell(row, col, Occupant::Empty);
                true
            }
            // Armed shield destruction is enemy-scoped, like the card
            // text that arms it; shield-stripping your own side only
            // exists in the immediate all-quantity form.
            PendingKind::DestroyingShield if occ == enemy && self.board.has_shield(row, col) => {
                self.board.set_shield(row, col, false);
                true
            }
            PendingKind::Freezing if self.board.is_cell_empty(row, col) => {
                self.board.set_frost(row, col, FROST_TURNS);
                true
            }
            PendingKind::Blocking if self.board.is_cell_empty(row, col) => {
                self.board.set_rock(row, col, ROCK_TURNS);
                true
            }
            PendingKind::Thawing
                if self.board.frost_at(row, col) > 0 || self.board.rock_at(row, col) > 0 =>
            {
                self.board.thaw_cell(row, col);
                true
            }
            PendingKind::Shielding
                if occ != Occupant::Empty && !self.board.has_shield(row, col) =>
            {
                self.board.set_shield(row, col, true);
                true
            }
            PendingKind::PiecesToPlay if self.board.is_cell_empty(row, col) => {
                self.board.set_cell(row, col, own);
                true
            }
            // Discarding and CardsToPlay are consumed through play-card.
            _ => false,
        };
        if applied {
            let (actor, _) = self.players_mut(side);
            actor.pending.consume(armed);
            StepOutcome::Applied
        } else {
            StepOutcome::Ignored
        }
    }

    fn end_turn(&mut self, side: Side) -> StepOutcome {
        let (actor, opponent) = self.players_mut(side);
        actor.pending.clear();
        opponent.pending.arm(PendingKind::CardsToPlay, 1);
        opponent.pending.arm(PendingKind::PiecesToPlay, 1);

        if let Some(winner) = self.board.check_win() {
            let winning_side = match winner {
                Occupant::Host => Side::Host,
                _ => Side::Client,
            };
            self.phase = Phase::Ended;
            debug!(?winning_side, "game won");
            return StepOutcome::Won(winning_side);
        }

        self.board.reduce_state();
        self.turn = -self.turn;
        let next = if self.turn == 1 { Side::Host } else { Side::Client };
        let (actor, _) = self.players_mut(next);
        actor.draw(1);
        StepOutcome::Applied
    }

    /// Server-authoritative win claim: a client sent `w`, re-check the
    /// board rather than trusting the report.
    pub fn claim_win(&mut self) -> Option<Side> {
        if self.phase != Phase::Active {
            return None;
        }
        let winner = self.board.check_win()?;
        self.phase = Phase::Ended;
        Some(match winner {
            Occupant::Host => Side::Host,
            _ => Side::Client,
        })
    }

    /// One update-loop tick: advance the clock and run housekeeping.
    pub fn tick(&mut self) {
        self.time += 1;
        if self.phase == Phase::Active {
            self.satisfy_player_states();
        }
    }

    /// Force-resolve the first currently-unsatisfiable counter for each
    /// player, so an impossible instruction ("freeze a square" on a full
    /// board) cannot deadlock the game. At most one counter per player
    /// per pass.
    fn satisfy_player_states(&mut self) {
        for side in [Side::Host, Side::Client] {
            let stuck = PendingKind::PRIORITY.into_iter().find(|&kind| {
                self.player(side).pending.get(kind) > 0 && !self.is_satisfiable(side, kind)
            });
            if let Some(kind) = stuck {
                debug!(?side, ?kind, "force-resolving unsatisfiable pending action");
                let (actor, _) = self.players_mut(side);
                actor.pending.consume(kind);
            }
        }
    }

    /// Does any legal target currently exist for `kind`?
    fn is_satisfiable(&self, side: Side, kind: PendingKind) -> bool {
        let own = side.occupant();
        let enemy = side.other().occupant();
        let board = &self.board;
        match kind {
            PendingKind::DamagingSelf => board.piece_count(own) > 0,
            PendingKind::DamagingEnemy | PendingKind::DestroyingEnemy => {
                board.piece_count(enemy) > 0
            }
            PendingKind::DamagingAny => board.piece_count(Occupant::Empty) > 0,
            PendingKind::DestroyingShield => board.shield_count(enemy) > 0,
            PendingKind::Freezing | PendingKind::Blocking | PendingKind::PiecesToPlay => {
                board.free_squares() > 0
            }
            PendingKind::Thawing => board.timer_count() > 0,
            PendingKind::Shielding => board.any_cell(|occ, shielded| {
                occ != Occupant::Empty && !shielded
            }),
            PendingKind::Discarding | PendingKind::CardsToPlay => {
                !self.player(side).hand.is_empty()
            }
        }
    }

    fn card_names(&self, ids: &[super::cards::CardId]) -> Vec<String> {
        ids.iter()
            .map(|&id| self.catalog.card(id).name.clone())
            .collect()
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            tu: self.turn,
            bo: self.board.clone(),
            hp: self.host.pending,
            hh: self.card_names(&self.host.hand),
            hd: self.card_names(&self.host.deck),
            cp: self.client.pending,
            ch: self.card_names(&self.client.hand),
            cd: self.card_names(&self.client.deck),
            t: self.time,
        }
    }

    /// Snapshot for broadcast, suppressed when nothing relevant changed
    /// since the last one. `force` overrides suppression for the periodic
    /// max-age refresh. The clock field alone never defeats suppression.
    pub fn snapshot_if_changed(&mut self, force: bool) -> Option<Snapshot> {
        let current = self.snapshot();
        let unchanged = self
            .last_snapshot
            .as_ref()
            .is_some_and(|last| {
                let mut aged = last.clone();
                aged.t = current.t;
                aged == current
            });
        if unchanged && !force {
            return None;
        }
        self.last_snapshot = Some(current.clone());
        Some(current)
    }
}

/// Canonical logistic rating update: the winner's expected score against
/// the loser, scaled by a fixed K. Both the human session path and any
/// self-play path use this one formula.
pub fn rating_delta(winner_mmr: f64, loser_mmr: f64) -> f64 {
    let expected = 1.0 / (1.0 + 10f64.powf((loser_mmr - winner_mmr) / 400.0));
    ELO_K * (1.0 - expected)
}

/// Row/column pair for a wire board-position in `[0, N²-1]`.
pub fn position_to_cell(pos: usize) -> (usize, usize) {
    (pos / BOARD_N, pos % BOARD_N)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn active_core() -> GameCore {
        let catalog = Arc::new(Catalog::load().unwrap());
        let mut core = GameCore::new(catalog, &mut rand::thread_rng());
        core.start();
        core
    }

    fn force_hand(core: &mut GameCore, side: Side, names: &[&str]) {
        let ids: Vec<_> = names
            .iter()
            .map(|n| core.catalog.find(n).unwrap())
            .collect();
        match side {
            Side::Host => core.host.hand = ids,
            Side::Client => core.client.hand = ids,
        }
    }

    #[test]
    fn inputs_on_wrong_turn_are_dropped() {
        let mut core = active_core();
        assert_eq!(core.process(Side::Client, GameInput::EndTurn), StepOutcome::Ignored);
        assert_eq!(core.turn(), 1);
    }

    #[test]
    fn host_places_a_piece() {
        let mut core = active_core();
        let outcome = core.process(Side::Host, GameInput::TargetSquare { row: 1, col: 2 });
        assert_eq!(outcome, StepOutcome::Applied);
        assert_eq!(core.board().get_cell(1, 2), Occupant::Host);
        assert_eq!(core.player(Side::Host).pending.pieces_to_play, 0);
    }

    #[test]
    fn second_piece_in_a_turn_is_a_no_op() {
        let mut core = active_core();
        core.process(Side::Host, GameInput::TargetSquare { row: 0, col: 0 });
        let outcome = core.process(Side::Host, GameInput::TargetSquare { row: 0, col: 1 });
        assert_eq!(outcome, StepOutcome::Ignored);
        assert_eq!(core.board().get_cell(0, 1), Occupant::Empty);
    }

    #[test]
    fn end_turn_swaps_credits_and_draws() {
        let mut core = active_core();
        let client_hand = core.player(Side::Client).hand.len();
        assert_eq!(core.process(Side::Host, GameInput::EndTurn), StepOutcome::Applied);
        assert_eq!(core.turn(), -1);
        assert!(core.player(Side::Host).pending.is_clear());
        assert_eq!(core.player(Side::Client).pending.cards_to_play, 1);
        assert_eq!(core.player(Side::Client).pending.pieces_to_play, 1);
        assert_eq!(core.player(Side::Client).hand.len(), client_hand + 1);
    }

    #[test]
    fn end_turn_reduces_timers() {
        let mut core = active_core();
        core.board.set_frost(0, 0, 2);
        core.process(Side::Host, GameInput::EndTurn);
        assert_eq!(core.board().frost_at(0, 0), 1);
    }

    #[test]
    fn winning_row_ends_the_game_on_end_turn() {
        let mut core = active_core();
        for c in 0..BOARD_N {
            core.board.set_cell(2, c, Occupant::Host);
        }
        let outcome = core.process(Side::Host, GameInput::EndTurn);
        assert_eq!(outcome, StepOutcome::Won(Side::Host));
        assert_eq!(core.phase(), Phase::Ended);
    }

    #[test]
    fn floods_then_end_turn_leaves_board_and_pendings_clean() {
        let mut core = active_core();
        core.board.set_cell(0, 0, Occupant::Host);
        core.board.set_cell(1, 1, Occupant::Client);
        core.board.set_shield(1, 1, true);
        force_hand(&mut core, Side::Host, &["Floods"]);
        let outcome = core.process(Side::Host, GameInput::PlayCard { hand_index: 0 });
        // Floods ends the turn itself.
        assert_eq!(outcome, StepOutcome::Applied);
        assert_eq!(core.board().piece_count(Occupant::Empty), 0);
        assert_eq!(core.board().shield_count(Occupant::Empty), 0);
        assert!(core.player(Side::Host).pending.is_clear());
        assert_eq!(core.turn(), -1);
    }

    #[test]
    fn playing_a_card_requires_a_credit() {
        let mut core = active_core();
        force_hand(&mut core, Side::Host, &["Frostbite", "Frostbite"]);
        assert_eq!(
            core.process(Side::Host, GameInput::PlayCard { hand_index: 0 }),
            StepOutcome::Applied
        );
        assert_eq!(
            core.process(Side::Host, GameInput::PlayCard { hand_index: 0 }),
            StepOutcome::Ignored
        );
    }

    #[test]
    fn armed_freeze_consumes_target_square_before_piece_placement() {
        let mut core = active_core();
        force_hand(&mut core, Side::Host, &["Frostbite"]);
        core.process(Side::Host, GameInput::PlayCard { hand_index: 0 });
        assert_eq!(core.player(Side::Host).pending.freezing, 1);
        core.process(Side::Host, GameInput::TargetSquare { row: 3, col: 3 });
        assert_eq!(core.board().frost_at(3, 3), FROST_TURNS);
        // The square is frosted, not occupied; the piece credit survives.
        assert_eq!(core.player(Side::Host).pending.pieces_to_play, 1);
    }

    #[test]
    fn shield_target_on_empty_cell_is_a_strict_no_op() {
        let mut core = active_core();
        core.board.set_cell(0, 0, Occupant::Host);
        core.host.pending.arm(PendingKind::Shielding, 1);
        let before_board = core.board.clone();
        let before_pending = core.player(Side::Host).pending;
        let outcome = core.process(Side::Host, GameInput::TargetSquare { row: 2, col: 2 });
        assert_eq!(outcome, StepOutcome::Ignored);
        assert_eq!(core.board, before_board);
        assert_eq!(core.player(Side::Host).pending, before_pending);
    }

    #[test]
    fn armed_shield_destroy_only_accepts_enemy_shields() {
        let mut core = active_core();
        core.board.set_cell(0, 0, Occupant::Host);
        core.board.set_shield(0, 0, true);
        core.board.set_cell(1, 1, Occupant::Client);
        core.board.set_shield(1, 1, true);
        force_hand(&mut core, Side::Host, &["Sunder"]);
        core.process(Side::Host, GameInput::PlayCard { hand_index: 0 });
        assert_eq!(core.player(Side::Host).pending.destroying_shield, 1);

        let own = core.process(Side::Host, GameInput::TargetSquare { row: 0, col: 0 });
        assert_eq!(own, StepOutcome::Ignored);
        assert!(core.board().has_shield(0, 0));

        let enemy = core.process(Side::Host, GameInput::TargetSquare { row: 1, col: 1 });
        assert_eq!(enemy, StepOutcome::Applied);
        assert!(!core.board().has_shield(1, 1));
        assert_eq!(core.board().get_cell(1, 1), Occupant::Client);
    }

    #[test]
    fn armed_discard_consumes_played_card() {
        let mut core = active_core();
        force_hand(&mut core, Side::Host, &["Frostbite", "Strike"]);
        core.host.pending.arm(PendingKind::Discarding, 1);
        let outcome = core.process(Side::Host, GameInput::PlayCard { hand_index: 1 });
        assert_eq!(outcome, StepOutcome::Applied);
        assert_eq!(core.player(Side::Host).hand.len(), 1);
        assert_eq!(core.player(Side::Host).discard.len(), 1);
        assert_eq!(core.player(Side::Host).pending.discarding, 0);
        // The play credit was not spent on the discard.
        assert_eq!(core.player(Side::Host).pending.cards_to_play, 1);
    }

    #[test]
    fn housekeeping_resolves_freeze_with_no_free_square() {
        let mut core = active_core();
        for r in 0..BOARD_N {
            for c in 0..BOARD_N {
                core.board.set_cell(r, c, Occupant::Client);
            }
        }
        core.host.pending.clear();
        core.host.pending.arm(PendingKind::Freezing, 1);
        let before_board = core.board.clone();
        core.tick();
        assert_eq!(core.player(Side::Host).pending.freezing, 0);
        assert_eq!(core.board, before_board);
    }

    #[test]
    fn housekeeping_resolves_one_counter_per_pass() {
        let mut core = active_core();
        for r in 0..BOARD_N {
            for c in 0..BOARD_N {
                core.board.set_cell(r, c, Occupant::Host);
            }
        }
        core.host.pending.clear();
        core.host.pending.arm(PendingKind::Freezing, 1);
        core.host.pending.arm(PendingKind::Blocking, 1);
        core.tick();
        assert_eq!(core.player(Side::Host).pending.freezing, 0);
        assert_eq!(core.player(Side::Host).pending.blocking, 1);
        core.tick();
        assert_eq!(core.player(Side::Host).pending.blocking, 0);
    }

    #[test]
    fn snapshot_suppression_ignores_clock_only_changes() {
        let mut core = active_core();
        assert!(core.snapshot_if_changed(false).is_some());
        core.tick();
        assert!(core.snapshot_if_changed(false).is_none());
        assert!(core.snapshot_if_changed(true).is_some());
        core.process(Side::Host, GameInput::TargetSquare { row: 0, col: 0 });
        assert!(core.snapshot_if_changed(false).is_some());
    }

    #[test]
    fn snapshot_round_trips_through_restore() {
        let mut core = active_core();
        core.process(Side::Host, GameInput::TargetSquare { row: 1, col: 1 });
        let snap = core.snapshot();
        let restored =
            GameCore::from_snapshot(Arc::clone(&core.catalog), &snap).unwrap();
        assert_eq!(restored.snapshot(), snap);
        assert_eq!(restored.phase(), Phase::Active);
    }

    #[test]
    fn rating_delta_is_logistic() {
        let even = rating_delta(1000.0, 1000.0);
        assert!((even - 16.0).abs() < 1e-9);
        let upset = rating_delta(1000.0, 1400.0);
        assert!(upset > even);
        let expected_win = rating_delta(1400.0, 1000.0);
        assert!(expected_win < even);
    }

    #[test]
    fn claim_win_rechecks_the_board() {
        let mut core = active_core();
        assert_eq!(core.claim_win(), None);
        for c in 0..BOARD_N {
            core.board.set_cell(0, c, Occupant::Client);
        }
        assert_eq!(core.claim_win(), Some(Side::Client));
        assert_eq!(core.phase(), Phase::Ended);
    }
}
