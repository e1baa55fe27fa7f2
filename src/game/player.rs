//! Per-player state: hand, deck, discard pile, rating, pending actions.
//!
//! Pending actions are a fixed set of named counters, one per effect kind
//! the resolver can arm. The set is enumerated at compile time
//! (`PendingKind`), so there is no "unknown counter" path, and the
//! housekeeping priority order is the declaration order of the enum.

use serde::{Deserialize, Serialize};

use super::board::Occupant;
use super::cards::{CardId, Catalog};
use super::MAX_HAND_SIZE;

/// Seat of a player within a session. The host plays +1 pieces, the
/// joining client -1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Host,
    Client,
}

impl Side {
    pub fn occupant(self) -> Occupant {
        match self {
            Side::Host => Occupant::Host,
            Side::Client => Occupant::Client,
        }
    }

    pub fn other(self) -> Side {
        match self {
            Side::Host => Side::Client,
            Side::Client => Side::Host,
        }
    }

    pub fn sign(self) -> i8 {
        self.occupant().sign()
    }
}

/// Every counter a resolver can arm, in housekeeping priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PendingKind {
    DamagingSelf,
    DamagingEnemy,
    DamagingAny,
    DestroyingEnemy,
    DestroyingShield,
    Freezing,
    Blocking,
    Thawing,
    Shielding,
    Discarding,
    CardsToPlay,
    PiecesToPlay,
}

impl PendingKind {
    pub const PRIORITY: [PendingKind; 12] = [
        PendingKind::DamagingSelf,
        PendingKind::DamagingEnemy,
        PendingKind::DamagingAny,
        PendingKind::DestroyingEnemy,
        PendingKind::DestroyingShield,
        PendingKind::Freezing,
        PendingKind::Blocking,
        PendingKind::Thawing,
        PendingKind::Shielding,
        PendingKind::Discarding,
        PendingKind::CardsToPlay,
        PendingKind::PiecesToPlay,
    ];
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingActions {
    pub damaging_self: u32,
    pub damaging_enemy: u32,
    pub damaging_any: u32,
    pub destroying_enemy: u32,
    pub destroying_shield: u32,
    pub freezing: u32,
    pub blocking: u32,
    pub thawing: u32,
    pub shielding: u32,
    pub discarding: u32,
    pub cards_to_play: u32,
    pub pieces_to_play: u32,
}

impl PendingActions {
    pub fn get(&self, kind: PendingKind) -> u32 {
        match kind {
            PendingKind::DamagingSelf => self.damaging_self,
            PendingKind::DamagingEnemy => self.damaging_enemy,
            PendingKind::DamagingAny => self.damaging_any,
            PendingKind::DestroyingEnemy => self.destroying_enemy,
            PendingKind::DestroyingShield => self.destroying_shield,
            PendingKind::Freezing => self.freezing,
            PendingKind::Blocking => self.blocking,
            PendingKind::Thawing => self.thawing,
            PendingKind::Shielding => self.shielding,
            PendingKind::Discarding => self.discarding,
            PendingKind::CardsToPlay => self.cards_to_play,
            PendingKind::PiecesToPlay => self.pieces_to_play,
        }
    }

    fn slot(&mut self, kind: PendingKind) -> &mut u32 {
        match kind {
            PendingKind::DamagingSelf => &mut self.damaging_self,
            PendingKind::DamagingEnemy => &mut self.damaging_enemy,
            PendingKind::DamagingAny => &mut self.damaging_any,
            PendingKind::DestroyingEnemy => &mut self.destroying_enemy,
            PendingKind::DestroyingShield => &mut self.destroying_shield,
            PendingKind::Freezing => &mut self.freezing,
            PendingKind::Blocking => &mut self.blocking,
            PendingKind::Thawing => &mut self.thawing,
            PendingKind::Shielding => &mut self.shielding,
            PendingKind::Discarding => &mut self.discarding,
            PendingKind::CardsToPlay => &mut self.cards_to_play,
            PendingKind::PiecesToPlay => &mut self.pieces_to_play,
        }
    }

    pub fn arm(&mut self, kind: PendingKind, n: u32) {
        *self.slot(kind) += n;
    }

    /// Decrement `kind` by one. Callers only do this after a successful
    /// targeted application (or in the housekeeping force-resolve).
    pub fn consume(&mut self, kind: PendingKind) {
        let slot = self.slot(kind);
        *slot = slot.saturating_sub(1);
    }

    /// First non-zero square-targetable counter in priority order, i.e.
    /// the armed effect a target-square input is matched against.
    /// Discarding and CardsToPlay are consumed through play-card inputs
    /// and never block square targeting.
    pub fn armed(&self) -> Option<PendingKind> {
        PendingKind::PRIORITY
            .into_iter()
            .filter(|&kind| {
                !matches!(kind, PendingKind::Discarding | PendingKind::CardsToPlay)
            })
            .find(|&kind| self.get(kind) > 0)
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn is_clear(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    pub pending: PendingActions,
    /// Draw pile; the front is the next draw.
    pub deck: Vec<CardId>,
    pub hand: Vec<CardId>,
    pub discard: Vec<CardId>,
    pub mmr: f64,
}

impl Player {
    pub fn new(catalog: &Catalog, rng: &mut impl rand::Rng) -> Self {
        Self {
            pending: PendingActions::default(),
            deck: catalog.shuffled_deck(rng),
            hand: Vec::new(),
            discard: Vec::new(),
            mmr: 1000.0,
        }
    }

    /// Move up to `n` cards from the deck front to the hand, stopping at
    /// the hand cap or an empty deck. Never errors.
    pub fn draw(&mut self, n: u32) {
        for _ in 0..n {
            if self.hand.len() >= MAX_HAND_SIZE || self.deck.is_empty() {
                break;
            }
            let card = self.deck.remove(0);
            self.hand.push(card);
        }
    }

    /// Remove the card at `hand_index`, if present.
    pub fn take_from_hand(&mut self, hand_index: usize) -> Option<CardId> {
        if hand_index < self.hand.len() {
            Some(self.hand.remove(hand_index))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> Catalog {
        Catalog::load().unwrap()
    }

    #[test]
    fn draw_caps_at_hand_size() {
        let catalog = catalog();
        let mut player = Player::new(&catalog, &mut rand::thread_rng());
        let deck_before = player.deck.len();
        player.draw(20);
        assert_eq!(player.hand.len(), MAX_HAND_SIZE);
        assert_eq!(player.deck.len(), deck_before - MAX_HAND_SIZE);
    }

    #[test]
    fn draw_truncates_on_empty_deck() {
        let catalog = catalog();
        let mut player = Player::new(&catalog, &mut rand::thread_rng());
        player.deck.truncate(2);
        player.draw(5);
        assert_eq!(player.hand.len(), 2);
        assert!(player.deck.is_empty());
    }

    #[test]
    fn armed_follows_priority_order() {
        let mut pending = PendingActions::default();
        pending.arm(PendingKind::PiecesToPlay, 1);
        pending.arm(PendingKind::Freezing, 1);
        assert_eq!(pending.armed(), Some(PendingKind::Freezing));
        pending.consume(PendingKind::Freezing);
        assert_eq!(pending.armed(), Some(PendingKind::PiecesToPlay));
    }

    #[test]
    fn consume_never_underflows() {
        let mut pending = PendingActions::default();
        pending.consume(PendingKind::Shielding);
        assert_eq!(pending.get(PendingKind::Shielding), 0);
    }

    #[test]
    fn take_from_hand_out_of_range_is_none() {
        let catalog = catalog();
        let mut player = Player::new(&catalog, &mut rand::thread_rng());
        player.draw(1);
        assert!(player.take_from_hand(5).is_none());
        assert_eq!(player.hand.len(), 1);
    }
}
