//! Applies parsed effects to the (board, actor, opponent) triple.
//!
//! Quantity-All effects mutate the board or hand immediately and never
//! touch pending actions. Quantity-One/Count effects arm the pending
//! counter named by (kind, target); the board mutation happens later when
//! the player designates a target square. A card's effects run in
//! declaration order, so later effects observe earlier mutations.

use tracing::debug;

use super::board::{Board, Occupant};
use super::cards::Card;
use super::effect::{Effect, EffectKind, Metric, Quantity, Scope, TargetSide};
use super::player::{PendingKind, Player, Side};
use super::{BOARD_N, FROST_TURNS, MAX_HAND_SIZE, ROCK_TURNS};

/// What happens to the card after its effects are resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardFate {
    Discard,
    ReturnToHand,
}

/// Outcome of resolving a full card.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub fate: CardFate,
    /// Set when an "End your turn" effect fired; the turn machine performs
    /// the actual end-turn transition.
    pub end_turn: bool,
}

fn cells() -> impl Iterator<Item = (usize, usize)> {
    (0..BOARD_N).flat_map(|r| (0..BOARD_N).map(move |c| (r, c)))
}

/// True when `occ` is a piece on the side the effect aims at.
fn side_matches(occ: Occupant, target: TargetSide, actor: Side) -> bool {
    match target {
        TargetSide::Own => occ == actor.occupant(),
        TargetSide::Enemy => occ == actor.other().occupant(),
        TargetSide::Any => occ != Occupant::Empty,
    }
}

/// One point of damage to an occupied cell: the shield absorbs it if
/// present, otherwise the piece is removed.
pub fn damage_cell(board: &mut Board, row: usize, col: usize) {
    if board.has_shield(row, col) {
        board.set_shield(row, col, false);
    } else {
        board.set_cell(row, col, Occupant::Empty);
    }
}

/// Resolve every effect of `card` in declaration order.
pub fn resolve_card(
    card: &Card,
    actor_side: Side,
    actor: &mut Player,
    opponent: &mut Player,
    board: &mut Board,
) -> Resolution {
    let mut resolution = Resolution {
        fate: CardFate::Discard,
        end_turn: false,
    };
    for effect in &card.parsed {
        resolve_effect(effect, actor_side, actor, opponent, board, &mut resolution);
    }
    debug!(card = %card.name, ?resolution, "card resolved");
    resolution
}

pub fn resolve_effect(
    effect: &Effect,
    actor_side: Side,
    actor: &mut Player,
    opponent: &mut Player,
    board: &mut Board,
    resolution: &mut Resolution,
) {
    match effect.kind {
        EffectKind::DealDamage => match effect.quantity {
            Quantity::All => {
                for (r, c) in cells() {
                    if side_matches(board.get_cell(r, c), effect.target, actor_side) {
                        damage_cell(board, r, c);
                    }
                }
            }
            q => {
                let kind = match effect.target {
                    TargetSide::Own => PendingKind::DamagingSelf,
                    TargetSide::Enemy => PendingKind::DamagingEnemy,
                    TargetSide::Any => PendingKind::DamagingAny,
                };
                actor.pending.arm(kind, q.count());
            }
        },
        EffectKind::Destroy => match (effect.scope, effect.quantity) {
            (Scope::Shields, Quantity::All) => {
                for (r, c) in cells() {
                    if board.has_shield(r, c)
                        && side_matches(board.get_cell(r, c), effect.target, actor_side)
                    {
                        board.set_shield(r, c, false);
                    }
                }
            }
            (Scope::Shields, q) => {
                actor.pending.arm(PendingKind::DestroyingShield, q.count());
            }
            (_, Quantity::All) => {
                for (r, c) in cells() {
                    if side_matches(board.get_cell(r, c), effect.target, actor_side) {
                        board.set_cell(r, c, Occupant::Empty);
                    }
                }
            }
            (_, q) => {
                let kind = match effect.target {
                    // Destroying one of your own pieces is self-damage
                    // that ignores nothing; shields still absorb it.
                    TargetSide::Own => PendingKind::DamagingSelf,
                    _ => PendingKind::DestroyingEnemy,
                };
                actor.pending.arm(kind, q.count());
            }
        },
        EffectKind::Draw => {
            let n = match effect.quantity {
                Quantity::All => MAX_HAND_SIZE as u32,
                q => q.count(),
            };
            match effect.target {
                TargetSide::Enemy => opponent.draw(n),
                _ => actor.draw(n),
            }
        }
        EffectKind::Freeze => match effect.quantity {
            Quantity::All => {
                for (r, c) in cells() {
                    if board.is_cell_empty(r, c) {
                        board.set_frost(r, c, FROST_TURNS);
                    }
                }
            }
            q => actor.pending.arm(PendingKind::Freezing, q.count()),
        },
        EffectKind::Block => match effect.quantity {
            Quantity::All => {
                for (r, c) in cells() {
                    if board.is_cell_empty(r, c) {
                        board.set_rock(r, c, ROCK_TURNS);
                    }
                }
            }
            q => actor.pending.arm(PendingKind::Blocking, q.count()),
        },
        EffectKind::Thaw => match effect.quantity {
            Quantity::All => {
                for (r, c) in cells() {
                    board.thaw_cell(r, c);
                }
            }
            q => actor.pending.arm(PendingKind::Thawing, q.count()),
        },
        EffectKind::Shield => match effect.quantity {
            Quantity::All => {
                for (r, c) in cells() {
                    if !board.has_shield(r, c)
                        && side_matches(board.get_cell(r, c), effect.target, actor_side)
                    {
                        board.set_shield(r, c, true);
                    }
                }
            }
            q => actor.pending.arm(PendingKind::Shielding, q.count()),
        },
        EffectKind::Discard => match effect.quantity {
            Quantity::All => {
                actor.discard.append(&mut actor.hand);
            }
            q => actor.pending.arm(PendingKind::Discarding, q.count()),
        },
        EffectKind::EndTurn => {
            resolution.end_turn = true;
        }
        EffectKind::Conditional => {
            if let Some(cond) = effect.condition {
                let (mine, theirs) = match cond.metric {
                    Metric::Pieces => (
                        board.piece_count(actor_side.occupant()),
                        board.piece_count(actor_side.other().occupant()),
                    ),
                    Metric::Shields => (
                        board.shield_count(actor_side.occupant()),
                        board.shield_count(actor_side.other().occupant()),
                    ),
                };
                if mine < theirs {
                    resolution.fate = CardFate::ReturnToHand;
                }
            }
        }
    }
}
