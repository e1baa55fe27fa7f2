//! Card effect micro-grammar.
//!
//! Card text is a fixed, small vocabulary ("Deal 2 damage to enemy pieces",
//! "Freeze a square", "Destroy all shields", ...). The parser tokenizes on
//! whitespace, keys off the first token and scans the rest for a quantity
//! and a target side. It is a pure function of the string: no board or
//! player access, which is what makes the catalog cacheable and the grammar
//! independently testable. An unrecognized leading keyword is a parse
//! error, surfaced when the catalog loads, never a silent no-op at runtime.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EffectKind {
    DealDamage,
    Destroy,
    Draw,
    Freeze,
    Thaw,
    Block,
    Shield,
    Discard,
    EndTurn,
    Conditional,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Quantity {
    One,
    All,
    Count(u32),
}

impl Quantity {
    /// Counter increment for pending-action arming.
    pub fn count(self) -> u32 {
        match self {
            Quantity::One => 1,
            Quantity::All => 0,
            Quantity::Count(n) => n,
        }
    }
}

/// Which side the effect aims at, relative to the acting player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TargetSide {
    Own,
    Enemy,
    Any,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Scope {
    Pieces,
    Shields,
    Cards,
    Squares,
    Hand,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Comparator {
    Least,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Metric {
    Pieces,
    Shields,
}

/// Nested condition carried by conditional effects
/// ("If you have the least pieces, return this card to your hand").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    pub comparator: Comparator,
    pub metric: Metric,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Effect {
    pub kind: EffectKind,
    pub quantity: Quantity,
    pub target: TargetSide,
    pub scope: Scope,
    pub condition: Option<Condition>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EffectParseError {
    #[error("empty effect string")]
    Empty,
    #[error("unknown effect keyword `{0}`")]
    UnknownKeyword(String),
    #[error("unknown condition metric `{0}`")]
    UnknownMetric(String),
    #[error("condition without comparator")]
    MissingComparator,
}

fn tokens(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|t| {
            t.trim_matches(|c: char| !c.is_ascii_alphanumeric())
                .to_ascii_lowercase()
        })
        .filter(|t| !t.is_empty())
        .collect()
}

fn parse_quantity(toks: &[String]) -> Quantity {
    for tok in toks {
        match tok.as_str() {
            "a" | "an" | "1" | "one" => return Quantity::One,
            "all" | "every" => return Quantity::All,
            _ => {
                if let Ok(n) = tok.parse::<u32>() {
                    return Quantity::Count(n);
                }
            }
        }
    }
    Quantity::One
}

fn parse_target(toks: &[String]) -> TargetSide {
    for tok in toks {
        match tok.as_str() {
            "you" | "your" | "yours" => return TargetSide::Own,
            "enemy" | "opponent" => return TargetSide::Enemy,
            _ => {}
        }
    }
    TargetSide::Any
}

fn mentions_shields(toks: &[String]) -> bool {
    toks.iter().any(|t| t == "shield" || t == "shields")
}

/// Parse one effect string into its structured form.
pub fn parse_effect(text: &str) -> Result<Effect, EffectParseError> {
    let toks = tokens(text);
    let (head, rest) = toks.split_first().ok_or(EffectParseError::Empty)?;

    let effect = match head.as_str() {
        "deal" | "damage" => Effect {
            kind: EffectKind::DealDamage,
            quantity: parse_quantity(rest),
            target: parse_target(rest),
            scope: Scope::Pieces,
            condition: None,
        },
        "destroy" | "remove" => Effect {
            kind: EffectKind::Destroy,
            quantity: parse_quantity(rest),
            target: parse_target(rest),
            scope: if mentions_shields(rest) {
                Scope::Shields
            } else {
                Scope::Pieces
            },
            condition: None,
        },
        "draw" => Effect {
            kind: EffectKind::Draw,
            quantity: parse_quantity(rest),
            target: parse_target(rest),
            scope: Scope::Cards,
            condition: None,
        },
        "freeze" => Effect {
            kind: EffectKind::Freeze,
            quantity: parse_quantity(rest),
            target: parse_target(rest),
            scope: Scope::Squares,
            condition: None,
        },
        "thaw" => Effect {
            kind: EffectKind::Thaw,
            quantity: parse_quantity(rest),
            target: parse_target(rest),
            scope: Scope::Squares,
            condition: None,
        },
        "block" => Effect {
            kind: EffectKind::Block,
            quantity: parse_quantity(rest),
            target: parse_target(rest),
            scope: Scope::Squares,
            condition: None,
        },
        "shield" => Effect {
            kind: EffectKind::Shield,
            quantity: parse_quantity(rest),
            target: parse_target(rest),
            scope: Scope::Pieces,
            condition: None,
        },
        "discard" => Effect {
            kind: EffectKind::Discard,
            quantity: parse_quantity(rest),
            target: TargetSide::Own,
            scope: Scope::Hand,
            condition: None,
        },
        "end" => Effect {
            kind: EffectKind::EndTurn,
            quantity: Quantity::One,
            target: TargetSide::Own,
            scope: Scope::Hand,
            condition: None,
        },
        "if" => {
            let condition = parse_condition(rest)?;
            Effect {
                kind: EffectKind::Conditional,
                quantity: Quantity::One,
                target: TargetSide::Own,
                scope: Scope::Hand,
                condition: Some(condition),
            }
        }
        other => return Err(EffectParseError::UnknownKeyword(other.to_string())),
    };
    Ok(effect)
}

fn parse_condition(toks: &[String]) -> Result<Condition, EffectParseError> {
    let comparator_at = toks
        .iter()
        .position(|t| t == "least" || t == "fewest")
        .ok_or(EffectParseError::MissingComparator)?;
    let metric_tok = toks
        .get(comparator_at + 1)
        .ok_or(EffectParseError::MissingComparator)?;
    let metric = match metric_tok.as_str() {
        "piece" | "pieces" => Metric::Pieces,
        "shield" | "shields" => Metric::Shields,
        other => return Err(EffectParseError::UnknownMetric(other.to_string())),
    };
    Ok(Condition {
        comparator: Comparator::Least,
        metric,
    })
}
