//! Static card catalog.
//!
//! The catalog is embedded JSON, parsed and validated once at startup and
//! shared read-only across sessions (`Arc<Catalog>`). Validation parses
//! every effect string eagerly, so a typo in card data is a startup error
//! rather than a dead card at runtime.

use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::effect::{parse_effect, Effect, EffectParseError};

const CARDS_JSON: &str = include_str!("../../data/cards.json");

/// Index of a card within the catalog.
pub type CardId = u16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rarity {
    Common,
    Rare,
    Epic,
}

impl Rarity {
    /// Copies of a card in a fresh deck.
    pub fn deck_copies(self) -> usize {
        match self {
            Rarity::Common => 3,
            Rarity::Rare => 2,
            Rarity::Epic => 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Card {
    pub name: String,
    pub rarity: Rarity,
    pub effects: Vec<String>,
    #[serde(skip)]
    pub parsed: Vec<Effect>,
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("bad card data: {0}")]
    Data(#[from] serde_json::Error),
    #[error("card `{name}`: {source}")]
    Effect {
        name: String,
        source: EffectParseError,
    },
    #[error("duplicate card name `{0}`")]
    DuplicateName(String),
}

#[derive(Debug)]
pub struct Catalog {
    cards: Vec<Card>,
}

impl Catalog {
    /// Parse and validate the embedded card data.
    pub fn load() -> Result<Self, CatalogError> {
        Self::from_json(CARDS_JSON)
    }

    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let mut cards: Vec<Card> = serde_json::from_str(json)?;
        for card in cards.iter_mut() {
            card.parsed = card
                .effects
                .iter()
                .map(|text| parse_effect(text))
                .collect::<Result<_, _>>()
                .map_err(|source| CatalogError::Effect {
                    name: card.name.clone(),
                    source,
                })?;
        }
        for (i, card) in cards.iter().enumerate() {
            if cards[..i].iter().any(|c| c.name == card.name) {
                return Err(CatalogError::DuplicateName(card.name.clone()));
            }
        }
        Ok(Self { cards })
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn card(&self, id: CardId) -> &Card {
        &self.cards[id as usize]
    }

    pub fn find(&self, name: &str) -> Option<CardId> {
        self.cards
            .iter()
            .position(|c| c.name == name)
            .map(|i| i as CardId)
    }

    /// Build a fresh shuffled deck: each card repeated per its rarity.
    pub fn shuffled_deck(&self, rng: &mut impl rand::Rng) -> Vec<CardId> {
        let mut deck: Vec<CardId> = self
            .cards
            .iter()
            .enumerate()
            .flat_map(|(id, card)| {
                std::iter::repeat(id as CardId).take(card.rarity.deck_copies())
            })
            .collect();
        deck.shuffle(rng);
        deck
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_catalog_loads_and_validates() {
        let catalog = Catalog::load().unwrap();
        assert!(!catalog.is_empty());
        for id in 0..catalog.len() {
            let card = catalog.card(id as CardId);
            assert_eq!(card.parsed.len(), card.effects.len());
        }
    }

    #[test]
    fn floods_is_present() {
        let catalog = Catalog::load().unwrap();
        let id = catalog.find("Floods").unwrap();
        assert_eq!(catalog.card(id).effects.len(), 2);
    }

    #[test]
    fn bad_effect_string_fails_load() {
        let json = r#"[{ "name": "Broken", "rarity": "common", "effects": ["Summon a dragon"] }]"#;
        assert!(matches!(
            Catalog::from_json(json),
            Err(CatalogError::Effect { .. })
        ));
    }

    #[test]
    fn duplicate_names_fail_load() {
        let json = r#"[
            { "name": "Twin", "rarity": "common", "effects": ["Draw a card"] },
            { "name": "Twin", "rarity": "rare", "effects": ["Draw 2 cards"] }
        ]"#;
        assert!(matches!(
            Catalog::from_json(json),
            Err(CatalogError::DuplicateName(_))
        ));
    }

    #[test]
    fn deck_respects_rarity_copies() {
        let catalog = Catalog::load().unwrap();
        let mut rng = rand::thread_rng();
        let deck = catalog.shuffled_deck(&mut rng);
        let floods = catalog.find("Floods").unwrap();
        let copies = deck.iter().filter(|&&id| id == floods).count();
        assert_eq!(copies, Rarity::Rare.deck_copies());
    }
}
