//! Trait and flaw catalog.
//!
//! The two fixed lists a character draws from. Each list must be non-empty
//! and free of duplicates; the same text may appear in both lists since they
//! are separate categories tracked independently.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Which list an item is drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolKind {
    Trait,
    Flaw,
}

impl PoolKind {
    /// Draw order used by the command: trait first, then flaw.
    pub const ALL: [PoolKind; 2] = [PoolKind::Trait, PoolKind::Flaw];

    pub fn label(self) -> &'static str {
        match self {
            Self::Trait => "trait",
            Self::Flaw => "flaw",
        }
    }
}

impl fmt::Display for PoolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One immutable entry of a list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Item(String);

impl Item {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Item {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

const BUILTIN_TRAITS: [&str; 10] = [
    "L'un de vos sens est exceptionnellement développé. (Vue, ouïe, odorat… à vous de choisir.)",
    "Votre corps est d'une résistance impressionnante. (Vous encaissez mieux les coups et la fatigue.)",
    "Vous êtes particulièrement souple. (Passer dans des espaces exigus ou esquiver est plus aisé.)",
    "Vos réflexes sont d'une précision remarquable. (Votre corps réagit plus vite que votre pensée.)",
    "Votre musculature est bien au-dessus de la moyenne. (Force physique accrue.)",
    "Vous êtes incroyablement endurant. (Fatigue physique retardée, courses prolongées possibles.)",
    "Votre corps se remet vite des blessures. (Cicatrisation accélérée, douleurs moins handicapantes.)",
    "Vous avez une coordination parfaite. (Aucune maladresse, mouvements fluides et précis.)",
    "Votre respiration est maîtrisée. (Plongée en apnée, endurance en conditions difficiles.)",
    "Votre voix est captivante et autoritaire. (Difficile à ignorer, parfait pour imposer sa présence.)",
];

const BUILTIN_FLAWS: [&str; 10] = [
    "L'un de vos sens est particulièrement faible. (Vision trouble, mauvaise ouïe, odorat quasi inexistant…)",
    "Votre corps est fragile et supporte mal les blessures. (Moins de résistance aux coups et chocs.)",
    "Vous êtes étonnamment maladroit. (Vos gestes manquent de précision, risque accru de rater des actions fines.)",
    "Vous souffrez d'un handicap physique léger. (Boiterie, bras moins fonctionnel, manque de mobilité…)",
    "Votre force est anormalement basse. (Difficulté à soulever, porter, ou utiliser des objets lourds.)",
    "Votre endurance est limitée. (Vous vous fatiguez plus vite que la normale.)",
    "Votre corps guérit très lentement. (Les blessures, même mineures, mettent du temps à disparaître.)",
    "Vous manquez de coordination. (Vos mouvements sont parfois imprécis ou hésitants.)",
    "Votre respiration est faible. (Difficulté en altitude, en apnée, ou lors d'efforts prolongés.)",
    "Votre voix est faible ou monotone. (Difficile à entendre ou à rendre captivante.)",
];

/// The trait list and the flaw list, in their declared order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    traits: Vec<Item>,
    flaws: Vec<Item>,
}

impl Catalog {
    /// Build a catalog from custom lists.
    pub fn new(traits: Vec<Item>, flaws: Vec<Item>) -> Result<Self, DomainError> {
        validate_list(PoolKind::Trait, &traits)?;
        validate_list(PoolKind::Flaw, &flaws)?;
        Ok(Self { traits, flaws })
    }

    /// The ten "atouts" and ten "défauts" the bot ships with.
    pub fn builtin() -> Self {
        Self {
            traits: BUILTIN_TRAITS.iter().copied().map(Item::from).collect(),
            flaws: BUILTIN_FLAWS.iter().copied().map(Item::from).collect(),
        }
    }

    pub fn items(&self, kind: PoolKind) -> &[Item] {
        match kind {
            PoolKind::Trait => &self.traits,
            PoolKind::Flaw => &self.flaws,
        }
    }
}

fn validate_list(kind: PoolKind, items: &[Item]) -> Result<(), DomainError> {
    if items.is_empty() {
        return Err(DomainError::validation(format!(
            "{kind} list cannot be empty"
        )));
    }

    let mut seen = HashSet::with_capacity(items.len());
    for item in items {
        if !seen.insert(item) {
            return Err(DomainError::validation(format!(
                "duplicate {kind} entry: {item}"
            )));
        }
    }
    Ok(())
}
