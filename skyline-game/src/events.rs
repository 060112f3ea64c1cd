//! Round event deck and the multiplier map derived from an event.

use std::collections::BTreeMap;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::constants::ALL_BUILDINGS_KEY;
use crate::rng::pick_index;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Boom,
    Recession,
    Disaster,
    Policy,
    Special,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mood {
    Positive,
    Negative,
    Mixed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventEffect {
    BuildingMultiplier { building_id: String, multiplier: f64 },
    AllMultiplier { multiplier: f64 },
    BonusCoins { amount: i64 },
    BonusScore { amount: i64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventCard {
    pub id: String,
    pub kind: EventKind,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub icon: String,
    pub mood: Mood,
    pub effects: Vec<EventEffect>,
}

impl EventCard {
    /// Flat coins every player receives, outside the income pipeline.
    #[must_use]
    pub fn bonus_coins(&self) -> i64 {
        self.effects
            .iter()
            .map(|effect| match effect {
                EventEffect::BonusCoins { amount } => *amount,
                _ => 0,
            })
            .sum()
    }

    #[must_use]
    pub fn bonus_score(&self) -> i64 {
        self.effects
            .iter()
            .map(|effect| match effect {
                EventEffect::BonusScore { amount } => *amount,
                _ => 0,
            })
            .sum()
    }
}

/// Income multipliers for one round. A building's factor is its specific
/// multiplier times the global one; missing entries are 1.0.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventMultipliers {
    pub per_building: BTreeMap<String, f64>,
    pub all: Option<f64>,
}

impl EventMultipliers {
    /// Later effects for the same key replace earlier ones.
    #[must_use]
    pub fn from_event(card: &EventCard) -> Self {
        let mut out = Self::default();
        for effect in &card.effects {
            match effect {
                EventEffect::BuildingMultiplier {
                    building_id,
                    multiplier,
                } => {
                    out.per_building.insert(building_id.clone(), *multiplier);
                }
                EventEffect::AllMultiplier { multiplier } => out.all = Some(*multiplier),
                EventEffect::BonusCoins { .. } | EventEffect::BonusScore { .. } => {}
            }
        }
        out
    }

    #[must_use]
    pub fn for_building(&self, building_id: &str) -> f64 {
        let specific = self.per_building.get(building_id).copied().unwrap_or(1.0);
        specific * self.all.unwrap_or(1.0)
    }

    /// True when any factor would reduce income.
    #[must_use]
    pub fn has_penalty(&self) -> bool {
        self.per_building.values().any(|m| *m < 1.0) || self.all.is_some_and(|m| m < 1.0)
    }

    /// Copy with every factor below 1.0 raised to 1.0.
    #[must_use]
    pub fn shielded(&self) -> Self {
        Self {
            per_building: self
                .per_building
                .iter()
                .map(|(id, m)| (id.clone(), m.max(1.0)))
                .collect(),
            all: self.all.map(|m| m.max(1.0)),
        }
    }

    /// Flat map form, with the global factor under the reserved `_all` key.
    #[must_use]
    pub fn as_map(&self) -> BTreeMap<String, f64> {
        let mut map = self.per_building.clone();
        if let Some(all) = self.all {
            map.insert(ALL_BUILDINGS_KEY.to_string(), all);
        }
        map
    }
}

/// Uniform draw from the deck.
pub fn draw_event<'a, R: Rng + ?Sized>(deck: &'a [EventCard], rng: &mut R) -> Option<&'a EventCard> {
    pick_index(rng, deck.len()).and_then(|idx| deck.get(idx))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::mock::StepRng;

    fn card(effects: Vec<EventEffect>) -> EventCard {
        EventCard {
            id: "TEST".into(),
            kind: EventKind::Special,
            title: "Test".into(),
            description: String::new(),
            icon: "🧪".into(),
            mood: Mood::Mixed,
            effects,
        }
    }

    #[test]
    fn specific_and_global_multipliers_compose() {
        let event = card(vec![
            EventEffect::BuildingMultiplier {
                building_id: "HOUSE".into(),
                multiplier: 2.0,
            },
            EventEffect::AllMultiplier { multiplier: 1.3 },
        ]);
        let m = EventMultipliers::from_event(&event);
        assert!((m.for_building("HOUSE") - 2.6).abs() < 1e-9);
        assert!((m.for_building("SHOP") - 1.3).abs() < 1e-9);
        assert_eq!(m.as_map().get(ALL_BUILDINGS_KEY), Some(&1.3));
    }

    #[test]
    fn zero_multiplier_is_kept() {
        let event = card(vec![EventEffect::BuildingMultiplier {
            building_id: "PARK".into(),
            multiplier: 0.0,
        }]);
        let m = EventMultipliers::from_event(&event);
        assert!(m.for_building("PARK").abs() < f64::EPSILON);
        assert!(m.has_penalty());
        assert!((m.shielded().for_building("PARK") - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn bonuses_are_summed_separately() {
        let event = card(vec![
            EventEffect::BonusCoins { amount: 100 },
            EventEffect::BonusScore { amount: 50 },
        ]);
        assert_eq!(event.bonus_coins(), 100);
        assert_eq!(event.bonus_score(), 50);
        assert!(!EventMultipliers::from_event(&event).has_penalty());
    }

    #[test]
    fn draw_from_empty_deck_is_none() {
        let mut rng = StepRng::new(0, 0);
        assert!(draw_event(&[], &mut rng).is_none());
        let deck = vec![card(vec![])];
        assert_eq!(draw_event(&deck, &mut rng).map(|c| c.id.as_str()), Some("TEST"));
    }
}
