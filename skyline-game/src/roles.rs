//! Player roles and their skills.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::buildings::Category;

/// Fixed role enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoleId {
    Architect,
    Merchant,
    Engineer,
    Environmentalist,
    Dreamer,
    Landlord,
    Shopkeeper,
    FactoryManager,
    CivicLeader,
    Explorer,
    Adventurer,
    Lucky,
}

impl RoleId {
    pub const ALL: [Self; 12] = [
        Self::Architect,
        Self::Merchant,
        Self::Engineer,
        Self::Environmentalist,
        Self::Dreamer,
        Self::Landlord,
        Self::Shopkeeper,
        Self::FactoryManager,
        Self::CivicLeader,
        Self::Explorer,
        Self::Adventurer,
        Self::Lucky,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Architect => "ARCHITECT",
            Self::Merchant => "MERCHANT",
            Self::Engineer => "ENGINEER",
            Self::Environmentalist => "ENVIRONMENTALIST",
            Self::Dreamer => "DREAMER",
            Self::Landlord => "LANDLORD",
            Self::Shopkeeper => "SHOPKEEPER",
            Self::FactoryManager => "FACTORY_MANAGER",
            Self::CivicLeader => "CIVIC_LEADER",
            Self::Explorer => "EXPLORER",
            Self::Adventurer => "ADVENTURER",
            Self::Lucky => "LUCKY",
        }
    }
}

impl fmt::Display for RoleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single passive skill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RoleSkill {
    /// Fractional discount on buildings of one category.
    CostReduction { category: Category, value: f64 },
    /// Fractional bonus on income from one category.
    IncomeBonus { category: Category, value: f64 },
    /// Chance per purchase to apply `discount` to any building.
    RandomDiscount { chance: f64, discount: f64 },
    /// Chance per round to multiply the whole round income.
    RandomIncomeBonus { chance: f64, multiplier: f64 },
}

pub type SkillSet = SmallVec<[RoleSkill; 2]>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Role {
    pub id: RoleId,
    pub name: String,
    pub emoji: String,
    pub description: String,
    pub skills: SkillSet,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
struct RoleNoId {
    name: String,
    emoji: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    skills: SkillSet,
}

impl Role {
    fn with_id(id: RoleId, r: RoleNoId) -> Self {
        Self {
            id,
            name: r.name,
            emoji: r.emoji,
            description: r.description,
            skills: r.skills,
        }
    }

    /// Category-targeted cost reduction, if the role has one for `category`.
    #[must_use]
    pub fn cost_reduction_for(&self, category: Category) -> Option<f64> {
        self.skills.iter().find_map(|skill| match skill {
            RoleSkill::CostReduction { category: c, value } if *c == category => Some(*value),
            _ => None,
        })
    }

    #[must_use]
    pub fn income_bonus_for(&self, category: Category) -> Option<f64> {
        self.skills.iter().find_map(|skill| match skill {
            RoleSkill::IncomeBonus { category: c, value } if *c == category => Some(*value),
            _ => None,
        })
    }

    /// `(chance, discount)` of the random half-price skill.
    #[must_use]
    pub fn random_discount(&self) -> Option<(f64, f64)> {
        self.skills.iter().find_map(|skill| match skill {
            RoleSkill::RandomDiscount { chance, discount } => Some((*chance, *discount)),
            _ => None,
        })
    }

    /// `(chance, multiplier)` of the lucky income skill.
    #[must_use]
    pub fn random_income_bonus(&self) -> Option<(f64, f64)> {
        self.skills.iter().find_map(|skill| match skill {
            RoleSkill::RandomIncomeBonus { chance, multiplier } => Some((*chance, *multiplier)),
            _ => None,
        })
    }
}

/// Roles in canonical [`RoleId::ALL`] order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct RolesList(pub Vec<Role>);

impl RolesList {
    #[must_use]
    pub const fn empty() -> Self {
        Self(vec![])
    }

    /// Load roles from a JSON object keyed by role id.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON cannot be parsed into valid role data.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let map: HashMap<String, RoleNoId> = serde_json::from_str(json)?;
        let mut v = Vec::with_capacity(RoleId::ALL.len());
        for id in RoleId::ALL {
            if let Some(r) = map.get(id.as_str()) {
                v.push(Role::with_id(id, r.clone()));
            }
        }
        Ok(Self(v))
    }

    #[must_use]
    pub fn get(&self, id: RoleId) -> Option<&Role> {
        self.0.iter().find(|r| r.id == id)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Role> {
        self.0.iter()
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'a> IntoIterator for &'a RolesList {
    type Item = &'a Role;
    type IntoIter = std::slice::Iter<'a, Role>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
