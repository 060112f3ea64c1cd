//! Building types, categories and merge-upgrade paths.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Fixed building category enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Residential,
    Commercial,
    Industrial,
    Public,
    Special,
}

impl Category {
    pub const ALL: [Self; 5] = [
        Self::Residential,
        Self::Commercial,
        Self::Industrial,
        Self::Public,
        Self::Special,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Residential => "residential",
            Self::Commercial => "commercial",
            Self::Industrial => "industrial",
            Self::Public => "public",
            Self::Special => "special",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "residential" => Ok(Self::Residential),
            "commercial" => Ok(Self::Commercial),
            "industrial" => Ok(Self::Industrial),
            "public" => Ok(Self::Public),
            "special" => Ok(Self::Special),
            _ => Err(()),
        }
    }
}

/// A purchasable building type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildingDef {
    pub id: String,
    pub name: String,
    pub emoji: String,
    pub category: Category,
    /// Base cost in coins before modifiers.
    pub cost: i64,
    /// Base income per round before modifiers.
    pub income: i64,
    #[serde(default)]
    pub description: String,
}

/// Merge `merge_count` copies of `from` into one `to`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpgradePath {
    pub from: String,
    pub to: String,
    pub merge_count: u32,
    pub bonus_score: i64,
    #[serde(default)]
    pub description: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_round_trips_through_strings() {
        for category in Category::ALL {
            assert_eq!(category.as_str().parse::<Category>(), Ok(category));
        }
        assert_eq!(" Public ".parse::<Category>(), Ok(Category::Public));
        assert!("civic".parse::<Category>().is_err());
    }

    #[test]
    fn building_parses_without_description() {
        let json = r#"{"id":"HOUSE","name":"House","emoji":"🏠","category":"residential","cost":100,"income":15}"#;
        let def: BuildingDef = serde_json::from_str(json).unwrap();
        assert_eq!(def.category, Category::Residential);
        assert!(def.description.is_empty());
    }
}
