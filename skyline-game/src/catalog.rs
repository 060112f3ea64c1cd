//! Read-only game content: buildings, roles, items, achievements, goals,
//! upgrade paths, the event deck and the mini-event table.

use std::collections::HashSet;
use std::sync::{Arc, OnceLock};

use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::achievements::{AchievementDef, Condition};
use crate::buildings::{BuildingDef, Category, UpgradePath};
use crate::events::{EventCard, EventEffect};
use crate::goals::{CityGoalDef, GoalTarget};
use crate::items::{ItemDef, ItemEffect};
use crate::mini_events::MiniEventDef;
use crate::roles::{Role, RoleId, RolesList};

const BUILDINGS_DATA: &str = include_str!("../assets/data/buildings.json");
const ROLES_DATA: &str = include_str!("../assets/data/roles.json");
const ITEMS_DATA: &str = include_str!("../assets/data/items.json");
const ACHIEVEMENTS_DATA: &str = include_str!("../assets/data/achievements.json");
const CITY_GOALS_DATA: &str = include_str!("../assets/data/city_goals.json");
const UPGRADES_DATA: &str = include_str!("../assets/data/upgrades.json");
const EVENTS_DATA: &str = include_str!("../assets/data/events.json");
const MINI_EVENTS_DATA: &str = include_str!("../assets/data/mini_events.json");

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to parse {section} catalog: {source}")]
    Parse {
        section: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("duplicate {section} id `{id}`")]
    Duplicate { section: &'static str, id: String },
    #[error("{section} entry `{id}` references unknown building `{building}`")]
    UnknownBuilding {
        section: &'static str,
        id: String,
        building: String,
    },
    #[error("role {0} is missing from the role catalog")]
    MissingRole(RoleId),
    #[error("upgrade path from `{0}` must merge at least one building")]
    ZeroMerge(String),
    #[error("mini event `{0}` has zero weight")]
    ZeroWeight(String),
    #[error("the {0} catalog is empty")]
    Empty(&'static str),
}

/// Raw JSON for every catalog section.
#[derive(Debug, Clone, Copy)]
pub struct CatalogSources<'a> {
    pub buildings: &'a str,
    pub roles: &'a str,
    pub items: &'a str,
    pub achievements: &'a str,
    pub city_goals: &'a str,
    pub upgrades: &'a str,
    pub events: &'a str,
    pub mini_events: &'a str,
}

impl CatalogSources<'static> {
    /// The assets compiled into the crate.
    pub const EMBEDDED: Self = Self {
        buildings: BUILDINGS_DATA,
        roles: ROLES_DATA,
        items: ITEMS_DATA,
        achievements: ACHIEVEMENTS_DATA,
        city_goals: CITY_GOALS_DATA,
        upgrades: UPGRADES_DATA,
        events: EVENTS_DATA,
        mini_events: MINI_EVENTS_DATA,
    };
}

#[derive(Debug, Clone, PartialEq)]
pub struct Catalog {
    buildings: Vec<BuildingDef>,
    roles: RolesList,
    items: Vec<ItemDef>,
    achievements: Vec<AchievementDef>,
    city_goals: Vec<CityGoalDef>,
    upgrades: Vec<UpgradePath>,
    events: Vec<EventCard>,
    mini_events: Vec<MiniEventDef>,
}

fn parse_section<T: DeserializeOwned>(section: &'static str, json: &str) -> Result<T, CatalogError> {
    serde_json::from_str(json).map_err(|source| CatalogError::Parse { section, source })
}

impl Catalog {
    /// Parse and validate every section.
    ///
    /// # Errors
    ///
    /// Returns an error if any section is malformed or cross references are broken.
    pub fn from_sources(sources: &CatalogSources<'_>) -> Result<Self, CatalogError> {
        let roles = RolesList::from_json(sources.roles)
            .map_err(|source| CatalogError::Parse { section: "roles", source })?;
        let catalog = Self {
            buildings: parse_section("buildings", sources.buildings)?,
            roles,
            items: parse_section("items", sources.items)?,
            achievements: parse_section("achievements", sources.achievements)?,
            city_goals: parse_section("city goals", sources.city_goals)?,
            upgrades: parse_section("upgrades", sources.upgrades)?,
            events: parse_section("events", sources.events)?,
            mini_events: parse_section("mini events", sources.mini_events)?,
        };
        catalog.validate()?;
        Ok(catalog)
    }

    /// Load the embedded assets.
    ///
    /// # Errors
    ///
    /// Returns an error if the embedded assets fail validation.
    pub fn load_from_static() -> Result<Self, CatalogError> {
        Self::from_sources(&CatalogSources::EMBEDDED)
    }

    /// Shared, lazily parsed copy of the embedded catalog.
    ///
    /// # Errors
    ///
    /// Returns an error if the embedded assets fail validation.
    pub fn embedded() -> Result<Arc<Self>, CatalogError> {
        static CATALOG: OnceLock<Arc<Catalog>> = OnceLock::new();
        if let Some(catalog) = CATALOG.get() {
            return Ok(Arc::clone(catalog));
        }
        let loaded = Arc::new(Self::load_from_static()?);
        Ok(Arc::clone(CATALOG.get_or_init(|| loaded)))
    }

    /// Check ids are unique and every cross reference resolves.
    ///
    /// # Errors
    ///
    /// Returns the first inconsistency found.
    pub fn validate(&self) -> Result<(), CatalogError> {
        if self.buildings.is_empty() {
            return Err(CatalogError::Empty("buildings"));
        }
        unique_ids("buildings", self.buildings.iter().map(|b| b.id.as_str()))?;
        unique_ids("items", self.items.iter().map(|i| i.id.as_str()))?;
        unique_ids("achievements", self.achievements.iter().map(|a| a.id.as_str()))?;
        unique_ids("city goals", self.city_goals.iter().map(|g| g.id.as_str()))?;
        unique_ids("upgrades", self.upgrades.iter().map(|u| u.from.as_str()))?;
        unique_ids("events", self.events.iter().map(|e| e.id.as_str()))?;
        unique_ids("mini events", self.mini_events.iter().map(|m| m.id.as_str()))?;

        for role in RoleId::ALL {
            if self.roles.get(role).is_none() {
                return Err(CatalogError::MissingRole(role));
            }
        }
        for path in &self.upgrades {
            self.require_building("upgrades", &path.from, &path.from)?;
            self.require_building("upgrades", &path.from, &path.to)?;
            if path.merge_count == 0 {
                return Err(CatalogError::ZeroMerge(path.from.clone()));
            }
        }
        for item in &self.items {
            if let ItemEffect::FreeBuilding { building_id } = &item.effect {
                self.require_building("items", &item.id, building_id)?;
            }
        }
        for def in &self.achievements {
            if let Condition::SpecificBuilding { building_id }
            | Condition::FirstBuilding { building_id } = &def.condition
            {
                self.require_building("achievements", &def.id, building_id)?;
            }
        }
        for goal in &self.city_goals {
            if let GoalTarget::SpecificBuilding { building_id, .. } = &goal.target {
                self.require_building("city goals", &goal.id, building_id)?;
            }
        }
        for event in &self.events {
            for effect in &event.effects {
                if let EventEffect::BuildingMultiplier { building_id, .. } = effect {
                    self.require_building("events", &event.id, building_id)?;
                }
            }
        }
        if let Some(def) = self.mini_events.iter().find(|m| m.weight == 0) {
            return Err(CatalogError::ZeroWeight(def.id.clone()));
        }
        Ok(())
    }

    fn require_building(
        &self,
        section: &'static str,
        id: &str,
        building: &str,
    ) -> Result<(), CatalogError> {
        if self.building(building).is_some() {
            Ok(())
        } else {
            Err(CatalogError::UnknownBuilding {
                section,
                id: id.to_string(),
                building: building.to_string(),
            })
        }
    }

    #[must_use]
    pub fn buildings(&self) -> &[BuildingDef] {
        &self.buildings
    }

    #[must_use]
    pub fn building(&self, id: &str) -> Option<&BuildingDef> {
        self.buildings.iter().find(|b| b.id == id)
    }

    #[must_use]
    pub fn category_of(&self, building_id: &str) -> Option<Category> {
        self.building(building_id).map(|b| b.category)
    }

    #[must_use]
    pub const fn roles(&self) -> &RolesList {
        &self.roles
    }

    #[must_use]
    pub fn role(&self, id: RoleId) -> Option<&Role> {
        self.roles.get(id)
    }

    #[must_use]
    pub fn items(&self) -> &[ItemDef] {
        &self.items
    }

    #[must_use]
    pub fn item(&self, id: &str) -> Option<&ItemDef> {
        self.items.iter().find(|i| i.id == id)
    }

    /// Items cheap enough to drop for free after a purchase.
    #[must_use]
    pub fn cheap_items(&self, max_cost: i64) -> Vec<&ItemDef> {
        self.items.iter().filter(|i| i.cost <= max_cost).collect()
    }

    #[must_use]
    pub fn achievements(&self) -> &[AchievementDef] {
        &self.achievements
    }

    #[must_use]
    pub fn achievement(&self, id: &str) -> Option<&AchievementDef> {
        self.achievements.iter().find(|a| a.id == id)
    }

    #[must_use]
    pub fn city_goals(&self) -> &[CityGoalDef] {
        &self.city_goals
    }

    #[must_use]
    pub fn city_goal(&self, id: &str) -> Option<&CityGoalDef> {
        self.city_goals.iter().find(|g| g.id == id)
    }

    #[must_use]
    pub fn upgrades(&self) -> &[UpgradePath] {
        &self.upgrades
    }

    #[must_use]
    pub fn upgrade_from(&self, building_id: &str) -> Option<&UpgradePath> {
        self.upgrades.iter().find(|u| u.from == building_id)
    }

    #[must_use]
    pub fn events(&self) -> &[EventCard] {
        &self.events
    }

    #[must_use]
    pub fn event(&self, id: &str) -> Option<&EventCard> {
        self.events.iter().find(|e| e.id == id)
    }

    #[must_use]
    pub fn mini_events(&self) -> &[MiniEventDef] {
        &self.mini_events
    }

    #[must_use]
    pub fn mini_event(&self, id: &str) -> Option<&MiniEventDef> {
        self.mini_events.iter().find(|m| m.id == id)
    }
}

fn unique_ids<'a>(
    section: &'static str,
    ids: impl Iterator<Item = &'a str>,
) -> Result<(), CatalogError> {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(CatalogError::Duplicate {
                section,
                id: id.to_string(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_catalog_has_full_content() {
        let catalog = Catalog::load_from_static().unwrap();
        assert_eq!(catalog.buildings().len(), 16);
        assert_eq!(catalog.roles().len(), 12);
        assert_eq!(catalog.items().len(), 10);
        assert_eq!(catalog.achievements().len(), 20);
        assert_eq!(catalog.city_goals().len(), 11);
        assert_eq!(catalog.upgrades().len(), 11);
        assert_eq!(catalog.events().len(), 19);
        assert_eq!(catalog.mini_events().len(), 12);
    }

    #[test]
    fn embedded_is_shared() {
        let a = Catalog::embedded().unwrap();
        let b = Catalog::embedded().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn cheap_items_respect_threshold() {
        let catalog = Catalog::load_from_static().unwrap();
        let ids: Vec<_> = catalog.cheap_items(150).iter().map(|i| i.id.as_str()).collect();
        assert_eq!(
            ids,
            vec!["DISCOUNT_30", "BONUS_100", "FREE_HOUSE", "FREE_SHOP", "LUCKY_DRAW", "SCORE_BOOST"]
        );
    }

    #[test]
    fn known_numbers() {
        let catalog = Catalog::load_from_static().unwrap();
        let house = catalog.building("HOUSE").unwrap();
        assert_eq!((house.cost, house.income), (100, 15));
        assert_eq!(catalog.category_of("SPACEPORT"), Some(Category::Special));
        let landmark = catalog.upgrade_from("LANDMARK").unwrap();
        assert_eq!((landmark.to.as_str(), landmark.merge_count), ("SPACEPORT", 2));
    }

    #[test]
    fn dangling_reference_is_rejected() {
        let sources = CatalogSources {
            upgrades: r#"[{"from":"HOUSE","to":"CASTLE","merge_count":3,"bonus_score":1}]"#,
            ..CatalogSources::EMBEDDED
        };
        let err = Catalog::from_sources(&sources).unwrap_err();
        assert!(matches!(err, CatalogError::UnknownBuilding { ref building, .. } if building == "CASTLE"));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let sources = CatalogSources {
            items: r#"[
                {"id":"X","name":"x","emoji":"x","cost":1,"category":"instant","effect":{"type":"instant_coins","value":1}},
                {"id":"X","name":"x","emoji":"x","cost":1,"category":"instant","effect":{"type":"instant_coins","value":1}}
            ]"#,
            ..CatalogSources::EMBEDDED
        };
        assert!(matches!(
            Catalog::from_sources(&sources),
            Err(CatalogError::Duplicate { section: "items", .. })
        ));
    }

    #[test]
    fn malformed_json_names_section() {
        let sources = CatalogSources {
            events: "{",
            ..CatalogSources::EMBEDDED
        };
        let err = Catalog::from_sources(&sources).unwrap_err();
        assert!(err.to_string().contains("events"));
    }
}
