//! Static content tables: stats, species and actions.
//!
//! The registry is built once at startup and shared read-only. Every lookup
//! returns an `Option`; the only silent fallback is the trait multiplier,
//! which callers default to 1.0.

use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum RegistryError {
    #[error("stat '{0}' is registered twice")]
    DuplicateStat(String),

    #[error("stat '{id}' has start value {start} outside [{min}, {max}]")]
    StartOutOfRange {
        id: String,
        start: f64,
        min: f64,
        max: f64,
    },

    #[error("stat '{0}' has a negative or non-finite decay rate")]
    InvalidDecayRate(String),

    #[error("species '{species}' has a non-positive multiplier for '{key}'")]
    InvalidMultiplier { species: String, key: String },

    #[error("species '{species}' defaults to unknown color '{color}'")]
    UnknownDefaultColor { species: String, color: String },
}

#[derive(Clone, Debug, PartialEq)]
pub struct StatDefinition {
    pub id: String,
    pub name: String,
    pub icon: String,
    /// Amount removed per decay interval at multiplier 1.0.
    pub base_decay_rate: f64,
    pub trait_multiplier_key: String,
    pub start_value: f64,
    pub min: f64,
    pub max: f64,
}

impl StatDefinition {
    pub fn clamp(&self, value: f64) -> f64 {
        value.max(self.min).min(self.max)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct PetColor {
    pub id: String,
    pub name: String,
    pub primary: String,
    pub secondary: String,
    pub accent: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Species {
    pub id: String,
    pub name: String,
    pub traits: BTreeMap<String, f64>,
    pub favorite_food: Option<String>,
    pub colors: Vec<PetColor>,
    pub default_color: String,
}

impl Species {
    pub fn color(&self, color_id: &str) -> Option<&PetColor> {
        self.colors.iter().find(|c| c.id == color_id)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Effect {
    pub stat_id: String,
    pub amount: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Requirement {
    Always,
    StatBelow { stat_id: String, value: f64 },
    StatAtLeast { stat_id: String, value: f64 },
}

#[derive(Clone, Debug, PartialEq)]
pub struct ActionDefinition {
    pub id: String,
    pub name: String,
    pub icon: String,
    pub effects: Vec<Effect>,
    pub animation: String,
    pub animation_duration_ms: u64,
    pub food_particle: String,
    /// Swap `food_particle` for the species' favorite food when it has one.
    pub uses_favorite_food: bool,
    pub cooldown_ms: u64,
    pub requirement: Requirement,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Registry {
    stats: Vec<StatDefinition>,
    species: Vec<Species>,
    actions: Vec<ActionDefinition>,
}

impl Registry {
    /// Builds a registry after checking the table invariants.
    pub fn new(
        stats: Vec<StatDefinition>,
        species: Vec<Species>,
        actions: Vec<ActionDefinition>,
    ) -> Result<Self, RegistryError> {
        for (i, stat) in stats.iter().enumerate() {
            if stats[..i].iter().any(|s| s.id == stat.id) {
                return Err(RegistryError::DuplicateStat(stat.id.clone()));
            }
            if !(stat.min <= stat.start_value && stat.start_value <= stat.max) {
                return Err(RegistryError::StartOutOfRange {
                    id: stat.id.clone(),
                    start: stat.start_value,
                    min: stat.min,
                    max: stat.max,
                });
            }
            if !stat.base_decay_rate.is_finite() || stat.base_decay_rate < 0.0 {
                return Err(RegistryError::InvalidDecayRate(stat.id.clone()));
            }
        }
        for sp in &species {
            if let Some((key, _)) = sp.traits.iter().find(|(_, m)| !(**m > 0.0)) {
                return Err(RegistryError::InvalidMultiplier {
                    species: sp.id.clone(),
                    key: key.clone(),
                });
            }
            if sp.color(&sp.default_color).is_none() {
                return Err(RegistryError::UnknownDefaultColor {
                    species: sp.id.clone(),
                    color: sp.default_color.clone(),
                });
            }
        }
        Ok(Self {
            stats,
            species,
            actions,
        })
    }

    pub fn stats(&self) -> &[StatDefinition] {
        &self.stats
    }

    pub fn stat(&self, stat_id: &str) -> Option<&StatDefinition> {
        self.stats.iter().find(|s| s.id == stat_id)
    }

    pub fn species_list(&self) -> &[Species] {
        &self.species
    }

    pub fn species(&self, species_id: &str) -> Option<&Species> {
        self.species.iter().find(|s| s.id == species_id)
    }

    pub fn species_exists(&self, species_id: &str) -> bool {
        self.species(species_id).is_some()
    }

    /// Raw multiplier lookup; `None` when the species or the key is unknown.
    pub fn trait_multiplier(&self, species_id: &str, key: &str) -> Option<f64> {
        self.species(species_id)?.traits.get(key).copied()
    }

    pub fn color(&self, species_id: &str, color_id: &str) -> Option<&PetColor> {
        self.species(species_id)?.color(color_id)
    }

    pub fn default_color(&self, species_id: &str) -> Option<&str> {
        self.species(species_id).map(|s| s.default_color.as_str())
    }

    pub fn favorite_food(&self, species_id: &str) -> Option<&str> {
        self.species(species_id)?.favorite_food.as_deref()
    }

    pub fn actions(&self) -> &[ActionDefinition] {
        &self.actions
    }

    pub fn action(&self, action_id: &str) -> Option<&ActionDefinition> {
        self.actions.iter().find(|a| a.id == action_id)
    }

    /// The built-in content: three stats, three species, three actions.
    pub fn builtin() -> Self {
        Self {
            stats: builtin_stats(),
            species: builtin_species(),
            actions: builtin_actions(),
        }
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::builtin()
    }
}

fn stat(id: &str, name: &str, icon: &str, decay: f64, key: &str) -> StatDefinition {
    StatDefinition {
        id: id.to_string(),
        name: name.to_string(),
        icon: icon.to_string(),
        base_decay_rate: decay,
        trait_multiplier_key: key.to_string(),
        start_value: 100.0,
        min: 0.0,
        max: 100.0,
    }
}

fn builtin_stats() -> Vec<StatDefinition> {
    vec![
        stat("hunger", "Hunger", "🍗", 2.0, "hungerDecayMultiplier"),
        stat("happiness", "Happiness", "😊", 1.5, "happinessDecayMultiplier"),
        stat("energy", "Energy", "⚡", 1.0, "energyDecayMultiplier"),
    ]
}

fn color(id: &str, name: &str, primary: &str, secondary: &str, accent: &str) -> PetColor {
    PetColor {
        id: id.to_string(),
        name: name.to_string(),
        primary: primary.to_string(),
        secondary: secondary.to_string(),
        accent: accent.to_string(),
    }
}

fn bright_blue() -> PetColor {
    color("blue", "Bright Blue", "#00bfff", "#0099cc", "#006699")
}

// dogs and capybaras share a coat palette
fn coat_palette() -> Vec<PetColor> {
    vec![
        color("tan", "Tan", "#deb887", "#c19a6b", "#8b6914"),
        color("golden", "Golden", "#f4d03f", "#d4ac0d", "#9a7d0a"),
        color("chocolate", "Chocolate", "#8b5a2b", "#6b4423", "#4a2c17"),
        color("white", "White", "#f5f5f5", "#e0e0e0", "#a0a0a0"),
        color("black", "Black", "#4a4a4a", "#333333", "#1a1a1a"),
        bright_blue(),
    ]
}

fn species(
    id: &str,
    name: &str,
    hunger: f64,
    happiness: f64,
    favorite_food: &str,
    colors: Vec<PetColor>,
    default_color: &str,
) -> Species {
    let mut traits = BTreeMap::new();
    traits.insert("hungerDecayMultiplier".to_string(), hunger);
    traits.insert("happinessDecayMultiplier".to_string(), happiness);
    Species {
        id: id.to_string(),
        name: name.to_string(),
        traits,
        favorite_food: Some(favorite_food.to_string()),
        colors,
        default_color: default_color.to_string(),
    }
}

fn builtin_species() -> Vec<Species> {
    let cat_colors = vec![
        color("gray", "Gray", "#a0a0a0", "#808080", "#909090"),
        color("orange", "Orange Tabby", "#e67e22", "#d35400", "#ba4a00"),
        color("black", "Black", "#3d3d3d", "#2a2a2a", "#1a1a1a"),
        color("white", "White", "#f5f5f5", "#e8e8e8", "#d0d0d0"),
        color("siamese", "Siamese", "#f5e6d3", "#e8d4bc", "#6b4423"),
        bright_blue(),
    ];
    vec![
        species("dog", "Dog", 1.2, 0.8, "🦴", coat_palette(), "tan"),
        species("cat", "Cat", 0.9, 1.1, "🐟", cat_colors, "gray"),
        species("capybara", "Capybara", 1.0, 0.6, "🍉", coat_palette(), "tan"),
    ]
}

fn builtin_actions() -> Vec<ActionDefinition> {
    vec![
        ActionDefinition {
            id: "feed".to_string(),
            name: "Feed".to_string(),
            icon: "🍖".to_string(),
            effects: vec![Effect {
                stat_id: "hunger".to_string(),
                amount: 25.0,
            }],
            animation: "pet-eating".to_string(),
            animation_duration_ms: 900,
            food_particle: "🍖".to_string(),
            uses_favorite_food: true,
            cooldown_ms: 0,
            requirement: Requirement::StatBelow {
                stat_id: "hunger".to_string(),
                value: 100.0,
            },
        },
        ActionDefinition {
            id: "play".to_string(),
            name: "Play".to_string(),
            icon: "🎾".to_string(),
            effects: vec![
                Effect {
                    stat_id: "happiness".to_string(),
                    amount: 20.0,
                },
                Effect {
                    stat_id: "energy".to_string(),
                    amount: -10.0,
                },
            ],
            animation: "pet-playing".to_string(),
            animation_duration_ms: 1200,
            food_particle: "🎾".to_string(),
            uses_favorite_food: false,
            cooldown_ms: 3000,
            requirement: Requirement::StatAtLeast {
                stat_id: "energy".to_string(),
                value: 10.0,
            },
        },
        ActionDefinition {
            id: "sleep".to_string(),
            name: "Sleep".to_string(),
            icon: "😴".to_string(),
            effects: vec![
                Effect {
                    stat_id: "energy".to_string(),
                    amount: 30.0,
                },
                Effect {
                    stat_id: "hunger".to_string(),
                    amount: -5.0,
                },
            ],
            animation: "pet-sleeping".to_string(),
            animation_duration_ms: 2000,
            food_particle: "💤".to_string(),
            uses_favorite_food: false,
            cooldown_ms: 5000,
            requirement: Requirement::StatBelow {
                stat_id: "energy".to_string(),
                value: 100.0,
            },
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_tables_pass_validation() {
        let r = Registry::builtin();
        let checked = Registry::new(
            r.stats().to_vec(),
            r.species_list().to_vec(),
            r.actions().to_vec(),
        );
        assert_eq!(checked, Ok(r));
    }

    #[test]
    fn trait_multiplier_is_none_for_unknown_species_or_key() {
        let r = Registry::builtin();
        assert_eq!(r.trait_multiplier("dog", "hungerDecayMultiplier"), Some(1.2));
        assert_eq!(r.trait_multiplier("dog", "energyDecayMultiplier"), None);
        assert_eq!(r.trait_multiplier("dragon", "hungerDecayMultiplier"), None);
    }

    #[test]
    fn lookups_return_none_for_unknown_ids() {
        let r = Registry::builtin();
        assert!(r.stat("thirst").is_none());
        assert!(r.action("dance").is_none());
        assert!(!r.species_exists("dragon"));
        assert!(r.color("cat", "tan").is_none());
        assert_eq!(r.default_color("cat"), Some("gray"));
        assert_eq!(r.favorite_food("capybara"), Some("🍉"));
    }

    #[test]
    fn rejects_start_value_outside_bounds() {
        let mut s = stat("mood", "Mood", "?", 1.0, "moodDecayMultiplier");
        s.start_value = 150.0;
        let err = Registry::new(vec![s], Vec::new(), Vec::new()).unwrap_err();
        assert!(matches!(err, RegistryError::StartOutOfRange { .. }));
    }

    #[test]
    fn rejects_duplicates_and_bad_multipliers() {
        let s = stat("mood", "Mood", "?", 1.0, "moodDecayMultiplier");
        let err = Registry::new(vec![s.clone(), s], Vec::new(), Vec::new()).unwrap_err();
        assert_eq!(err, RegistryError::DuplicateStat("mood".to_string()));

        let mut sp = builtin_species().remove(0);
        sp.traits.insert("moodDecayMultiplier".to_string(), 0.0);
        let err = Registry::new(Vec::new(), vec![sp], Vec::new()).unwrap_err();
        assert!(matches!(err, RegistryError::InvalidMultiplier { .. }));
    }
}
