use crate::registry::{Registry, Requirement};
use crate::stats::StatStore;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// What the view needs to play back a performed action.
#[derive(Clone, Debug, PartialEq)]
pub struct ActionOutcome {
    pub action_id: String,
    pub animation: String,
    pub animation_duration: Duration,
    pub food_particle: String,
}

impl Requirement {
    pub fn is_met(&self, stats: &StatStore) -> bool {
        match self {
            Requirement::Always => true,
            Requirement::StatBelow { stat_id, value } => stats.get_value(stat_id) < *value,
            Requirement::StatAtLeast { stat_id, value } => stats.get_value(stat_id) >= *value,
        }
    }
}

pub struct ActionsManager {
    registry: Rc<Registry>,
    species: Option<String>,
    cooldowns: HashMap<String, Instant>,
}

impl ActionsManager {
    pub fn new(registry: Rc<Registry>) -> Self {
        Self {
            registry,
            species: None,
            cooldowns: HashMap::new(),
        }
    }

    pub fn set_species(&mut self, species_id: Option<&str>) {
        self.species = species_id.map(str::to_string);
    }

    pub fn is_on_cooldown(&self, action_id: &str, now: Instant) -> bool {
        self.cooldowns
            .get(action_id)
            .is_some_and(|until| now < *until)
    }

    /// Time left before `action_id` can run again.
    pub fn cooldown_remaining(&self, action_id: &str, now: Instant) -> Duration {
        self.cooldowns
            .get(action_id)
            .map(|until| until.saturating_duration_since(now))
            .unwrap_or(Duration::ZERO)
    }

    pub fn can_perform(&self, action_id: &str, stats: &StatStore, now: Instant) -> bool {
        let Some(action) = self.registry.action(action_id) else {
            return false;
        };
        !self.is_on_cooldown(action_id, now) && action.requirement.is_met(stats)
    }

    /// Applies the action's effects in order. `None` when it is unknown,
    /// cooling down, or its requirement fails.
    pub fn perform(
        &mut self,
        action_id: &str,
        stats: &mut StatStore,
        now: Instant,
    ) -> Option<ActionOutcome> {
        if !self.can_perform(action_id, stats, now) {
            return None;
        }
        let registry = Rc::clone(&self.registry);
        let action = registry.action(action_id)?;

        for effect in &action.effects {
            stats.modify_stat(&effect.stat_id, effect.amount);
        }

        if action.cooldown_ms > 0 {
            self.cooldowns.insert(
                action_id.to_string(),
                now + Duration::from_millis(action.cooldown_ms),
            );
        }

        let favorite = if action.uses_favorite_food {
            self.species
                .as_deref()
                .and_then(|sp| registry.favorite_food(sp))
        } else {
            None
        };
        let food_particle = favorite.unwrap_or(action.food_particle.as_str()).to_string();

        log::debug!("performed {action_id}");
        Some(ActionOutcome {
            action_id: action_id.to_string(),
            animation: action.animation.clone(),
            animation_duration: Duration::from_millis(action.animation_duration_ms),
            food_particle,
        })
    }

    pub fn reset_cooldowns(&mut self) {
        self.cooldowns.clear();
    }

    pub fn reset(&mut self) {
        self.species = None;
        self.reset_cooldowns();
    }
}
