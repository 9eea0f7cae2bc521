//! Current stat values for the active pet.

use crate::decay::{DecaySchedule, ScheduleState};
use crate::events::{Notifier, SinkId, StatEvent, StatSink};
use crate::registry::Registry;
use std::collections::BTreeMap;
use std::rc::Rc;
use std::time::Instant;

pub type StatValueSet = BTreeMap<String, f64>;

pub struct StatStore {
    registry: Rc<Registry>,
    values: StatValueSet,
    species: Option<String>,
    worried_threshold: f64,
    notifier: Notifier,
    schedule: DecaySchedule,
}

impl StatStore {
    pub fn new(registry: Rc<Registry>, worried_threshold: f64) -> Self {
        let mut store = Self {
            registry,
            values: StatValueSet::new(),
            species: None,
            worried_threshold,
            notifier: Notifier::new(),
            schedule: DecaySchedule::new(),
        };
        store.initialize_stats();
        store
    }

    pub fn subscribe(&mut self, sink: impl StatSink + 'static) -> SinkId {
        self.notifier.subscribe(sink)
    }

    pub fn unsubscribe(&mut self, id: SinkId) -> bool {
        self.notifier.unsubscribe(id)
    }

    pub fn registry(&self) -> &Rc<Registry> {
        &self.registry
    }

    pub fn species(&self) -> Option<&str> {
        self.species.as_deref()
    }

    /// Species whose traits scale the live decay rates.
    pub fn set_species(&mut self, species_id: Option<&str>) {
        self.species = species_id.map(str::to_string);
    }

    pub fn worried_threshold(&self) -> f64 {
        self.worried_threshold
    }

    /// Puts every stat back at its start value without notifying.
    pub fn initialize_stats(&mut self) {
        self.values = self
            .registry
            .stats()
            .iter()
            .map(|s| (s.id.clone(), s.start_value))
            .collect();
    }

    pub fn get_value(&self, stat_id: &str) -> f64 {
        self.values.get(stat_id).copied().unwrap_or(0.0)
    }

    /// Clamps into the stat's bounds and notifies. Unknown stats are ignored.
    pub fn set_value(&mut self, stat_id: &str, value: f64) {
        if value.is_nan() {
            log::debug!("ignoring NaN write to stat '{stat_id}'");
            return;
        }
        let new_value = match self.registry.stat(stat_id) {
            Some(def) => def.clamp(value),
            None => {
                log::debug!("ignoring write to unregistered stat '{stat_id}'");
                return;
            }
        };

        let old_value = self.get_value(stat_id);
        self.values.insert(stat_id.to_string(), new_value);

        self.notifier.emit(&StatEvent::Changed {
            stat_id: stat_id.to_string(),
            old_value,
            new_value,
        });

        // edge-triggered: only the step that crosses down into the band fires
        let worried = self.worried_threshold;
        if new_value <= worried && old_value > worried {
            log::info!("{stat_id} is critically low ({new_value:.1})");
            self.notifier.emit(&StatEvent::Critical {
                stat_id: stat_id.to_string(),
                value: new_value,
            });
        }
    }

    pub fn modify_stat(&mut self, stat_id: &str, delta: f64) {
        self.set_value(stat_id, self.get_value(stat_id) + delta);
    }

    /// `base_decay_rate` scaled by the species trait, 1.0 when the species
    /// or the trait is unknown. Unknown stats decay at 0.
    pub fn get_decay_rate(&self, stat_id: &str, species_id: Option<&str>) -> f64 {
        let Some(def) = self.registry.stat(stat_id) else {
            return 0.0;
        };
        let multiplier = species_id
            .and_then(|sp| self.registry.trait_multiplier(sp, &def.trait_multiplier_key))
            .unwrap_or(1.0);
        def.base_decay_rate * multiplier
    }

    pub fn get_all_values(&self) -> StatValueSet {
        self.values.clone()
    }

    /// Stops decay, forgets the species and restores start values.
    pub fn reset(&mut self) {
        self.stop_decay();
        self.species = None;
        self.initialize_stats();
    }

    pub fn start_decay(&mut self, interval_ms: u64, now: Instant) {
        self.schedule.start(interval_ms, now);
    }

    pub fn stop_decay(&mut self) {
        self.schedule.stop();
    }

    pub fn schedule_state(&self) -> ScheduleState {
        self.schedule.state()
    }

    /// Applies every decay tick that came due by `now`. Returns the count.
    pub fn advance(&mut self, now: Instant) -> u64 {
        let ticks = self.schedule.due_ticks(now);
        for _ in 0..ticks {
            self.decay_tick();
        }
        ticks
    }

    /// One decay step for every stat still above its floor.
    pub fn decay_tick(&mut self) {
        let registry = Rc::clone(&self.registry);
        for def in registry.stats() {
            if self.get_value(&def.id) > def.min {
                let rate = self.get_decay_rate(&def.id, self.species.as_deref());
                self.modify_stat(&def.id, -rate);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventLog;
    use crate::registry::{Registry, StatDefinition};
    use proptest::prelude::*;
    use std::time::Duration;

    fn store() -> (StatStore, EventLog) {
        let mut s = StatStore::new(Rc::new(Registry::builtin()), 20.0);
        let log = EventLog::new();
        s.subscribe(log.clone());
        (s, log)
    }

    fn hunger_only() -> Rc<Registry> {
        let hunger = Registry::builtin().stat("hunger").cloned().unwrap();
        Rc::new(Registry::new(vec![hunger], Vec::new(), Vec::new()).unwrap())
    }

    #[test]
    fn starts_at_start_values() {
        let (s, _) = store();
        assert_eq!(s.get_value("hunger"), 100.0);
        assert_eq!(s.get_value("energy"), 100.0);
        assert_eq!(s.get_all_values().len(), 3);
    }

    #[test]
    fn set_value_clamps_and_reports_old_value() {
        let (mut s, log) = store();
        s.set_value("hunger", 140.0);
        s.set_value("hunger", -3.0);
        assert_eq!(s.get_value("hunger"), 0.0);
        assert_eq!(
            log.events()[1],
            StatEvent::Changed {
                stat_id: "hunger".to_string(),
                old_value: 100.0,
                new_value: 0.0,
            }
        );
    }

    #[test]
    fn unknown_stat_is_a_silent_no_op() {
        let (mut s, log) = store();
        s.set_value("thirst", 50.0);
        s.modify_stat("thirst", -5.0);
        assert_eq!(s.get_value("thirst"), 0.0);
        assert!(log.events().is_empty());
        assert!(!s.get_all_values().contains_key("thirst"));
    }

    #[test]
    fn nan_is_ignored() {
        let (mut s, log) = store();
        s.set_value("hunger", f64::NAN);
        assert_eq!(s.get_value("hunger"), 100.0);
        s.modify_stat("energy", f64::NAN);
        assert_eq!(s.get_value("energy"), 100.0);
        assert!(log.events().is_empty());
        assert!(log.criticals().is_empty());
    }

    #[test]
    fn critical_fires_once_per_downward_crossing() {
        let (mut s, log) = store();
        for _ in 0..100 {
            s.modify_stat("hunger", -1.0);
        }
        let criticals = log.criticals();
        assert_eq!(
            criticals,
            vec![StatEvent::Critical {
                stat_id: "hunger".to_string(),
                value: 20.0,
            }]
        );
        // the critical follows the change that produced it
        let pos = log.events().iter().position(|e| e == &criticals[0]).unwrap();
        assert_eq!(
            log.events()[pos - 1],
            StatEvent::Changed {
                stat_id: "hunger".to_string(),
                old_value: 21.0,
                new_value: 20.0,
            }
        );
    }

    #[test]
    fn upward_crossing_is_silent_and_rearms() {
        let (mut s, log) = store();
        s.set_value("hunger", 10.0);
        s.set_value("hunger", 30.0);
        s.set_value("hunger", 15.0);
        assert_eq!(log.criticals().len(), 2);
    }

    #[test]
    fn decay_rate_uses_species_multiplier() {
        let (s, _) = store();
        assert_eq!(s.get_decay_rate("hunger", Some("dog")), 2.0 * 1.2);
        assert_eq!(s.get_decay_rate("hunger", None), 2.0);
        assert_eq!(s.get_decay_rate("hunger", Some("dragon")), 2.0);
        assert_eq!(s.get_decay_rate("energy", Some("cat")), 1.0);
        assert_eq!(s.get_decay_rate("thirst", Some("cat")), 0.0);
    }

    #[test]
    fn all_values_is_a_detached_copy() {
        let (mut s, _) = store();
        let snap = s.get_all_values();
        s.set_value("hunger", 5.0);
        assert_eq!(snap["hunger"], 100.0);
    }

    #[test]
    fn tick_skips_stats_at_their_floor() {
        let (mut s, log) = store();
        s.set_value("energy", 0.0);
        log.drain();
        s.decay_tick();
        assert!(log.events().iter().all(|e| e.stat_id() != "energy"));
        assert_eq!(s.get_value("hunger"), 98.0);
        assert_eq!(s.get_value("happiness"), 98.5);
    }

    #[test]
    fn double_start_decays_one_interval_worth() {
        let mut s = StatStore::new(hunger_only(), 20.0);
        let t = Instant::now();
        s.start_decay(5000, t);
        s.start_decay(5000, t);
        assert_eq!(s.advance(t + Duration::from_millis(5000)), 1);
        assert_eq!(s.get_value("hunger"), 98.0);
    }

    #[test]
    fn stop_is_final_and_repeatable() {
        let mut s = StatStore::new(hunger_only(), 20.0);
        let t = Instant::now();
        s.start_decay(1000, t);
        s.stop_decay();
        s.stop_decay();
        assert_eq!(s.advance(t + Duration::from_secs(30)), 0);
        assert_eq!(s.get_value("hunger"), 100.0);
    }

    #[test]
    fn reset_restores_start_values_and_idles() {
        let (mut s, _) = store();
        s.set_species(Some("cat"));
        s.start_decay(5000, Instant::now());
        s.set_value("hunger", 3.0);
        s.reset();
        assert_eq!(s.schedule_state(), ScheduleState::Idle);
        assert_eq!(s.species(), None);
        for def in Registry::builtin().stats() {
            assert_eq!(s.get_value(&def.id), def.start_value);
        }
        s.stop_decay();
        s.stop_decay();
    }

    #[test]
    fn live_ticks_use_current_species() {
        let mut s = StatStore::new(Rc::new(Registry::builtin()), 20.0);
        s.set_species(Some("capybara"));
        let t = Instant::now();
        s.start_decay(5000, t);
        s.advance(t + Duration::from_millis(15_000));
        assert_eq!(s.get_value("hunger"), 94.0);
        assert!((s.get_value("happiness") - (100.0 - 3.0 * 0.9)).abs() < 1e-9);
    }

    #[test]
    fn custom_bounds_are_respected() {
        let stat = StatDefinition {
            id: "warmth".to_string(),
            name: "Warmth".to_string(),
            icon: "~".to_string(),
            base_decay_rate: 4.0,
            trait_multiplier_key: "warmthDecayMultiplier".to_string(),
            start_value: 12.0,
            min: 10.0,
            max: 50.0,
        };
        let reg = Registry::new(vec![stat], Vec::new(), Vec::new()).unwrap();
        let mut s = StatStore::new(Rc::new(reg), 20.0);
        s.decay_tick();
        assert_eq!(s.get_value("warmth"), 10.0);
        s.set_value("warmth", 80.0);
        assert_eq!(s.get_value("warmth"), 50.0);
    }

    proptest! {
        #[test]
        fn set_value_is_a_clamp(v in -500.0f64..500.0) {
            let mut s = StatStore::new(Rc::new(Registry::builtin()), 20.0);
            s.set_value("hunger", v);
            let stored = s.get_value("hunger");
            prop_assert_eq!(stored, v.clamp(0.0, 100.0));
            s.set_value("hunger", stored);
            prop_assert_eq!(s.get_value("hunger"), stored);
        }
    }
}
