//! The pet lifecycle: choosing, naming, caring for and replacing a pet, plus
//! the load path that reconciles time spent offline.

use crate::actions::{ActionOutcome, ActionsManager};
use crate::clock::Clock;
use crate::config::{MoodThresholds, Settings};
use crate::decay::{calculate_offline_decay, elapsed_intervals, ScheduleState};
use crate::events::{SinkId, StatSink};
use crate::registry::Registry;
use crate::stats::StatStore;
use crate::storage::{PersistedSnapshot, SnapshotStore};
use chrono::{DateTime, Utc};
use std::rc::Rc;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("a pet needs a name")]
    EmptyName,

    #[error("unknown species '{0}'")]
    UnknownSpecies(String),

    #[error("species '{species}' has no color '{color}'")]
    UnknownColor { species: String, color: String },

    #[error("no species has been chosen yet")]
    NotNaming,

    #[error("there is no active pet")]
    NoActivePet,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PetIdentity {
    pub species_id: String,
    pub name: String,
    pub color_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Phase {
    Selecting,
    Naming { species_id: String, color_id: String },
    Active(PetIdentity),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mood {
    Happy,
    Neutral,
    Worried,
    Sad,
}

impl Mood {
    pub fn from_average(avg: f64, t: &MoodThresholds) -> Self {
        if avg >= t.happy {
            Mood::Happy
        } else if avg >= t.neutral {
            Mood::Neutral
        } else if avg >= t.worried {
            Mood::Worried
        } else {
            Mood::Sad
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct StatChange {
    pub stat_id: String,
    pub before: f64,
    pub after: f64,
}

/// What offline catch-up did to a freshly loaded pet.
#[derive(Clone, Debug, PartialEq)]
pub struct OfflineReport {
    pub away_since: DateTime<Utc>,
    pub elapsed_intervals: u64,
    pub changes: Vec<StatChange>,
}

impl OfflineReport {
    pub fn has_anything(&self) -> bool {
        self.changes.iter().any(|c| c.after != c.before)
    }
}

pub struct PetSession {
    registry: Rc<Registry>,
    stats: StatStore,
    actions: ActionsManager,
    store: Box<dyn SnapshotStore>,
    clock: Box<dyn Clock>,
    decay_interval_ms: u64,
    thresholds: MoodThresholds,
    max_name_len: usize,
    phase: Phase,
    last_saved: Option<DateTime<Utc>>,
}

impl PetSession {
    pub fn new(
        registry: Rc<Registry>,
        settings: &Settings,
        store: Box<dyn SnapshotStore>,
        clock: Box<dyn Clock>,
    ) -> Self {
        let thresholds = settings.mood_thresholds;
        Self {
            stats: StatStore::new(Rc::clone(&registry), thresholds.worried),
            actions: ActionsManager::new(Rc::clone(&registry)),
            registry,
            store,
            clock,
            decay_interval_ms: settings.decay_interval_ms,
            thresholds,
            max_name_len: settings.max_name_len,
            phase: Phase::Selecting,
            last_saved: None,
        }
    }

    pub fn subscribe(&mut self, sink: impl StatSink + 'static) -> SinkId {
        self.stats.subscribe(sink)
    }

    pub fn unsubscribe(&mut self, id: SinkId) -> bool {
        self.stats.unsubscribe(id)
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn stats(&self) -> &StatStore {
        &self.stats
    }

    pub fn actions(&self) -> &ActionsManager {
        &self.actions
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn identity(&self) -> Option<&PetIdentity> {
        match &self.phase {
            Phase::Active(id) => Some(id),
            _ => None,
        }
    }

    pub fn decay_state(&self) -> ScheduleState {
        self.stats.schedule_state()
    }

    pub fn last_saved(&self) -> Option<DateTime<Utc>> {
        self.last_saved
    }

    pub fn thresholds(&self) -> &MoodThresholds {
        &self.thresholds
    }

    pub fn select_species(&mut self, species_id: &str) -> Result<(), SessionError> {
        let color_id = self
            .registry
            .default_color(species_id)
            .ok_or_else(|| SessionError::UnknownSpecies(species_id.to_string()))?
            .to_string();
        self.phase = Phase::Naming {
            species_id: species_id.to_string(),
            color_id,
        };
        Ok(())
    }

    pub fn select_color(&mut self, color: &str) -> Result<(), SessionError> {
        let Phase::Naming {
            species_id,
            color_id,
        } = &mut self.phase
        else {
            return Err(SessionError::NotNaming);
        };
        if self.registry.color(species_id, color).is_none() {
            return Err(SessionError::UnknownColor {
                species: species_id.clone(),
                color: color.to_string(),
            });
        }
        *color_id = color.to_string();
        Ok(())
    }

    pub fn back_to_selection(&mut self) {
        if matches!(self.phase, Phase::Naming { .. }) {
            self.phase = Phase::Selecting;
        }
    }

    /// Trims and length-limits a user supplied name.
    fn clean_name(&self, raw: &str) -> Result<String, SessionError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(SessionError::EmptyName);
        }
        Ok(trimmed.chars().take(self.max_name_len).collect::<String>().trim_end().to_string())
    }

    /// Finishes adoption: fresh stats, decay running, first save written.
    pub fn confirm_name(&mut self, raw: &str) -> Result<(), SessionError> {
        let Phase::Naming {
            species_id,
            color_id,
        } = &self.phase
        else {
            return Err(SessionError::NotNaming);
        };
        let identity = PetIdentity {
            species_id: species_id.clone(),
            color_id: color_id.clone(),
            name: self.clean_name(raw)?,
        };

        self.stats.set_species(Some(&identity.species_id));
        self.stats.initialize_stats();
        self.actions.set_species(Some(&identity.species_id));
        log::info!("adopted {} the {}", identity.name, identity.species_id);

        self.phase = Phase::Active(identity);
        self.stats
            .start_decay(self.decay_interval_ms, self.clock.instant());
        self.save();
        Ok(())
    }

    pub fn rename(&mut self, raw: &str) -> Result<(), SessionError> {
        let name = self.clean_name(raw)?;
        let Phase::Active(identity) = &mut self.phase else {
            return Err(SessionError::NoActivePet);
        };
        identity.name = name;
        self.save();
        Ok(())
    }

    pub fn can_perform(&self, action_id: &str) -> bool {
        self.identity().is_some()
            && self
                .actions
                .can_perform(action_id, &self.stats, self.clock.instant())
    }

    pub fn perform_action(&mut self, action_id: &str) -> Option<ActionOutcome> {
        self.identity()?;
        let outcome = self
            .actions
            .perform(action_id, &mut self.stats, self.clock.instant())?;
        self.save();
        Some(outcome)
    }

    /// Applies any decay ticks that came due. Returns how many ran.
    pub fn tick(&mut self) -> u64 {
        let ticks = self.stats.advance(self.clock.instant());
        if ticks > 0 {
            self.save();
        }
        ticks
    }

    /// Abandons the current pet and its save.
    pub fn change_pet(&mut self) {
        if let Some(identity) = self.identity() {
            log::info!("releasing {}", identity.name);
        }
        self.stats.reset();
        self.actions.reset();
        self.store.clear();
        self.phase = Phase::Selecting;
        self.last_saved = None;
    }

    /// Restores the saved pet, decaying its stats for the time it was away.
    pub fn load_saved(&mut self) -> Option<OfflineReport> {
        let snapshot = self.store.load()?;
        let name = match self.clean_name(&snapshot.pet_name) {
            Ok(name) if !snapshot.pet_type.is_empty() => name,
            _ => {
                log::info!("ignoring save without a pet");
                return None;
            }
        };
        if !self.registry.species_exists(&snapshot.pet_type) {
            log::warn!("saved species '{}' no longer exists", snapshot.pet_type);
            self.store.clear();
            return None;
        }

        let species_id = snapshot.pet_type.clone();
        let color_id = snapshot
            .pet_color
            .as_deref()
            .filter(|c| self.registry.color(&species_id, c).is_some())
            .or_else(|| self.registry.default_color(&species_id))
            .map(str::to_string)
            .unwrap_or_default();

        self.stats.stop_decay();
        self.stats.set_species(Some(&species_id));
        self.stats.initialize_stats();
        self.actions.reset();
        self.actions.set_species(Some(&species_id));

        let now = self.clock.wall();
        let mut changes = Vec::new();
        for (stat_id, saved) in &snapshot.stats {
            let Some(def) = self.registry.stat(stat_id) else {
                log::debug!("dropping unregistered saved stat '{stat_id}'");
                continue;
            };
            let rate = self.stats.get_decay_rate(stat_id, Some(&species_id));
            let decayed = calculate_offline_decay(
                snapshot.last_saved,
                *saved,
                rate,
                self.decay_interval_ms,
                now,
                def.min,
            );
            self.stats.set_value(stat_id, decayed);
            changes.push(StatChange {
                stat_id: stat_id.clone(),
                before: *saved,
                after: self.stats.get_value(stat_id),
            });
        }

        let report = OfflineReport {
            away_since: snapshot.last_saved,
            elapsed_intervals: elapsed_intervals(snapshot.last_saved, now, self.decay_interval_ms),
            changes,
        };
        log::info!(
            "welcome back {}: {} decay intervals while away",
            name,
            report.elapsed_intervals
        );

        self.phase = Phase::Active(PetIdentity {
            species_id,
            name,
            color_id,
        });
        self.stats
            .start_decay(self.decay_interval_ms, self.clock.instant());
        // re-stamp now so the same offline stretch is never decayed twice
        self.save();
        Some(report)
    }

    /// Writes the active pet. Values and timestamp come from the same instant,
    /// and the timestamp never goes backwards within a session.
    pub fn save(&mut self) {
        let Phase::Active(identity) = &self.phase else {
            return;
        };
        let now = self.clock.wall();
        let stamp = match self.last_saved {
            Some(prev) if prev > now => prev,
            _ => now,
        };
        let snapshot = PersistedSnapshot {
            pet_type: identity.species_id.clone(),
            pet_name: identity.name.clone(),
            pet_color: Some(identity.color_id.clone()),
            stats: self.stats.get_all_values(),
            last_saved: stamp,
        };
        self.store.save(&snapshot);
        self.last_saved = Some(stamp);
    }

    pub fn average_stat(&self) -> f64 {
        let stats = self.registry.stats();
        if stats.is_empty() {
            return 0.0;
        }
        let sum: f64 = stats.iter().map(|s| self.stats.get_value(&s.id)).sum();
        sum / stats.len() as f64
    }

    pub fn mood(&self) -> Mood {
        Mood::from_average(self.average_stat(), &self.thresholds)
    }

    pub fn is_hungry(&self) -> bool {
        self.registry.stat("hunger").is_some()
            && self.stats.get_value("hunger") < self.thresholds.worried
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::events::EventLog;
    use crate::storage::MemoryStore;
    use chrono::TimeZone;
    use std::collections::BTreeMap;
    use std::time::Duration;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn session_with(store: MemoryStore) -> (PetSession, ManualClock) {
        let clock = ManualClock::new(t0());
        let session = PetSession::new(
            Rc::new(Registry::builtin()),
            &Settings::default(),
            Box::new(store),
            Box::new(clock.clone()),
        );
        (session, clock)
    }

    fn adopt(session: &mut PetSession, species: &str, name: &str) {
        session.select_species(species).unwrap();
        session.confirm_name(name).unwrap();
    }

    #[test]
    fn adoption_flow() {
        let store = MemoryStore::new();
        let (mut s, _) = session_with(store.clone());
        assert_eq!(s.confirm_name("Rex"), Err(SessionError::NotNaming));
        assert_eq!(
            s.select_species("dragon"),
            Err(SessionError::UnknownSpecies("dragon".to_string()))
        );

        s.select_species("cat").unwrap();
        assert!(matches!(s.phase(), Phase::Naming { color_id, .. } if color_id == "gray"));
        assert!(s.select_color("tan").is_err());
        s.select_color("siamese").unwrap();
        assert_eq!(s.confirm_name("   "), Err(SessionError::EmptyName));
        s.confirm_name("  Miso  ").unwrap();

        let id = s.identity().unwrap();
        assert_eq!(id.name, "Miso");
        assert_eq!(id.color_id, "siamese");
        assert_eq!(s.decay_state(), ScheduleState::Running);
        let saved = store.snapshot().unwrap();
        assert_eq!(saved.pet_type, "cat");
        assert_eq!(saved.stats["hunger"], 100.0);
        assert_eq!(saved.last_saved, t0());
    }

    #[test]
    fn back_to_selection_discards_the_choice() {
        let (mut s, _) = session_with(MemoryStore::new());
        s.select_species("dog").unwrap();
        s.back_to_selection();
        assert_eq!(s.phase(), &Phase::Selecting);
    }

    #[test]
    fn names_are_limited() {
        let (mut s, _) = session_with(MemoryStore::new());
        adopt(&mut s, "dog", "Sir Barksalot the Magnificent");
        assert_eq!(s.identity().unwrap().name.chars().count(), 20);
        assert_eq!(s.rename(" "), Err(SessionError::EmptyName));
        s.rename("Rex").unwrap();
        assert_eq!(s.identity().unwrap().name, "Rex");
    }

    #[test]
    fn rename_needs_a_pet() {
        let (mut s, _) = session_with(MemoryStore::new());
        assert_eq!(s.rename("Rex"), Err(SessionError::NoActivePet));
    }

    #[test]
    fn ticks_decay_and_save() {
        let store = MemoryStore::new();
        let (mut s, clock) = session_with(store.clone());
        adopt(&mut s, "dog", "Rex");
        clock.advance(Duration::from_millis(4999));
        assert_eq!(s.tick(), 0);
        clock.advance(Duration::from_millis(1));
        assert_eq!(s.tick(), 1);
        assert!((s.stats().get_value("hunger") - 97.6).abs() < 1e-9);
        let saved = store.snapshot().unwrap();
        assert!((saved.stats["hunger"] - 97.6).abs() < 1e-9);
        assert_eq!(saved.last_saved, t0() + chrono::Duration::seconds(5));
    }

    #[test]
    fn feeding_applies_effects_and_saves() {
        let store = MemoryStore::new();
        let (mut s, clock) = session_with(store.clone());
        assert!(s.perform_action("feed").is_none());
        adopt(&mut s, "capybara", "Bean");
        assert!(!s.can_perform("feed"));
        clock.advance(Duration::from_secs(50));
        s.tick();
        assert_eq!(s.stats().get_value("hunger"), 80.0);
        let writes = store.writes();

        let out = s.perform_action("feed").unwrap();
        assert_eq!(out.food_particle, "🍉");
        assert_eq!(s.stats().get_value("hunger"), 100.0);
        assert_eq!(store.writes(), writes + 1);
    }

    #[test]
    fn change_pet_resets_everything() {
        let store = MemoryStore::new();
        let (mut s, _) = session_with(store.clone());
        adopt(&mut s, "dog", "Rex");
        s.change_pet();
        assert_eq!(s.phase(), &Phase::Selecting);
        assert_eq!(s.decay_state(), ScheduleState::Idle);
        assert!(store.snapshot().is_none());
        assert_eq!(s.stats().species(), None);
        s.save();
        assert!(store.snapshot().is_none());
    }

    fn saved(species: &str, stats: &[(&str, f64)], at: DateTime<Utc>) -> PersistedSnapshot {
        PersistedSnapshot {
            pet_type: species.to_string(),
            pet_name: "Bean".to_string(),
            pet_color: None,
            stats: stats
                .iter()
                .map(|(k, v)| (k.to_string(), *v))
                .collect::<BTreeMap<_, _>>(),
            last_saved: at,
        }
    }

    #[test]
    fn load_applies_offline_decay_and_restamps() {
        let snap = saved(
            "capybara",
            &[("hunger", 80.0), ("thirst", 3.0)],
            t0() - chrono::Duration::milliseconds(17_500),
        );
        let store = MemoryStore::with_snapshot(snap);
        let (mut s, _) = session_with(store.clone());
        let report = s.load_saved().unwrap();

        assert_eq!(report.elapsed_intervals, 3);
        assert_eq!(s.stats().get_value("hunger"), 74.0);
        // stats missing from the save start fresh
        assert_eq!(s.stats().get_value("energy"), 100.0);
        assert_eq!(s.stats().get_value("thirst"), 0.0);
        assert_eq!(report.changes.len(), 1);
        assert!(report.has_anything());

        let id = s.identity().unwrap();
        assert_eq!(id.color_id, "tan");
        assert_eq!(s.decay_state(), ScheduleState::Running);
        assert_eq!(store.snapshot().unwrap().last_saved, t0());
    }

    #[test]
    fn load_emits_critical_when_offline_decay_crosses_the_line() {
        let snap = saved("dog", &[("hunger", 30.0)], t0() - chrono::Duration::minutes(10));
        let (mut s, _) = session_with(MemoryStore::with_snapshot(snap));
        let log = EventLog::new();
        s.subscribe(log.clone());
        s.load_saved().unwrap();
        assert_eq!(s.stats().get_value("hunger"), 0.0);
        assert_eq!(log.criticals().len(), 1);
        assert!(s.is_hungry());
    }

    #[test]
    fn load_discards_unknown_species() {
        let store = MemoryStore::with_snapshot(saved("dragon", &[], t0()));
        let (mut s, _) = session_with(store.clone());
        assert!(s.load_saved().is_none());
        assert!(store.snapshot().is_none());
        assert_eq!(s.phase(), &Phase::Selecting);
    }

    #[test]
    fn load_ignores_nameless_saves() {
        let mut snap = saved("dog", &[], t0());
        snap.pet_name = String::new();
        let (mut s, _) = session_with(MemoryStore::with_snapshot(snap));
        assert!(s.load_saved().is_none());
        assert_eq!(s.phase(), &Phase::Selecting);
    }

    #[test]
    fn load_limits_overlong_saved_names() {
        let mut snap = saved("cat", &[], t0());
        snap.pet_name = "  Lady Whiskerton of the Northern Windowsill ".to_string();
        let (mut s, _) = session_with(MemoryStore::with_snapshot(snap));
        s.load_saved().unwrap();
        let name = &s.identity().unwrap().name;
        assert_eq!(name, "Lady Whiskerton of t");
        assert_eq!(name.chars().count(), 20);
    }

    #[test]
    fn load_from_the_future_keeps_values() {
        let snap = saved("cat", &[("hunger", 55.0)], t0() + chrono::Duration::hours(2));
        let (mut s, _) = session_with(MemoryStore::with_snapshot(snap));
        let report = s.load_saved().unwrap();
        assert_eq!(report.elapsed_intervals, 0);
        assert!(!report.has_anything());
        assert_eq!(s.stats().get_value("hunger"), 55.0);
    }

    #[test]
    fn save_stamp_never_goes_backwards() {
        let store = MemoryStore::new();
        let (mut s, clock) = session_with(store.clone());
        adopt(&mut s, "dog", "Rex");
        clock.skew_wall(-60_000);
        s.save();
        assert_eq!(store.snapshot().unwrap().last_saved, t0());
        clock.advance(Duration::from_secs(120));
        s.save();
        assert_eq!(
            store.snapshot().unwrap().last_saved,
            t0() + chrono::Duration::seconds(60)
        );
    }

    #[test]
    fn mood_follows_the_average() {
        let (mut s, _) = session_with(MemoryStore::new());
        adopt(&mut s, "dog", "Rex");
        assert_eq!(s.mood(), Mood::Happy);
        let t = MoodThresholds::default();
        assert_eq!(Mood::from_average(69.9, &t), Mood::Neutral);
        assert_eq!(Mood::from_average(40.0, &t), Mood::Neutral);
        assert_eq!(Mood::from_average(20.0, &t), Mood::Worried);
        assert_eq!(Mood::from_average(19.9, &t), Mood::Sad);
        assert!(!s.is_hungry());
    }
}
