//! Core of the Pocket Critters virtual pet: bounded needs stats that decay on a
//! fixed cadence, persisted snapshots, and offline catch-up on reload.

pub mod actions;
pub mod clock;
pub mod config;
pub mod decay;
pub mod events;
pub mod registry;
pub mod session;
pub mod stats;
pub mod storage;

pub use actions::{ActionOutcome, ActionsManager};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{MoodThresholds, Settings};
pub use decay::{calculate_offline_decay, DecaySchedule, ScheduleState};
pub use events::{EventLog, Notifier, SinkId, StatEvent, StatSink};
pub use registry::Registry;
pub use session::{Mood, OfflineReport, PetIdentity, PetSession, Phase, SessionError};
pub use stats::{StatStore, StatValueSet};
pub use storage::{JsonFileStore, MemoryStore, PersistedSnapshot, SnapshotStore, StorageError};
