//! Stat notifications and the sinks that receive them.

use std::cell::RefCell;
use std::rc::Rc;

#[derive(Clone, Debug, PartialEq)]
pub enum StatEvent {
    Changed {
        stat_id: String,
        old_value: f64,
        new_value: f64,
    },
    /// The value just dropped to or below the worried threshold.
    Critical { stat_id: String, value: f64 },
}

impl StatEvent {
    pub fn stat_id(&self) -> &str {
        match self {
            StatEvent::Changed { stat_id, .. } | StatEvent::Critical { stat_id, .. } => stat_id,
        }
    }
}

pub trait StatSink {
    fn notify(&mut self, event: &StatEvent) -> anyhow::Result<()>;
}

impl<F> StatSink for F
where
    F: FnMut(&StatEvent) -> anyhow::Result<()>,
{
    fn notify(&mut self, event: &StatEvent) -> anyhow::Result<()> {
        self(event)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SinkId(u64);

/// Ordered fan-out. A failing sink is logged and skipped; the event still
/// reaches every other sink.
#[derive(Default)]
pub struct Notifier {
    next_id: u64,
    sinks: Vec<(SinkId, Box<dyn StatSink>)>,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, sink: impl StatSink + 'static) -> SinkId {
        let id = SinkId(self.next_id);
        self.next_id += 1;
        self.sinks.push((id, Box::new(sink)));
        id
    }

    pub fn unsubscribe(&mut self, id: SinkId) -> bool {
        let before = self.sinks.len();
        self.sinks.retain(|(sid, _)| *sid != id);
        self.sinks.len() != before
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    pub fn emit(&mut self, event: &StatEvent) {
        for (id, sink) in self.sinks.iter_mut() {
            if let Err(err) = sink.notify(event) {
                log::warn!("stat sink {:?} failed on {:?}: {err:#}", id, event);
            }
        }
    }
}

/// Recording sink with shared storage; clones observe the same log.
#[derive(Clone, Debug, Default)]
pub struct EventLog {
    events: Rc<RefCell<Vec<StatEvent>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<StatEvent> {
        self.events.borrow().clone()
    }

    pub fn drain(&self) -> Vec<StatEvent> {
        self.events.borrow_mut().drain(..).collect()
    }

    pub fn criticals(&self) -> Vec<StatEvent> {
        self.events
            .borrow()
            .iter()
            .filter(|e| matches!(e, StatEvent::Critical { .. }))
            .cloned()
            .collect()
    }
}

impl StatSink for EventLog {
    fn notify(&mut self, event: &StatEvent) -> anyhow::Result<()> {
        self.events.borrow_mut().push(event.clone());
        Ok(())
    }
}
