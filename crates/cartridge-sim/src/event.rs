//! Observable simulator events.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// Something worth reporting that is not visible in variables alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SimEvent {
    /// A scene change applied at the end of `frame`.
    Transition { frame: u32, from: String, to: String },
    /// A spawn into a full pool was ignored.
    SpawnRejected { frame: u32, pool: String },
    SaveStored { frame: u32, record: String },
    SaveLoaded { frame: u32, record: String },
    /// A load found no valid data and left variables untouched.
    LoadRejected {
        frame: u32,
        record: String,
        reason: String,
    },
}

/// Bounded event buffer; the oldest entries are dropped first.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: VecDeque<SimEvent>,
    capacity: usize,
}

impl EventLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    pub fn push(&mut self, event: SimEvent) {
        if self.capacity == 0 {
            return;
        }
        if self.events.len() == self.capacity {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    pub fn iter(&self) -> impl Iterator<Item = &SimEvent> {
        self.events.iter()
    }

    pub fn drain(&mut self) -> Vec<SimEvent> {
        self.events.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oldest_events_are_dropped() {
        let mut log = EventLog::new(2);
        for frame in 1..=3 {
            log.push(SimEvent::SpawnRejected {
                frame,
                pool: "p".into(),
            });
        }
        let frames: Vec<u32> = log
            .iter()
            .map(|e| match e {
                SimEvent::SpawnRejected { frame, .. } => *frame,
                _ => 0,
            })
            .collect();
        assert_eq!(frames, vec![2, 3]);
    }

    #[test]
    fn zero_capacity_keeps_nothing() {
        let mut log = EventLog::new(0);
        log.push(SimEvent::SaveStored {
            frame: 1,
            record: "r".into(),
        });
        assert!(log.is_empty());
    }
}
