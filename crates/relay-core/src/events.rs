//! Human-readable audit trail of relay activity.
//!
//! The controller only ever calls [`EventRecorder::record`]; a failed record
//! is logged and never blocks the physical action that produced it.

use crate::error::Result;
use crate::io::{atomic_write, read_if_exists};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

pub const DEFAULT_CAPACITY: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub stamp: DateTime<Utc>,
    pub msg: String,
}

pub trait EventRecorder: Send + Sync {
    fn record(&self, msg: &str) -> Result<()>;

    /// All retained events, oldest first.
    fn list(&self) -> Result<Vec<Event>>;
}

// ---------------------------------------------------------------------------
// JsonlEventLog
// ---------------------------------------------------------------------------

/// Event log persisted as one JSON object per line, bounded to the newest
/// `capacity` entries.
pub struct JsonlEventLog {
    path: PathBuf,
    capacity: usize,
    events: Mutex<VecDeque<Event>>,
}

impl JsonlEventLog {
    pub fn open(path: impl Into<PathBuf>, capacity: usize) -> Result<Self> {
        let path = path.into();
        let capacity = capacity.max(1);
        let mut events = VecDeque::new();
        if let Some(raw) = read_if_exists(&path)? {
            for line in raw.lines().filter(|l| !l.trim().is_empty()) {
                events.push_back(serde_json::from_str::<Event>(line)?);
            }
        }
        while events.len() > capacity {
            events.pop_front();
        }
        Ok(Self {
            path,
            capacity,
            events: Mutex::new(events),
        })
    }
}

impl EventRecorder for JsonlEventLog {
    fn record(&self, msg: &str) -> Result<()> {
        let mut events = self.events.lock().unwrap_or_else(PoisonError::into_inner);
        events.push_back(Event {
            stamp: Utc::now(),
            msg: msg.to_string(),
        });
        while events.len() > self.capacity {
            events.pop_front();
        }

        let mut data = Vec::new();
        for event in events.iter() {
            serde_json::to_writer(&mut data, event)?;
            data.push(b'\n');
        }
        atomic_write(&self.path, &data)
    }

    fn list(&self) -> Result<Vec<Event>> {
        let events = self.events.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(events.iter().cloned().collect())
    }
}

/// An in-memory event log, bounded like [`JsonlEventLog`] but never
/// persisted. Used for one-shot commands and tests.
pub struct MemoryEventLog {
    capacity: usize,
    events: Mutex<VecDeque<Event>>,
}

impl MemoryEventLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            events: Mutex::new(VecDeque::new()),
        }
    }
}

impl Default for MemoryEventLog {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl EventRecorder for MemoryEventLog {
    fn record(&self, msg: &str) -> Result<()> {
        let mut events = self.events.lock().unwrap_or_else(PoisonError::into_inner);
        events.push_back(Event {
            stamp: Utc::now(),
            msg: msg.to_string(),
        });
        while events.len() > self.capacity {
            events.pop_front();
        }
        Ok(())
    }

    fn list(&self) -> Result<Vec<Event>> {
        let events = self.events.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(events.iter().cloned().collect())
    }
}
