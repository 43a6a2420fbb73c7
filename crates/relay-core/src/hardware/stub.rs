use super::{Backend, Direction, GpioSession, Level};
use crate::error::{RelayError, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone, Copy, Default)]
struct StubPin {
    level: Level,
    output: bool,
}

/// In-memory backend for development and tests. Every pin starts low.
#[derive(Default)]
pub struct StubBackend {
    pins: Mutex<HashMap<u32, StubPin>>,
    unavailable: AtomicBool,
}

impl StubBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent `open()` calls fail, simulating missing hardware.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Current level of `pin` without opening a session.
    pub fn level(&self, pin: u32) -> Level {
        self.pins
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&pin)
            .map(|p| p.level)
            .unwrap_or_default()
    }
}

impl Backend for StubBackend {
    fn open(&self) -> Result<Box<dyn GpioSession + '_>> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(RelayError::HardwareUnavailable(
                "stub backend marked unavailable".to_string(),
            ));
        }
        let pins = self.pins.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(Box::new(StubSession { pins }))
    }

    fn name(&self) -> &'static str {
        "stub"
    }
}

struct StubSession<'a> {
    pins: MutexGuard<'a, HashMap<u32, StubPin>>,
}

impl GpioSession for StubSession<'_> {
    fn set_direction(&mut self, pin: u32, direction: Direction) -> Result<()> {
        self.pins.entry(pin).or_default().output = direction == Direction::Output;
        Ok(())
    }

    fn set_level(&mut self, pin: u32, level: Level) -> Result<()> {
        let entry = self.pins.entry(pin).or_default();
        if !entry.output {
            tracing::debug!(pin, "stub: writing level to a pin not configured as output");
        }
        entry.level = level;
        Ok(())
    }

    fn read_level(&mut self, pin: u32) -> Result<Level> {
        Ok(self.pins.get(&pin).map(|p| p.level).unwrap_or_default())
    }

    fn close(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}
