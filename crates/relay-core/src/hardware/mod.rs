//! Hardware backends that drive the relay output pins.
//!
//! A backend is opened into a [`GpioSession`] for the duration of one
//! controller operation (open → act → close). Level and direction operations
//! only exist on the session, so nothing can touch an unopened backend.

#[cfg(feature = "hardware-gpio")]
mod rpi;
mod stub;

#[cfg(feature = "hardware-gpio")]
pub use rpi::RpiBackend;
pub use stub::StubBackend;

use crate::error::Result;
use serde::{Serialize, Serializer};

/// Logic level of an output pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Level {
    #[default]
    Low,
    High,
}

impl Level {
    pub fn is_high(self) -> bool {
        self == Level::High
    }

    pub fn toggled(self) -> Self {
        match self {
            Level::Low => Level::High,
            Level::High => Level::Low,
        }
    }

    /// Text used in event messages.
    pub fn as_str(self) -> &'static str {
        match self {
            Level::Low => "off",
            Level::High => "on",
        }
    }
}

impl From<bool> for Level {
    fn from(high: bool) -> Self {
        if high {
            Level::High
        } else {
            Level::Low
        }
    }
}

/// Serialized as `0`/`1`, the way relay states appear on the wire.
impl Serialize for Level {
    fn serialize<S: Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.serialize_u8(u8::from(self.is_high()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Input,
    Output,
}

/// A relay hardware backend.
pub trait Backend: Send + Sync {
    /// Acquire the GPIO subsystem. Fails with `HardwareUnavailable` when the
    /// device cannot be accessed.
    fn open(&self) -> Result<Box<dyn GpioSession + '_>>;

    /// Short label for logs.
    fn name(&self) -> &'static str;
}

impl<B: Backend + ?Sized> Backend for std::sync::Arc<B> {
    fn open(&self) -> Result<Box<dyn GpioSession + '_>> {
        (**self).open()
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

impl<B: Backend + ?Sized> Backend for Box<B> {
    fn open(&self) -> Result<Box<dyn GpioSession + '_>> {
        (**self).open()
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

/// An open handle on a backend. Dropping it releases the backend.
pub trait GpioSession {
    fn set_direction(&mut self, pin: u32, direction: Direction) -> Result<()>;
    fn set_level(&mut self, pin: u32, level: Level) -> Result<()>;
    fn read_level(&mut self, pin: u32) -> Result<Level>;

    /// Release the backend, reporting any error from doing so.
    fn close(self: Box<Self>) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_toggles() {
        assert_eq!(Level::Low.toggled(), Level::High);
        assert_eq!(Level::High.toggled().toggled(), Level::High);
    }

    #[test]
    fn level_serializes_as_bit() {
        assert_eq!(serde_json::to_string(&Level::High).unwrap(), "1");
        assert_eq!(serde_json::to_string(&Level::Low).unwrap(), "0");
    }
}
