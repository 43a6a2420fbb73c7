use super::{Backend, Direction, GpioSession, Level};
use crate::error::{RelayError, Result};
use rppal::gpio::{Gpio, OutputPin};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Backend for the Raspberry Pi GPIO header, addressed by BCM pin number.
///
/// Pins are driven through the SoC's GPIO registers, so numbering does not
/// depend on how the kernel lays out its GPIO chips. Outputs keep their
/// level when a session closes. Sessions are exclusive.
#[derive(Default)]
pub struct RpiBackend {
    exclusive: Mutex<()>,
}

impl RpiBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Backend for RpiBackend {
    fn open(&self) -> Result<Box<dyn GpioSession + '_>> {
        let exclusive = self.exclusive.lock().unwrap_or_else(PoisonError::into_inner);
        let gpio = Gpio::new().map_err(|e| RelayError::hardware("open gpio", e))?;
        Ok(Box::new(RpiSession {
            _exclusive: exclusive,
            gpio,
            outputs: HashMap::new(),
        }))
    }

    fn name(&self) -> &'static str {
        "rpi"
    }
}

struct RpiSession<'a> {
    _exclusive: MutexGuard<'a, ()>,
    gpio: Gpio,
    outputs: HashMap<u32, OutputPin>,
}

impl RpiSession<'_> {
    fn output(&mut self, pin: u32) -> Result<&mut OutputPin> {
        if !self.outputs.contains_key(&pin) {
            let mut output = self
                .gpio
                .get(bcm_pin(pin)?)
                .map_err(|e| RelayError::hardware(&format!("claim gpio{pin}"), e))?
                .into_output();
            output.set_reset_on_drop(false);
            self.outputs.insert(pin, output);
        }
        self.outputs
            .get_mut(&pin)
            .ok_or_else(|| RelayError::HardwareUnavailable(format!("gpio{pin} not claimed")))
    }
}

impl GpioSession for RpiSession<'_> {
    fn set_direction(&mut self, pin: u32, direction: Direction) -> Result<()> {
        match direction {
            Direction::Output => self.output(pin).map(|_| ()),
            Direction::Input => {
                self.outputs.remove(&pin);
                let mut input = self
                    .gpio
                    .get(bcm_pin(pin)?)
                    .map_err(|e| RelayError::hardware(&format!("claim gpio{pin}"), e))?
                    .into_input();
                input.set_reset_on_drop(false);
                Ok(())
            }
        }
    }

    fn set_level(&mut self, pin: u32, level: Level) -> Result<()> {
        let output = self.output(pin)?;
        if level.is_high() {
            output.set_high();
        } else {
            output.set_low();
        }
        Ok(())
    }

    fn read_level(&mut self, pin: u32) -> Result<Level> {
        if let Some(output) = self.outputs.get(&pin) {
            return Ok(Level::from(output.is_set_high()));
        }
        let level = self
            .gpio
            .get(bcm_pin(pin)?)
            .map_err(|e| RelayError::hardware(&format!("read gpio{pin}"), e))?
            .read();
        Ok(Level::from(level == rppal::gpio::Level::High))
    }

    fn close(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

/// BCM numbers on the Pi header run 0..=53.
fn bcm_pin(pin: u32) -> Result<u8> {
    u8::try_from(pin)
        .ok()
        .filter(|&p| p <= 53)
        .ok_or_else(|| RelayError::HardwareUnavailable(format!("gpio{pin} is not a BCM pin")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bcm_pin_range() {
        assert_eq!(bcm_pin(26).unwrap(), 26);
        assert_eq!(bcm_pin(0).unwrap(), 0);
        assert!(bcm_pin(54).is_err());
        assert!(bcm_pin(538).is_err());
    }
}
