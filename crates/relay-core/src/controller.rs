//! The relay controller: owns the relay bank, drives the hardware backend,
//! and keeps the schedule engine in step with the applied configuration.
//!
//! Concurrency model:
//! - the relay bank (backend + pin map) sits behind one `RwLock`; `status`
//!   takes the read side, `toggle`/`set_state` the write side, so writes are
//!   exclusive with each other and with reads;
//! - `apply_config` holds the engine mutex across stop/clear/register/start,
//!   so two reloads can never interleave;
//! - trigger callbacks hold an `Arc` of the shared part only, and capture
//!   their relay index and action by value.

use crate::config::{Action, Config};
use crate::error::{RelayError, Result};
use crate::events::EventRecorder;
use crate::hardware::{Backend, Direction, Level};
use crate::names::RelayNames;
use crate::scheduler::{ScheduleEngine, TriggerFn};
use serde::Serialize;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tokio::runtime::Handle;

/// Cause recorded for actions started by the schedule engine.
pub const SCHEDULED_CAUSE: &str = "scheduled action";

/// Cause recorded for on/off requests made through the API.
pub const MANUAL_CAUSE: &str = "manual action";

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelayStatus {
    pub relay: u8,
    pub state: Level,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Status {
    #[serde(rename = "relayStates")]
    pub states: Vec<RelayStatus>,
}

impl Status {
    pub fn get(&self, relay: u8) -> Option<&RelayStatus> {
        self.states.iter().find(|s| s.relay == relay)
    }
}

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

struct RelayBank {
    backend: Box<dyn Backend>,
    /// Output pin of relay `i + 1`.
    pins: Vec<u32>,
}

impl RelayBank {
    fn pin(&self, relay: u8) -> u32 {
        self.pins[usize::from(relay) - 1]
    }

    fn read_all(&self) -> Result<Vec<Level>> {
        let mut session = self.backend.open()?;
        let levels = self
            .pins
            .iter()
            .map(|&pin| session.read_level(pin))
            .collect::<Result<Vec<_>>>()?;
        session.close()?;
        Ok(levels)
    }

    fn write(&mut self, relay: u8, level: Level) -> Result<()> {
        let pin = self.pin(relay);
        let mut session = self.backend.open()?;
        session.set_direction(pin, Direction::Output)?;
        session.set_level(pin, level)?;
        session.close()
    }

    fn toggle(&mut self, relay: u8) -> Result<Level> {
        let pin = self.pin(relay);
        let mut session = self.backend.open()?;
        let next = session.read_level(pin)?.toggled();
        session.set_direction(pin, Direction::Output)?;
        session.set_level(pin, next)?;
        session.close()?;
        Ok(next)
    }
}

struct Shared {
    relay_count: u8,
    bank: RwLock<RelayBank>,
    names: RelayNames,
    recorder: Arc<dyn EventRecorder>,
}

impl Shared {
    fn check_relay(&self, relay: u8) -> Result<()> {
        if relay >= 1 && relay <= self.relay_count {
            Ok(())
        } else {
            Err(RelayError::InvalidRelay {
                relay,
                count: self.relay_count,
            })
        }
    }

    fn set_state(&self, relay: u8, action: Action, cause: &str) -> Result<()> {
        self.check_relay(relay)?;
        let level = Level::from(action == Action::On);
        self.bank
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .write(relay, level)?;

        let name = self.names.resolve(relay);
        tracing::info!(relay, action = %action, cause, "relay switched");
        self.record(&format!(
            "Switching '{name}' (relay {relay}) {action}, cause: {cause}"
        ));
        Ok(())
    }

    /// Record an audit event; failure is logged and otherwise ignored.
    fn record(&self, msg: &str) {
        if let Err(e) = self.recorder.record(msg) {
            tracing::warn!(error = %e, msg, "failed to record event");
        }
    }
}

// ---------------------------------------------------------------------------
// RelayController
// ---------------------------------------------------------------------------

pub struct RelayController {
    shared: Arc<Shared>,
    engine: Mutex<ScheduleEngine>,
}

impl RelayController {
    /// Build a controller for the relays wired to `pins` (relay 1 is
    /// `pins[0]`) and apply `config`. Fails if the configuration does not
    /// apply.
    pub fn new(
        backend: impl Backend + 'static,
        pins: Vec<u32>,
        names: RelayNames,
        recorder: Arc<dyn EventRecorder>,
        runtime: Handle,
        config: &Config,
    ) -> Result<Self> {
        let relay_count = u8::try_from(pins.len())
            .ok()
            .filter(|&n| n > 0)
            .ok_or_else(|| {
                RelayError::HardwareUnavailable(format!(
                    "relay count must be between 1 and 255, got {}",
                    pins.len()
                ))
            })?;
        tracing::info!(
            backend = backend.name(),
            relays = relay_count,
            ?pins,
            "relay controller starting"
        );

        let controller = Self {
            shared: Arc::new(Shared {
                relay_count,
                bank: RwLock::new(RelayBank {
                    backend: Box::new(backend),
                    pins,
                }),
                names,
                recorder,
            }),
            engine: Mutex::new(ScheduleEngine::new(runtime)),
        };
        controller.apply_config(config)?;
        Ok(controller)
    }

    pub fn relay_count(&self) -> u8 {
        self.shared.relay_count
    }

    pub fn is_valid_relay(&self, relay: u8) -> bool {
        self.shared.check_relay(relay).is_ok()
    }

    /// Current state of every relay, ordered by relay index.
    pub fn status(&self) -> Result<Status> {
        let levels = self
            .shared
            .bank
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .read_all()?;
        let states = (1..=self.shared.relay_count)
            .zip(levels)
            .map(|(relay, state)| RelayStatus {
                relay,
                state,
                name: self.shared.names.resolve(relay),
            })
            .collect();
        Ok(Status { states })
    }

    /// Flip a relay and return the resulting status of all relays.
    pub fn toggle(&self, relay: u8) -> Result<Status> {
        self.shared.check_relay(relay)?;
        let level = self
            .shared
            .bank
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .toggle(relay)?;

        let name = self.shared.names.resolve(relay);
        tracing::info!(relay, state = level.as_str(), "relay toggled");
        self.shared.record(&format!(
            "Toggled '{name}' (relay {relay}), new state is {}",
            level.as_str()
        ));
        self.status()
    }

    /// Switch a relay on or off regardless of its current state. `cause`
    /// ends up in the event record.
    pub fn set_state(&self, relay: u8, action: Action, cause: &str) -> Result<()> {
        self.shared.set_state(relay, action, cause)
    }

    /// Replace the armed schedule set with the schedules in `config`.
    ///
    /// The engine is stopped and cleared first, so no old trigger can fire
    /// during the reload. If any expression fails to register, the partial
    /// set is discarded and the engine stays stopped until the next
    /// successful apply; the caller should not persist a config that failed.
    pub fn apply_config(&self, config: &Config) -> Result<()> {
        let mut engine = self.engine.lock().unwrap_or_else(PoisonError::into_inner);
        engine.stop();
        engine.clear();

        for schedule in &config.schedules {
            let callback = scheduled_action(&self.shared, schedule.relay, schedule.action);
            if let Err(e) = engine.register(&schedule.expression, callback) {
                engine.clear();
                tracing::error!(
                    id = %schedule.id,
                    expression = %schedule.expression,
                    error = %e,
                    "config rejected, schedule engine left stopped"
                );
                return Err(e);
            }
        }

        engine.start();
        tracing::info!(schedules = config.schedules.len(), "config applied");
        Ok(())
    }

    /// Expressions of the currently armed triggers.
    pub fn armed_expressions(&self) -> Vec<String> {
        self.engine
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .expressions()
    }

    /// Whether the schedule engine is running.
    pub fn schedules_running(&self) -> bool {
        self.engine
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .state()
            == crate::scheduler::EngineState::Running
    }

    /// Add a free-form entry to the event log (best effort).
    pub fn record(&self, msg: &str) {
        self.shared.record(msg);
    }
}

fn scheduled_action(shared: &Arc<Shared>, relay: u8, action: Action) -> TriggerFn {
    let shared = Arc::clone(shared);
    Arc::new(move || {
        tracing::info!(relay, action = %action, "running scheduled action");
        if let Err(e) = shared.set_state(relay, action, SCHEDULED_CAUSE) {
            tracing::error!(relay, action = %action, error = %e, "scheduled action failed");
        }
    })
}
