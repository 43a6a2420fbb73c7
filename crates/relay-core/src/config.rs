use crate::error::{RelayError, Result};
use crate::io::{atomic_write, read_if_exists};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Action
// ---------------------------------------------------------------------------

/// What a schedule does to its relay when it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    On,
    Off,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Action::On => "on",
            Action::Off => "off",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Schedule
// ---------------------------------------------------------------------------

/// A relay action paired with the cron expression that triggers it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    /// Opaque unique id. Empty means "not yet assigned".
    #[serde(default)]
    pub id: String,
    pub relay: u8,
    pub expression: String,
    pub action: Action,
}

impl Schedule {
    pub fn new(relay: u8, expression: impl Into<String>, action: Action) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            relay,
            expression: expression.into(),
            action,
        }
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// A configuration snapshot: the schedule set plus relay name overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub schedules: Vec<Schedule>,
    #[serde(default)]
    pub relay_names: BTreeMap<u8, String>,
}

impl Config {
    /// Insert or replace a schedule.
    ///
    /// A schedule with an empty id is new: it gets a fresh UUID and is
    /// appended. A schedule with an id replaces the existing entry in place;
    /// an id that is not present is an error. Returns the stored schedule.
    pub fn upsert_schedule(&mut self, mut schedule: Schedule) -> Result<Schedule> {
        if schedule.id.is_empty() {
            schedule.id = Uuid::new_v4().to_string();
            self.schedules.push(schedule.clone());
            return Ok(schedule);
        }
        let slot = self
            .schedules
            .iter_mut()
            .find(|s| s.id == schedule.id)
            .ok_or_else(|| RelayError::ScheduleNotFound(schedule.id.clone()))?;
        *slot = schedule.clone();
        Ok(schedule)
    }

    /// Remove the schedule with `id`, returning it.
    pub fn remove_schedule(&mut self, id: &str) -> Result<Schedule> {
        let idx = self
            .schedules
            .iter()
            .position(|s| s.id == id)
            .ok_or_else(|| RelayError::ScheduleNotFound(id.to_string()))?;
        Ok(self.schedules.remove(idx))
    }

    /// Set (or, with an empty name, clear) the display name of a relay.
    pub fn set_relay_name(&mut self, relay: u8, name: impl Into<String>) {
        let name = name.into();
        let trimmed = name.trim();
        if trimmed.is_empty() {
            self.relay_names.remove(&relay);
        } else {
            self.relay_names.insert(relay, trimmed.to_string());
        }
    }
}

// ---------------------------------------------------------------------------
// ConfigStore
// ---------------------------------------------------------------------------

/// Retrieves and stores the configuration snapshot.
pub trait ConfigStore: Send + Sync {
    fn get(&self) -> Result<Config>;
    fn set(&self, config: Config) -> Result<()>;
}

/// A `ConfigStore` backed by a JSON file.
///
/// The file is created with an empty config when missing, and the last
/// successfully written config is cached in memory so reads never touch disk.
pub struct JsonConfigStore {
    path: PathBuf,
    cached: RwLock<Config>,
}

impl JsonConfigStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let config = match read_if_exists(&path).map_err(|e| unavailable(&path, e))? {
            Some(raw) => serde_json::from_str(&raw).map_err(|e| unavailable(&path, e))?,
            None => {
                tracing::info!(path = %path.display(), "creating empty config");
                write_config(&path, &Config::default())?;
                Config::default()
            }
        };
        Ok(Self {
            path,
            cached: RwLock::new(config),
        })
    }
}

impl ConfigStore for JsonConfigStore {
    fn get(&self) -> Result<Config> {
        Ok(self
            .cached
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn set(&self, config: Config) -> Result<()> {
        let mut cached = self.cached.write().unwrap_or_else(PoisonError::into_inner);
        write_config(&self.path, &config)?;
        *cached = config;
        Ok(())
    }
}

fn write_config(path: &Path, config: &Config) -> Result<()> {
    let data = serde_json::to_vec_pretty(config).map_err(|e| unavailable(path, e))?;
    atomic_write(path, &data).map_err(|e| unavailable(path, e))
}

fn unavailable(path: &Path, err: impl std::fmt::Display) -> RelayError {
    RelayError::ConfigUnavailable(format!("{}: {err}", path.display()))
}

/// An in-memory `ConfigStore`, used for ephemeral runs and tests.
#[derive(Default)]
pub struct MemoryConfigStore {
    config: RwLock<Config>,
}

impl MemoryConfigStore {
    pub fn new(config: Config) -> Self {
        Self {
            config: RwLock::new(config),
        }
    }
}

impl ConfigStore for MemoryConfigStore {
    fn get(&self) -> Result<Config> {
        Ok(self
            .config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn set(&self, config: Config) -> Result<()> {
        *self.config.write().unwrap_or_else(PoisonError::into_inner) = config;
        Ok(())
    }
}
