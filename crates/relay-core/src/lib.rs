pub mod config;
pub mod controller;
pub mod error;
pub mod events;
pub mod hardware;
pub mod io;
pub mod names;
pub mod scheduler;

pub use config::{Action, Config, ConfigStore, JsonConfigStore, MemoryConfigStore, Schedule};
pub use controller::{RelayController, RelayStatus, Status};
pub use error::{RelayError, Result};
pub use events::{Event, EventRecorder, JsonlEventLog, MemoryEventLog};
pub use names::RelayNames;
