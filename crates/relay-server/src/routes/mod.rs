pub mod config;
pub mod events;
pub mod health;
pub mod relays;
