use crate::config::ConfigStore;
use std::sync::Arc;

/// Resolves relay display names from the configuration store.
#[derive(Clone)]
pub struct RelayNames {
    store: Arc<dyn ConfigStore>,
}

impl RelayNames {
    pub fn new(store: Arc<dyn ConfigStore>) -> Self {
        Self { store }
    }

    pub fn default_name(relay: u8) -> String {
        format!("Relay {relay}")
    }

    /// The configured override for `relay`, or `"Relay {relay}"`.
    ///
    /// Best effort: a configuration read error yields the default name
    /// instead of failing the caller.
    pub fn resolve(&self, relay: u8) -> String {
        match self.store.get() {
            Ok(config) => config
                .relay_names
                .get(&relay)
                .cloned()
                .unwrap_or_else(|| Self::default_name(relay)),
            Err(e) => {
                tracing::debug!(relay, error = %e, "relay name lookup failed, using default");
                Self::default_name(relay)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, MemoryConfigStore};
    use crate::error::{RelayError, Result};

    struct BrokenStore;

    impl ConfigStore for BrokenStore {
        fn get(&self) -> Result<Config> {
            Err(RelayError::ConfigUnavailable("disk on fire".into()))
        }

        fn set(&self, _config: Config) -> Result<()> {
            Err(RelayError::ConfigUnavailable("disk on fire".into()))
        }
    }

    #[test]
    fn falls_back_to_generated_name() {
        let names = RelayNames::new(Arc::new(MemoryConfigStore::default()));
        assert_eq!(names.resolve(2), "Relay 2");
    }

    #[test]
    fn uses_configured_override() {
        let mut cfg = Config::default();
        cfg.set_relay_name(1, "Pool pump");
        let names = RelayNames::new(Arc::new(MemoryConfigStore::new(cfg)));
        assert_eq!(names.resolve(1), "Pool pump");
        assert_eq!(names.resolve(3), "Relay 3");
    }

    #[test]
    fn store_error_yields_default() {
        let names = RelayNames::new(Arc::new(BrokenStore));
        assert_eq!(names.resolve(3), "Relay 3");
    }

    #[test]
    fn sees_updates_made_after_construction() {
        let store = Arc::new(MemoryConfigStore::default());
        let names = RelayNames::new(store.clone());
        let mut cfg = Config::default();
        cfg.set_relay_name(1, "Heater");
        store.set(cfg).unwrap();
        assert_eq!(names.resolve(1), "Heater");
    }
}
