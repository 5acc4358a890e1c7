//! Port backend registry.
//!
//! Maps backend names ("serial", "simulation") to factories. Built at
//! startup and passed to whoever creates links; no global state.

use crate::error::LinkError;
use crate::port::{BackendFactory, PortBackend};
use sortline_common::clock::SharedClock;
use sortline_common::config::LineConfig;
use std::collections::HashMap;

/// Registry of available port backends.
pub struct BackendRegistry {
    factories: HashMap<&'static str, BackendFactory>,
}

impl BackendRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registry holding every built-in backend.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        crate::drivers::register_builtin(&mut registry);
        registry
    }

    /// Register a backend factory, replacing any previous one of that name.
    pub fn register(&mut self, name: &'static str, factory: BackendFactory) {
        if self.factories.insert(name, factory).is_some() {
            tracing::warn!("port backend '{}' registered twice", name);
        }
    }

    /// Get a backend factory by name.
    pub fn get_factory(&self, name: &str) -> Option<BackendFactory> {
        self.factories.get(name).copied()
    }

    /// Create a backend instance by name.
    ///
    /// # Errors
    /// Returns `LinkError::BackendNotFound` if no backend with the given name is registered.
    pub fn create_backend(
        &self,
        name: &str,
        config: &LineConfig,
        clock: SharedClock,
    ) -> Result<Box<dyn PortBackend>, LinkError> {
        let factory = self
            .get_factory(name)
            .ok_or_else(|| LinkError::BackendNotFound(name.to_string()))?;
        Ok(factory(config, clock))
    }

    /// List all registered backend names, sorted.
    pub fn list_backends(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.factories.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::simulation::SimulationBackend;
    use sortline_common::clock::ManualClock;

    fn empty_backend(_config: &LineConfig, _clock: SharedClock) -> Box<dyn PortBackend> {
        Box::new(SimulationBackend::new())
    }

    #[test]
    fn registry_register_and_create() {
        let mut reg = BackendRegistry::new();
        reg.register("empty", empty_backend);

        let backend = reg
            .create_backend("empty", &LineConfig::default(), ManualClock::shared())
            .expect("should create");
        assert_eq!(backend.name(), "simulation");
        assert!(backend.list_ports().unwrap().is_empty());
    }

    #[test]
    fn registry_backend_not_found() {
        let reg = BackendRegistry::new();
        let result = reg.create_backend("nonexistent", &LineConfig::default(), ManualClock::shared());
        assert!(matches!(result, Err(LinkError::BackendNotFound(_))));
    }

    #[test]
    fn builtin_backends_are_registered() {
        let reg = BackendRegistry::with_builtin();
        assert_eq!(reg.list_backends(), vec!["serial", "simulation"]);
    }
}
