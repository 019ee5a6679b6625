//! Backend selection by name.

use crate::config::ManagerConfig;
use sitegate_store::{
    BackendError, BackendResult, MemoryBackend, PermissionBackend, MEMORY_BACKEND,
};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Builds a backend from the manager configuration.
pub type BackendFactory =
    Box<dyn Fn(&ManagerConfig) -> BackendResult<Arc<dyn PermissionBackend>> + Send + Sync>;

/// Named backend factories. `"memory"` is always available.
pub struct BackendRegistry {
    factories: BTreeMap<String, BackendFactory>,
}

impl Default for BackendRegistry {
    fn default() -> Self {
        let mut registry = Self {
            factories: BTreeMap::new(),
        };
        registry.register(MEMORY_BACKEND, |_| Ok(Arc::new(MemoryBackend::new())));
        registry
    }
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) a factory under `name`.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(&ManagerConfig) -> BackendResult<Arc<dyn PermissionBackend>> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Box::new(factory));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Constructs the backend named in `config`.
    pub fn create(&self, config: &ManagerConfig) -> BackendResult<Arc<dyn PermissionBackend>> {
        let factory = self
            .factories
            .get(&config.backend)
            .ok_or_else(|| BackendError::UnknownBackend(config.backend.clone()))?;
        factory(config)
    }
}

impl std::fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendRegistry")
            .field("backends", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_is_registered_by_default() {
        let registry = BackendRegistry::new();
        assert!(registry.contains(MEMORY_BACKEND));
        let backend = registry.create(&ManagerConfig::default()).unwrap();
        assert_eq!(backend.name(), MEMORY_BACKEND);
    }

    #[test]
    fn unknown_backend_is_an_error() {
        let registry = BackendRegistry::new();
        let config = ManagerConfig {
            backend: "sql".into(),
            ..Default::default()
        };
        let err = registry.create(&config).err().unwrap();
        assert!(matches!(err, BackendError::UnknownBackend(ref name) if name == "sql"));
    }

    #[test]
    fn factory_errors_propagate() {
        let mut registry = BackendRegistry::new();
        registry.register("broken", |_| {
            Err(BackendError::Initialization("no connection".into()))
        });
        let config = ManagerConfig {
            backend: "broken".into(),
            ..Default::default()
        };
        assert!(matches!(
            registry.create(&config),
            Err(BackendError::Initialization(_))
        ));
    }
}
