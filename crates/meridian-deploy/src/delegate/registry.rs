//! Delegate resolution by infrastructure type.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::error::{DeployError, DeployResult};

use super::DeployDelegate;

/// Builds a fresh delegate instance.
pub type DelegateFactory = Arc<dyn Fn() -> Arc<dyn DeployDelegate> + Send + Sync>;

/// Resolves a delegate for an infrastructure type.
pub trait DelegateLoader: Send + Sync {
    /// Load a delegate for `infra_type`.
    ///
    /// Every call returns a new instance.
    fn load(&self, infra_type: &str) -> DeployResult<Arc<dyn DeployDelegate>>;
}

/// Registry of delegate factories keyed by infrastructure type.
#[derive(Default, Clone)]
pub struct DelegateRegistry {
    factories: HashMap<String, DelegateFactory>,
}

impl fmt::Debug for DelegateRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut types: Vec<_> = self.factories.keys().collect();
        types.sort();
        f.debug_struct("DelegateRegistry")
            .field("types", &types)
            .finish()
    }
}

impl DelegateRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory for an infrastructure type, replacing any previous
    /// registration.
    pub fn register<F>(&mut self, infra_type: impl Into<String>, factory: F)
    where
        F: Fn() -> Arc<dyn DeployDelegate> + Send + Sync + 'static,
    {
        self.factories.insert(infra_type.into(), Arc::new(factory));
    }

    /// Builder-style [`register`](Self::register).
    #[must_use]
    pub fn with<F>(mut self, infra_type: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> Arc<dyn DeployDelegate> + Send + Sync + 'static,
    {
        self.register(infra_type, factory);
        self
    }

    /// Whether a factory is registered for `infra_type`.
    #[must_use]
    pub fn contains(&self, infra_type: &str) -> bool {
        self.factories.contains_key(infra_type.trim())
    }
}

impl DelegateLoader for DelegateRegistry {
    fn load(&self, infra_type: &str) -> DeployResult<Arc<dyn DeployDelegate>> {
        let infra_type = infra_type.trim();
        if infra_type.is_empty() {
            return Err(DeployError::DelegateLoad(
                "no infrastructure type given".to_owned(),
            ));
        }
        let factory = self.factories.get(infra_type).ok_or_else(|| {
            DeployError::DelegateLoad(format!("no delegate registered for \"{infra_type}\""))
        })?;
        debug!(infra_type, "loading deploy delegate");
        Ok(factory())
    }
}
