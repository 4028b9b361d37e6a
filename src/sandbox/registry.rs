//! Context registry
//!
//! Owns every live execution context, keyed by a caller-chosen id. All
//! contexts share one wasmtime engine and one metrics registry. Methods that
//! add or remove contexts take `&mut self`; to share a registry across threads
//! wrap it in a `Mutex`.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use wasmtime::Engine;

use super::config::SandboxConfig;
use super::context::WasmContext;
use super::errors::{SandboxError, SandboxResult};
use crate::backend::PhysicalPlan;
use crate::layout::DataLayoutFactory;
use crate::observability::{log_event_with_fields, Event, Logger, MetricsRegistry};

pub struct ContextRegistry {
    engine: Engine,
    config: SandboxConfig,
    contexts: HashMap<u32, WasmContext>,
    metrics: Arc<MetricsRegistry>,
}

impl fmt::Debug for ContextRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextRegistry")
            .field("config", &self.config)
            .field("contexts", &self.ids())
            .field("metrics", &self.metrics.snapshot())
            .finish()
    }
}

impl Default for ContextRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ContextRegistry {
    /// Registry whose contexts use [`SandboxConfig::default`]
    pub fn new() -> Self {
        Self {
            engine: Engine::default(),
            config: SandboxConfig::default(),
            contexts: HashMap::new(),
            metrics: Arc::new(MetricsRegistry::new()),
        }
    }

    /// Registry with a validated default configuration
    pub fn with_config(config: SandboxConfig) -> SandboxResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            ..Self::new()
        })
    }

    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    pub fn metrics(&self) -> &Arc<MetricsRegistry> {
        &self.metrics
    }

    /// Create a context with the registry's default configuration
    pub fn create(
        &mut self,
        id: u32,
        plan: Arc<PhysicalPlan>,
        factory: Box<dyn DataLayoutFactory>,
    ) -> SandboxResult<&mut WasmContext> {
        let config = self.config.clone();
        self.create_with(id, plan, factory, config)
    }

    /// Create a context with its own configuration; fails if `id` is taken
    pub fn create_with(
        &mut self,
        id: u32,
        plan: Arc<PhysicalPlan>,
        factory: Box<dyn DataLayoutFactory>,
        config: SandboxConfig,
    ) -> SandboxResult<&mut WasmContext> {
        match self.contexts.entry(id) {
            Entry::Occupied(_) => Err(fatal(SandboxError::duplicate_id(id))),
            Entry::Vacant(slot) => {
                let context = WasmContext::new(
                    id,
                    plan,
                    factory,
                    &self.engine,
                    config,
                    Arc::clone(&self.metrics),
                )?;
                self.metrics.increment_contexts_created();
                log_event_with_fields(Event::ContextCreated, &[("context", &id.to_string())]);
                Ok(slot.insert(context))
            }
        }
    }

    /// Return the context for `id`, creating it if absent.
    ///
    /// The flag is `true` when a new context was created. An existing
    /// context keeps its original plan and factory.
    pub fn get_or_create(
        &mut self,
        id: u32,
        plan: Arc<PhysicalPlan>,
        factory: Box<dyn DataLayoutFactory>,
    ) -> SandboxResult<(&mut WasmContext, bool)> {
        match self.contexts.entry(id) {
            Entry::Occupied(slot) => {
                log_event_with_fields(Event::ContextReused, &[("context", &id.to_string())]);
                Ok((slot.into_mut(), false))
            }
            Entry::Vacant(slot) => {
                let context = WasmContext::new(
                    id,
                    plan,
                    factory,
                    &self.engine,
                    self.config.clone(),
                    Arc::clone(&self.metrics),
                )?;
                self.metrics.increment_contexts_created();
                log_event_with_fields(Event::ContextCreated, &[("context", &id.to_string())]);
                Ok((slot.insert(context), true))
            }
        }
    }

    pub fn get(&self, id: u32) -> SandboxResult<&WasmContext> {
        self.contexts
            .get(&id)
            .ok_or_else(|| fatal(SandboxError::unknown_id(id)))
    }

    pub fn get_mut(&mut self, id: u32) -> SandboxResult<&mut WasmContext> {
        self.contexts
            .get_mut(&id)
            .ok_or_else(|| fatal(SandboxError::unknown_id(id)))
    }

    pub fn has(&self, id: u32) -> bool {
        self.contexts.contains_key(&id)
    }

    /// Remove a context and release its memory
    pub fn dispose(&mut self, id: u32) -> SandboxResult<()> {
        let context = self
            .contexts
            .remove(&id)
            .ok_or_else(|| fatal(SandboxError::unknown_id(id)))?;
        self.metrics.increment_contexts_disposed();
        log_event_with_fields(
            Event::ContextDisposed,
            &[
                ("context", &id.to_string()),
                ("heap", &context.heap().to_string()),
            ],
        );
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }

    /// Live context ids, ascending
    pub fn ids(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self.contexts.keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}

fn fatal(err: SandboxError) -> SandboxError {
    Logger::fatal(err.code().code(), &[("message", err.message())]);
    err
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Attribute, Table, Type};
    use crate::layout::RowLayoutFactory;
    use crate::sandbox::SandboxErrorCode;

    fn plan(id: u32) -> Arc<PhysicalPlan> {
        let table = Table::new("t", vec![Attribute::new("a", Type::Integer(8))]).unwrap();
        Arc::new(PhysicalPlan::new(id, Arc::new(table)))
    }

    #[test]
    fn test_create_get_dispose() {
        let mut registry = ContextRegistry::new();
        registry.create(7, plan(7), Box::new(RowLayoutFactory)).unwrap();
        assert!(registry.has(7));
        assert_eq!(registry.get(7).unwrap().id(), 7);

        registry.dispose(7).unwrap();
        assert!(!registry.has(7));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_duplicate_create_is_fatal() {
        let mut registry = ContextRegistry::new();
        registry.create(1, plan(1), Box::new(RowLayoutFactory)).unwrap();
        let err = registry
            .create(1, plan(1), Box::new(RowLayoutFactory))
            .unwrap_err();
        assert_eq!(err.code(), SandboxErrorCode::StrataRegistryDuplicateId);
        assert!(err.is_fatal());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_unknown_id_is_fatal() {
        let mut registry = ContextRegistry::new();
        assert_eq!(
            registry.get(3).unwrap_err().code(),
            SandboxErrorCode::StrataRegistryUnknownId
        );
        assert!(registry.dispose(3).unwrap_err().is_fatal());
        assert!(registry.get_mut(3).is_err());
    }

    #[test]
    fn test_get_or_create_reuses() {
        let mut registry = ContextRegistry::new();
        let (_, created) = registry
            .get_or_create(2, plan(2), Box::new(RowLayoutFactory))
            .unwrap();
        assert!(created);

        let other = plan(99);
        let (context, created) = registry
            .get_or_create(2, other, Box::new(RowLayoutFactory))
            .unwrap();
        assert!(!created);
        assert_eq!(context.plan().id(), 2);
        assert_eq!(registry.metrics().snapshot().contexts_created, 1);
    }

    #[test]
    fn test_id_reusable_after_dispose() {
        let mut registry = ContextRegistry::new();
        registry.create(5, plan(5), Box::new(RowLayoutFactory)).unwrap();
        registry.dispose(5).unwrap();
        registry.create(5, plan(5), Box::new(RowLayoutFactory)).unwrap();
        assert_eq!(registry.ids(), vec![5]);

        let snapshot = registry.metrics().snapshot();
        assert_eq!(snapshot.contexts_created, 2);
        assert_eq!(snapshot.contexts_disposed, 1);
    }

    #[test]
    fn test_with_config_rejects_invalid() {
        let config = SandboxConfig::default().with_size(0);
        assert!(ContextRegistry::with_config(config).is_err());
    }

    #[test]
    fn test_per_context_config() {
        let mut registry = ContextRegistry::new();
        let context = registry
            .create_with(
                1,
                plan(1),
                Box::new(RowLayoutFactory),
                SandboxConfig::with_guard_pages().with_size(1 << 20),
            )
            .unwrap();
        assert!(context.config(crate::sandbox::ContextFlags::TRAP_GUARD_PAGES));
        assert_eq!(context.vm().size(), 1 << 20);
    }
}
