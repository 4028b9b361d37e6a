//! Backend façade
//!
//! Ties one engine to the context registry. Executing a plan prepares its
//! context, compiles, runs and disposes the context again, whether the run
//! succeeded or not. A failing plan never affects other contexts.

use std::sync::Arc;

use super::engine::{CompiledPlan, ResultSet, WasmEngine};
use super::errors::BackendResult;
use super::plan::PhysicalPlan;
use super::scan::ScanEngine;
use crate::layout::DataLayoutFactory;
use crate::observability::{log_event_with_fields, Event, Logger};
use crate::sandbox::{ContextRegistry, SandboxResult, WasmContext};

#[derive(Debug)]
pub struct WasmBackend {
    engine: Box<dyn WasmEngine>,
}

impl Default for WasmBackend {
    fn default() -> Self {
        Self::new(Box::new(ScanEngine))
    }
}

impl WasmBackend {
    pub fn new(engine: Box<dyn WasmEngine>) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &dyn WasmEngine {
        self.engine.as_ref()
    }

    /// Get or create the plan's context and map its table and indexes.
    ///
    /// A reused context is returned as is. A new context whose mapping fails
    /// is disposed before the error is returned.
    pub fn prepare(
        &self,
        plan: &Arc<PhysicalPlan>,
        registry: &mut ContextRegistry,
        factory: Box<dyn DataLayoutFactory>,
    ) -> BackendResult<u32> {
        let id = plan.id();
        let (context, created) = registry.get_or_create(id, Arc::clone(plan), factory)?;
        if !created {
            return Ok(id);
        }
        if let Err(e) = map_plan(context, plan) {
            registry.dispose(id)?;
            return Err(e.into());
        }
        Ok(id)
    }

    /// Prepare, compile, execute and dispose
    pub fn execute(
        &self,
        plan: Arc<PhysicalPlan>,
        registry: &mut ContextRegistry,
        factory: Box<dyn DataLayoutFactory>,
    ) -> BackendResult<ResultSet> {
        let id = self.prepare(&plan, registry, factory)?;
        let result = self.run(&plan, registry);
        let disposed = registry.dispose(id);

        match result {
            Ok(result_set) => {
                disposed?;
                registry.metrics().increment_plans_executed();
                log_event_with_fields(
                    Event::PlanExecuted,
                    &[
                        ("engine", self.engine.name()),
                        ("plan", &id.to_string()),
                        ("rows", &result_set.num_rows().to_string()),
                    ],
                );
                Ok(result_set)
            }
            Err(e) => {
                registry.metrics().increment_plans_failed();
                Logger::error(
                    Event::PlanFailed.as_str(),
                    &[
                        ("engine", self.engine.name()),
                        ("error", &e.to_string()),
                        ("plan", &id.to_string()),
                    ],
                );
                Err(e)
            }
        }
    }

    /// Compile `plan` against its prepared context.
    ///
    /// A failure leaves the context in place for the caller to retry or dispose.
    pub fn compile(
        &self,
        plan: &PhysicalPlan,
        registry: &ContextRegistry,
    ) -> BackendResult<CompiledPlan> {
        let context = registry.get(plan.id())?;
        let compiled = self.engine.compile(plan, context)?;
        registry.metrics().increment_plans_compiled();
        log_event_with_fields(
            Event::PlanCompiled,
            &[
                ("engine", self.engine.name()),
                ("outputs", &compiled.outputs().len().to_string()),
                ("plan", &plan.id().to_string()),
            ],
        );
        Ok(compiled)
    }

    /// Run a compiled plan against the current contents of its context
    pub fn execute_compiled(
        &self,
        compiled: &CompiledPlan,
        registry: &ContextRegistry,
    ) -> BackendResult<ResultSet> {
        let context = registry.get(compiled.plan_id())?;
        self.engine.execute(compiled, context)
    }

    fn run(&self, plan: &PhysicalPlan, registry: &ContextRegistry) -> BackendResult<ResultSet> {
        let compiled = self.compile(plan, registry)?;
        self.execute_compiled(&compiled, registry)
    }
}

fn map_plan(context: &mut WasmContext, plan: &PhysicalPlan) -> SandboxResult<()> {
    context.map_table(plan.table())?;
    for index in plan.indexes() {
        context.map_index(index.as_ref())?;
        context.add_index(Arc::clone(index));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendError, CmpOp, Predicate};
    use crate::catalog::{Attribute, Table, Type, Value};
    use crate::layout::RowLayoutFactory;
    use crate::sandbox::SandboxConfig;

    fn plan(id: u32, rows: i64) -> Arc<PhysicalPlan> {
        let mut table = Table::new("nums", vec![Attribute::new("n", Type::Integer(8))]).unwrap();
        for i in 0..rows {
            table.insert(vec![Value::Int(i)]).unwrap();
        }
        Arc::new(
            PhysicalPlan::new(id, Arc::new(table))
                .filter(Predicate::new(0, CmpOp::Lt, Value::Int(3))),
        )
    }

    #[test]
    fn test_execute_disposes_context() {
        let backend = WasmBackend::default();
        let mut registry = ContextRegistry::new();
        let result = backend
            .execute(plan(1, 10), &mut registry, Box::new(RowLayoutFactory))
            .unwrap();

        assert_eq!(result.num_rows(), 3);
        assert!(registry.is_empty());
        let snapshot = registry.metrics().snapshot();
        assert_eq!(snapshot.plans_compiled, 1);
        assert_eq!(snapshot.plans_executed, 1);
        assert_eq!(snapshot.contexts_disposed, 1);
    }

    #[test]
    fn test_prepare_reuses_context() {
        let backend = WasmBackend::default();
        let mut registry = ContextRegistry::new();
        let p = plan(4, 2);
        backend.prepare(&p, &mut registry, Box::new(RowLayoutFactory)).unwrap();
        let heap = registry.get(4).unwrap().heap();
        backend.prepare(&p, &mut registry, Box::new(RowLayoutFactory)).unwrap();

        assert_eq!(registry.get(4).unwrap().heap(), heap);
        assert_eq!(registry.get(4).unwrap().mapped_tables().len(), 1);
    }

    #[test]
    fn test_failed_mapping_disposes_new_context() {
        let backend = WasmBackend::default();
        let mut registry =
            ContextRegistry::with_config(SandboxConfig::default().with_size(1024)).unwrap();
        let err = backend
            .prepare(&plan(2, 1), &mut registry, Box::new(RowLayoutFactory))
            .unwrap_err();

        assert!(matches!(err, BackendError::Sandbox(_)));
        assert!(err.is_fatal());
        assert!(!registry.has(2));
    }

    #[test]
    fn test_compile_failure_keeps_prepared_context() {
        let backend = WasmBackend::default();
        let mut registry = ContextRegistry::new();
        let good = plan(6, 5);
        backend.prepare(&good, &mut registry, Box::new(RowLayoutFactory)).unwrap();

        let bad = PhysicalPlan::new(6, Arc::clone(good.table())).project(vec![3]);
        assert!(backend.compile(&bad, &registry).is_err());
        assert!(registry.has(6));

        let compiled = backend.compile(&good, &registry).unwrap();
        let result = backend.execute_compiled(&compiled, &registry).unwrap();
        assert_eq!(result.num_rows(), 3);
        assert!(registry.has(6));
    }

    #[derive(Debug)]
    struct FailingEngine;

    impl WasmEngine for FailingEngine {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn compile(&self, plan: &PhysicalPlan, _: &WasmContext) -> BackendResult<CompiledPlan> {
            Err(BackendError::compile(plan.id(), "unsupported"))
        }

        fn execute(&self, compiled: &CompiledPlan, _: &WasmContext) -> BackendResult<ResultSet> {
            Err(BackendError::execute(compiled.plan_id(), "unreachable"))
        }
    }

    #[test]
    fn test_failure_disposes_only_its_context() {
        let backend = WasmBackend::new(Box::new(FailingEngine));
        let mut registry = ContextRegistry::new();
        let bystander = plan(8, 1);
        registry
            .create(8, Arc::clone(&bystander), Box::new(RowLayoutFactory))
            .unwrap();

        let err = backend
            .execute(plan(9, 1), &mut registry, Box::new(RowLayoutFactory))
            .unwrap_err();
        assert!(matches!(err, BackendError::Compile { plan: 9, .. }));
        assert!(!registry.has(9));
        assert!(registry.has(8));
        assert_eq!(registry.metrics().snapshot().plans_failed, 1);
    }
}
