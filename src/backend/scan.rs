//! Reference scan engine
//!
//! Interprets a compiled plan directly against the context's linear memory:
//! every value is fetched through the bounds-checked context accessors at the
//! address its access path computes.

use super::engine::{CompiledPlan, ResultSet, WasmEngine};
use super::errors::{BackendError, BackendResult};
use super::plan::PhysicalPlan;
use crate::catalog::{decode, LayoutStore, Type, Value};
use crate::layout::AccessPath;
use crate::sandbox::WasmContext;

#[derive(Debug, Default, Clone, Copy)]
pub struct ScanEngine;

impl ScanEngine {
    fn read_value(
        compiled: &CompiledPlan,
        context: &WasmContext,
        path: &AccessPath,
        row: u64,
    ) -> BackendResult<Value> {
        let not_addressable = || {
            BackendError::execute(
                compiled.plan_id,
                format!("row {} of attribute {} is not addressable", row, path.attribute()),
            )
        };
        let bit = path.bit_offset(row).ok_or_else(not_addressable)?;
        let addr = u32::try_from(u64::from(compiled.table_addr) + bit / 8)
            .map_err(|_| not_addressable())?;
        let ty = path.ty();
        let bytes = context.read(addr, ty.size_in_bits().div_ceil(8))?;
        Ok(decode(ty, bytes, bit % 8)?)
    }
}

impl WasmEngine for ScanEngine {
    fn name(&self) -> &'static str {
        "scan"
    }

    fn compile(&self, plan: &PhysicalPlan, context: &WasmContext) -> BackendResult<CompiledPlan> {
        let table = plan.table();
        let mapped = context.mapped_table(table.name()).ok_or_else(|| {
            BackendError::compile(plan.id(), format!("table {} is not mapped", table.name()))
        })?;
        if mapped.types != table.types() {
            return Err(BackendError::compile(
                plan.id(),
                format!("table {} does not match its mapping", table.name()),
            ));
        }
        // Rows and layout come from the mapping, not from the plan's table
        let layout = &mapped.layout;
        let resolve = |attribute: usize| {
            layout
                .access_path(attribute)
                .map_err(|e| BackendError::compile(plan.id(), e.to_string()))
        };

        let mut outputs = Vec::new();
        let mut schema = Vec::new();
        for attribute in plan.output_attributes() {
            let column = table.attributes().get(attribute).ok_or_else(|| {
                BackendError::compile(plan.id(), format!("unknown output attribute {}", attribute))
            })?;
            outputs.push(resolve(attribute)?);
            schema.push(column.clone());
        }

        let mut filters = Vec::new();
        for predicate in plan.predicates() {
            let ty = table.types().get(predicate.attribute).copied().ok_or_else(|| {
                BackendError::compile(
                    plan.id(),
                    format!("unknown predicate attribute {}", predicate.attribute),
                )
            })?;
            let comparable = ty.accepts(&predicate.value)
                || (is_numeric(ty) && is_numeric_value(&predicate.value));
            if !comparable {
                return Err(BackendError::compile(
                    plan.id(),
                    format!(
                        "cannot compare {} attribute {} with {}",
                        ty,
                        predicate.attribute,
                        predicate.value.kind()
                    ),
                ));
            }
            filters.push((resolve(predicate.attribute)?, predicate.clone()));
        }

        Ok(CompiledPlan {
            plan_id: plan.id(),
            table_addr: mapped.addr(),
            num_rows: mapped.num_rows,
            outputs,
            filters,
            schema,
        })
    }

    fn execute(&self, compiled: &CompiledPlan, context: &WasmContext) -> BackendResult<ResultSet> {
        let mut matches = Vec::new();
        for row in 0..compiled.num_rows {
            let mut keep = true;
            for (path, predicate) in &compiled.filters {
                if !predicate.evaluate(&Self::read_value(compiled, context, path, row)?) {
                    keep = false;
                    break;
                }
            }
            if !keep {
                continue;
            }
            let values = compiled
                .outputs
                .iter()
                .map(|path| Self::read_value(compiled, context, path, row))
                .collect::<BackendResult<Vec<_>>>()?;
            matches.push(values);
        }

        let types: Vec<Type> = compiled.schema.iter().map(|a| a.ty).collect();
        let layout = context
            .result_set_factory()
            .make(&types, matches.len() as u64)?;
        let mut store = LayoutStore::new(layout, &types)?;
        for values in &matches {
            store.append(values)?;
        }
        Ok(ResultSet::new(compiled.schema.clone(), store))
    }
}

fn is_numeric(ty: Type) -> bool {
    matches!(ty, Type::Integer(_) | Type::Float | Type::Double)
}

fn is_numeric_value(value: &Value) -> bool {
    matches!(value, Value::Int(_) | Value::Float(_) | Value::Double(_))
}
