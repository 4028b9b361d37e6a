//! Backend Execution Tests
//!
//! End-to-end tests for plan execution:
//! - Nested PAX tables are mapped byte-for-byte and scanned correctly
//! - Results follow the context's result layout factory
//! - Every execution disposes its context, failed or not

use std::sync::Arc;

use strata::backend::{BackendError, CmpOp, PhysicalPlan, Predicate, WasmBackend};
use strata::catalog::{Attribute, Index, SortedIndex, Table, Type, Value};
use strata::layout::{DataLayout, PaxLayoutFactory, RowLayoutFactory};
use strata::sandbox::{ContextRegistry, SandboxConfig};

// =============================================================================
// Helper Functions
// =============================================================================

const BLOCK_BITS: u64 = 64 * 1024 * 8;

/// id, name and manager grouped apart from the numeric columns
fn employees_layout() -> DataLayout {
    let mut layout = DataLayout::new(1000);
    let outer = layout.add_root(256, BLOCK_BITS).unwrap();

    let ids = layout.add_inner(outer, 256, 0, 256 * 32).unwrap();
    layout.add_leaf(ids, Type::Integer(4), 0, 0, 32).unwrap();

    let names = layout.add_inner(outer, 256, 256 * 32, 256 * 51 * 8).unwrap();
    layout.add_leaf(names, Type::Char(50), 1, 0, 400).unwrap();
    layout.add_leaf(names, Type::Boolean, 4, 256 * 400, 8).unwrap();

    let nums = layout.add_inner(outer, 256, 256 * 55 * 8, 256 * 12 * 8).unwrap();
    layout.add_leaf(nums, Type::Integer(4), 2, 0, 32).unwrap();
    layout.add_leaf(nums, Type::Double, 3, 256 * 32, 64).unwrap();

    layout
}

fn salary(i: i64) -> f64 {
    30_000.0 + (i * 37 % 100) as f64 * 1_000.0
}

fn employees(rows: i64) -> Arc<Table> {
    let mut table = Table::with_layout(
        "employees",
        vec![
            Attribute::new("id", Type::Integer(4)),
            Attribute::new("name", Type::Char(50)),
            Attribute::new("age", Type::Integer(4)),
            Attribute::new("salary", Type::Double),
            Attribute::new("manager", Type::Boolean),
        ],
        employees_layout(),
    )
    .unwrap();
    for i in 0..rows {
        table
            .insert(vec![
                Value::Int(i),
                Value::Char(format!("employee-{}", i)),
                Value::Int(20 + i % 45),
                Value::Double(salary(i)),
                Value::Bool(i % 10 == 0),
            ])
            .unwrap();
    }
    Arc::new(table)
}

fn numbers(values: &[i64]) -> Arc<Table> {
    let mut table = Table::new("t", vec![Attribute::new("n", Type::Integer(8))]).unwrap();
    for v in values {
        table.insert(vec![Value::Int(*v)]).unwrap();
    }
    Arc::new(table)
}

// =============================================================================
// Execution Tests
// =============================================================================

/// Filter and projection over a nested PAX table spanning several blocks.
#[test]
fn test_scan_nested_pax_table() {
    let table = employees(600);
    let plan = PhysicalPlan::new(1, Arc::clone(&table))
        .filter(Predicate::new(3, CmpOp::Ge, Value::Double(120_000.0)))
        .filter(Predicate::new(4, CmpOp::Eq, Value::Bool(false)))
        .project(vec![1, 3]);

    let backend = WasmBackend::default();
    let mut registry = ContextRegistry::new();
    let result = backend
        .execute(Arc::new(plan), &mut registry, Box::new(PaxLayoutFactory::new(4096)))
        .unwrap();

    let expected: Vec<Vec<Value>> = (0..600)
        .filter(|i| salary(*i) >= 120_000.0 && i % 10 != 0)
        .map(|i| {
            vec![
                Value::Char(format!("employee-{}", i)),
                Value::Double(salary(i)),
            ]
        })
        .collect();
    assert!(!expected.is_empty());
    assert_eq!(result.rows().unwrap(), expected);
    assert_eq!(result.schema()[0].name, "name");
    assert!(registry.is_empty());
}

/// The salary of tuple 10 sits at byte 15184 of the mapped table.
#[test]
fn test_mapped_salary_offset() {
    let table = employees(20);
    let plan = Arc::new(PhysicalPlan::new(2, Arc::clone(&table)));
    let backend = WasmBackend::default();
    let mut registry = ContextRegistry::new();

    backend
        .prepare(&plan, &mut registry, Box::new(RowLayoutFactory))
        .unwrap();
    let context = registry.get(2).unwrap();
    let base = context.table_address("employees").unwrap();
    let bytes = context.read(base + 15_184, 8).unwrap();
    assert_eq!(bytes, &salary(10).to_le_bytes());
}

/// Indexes attached to the plan are mapped and registered with the context.
#[test]
fn test_prepare_maps_indexes() {
    let table = employees(50);
    let index: Arc<dyn Index> = Arc::new(SortedIndex::build("by_age", &table, 2).unwrap());
    let plan = Arc::new(PhysicalPlan::new(3, Arc::clone(&table)).with_index(Arc::clone(&index)));

    let backend = WasmBackend::default();
    let mut registry = ContextRegistry::with_config(SandboxConfig::with_guard_pages()).unwrap();
    backend
        .prepare(&plan, &mut registry, Box::new(RowLayoutFactory))
        .unwrap();

    let context = registry.get(3).unwrap();
    assert_eq!(context.indexes().len(), 1);
    let mapped = &context.mapped_indexes()[0];
    assert_eq!(mapped.name, "by_age");
    assert_eq!(mapped.len, index.footprint());
    assert_eq!(context.guard_regions().len(), 2);

    let first = context.read(mapped.addr, 16).unwrap();
    assert_eq!(SortedIndex::decode_entry(first), Some((20, 0)));
}

/// Results are laid out by the factory given at execution time.
#[test]
fn test_result_layout_from_factory() {
    let table = employees(30);
    let plan = Arc::new(PhysicalPlan::new(4, table).project(vec![0, 2]));

    let backend = WasmBackend::default();
    let mut registry = ContextRegistry::new();
    let result = backend
        .execute(plan, &mut registry, Box::new(RowLayoutFactory))
        .unwrap();

    assert_eq!(result.num_rows(), 30);
    // two INTEGER(4) columns packed in one 64-bit row
    assert_eq!(result.layout().footprint_bytes(1), 8);
    assert_eq!(result.row(29).unwrap(), vec![Value::Int(29), Value::Int(20 + 29)]);
}

/// Compilation binds to the rows that were mapped, not to a later table of the same name.
#[test]
fn test_compile_binds_to_mapped_rows() {
    let mapped = numbers(&[100, 101]);
    let index: Arc<dyn Index> = Arc::new(SortedIndex::build("n_idx", &mapped, 0).unwrap());
    let prepared = Arc::new(PhysicalPlan::new(1, mapped).with_index(index));

    let backend = WasmBackend::default();
    let mut registry = ContextRegistry::new();
    backend
        .prepare(&prepared, &mut registry, Box::new(RowLayoutFactory))
        .unwrap();

    let grown = PhysicalPlan::new(1, numbers(&[100, 101, 7, 8, 9, 10]));
    let compiled = backend.compile(&grown, &registry).unwrap();
    assert_eq!(compiled.num_rows(), 2);

    let rows = backend.execute_compiled(&compiled, &registry).unwrap().rows().unwrap();
    assert_eq!(rows, vec![vec![Value::Int(100)], vec![Value::Int(101)]]);
}

/// A plan whose table disagrees with the mapped schema does not compile.
#[test]
fn test_compile_rejects_schema_mismatch() {
    let backend = WasmBackend::default();
    let mut registry = ContextRegistry::new();
    backend
        .prepare(
            &Arc::new(PhysicalPlan::new(2, numbers(&[1, 2, 3]))),
            &mut registry,
            Box::new(RowLayoutFactory),
        )
        .unwrap();

    let mut doubles = Table::new("t", vec![Attribute::new("n", Type::Double)]).unwrap();
    doubles.insert(vec![Value::Double(1.0)]).unwrap();
    let other = PhysicalPlan::new(2, Arc::new(doubles));

    let err = backend.compile(&other, &registry).unwrap_err();
    assert!(matches!(err, BackendError::Compile { plan: 2, .. }));
    assert!(registry.has(2));
}

// =============================================================================
// Failure Tests
// =============================================================================

/// A compile failure is reported, counted, and its context disposed.
#[test]
fn test_compile_failure_disposes_context() {
    let table = employees(5);
    let plan = Arc::new(
        PhysicalPlan::new(5, table).filter(Predicate::new(1, CmpOp::Eq, Value::Double(1.0))),
    );

    let backend = WasmBackend::default();
    let mut registry = ContextRegistry::new();
    let err = backend
        .execute(plan, &mut registry, Box::new(RowLayoutFactory))
        .unwrap_err();

    assert!(matches!(err, BackendError::Compile { plan: 5, .. }));
    assert!(!err.is_fatal());
    assert!(registry.is_empty());
    assert_eq!(registry.metrics().snapshot().plans_failed, 1);
}

/// A table that does not fit the sandbox fails fatally without leaking a context.
#[test]
fn test_exhausted_sandbox_is_fatal() {
    let table = employees(10);
    let plan = Arc::new(PhysicalPlan::new(6, table));

    let backend = WasmBackend::default();
    let mut registry =
        ContextRegistry::with_config(SandboxConfig::default().with_size(32 * 1024)).unwrap();
    let err = backend
        .execute(plan, &mut registry, Box::new(RowLayoutFactory))
        .unwrap_err();

    assert!(err.is_fatal());
    assert!(registry.is_empty());
}
