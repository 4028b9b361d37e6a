//! Physical plans
//!
//! A plan scans one table, keeps the rows satisfying every predicate and
//! returns the projected attributes. Plans are shared with the contexts
//! compiled for them, so they are built once and held in an `Arc`.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use crate::catalog::{Index, Table, Value};

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CmpOp {
    /// Whether `ordering` (left compared to right) satisfies the operator
    pub fn holds(&self, ordering: Ordering) -> bool {
        match self {
            CmpOp::Eq => ordering == Ordering::Equal,
            CmpOp::Ne => ordering != Ordering::Equal,
            CmpOp::Lt => ordering == Ordering::Less,
            CmpOp::Le => ordering != Ordering::Greater,
            CmpOp::Gt => ordering == Ordering::Greater,
            CmpOp::Ge => ordering != Ordering::Less,
        }
    }
}

impl fmt::Display for CmpOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CmpOp::Eq => "=",
            CmpOp::Ne => "<>",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
        };
        write!(f, "{}", s)
    }
}

/// `attribute op value`
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub attribute: usize,
    pub op: CmpOp,
    pub value: Value,
}

impl Predicate {
    pub fn new(attribute: usize, op: CmpOp, value: Value) -> Self {
        Self {
            attribute,
            op,
            value,
        }
    }

    /// Incomparable values never match
    pub fn evaluate(&self, candidate: &Value) -> bool {
        candidate
            .compare(&self.value)
            .map(|ordering| self.op.holds(ordering))
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone)]
pub struct PhysicalPlan {
    id: u32,
    table: Arc<Table>,
    projection: Vec<usize>,
    predicates: Vec<Predicate>,
    indexes: Vec<Arc<dyn Index>>,
}

impl PhysicalPlan {
    /// A plan returning every row and attribute of `table`
    pub fn new(id: u32, table: Arc<Table>) -> Self {
        Self {
            id,
            table,
            projection: Vec::new(),
            predicates: Vec::new(),
            indexes: Vec::new(),
        }
    }

    /// Restrict the output to `attributes`, in that order
    pub fn project(mut self, attributes: Vec<usize>) -> Self {
        self.projection = attributes;
        self
    }

    /// Add a conjunctive predicate
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    /// Attach an index to map alongside the table
    pub fn with_index(mut self, index: Arc<dyn Index>) -> Self {
        self.indexes.push(index);
        self
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn table(&self) -> &Arc<Table> {
        &self.table
    }

    pub fn projection(&self) -> &[usize] {
        &self.projection
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    pub fn indexes(&self) -> &[Arc<dyn Index>] {
        &self.indexes
    }

    /// Output attributes; an empty projection selects all of them
    pub fn output_attributes(&self) -> Vec<usize> {
        if self.projection.is_empty() {
            (0..self.table.attributes().len()).collect()
        } else {
            self.projection.clone()
        }
    }
}
