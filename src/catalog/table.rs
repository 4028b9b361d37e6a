//! Tables
//!
//! A table is a named schema plus its physical store. The layout can be
//! replaced at any time; existing rows are re-laid into the new format.

use serde::{Deserialize, Serialize};

use super::errors::CatalogResult;
use super::store::LayoutStore;
use super::types::{Type, Value};
use crate::layout::{DataLayout, DataLayoutFactory, PaxLayoutFactory};

/// A named, typed column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    pub ty: Type,
}

impl Attribute {
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Table {
    name: String,
    attributes: Vec<Attribute>,
    store: LayoutStore,
}

impl Table {
    /// Create a table stored in the default PAX format
    pub fn new(name: impl Into<String>, attributes: Vec<Attribute>) -> CatalogResult<Self> {
        let types: Vec<Type> = attributes.iter().map(|a| a.ty).collect();
        let layout = PaxLayoutFactory::default().make(&types, 0)?;
        Self::with_layout(name, attributes, layout)
    }

    /// Create a table stored in `layout`
    pub fn with_layout(
        name: impl Into<String>,
        attributes: Vec<Attribute>,
        layout: DataLayout,
    ) -> CatalogResult<Self> {
        let types: Vec<Type> = attributes.iter().map(|a| a.ty).collect();
        let store = LayoutStore::new(layout, &types)?;
        Ok(Self {
            name: name.into(),
            attributes,
            store,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    pub fn types(&self) -> &[Type] {
        self.store.types()
    }

    /// Position of the attribute called `name`
    pub fn attribute_index(&self, name: &str) -> Option<usize> {
        self.attributes.iter().position(|a| a.name == name)
    }

    pub fn num_rows(&self) -> u64 {
        self.store.num_rows()
    }

    pub fn layout(&self) -> &DataLayout {
        self.store.layout()
    }

    pub fn store(&self) -> &LayoutStore {
        &self.store
    }

    /// Replace the physical layout, moving existing rows into it.
    ///
    /// On error the table keeps its previous layout.
    pub fn set_layout(&mut self, layout: DataLayout) -> CatalogResult<()> {
        self.store = self.store.relayout(layout)?;
        Ok(())
    }

    /// Append a row, returning its row id
    pub fn insert(&mut self, row: Vec<Value>) -> CatalogResult<u64> {
        self.store.append(&row)
    }
}
