//! Layout-driven physical store
//!
//! A [`LayoutStore`] owns the bytes of a table in exactly the format its
//! [`DataLayout`] describes: the value of attribute `a` for row `r` lives at
//! `access_path(a).bit_offset(r)`. The buffer always covers whole root blocks,
//! so its length equals `layout.footprint_bytes(num_rows)`.

use super::codec::{check_value, decode, encode};
use super::errors::{CatalogError, CatalogResult};
use super::types::{Type, Value};
use crate::layout::{AccessPath, DataLayout};

#[derive(Debug, Clone)]
pub struct LayoutStore {
    layout: DataLayout,
    types: Vec<Type>,
    paths: Vec<AccessPath>,
    data: Vec<u8>,
    num_rows: u64,
}

impl LayoutStore {
    /// Create an empty store; `layout` must bind every attribute of `types`.
    pub fn new(layout: DataLayout, types: &[Type]) -> CatalogResult<Self> {
        layout.validate_covers(types)?;
        let paths = (0..types.len())
            .map(|attribute| layout.access_path(attribute))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            layout,
            types: types.to_vec(),
            paths,
            data: Vec::new(),
            num_rows: 0,
        })
    }

    pub fn layout(&self) -> &DataLayout {
        &self.layout
    }

    pub fn types(&self) -> &[Type] {
        &self.types
    }

    pub fn num_rows(&self) -> u64 {
        self.num_rows
    }

    /// The physical bytes, exactly `layout.footprint_bytes(num_rows)` long
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn access_path(&self, attribute: usize) -> CatalogResult<&AccessPath> {
        self.paths
            .get(attribute)
            .ok_or(CatalogError::UnknownAttribute(attribute))
    }

    /// Append a row and return its row id.
    ///
    /// The row is validated in full before any byte is written.
    pub fn append(&mut self, row: &[Value]) -> CatalogResult<u64> {
        if row.len() != self.types.len() {
            return Err(CatalogError::ArityMismatch {
                expected: self.types.len(),
                found: row.len(),
            });
        }
        for (attribute, (ty, value)) in self.types.iter().zip(row).enumerate() {
            if !ty.accepts(value) {
                return Err(CatalogError::TypeMismatch {
                    attribute,
                    expected: *ty,
                    found: value.kind(),
                });
            }
            check_value(*ty, value)?;
        }

        let row_id = self.num_rows;
        let needed = usize::try_from(self.layout.footprint_bytes(row_id + 1))
            .map_err(|_| CatalogError::ValueOutOfRange("store exceeds addressable memory".into()))?;
        if needed > self.data.len() {
            self.data.resize(needed, 0);
        }

        for ((path, ty), value) in self.paths.iter().zip(&self.types).zip(row) {
            encode(*ty, value, &mut self.data, bit_offset(path, row_id)?)?;
        }
        self.num_rows += 1;
        Ok(row_id)
    }

    /// Read one value
    pub fn get(&self, row: u64, attribute: usize) -> CatalogResult<Value> {
        if row >= self.num_rows {
            return Err(CatalogError::RowOutOfRange {
                row,
                num_rows: self.num_rows,
            });
        }
        let path = self.access_path(attribute)?;
        decode(path.ty(), &self.data, bit_offset(path, row)?)
    }

    /// Read a whole row in attribute order
    pub fn row(&self, row: u64) -> CatalogResult<Vec<Value>> {
        (0..self.types.len())
            .map(|attribute| self.get(row, attribute))
            .collect()
    }

    /// Copy every row into a new store using `layout`
    pub fn relayout(&self, layout: DataLayout) -> CatalogResult<LayoutStore> {
        let mut store = LayoutStore::new(layout, &self.types)?;
        for row in 0..self.num_rows {
            store.append(&self.row(row)?)?;
        }
        Ok(store)
    }
}

fn bit_offset(path: &AccessPath, row: u64) -> CatalogResult<u64> {
    path.bit_offset(row).ok_or_else(|| {
        CatalogError::ValueOutOfRange(format!(
            "row {} of attribute {} is not addressable",
            row,
            path.attribute()
        ))
    })
}
