//! Auxiliary indexes
//!
//! The sandbox treats an index as an opaque blob with a size and an
//! alignment; only the index itself knows its byte format.

use std::fmt;

use super::errors::{CatalogError, CatalogResult};
use super::table::Table;
use super::types::Value;

/// An index that can be copied into linear memory
pub trait Index: fmt::Debug + Send + Sync {
    fn name(&self) -> &str;

    /// Bytes needed for the mapped representation
    fn footprint(&self) -> u64;

    /// Required alignment of the mapped representation, in bytes
    fn alignment(&self) -> u64;

    /// Serialize into `dst`, which is exactly `footprint()` bytes long
    fn write_into(&self, dst: &mut [u8]);
}

/// Sorted array of `(key, row)` pairs over an integral attribute.
///
/// Mapped format: one 16-byte entry per row, `key: i64` at +0 and
/// `row: u32` at +8 (little-endian), 4 bytes padding.
#[derive(Debug, Clone)]
pub struct SortedIndex {
    name: String,
    attribute: usize,
    entries: Vec<(i64, u32)>,
}

impl SortedIndex {
    /// Size of one mapped entry
    pub const ENTRY_SIZE: usize = 16;

    /// Build over `attribute` of `table`
    pub fn build(name: impl Into<String>, table: &Table, attribute: usize) -> CatalogResult<Self> {
        let ty = table
            .types()
            .get(attribute)
            .copied()
            .ok_or(CatalogError::UnknownAttribute(attribute))?;
        if !ty.is_integral() {
            return Err(CatalogError::Index(format!(
                "cannot index {} attribute {}",
                ty, attribute
            )));
        }

        let mut entries = Vec::with_capacity(table.num_rows() as usize);
        for row in 0..table.num_rows() {
            let row_id = u32::try_from(row)
                .map_err(|_| CatalogError::Index("row id exceeds 32 bits".into()))?;
            match table.store().get(row, attribute)? {
                Value::Int(key) => entries.push((key, row_id)),
                other => {
                    return Err(CatalogError::Corrupt(format!(
                        "integral attribute decoded as {}",
                        other.kind()
                    )))
                }
            }
        }
        entries.sort_unstable();

        Ok(Self {
            name: name.into(),
            attribute,
            entries,
        })
    }

    pub fn attribute(&self) -> usize {
        self.attribute
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Row ids whose key equals `key`, ascending
    pub fn lookup(&self, key: i64) -> Vec<u32> {
        let start = self.entries.partition_point(|(k, _)| *k < key);
        self.entries[start..]
            .iter()
            .take_while(|(k, _)| *k == key)
            .map(|(_, row)| *row)
            .collect()
    }

    /// Decode one mapped entry
    pub fn decode_entry(bytes: &[u8]) -> Option<(i64, u32)> {
        let key = i64::from_le_bytes(bytes.get(0..8)?.try_into().ok()?);
        let row = u32::from_le_bytes(bytes.get(8..12)?.try_into().ok()?);
        Some((key, row))
    }
}

impl Index for SortedIndex {
    fn name(&self) -> &str {
        &self.name
    }

    fn footprint(&self) -> u64 {
        (self.entries.len() * Self::ENTRY_SIZE) as u64
    }

    fn alignment(&self) -> u64 {
        8
    }

    fn write_into(&self, dst: &mut [u8]) {
        for (chunk, (key, row)) in dst.chunks_exact_mut(Self::ENTRY_SIZE).zip(&self.entries) {
            chunk[0..8].copy_from_slice(&key.to_le_bytes());
            chunk[8..12].copy_from_slice(&row.to_le_bytes());
            chunk[12..16].fill(0);
        }
    }
}
