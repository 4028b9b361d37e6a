//! Persisted layouts
//!
//! Format:
//! ```json
//! {
//!   "format_version": 1,
//!   "checksum": "crc32:1a2b3c4d",
//!   "layout": { "num_tuples": 1000, "nodes": [...], "root": 0 }
//! }
//! ```
//!
//! The checksum covers the compact JSON encoding of `layout`. Loading verifies
//! the checksum and then replays the tree through the checked construction
//! operations, so a file can never produce a malformed layout.

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::errors::{LayoutError, LayoutResult};
use super::tree::{DataLayout, RawDataLayout};
use crate::observability::{log_event_with_fields, Event};

/// Current on-disk format version
pub const LAYOUT_FORMAT_VERSION: u8 = 1;

#[derive(Debug, Serialize)]
struct LayoutEnvelope<'a> {
    format_version: u8,
    checksum: String,
    layout: &'a DataLayout,
}

// Read side keeps the layout unchecked until its checksum is verified
#[derive(Debug, Deserialize)]
struct StoredEnvelope {
    format_version: u8,
    checksum: String,
    layout: RawDataLayout,
}

/// Formatted CRC32 of the layout's compact JSON encoding
pub fn checksum(layout: &DataLayout) -> LayoutResult<String> {
    crc_of(layout)
}

fn crc_of<T: Serialize>(layout: &T) -> LayoutResult<String> {
    let bytes = serde_json::to_vec(layout).map_err(|e| {
        LayoutError::persist_failed(format!("Failed to serialize layout: {}", e))
    })?;
    Ok(format!("crc32:{:08x}", crc32fast::hash(&bytes)))
}

/// Serialize a layout with its checksum envelope
pub fn to_json(layout: &DataLayout) -> LayoutResult<String> {
    let envelope = LayoutEnvelope {
        format_version: LAYOUT_FORMAT_VERSION,
        checksum: checksum(layout)?,
        layout,
    };
    serde_json::to_string_pretty(&envelope)
        .map_err(|e| LayoutError::persist_failed(format!("Failed to serialize layout: {}", e)))
}

/// Parse, verify and re-validate a layout envelope
pub fn from_json(json: &str) -> LayoutResult<DataLayout> {
    let envelope: StoredEnvelope = serde_json::from_str(json)
        .map_err(|e| LayoutError::persist_failed(format!("Failed to parse layout: {}", e)))?;

    if envelope.format_version != LAYOUT_FORMAT_VERSION {
        return Err(LayoutError::persist_failed(format!(
            "Unsupported layout format version {}",
            envelope.format_version
        )));
    }

    let actual = crc_of(&envelope.layout)?;
    if actual != envelope.checksum {
        log_event_with_fields(
            Event::LayoutCorrupted,
            &[("expected", &envelope.checksum), ("actual", &actual)],
        );
        return Err(LayoutError::checksum_mismatch(&envelope.checksum, &actual));
    }

    DataLayout::try_from(envelope.layout)
}

/// Write a layout to `path` and fsync it
pub fn save(layout: &DataLayout, path: &Path) -> LayoutResult<()> {
    let json = to_json(layout)?;

    let mut file = File::create(path).map_err(|e| {
        LayoutError::persist_io(format!("Failed to create layout file: {}", path.display()), e)
    })?;
    file.write_all(json.as_bytes()).map_err(|e| {
        LayoutError::persist_io(format!("Failed to write layout: {}", path.display()), e)
    })?;
    file.sync_all().map_err(|e| {
        LayoutError::persist_io(format!("Failed to fsync layout: {}", path.display()), e)
    })?;

    log_event_with_fields(Event::LayoutPersisted, &[("path", &path.display().to_string())]);
    Ok(())
}

/// Load and verify a layout from `path`
pub fn load(path: &Path) -> LayoutResult<DataLayout> {
    let json = fs::read_to_string(path).map_err(|e| {
        LayoutError::persist_io(format!("Failed to read layout: {}", path.display()), e)
    })?;
    let layout = from_json(&json)?;

    log_event_with_fields(Event::LayoutLoaded, &[("path", &path.display().to_string())]);
    Ok(layout)
}
