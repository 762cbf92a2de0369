//! Named per-block arrays registered by add-ons on top of the four primary ones.

use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::tera::{ArraySize, TeraArray, TeraArrayEntry, TeraArrayRegistry};

#[derive(Debug, Error)]
pub enum ExtensionError {
    #[error("extension id must not be empty")]
    EmptyId,
    #[error("extension id already in use: {0}")]
    DuplicateId(String),
    #[error("extension {id} uses unknown encoding {encoding}")]
    UnknownEncoding { id: String, encoding: String },
}

/// A registered extension: its id, storage encoding and optional fill value.
#[derive(Clone, Debug)]
pub struct ExtensionEntry {
    pub id: String,
    pub encoding: TeraArrayEntry,
    pub fill: Option<u16>,
}

impl ExtensionEntry {
    /// Allocates the extension array for a chunk, pre-filled when a fill value is set.
    pub fn create(&self, size: ArraySize) -> Box<dyn TeraArray> {
        let mut array = self.encoding.create(size);
        if let Some(value) = self.fill {
            array.fill(value);
        }
        array
    }
}

#[derive(Clone, Debug, Default)]
pub struct ExtensionRegistry {
    entries: FxHashMap<String, ExtensionEntry>,
}

impl ExtensionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        id: &str,
        encoding: &str,
        fill: Option<u16>,
        arrays: &TeraArrayRegistry,
    ) -> Result<&ExtensionEntry, ExtensionError> {
        if id.trim().is_empty() {
            return Err(ExtensionError::EmptyId);
        }
        if self.entries.contains_key(id) {
            return Err(ExtensionError::DuplicateId(id.to_string()));
        }
        let encoding_entry =
            arrays
                .get(encoding)
                .cloned()
                .ok_or_else(|| ExtensionError::UnknownEncoding {
                    id: id.to_string(),
                    encoding: encoding.to_string(),
                })?;
        tracing::info!(id, encoding, ?fill, "registered chunk extension");
        let entry = self.entries.entry(id.to_string()).or_insert(ExtensionEntry {
            id: id.to_string(),
            encoding: encoding_entry,
            fill,
        });
        Ok(entry)
    }

    pub fn get(&self, id: &str) -> Option<&ExtensionEntry> {
        self.entries.get(id)
    }

    pub fn entries(&self) -> impl Iterator<Item = &ExtensionEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
