//! Per-table key dictionary for compressed data regions.
//!
//! When compression is enabled, data-region records carry a small integer
//! id instead of the key bytes. The mapping lives next to the other table
//! files as `SST_Dictionary.json` — a JSON object of key → id, ids assigned
//! from 1 in first-appearance order during the write. Index and summary
//! entries keep full keys, so the dictionary is only consulted when a data
//! record is decoded.

use crate::layout::DICT_NAME;
use anyhow::{Context, Result};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// Bidirectional key ↔ id mapping for one table.
#[derive(Debug, Default)]
pub struct KeyDictionary {
    forward: BTreeMap<String, u64>,
    reverse: HashMap<u64, String>,
}

impl KeyDictionary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads the dictionary stored in a table directory.
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(DICT_NAME);
        let bytes = std::fs::read(&path)
            .with_context(|| format!("reading key dictionary {}", path.display()))?;
        let forward: BTreeMap<String, u64> =
            serde_json::from_slice(&bytes).context("parsing key dictionary")?;
        let reverse = forward.iter().map(|(k, &v)| (v, k.clone())).collect();
        Ok(Self { forward, reverse })
    }

    /// Writes the dictionary into a table directory.
    pub fn save(&self, dir: &Path) -> Result<()> {
        let json = serde_json::to_vec_pretty(&self.forward).context("encoding key dictionary")?;
        std::fs::write(dir.join(DICT_NAME), json).context("writing key dictionary")?;
        Ok(())
    }

    /// `true` if a table directory carries a dictionary (i.e. its data
    /// region is compressed).
    pub fn exists(dir: &Path) -> bool {
        dir.join(DICT_NAME).is_file()
    }

    /// Returns the id for `key`, assigning the next one on first sight.
    ///
    /// Keys are stored as lossy UTF-8: the engine's keyspace is textual,
    /// and JSON object keys must be strings.
    pub fn id_for(&mut self, key: &[u8]) -> u64 {
        let text = String::from_utf8_lossy(key).into_owned();
        if let Some(&id) = self.forward.get(&text) {
            return id;
        }
        let id = self.forward.len() as u64 + 1;
        self.forward.insert(text.clone(), id);
        self.reverse.insert(id, text);
        id
    }

    /// Resolves an id back to key bytes.
    pub fn key_for(&self, id: u64) -> Option<Vec<u8>> {
        self.reverse.get(&id).map(|k| k.clone().into_bytes())
    }

    pub fn len(&self) -> usize {
        self.forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }
}
