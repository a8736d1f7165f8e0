//! The in-memory tabix index: sequence dictionary plus per-sequence bin and
//! linear indices.

use crate::bin_index::BinIndex;
use crate::config::TabixConfig;
use crate::error::{Result, TabixError};
use crate::interval::{parse_record_span, Interval};
use crate::linear_index::LinearIndex;
use rustc_hash::FxHashMap;

/// Sequence dictionary and per-sequence indices, addressed by dense sequence id.
///
/// Ids follow first appearance and are never reused or reordered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabixIndex {
    config: TabixConfig,
    names: Vec<String>,
    name_to_id: FxHashMap<String, u32>,
    bin_indices: Vec<BinIndex>,
    linear_indices: Vec<LinearIndex>,
}

impl TabixIndex {
    pub fn new(config: TabixConfig) -> Self {
        TabixIndex {
            config,
            names: Vec::new(),
            name_to_id: FxHashMap::default(),
            bin_indices: Vec::new(),
            linear_indices: Vec::new(),
        }
    }

    pub(crate) fn with_capacity(config: TabixConfig, n_seq: usize) -> Self {
        TabixIndex {
            config,
            names: Vec::with_capacity(n_seq),
            name_to_id: FxHashMap::with_capacity_and_hasher(n_seq, Default::default()),
            bin_indices: Vec::with_capacity(n_seq),
            linear_indices: Vec::with_capacity(n_seq),
        }
    }

    pub fn config(&self) -> &TabixConfig {
        &self.config
    }

    /// Id for `name`, appending a new empty sequence if it has not been seen.
    pub fn get_or_create_sequence_id(&mut self, name: &str) -> u32 {
        if let Some(&id) = self.name_to_id.get(name) {
            return id;
        }
        let id = self.names.len() as u32;
        self.names.push(name.to_owned());
        self.name_to_id.insert(name.to_owned(), id);
        self.bin_indices.push(BinIndex::new());
        self.linear_indices.push(LinearIndex::new());
        id
    }

    pub fn sequence_id(&self, name: &str) -> Option<u32> {
        self.name_to_id.get(name).copied()
    }

    pub fn sequence_name(&self, id: u32) -> Option<&str> {
        self.names.get(id as usize).map(String::as_str)
    }

    /// Sequence names in id order.
    pub fn sequence_names(&self) -> &[String] {
        &self.names
    }

    pub fn num_sequences(&self) -> usize {
        self.names.len()
    }

    pub fn bin_index(&self, id: u32) -> Option<&BinIndex> {
        self.bin_indices.get(id as usize)
    }

    pub fn linear_index(&self, id: u32) -> Option<&LinearIndex> {
        self.linear_indices.get(id as usize)
    }

    /// Interpret a record, registering its sequence name if new.
    pub fn record_to_interval(&mut self, columns: &[&str]) -> Result<Interval> {
        let span = parse_record_span(columns, &self.config)?;
        let id = self.get_or_create_sequence_id(span.name);
        Ok(Interval::new(id, span.begin, span.end))
    }

    /// Interpret a record against the existing dictionary only.
    ///
    /// Returns `Ok(None)` when the record's sequence is not indexed.
    pub fn lookup_interval(&self, columns: &[&str]) -> Result<Option<Interval>> {
        let span = parse_record_span(columns, &self.config)?;
        Ok(self
            .sequence_id(span.name)
            .map(|id| Interval::new(id, span.begin, span.end)))
    }

    /// Store the finished indices for sequence `id`.
    pub(crate) fn install(&mut self, id: u32, bins: BinIndex, linear: LinearIndex) {
        let slot = id as usize;
        self.bin_indices[slot] = bins;
        self.linear_indices[slot] = linear;
    }

    /// Append a sequence read from disk. Duplicate names make the index unusable.
    pub(crate) fn push_sequence(
        &mut self,
        name: String,
        bins: BinIndex,
        linear: LinearIndex,
    ) -> Result<u32> {
        if self.name_to_id.contains_key(&name) {
            return Err(TabixError::CorruptIndex(format!(
                "sequence '{name}' listed twice"
            )));
        }
        let id = self.get_or_create_sequence_id(&name);
        self.install(id, bins, linear);
        Ok(id)
    }
}
