// Columnar agent buffer shared by trajectory flattening and demonstration loading
use std::collections::BTreeMap;

use crate::error::{Result, TrainerError};

/// Column names. Observations are keyed by their index in the behavior spec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BufferKey {
    Obs(usize),
    NextObs(usize),
    Done,
    EnvironmentRewards,
    ContinuousAction,
    DiscreteAction,
    ContinuousLogProbs,
    DiscreteLogProbs,
    ActionMask,
    PrevAction,
    Memory,
    Masks,
    GroupReward,
    GroupContinuousAction,
    GroupDiscreteAction,
    GroupDones,
}

/// One column; every entry is a flattened float array (scalars are length 1).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentBufferField {
    entries: Vec<Vec<f32>>,
}

impl AgentBufferField {
    pub fn push(&mut self, entry: Vec<f32>) {
        self.entries.push(entry);
    }

    pub fn push_scalar(&mut self, value: f32) {
        self.entries.push(vec![value]);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn as_slice(&self) -> &[Vec<f32>] {
        &self.entries
    }

    /// Scalar view of a column whose entries all hold one value.
    pub fn scalars(&self) -> Vec<f32> {
        self.entries
            .iter()
            .map(|e| e.first().copied().unwrap_or(0.0))
            .collect()
    }

    /// The whole column, zero-padded to a multiple of `training_length`.
    ///
    /// Padding goes after the last entry, so every sequence starts on a real
    /// row and only the final one can end in padding. Sequences therefore line
    /// up with the episode start rather than its end.
    pub fn get_batch(&self, training_length: usize) -> Vec<Vec<f32>> {
        let training_length = training_length.max(1);
        let mut batch = self.entries.clone();
        let leftover = batch.len() % training_length;
        if leftover != 0 {
            let width = batch.last().map(Vec::len).unwrap_or(0);
            let padding = vec![0.0; width];
            batch.extend(std::iter::repeat(padding).take(training_length - leftover));
        }
        batch
    }

    pub fn extend(&mut self, entries: impl IntoIterator<Item = Vec<f32>>) {
        self.entries.extend(entries);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentBuffer {
    fields: BTreeMap<BufferKey, AgentBufferField>,
}

impl AgentBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// The column for `key`, created empty on first access.
    pub fn field_mut(&mut self, key: BufferKey) -> &mut AgentBufferField {
        self.fields.entry(key).or_default()
    }

    pub fn get(&self, key: BufferKey) -> Option<&AgentBufferField> {
        self.fields.get(&key)
    }

    pub fn contains_key(&self, key: BufferKey) -> bool {
        self.fields.contains_key(&key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &BufferKey> {
        self.fields.keys()
    }

    /// Number of rows, taken from the first column.
    pub fn num_experiences(&self) -> usize {
        self.fields.values().next().map(|f| f.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.num_experiences() == 0
    }

    /// True when every listed column has the same length.
    pub fn check_length(&self, keys: &[BufferKey]) -> bool {
        let mut lengths = keys
            .iter()
            .map(|k| self.fields.get(k).map(|f| f.len()).unwrap_or(0));
        match lengths.next() {
            Some(first) => lengths.all(|len| len == first),
            None => true,
        }
    }

    /// Appends every column to `target`, padded into `training_length` sequences.
    pub fn resequence_and_append(
        &self,
        target: &mut AgentBuffer,
        training_length: usize,
    ) -> Result<()> {
        let keys: Vec<BufferKey> = self.fields.keys().copied().collect();
        if !self.check_length(&keys) {
            return Err(TrainerError::Buffer(
                "the length of the fields were not of the same length".to_string(),
            ));
        }
        for (key, field) in &self.fields {
            target
                .field_mut(*key)
                .extend(field.get_batch(training_length));
        }
        Ok(())
    }

    /// Clears every column, keeping the keys.
    pub fn reset_agent(&mut self) {
        for field in self.fields.values_mut() {
            field.clear();
        }
    }
}
