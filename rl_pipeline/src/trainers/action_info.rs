// Policy outputs attached to an environment step
use std::sync::Arc;

use crate::env::base_env::ActionBatch;

/// Log probabilities of one agent's action.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogProbsTuple {
    pub continuous: Vec<f32>,
    pub discrete: Vec<f32>,
}

/// Log probabilities for a batch of agents, row-aligned with [`ActionBatch`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogProbsBatch {
    pub continuous: Vec<Vec<f32>>,
    pub discrete: Vec<Vec<f32>>,
}

impl LogProbsBatch {
    pub fn row(&self, index: usize) -> LogProbsTuple {
        LogProbsTuple {
            continuous: self.continuous.get(index).cloned().unwrap_or_default(),
            discrete: self.discrete.get(index).cloned().unwrap_or_default(),
        }
    }
}

/// What the policy produced when evaluated on a decision batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActionOutputs {
    pub action: ActionBatch,
    pub log_probs: LogProbsBatch,
    pub entropy: Vec<f32>,
}

/// The actions taken for one behavior on one step. `outputs` is `None` right
/// after a reset, when no decision was requested yet.
#[derive(Debug, Clone, Default)]
pub struct ActionInfo {
    pub agent_ids: Vec<i32>,
    pub outputs: Option<Arc<ActionOutputs>>,
}

impl ActionInfo {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(agent_ids: Vec<i32>, outputs: ActionOutputs) -> Self {
        Self {
            agent_ids,
            outputs: Some(Arc::new(outputs)),
        }
    }
}
