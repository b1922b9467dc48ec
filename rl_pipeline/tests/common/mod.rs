#![allow(dead_code)]

use std::sync::Arc;

use rl_pipeline::env::base_env::{ActionBatch, AgentStep, DecisionSteps, StepBatch};
use rl_pipeline::trainers::action_info::{ActionInfo, ActionOutputs, LogProbsBatch};
use rl_pipeline::trainers::policy::{AgentMemoryStore, Policy};
use rl_pipeline::trainers::stats::StatsReporter;
use rl_pipeline::Result;

/// Deterministic policy: agent `i` in a batch gets continuous action `[i]` and
/// discrete action `[i]`.
pub struct MockPolicy {
    pub name: String,
    store: AgentMemoryStore,
}

impl MockPolicy {
    pub fn new(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            store: AgentMemoryStore::new(1, 0),
        })
    }
}

impl Policy for MockPolicy {
    fn get_action(&self, decision_steps: &DecisionSteps, _worker_id: u32) -> Result<ActionInfo> {
        Ok(action_info(&decision_steps.agent_ids()))
    }

    fn use_recurrent(&self) -> bool {
        false
    }

    fn memory_store(&self) -> &AgentMemoryStore {
        &self.store
    }
}

pub fn action_info(agent_ids: &[i32]) -> ActionInfo {
    let n = agent_ids.len();
    ActionInfo::new(
        agent_ids.to_vec(),
        ActionOutputs {
            action: ActionBatch {
                continuous: (0..n).map(|i| vec![i as f32]).collect(),
                discrete: (0..n).map(|i| vec![i as i32]).collect(),
            },
            log_probs: LogProbsBatch {
                continuous: vec![vec![-1.0]; n],
                discrete: vec![vec![-0.5]; n],
            },
            entropy: vec![0.5],
        },
    )
}

pub fn stats() -> Arc<StatsReporter> {
    Arc::new(StatsReporter::new("Test"))
}

pub fn obs(value: f32) -> Vec<Vec<f32>> {
    vec![vec![value, value]]
}

pub fn decision(agent_id: i32, value: f32) -> AgentStep {
    AgentStep::decision(agent_id, obs(value), value)
}

pub fn grouped_decision(agent_id: i32, group_id: i32, value: f32) -> AgentStep {
    decision(agent_id, value).with_group(group_id, 0.1)
}

pub fn batch(steps: Vec<AgentStep>) -> StepBatch {
    StepBatch::new(steps)
}
