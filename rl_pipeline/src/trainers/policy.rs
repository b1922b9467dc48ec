// Policy capability consumed by the agent processor and env manager
use std::collections::HashMap;

use parking_lot::Mutex;

use crate::env::base_env::{ActionTuple, DecisionSteps};
use crate::error::Result;
use crate::trainers::action_info::ActionInfo;
use crate::trainers::behavior_id_utils::GlobalAgentId;

/// Per-agent previous-action and recurrent-memory caches.
///
/// A policy is shared as `Arc<dyn Policy>` between the stepping thread and the
/// trainer, so the caches sit behind a lock.
pub struct AgentMemoryStore {
    num_discrete_branches: usize,
    memory_size: usize,
    previous_actions: Mutex<HashMap<GlobalAgentId, Vec<i32>>>,
    memories: Mutex<HashMap<GlobalAgentId, Vec<f32>>>,
    previous_memories: Mutex<HashMap<GlobalAgentId, Vec<f32>>>,
}

impl AgentMemoryStore {
    pub fn new(num_discrete_branches: usize, memory_size: usize) -> Self {
        Self {
            num_discrete_branches,
            memory_size,
            previous_actions: Mutex::new(HashMap::new()),
            memories: Mutex::new(HashMap::new()),
            previous_memories: Mutex::new(HashMap::new()),
        }
    }

    pub fn memory_size(&self) -> usize {
        self.memory_size
    }

    /// Stores the discrete half of each agent's action.
    pub fn save_previous_action(&self, agent_ids: &[GlobalAgentId], actions: &[ActionTuple]) {
        let mut previous = self.previous_actions.lock();
        for (agent_id, action) in agent_ids.iter().zip(actions) {
            previous.insert(*agent_id, action.discrete.clone());
        }
    }

    /// Zero rows for agents with no stored action.
    pub fn retrieve_previous_action(&self, agent_ids: &[GlobalAgentId]) -> Vec<Vec<i32>> {
        let previous = self.previous_actions.lock();
        agent_ids
            .iter()
            .map(|id| {
                previous
                    .get(id)
                    .cloned()
                    .unwrap_or_else(|| vec![0; self.num_discrete_branches])
            })
            .collect()
    }

    pub fn remove_previous_action(&self, agent_ids: &[GlobalAgentId]) {
        let mut previous = self.previous_actions.lock();
        for id in agent_ids {
            previous.remove(id);
        }
    }

    /// Saves new memories; the memories they replace become the "previous" ones.
    pub fn save_memories(&self, agent_ids: &[GlobalAgentId], memories: &[Vec<f32>]) {
        let mut current = self.memories.lock();
        let mut previous = self.previous_memories.lock();
        for id in agent_ids {
            if let Some(old) = current.get(id) {
                previous.insert(*id, old.clone());
            }
        }
        for (id, memory) in agent_ids.iter().zip(memories) {
            current.insert(*id, memory.clone());
        }
    }

    pub fn retrieve_memories(&self, agent_ids: &[GlobalAgentId]) -> Vec<Vec<f32>> {
        Self::lookup(&self.memories.lock(), agent_ids, self.memory_size)
    }

    pub fn retrieve_previous_memories(&self, agent_ids: &[GlobalAgentId]) -> Vec<Vec<f32>> {
        Self::lookup(&self.previous_memories.lock(), agent_ids, self.memory_size)
    }

    pub fn remove_memories(&self, agent_ids: &[GlobalAgentId]) {
        let mut current = self.memories.lock();
        let mut previous = self.previous_memories.lock();
        for id in agent_ids {
            current.remove(id);
            previous.remove(id);
        }
    }

    fn lookup(
        map: &HashMap<GlobalAgentId, Vec<f32>>,
        agent_ids: &[GlobalAgentId],
        size: usize,
    ) -> Vec<Vec<f32>> {
        agent_ids
            .iter()
            .map(|id| map.get(id).cloned().unwrap_or_else(|| vec![0.0; size]))
            .collect()
    }
}

/// The policy as seen by the experience pipeline. Network internals stay opaque.
///
/// Only `get_action`, `use_recurrent` and `memory_store` are required; the
/// bookkeeping methods default to the shared [`AgentMemoryStore`].
pub trait Policy: Send + Sync {
    fn get_action(&self, decision_steps: &DecisionSteps, worker_id: u32) -> Result<ActionInfo>;

    fn use_recurrent(&self) -> bool;

    fn memory_store(&self) -> &AgentMemoryStore;

    fn save_previous_action(&self, agent_ids: &[GlobalAgentId], actions: &[ActionTuple]) {
        self.memory_store().save_previous_action(agent_ids, actions);
    }

    fn retrieve_previous_action(&self, agent_ids: &[GlobalAgentId]) -> Vec<Vec<i32>> {
        self.memory_store().retrieve_previous_action(agent_ids)
    }

    fn remove_previous_action(&self, agent_ids: &[GlobalAgentId]) {
        self.memory_store().remove_previous_action(agent_ids);
    }

    fn retrieve_previous_memories(&self, agent_ids: &[GlobalAgentId]) -> Vec<Vec<f32>> {
        self.memory_store().retrieve_previous_memories(agent_ids)
    }

    fn remove_memories(&self, agent_ids: &[GlobalAgentId]) {
        self.memory_store().remove_memories(agent_ids);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trainers::behavior_id_utils::get_global_agent_id;

    #[test]
    fn test_previous_action_defaults_to_zeros() {
        let store = AgentMemoryStore::new(2, 0);
        let a = get_global_agent_id(0, 1);
        let b = get_global_agent_id(0, 2);
        store.save_previous_action(
            &[a],
            &[ActionTuple {
                continuous: vec![0.5],
                discrete: vec![1, 3],
            }],
        );
        assert_eq!(store.retrieve_previous_action(&[a, b]), vec![vec![1, 3], vec![0, 0]]);
        store.remove_previous_action(&[a]);
        assert_eq!(store.retrieve_previous_action(&[a]), vec![vec![0, 0]]);
    }

    #[test]
    fn test_save_memories_shifts_to_previous() {
        let store = AgentMemoryStore::new(0, 2);
        let a = get_global_agent_id(1, 0);
        store.save_memories(&[a], &[vec![1.0, 1.0]]);
        assert_eq!(store.retrieve_previous_memories(&[a]), vec![vec![0.0, 0.0]]);
        store.save_memories(&[a], &[vec![2.0, 2.0]]);
        assert_eq!(store.retrieve_previous_memories(&[a]), vec![vec![1.0, 1.0]]);
        assert_eq!(store.retrieve_memories(&[a]), vec![vec![2.0, 2.0]]);
        store.remove_memories(&[a]);
        assert_eq!(store.retrieve_memories(&[a]), vec![vec![0.0, 0.0]]);
    }
}
