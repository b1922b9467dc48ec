// Tracks the latest status of every member of every live agent group
use std::collections::HashMap;

use indexmap::IndexMap;

use crate::env::base_env::{AgentStep, Observation};
use crate::trainers::action_info::ActionOutputs;
use crate::trainers::behavior_id_utils::{
    get_global_agent_id, get_global_group_id, GlobalAgentId, GlobalGroupId,
};
use crate::trainers::trajectory::AgentStatus;

/// Group members in insertion order. Overwriting a member keeps its position.
pub type GroupMap<V> = IndexMap<GlobalAgentId, V>;

/// Two-level `group -> member -> value` map.
///
/// Inner maps are created on first touch through [`NestedMap::entry_group`] and
/// removed by [`NestedMap::remove_agent`] once they become empty.
#[derive(Debug, Clone)]
pub struct NestedMap<V> {
    groups: HashMap<GlobalGroupId, GroupMap<V>>,
}

impl<V> Default for NestedMap<V> {
    fn default() -> Self {
        Self {
            groups: HashMap::new(),
        }
    }
}

impl<V> NestedMap<V> {
    pub fn entry_group(&mut self, group_id: GlobalGroupId) -> &mut GroupMap<V> {
        self.groups.entry(group_id).or_default()
    }

    /// Removes the agent from every group, then drops groups left empty.
    pub fn remove_agent(&mut self, agent_id: &GlobalAgentId) {
        for members in self.groups.values_mut() {
            members.shift_remove(agent_id);
        }
        self.groups.retain(|_, members| !members.is_empty());
    }

    pub fn contains_agent(&self, agent_id: &GlobalAgentId) -> bool {
        self.groups
            .values()
            .any(|members| members.contains_key(agent_id))
    }

    pub fn num_groups(&self) -> usize {
        self.groups.len()
    }

    /// Values of every member of `group_id` except `exclude`, in insertion order.
    pub fn others(&self, group_id: &GlobalGroupId, exclude: &GlobalAgentId) -> Vec<&V> {
        self.groups
            .get(group_id)
            .map(|members| {
                members
                    .iter()
                    .filter(|(id, _)| *id != exclude)
                    .map(|(_, v)| v)
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// The agent's previous decision step, its index in that batch, and the policy
/// outputs computed for that batch.
#[derive(Debug, Clone, Copy)]
pub struct PendingStep<'a> {
    pub step: &'a AgentStep,
    pub index: usize,
    pub outputs: &'a ActionOutputs,
}

#[derive(Debug, Default)]
pub struct GroupStatusTracker {
    group_status: NestedMap<AgentStatus>,
    current_group_obs: NestedMap<Observation>,
}

impl GroupStatusTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the status an agent's teammates will see for this tick.
    ///
    /// Does nothing for ungrouped agents or agents with no pending transition.
    pub fn record(&mut self, step: &AgentStep, worker_id: u32, pending: Option<PendingStep<'_>>) {
        let Some(pending) = pending else {
            return;
        };
        let group_id = get_global_group_id(worker_id, step.group_id);
        if !group_id.is_grouped() {
            return;
        }
        let agent_id = get_global_agent_id(worker_id, step.agent_id);
        let status = AgentStatus {
            agent_id,
            obs: pending.step.obs.clone(),
            reward: step.reward,
            action: pending.outputs.action.row(pending.index),
            done: step.is_terminal(),
        };
        self.group_status.entry_group(group_id).insert(agent_id, status);
        self.current_group_obs
            .entry_group(group_id)
            .insert(agent_id, step.obs.clone());
    }

    pub fn snapshot_teammates(
        &self,
        group_id: &GlobalGroupId,
        exclude: &GlobalAgentId,
    ) -> Vec<AgentStatus> {
        self.group_status
            .others(group_id, exclude)
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn snapshot_teammate_obs(
        &self,
        group_id: &GlobalGroupId,
        exclude: &GlobalAgentId,
    ) -> Vec<Observation> {
        self.current_group_obs
            .others(group_id, exclude)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Forgets the agent in every group. Safe to call for unknown agents.
    pub fn clear(&mut self, agent_id: &GlobalAgentId) {
        self.current_group_obs.remove_agent(agent_id);
        self.group_status.remove_agent(agent_id);
    }

    pub fn contains_agent(&self, agent_id: &GlobalAgentId) -> bool {
        self.group_status.contains_agent(agent_id) || self.current_group_obs.contains_agent(agent_id)
    }

    pub fn num_groups(&self) -> usize {
        self.group_status.num_groups()
    }
}
