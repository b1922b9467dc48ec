// Behavior and agent identifiers that stay unique across simulation workers
use std::fmt;

/// An agent id made unique across concurrently running workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GlobalAgentId {
    pub worker_id: u32,
    pub agent_id: i32,
}

impl fmt::Display for GlobalAgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "agent_{}-{}", self.worker_id, self.agent_id)
    }
}

/// A group id made unique across workers. Only positive local ids name a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GlobalGroupId {
    pub worker_id: u32,
    pub group_id: i32,
}

impl GlobalGroupId {
    pub fn is_grouped(&self) -> bool {
        self.group_id > 0
    }
}

impl fmt::Display for GlobalGroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "group_{}-{}", self.worker_id, self.group_id)
    }
}

pub fn get_global_agent_id(worker_id: u32, agent_id: i32) -> GlobalAgentId {
    GlobalAgentId {
        worker_id,
        agent_id,
    }
}

pub fn get_global_group_id(worker_id: u32, group_id: i32) -> GlobalGroupId {
    GlobalGroupId {
        worker_id,
        group_id,
    }
}

/// A parsed `"BrainName?team=N"` behavior id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BehaviorIdentifiers {
    pub behavior_id: String,
    pub brain_name: String,
    pub team_id: i32,
}

impl BehaviorIdentifiers {
    /// Parses a behavior id. A missing or malformed `team` parameter yields team 0.
    pub fn from_name_behavior_id(name_behavior_id: &str) -> Self {
        let (brain_name, query) = match name_behavior_id.split_once('?') {
            Some((name, query)) => (name, Some(query)),
            None => (name_behavior_id, None),
        };
        let team_id = query
            .into_iter()
            .flat_map(|q| q.split('&'))
            .filter_map(|pair| pair.split_once('='))
            .find(|(key, _)| *key == "team")
            .and_then(|(_, value)| value.parse().ok())
            .unwrap_or(0);
        Self {
            behavior_id: name_behavior_id.to_string(),
            brain_name: brain_name.to_string(),
            team_id,
        }
    }
}

pub fn create_name_behavior_id(name: &str, team_id: i32) -> String {
    format!("{}?team={}", name, team_id)
}
