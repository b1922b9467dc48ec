// Experience and trajectory records emitted by the agent processor
use crate::env::base_env::{ActionTuple, Observation};
use crate::trainers::action_info::LogProbsTuple;
use crate::trainers::behavior_id_utils::GlobalAgentId;
use crate::trainers::buffer::{AgentBuffer, BufferKey};

/// A teammate's most recent observation, reward, action and done flag.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentStatus {
    pub agent_id: GlobalAgentId,
    pub obs: Observation,
    pub reward: f32,
    pub action: ActionTuple,
    pub done: bool,
}

/// One agent's transition for one step.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentExperience {
    pub obs: Observation,
    pub reward: f32,
    pub done: bool,
    pub action: ActionTuple,
    pub action_probs: LogProbsTuple,
    /// `true` marks an unavailable discrete action.
    pub action_mask: Option<Vec<bool>>,
    pub prev_action: Vec<i32>,
    pub interrupted: bool,
    pub memory: Option<Vec<f32>>,
    /// Statuses of the other group members; never contains the owner.
    pub group_status: Vec<AgentStatus>,
    pub group_reward: f32,
}

/// A segment of one agent's experiences, cut at the time horizon or at the
/// end of the episode.
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory {
    pub steps: Vec<AgentExperience>,
    /// Observation following the last step, for value bootstrapping.
    pub next_obs: Observation,
    /// Teammates' current observations, excluding the owner.
    pub next_group_obs: Vec<Observation>,
    pub agent_id: GlobalAgentId,
    pub behavior_id: String,
}

impl Trajectory {
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Whether the segment ends its episode.
    pub fn done_reached(&self) -> bool {
        self.steps.last().map(|s| s.done).unwrap_or(false)
    }

    pub fn interrupted(&self) -> bool {
        self.steps.last().map(|s| s.interrupted).unwrap_or(false)
    }

    /// Whether the owner and every teammate seen on the last step are done.
    pub fn all_group_dones_reached(&self) -> bool {
        self.done_reached()
            && self
                .steps
                .last()
                .map(|s| s.group_status.iter().all(|status| status.done))
                .unwrap_or(false)
    }

    /// Flattens the segment into training columns.
    pub fn to_agent_buffer(&self) -> AgentBuffer {
        let mut buffer = AgentBuffer::new();
        for (index, exp) in self.steps.iter().enumerate() {
            let next_obs = match self.steps.get(index + 1) {
                Some(next) => &next.obs,
                None => &self.next_obs,
            };
            for (i, obs) in exp.obs.iter().enumerate() {
                buffer.field_mut(BufferKey::Obs(i)).push(obs.clone());
            }
            for (i, obs) in next_obs.iter().enumerate() {
                buffer.field_mut(BufferKey::NextObs(i)).push(obs.clone());
            }

            let mut group_continuous = Vec::new();
            let mut group_discrete = Vec::new();
            let mut group_dones = Vec::new();
            for status in &exp.group_status {
                group_continuous.extend_from_slice(&status.action.continuous);
                group_discrete.extend(status.action.discrete.iter().map(|&a| a as f32));
                group_dones.push(if status.done { 1.0 } else { 0.0 });
            }
            buffer.field_mut(BufferKey::GroupContinuousAction).push(group_continuous);
            buffer.field_mut(BufferKey::GroupDiscreteAction).push(group_discrete);
            buffer.field_mut(BufferKey::GroupDones).push(group_dones);
            buffer.field_mut(BufferKey::GroupReward).push_scalar(exp.group_reward);

            if let Some(memory) = &exp.memory {
                buffer.field_mut(BufferKey::Memory).push(memory.clone());
            }
            buffer.field_mut(BufferKey::Masks).push_scalar(1.0);
            buffer
                .field_mut(BufferKey::Done)
                .push_scalar(if exp.done { 1.0 } else { 0.0 });

            buffer
                .field_mut(BufferKey::ContinuousAction)
                .push(exp.action.continuous.clone());
            buffer
                .field_mut(BufferKey::DiscreteAction)
                .push(exp.action.discrete.iter().map(|&a| a as f32).collect());
            buffer
                .field_mut(BufferKey::ContinuousLogProbs)
                .push(exp.action_probs.continuous.clone());
            buffer
                .field_mut(BufferKey::DiscreteLogProbs)
                .push(exp.action_probs.discrete.clone());

            // In the buffer 1 means the action is available.
            let mask = match &exp.action_mask {
                Some(mask) => mask.iter().map(|&m| if m { 0.0 } else { 1.0 }).collect(),
                None => vec![1.0; exp.action.discrete.len()],
            };
            buffer.field_mut(BufferKey::ActionMask).push(mask);

            buffer
                .field_mut(BufferKey::PrevAction)
                .push(exp.prev_action.iter().map(|&a| a as f32).collect());
            buffer
                .field_mut(BufferKey::EnvironmentRewards)
                .push_scalar(exp.reward);
        }
        buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trainers::behavior_id_utils::get_global_agent_id;

    fn experience(value: f32, done: bool) -> AgentExperience {
        AgentExperience {
            obs: vec![vec![value, value], vec![value]],
            reward: value,
            done,
            action: ActionTuple {
                continuous: vec![0.1, 0.2],
                discrete: vec![1],
            },
            action_probs: LogProbsTuple {
                continuous: vec![-0.5, -0.5],
                discrete: vec![-0.1],
            },
            action_mask: Some(vec![false, true]),
            prev_action: vec![0],
            interrupted: false,
            memory: None,
            group_status: vec![AgentStatus {
                agent_id: get_global_agent_id(0, 9),
                obs: vec![],
                reward: 0.0,
                action: ActionTuple {
                    continuous: vec![0.3],
                    discrete: vec![2],
                },
                done,
            }],
            group_reward: 0.5,
        }
    }

    fn trajectory(length: usize, done: bool) -> Trajectory {
        let steps = (0..length)
            .map(|i| experience(i as f32, done && i + 1 == length))
            .collect();
        Trajectory {
            steps,
            next_obs: vec![vec![99.0, 99.0], vec![99.0]],
            next_group_obs: vec![],
            agent_id: get_global_agent_id(0, 1),
            behavior_id: "Walker?team=0".to_string(),
        }
    }

    #[test]
    fn test_to_agent_buffer_shifts_next_obs() {
        let buffer = trajectory(3, true).to_agent_buffer();
        assert_eq!(buffer.num_experiences(), 3);
        let next = buffer.get(BufferKey::NextObs(0)).unwrap().as_slice();
        assert_eq!(next[0], vec![1.0, 1.0]);
        assert_eq!(next[2], vec![99.0, 99.0]);
        let dones = buffer.get(BufferKey::Done).unwrap().scalars();
        assert_eq!(dones, vec![0.0, 0.0, 1.0]);
        let mask = buffer.get(BufferKey::ActionMask).unwrap().as_slice();
        assert_eq!(mask[0], vec![1.0, 0.0]);
        let group = buffer.get(BufferKey::GroupDiscreteAction).unwrap().as_slice();
        assert_eq!(group[1], vec![2.0]);
        assert!(!buffer.contains_key(BufferKey::Memory));
    }

    #[test]
    fn test_done_helpers() {
        let finished = trajectory(2, true);
        assert!(finished.done_reached());
        assert!(finished.all_group_dones_reached());
        assert!(!finished.interrupted());

        let ongoing = trajectory(2, false);
        assert!(!ongoing.done_reached());
        assert!(!ongoing.all_group_dones_reached());
    }
}
