// Base environment types shared by the processor, the env manager and the demo loader
use std::collections::HashMap;

/// One flattened array per observation spec, in spec order.
pub type Observation = Vec<Vec<f32>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservationSpec {
    pub name: String,
    pub shape: Vec<usize>,
}

impl ObservationSpec {
    pub fn new(name: impl Into<String>, shape: Vec<usize>) -> Self {
        Self {
            name: name.into(),
            shape,
        }
    }

    /// Number of floats in one flattened observation of this spec.
    pub fn flat_size(&self) -> usize {
        self.shape.iter().product()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionSpec {
    pub continuous_size: usize,
    pub discrete_branches: Vec<usize>,
}

impl ActionSpec {
    pub fn new(continuous_size: usize, discrete_branches: Vec<usize>) -> Self {
        Self {
            continuous_size,
            discrete_branches,
        }
    }

    pub fn continuous(size: usize) -> Self {
        Self::new(size, Vec::new())
    }

    pub fn discrete(branches: Vec<usize>) -> Self {
        Self::new(0, branches)
    }

    pub fn discrete_size(&self) -> usize {
        self.discrete_branches.len()
    }

    pub fn is_continuous(&self) -> bool {
        self.continuous_size > 0
    }

    pub fn is_discrete(&self) -> bool {
        !self.discrete_branches.is_empty()
    }

    /// A zero-filled action for `n_agents` agents.
    pub fn empty_action(&self, n_agents: usize) -> ActionBatch {
        ActionBatch {
            continuous: vec![vec![0.0; self.continuous_size]; n_agents],
            discrete: vec![vec![0; self.discrete_size()]; n_agents],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BehaviorSpec {
    pub observation_specs: Vec<ObservationSpec>,
    pub action_spec: ActionSpec,
}

/// The action one agent took on one step. Either half may be empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActionTuple {
    pub continuous: Vec<f32>,
    pub discrete: Vec<i32>,
}

/// Actions for a batch of agents; row `i` belongs to the agent at index `i`
/// of the decision batch the policy was evaluated on.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActionBatch {
    pub continuous: Vec<Vec<f32>>,
    pub discrete: Vec<Vec<i32>>,
}

impl ActionBatch {
    pub fn len(&self) -> usize {
        self.continuous.len().max(self.discrete.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Extracts one agent's action. A half with no rows yields an empty vector.
    pub fn row(&self, index: usize) -> ActionTuple {
        ActionTuple {
            continuous: self.continuous.get(index).cloned().unwrap_or_default(),
            discrete: self.discrete.get(index).cloned().unwrap_or_default(),
        }
    }
}

/// Discriminates ongoing steps from episode-ending ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    Decision,
    /// `interrupted` is set when the episode was cut by a step limit rather
    /// than by the agent reaching a terminal state.
    Terminal { interrupted: bool },
}

#[derive(Debug, Clone, PartialEq)]
pub struct AgentStep {
    pub agent_id: i32,
    pub obs: Observation,
    pub reward: f32,
    pub group_id: i32,
    pub group_reward: f32,
    pub action_mask: Option<Vec<bool>>,
    pub kind: StepKind,
}

impl AgentStep {
    pub fn decision(agent_id: i32, obs: Observation, reward: f32) -> Self {
        Self {
            agent_id,
            obs,
            reward,
            group_id: 0,
            group_reward: 0.0,
            action_mask: None,
            kind: StepKind::Decision,
        }
    }

    pub fn terminal(agent_id: i32, obs: Observation, reward: f32, interrupted: bool) -> Self {
        Self {
            kind: StepKind::Terminal { interrupted },
            ..Self::decision(agent_id, obs, reward)
        }
    }

    pub fn with_group(mut self, group_id: i32, group_reward: f32) -> Self {
        self.group_id = group_id;
        self.group_reward = group_reward;
        self
    }

    pub fn with_action_mask(mut self, mask: Vec<bool>) -> Self {
        self.action_mask = Some(mask);
        self
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.kind, StepKind::Terminal { .. })
    }

    pub fn interrupted(&self) -> bool {
        matches!(self.kind, StepKind::Terminal { interrupted: true })
    }
}

/// The steps one behavior produced in one environment tick, with an index
/// lookup by local agent id.
#[derive(Debug, Clone, Default)]
pub struct StepBatch {
    steps: Vec<AgentStep>,
    agent_id_to_index: HashMap<i32, usize>,
}

/// Agents that still need an action.
pub type DecisionSteps = StepBatch;
/// Agents whose episode ended this tick.
pub type TerminalSteps = StepBatch;

impl StepBatch {
    pub fn new(steps: Vec<AgentStep>) -> Self {
        let agent_id_to_index = steps
            .iter()
            .enumerate()
            .map(|(index, step)| (step.agent_id, index))
            .collect();
        Self {
            steps,
            agent_id_to_index,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn push(&mut self, step: AgentStep) {
        self.agent_id_to_index.insert(step.agent_id, self.steps.len());
        self.steps.push(step);
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AgentStep> {
        self.steps.iter()
    }

    pub fn agent_ids(&self) -> Vec<i32> {
        self.steps.iter().map(|s| s.agent_id).collect()
    }

    pub fn index_of(&self, agent_id: i32) -> Option<usize> {
        self.agent_id_to_index.get(&agent_id).copied()
    }

    pub fn get(&self, agent_id: i32) -> Option<&AgentStep> {
        self.index_of(agent_id).map(|i| &self.steps[i])
    }
}

impl FromIterator<AgentStep> for StepBatch {
    fn from_iter<I: IntoIterator<Item = AgentStep>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
