// AgentProcessor - turns per-step environment results into trajectories
use std::collections::{HashMap, HashSet};
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use tracing::debug;

use crate::env::base_env::{AgentStep, DecisionSteps, TerminalSteps};
use crate::trainers::action_info::{ActionInfo, ActionOutputs};
use crate::trainers::behavior_id_utils::{get_global_agent_id, get_global_group_id, GlobalAgentId};
use crate::trainers::group_status::{GroupStatusTracker, PendingStep};
use crate::trainers::policy::Policy;
use crate::trainers::queue::AgentManagerQueue;
use crate::trainers::settings::TrainerSettings;
use crate::trainers::stats::{EnvironmentStats, StatsAggregationMethod, StatsSink};
use crate::trainers::trajectory::{AgentExperience, Trajectory};

/// Depth of the trajectory queue when a learner thread drains it concurrently.
pub const THREADED_TRAJECTORY_QUEUE_LEN: usize = 20;

/// Assembles trajectories for one behavior and publishes them to every
/// subscribed queue.
///
/// A single stepping thread owns the processor; `add_experiences` takes
/// `&mut self`, so concurrent mutation is ruled out at compile time. Only the
/// queue handles cross threads.
pub struct AgentProcessor {
    behavior_id: String,
    policy: Arc<dyn Policy>,
    stats_reporter: Arc<dyn StatsSink>,
    max_trajectory_length: usize,
    experience_buffers: HashMap<GlobalAgentId, Vec<AgentExperience>>,
    // Latest non-terminal step and its index in the decision batch.
    last_step_result: HashMap<GlobalAgentId, (AgentStep, usize)>,
    last_take_action_outputs: HashMap<GlobalAgentId, Arc<ActionOutputs>>,
    episode_steps: HashMap<GlobalAgentId, usize>,
    episode_rewards: HashMap<GlobalAgentId, f32>,
    group_tracker: GroupStatusTracker,
    trajectory_queues: Vec<AgentManagerQueue<Trajectory>>,
}

impl AgentProcessor {
    /// `max_trajectory_length` of `usize::MAX` only cuts trajectories at
    /// episode ends.
    pub fn new(
        policy: Arc<dyn Policy>,
        behavior_id: impl Into<String>,
        stats_reporter: Arc<dyn StatsSink>,
        max_trajectory_length: usize,
    ) -> Self {
        Self {
            behavior_id: behavior_id.into(),
            policy,
            stats_reporter,
            max_trajectory_length: max_trajectory_length.max(1),
            experience_buffers: HashMap::new(),
            last_step_result: HashMap::new(),
            last_take_action_outputs: HashMap::new(),
            episode_steps: HashMap::new(),
            episode_rewards: HashMap::new(),
            group_tracker: GroupStatusTracker::new(),
            trajectory_queues: Vec::new(),
        }
    }

    pub fn behavior_id(&self) -> &str {
        &self.behavior_id
    }

    pub fn policy(&self) -> &Arc<dyn Policy> {
        &self.policy
    }

    pub fn set_policy(&mut self, policy: Arc<dyn Policy>) {
        self.policy = policy;
    }

    pub fn max_trajectory_length(&self) -> usize {
        self.max_trajectory_length
    }

    /// Ingests one tick of results for this behavior.
    ///
    /// `previous_action` holds what the policy produced for the decision steps
    /// of the previous tick.
    pub fn add_experiences(
        &mut self,
        decision_steps: &DecisionSteps,
        terminal_steps: &TerminalSteps,
        worker_id: u32,
        previous_action: &ActionInfo,
    ) {
        if let Some(outputs) = &previous_action.outputs {
            for entropy in &outputs.entropy {
                self.stats_reporter
                    .add_stat("Policy/Entropy", *entropy, StatsAggregationMethod::Average);
            }
        }

        let action_global_agent_ids: Vec<GlobalAgentId> = previous_action
            .agent_ids
            .iter()
            .map(|id| get_global_agent_id(worker_id, *id))
            .collect();
        if let Some(outputs) = &previous_action.outputs {
            for global_id in &action_global_agent_ids {
                // Agents that just reset have nothing to attach the action to.
                if self.last_step_result.contains_key(global_id) {
                    self.last_take_action_outputs
                        .insert(*global_id, Arc::clone(outputs));
                }
            }
        }

        // Teammates' final statuses must be visible to every trajectory built
        // in this tick, so all records happen before any build pass.
        for terminal_step in terminal_steps.iter() {
            self.add_group_status_and_obs(terminal_step, worker_id);
        }
        for (index, terminal_step) in terminal_steps.iter().enumerate() {
            self.process_step(terminal_step, worker_id, index);
        }

        for ongoing_step in decision_steps.iter() {
            self.add_group_status_and_obs(ongoing_step, worker_id);
        }
        for (index, ongoing_step) in decision_steps.iter().enumerate() {
            self.process_step(ongoing_step, worker_id, index);
        }

        for terminal_step in terminal_steps.iter() {
            let global_id = get_global_agent_id(worker_id, terminal_step.agent_id);
            self.group_tracker.clear(&global_id);
        }

        if let Some(outputs) = &previous_action.outputs {
            for (row, global_id) in action_global_agent_ids.iter().enumerate() {
                if self.last_step_result.contains_key(global_id) {
                    self.policy
                        .save_previous_action(&[*global_id], &[outputs.action.row(row)]);
                }
            }
        }
    }

    fn add_group_status_and_obs(&mut self, step: &AgentStep, worker_id: u32) {
        let global_id = get_global_agent_id(worker_id, step.agent_id);
        let pending = match (
            self.last_step_result.get(&global_id),
            self.last_take_action_outputs.get(&global_id),
        ) {
            (Some((stored_step, index)), Some(outputs)) => Some(PendingStep {
                step: stored_step,
                index: *index,
                outputs: outputs.as_ref(),
            }),
            _ => None,
        };
        self.group_tracker.record(step, worker_id, pending);
    }

    fn process_step(&mut self, step: &AgentStep, worker_id: u32, index: usize) {
        let terminated = step.is_terminal();
        let global_id = get_global_agent_id(worker_id, step.agent_id);
        let global_group_id = get_global_group_id(worker_id, step.group_id);

        // Terminal steps never become a future pending step.
        let stored = if terminated {
            self.last_step_result.remove(&global_id)
        } else {
            self.last_step_result.insert(global_id, (step.clone(), index))
        };
        let stored_outputs = self.last_take_action_outputs.get(&global_id).cloned();

        if let (Some((stored_step, stored_index)), Some(outputs)) = (stored, stored_outputs) {
            let memory = if self.policy.use_recurrent() {
                self.policy
                    .retrieve_previous_memories(&[global_id])
                    .into_iter()
                    .next()
            } else {
                None
            };
            let prev_action = self
                .policy
                .retrieve_previous_action(&[global_id])
                .into_iter()
                .next()
                .unwrap_or_default();
            let experience = AgentExperience {
                obs: stored_step.obs,
                reward: step.reward,
                done: terminated,
                action: outputs.action.row(stored_index),
                action_probs: outputs.log_probs.row(stored_index),
                action_mask: stored_step.action_mask,
                prev_action,
                interrupted: step.interrupted(),
                memory,
                group_status: self
                    .group_tracker
                    .snapshot_teammates(&global_group_id, &global_id),
                group_reward: step.group_reward,
            };

            let buffer = self.experience_buffers.entry(global_id).or_default();
            buffer.push(experience);
            *self.episode_rewards.entry(global_id).or_default() += step.reward;
            if !terminated {
                *self.episode_steps.entry(global_id).or_default() += 1;
            }

            if buffer.len() >= self.max_trajectory_length || terminated {
                let trajectory = Trajectory {
                    steps: std::mem::take(buffer),
                    next_obs: step.obs.clone(),
                    next_group_obs: self
                        .group_tracker
                        .snapshot_teammate_obs(&global_group_id, &global_id),
                    agent_id: global_id,
                    behavior_id: self.behavior_id.clone(),
                };
                self.publish_trajectory(trajectory);
            }

            if terminated {
                let episode_length = self.episode_steps.get(&global_id).copied().unwrap_or(0);
                self.stats_reporter.add_stat(
                    "Environment/Episode Length",
                    episode_length as f32,
                    StatsAggregationMethod::Average,
                );
            }
        }

        if terminated {
            self.clean_agent_data(&global_id);
        }
    }

    fn publish_trajectory(&self, trajectory: Trajectory) {
        debug!(
            behavior_id = %self.behavior_id,
            agent_id = %trajectory.agent_id,
            length = trajectory.len(),
            done = trajectory.done_reached(),
            "trajectory assembled"
        );
        for queue in &self.trajectory_queues {
            queue.put(trajectory.clone());
        }
    }

    fn clean_agent_data(&mut self, global_id: &GlobalAgentId) {
        self.experience_buffers.remove(global_id);
        self.last_take_action_outputs.remove(global_id);
        self.last_step_result.remove(global_id);
        self.episode_steps.remove(global_id);
        self.episode_rewards.remove(global_id);
        self.policy.remove_previous_action(&[*global_id]);
        self.policy.remove_memories(&[*global_id]);
    }

    /// Subscribes a queue. Subscribing the same queue twice delivers every
    /// trajectory twice.
    pub fn publish_trajectory_queue(&mut self, trajectory_queue: AgentManagerQueue<Trajectory>) {
        self.trajectory_queues.push(trajectory_queue);
    }

    /// Drops every in-flight agent without emitting trajectories or stats.
    pub fn end_episode(&mut self) {
        let tracked: HashSet<GlobalAgentId> = self
            .experience_buffers
            .keys()
            .chain(self.last_step_result.keys())
            .chain(self.last_take_action_outputs.keys())
            .copied()
            .collect();
        for global_id in tracked {
            self.clean_agent_data(&global_id);
            self.group_tracker.clear(&global_id);
        }
    }

    /// Whether any per-agent bookkeeping still exists for `global_id`.
    pub fn is_tracking(&self, global_id: &GlobalAgentId) -> bool {
        self.experience_buffers.contains_key(global_id)
            || self.last_step_result.contains_key(global_id)
            || self.last_take_action_outputs.contains_key(global_id)
            || self.episode_steps.contains_key(global_id)
            || self.episode_rewards.contains_key(global_id)
    }

    /// Experiences buffered for the agent and not yet emitted.
    pub fn buffered_len(&self, global_id: &GlobalAgentId) -> usize {
        self.experience_buffers
            .get(global_id)
            .map(Vec::len)
            .unwrap_or(0)
    }

    pub fn episode_reward(&self, global_id: &GlobalAgentId) -> Option<f32> {
        self.episode_rewards.get(global_id).copied()
    }

    pub fn group_tracker(&self) -> &GroupStatusTracker {
        &self.group_tracker
    }
}

/// An [`AgentProcessor`] bound to one trajectory queue and one policy queue.
pub struct AgentManager {
    processor: AgentProcessor,
    trajectory_queue: AgentManagerQueue<Trajectory>,
    policy_queue: AgentManagerQueue<Arc<dyn Policy>>,
}

impl AgentManager {
    pub fn new(
        policy: Arc<dyn Policy>,
        behavior_id: impl Into<String>,
        stats_reporter: Arc<dyn StatsSink>,
        max_trajectory_length: usize,
        threaded: bool,
    ) -> Self {
        let mut processor =
            AgentProcessor::new(policy, behavior_id, stats_reporter, max_trajectory_length);
        let trajectory_queue_len = if threaded {
            THREADED_TRAJECTORY_QUEUE_LEN
        } else {
            0
        };
        let trajectory_queue = AgentManagerQueue::new(processor.behavior_id(), trajectory_queue_len);
        // Unbounded so a slow stepping loop never blocks the trainer.
        let policy_queue = AgentManagerQueue::new(processor.behavior_id(), 0);
        processor.publish_trajectory_queue(trajectory_queue.clone());
        Self {
            processor,
            trajectory_queue,
            policy_queue,
        }
    }

    pub fn from_settings(
        policy: Arc<dyn Policy>,
        behavior_id: impl Into<String>,
        stats_reporter: Arc<dyn StatsSink>,
        settings: &TrainerSettings,
    ) -> Self {
        Self::new(
            policy,
            behavior_id,
            stats_reporter,
            settings.time_horizon,
            settings.threaded,
        )
    }

    /// Consumer handle for the trainer.
    pub fn trajectory_queue(&self) -> AgentManagerQueue<Trajectory> {
        self.trajectory_queue.clone()
    }

    /// Producer handle for the trainer.
    pub fn policy_queue(&self) -> AgentManagerQueue<Arc<dyn Policy>> {
        self.policy_queue.clone()
    }

    /// Forwards environment stats. Most-recent values are only taken from
    /// worker 0 so parallel workers don't overwrite each other.
    pub fn record_environment_stats(&self, env_stats: &EnvironmentStats, worker_id: u32) {
        for (stat_name, values) in env_stats {
            for (value, aggregation) in values {
                match aggregation {
                    StatsAggregationMethod::Average
                    | StatsAggregationMethod::Sum
                    | StatsAggregationMethod::Histogram => {
                        self.processor
                            .stats_reporter
                            .add_stat(stat_name, *value, *aggregation)
                    }
                    StatsAggregationMethod::MostRecent => {
                        if worker_id == 0 {
                            self.processor.stats_reporter.set_stat(stat_name, *value);
                        }
                    }
                }
            }
        }
    }
}

impl Deref for AgentManager {
    type Target = AgentProcessor;

    fn deref(&self) -> &AgentProcessor {
        &self.processor
    }
}

impl DerefMut for AgentManager {
    fn deref_mut(&mut self) -> &mut AgentProcessor {
        &mut self.processor
    }
}
