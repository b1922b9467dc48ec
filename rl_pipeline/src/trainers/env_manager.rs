// Environment manager - steps simulation backends and routes results to agent managers
use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::env::base_env::{BehaviorSpec, DecisionSteps, TerminalSteps};
use crate::error::Result;
use crate::trainers::action_info::ActionInfo;
use crate::trainers::agent_processor::AgentManager;
use crate::trainers::policy::Policy;
use crate::trainers::settings::TrainerSettings;
use crate::trainers::stats::EnvironmentStats;

/// Environment parameter overrides sent on reset.
pub type EnvironmentConfig = HashMap<String, f32>;

pub type AllStepResult = HashMap<String, (DecisionSteps, TerminalSteps)>;

/// Everything one worker produced in one tick.
#[derive(Debug, Clone, Default)]
pub struct EnvironmentStep {
    pub current_all_step_result: AllStepResult,
    pub worker_id: u32,
    /// Actions the policies chose for the steps of the previous tick.
    pub brain_name_to_action_info: HashMap<String, ActionInfo>,
    pub environment_stats: EnvironmentStats,
}

impl EnvironmentStep {
    pub fn empty(worker_id: u32) -> Self {
        Self {
            worker_id,
            ..Self::default()
        }
    }

    pub fn name_behavior_ids(&self) -> impl Iterator<Item = &String> {
        self.current_all_step_result.keys()
    }
}

/// Backend-specific stepping and reset primitives.
pub trait EnvironmentBackend {
    /// Advances every worker with actions from `policies`.
    fn step(&mut self, policies: &HashMap<String, Arc<dyn Policy>>) -> Result<Vec<EnvironmentStep>>;

    fn reset_env(&mut self, config: Option<&EnvironmentConfig>) -> Result<Vec<EnvironmentStep>>;

    fn set_env_parameters(&mut self, config: Option<&EnvironmentConfig>) -> Result<()>;

    fn training_behaviors(&self) -> HashMap<String, BehaviorSpec>;

    /// Called once a trainer for `behavior_name` starts.
    fn on_training_started(&mut self, _behavior_name: &str, _settings: &TrainerSettings) {}

    fn close(&mut self) -> Result<()>;
}

pub struct EnvManager<B: EnvironmentBackend> {
    backend: B,
    policies: HashMap<String, Arc<dyn Policy>>,
    agent_managers: HashMap<String, AgentManager>,
    first_step_infos: Vec<EnvironmentStep>,
}

impl<B: EnvironmentBackend> EnvManager<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            policies: HashMap::new(),
            agent_managers: HashMap::new(),
            first_step_infos: Vec::new(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn set_policy(&mut self, brain_name: &str, policy: Arc<dyn Policy>) {
        if let Some(manager) = self.agent_managers.get_mut(brain_name) {
            manager.set_policy(Arc::clone(&policy));
        }
        self.policies.insert(brain_name.to_string(), policy);
    }

    pub fn policy(&self, brain_name: &str) -> Option<&Arc<dyn Policy>> {
        self.policies.get(brain_name)
    }

    pub fn set_agent_manager(&mut self, brain_name: &str, manager: AgentManager) {
        self.agent_managers.insert(brain_name.to_string(), manager);
    }

    pub fn agent_manager(&self, brain_name: &str) -> Option<&AgentManager> {
        self.agent_managers.get(brain_name)
    }

    /// Discards in-flight trajectories and resets the backend. The returned
    /// steps are processed on the next [`EnvManager::get_steps`], once agent
    /// managers for new behaviors can exist.
    pub fn reset(&mut self, config: Option<&EnvironmentConfig>) -> Result<usize> {
        for manager in self.agent_managers.values_mut() {
            manager.end_episode();
        }
        self.first_step_infos = self.backend.reset_env(config)?;
        Ok(self.first_step_infos.len())
    }

    pub fn set_env_parameters(&mut self, config: Option<&EnvironmentConfig>) -> Result<()> {
        self.backend.set_env_parameters(config)
    }

    pub fn on_training_started(&mut self, behavior_name: &str, settings: &TrainerSettings) {
        self.backend.on_training_started(behavior_name, settings);
    }

    pub fn training_behaviors(&self) -> HashMap<String, BehaviorSpec> {
        self.backend.training_behaviors()
    }

    pub fn close(&mut self) -> Result<()> {
        self.backend.close()
    }

    /// Swaps in the newest queued policies and steps the backend. Pass the
    /// result to [`EnvManager::process_steps`].
    pub fn get_steps(&mut self) -> Result<Vec<EnvironmentStep>> {
        if !self.first_step_infos.is_empty() {
            let first_step_infos = std::mem::take(&mut self.first_step_infos);
            self.process_step_infos(&first_step_infos);
        }

        let mut newest_policies = Vec::new();
        for (brain_name, manager) in &self.agent_managers {
            let policy_queue = manager.policy_queue();
            let mut newest = None;
            // Older policies still queued are stale; only the last one counts.
            while let Ok(policy) = policy_queue.get_nowait() {
                newest = Some(policy);
            }
            if let Some(policy) = newest {
                newest_policies.push((brain_name.clone(), policy));
            }
        }
        for (brain_name, policy) in newest_policies {
            debug!(behavior = %brain_name, "swapping in updated policy");
            self.set_policy(&brain_name, policy);
        }

        self.backend.step(&self.policies)
    }

    pub fn process_steps(&mut self, new_step_infos: &[EnvironmentStep]) -> usize {
        self.process_step_infos(new_step_infos)
    }

    fn process_step_infos(&mut self, step_infos: &[EnvironmentStep]) -> usize {
        for step_info in step_infos {
            for (name_behavior_id, (decision_steps, terminal_steps)) in
                &step_info.current_all_step_result
            {
                let Some(manager) = self.agent_managers.get_mut(name_behavior_id) else {
                    warn!(
                        behavior = %name_behavior_id,
                        "agent manager was not created for behavior id"
                    );
                    continue;
                };
                let empty = ActionInfo::empty();
                let action_info = step_info
                    .brain_name_to_action_info
                    .get(name_behavior_id)
                    .unwrap_or(&empty);
                manager.add_experiences(
                    decision_steps,
                    terminal_steps,
                    step_info.worker_id,
                    action_info,
                );
                manager.record_environment_stats(&step_info.environment_stats, step_info.worker_id);
            }
        }
        step_infos.len()
    }
}
