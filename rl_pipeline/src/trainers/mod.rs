// Trainers module - experience collection and trajectory assembly

pub mod action_info;
pub mod agent_processor;
pub mod behavior_id_utils;
pub mod buffer;
pub mod demo_loader;
pub mod env_manager;
pub mod group_status;
pub mod policy;
pub mod queue;
pub mod settings;
pub mod stats;
pub mod trajectory;

pub use action_info::{ActionInfo, ActionOutputs, LogProbsBatch, LogProbsTuple};
pub use agent_processor::{AgentManager, AgentProcessor};
pub use behavior_id_utils::{BehaviorIdentifiers, GlobalAgentId, GlobalGroupId};
pub use buffer::{AgentBuffer, BufferKey};
pub use demo_loader::{demo_to_buffer, load_demonstration, write_demo};
pub use env_manager::{EnvManager, EnvironmentBackend, EnvironmentStep};
pub use policy::{AgentMemoryStore, Policy};
pub use queue::{AgentManagerQueue, QueueEmpty};
pub use settings::{RunOptions, TrainerSettings};
pub use stats::{StatsAggregationMethod, StatsReporter, StatsSink};
pub use trajectory::{AgentExperience, AgentStatus, Trajectory};
