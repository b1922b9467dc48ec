// Multi-agent RL experience pipeline
//
// Collects per-agent steps from simulation workers, assembles trajectories
// and hands them to trainers through queues.

pub mod communicator_objects;
pub mod env;
pub mod error;
pub mod trainers;
pub mod utils;

pub use error::{Result, TrainerError};
pub use trainers::{
    AgentManager,
    AgentManagerQueue,
    EnvManager,
    EnvironmentBackend,
    Policy,
    RunOptions,
    Trajectory,
};
