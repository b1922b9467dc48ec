// Environment-facing value types: behavior specs, actions and agent steps
pub mod base_env;

pub use base_env::{
    ActionBatch, ActionSpec, ActionTuple, AgentStep, BehaviorSpec, DecisionSteps, Observation,
    ObservationSpec, StepBatch, StepKind, TerminalSteps,
};
