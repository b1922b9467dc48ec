// Settings module - run configuration for the experience pipeline
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::Result;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunOptions {
    #[serde(default)]
    pub behaviors: HashMap<String, TrainerSettings>,
    #[serde(default)]
    pub env_settings: EnvironmentSettings,
    /// Used for any behavior missing from `behaviors`.
    #[serde(default)]
    pub default_settings: Option<TrainerSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentSettings {
    pub num_envs: usize,
    pub seed: i32,
    /// Values applied through `set_env_parameters` on reset.
    pub environment_parameters: HashMap<String, f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainerSettings {
    pub time_horizon: usize,
    pub threaded: bool,
    pub max_steps: u64,
    pub summary_freq: u64,
    pub network_settings: NetworkSettings,
    pub behavioral_cloning: Option<BehavioralCloningSettings>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkSettings {
    pub memory: Option<MemorySettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemorySettings {
    #[serde(default = "default_sequence_length")]
    pub sequence_length: usize,
    #[serde(default = "default_memory_size")]
    pub memory_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BehavioralCloningSettings {
    pub demo_path: PathBuf,
    #[serde(default)]
    pub steps: u64,
    #[serde(default = "default_strength")]
    pub strength: f32,
    #[serde(default)]
    pub samples_per_update: usize,
}

fn default_sequence_length() -> usize { 64 }
fn default_memory_size() -> usize { 128 }
fn default_strength() -> f32 { 1.0 }

impl Default for EnvironmentSettings {
    fn default() -> Self {
        Self {
            num_envs: 1,
            seed: -1,
            environment_parameters: HashMap::new(),
        }
    }
}

impl Default for TrainerSettings {
    fn default() -> Self {
        Self {
            time_horizon: 64,
            threaded: false,
            max_steps: 500_000,
            summary_freq: 50_000,
            network_settings: NetworkSettings::default(),
            behavioral_cloning: None,
        }
    }
}

impl Default for MemorySettings {
    fn default() -> Self {
        Self {
            sequence_length: default_sequence_length(),
            memory_size: default_memory_size(),
        }
    }
}

impl TrainerSettings {
    /// Training sequence length; 1 unless the network is recurrent.
    pub fn sequence_length(&self) -> usize {
        self.network_settings
            .memory
            .as_ref()
            .map(|m| m.sequence_length)
            .unwrap_or(1)
    }
}

impl RunOptions {
    pub fn from_yaml(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Settings for a behavior, falling back to `default_settings` and then
    /// to the built-in defaults.
    pub fn settings_for(&self, behavior_name: &str) -> TrainerSettings {
        self.behaviors
            .get(behavior_name)
            .or(self.default_settings.as_ref())
            .cloned()
            .unwrap_or_default()
    }

    pub fn as_dict(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }
}
