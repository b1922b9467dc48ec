// Stats - aggregated training and environment statistics
use std::collections::{BTreeMap, HashMap};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::Result;

/// How repeated values for one key are combined before writing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum StatsAggregationMethod {
    Average = 0,
    MostRecent = 1,
    Sum = 2,
    Histogram = 3,
}

/// Stats reported by an environment worker alongside a step.
pub type EnvironmentStats = HashMap<String, Vec<(f32, StatsAggregationMethod)>>;

/// Sink the agent processor reports into.
pub trait StatsSink: Send + Sync {
    fn add_stat(&self, key: &str, value: f32, aggregation: StatsAggregationMethod);

    /// Replaces every stored value for `key` with `value`.
    fn set_stat(&self, key: &str, value: f32);
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsSummary {
    pub mean: f32,
    pub std: f32,
    pub min: f32,
    pub max: f32,
    pub sum: f32,
    pub count: usize,
    pub aggregation: StatsAggregationMethod,
}

impl StatsSummary {
    pub fn from_values(values: &[f32], aggregation: StatsAggregationMethod) -> Self {
        if values.is_empty() {
            return Self {
                mean: 0.0,
                std: 0.0,
                min: 0.0,
                max: 0.0,
                sum: 0.0,
                count: 0,
                aggregation,
            };
        }
        let count = values.len();
        let sum: f32 = values.iter().sum();
        let mean = sum / count as f32;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / count as f32;
        Self {
            mean,
            std: variance.sqrt(),
            min: values.iter().copied().fold(f32::INFINITY, f32::min),
            max: values.iter().copied().fold(f32::NEG_INFINITY, f32::max),
            sum,
            count,
            aggregation,
        }
    }

    /// The single number a scalar writer should show.
    pub fn value(&self) -> f32 {
        match self.aggregation {
            StatsAggregationMethod::Sum => self.sum,
            _ => self.mean,
        }
    }
}

pub trait StatsWriter: Send {
    fn write_stats(
        &mut self,
        category: &str,
        values: &BTreeMap<String, StatsSummary>,
        step: u64,
    ) -> Result<()>;
}

#[derive(Default)]
struct ReporterState {
    values: HashMap<String, Vec<f32>>,
    aggregation: HashMap<String, StatsAggregationMethod>,
}

/// Per-category stats store. Shared as `Arc<StatsReporter>` between the
/// stepping thread and whoever writes the summaries.
pub struct StatsReporter {
    category: String,
    state: Mutex<ReporterState>,
    writers: Mutex<Vec<Box<dyn StatsWriter>>>,
}

impl StatsReporter {
    pub fn new(category: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            state: Mutex::new(ReporterState::default()),
            writers: Mutex::new(Vec::new()),
        }
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn add_writer(&self, writer: Box<dyn StatsWriter>) {
        self.writers.lock().push(writer);
    }

    pub fn get_stats(&self, key: &str) -> Option<Vec<f32>> {
        self.state.lock().values.get(key).cloned()
    }

    pub fn get_stats_summaries(&self) -> BTreeMap<String, StatsSummary> {
        let state = self.state.lock();
        state
            .values
            .iter()
            .filter(|(_, values)| !values.is_empty())
            .map(|(key, values)| {
                let aggregation = state
                    .aggregation
                    .get(key)
                    .copied()
                    .unwrap_or(StatsAggregationMethod::Average);
                (key.clone(), StatsSummary::from_values(values, aggregation))
            })
            .collect()
    }

    /// Summarizes, hands the summaries to every writer, then clears.
    pub fn write_stats(&self, step: u64) -> Result<()> {
        let summaries = self.get_stats_summaries();
        for writer in self.writers.lock().iter_mut() {
            writer.write_stats(&self.category, &summaries, step)?;
        }
        self.clear();
        Ok(())
    }

    pub fn clear(&self) {
        let mut state = self.state.lock();
        for values in state.values.values_mut() {
            values.clear();
        }
    }
}

impl StatsSink for StatsReporter {
    fn add_stat(&self, key: &str, value: f32, aggregation: StatsAggregationMethod) {
        let mut state = self.state.lock();
        state.values.entry(key.to_string()).or_default().push(value);
        state.aggregation.insert(key.to_string(), aggregation);
    }

    fn set_stat(&self, key: &str, value: f32) {
        let mut state = self.state.lock();
        state.values.insert(key.to_string(), vec![value]);
        state
            .aggregation
            .insert(key.to_string(), StatsAggregationMethod::MostRecent);
    }
}

/// Logs one line per category and step.
pub struct ConsoleWriter;

impl StatsWriter for ConsoleWriter {
    fn write_stats(
        &mut self,
        category: &str,
        values: &BTreeMap<String, StatsSummary>,
        step: u64,
    ) -> Result<()> {
        if let Some(reward) = values.get("Environment/Cumulative Reward") {
            info!(
                category,
                step,
                mean_reward = reward.mean,
                std_reward = reward.std,
                "training summary"
            );
        }
        for (key, summary) in values {
            info!(category, step, key = key.as_str(), value = summary.value(), "stat");
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct JsonLine<'a> {
    category: &'a str,
    step: u64,
    stats: &'a BTreeMap<String, StatsSummary>,
}

/// Appends one JSON object per write to a file.
pub struct JsonLinesWriter {
    path: PathBuf,
}

impl JsonLinesWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl StatsWriter for JsonLinesWriter {
    fn write_stats(
        &mut self,
        category: &str,
        values: &BTreeMap<String, StatsSummary>,
        step: u64,
    ) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let line = serde_json::to_string(&JsonLine {
            category,
            step,
            stats: values,
        })?;
        writeln!(file, "{}", line)?;
        Ok(())
    }
}
