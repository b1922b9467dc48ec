// Demonstration loader - rebuilds a training buffer from a recorded .demo file
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use prost::Message;
use tracing::{debug, info};

use crate::communicator_objects::observation_proto::ObservationData;
use crate::communicator_objects::{
    AgentActionProto, AgentInfoActionPairProto, AgentInfoProto, BrainParametersProto,
    DemonstrationMetaProto, SpaceTypeProto,
};
use crate::env::base_env::{
    ActionSpec, AgentStep, BehaviorSpec, DecisionSteps, Observation, ObservationSpec, StepBatch,
    TerminalSteps,
};
use crate::error::{Result, TrainerError};
use crate::trainers::buffer::{AgentBuffer, BufferKey};
use crate::trainers::settings::TrainerSettings;
use crate::utils::timers::hierarchical_timer;

/// Byte offset of the brain parameters record; the metadata record is padded up to it.
pub const INITIAL_POS: usize = 33;
pub const SUPPORTED_DEMONSTRATION_VERSIONS: [i32; 2] = [0, 1];

const DEMO_EXTENSION: &str = "demo";

fn is_demo_file(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some(DEMO_EXTENSION)
}

/// Resolves `path` to the demonstration files it names. Directory listings
/// are sorted.
pub fn get_demo_files(path: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    let path = path.as_ref();
    if path.is_file() {
        if !is_demo_file(path) {
            return Err(TrainerError::NotADemoFile(path.to_path_buf()));
        }
        Ok(vec![path.to_path_buf()])
    } else if path.is_dir() {
        let mut paths = Vec::new();
        for entry in std::fs::read_dir(path)? {
            let entry_path = entry?.path();
            if entry_path.is_file() && is_demo_file(&entry_path) {
                paths.push(entry_path);
            }
        }
        if paths.is_empty() {
            return Err(TrainerError::NoDemoFiles(path.to_path_buf()));
        }
        paths.sort();
        Ok(paths)
    } else {
        Err(TrainerError::DemoPathNotFound(path.to_path_buf()))
    }
}

/// Reads the varint length prefix at `pos`; returns the record body and the
/// offset just past it.
fn read_delimited(data: &[u8], pos: usize) -> Result<(&[u8], usize)> {
    let mut cursor = &data[pos..];
    let remaining = cursor.len();
    let len = prost::encoding::decode_varint(&mut cursor)? as usize;
    let start = pos + (remaining - cursor.len());
    let available = data.len() - start;
    if len > available {
        return Err(TrainerError::TruncatedRecord {
            pos: start,
            len,
            available,
        });
    }
    Ok((&data[start..start + len], start + len))
}

/// Parses every demonstration file under `path`.
///
/// Returns the behavior spec built from the brain parameters and the first
/// agent info, the recorded pairs, and the number of steps the metadata
/// headers announced.
pub fn load_demonstration(
    path: impl AsRef<Path>,
) -> Result<(BehaviorSpec, Vec<AgentInfoActionPairProto>, usize)> {
    let _timer = hierarchical_timer("load_demonstration");
    let path = path.as_ref();
    let file_paths = get_demo_files(path)?;

    let mut behavior_spec: Option<BehaviorSpec> = None;
    let mut brain_param_proto: Option<BrainParametersProto> = None;
    let mut info_action_pairs = Vec::new();
    let mut total_expected = 0usize;

    for file_path in &file_paths {
        let data = {
            let _timer = hierarchical_timer("read_file");
            std::fs::read(file_path)?
        };
        let mut pos = 0;
        let mut records_decoded = 0usize;
        while pos < data.len() {
            let (record, next_pos) = read_delimited(&data, pos)?;
            match records_decoded {
                0 => {
                    let meta = DemonstrationMetaProto::decode(record)?;
                    if !SUPPORTED_DEMONSTRATION_VERSIONS.contains(&meta.api_version) {
                        return Err(TrainerError::UnsupportedDemoVersion(meta.api_version));
                    }
                    total_expected += meta.number_steps.max(0) as usize;
                    pos = INITIAL_POS;
                }
                1 => {
                    brain_param_proto = Some(BrainParametersProto::decode(record)?);
                    pos = next_pos;
                }
                _ => {
                    let pair = AgentInfoActionPairProto::decode(record)?;
                    if behavior_spec.is_none() {
                        if let (Some(brain), Some(agent_info)) =
                            (brain_param_proto.as_ref(), pair.agent_info.as_ref())
                        {
                            behavior_spec = Some(behavior_spec_from_proto(brain, agent_info));
                        }
                    }
                    info_action_pairs.push(pair);
                    if info_action_pairs.len() == total_expected {
                        break;
                    }
                    pos = next_pos;
                }
            }
            records_decoded += 1;
        }
        debug!(file = %file_path.display(), records = records_decoded, "read demonstration file");
    }

    let behavior_spec =
        behavior_spec.ok_or_else(|| TrainerError::MissingBehaviorSpec(path.to_path_buf()))?;
    info!(
        path = %path.display(),
        files = file_paths.len(),
        pairs = info_action_pairs.len(),
        expected = total_expected,
        "loaded demonstration"
    );
    Ok((behavior_spec, info_action_pairs, total_expected))
}

/// Builds a behavior spec from brain parameters, falling back to the
/// deprecated vector-action fields when no action spec was recorded.
pub fn behavior_spec_from_proto(
    brain_param_proto: &BrainParametersProto,
    agent_info: &AgentInfoProto,
) -> BehaviorSpec {
    let observation_specs = agent_info
        .observations
        .iter()
        .map(|obs| ObservationSpec::new(obs.name.clone(), to_sizes(&obs.shape)))
        .collect();

    let action_spec = match &brain_param_proto.action_spec {
        Some(spec) if spec.num_continuous_actions > 0 || spec.num_discrete_actions > 0 => {
            ActionSpec::new(
                spec.num_continuous_actions.max(0) as usize,
                to_sizes(&spec.discrete_branch_sizes),
            )
        }
        _ => {
            let sizes = to_sizes(&brain_param_proto.vector_action_size_deprecated);
            if brain_param_proto.vector_action_space_type_deprecated() == SpaceTypeProto::Continuous
            {
                ActionSpec::continuous(sizes.first().copied().unwrap_or(0))
            } else {
                ActionSpec::discrete(sizes)
            }
        }
    };

    BehaviorSpec {
        observation_specs,
        action_spec,
    }
}

fn to_sizes(dims: &[i32]) -> Vec<usize> {
    dims.iter().map(|&d| d.max(0) as usize).collect()
}

fn observation_from_proto(agent_info: &AgentInfoProto) -> Result<Observation> {
    agent_info
        .observations
        .iter()
        .enumerate()
        .map(|(index, obs)| match &obs.observation_data {
            Some(ObservationData::FloatData(floats)) => Ok(floats.data.clone()),
            Some(ObservationData::CompressedData(_)) => {
                Err(TrainerError::CompressedObservation(index))
            }
            None => Ok(Vec::new()),
        })
        .collect()
}

/// Converts one recorded agent info into a step. Done infos become terminal
/// steps, interrupted when the agent hit its step limit.
pub fn agent_step_from_proto(
    agent_info: &AgentInfoProto,
    behavior_spec: &BehaviorSpec,
) -> Result<AgentStep> {
    let obs = observation_from_proto(agent_info)?;
    let step = if agent_info.done {
        AgentStep::terminal(
            agent_info.id,
            obs,
            agent_info.reward,
            agent_info.max_step_reached,
        )
    } else {
        let step = AgentStep::decision(agent_info.id, obs, agent_info.reward);
        let mask_len: usize = behavior_spec.action_spec.discrete_branches.iter().sum();
        if behavior_spec.action_spec.is_discrete() && agent_info.action_mask.len() == mask_len {
            step.with_action_mask(agent_info.action_mask.clone())
        } else {
            step
        }
    };
    Ok(step.with_group(agent_info.group_id, agent_info.group_reward))
}

pub fn steps_from_proto(
    agent_infos: &[AgentInfoProto],
    behavior_spec: &BehaviorSpec,
) -> Result<(DecisionSteps, TerminalSteps)> {
    let mut decision_steps = StepBatch::empty();
    let mut terminal_steps = StepBatch::empty();
    for agent_info in agent_infos {
        let step = agent_step_from_proto(agent_info, behavior_spec)?;
        if step.is_terminal() {
            terminal_steps.push(step);
        } else {
            decision_steps.push(step);
        }
    }
    Ok((decision_steps, terminal_steps))
}

/// Lays recorded pairs out as training columns, resequenced into
/// `sequence_length` chunks at every episode boundary.
///
/// Each row pairs the current observation and action with the reward and
/// done flag of the following record, so the last pair only serves as context.
pub fn make_demo_buffer(
    pair_infos: &[AgentInfoActionPairProto],
    behavior_spec: &BehaviorSpec,
    sequence_length: usize,
) -> Result<AgentBuffer> {
    let _timer = hierarchical_timer("make_demo_buffer");
    let default_info = AgentInfoProto::default();
    let default_action = AgentActionProto::default();
    let mut demo_raw_buffer = AgentBuffer::new();
    let mut demo_processed_buffer = AgentBuffer::new();

    for idx in 0..pair_infos.len().saturating_sub(1) {
        let current_pair_info = &pair_infos[idx];
        let next_pair_info = &pair_infos[idx + 1];
        let current_info = current_pair_info.agent_info.as_ref().unwrap_or(&default_info);
        let next_info = next_pair_info.agent_info.as_ref().unwrap_or(&default_info);
        let current_action = current_pair_info
            .action_info
            .as_ref()
            .unwrap_or(&default_action);

        let (current_decisions, current_terminals) =
            steps_from_proto(std::slice::from_ref(current_info), behavior_spec)?;
        let (next_decisions, next_terminals) =
            steps_from_proto(std::slice::from_ref(next_info), behavior_spec)?;
        let current_obs = current_terminals
            .iter()
            .chain(current_decisions.iter())
            .next()
            .map(|step| step.obs.clone())
            .unwrap_or_default();
        let next_reward = next_terminals
            .iter()
            .chain(next_decisions.iter())
            .next()
            .map(|step| step.reward)
            .unwrap_or(0.0);

        let previous_action = if idx == 0 {
            vec![0.0; current_action.vector_actions_deprecated.len()]
        } else {
            pair_infos[idx - 1]
                .action_info
                .as_ref()
                .map(|a| a.vector_actions_deprecated.clone())
                .unwrap_or_default()
        };
        let next_done = next_terminals.len() == 1;

        demo_raw_buffer
            .field_mut(BufferKey::Done)
            .push_scalar(if next_done { 1.0 } else { 0.0 });
        demo_raw_buffer
            .field_mut(BufferKey::EnvironmentRewards)
            .push_scalar(next_reward);
        for (i, obs) in current_obs.into_iter().enumerate() {
            demo_raw_buffer.field_mut(BufferKey::Obs(i)).push(obs);
        }

        let action_spec = &behavior_spec.action_spec;
        if current_action.continuous_actions.is_empty() && current_action.discrete_actions.is_empty()
        {
            let key = if action_spec.continuous_size > 0 {
                BufferKey::ContinuousAction
            } else {
                BufferKey::DiscreteAction
            };
            demo_raw_buffer
                .field_mut(key)
                .push(current_action.vector_actions_deprecated.clone());
        } else {
            if action_spec.continuous_size > 0 {
                demo_raw_buffer
                    .field_mut(BufferKey::ContinuousAction)
                    .push(current_action.continuous_actions.clone());
            }
            if action_spec.discrete_size() > 0 {
                demo_raw_buffer.field_mut(BufferKey::DiscreteAction).push(
                    current_action
                        .discrete_actions
                        .iter()
                        .map(|&a| a as f32)
                        .collect(),
                );
            }
        }
        demo_raw_buffer
            .field_mut(BufferKey::PrevAction)
            .push(previous_action);

        if next_done {
            demo_raw_buffer.resequence_and_append(&mut demo_processed_buffer, sequence_length)?;
            demo_raw_buffer.reset_agent();
        }
    }
    demo_raw_buffer.resequence_and_append(&mut demo_processed_buffer, sequence_length)?;
    Ok(demo_processed_buffer)
}

fn check_behavior_spec(demo: &BehaviorSpec, expected: &BehaviorSpec) -> Result<()> {
    if demo.action_spec != expected.action_spec {
        return Err(TrainerError::ActionSpecMismatch {
            demo: demo.action_spec.clone(),
            policy: expected.action_spec.clone(),
        });
    }
    if demo.observation_specs.len() != expected.observation_specs.len() {
        return Err(TrainerError::ObservationCountMismatch {
            demo: demo.observation_specs.len(),
            policy: expected.observation_specs.len(),
        });
    }
    for (index, (demo_obs, policy_obs)) in demo
        .observation_specs
        .iter()
        .zip(&expected.observation_specs)
        .enumerate()
    {
        if demo_obs.shape != policy_obs.shape {
            return Err(TrainerError::ObservationShapeMismatch {
                index,
                demo: demo_obs.shape.clone(),
                policy: policy_obs.shape.clone(),
            });
        }
    }
    Ok(())
}

/// Loads a demonstration and builds its training buffer, rejecting it when
/// it was recorded with a different action or observation layout than
/// `expected_behavior_spec`.
pub fn demo_to_buffer(
    file_path: impl AsRef<Path>,
    sequence_length: usize,
    expected_behavior_spec: Option<&BehaviorSpec>,
) -> Result<(BehaviorSpec, AgentBuffer)> {
    let _timer = hierarchical_timer("demo_to_buffer");
    let (behavior_spec, info_action_pairs, _) = load_demonstration(file_path)?;
    if let Some(expected) = expected_behavior_spec {
        check_behavior_spec(&behavior_spec, expected)?;
    }
    let demo_buffer = make_demo_buffer(&info_action_pairs, &behavior_spec, sequence_length)?;
    Ok((behavior_spec, demo_buffer))
}

/// Loads the demonstrations named by a behavior's cloning settings, sequenced
/// for its network. `None` when the behavior has no behavioral cloning.
pub fn demo_buffer_for_settings(
    settings: &TrainerSettings,
    expected_behavior_spec: Option<&BehaviorSpec>,
) -> Result<Option<(BehaviorSpec, AgentBuffer)>> {
    let Some(cloning) = &settings.behavioral_cloning else {
        return Ok(None);
    };
    let loaded = demo_to_buffer(
        &cloning.demo_path,
        settings.sequence_length(),
        expected_behavior_spec,
    )?;
    Ok(Some(loaded))
}

/// Writes `message` prefixed with its varint length.
pub fn write_delimited<W: Write, M: Message>(writer: &mut W, message: &M) -> Result<()> {
    writer.write_all(&message.encode_length_delimited_to_vec())?;
    Ok(())
}

/// Writes a demonstration file: metadata in the first [`INITIAL_POS`] bytes,
/// then the brain parameters, then one record per pair.
pub fn write_demo(
    demo_path: impl AsRef<Path>,
    meta_data_proto: &DemonstrationMetaProto,
    brain_param_proto: &BrainParametersProto,
    agent_info_protos: &[AgentInfoActionPairProto],
) -> Result<()> {
    let mut header = meta_data_proto.encode_length_delimited_to_vec();
    if header.len() > INITIAL_POS {
        return Err(TrainerError::MetadataTooLarge(header.len()));
    }
    header.resize(INITIAL_POS, 0);

    let mut writer = BufWriter::new(File::create(demo_path)?);
    writer.write_all(&header)?;
    write_delimited(&mut writer, brain_param_proto)?;
    for agent in agent_info_protos {
        write_delimited(&mut writer, agent)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::communicator_objects::{ActionSpecProto, ObservationProto};

    fn agent_info(value: f32, done: bool) -> AgentInfoProto {
        AgentInfoProto {
            reward: value,
            done,
            observations: vec![ObservationProto::from_floats("vector", vec![2], vec![value, value])],
            ..Default::default()
        }
    }

    fn pair(value: f32, done: bool) -> AgentInfoActionPairProto {
        AgentInfoActionPairProto {
            agent_info: Some(agent_info(value, done)),
            action_info: Some(AgentActionProto {
                continuous_actions: vec![value],
                vector_actions_deprecated: vec![value],
                ..Default::default()
            }),
        }
    }

    #[test]
    fn test_behavior_spec_from_deprecated_fields() {
        let brain = BrainParametersProto {
            vector_action_size_deprecated: vec![3, 2],
            vector_action_space_type_deprecated: SpaceTypeProto::Discrete as i32,
            ..Default::default()
        };
        let spec = behavior_spec_from_proto(&brain, &agent_info(0.0, false));
        assert_eq!(spec.action_spec, ActionSpec::discrete(vec![3, 2]));
        assert_eq!(spec.observation_specs, vec![ObservationSpec::new("vector", vec![2])]);

        let brain = BrainParametersProto {
            vector_action_size_deprecated: vec![4],
            vector_action_space_type_deprecated: SpaceTypeProto::Continuous as i32,
            ..Default::default()
        };
        let spec = behavior_spec_from_proto(&brain, &agent_info(0.0, false));
        assert_eq!(spec.action_spec, ActionSpec::continuous(4));
    }

    #[test]
    fn test_behavior_spec_prefers_action_spec() {
        let brain = BrainParametersProto {
            vector_action_size_deprecated: vec![7],
            action_spec: Some(ActionSpecProto {
                num_continuous_actions: 2,
                num_discrete_actions: 1,
                discrete_branch_sizes: vec![3],
                ..Default::default()
            }),
            ..Default::default()
        };
        let spec = behavior_spec_from_proto(&brain, &agent_info(0.0, false));
        assert_eq!(spec.action_spec, ActionSpec::new(2, vec![3]));
    }

    #[test]
    fn test_compressed_observation_is_rejected() {
        let mut info = agent_info(0.0, false);
        info.observations[0].observation_data =
            Some(ObservationData::CompressedData(vec![0x89, 0x50]));
        let spec = BehaviorSpec {
            observation_specs: vec![ObservationSpec::new("vector", vec![2])],
            action_spec: ActionSpec::continuous(1),
        };
        assert!(matches!(
            agent_step_from_proto(&info, &spec),
            Err(TrainerError::CompressedObservation(0))
        ));
    }

    #[test]
    fn test_make_demo_buffer_resequences_episodes() {
        let spec = BehaviorSpec {
            observation_specs: vec![ObservationSpec::new("vector", vec![2])],
            action_spec: ActionSpec::continuous(1),
        };
        // Episode of three rows padded to four, then a trailing partial episode
        // of two rows.
        let pairs = vec![
            pair(0.0, false),
            pair(1.0, false),
            pair(2.0, false),
            pair(3.0, true),
            pair(4.0, false),
            pair(5.0, false),
        ];
        let buffer = make_demo_buffer(&pairs, &spec, 2).unwrap();
        let dones = buffer.get(BufferKey::Done).unwrap().scalars();
        assert_eq!(dones, vec![0.0, 0.0, 1.0, 0.0, 0.0, 0.0]);
        let rewards = buffer.get(BufferKey::EnvironmentRewards).unwrap().scalars();
        assert_eq!(rewards, vec![1.0, 2.0, 3.0, 0.0, 4.0, 5.0]);
        let prev = buffer.get(BufferKey::PrevAction).unwrap().as_slice();
        assert_eq!(prev[0], vec![0.0]);
        assert_eq!(prev[2], vec![1.0]);
        assert_eq!(prev[3], vec![0.0]);
        assert_eq!(prev[4], vec![2.0]);
        assert!(!buffer.contains_key(BufferKey::DiscreteAction));
    }

    #[test]
    fn test_steps_from_proto_splits_and_checks_masks() {
        let spec = BehaviorSpec {
            observation_specs: vec![ObservationSpec::new("vector", vec![2])],
            action_spec: ActionSpec::discrete(vec![2, 3]),
        };
        let mut masked = agent_info(1.0, false);
        masked.id = 1;
        masked.action_mask = vec![false, true, false, false, true];
        let mut short_mask = agent_info(2.0, false);
        short_mask.id = 2;
        short_mask.action_mask = vec![true, false];
        let mut finished = agent_info(3.0, true);
        finished.id = 3;
        finished.max_step_reached = true;

        let (decisions, terminals) =
            steps_from_proto(&[masked, short_mask, finished], &spec).unwrap();
        assert_eq!(decisions.agent_ids(), vec![1, 2]);
        assert_eq!(terminals.agent_ids(), vec![3]);
        assert_eq!(
            decisions.get(1).unwrap().action_mask,
            Some(vec![false, true, false, false, true])
        );
        assert_eq!(decisions.get(2).unwrap().action_mask, None);
        let terminal = terminals.get(3).unwrap();
        assert_eq!(terminal.reward, 3.0);
        assert!(terminal.interrupted());
    }

    #[test]
    fn test_read_delimited_rejects_truncated_record() {
        let data = [5u8, 1, 2];
        assert!(matches!(
            read_delimited(&data, 0),
            Err(TrainerError::TruncatedRecord { pos: 1, len: 5, available: 2 })
        ));
    }
}
