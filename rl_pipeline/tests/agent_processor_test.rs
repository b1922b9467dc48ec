mod common;

use common::{action_info, batch, decision, grouped_decision, stats, MockPolicy};
use rl_pipeline::env::base_env::{AgentStep, StepBatch};
use rl_pipeline::trainers::action_info::ActionInfo;
use rl_pipeline::trainers::agent_processor::{AgentManager, AgentProcessor};
use rl_pipeline::trainers::behavior_id_utils::{get_global_agent_id, get_global_group_id};
use rl_pipeline::trainers::queue::AgentManagerQueue;
use rl_pipeline::trainers::trajectory::Trajectory;

fn drain(queue: &AgentManagerQueue<Trajectory>) -> Vec<Trajectory> {
    let mut trajectories = Vec::new();
    while let Ok(trajectory) = queue.get_nowait() {
        trajectories.push(trajectory);
    }
    trajectories
}

fn assert_no_self_reference(trajectories: &[Trajectory]) {
    for trajectory in trajectories {
        for step in &trajectory.steps {
            assert!(step
                .group_status
                .iter()
                .all(|status| status.agent_id != trajectory.agent_id));
        }
    }
}

#[test]
fn test_solo_episode_emits_one_trajectory() {
    let stats = stats();
    let mut manager = AgentManager::new(
        MockPolicy::new("p"),
        "Solo?team=0",
        stats.clone(),
        usize::MAX,
        false,
    );
    let queue = manager.trajectory_queue();
    let empty = StepBatch::empty();

    manager.add_experiences(&batch(vec![decision(0, 0.0)]), &empty, 0, &ActionInfo::empty());
    for i in 1..15 {
        manager.add_experiences(&batch(vec![decision(0, i as f32)]), &empty, 0, &action_info(&[0]));
    }
    let terminal = batch(vec![AgentStep::terminal(0, common::obs(15.0), 15.0, false)]);
    manager.add_experiences(&empty, &terminal, 0, &action_info(&[0]));

    let trajectories = drain(&queue);
    assert_eq!(trajectories.len(), 1);
    let trajectory = &trajectories[0];
    assert_eq!(trajectory.len(), 15);
    assert_eq!(trajectory.behavior_id, "Solo?team=0");
    assert_eq!(trajectory.agent_id, get_global_agent_id(0, 0));
    // The first observation is context only; each step pairs an observation
    // with the reward that followed it.
    assert_eq!(trajectory.steps[0].obs, common::obs(0.0));
    assert_eq!(trajectory.steps[0].reward, 1.0);
    assert!(trajectory.steps[..14].iter().all(|s| !s.done));
    assert!(trajectory.done_reached());
    assert!(!trajectory.interrupted());
    assert_eq!(trajectory.next_obs, common::obs(15.0));
    assert!(trajectory.next_group_obs.is_empty());
    assert!(trajectory.steps.iter().all(|s| s.group_status.is_empty()));

    assert_eq!(stats.get_stats("Environment/Episode Length"), Some(vec![14.0]));
    assert_eq!(stats.get_stats("Policy/Entropy").map(|v| v.len()), Some(15));
}

#[test]
fn test_teammate_sees_terminated_agent_once() {
    let mut processor = AgentProcessor::new(MockPolicy::new("p"), "Team?team=0", stats(), 1);
    let queue = AgentManagerQueue::new("Team?team=0", 0);
    processor.publish_trajectory_queue(queue.clone());
    let empty = StepBatch::empty();
    let a = get_global_agent_id(0, 0);
    let b = get_global_agent_id(0, 1);
    let group = get_global_group_id(0, 5);

    let both = |value: f32| batch(vec![grouped_decision(0, 5, value), grouped_decision(1, 5, value)]);
    processor.add_experiences(&both(0.0), &empty, 0, &ActionInfo::empty());
    processor.add_experiences(&both(1.0), &empty, 0, &action_info(&[0, 1]));
    let tick_two = drain(&queue);
    assert_eq!(tick_two.len(), 2);

    let a_terminal = batch(vec![AgentStep::terminal(0, common::obs(2.0), 2.0, false).with_group(5, 0.1)]);
    processor.add_experiences(&batch(vec![grouped_decision(1, 5, 2.0)]), &a_terminal, 0, &action_info(&[0, 1]));
    let tick_three = drain(&queue);
    assert_eq!(tick_three.len(), 2);
    let b_trajectory = tick_three.iter().find(|t| t.agent_id == b).unwrap();
    let statuses = &b_trajectory.steps[0].group_status;
    assert_eq!(statuses.len(), 1);
    assert_eq!(statuses[0].agent_id, a);
    assert!(statuses[0].done);
    assert_eq!(b_trajectory.next_group_obs, vec![common::obs(2.0)]);
    assert!(!processor.group_tracker().snapshot_teammates(&group, &b).iter().any(|s| s.agent_id == a));

    processor.add_experiences(&batch(vec![grouped_decision(1, 5, 3.0)]), &empty, 0, &action_info(&[1]));
    let tick_four = drain(&queue);
    assert_eq!(tick_four.len(), 1);
    assert!(tick_four[0].steps[0].group_status.is_empty());
    assert!(tick_four[0].next_group_obs.is_empty());

    for trajectories in [&tick_two, &tick_three, &tick_four] {
        assert_no_self_reference(trajectories);
    }
}

#[test]
fn test_time_horizon_splits_long_episode() {
    let mut processor = AgentProcessor::new(MockPolicy::new("p"), "Long", stats(), 10);
    let queue = AgentManagerQueue::new("Long", 0);
    processor.publish_trajectory_queue(queue.clone());
    let empty = StepBatch::empty();

    processor.add_experiences(&batch(vec![decision(0, 0.0)]), &empty, 0, &ActionInfo::empty());
    for i in 1..25 {
        processor.add_experiences(&batch(vec![decision(0, i as f32)]), &empty, 0, &action_info(&[0]));
    }

    let trajectories = drain(&queue);
    assert_eq!(trajectories.len(), 2);
    for trajectory in &trajectories {
        assert_eq!(trajectory.len(), 10);
        assert!(!trajectory.done_reached());
    }
    assert_eq!(trajectories[0].next_obs, common::obs(10.0));
    assert_eq!(trajectories[1].steps[0].obs, common::obs(10.0));
    assert_eq!(processor.buffered_len(&get_global_agent_id(0, 0)), 4);
}

#[test]
fn test_agent_respawning_in_terminal_tick_starts_fresh_episode() {
    let mut processor = AgentProcessor::new(MockPolicy::new("p"), "Respawn", stats(), usize::MAX);
    let queue = AgentManagerQueue::new("Respawn", 0);
    processor.publish_trajectory_queue(queue.clone());
    let empty = StepBatch::empty();
    let agent = get_global_agent_id(0, 0);

    processor.add_experiences(&batch(vec![grouped_decision(0, 5, 0.0)]), &empty, 0, &ActionInfo::empty());
    processor.add_experiences(&batch(vec![grouped_decision(0, 5, 1.0)]), &empty, 0, &action_info(&[0]));

    // The same id ends its episode and reappears in the decision batch.
    let terminal = batch(vec![AgentStep::terminal(0, common::obs(2.0), 2.0, false).with_group(5, 0.0)]);
    let respawn = batch(vec![grouped_decision(0, 5, 100.0)]);
    processor.add_experiences(&respawn, &terminal, 0, &action_info(&[0]));

    let finished = drain(&queue);
    assert_eq!(finished.len(), 1);
    assert_eq!(finished[0].len(), 2);
    assert!(finished[0].done_reached());
    assert_eq!(finished[0].next_obs, common::obs(2.0));
    assert!(finished[0].steps.iter().all(|s| s.obs != common::obs(100.0)));
    assert!(processor.is_tracking(&agent));
    assert_eq!(processor.buffered_len(&agent), 0);
    assert!(!processor.group_tracker().contains_agent(&agent));

    processor.add_experiences(&batch(vec![grouped_decision(0, 5, 101.0)]), &empty, 0, &action_info(&[0]));
    assert_eq!(processor.buffered_len(&agent), 1);
    assert!(queue.empty());

    let terminal = batch(vec![AgentStep::terminal(0, common::obs(102.0), 102.0, false).with_group(5, 0.0)]);
    processor.add_experiences(&empty, &terminal, 0, &action_info(&[0]));
    let second = drain(&queue);
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].len(), 2);
    assert_eq!(second[0].steps[0].obs, common::obs(100.0));
    assert_eq!(second[0].steps[0].reward, 101.0);
}

#[test]
fn test_terminal_step_purges_agent_state() {
    let mut processor = AgentProcessor::new(MockPolicy::new("p"), "Purge", stats(), usize::MAX);
    let empty = StepBatch::empty();
    let agent = get_global_agent_id(3, 7);

    processor.add_experiences(&batch(vec![grouped_decision(7, 2, 0.0)]), &empty, 3, &ActionInfo::empty());
    processor.add_experiences(&batch(vec![grouped_decision(7, 2, 1.0)]), &empty, 3, &action_info(&[7]));
    assert!(processor.is_tracking(&agent));
    assert_eq!(processor.episode_reward(&agent), Some(1.0));

    let terminal = batch(vec![AgentStep::terminal(7, common::obs(2.0), 2.0, true).with_group(2, 0.0)]);
    processor.add_experiences(&empty, &terminal, 3, &action_info(&[7]));

    assert!(!processor.is_tracking(&agent));
    assert_eq!(processor.buffered_len(&agent), 0);
    assert_eq!(processor.episode_reward(&agent), None);
    assert!(!processor.group_tracker().contains_agent(&agent));
    assert_eq!(processor.group_tracker().num_groups(), 0);
}

#[test]
fn test_workers_do_not_share_agent_state() {
    let mut processor = AgentProcessor::new(MockPolicy::new("p"), "Multi", stats(), 2);
    let queue = AgentManagerQueue::new("Multi", 0);
    processor.publish_trajectory_queue(queue.clone());
    let empty = StepBatch::empty();

    processor.add_experiences(&batch(vec![decision(0, 0.0)]), &empty, 0, &ActionInfo::empty());
    processor.add_experiences(&batch(vec![decision(0, 0.0)]), &empty, 1, &ActionInfo::empty());
    processor.add_experiences(&batch(vec![decision(0, 1.0)]), &empty, 0, &action_info(&[0]));

    assert_eq!(processor.buffered_len(&get_global_agent_id(0, 0)), 1);
    assert_eq!(processor.buffered_len(&get_global_agent_id(1, 0)), 0);
    assert!(queue.empty());
}

#[test]
fn test_every_subscribed_queue_receives_trajectories() {
    let mut processor = AgentProcessor::new(MockPolicy::new("p"), "Broadcast", stats(), 1);
    let first = AgentManagerQueue::new("Broadcast", 0);
    let second = AgentManagerQueue::new("Broadcast", 0);
    processor.publish_trajectory_queue(first.clone());
    processor.publish_trajectory_queue(second.clone());
    let empty = StepBatch::empty();

    processor.add_experiences(&batch(vec![decision(0, 0.0)]), &empty, 0, &ActionInfo::empty());
    processor.add_experiences(&batch(vec![decision(0, 1.0)]), &empty, 0, &action_info(&[0]));
    assert_eq!(first.qsize(), 1);
    assert_eq!(second.qsize(), 1);
    assert_eq!(first.get_nowait().unwrap(), second.get_nowait().unwrap());
}
