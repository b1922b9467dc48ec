// Utils module
pub mod timers;

pub use timers::{hierarchical_timer, TimerGuard, TimerNode};
