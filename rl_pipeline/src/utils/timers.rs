// Timers - thread-local hierarchical wall-clock timing
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::time::{Duration, Instant};

/// Accumulated time for one block, keyed under its parent block.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimerNode {
    pub total: Duration,
    pub count: u64,
    pub children: BTreeMap<String, TimerNode>,
}

impl TimerNode {
    /// Looks up a descendant by dotted path, e.g. `"load_demonstration.read_file"`.
    pub fn get(&self, path: &str) -> Option<&TimerNode> {
        path.split('.')
            .try_fold(self, |node, name| node.children.get(name))
    }
}

#[derive(Debug, Default)]
pub struct HierarchicalTimer {
    root: TimerNode,
    stack: Vec<(String, Instant)>,
}

impl HierarchicalTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self, name: &str) {
        self.stack.push((name.to_string(), Instant::now()));
    }

    /// Closes the innermost open block.
    pub fn stop(&mut self) {
        let Some((_, started)) = self.stack.last() else {
            return;
        };
        let elapsed = started.elapsed();
        let mut node = &mut self.root;
        for (name, _) in &self.stack {
            node = node.children.entry(name.clone()).or_default();
        }
        node.total += elapsed;
        node.count += 1;
        self.stack.pop();
    }

    pub fn root(&self) -> &TimerNode {
        &self.root
    }

    pub fn reset(&mut self) {
        self.root = TimerNode::default();
        self.stack.clear();
    }
}

thread_local! {
    static TIMER: RefCell<HierarchicalTimer> = RefCell::new(HierarchicalTimer::new());
}

/// Stops its block when dropped. Bound to the thread that created it.
#[must_use = "the block is timed until the guard is dropped"]
pub struct TimerGuard {
    _not_send: PhantomData<*const ()>,
}

impl Drop for TimerGuard {
    fn drop(&mut self) {
        TIMER.with(|t| t.borrow_mut().stop());
    }
}

/// Times the enclosing scope under `name`, nested inside any block already
/// open on this thread.
pub fn hierarchical_timer(name: &str) -> TimerGuard {
    TIMER.with(|t| t.borrow_mut().start(name));
    TimerGuard {
        _not_send: PhantomData,
    }
}

pub fn get_timer_node(path: &str) -> Option<TimerNode> {
    TIMER.with(|t| t.borrow().root().get(path).cloned())
}

pub fn get_timer_tree() -> TimerNode {
    TIMER.with(|t| t.borrow().root().clone())
}

pub fn reset_timers() {
    TIMER.with(|t| t.borrow_mut().reset());
}
