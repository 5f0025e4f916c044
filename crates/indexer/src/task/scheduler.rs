use super::{TaskContext, TaskNode, TaskState};
use std::thread;
use std::time::Duration;

/// Tick loop for a task tree. Runs on the calling thread until the root finishes.
#[derive(Debug, Clone)]
pub struct TaskScheduler {
    tick_interval: Duration,
}

impl TaskScheduler {
    #[must_use]
    pub const fn new(tick_interval: Duration) -> Self {
        Self { tick_interval }
    }

    /// Tick `root` to completion. The loop only sleeps after ticks that reported being idle,
    /// so inline work runs back to back while polling for workers does not spin.
    pub fn run(&self, root: &mut TaskNode, ctx: &mut TaskContext<'_>) -> TaskState {
        let mut ticks: u64 = 0;
        loop {
            ticks += 1;
            let state = root.tick(ctx);
            if state != TaskState::Running {
                log::debug!("Task tree {} finished after {ticks} ticks: {state:?}", root.name());
                return state;
            }
            if ctx.take_idle() {
                if self.tick_interval.is_zero() {
                    thread::yield_now();
                } else {
                    thread::sleep(self.tick_interval);
                }
            }
        }
    }
}

impl Default for TaskScheduler {
    fn default() -> Self {
        Self::new(Duration::from_millis(10))
    }
}
