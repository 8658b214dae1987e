use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use dagrun::dag::ScheduledTask;
use dagrun::engine::TaskOutcome;
use dagrun::exec::{ShutdownSignal, TaskRunner};

/// A fake runner that:
/// - records every attempt it is handed, in start order
/// - replays scripted outcomes per task name, then succeeds
/// - can fail a task on every attempt
/// - optionally sleeps, globally or per task, to make attempts overlap
///
/// Wrap it in an `Arc` to keep a handle after passing it to a run.
#[derive(Debug, Default)]
pub struct FakeRunner {
    script: Mutex<HashMap<String, VecDeque<TaskOutcome>>>,
    always_fail: Mutex<Vec<String>>,
    executed: Mutex<Vec<(String, u32)>>,
    delay: Duration,
    task_delays: HashMap<String, Duration>,
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Outcomes for the first attempts of `name`, in order.
    pub fn with_outcomes(self, name: &str, outcomes: impl IntoIterator<Item = TaskOutcome>) -> Self {
        self.script
            .lock()
            .unwrap()
            .entry(name.to_string())
            .or_default()
            .extend(outcomes);
        self
    }

    /// Fail the first `n` attempts of `name`.
    pub fn failing_times(self, name: &str, n: usize) -> Self {
        let outcomes = (0..n).map(|i| TaskOutcome::Failed(format!("scripted failure {}", i + 1)));
        self.with_outcomes(name, outcomes)
    }

    pub fn always_failing(self, name: &str) -> Self {
        self.always_fail.lock().unwrap().push(name.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Sleep for `delay` in attempts of `name`, overriding [`Self::with_delay`].
    pub fn with_task_delay(mut self, name: &str, delay: Duration) -> Self {
        self.task_delays.insert(name.to_string(), delay);
        self
    }

    /// Task names in the order attempts started.
    pub fn executed(&self) -> Vec<String> {
        self.executed
            .lock()
            .unwrap()
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn attempts_of(&self, name: &str) -> usize {
        self.executed
            .lock()
            .unwrap()
            .iter()
            .filter(|(n, _)| n == name)
            .count()
    }

    /// Attempt numbers reported by the scheduler for `name`.
    pub fn attempt_numbers(&self, name: &str) -> Vec<u32> {
        self.executed
            .lock()
            .unwrap()
            .iter()
            .filter(|(n, _)| n == name)
            .map(|(_, attempt)| *attempt)
            .collect()
    }

    /// Most attempts that were ever running at once.
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn next_outcome(&self, name: &str) -> TaskOutcome {
        if self.always_fail.lock().unwrap().iter().any(|n| n == name) {
            return TaskOutcome::Failed("always fails".to_string());
        }
        self.script
            .lock()
            .unwrap()
            .get_mut(name)
            .and_then(VecDeque::pop_front)
            .unwrap_or(TaskOutcome::Success)
    }
}

impl TaskRunner for FakeRunner {
    fn run(
        &self,
        task: ScheduledTask,
        _shutdown: ShutdownSignal,
    ) -> Pin<Box<dyn Future<Output = TaskOutcome> + Send + '_>> {
        Box::pin(async move {
            self.executed
                .lock()
                .unwrap()
                .push((task.name.clone(), task.attempt));

            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);

            let delay = self.task_delays.get(&task.name).copied().unwrap_or(self.delay);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            } else {
                tokio::task::yield_now().await;
            }

            self.current.fetch_sub(1, Ordering::SeqCst);
            self.next_outcome(&task.name)
        })
    }
}
