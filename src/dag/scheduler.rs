use std::collections::{BTreeSet, HashMap};

use tracing::{debug, error, info, warn};

use crate::dag::cycle::check_acyclic;
use crate::dag::expand::expand_roots;
use crate::dag::failure::{FailureAggregator, FailureRecord};
use crate::dag::graph::TaskGraph;
use crate::dag::retry::{RetryDecision, RetryPolicy};
use crate::dag::run_state::{RunCounts, RunState, TaskRunState};
use crate::dag::scheduler_step::SchedulerStep;
use crate::dag::task_info::{ScheduledTask, TaskId};
use crate::engine::TaskOutcome;
use crate::errors::{DagrunError, Result};

/// How a run ended once nothing is pending or running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Success { done: BTreeSet<TaskId> },
    Failed(FailureRecord),
}

/// Scheduler holds a borrowed, validated graph plus the mutable run state.
///
/// It is responsible for:
/// - computing the ready frontier (pending tasks whose deps are all done)
/// - moving dispatched tasks out of `pending` exactly once per attempt
/// - applying completions: done, retry, or permanent failure
/// - halting new dispatch on the first permanent failure
///
/// It performs no IO; [`crate::engine::Runtime`] drives it.
#[derive(Debug)]
pub struct Scheduler<'g> {
    graph: &'g TaskGraph,
    state: RunState,
    retries: RetryPolicy,
    failures: FailureAggregator,
    attempts: HashMap<TaskId, u32>,
}

impl<'g> Scheduler<'g> {
    /// Validate and expand `roots`, seeding `done` as already satisfied.
    ///
    /// Cycle detection over everything reachable from the roots completes
    /// before the scheduler exists, so nothing can be dispatched from a
    /// cyclic graph.
    pub fn new(
        graph: &'g TaskGraph,
        roots: &[TaskId],
        done: BTreeSet<TaskId>,
        default_retries: u32,
    ) -> Result<Self> {
        for id in roots.iter().chain(done.iter()) {
            if !graph.contains(*id) {
                return Err(DagrunError::TaskNotFound(id.to_string()));
            }
        }

        check_acyclic(graph, roots)?;

        let tasks = expand_roots(graph, roots);
        let retries = RetryPolicy::seed(graph, tasks.iter().copied(), default_retries);
        let state = RunState::new(tasks, done);

        let counts = state.counts();
        info!(
            roots = roots.len(),
            pending = counts.pending,
            done = counts.done,
            "scheduler: expanded task graph"
        );

        Ok(Self {
            graph,
            state,
            retries,
            failures: FailureAggregator::default(),
            attempts: HashMap::new(),
        })
    }

    pub fn graph(&self) -> &'g TaskGraph {
        self.graph
    }

    /// Read-only view of the given task's run state.
    pub fn run_state_of(&self, task: TaskId) -> TaskRunState {
        self.state.state_of(task)
    }

    pub fn counts(&self) -> RunCounts {
        self.state.counts()
    }

    pub fn is_halted(&self) -> bool {
        self.failures.is_halted()
    }

    /// Attempts dispatched so far for `task` in this run.
    pub fn attempts_of(&self, task: TaskId) -> u32 {
        self.attempts.get(&task).copied().unwrap_or(0)
    }

    pub fn retries_remaining(&self, task: TaskId) -> u32 {
        self.retries.remaining(task)
    }

    /// Whether the dependencies of `task` are all done.
    pub fn deps_satisfied(&self, task: TaskId) -> bool {
        self.state.deps_satisfied(self.graph, task)
    }

    /// Nothing in flight, and nothing pending that may still be dispatched.
    ///
    /// Once halted, tasks left in `pending` are never dispatched again.
    pub fn is_finished(&self) -> bool {
        self.state.running().is_empty()
            && (self.failures.is_halted() || self.state.pending().is_empty())
    }

    /// Work remains but nothing can ever become ready.
    ///
    /// Cannot happen for a validated, expanded graph; the runtime treats it
    /// as an internal error instead of polling forever.
    pub fn is_stalled(&self) -> bool {
        !self.failures.is_halted()
            && !self.state.pending().is_empty()
            && self.state.running().is_empty()
            && self.state.ready_frontier(self.graph).is_empty()
    }

    /// Collect the ready frontier, mark it running and return one
    /// [`ScheduledTask`] per dispatch.
    pub fn collect_ready(&mut self) -> Vec<ScheduledTask> {
        if self.failures.is_halted() {
            return Vec::new();
        }

        let mut ready = Vec::new();

        // Decide first, then mutate.
        for task in self.state.ready_frontier(self.graph) {
            let Some(spec) = self.graph.spec(task) else {
                warn!(task = %task, "ready task missing from graph; skipping");
                continue;
            };
            if !self.state.mark_running(task) {
                continue;
            }

            let attempt = self.attempts.entry(task).or_insert(0);
            *attempt += 1;

            info!(
                task = %spec.name,
                attempt = *attempt,
                kind = %spec.kind,
                "dispatching task"
            );
            ready.push(ScheduledTask::from_spec(task, spec, *attempt));
        }

        if !ready.is_empty() {
            let counts = self.state.counts();
            info!(
                pending = counts.pending,
                running = counts.running,
                done = counts.done,
                "tasks status"
            );
        }

        ready
    }

    /// Apply a completion and return newly ready work (production API).
    pub fn handle_completion(&mut self, task: TaskId, outcome: TaskOutcome) -> Vec<ScheduledTask> {
        self.step_completion(task, outcome).newly_scheduled
    }

    /// Manual-step variant of `handle_completion` that returns a rich
    /// [`SchedulerStep`].
    pub fn step_completion(&mut self, task: TaskId, outcome: TaskOutcome) -> SchedulerStep {
        let mut step = SchedulerStep::default();

        if self.state.state_of(task) != TaskRunState::Running {
            warn!(
                task = %self.graph.name_of(task),
                state = ?self.state.state_of(task),
                "completion for task that is not running; ignoring"
            );
            return step;
        }

        let name = self.graph.name_of(task);

        match outcome {
            TaskOutcome::Success => {
                self.state.mark_done(task);
                info!(task = %name, attempt = self.attempts_of(task), "task done");
            }
            TaskOutcome::Interrupted => {
                // Not a failure: the attempt ends without touching the budget.
                self.state.requeue(task);
                info!(task = %name, "task attempt interrupted");
                step.interrupted = true;
            }
            TaskOutcome::Failed(reason) => {
                self.apply_failure(task, &name, &reason, &mut step);
            }
        }

        // An interrupted run stops; nothing new is handed out.
        if !step.interrupted {
            step.newly_scheduled = self.collect_ready();
        }
        step.run_just_finished = self.is_finished();
        step
    }

    fn apply_failure(&mut self, task: TaskId, name: &str, reason: &str, step: &mut SchedulerStep) {
        if self.failures.is_halted() && self.retries.remaining(task) > 0 {
            // No new dispatch after a halt; the task keeps its retry.
            self.state.requeue(task);
            warn!(
                task = %name,
                reason = %reason,
                "task failed after run halted; not retrying"
            );
            return;
        }

        match self.retries.on_failure(task) {
            RetryDecision::Retry { remaining } => {
                self.state.requeue(task);
                step.retried = Some(task);
                warn!(
                    task = %name,
                    reason = %reason,
                    retries_left = remaining,
                    "task failed; re-queued for another attempt"
                );
            }
            RetryDecision::Exhausted => {
                self.state.mark_failed(task);
                step.newly_failed = Some(task);
                error!(task = %name, reason = %reason, "task failed permanently");

                if self.failures.on_permanent_failure(self.state.pending_mut()) {
                    step.halted = true;
                    error!(
                        in_flight = self.state.running().len(),
                        "halting dispatch; waiting for in-flight tasks to finish"
                    );
                }
            }
        }
    }

    /// Package the final result. Call once [`Self::is_finished`] holds.
    pub fn finish(self) -> RunOutcome {
        if !self.is_finished() {
            debug!(counts = ?self.state.counts(), "finishing scheduler with work outstanding");
        }

        if self.failures.is_halted() {
            let mut pending = self.failures.pending();
            pending.extend(self.state.pending().iter().copied());
            pending.extend(self.state.running().iter().copied());
            RunOutcome::Failed(FailureRecord {
                pending,
                done: self.state.done().clone(),
                failed: self.state.failed().clone(),
            })
        } else {
            RunOutcome::Success {
                done: self.state.done().clone(),
            }
        }
    }
}
