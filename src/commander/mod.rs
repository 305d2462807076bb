//! Navigation commander: the state machine that interleaves planning, map
//! updates and path following for one goal at a time.
//!
//! The commander is driven by [`Commander::tick`], called once per control
//! period. All state transitions happen inside that call. Planning runs on a
//! worker thread and reports back over a channel; results are applied at the
//! next tick boundary (or by [`Commander::settle`]), so a slow planner never
//! delays a control command.

pub mod handle;
pub mod state;
pub mod timer;
pub mod worker;

pub use handle::CommanderHandle;
pub use state::*;
pub use timer::ReplanTimer;
pub use worker::{PlanJob, PlanOutcome, PlanWorker};

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::RwLock;

use crate::adapters::{Clock, CommandSink};
use crate::commander::handle::{check_task, Request};
use crate::common::*;
use crate::environment::SharedEnvironment;

/// Commander tuning. Goal tolerances travel with each [`Goal`].
#[derive(Debug, Clone, PartialEq)]
pub struct CommanderConfig {
    pub replan_interval: Duration,
    /// Consecutive planning failures tolerated before a task fails
    pub retry_budget: u32,
    /// Delay before the first retry; doubled for every further failure
    pub retry_backoff: Duration,
    pub max_backoff: Duration,
    pub plan_timeout: Duration,
    /// Extra time after the plan deadline before a request is abandoned
    pub timeout_grace: Duration,
    pub task_policy: TaskPolicy,
    /// How long a task waits in PLANNING for the first observation
    pub environment_timeout: Duration,
}

impl Default for CommanderConfig {
    fn default() -> Self {
        Self {
            replan_interval: Duration::from_secs(2),
            retry_budget: 3,
            retry_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(2),
            plan_timeout: Duration::from_secs(5),
            timeout_grace: Duration::from_millis(500),
            task_policy: TaskPolicy::Preempt,
            environment_timeout: Duration::from_secs(10),
        }
    }
}

impl CommanderConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retry_budget == 0 {
            return Err(ConfigError::Invalid("retry_budget must be > 0".to_string()));
        }
        if self.replan_interval.is_zero() {
            return Err(ConfigError::Invalid("replan_interval must be > 0".to_string()));
        }
        if self.plan_timeout.is_zero() {
            return Err(ConfigError::Invalid("plan_timeout must be > 0".to_string()));
        }
        if self.max_backoff < self.retry_backoff {
            return Err(ConfigError::Invalid("max_backoff must be >= retry_backoff".to_string()));
        }
        Ok(())
    }

    /// Backoff before retry number `failures` (1-based).
    pub fn backoff(&self, failures: u32) -> Duration {
        let shift = failures.saturating_sub(1).min(16);
        self.retry_backoff.saturating_mul(1 << shift).min(self.max_backoff)
    }
}

#[derive(Debug, Clone)]
struct Task {
    id: TaskId,
    goal: Goal,
    start: RobotState,
}

#[derive(Debug)]
struct InFlight {
    request_id: u64,
    cancel: CancelToken,
    abandon_at: Instant,
}

#[derive(Debug)]
struct ActiveTask {
    task: Task,
    started: Instant,
    in_flight: Option<InFlight>,
    retry_at: Option<Instant>,
    replan_due: bool,
    /// Environment revision the active path was last checked against
    checked_revision: u64,
}

pub struct Commander {
    config: CommanderConfig,
    env: SharedEnvironment,
    controller: Box<dyn Controller>,
    sink: Box<dyn CommandSink>,
    clock: Arc<dyn Clock>,
    worker: PlanWorker,
    requests: Receiver<Request>,
    request_tx: Sender<Request>,
    next_task: Arc<AtomicU64>,
    next_request: u64,
    active: Option<ActiveTask>,
    queue: VecDeque<Task>,
    state: CommanderState,
    timer: ReplanTimer,
    path: Arc<RwLock<Arc<Path>>>,
    stats: CommanderStatus,
    shared_status: Arc<RwLock<CommanderStatus>>,
}

impl Commander {
    pub fn new(
        config: CommanderConfig,
        env: SharedEnvironment,
        planner: Arc<dyn Planner>,
        controller: Box<dyn Controller>,
        sink: Box<dyn CommandSink>,
        clock: Arc<dyn Clock>,
    ) -> NavResult<Self> {
        config.validate()?;
        tracing::info!(
            planner = planner.name(),
            controller = controller.name(),
            environment = env.name(),
            "commander ready"
        );
        let worker = PlanWorker::spawn(planner)?;
        let (request_tx, requests) = unbounded();
        let timer = ReplanTimer::new(config.replan_interval);

        Ok(Self {
            config,
            env,
            controller,
            sink,
            clock,
            worker,
            requests,
            request_tx,
            next_task: Arc::new(AtomicU64::new(1)),
            next_request: 0,
            active: None,
            queue: VecDeque::new(),
            state: CommanderState::Idle,
            timer,
            path: Arc::new(RwLock::new(Arc::new(Path::new()))),
            stats: CommanderStatus::default(),
            shared_status: Arc::new(RwLock::new(CommanderStatus::default())),
        })
    }

    pub fn handle(&self) -> CommanderHandle {
        CommanderHandle {
            requests: self.request_tx.clone(),
            status: Arc::clone(&self.shared_status),
            path: Arc::clone(&self.path),
            next_task: Arc::clone(&self.next_task),
        }
    }

    pub fn config(&self) -> &CommanderConfig {
        &self.config
    }

    pub fn state(&self) -> CommanderState {
        self.state
    }

    pub fn status(&self) -> CommanderStatus {
        let mut status = self.stats.clone();
        status.task = self.active.as_ref().map(|a| a.task.id);
        status.state = self.state;
        status.queued_tasks = self.queue.len();
        status.dropped_observations = self.env.dropped_observations();
        status.path_len = self.path.read().len();
        status
    }

    pub fn active_path(&self) -> Arc<Path> {
        Arc::clone(&self.path.read())
    }

    /// Start navigating to `goal` from `start`.
    ///
    /// Depending on the task policy an active task is cancelled or the new
    /// task waits for it. Planning is requested right away when possible.
    pub fn goto(&mut self, goal: Goal, start: RobotState) -> NavResult<TaskId> {
        check_task(&goal, &start)?;
        let id = self.next_task.fetch_add(1, Ordering::Relaxed);
        let now = self.clock.now();
        self.accept(Task { id, goal, start }, now);
        self.publish_status();
        Ok(id)
    }

    /// Cancel the active task and stop immediately. Queued tasks are kept.
    pub fn cancel(&mut self) {
        if self.active.is_some() {
            self.finish(TaskOutcome::Cancelled);
            self.sink.publish(&VelocityCommand::stop());
            self.publish_status();
        }
    }

    /// One control period. Returns the command that was published.
    pub fn tick(&mut self, current: &RobotState) -> VelocityCommand {
        let now = self.clock.now();
        self.drain_requests(now);
        while let Some(outcome) = self.worker.try_recv() {
            self.apply_outcome(outcome, now);
        }

        let command = self.step(current, now);
        self.sink.publish(&command);
        self.publish_status();
        command
    }

    /// Tick without a usable robot state: publish stop and leave the state
    /// machine where it is. Cancellation is still honoured.
    pub fn hold(&mut self) -> VelocityCommand {
        let now = self.clock.now();
        self.drain_requests(now);
        self.stats.stale_ticks += 1;
        tracing::debug!(stale_ticks = self.stats.stale_ticks, "robot state stale, holding");
        let command = VelocityCommand::stop();
        self.sink.publish(&command);
        self.publish_status();
        command
    }

    /// Block until one planning result arrives (or `timeout`), and apply it.
    pub fn settle(&mut self, timeout: Duration) -> bool {
        match self.worker.recv_timeout(timeout) {
            Some(outcome) => {
                let now = self.clock.now();
                self.apply_outcome(outcome, now);
                self.publish_status();
                true
            }
            None => false,
        }
    }

    /// End the active task, stop the robot and join the planning thread.
    pub fn shutdown(&mut self) {
        if self.active.is_some() {
            self.finish(TaskOutcome::Failed(FailureReason::Shutdown));
        }
        self.queue.clear();
        self.sink.publish(&VelocityCommand::stop());
        self.worker.shutdown();
        self.publish_status();
        tracing::info!("commander shut down");
    }

    fn drain_requests(&mut self, now: Instant) {
        while let Ok(request) = self.requests.try_recv() {
            match request {
                Request::Goto { id, goal, start } => self.accept(Task { id, goal, start }, now),
                Request::Cancel => {
                    if self.active.is_some() {
                        self.finish(TaskOutcome::Cancelled);
                    }
                }
            }
        }
    }

    fn accept(&mut self, task: Task, now: Instant) {
        if self.active.is_some() {
            match self.config.task_policy {
                TaskPolicy::Preempt => {
                    tracing::info!(task = task.id, "preempting active task");
                    self.finish(TaskOutcome::Cancelled);
                }
                TaskPolicy::Queue => {
                    tracing::info!(task = task.id, queued = self.queue.len() + 1, "task queued");
                    self.queue.push_back(task);
                    return;
                }
            }
        }
        self.start_task(task, now);
    }

    fn start_task(&mut self, task: Task, now: Instant) {
        tracing::info!(
            task = task.id,
            goal_x = task.goal.state.position.x,
            goal_y = task.goal.state.position.y,
            "task started"
        );
        self.active = Some(ActiveTask {
            task,
            started: now,
            in_flight: None,
            retry_at: None,
            replan_due: false,
            checked_revision: 0,
        });
        self.stats.outcome = None;
        self.stats.consecutive_failures = 0;
        self.stats.consecutive_faults = 0;
        self.stats.last_failure = None;
        self.controller.reset();
        self.timer.arm(now);
        self.transition(CommanderState::Planning);
        self.plan_initial(now);
    }

    fn transition(&mut self, to: CommanderState) {
        if self.state != to {
            tracing::info!(from = ?self.state, to = ?to, "commander state");
            self.state = to;
        }
    }

    fn swap_path(&mut self, path: Path) {
        *self.path.write() = Arc::new(path);
    }

    fn finish(&mut self, outcome: TaskOutcome) {
        let Some(active) = self.active.take() else {
            return;
        };
        if let Some(in_flight) = active.in_flight {
            in_flight.cancel.cancel();
        }
        self.timer.disarm();
        self.swap_path(Path::new());
        self.controller.reset();
        self.stats.outcome = Some(outcome);
        match outcome {
            TaskOutcome::Failed(reason) => tracing::warn!(task = active.task.id, ?reason, "task failed"),
            _ => tracing::info!(task = active.task.id, ?outcome, "task finished"),
        }
        self.transition(outcome.state());
    }

    fn step(&mut self, current: &RobotState, now: Instant) -> VelocityCommand {
        if self.active.is_none() {
            match self.queue.pop_front() {
                Some(task) => self.start_task(task, now),
                None => return VelocityCommand::stop(),
            }
        }
        let Some(goal) = self.active.as_ref().map(|a| a.task.goal) else {
            return VelocityCommand::stop();
        };

        if current.is_finite() && goal.is_reached(current) {
            self.finish(TaskOutcome::Succeeded);
            return VelocityCommand::stop();
        }

        self.abandon_overdue(now);

        match self.state {
            CommanderState::Planning => {
                self.plan_initial(now);
                VelocityCommand::stop()
            }
            CommanderState::Executing | CommanderState::Replanning => {
                let command = self.follow(current);
                if self.active.is_some() {
                    self.check_replan(current, now);
                }
                command
            }
            _ => VelocityCommand::stop(),
        }
    }

    /// Give up on a request past its deadline plus grace and count it as a timeout.
    fn abandon_overdue(&mut self, now: Instant) {
        let Some(active) = self.active.as_mut() else {
            return;
        };
        let overdue = active.in_flight.as_ref().map_or(false, |f| now >= f.abandon_at);
        if !overdue {
            return;
        }
        if let Some(in_flight) = active.in_flight.take() {
            in_flight.cancel.cancel();
            tracing::warn!(request = in_flight.request_id, "abandoning planning request past its deadline");
        }
        self.stats.abandoned_requests += 1;
        self.plan_failed(PlanningFailure::Timeout, now);
    }

    fn retry_ready(active: &ActiveTask, now: Instant) -> bool {
        active.in_flight.is_none() && active.retry_at.map_or(true, |at| now >= at)
    }

    /// PLANNING: request the first path once the environment has been observed.
    fn plan_initial(&mut self, now: Instant) {
        let Some(active) = self.active.as_ref() else {
            return;
        };
        if !Self::retry_ready(active, now) {
            return;
        }
        let start = active.task.start;
        let waited = now.saturating_duration_since(active.started);

        if !self.env.snapshot().is_initialized() {
            if waited >= self.config.environment_timeout {
                self.finish(TaskOutcome::Failed(FailureReason::EnvironmentNotInitialized));
            } else {
                tracing::debug!(waited_ms = waited.as_millis() as u64, "waiting for the first observation");
            }
            return;
        }
        self.submit(start, now);
    }

    fn submit(&mut self, start: RobotState, now: Instant) {
        let snapshot = self.env.snapshot();
        let Some(active) = self.active.as_mut() else {
            return;
        };
        self.next_request += 1;
        let request_id = self.next_request;
        let ctx = PlanContext::with_timeout(self.config.plan_timeout);
        let cancel = ctx.cancel.clone();
        let job = PlanJob {
            request_id,
            task_id: active.task.id,
            start,
            goal: active.task.goal.state,
            snapshot,
            ctx,
        };
        active.retry_at = None;
        active.replan_due = false;
        active.in_flight = Some(InFlight {
            request_id,
            cancel,
            abandon_at: now + self.config.plan_timeout + self.config.timeout_grace,
        });
        self.stats.planning_attempts += 1;
        tracing::debug!(
            request = request_id,
            attempt = self.stats.planning_attempts,
            start_x = start.position.x,
            start_y = start.position.y,
            "planning request submitted"
        );

        if !self.worker.submit(job) {
            if let Some(active) = self.active.as_mut() {
                active.in_flight = None;
            }
            tracing::error!("planning thread is gone");
            self.finish(TaskOutcome::Failed(FailureReason::Shutdown));
        }
    }

    fn apply_outcome(&mut self, outcome: PlanOutcome, now: Instant) {
        let current = self.active.as_ref().and_then(|a| {
            let request = a.in_flight.as_ref()?.request_id;
            Some((a.task.id, request))
        });
        if current != Some((outcome.task_id, outcome.request_id)) {
            tracing::debug!(request = outcome.request_id, "ignoring stale planning result");
            return;
        }
        if let Some(active) = self.active.as_mut() {
            active.in_flight = None;
        }

        match outcome.result {
            Ok(path) => {
                tracing::info!(
                    waypoints = path.len(),
                    length = path.total_length(),
                    elapsed_ms = outcome.elapsed.as_millis() as u64,
                    "path updated"
                );
                self.swap_path(path);
                self.controller.reset();
                self.stats.consecutive_failures = 0;
                if let Some(active) = self.active.as_mut() {
                    active.retry_at = None;
                    active.checked_revision = outcome.revision;
                }
                self.transition(CommanderState::Executing);
            }
            Err(failure) => self.plan_failed(failure, now),
        }
    }

    fn plan_failed(&mut self, failure: PlanningFailure, now: Instant) {
        self.stats.consecutive_failures += 1;
        self.stats.last_failure = Some(failure);
        let failures = self.stats.consecutive_failures;
        tracing::warn!(%failure, failures, budget = self.config.retry_budget, "planning failed");

        if failures >= self.config.retry_budget {
            self.finish(TaskOutcome::Failed(FailureReason::RetryBudgetExhausted(failure)));
            return;
        }
        let backoff = self.config.backoff(failures);
        if let Some(active) = self.active.as_mut() {
            active.retry_at = Some(now + backoff);
        }
        if self.state == CommanderState::Replanning {
            // keep following the previous path until a retry succeeds
            self.transition(CommanderState::Executing);
        }
    }

    fn follow(&mut self, current: &RobotState) -> VelocityCommand {
        let path = self.active_path();
        let fault = match self.controller.compute(current, &path) {
            Ok(command) if command.is_finite() => {
                self.stats.consecutive_faults = 0;
                return command;
            }
            Ok(_) => ControllerFault::NonFiniteState,
            Err(fault) => fault,
        };
        self.stats.controller_faults += 1;
        self.stats.consecutive_faults += 1;
        let consecutive = self.stats.consecutive_faults;
        tracing::warn!(%fault, consecutive, budget = self.config.retry_budget, "controller fault, stopping");

        if consecutive >= self.config.retry_budget {
            self.finish(TaskOutcome::Failed(FailureReason::ControllerFault));
        } else if let Some(active) = self.active.as_mut() {
            active.replan_due = true;
        }
        VelocityCommand::stop()
    }

    /// EXECUTING: decide whether to request a new path from the current state.
    fn check_replan(&mut self, current: &RobotState, now: Instant) {
        let timer_fired = self.timer.poll(now);
        let revision = self.env.meta().revision;
        let path = self.active_path();
        let Some(active) = self.active.as_mut() else {
            return;
        };

        if revision != active.checked_revision {
            active.checked_revision = revision;
            if self.env.snapshot().get_path_status(&path).is_blocked() {
                tracing::info!(revision, "active path blocked by new observation");
                active.replan_due = true;
            }
        }

        let retry_due = active.retry_at.map_or(false, |at| now >= at);
        if !(timer_fired || retry_due || active.replan_due) || active.in_flight.is_some() {
            return;
        }
        if !current.is_finite() {
            return;
        }
        self.transition(CommanderState::Replanning);
        self.submit(*current, now);
    }

    fn publish_status(&self) {
        *self.shared_status.write() = self.status();
    }
}

impl Drop for Commander {
    fn drop(&mut self) {
        if let Some(active) = self.active.as_ref() {
            if let Some(in_flight) = active.in_flight.as_ref() {
                in_flight.cancel.cancel();
            }
        }
    }
}
