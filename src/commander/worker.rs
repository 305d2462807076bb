//! Planning worker thread.
//!
//! Receives one [`PlanJob`] at a time from the control task, runs the planner
//! against the job's environment snapshot and sends back a [`PlanOutcome`]. It
//! never touches commander state; the control task decides what a result means.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};

use crate::commander::state::TaskId;
use crate::common::*;
use crate::environment::EnvironmentSnapshot;

pub struct PlanJob {
    pub request_id: u64,
    pub task_id: TaskId,
    pub start: RobotState,
    pub goal: RobotState,
    pub snapshot: EnvironmentSnapshot,
    pub ctx: PlanContext,
}

#[derive(Debug)]
pub struct PlanOutcome {
    pub request_id: u64,
    pub task_id: TaskId,
    pub start: RobotState,
    pub result: Result<Path, PlanningFailure>,
    /// Environment revision the plan was computed against
    pub revision: u64,
    pub elapsed: Duration,
}

/// Reject a successful plan that puts a waypoint on a blocked cell of the
/// snapshot it was computed against.
fn check_plan(path: Path, snapshot: &EnvironmentSnapshot) -> Result<Path, PlanningFailure> {
    if path.is_empty() {
        return Err(PlanningFailure::NoPathFound);
    }
    match path.waypoints.iter().position(|w| snapshot.get_status(w).is_blocked()) {
        Some(i) => {
            tracing::warn!(waypoint = i, "planner returned a blocked waypoint, discarding plan");
            Err(PlanningFailure::NoPathFound)
        }
        None => Ok(path),
    }
}

fn run_job(planner: &dyn Planner, job: PlanJob) -> PlanOutcome {
    let started = Instant::now();
    let result = if job.ctx.cancel.is_cancelled() {
        Err(PlanningFailure::Cancelled)
    } else if !job.snapshot.is_initialized() {
        // the commander checks this before submitting; a reset map still must not be planned on
        Err(PlanningFailure::NoPathFound)
    } else {
        job.ctx
            .checkpoint()
            .and_then(|_| planner.plan(&job.start, &job.goal, &*job.snapshot, &job.ctx))
            .and_then(|path| check_plan(path, &job.snapshot))
    };
    PlanOutcome {
        request_id: job.request_id,
        task_id: job.task_id,
        start: job.start,
        result,
        revision: job.snapshot.revision(),
        elapsed: started.elapsed(),
    }
}

/// Handle to the planning thread.
pub struct PlanWorker {
    jobs: Option<Sender<PlanJob>>,
    results: Receiver<PlanOutcome>,
    handle: Option<JoinHandle<()>>,
}

impl PlanWorker {
    pub fn spawn(planner: Arc<dyn Planner>) -> std::io::Result<Self> {
        let (job_tx, job_rx) = unbounded::<PlanJob>();
        let (result_tx, result_rx) = unbounded::<PlanOutcome>();

        let handle = thread::Builder::new().name("planner".into()).spawn(move || {
            tracing::debug!(planner = planner.name(), "planning thread started");
            for job in job_rx.iter() {
                let request_id = job.request_id;
                let outcome = run_job(planner.as_ref(), job);
                tracing::debug!(
                    request_id,
                    elapsed_ms = outcome.elapsed.as_millis() as u64,
                    ok = outcome.result.is_ok(),
                    "plan finished"
                );
                if result_tx.send(outcome).is_err() {
                    break;
                }
            }
            tracing::debug!("planning thread stopped");
        })?;

        Ok(Self {
            jobs: Some(job_tx),
            results: result_rx,
            handle: Some(handle),
        })
    }

    /// Queue a job. Returns false once the worker is gone.
    pub fn submit(&self, job: PlanJob) -> bool {
        self.jobs.as_ref().map_or(false, |tx| tx.send(job).is_ok())
    }

    pub fn try_recv(&self) -> Option<PlanOutcome> {
        self.results.try_recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<PlanOutcome> {
        match self.results.recv_timeout(timeout) {
            Ok(outcome) => Some(outcome),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Close the job queue and wait for the thread. In-flight plans should be
    /// cancelled through their token first.
    pub fn shutdown(&mut self) {
        self.jobs.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("planning thread panicked");
            }
        }
    }
}

impl Drop for PlanWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::{PolygonEnv, SharedEnvironment};

    struct Straight;

    impl Planner for Straight {
        fn name(&self) -> &'static str {
            "Straight"
        }

        fn plan(&self, start: &RobotState, goal: &RobotState, _env: &dyn Environment, ctx: &PlanContext) -> Result<Path, PlanningFailure> {
            ctx.checkpoint()?;
            Ok(Path::from_states(vec![*start, RobotState::from_xy(5.0, 0.0), *goal]))
        }
    }

    fn job(env: &SharedEnvironment, request_id: u64) -> PlanJob {
        PlanJob {
            request_id,
            task_id: 1,
            start: RobotState::from_xy(0.0, 0.0),
            goal: RobotState::from_xy(10.0, 0.0),
            snapshot: env.snapshot(),
            ctx: PlanContext::with_timeout(Duration::from_secs(5)),
        }
    }

    #[test]
    fn test_worker_round_trip() {
        let env = SharedEnvironment::new(Box::new(PolygonEnv::new(0.1).with_obstacles(vec![])), "map");
        let mut worker = PlanWorker::spawn(Arc::new(Straight)).unwrap();
        assert!(worker.submit(job(&env, 7)));
        let outcome = worker.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(outcome.request_id, 7);
        assert_eq!(outcome.result.unwrap().len(), 3);
        worker.shutdown();
        assert!(!worker.submit(job(&env, 8)));
    }

    #[test]
    fn test_blocked_waypoint_rejected() {
        let env = SharedEnvironment::new(
            Box::new(PolygonEnv::new(0.1).with_obstacles(vec![Polygon::rectangle(4.0, -1.0, 6.0, 1.0)])),
            "map",
        );
        let worker = PlanWorker::spawn(Arc::new(Straight)).unwrap();
        worker.submit(job(&env, 1));
        let outcome = worker.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(outcome.result, Err(PlanningFailure::NoPathFound));
    }

    #[test]
    fn test_cancelled_job_skipped() {
        let env = SharedEnvironment::new(Box::new(PolygonEnv::new(0.1).with_obstacles(vec![])), "map");
        let worker = PlanWorker::spawn(Arc::new(Straight)).unwrap();
        let j = job(&env, 1);
        j.ctx.cancel.cancel();
        worker.submit(j);
        let outcome = worker.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(outcome.result, Err(PlanningFailure::Cancelled));
    }
}
