//! Obstacle environments and the copy-on-write handle shared between
//! sensor ingestion, the planning task and the control task.
//!
//! Writers build the next version on a private copy and publish it with a
//! pointer swap, so readers only ever wait for that swap.

pub mod polygon_env;
pub mod scan_env;

pub use polygon_env::*;
pub use scan_env::*;

use std::ops::Deref;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::{Mutex, RwLock};

use crate::common::{Environment, Observation, ObservationError, OccupancyStatus, RobotState};

/// Bookkeeping attached to every environment version.
#[derive(Debug, Clone)]
pub struct EnvironmentMeta {
    /// Incremented by every applied observation
    pub revision: u64,
    pub last_update: Option<Instant>,
    pub frame: String,
}

#[derive(Clone)]
struct Versioned {
    env: Arc<Box<dyn Environment>>,
    meta: EnvironmentMeta,
}

/// Read-only view of one environment version.
///
/// Holding a snapshot never blocks writers; an update that arrives while a
/// snapshot is alive is applied to a private copy.
#[derive(Clone)]
pub struct EnvironmentSnapshot {
    env: Arc<Box<dyn Environment>>,
    meta: EnvironmentMeta,
}

impl EnvironmentSnapshot {
    pub fn meta(&self) -> &EnvironmentMeta {
        &self.meta
    }

    pub fn revision(&self) -> u64 {
        self.meta.revision
    }
}

impl Deref for EnvironmentSnapshot {
    type Target = dyn Environment;

    fn deref(&self) -> &Self::Target {
        &**self.env
    }
}

/// Thread-safe environment handle with snapshot isolation.
#[derive(Clone)]
pub struct SharedEnvironment {
    inner: Arc<RwLock<Versioned>>,
    /// Serialises writers; never taken by readers
    writer: Arc<Mutex<()>>,
    dropped: Arc<AtomicU64>,
}

impl SharedEnvironment {
    pub fn new(env: Box<dyn Environment>, frame: &str) -> Self {
        SharedEnvironment {
            inner: Arc::new(RwLock::new(Versioned {
                env: Arc::new(env),
                meta: EnvironmentMeta {
                    revision: 0,
                    last_update: None,
                    frame: frame.to_string(),
                },
            })),
            writer: Arc::new(Mutex::new(())),
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn name(&self) -> &'static str {
        self.inner.read().env.name()
    }

    /// Latest completed version. The lock is held only for the clone.
    pub fn snapshot(&self) -> EnvironmentSnapshot {
        let guard = self.inner.read();
        EnvironmentSnapshot {
            env: Arc::clone(&guard.env),
            meta: guard.meta.clone(),
        }
    }

    pub fn observation_kind(&self) -> &'static str {
        self.inner.read().env.observation_kind()
    }

    /// Apply an observation. Malformed observations are dropped and counted.
    pub fn update(&self, observation: &Observation) {
        let _writer = self.writer.lock();
        let current = self.snapshot();
        if let Err(e) = current.validate(observation) {
            self.drop_observation(&e);
            return;
        }

        let mut next = current.env.clone_box();
        drop(current);
        next.apply(observation);

        let mut guard = self.inner.write();
        guard.env = Arc::new(next);
        guard.meta.revision += 1;
        guard.meta.last_update = Some(Instant::now());
        tracing::trace!(revision = guard.meta.revision, "applied {} observation", observation.kind());
    }

    pub fn get_status(&self, state: &RobotState) -> OccupancyStatus {
        self.snapshot().get_status(state)
    }

    /// Count an observation rejected before or at this boundary.
    pub fn drop_observation(&self, reason: &ObservationError) {
        let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::warn!(dropped, "dropping observation: {}", reason);
    }

    pub fn dropped_observations(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn meta(&self) -> EnvironmentMeta {
        self.inner.read().meta.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{Point, Polygon};

    fn shared() -> SharedEnvironment {
        SharedEnvironment::new(Box::new(PolygonEnv::new(0.1)), "map")
    }

    #[test]
    fn test_snapshot_isolated_from_later_updates() {
        let env = shared();
        env.update(&Observation::Polygons(vec![]));
        let before = env.snapshot();
        env.update(&Observation::Polygons(vec![Polygon::rectangle(4.0, -1.0, 5.0, 1.0)]));

        let p = Point::new(4.5, 0.0);
        assert_eq!(before.point_status(&p), OccupancyStatus::Free);
        assert_eq!(env.snapshot().point_status(&p), OccupancyStatus::Blocked);
        assert_eq!(before.revision() + 1, env.snapshot().revision());
    }

    #[test]
    fn test_malformed_observation_counted() {
        let env = shared();
        env.update(&Observation::Polygons(vec![Polygon::from_xy(&[(0.0, 0.0)])]));
        assert_eq!(env.dropped_observations(), 1);
        assert_eq!(env.meta().revision, 0);
        assert!(!env.snapshot().is_initialized());
    }

    #[test]
    fn test_concurrent_updates_and_reads() {
        let env = shared();
        env.update(&Observation::Polygons(vec![]));
        let writer = {
            let env = env.clone();
            std::thread::spawn(move || {
                for i in 0..200 {
                    let x = (i % 10) as f64;
                    env.update(&Observation::Polygons(vec![Polygon::rectangle(x, 0.0, x + 1.0, 1.0)]));
                }
            })
        };
        for _ in 0..200 {
            let snap = env.snapshot();
            let a = snap.point_status(&Point::new(20.0, 20.0));
            // a snapshot answers the same way for its whole lifetime
            assert_eq!(a, snap.point_status(&Point::new(20.0, 20.0)));
            assert_eq!(a, OccupancyStatus::Free);
        }
        writer.join().unwrap();
        assert_eq!(env.meta().revision, 201);
    }

    /// Polygon environment whose `apply` waits for a release signal.
    #[derive(Clone)]
    struct SlowEnv {
        inner: PolygonEnv,
        applying: crossbeam_channel::Sender<()>,
        release: crossbeam_channel::Receiver<()>,
    }

    impl Environment for SlowEnv {
        fn name(&self) -> &'static str {
            "SlowEnv"
        }

        fn observation_kind(&self) -> &'static str {
            self.inner.observation_kind()
        }

        fn validate(&self, observation: &Observation) -> Result<(), ObservationError> {
            self.inner.validate(observation)
        }

        fn apply(&mut self, observation: &Observation) {
            let _ = self.applying.send(());
            let _ = self.release.recv_timeout(std::time::Duration::from_secs(5));
            self.inner.apply(observation);
        }

        fn point_status(&self, point: &Point) -> OccupancyStatus {
            self.inner.point_status(point)
        }

        fn clearance(&self, point: &Point) -> Option<f64> {
            self.inner.clearance(point)
        }

        fn check_resolution(&self) -> f64 {
            self.inner.check_resolution()
        }

        fn is_initialized(&self) -> bool {
            self.inner.is_initialized()
        }

        fn clone_box(&self) -> Box<dyn Environment> {
            Box::new(self.clone())
        }
    }

    #[test]
    fn test_readers_not_blocked_while_applying() {
        let (applying_tx, applying) = crossbeam_channel::unbounded();
        let (release, release_rx) = crossbeam_channel::unbounded();
        let env = SharedEnvironment::new(
            Box::new(SlowEnv {
                inner: PolygonEnv::new(0.1),
                applying: applying_tx,
                release: release_rx,
            }),
            "map",
        );
        let held = env.snapshot();

        let writer = {
            let env = env.clone();
            std::thread::spawn(move || env.update(&Observation::Polygons(vec![])))
        };
        assert!(applying.recv_timeout(std::time::Duration::from_secs(5)).is_ok());

        // the control task's reads complete while the update is still running
        let (done_tx, done) = crossbeam_channel::bounded(1);
        {
            let env = env.clone();
            std::thread::spawn(move || {
                let revision = env.meta().revision;
                let initialized = env.snapshot().is_initialized();
                let _ = done_tx.send((revision, initialized));
            });
        }
        assert_eq!(done.recv_timeout(std::time::Duration::from_secs(2)), Ok((0, false)));

        release.send(()).unwrap();
        writer.join().unwrap();
        assert_eq!(env.meta().revision, 1);
        assert!(env.snapshot().is_initialized());
        assert!(!held.is_initialized());
    }
}
