//! The serialized cluster-state update executor.

use std::sync::{Arc, RwLock};

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, warn};

use crate::error::{Error, Result};
use crate::state::ClusterState;

/// A compare-and-swap style cluster-state mutation.
///
/// `execute` reads the current snapshot and computes a new one. Returning a
/// state equal to the input is a no-op: the version is not bumped and no
/// listener is notified. Tasks are applied exactly once per successful
/// submission, one at a time, in submission order, each observing the
/// result of all previously applied tasks.
pub trait ClusterStateUpdateTask: Send + Sync {
    /// Compute the new state from the current one.
    ///
    /// # Errors
    /// Task-specific failures; an error leaves the current state untouched.
    fn execute(&self, state: &ClusterState) -> Result<ClusterState>;
}

/// Notified after every committed (changed) cluster-state update.
///
/// Listeners run on the executor thread; anything slow or re-entrant should
/// be spawned off.
pub trait ClusterStateListener: Send + Sync {
    /// The cluster state changed to `state`.
    fn cluster_state_changed(&self, state: &Arc<ClusterState>);
}

/// What became of one submitted update task.
#[derive(Debug, Clone)]
pub struct UpdateOutcome {
    /// The snapshot current after the task ran.
    pub state: Arc<ClusterState>,
    /// Whether *this* task changed state. False for no-ops — including
    /// stale compare-and-move requests whose guard did not match.
    pub changed: bool,
}

struct QueuedTask {
    source: String,
    task: Box<dyn ClusterStateUpdateTask>,
    ack: oneshot::Sender<Result<UpdateOutcome>>,
}

/// The single logical writer for cluster metadata.
///
/// All mutations go through [`ClusterService::submit_update_task`], which
/// queues the task to one driver loop. The driver applies tasks strictly
/// in submission order, publishes changed snapshots with a bumped version,
/// and notifies listeners. Reads ([`ClusterService::state`]) are lock-free
/// of the queue and always observe the latest published snapshot.
pub struct ClusterService {
    sender: mpsc::UnboundedSender<QueuedTask>,
    current: Arc<RwLock<Arc<ClusterState>>>,
    listeners: Arc<RwLock<Vec<Arc<dyn ClusterStateListener>>>>,
}

impl ClusterService {
    /// Start the service with an initial state, spawning the driver loop
    /// onto the current tokio runtime.
    pub fn start(initial: ClusterState) -> Arc<Self> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let current = Arc::new(RwLock::new(Arc::new(initial)));
        let listeners: Arc<RwLock<Vec<Arc<dyn ClusterStateListener>>>> =
            Arc::new(RwLock::new(Vec::new()));
        let service = Arc::new(Self {
            sender,
            current: Arc::clone(&current),
            listeners: Arc::clone(&listeners),
        });
        tokio::spawn(drive(receiver, current, listeners));
        service
    }

    /// The latest published snapshot.
    pub fn state(&self) -> Arc<ClusterState> {
        Arc::clone(&read_lock(&self.current))
    }

    /// Register a cluster-state-changed listener.
    pub fn add_listener(&self, listener: Arc<dyn ClusterStateListener>) {
        write_lock(&self.listeners).push(listener);
    }

    /// Submit an update task and wait for it to be applied.
    ///
    /// # Errors
    /// The task's own error, or `ExecutorStopped` if the driver loop has
    /// shut down.
    pub async fn submit_update_task(
        &self,
        source: impl Into<String>,
        task: Box<dyn ClusterStateUpdateTask>,
    ) -> Result<UpdateOutcome> {
        let (ack, done) = oneshot::channel();
        let queued = QueuedTask {
            source: source.into(),
            task,
            ack,
        };
        self.sender.send(queued).map_err(|_| Error::ExecutorStopped)?;
        done.await.map_err(|_| Error::ExecutorStopped)?
    }
}

async fn drive(
    mut receiver: mpsc::UnboundedReceiver<QueuedTask>,
    current: Arc<RwLock<Arc<ClusterState>>>,
    listeners: Arc<RwLock<Vec<Arc<dyn ClusterStateListener>>>>,
) {
    while let Some(QueuedTask { source, task, ack }) = receiver.recv().await {
        let before = Arc::clone(&read_lock(&current));
        let outcome = match task.execute(&before) {
            Ok(new_state) if new_state == *before => {
                debug!(task = %source, version = before.version(), "cluster-state task was a no-op");
                Ok(UpdateOutcome {
                    state: before,
                    changed: false,
                })
            }
            Ok(new_state) => {
                let published = Arc::new(new_state.bump_version());
                *write_lock(&current) = Arc::clone(&published);
                debug!(task = %source, version = published.version(), "cluster state updated");
                let registered: Vec<_> = read_lock(&listeners).iter().map(Arc::clone).collect();
                for listener in registered {
                    listener.cluster_state_changed(&published);
                }
                Ok(UpdateOutcome {
                    state: published,
                    changed: true,
                })
            }
            Err(err) => {
                warn!(task = %source, error = %err, "cluster-state task failed");
                Err(err)
            }
        };
        if ack.send(outcome).is_err() {
            // submitter went away; the task still ran exactly once
            debug!(task = %source, "cluster-state task result dropped");
        }
    }
    error!("cluster-state update executor stopped");
}

fn read_lock<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(std::sync::PoisonError::into_inner)
}

fn write_lock<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(std::sync::PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::expect_used)]
    #![allow(clippy::panic)]

    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use super::*;
    use crate::state::ResourceMetadata;

    /// Task appending a marker resource, recording the version it observed.
    struct RecordingTask {
        name: String,
        observed: Arc<Mutex<Vec<u64>>>,
    }

    impl ClusterStateUpdateTask for RecordingTask {
        fn execute(&self, state: &ClusterState) -> Result<ClusterState> {
            self.observed.lock().unwrap().push(state.version());
            Ok(state.with_resource(ResourceMetadata::new(self.name.clone())))
        }
    }

    struct NoopTask;

    impl ClusterStateUpdateTask for NoopTask {
        fn execute(&self, state: &ClusterState) -> Result<ClusterState> {
            Ok(state.clone())
        }
    }

    struct CountingListener {
        notified: AtomicUsize,
    }

    impl ClusterStateListener for CountingListener {
        fn cluster_state_changed(&self, _state: &Arc<ClusterState>) {
            self.notified.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn tasks_are_applied_in_submission_order() {
        let service = ClusterService::start(ClusterState::new());
        let observed = Arc::new(Mutex::new(Vec::new()));

        for i in 0..4 {
            service
                .submit_update_task(
                    format!("task-{i}"),
                    Box::new(RecordingTask {
                        name: format!("res-{i}"),
                        observed: Arc::clone(&observed),
                    }),
                )
                .await
                .unwrap();
        }

        // each task observed the result of all prior tasks
        assert_eq!(*observed.lock().unwrap(), vec![0, 1, 2, 3]);
        let state = service.state();
        assert_eq!(state.version(), 4);
        assert_eq!(state.resource_count(), 4);
    }

    #[tokio::test]
    async fn noop_task_keeps_version_and_skips_listeners() {
        let service = ClusterService::start(ClusterState::new());
        let listener = Arc::new(CountingListener {
            notified: AtomicUsize::new(0),
        });
        service.add_listener(Arc::clone(&listener) as Arc<dyn ClusterStateListener>);

        let after = service
            .submit_update_task("noop", Box::new(NoopTask))
            .await
            .unwrap();
        assert!(!after.changed);
        assert_eq!(after.state.version(), 0);
        assert_eq!(listener.notified.load(Ordering::SeqCst), 0);

        let changed = service
            .submit_update_task(
                "change",
                Box::new(RecordingTask {
                    name: "res".into(),
                    observed: Arc::new(Mutex::new(Vec::new())),
                }),
            )
            .await
            .unwrap();
        assert!(changed.changed);
        assert_eq!(listener.notified.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_task_leaves_state_untouched() {
        struct FailingTask;
        impl ClusterStateUpdateTask for FailingTask {
            fn execute(&self, _state: &ClusterState) -> Result<ClusterState> {
                Err(Error::resource_not_found("missing"))
            }
        }

        let service = ClusterService::start(ClusterState::new());
        let err = service
            .submit_update_task("fail", Box::new(FailingTask))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ResourceNotFound { .. }));
        assert_eq!(service.state().version(), 0);
    }
}
