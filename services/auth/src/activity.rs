//! Background last-activity bookkeeping
//!
//! Requests hand a user id to [`ActivityRecorder::record`] and move on. A
//! dispatcher task drains the queue and runs each update on its own task,
//! limited by a semaphore and bounded by its own timeout. Updates are never
//! tied to the request that scheduled them, so a response being written (or a
//! client disconnecting) does not cancel them.

use std::{sync::Arc, time::Duration};
use tokio::sync::{
    Semaphore,
    mpsc::{self, error::TrySendError},
};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{config::AuthConfig, store::SessionStore};

/// Tuning for the recorder's worker pool
#[derive(Debug, Clone)]
pub struct ActivityConfig {
    pub workers: usize,
    pub queue_capacity: usize,
    pub timeout: Duration,
}

impl Default for ActivityConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            queue_capacity: 1024,
            timeout: Duration::from_secs(5),
        }
    }
}

impl From<&AuthConfig> for ActivityConfig {
    fn from(config: &AuthConfig) -> Self {
        Self {
            workers: config.activity_workers,
            queue_capacity: config.activity_queue_capacity,
            timeout: config.activity_timeout(),
        }
    }
}

/// Handle used to schedule last-activity updates
#[derive(Clone)]
pub struct ActivityRecorder {
    sender: mpsc::Sender<Uuid>,
}

impl ActivityRecorder {
    /// Spawn the dispatcher on the current tokio runtime.
    ///
    /// The dispatcher exits once every handle has been dropped and the queue
    /// is drained.
    pub fn start(store: Arc<dyn SessionStore>, config: ActivityConfig) -> Self {
        let (sender, receiver) = mpsc::channel(config.queue_capacity.max(1));
        tokio::spawn(dispatch(receiver, store, config));
        Self { sender }
    }

    /// Schedule an update of `user_id`'s last activity. Never waits; when the
    /// queue is full the update is dropped.
    pub fn record(&self, user_id: Uuid) {
        match self.sender.try_send(user_id) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!(user_id = %user_id, "Activity queue full, dropping last-activity update");
            }
            Err(TrySendError::Closed(_)) => {
                warn!(user_id = %user_id, "Activity recorder stopped, dropping last-activity update");
            }
        }
    }
}

async fn dispatch(
    mut receiver: mpsc::Receiver<Uuid>,
    store: Arc<dyn SessionStore>,
    config: ActivityConfig,
) {
    let permits = Arc::new(Semaphore::new(config.workers.max(1)));

    while let Some(user_id) = receiver.recv().await {
        let Ok(permit) = Arc::clone(&permits).acquire_owned().await else {
            break;
        };
        let store = Arc::clone(&store);
        let timeout = config.timeout;

        tokio::spawn(async move {
            let _permit = permit;
            match tokio::time::timeout(timeout, store.update_last_activity(user_id)).await {
                Ok(Ok(())) => debug!(user_id = %user_id, "Updated last activity"),
                Ok(Err(e)) => {
                    warn!(user_id = %user_id, "Failed to update last activity: {}", e)
                }
                Err(_) => warn!(
                    user_id = %user_id,
                    "Last-activity update timed out after {:?}", timeout
                ),
            }
        });
    }

    debug!("Activity recorder stopped");
}
