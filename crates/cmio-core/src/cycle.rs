// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Cycle scheduler: the read→write interleave loop.
//!
//! Exactly one cycle task runs per manager. It is the only task that issues
//! scheduled reads; writes queued by front-ends are flushed immediately
//! after the card they target is refreshed, so a write never waits behind a
//! full sweep of the bus.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::manager::IoManager;

/// Handle to a running cycle task.
///
/// Dropping the handle detaches the task; call [`CycleHandle::stop`] to end
/// it cooperatively and wait for the in-flight iteration to finish (the
/// quiesce step rediscover relies on).
pub struct CycleHandle {
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl CycleHandle {
    /// Signals the loop to stop and waits for it to exit. In-flight bus
    /// transactions complete; there is no per-operation cancellation.
    pub async fn stop(self) {
        let _ = self.stop.send(true);
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "cycle task join failed");
        }
    }

    /// Returns `true` once the loop has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl std::fmt::Debug for CycleHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CycleHandle")
            .field("finished", &self.is_finished())
            .finish()
    }
}

/// Spawns the continuous read-write cycle for a manager.
pub fn start_cycle(manager: Arc<IoManager>) -> CycleHandle {
    let (stop, mut stopped) = watch::channel(false);
    let cycle_delay = manager.config().cycle_delay;

    let task = tokio::spawn(async move {
        tracing::debug!("cycle loop started");
        loop {
            if *stopped.borrow() {
                break;
            }

            manager.read_all_and_process_writes().await;

            tokio::select! {
                _ = tokio::time::sleep(cycle_delay) => {}
                result = stopped.changed() => {
                    if result.is_err() || *stopped.borrow() {
                        break;
                    }
                }
            }
        }
        tracing::debug!("cycle loop exited");
    });

    CycleHandle { stop, task }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::IoConfig;

    #[tokio::test]
    async fn test_stop_is_cooperative() {
        // A manager with no cards spins harmlessly; stop must join the task.
        let manager = Arc::new(IoManager::new(IoConfig::default()));
        let handle = start_cycle(manager);

        tokio::time::sleep(std::time::Duration::from_millis(30)).await;
        assert!(!handle.is_finished());

        handle.stop().await;
    }
}
