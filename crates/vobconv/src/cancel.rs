use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};
use tokio::sync::oneshot;
use uuid::Uuid;
use log::{debug, info};
use crate::error::JobError;

/// The subprocess currently registered as active
#[derive(Debug)]
struct ActiveProcess {
    job_id: Uuid,
    source: PathBuf,
    pid: Option<u32>,
    terminate: oneshot::Sender<()>,
}

#[derive(Debug, Default)]
struct Slot {
    active: Option<ActiveProcess>,
    stop_requested: bool,
}

/// Process-wide single-slot register of the running ffmpeg subprocess
///
/// At most one transcode is registered at a time. The job runner registers
/// its child right after spawning and clears it once the child has exited;
/// anyone else (Ctrl-C handler, window shutdown) can ask for termination via
/// [`CancellationController::cancel_active`]. All slot updates happen under
/// one mutex, so a cancel racing a clear terminates at most once.
#[derive(Debug, Default)]
pub struct CancellationController {
    slot: Mutex<Slot>,
}

impl CancellationController {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Slot> {
        // A panic while holding the lock cannot leave the slot half-written
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register a freshly spawned subprocess as the active one
    ///
    /// Returns the receiver that fires when termination is requested. Fails
    /// with [`JobError::Cancelled`] once a stop was requested, and with
    /// [`JobError::SlotOccupied`] if another job is still registered.
    pub fn register(
        &self,
        job_id: Uuid,
        source: PathBuf,
        pid: Option<u32>,
    ) -> Result<oneshot::Receiver<()>, JobError> {
        let mut slot = self.lock();
        if slot.stop_requested {
            return Err(JobError::Cancelled);
        }
        if slot.active.is_some() {
            return Err(JobError::SlotOccupied);
        }

        let (tx, rx) = oneshot::channel();
        debug!("Job {}: registered active process (pid {:?})", job_id, pid);
        slot.active = Some(ActiveProcess {
            job_id,
            source,
            pid,
            terminate: tx,
        });
        Ok(rx)
    }

    /// Clear the registration of `job_id`; a no-op if another job (or nothing) is registered
    pub fn clear(&self, job_id: Uuid) {
        let mut slot = self.lock();
        if slot.active.as_ref().map(|a| a.job_id) == Some(job_id) {
            slot.active = None;
            debug!("Job {}: cleared active process", job_id);
        }
    }

    /// Request termination of the active subprocess, if any, and empty the slot
    ///
    /// Returns `true` when a process was registered. Safe to call at any time.
    pub fn cancel_active(&self) -> bool {
        let taken = self.lock().active.take();
        match taken {
            Some(active) => {
                info!("Terminating ffmpeg for {} (pid {:?})", active.source.display(), active.pid);
                // The runner may already be past its select loop; nothing to do then
                let _ = active.terminate.send(());
                true
            }
            None => false,
        }
    }

    /// Stop the current batch: refuse further registrations and terminate the active process
    pub fn request_stop(&self) -> bool {
        let taken = {
            let mut slot = self.lock();
            slot.stop_requested = true;
            slot.active.take()
        };
        match taken {
            Some(active) => {
                info!("Stop requested, terminating ffmpeg for {}", active.source.display());
                let _ = active.terminate.send(());
                true
            }
            None => false,
        }
    }

    pub fn stop_requested(&self) -> bool {
        self.lock().stop_requested
    }

    /// Lower the stop flag before a new batch starts
    pub fn reset(&self) {
        self.lock().stop_requested = false;
    }

    pub fn is_active(&self) -> bool {
        self.lock().active.is_some()
    }

    /// Job id of the registered process, if any
    pub fn active_job(&self) -> Option<Uuid> {
        self.lock().active.as_ref().map(|a| a.job_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_cancel_without_active_is_noop() {
        let ctl = CancellationController::new();
        assert!(!ctl.cancel_active());
        assert!(!ctl.is_active());
    }

    #[test]
    fn test_cancel_fires_receiver_and_clears_slot() {
        let ctl = CancellationController::new();
        let id = Uuid::new_v4();
        let mut rx = ctl.register(id, PathBuf::from("a.VOB"), Some(42)).unwrap();

        assert_eq!(ctl.active_job(), Some(id));
        assert!(ctl.cancel_active());
        assert!(!ctl.is_active());
        assert!(rx.try_recv().is_ok());

        // Second cancel finds nothing
        assert!(!ctl.cancel_active());
    }

    #[test]
    fn test_clear_only_removes_own_registration() {
        let ctl = CancellationController::new();
        let first = Uuid::new_v4();
        let _rx = ctl.register(first, PathBuf::from("a.VOB"), None).unwrap();

        ctl.clear(Uuid::new_v4());
        assert_eq!(ctl.active_job(), Some(first));

        ctl.clear(first);
        assert!(!ctl.is_active());
    }

    #[test]
    fn test_second_registration_is_refused() {
        let ctl = CancellationController::new();
        let _rx = ctl.register(Uuid::new_v4(), PathBuf::from("a.VOB"), None).unwrap();
        let err = ctl.register(Uuid::new_v4(), PathBuf::from("b.VOB"), None).unwrap_err();
        assert!(matches!(err, JobError::SlotOccupied));
    }

    #[test]
    fn test_stop_blocks_registration_until_reset() {
        let ctl = CancellationController::new();
        assert!(!ctl.request_stop());
        assert!(ctl.stop_requested());

        let err = ctl.register(Uuid::new_v4(), PathBuf::from("a.VOB"), None).unwrap_err();
        assert!(matches!(err, JobError::Cancelled));

        ctl.reset();
        assert!(ctl.register(Uuid::new_v4(), PathBuf::from("a.VOB"), None).is_ok());
    }

    #[test]
    fn test_clear_after_cancel_does_not_panic() {
        let ctl = CancellationController::new();
        let id = Uuid::new_v4();
        let _rx = ctl.register(id, PathBuf::from("a.VOB"), None).unwrap();
        assert!(ctl.cancel_active());
        ctl.clear(id);
        assert!(!ctl.is_active());
    }

    #[test]
    fn test_concurrent_cancel_and_clear_terminate_once() {
        for _ in 0..100 {
            let ctl = Arc::new(CancellationController::new());
            let id = Uuid::new_v4();
            let mut rx = ctl.register(id, PathBuf::from("a.VOB"), None).unwrap();

            let canceller = {
                let ctl = ctl.clone();
                std::thread::spawn(move || ctl.cancel_active())
            };
            ctl.clear(id);
            let cancelled = canceller.join().unwrap();

            assert!(!ctl.is_active());
            // The signal arrives exactly when the canceller won the race
            assert_eq!(rx.try_recv().is_ok(), cancelled);
        }
    }
}
