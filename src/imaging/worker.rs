//! Background execution of pre-flight and imaging.
//!
//! The orchestrator blocks on subprocesses, so every run happens on a
//! blocking task. Progress flows back over an unbounded channel; the caller
//! owns whatever display it drives from those events.

use super::orchestrator::Orchestrator;
use super::state::{ImagingEvent, ImagingState};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Worker errors
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("An imaging task is already running")]
    Busy,

    #[error("Imaging cannot start from state {0:?}")]
    NotReady(ImagingState),

    #[error("Background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Allows a single active run at a time.
#[derive(Debug, Clone, Default)]
pub struct RunGate {
    busy: Arc<AtomicBool>,
}

impl RunGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the gate, or fail with [`WorkerError::Busy`] if a run holds it.
    pub fn try_acquire(&self) -> Result<RunPermit, WorkerError> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| WorkerError::Busy)?;
        Ok(RunPermit {
            busy: self.busy.clone(),
        })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Held for the duration of a run; releases the gate on drop.
#[derive(Debug)]
pub struct RunPermit {
    busy: Arc<AtomicBool>,
}

impl Drop for RunPermit {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

/// Handle to a running background task.
pub struct WorkerHandle {
    /// Progress events; closes when the task finishes.
    pub events: mpsc::UnboundedReceiver<ImagingEvent>,
    pub task: JoinHandle<()>,
}

impl WorkerHandle {
    /// Drain every event into `on_event`, then wait for the task.
    pub async fn follow<F>(mut self, mut on_event: F) -> Result<(), WorkerError>
    where
        F: FnMut(ImagingEvent),
    {
        while let Some(event) = self.events.recv().await {
            on_event(event);
        }
        self.task.await?;
        Ok(())
    }
}

/// Runs an [`Orchestrator`] on background tasks, one at a time.
#[derive(Clone)]
pub struct ImagingWorker {
    orchestrator: Arc<Mutex<Orchestrator>>,
    gate: RunGate,
}

impl ImagingWorker {
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self {
            orchestrator: Arc::new(Mutex::new(orchestrator)),
            gate: RunGate::new(),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.gate.is_busy()
    }

    /// Current orchestrator state, or `None` while a task holds it.
    pub fn state(&self) -> Option<ImagingState> {
        if self.is_busy() {
            return None;
        }
        Some(lock(&self.orchestrator).state())
    }

    /// Edit the orchestrator between runs (override paths, parameters).
    pub fn with_orchestrator<R>(
        &self,
        f: impl FnOnce(&mut Orchestrator) -> R,
    ) -> Result<R, WorkerError> {
        let _permit = self.gate.try_acquire()?;
        let mut orchestrator = lock(&self.orchestrator);
        Ok(f(&mut orchestrator))
    }

    /// Start a pre-flight check in the background.
    pub fn spawn_preflight(&self) -> Result<WorkerHandle, WorkerError> {
        self.spawn(|orchestrator, tx| {
            let report = orchestrator.preflight();
            tracing::debug!("Pre-flight finished: ok={}", report.ok());
            drop(tx);
        })
    }

    /// Start an imaging run in the background. Only allowed once a
    /// pre-flight has passed.
    pub fn spawn_imaging(&self) -> Result<WorkerHandle, WorkerError> {
        if let Some(state) = self.state() {
            if !state.can_start_imaging() {
                return Err(WorkerError::NotReady(state));
            }
        }
        self.spawn(|orchestrator, tx| {
            let result = orchestrator.run().map_err(|e| format!("{e:#}"));
            let _ = tx.send(ImagingEvent::Finished(result));
        })
    }

    fn spawn<F>(&self, job: F) -> Result<WorkerHandle, WorkerError>
    where
        F: FnOnce(&mut Orchestrator, mpsc::UnboundedSender<ImagingEvent>) + Send + 'static,
    {
        let permit = self.gate.try_acquire()?;
        let (tx, rx) = mpsc::unbounded_channel();
        let orchestrator = self.orchestrator.clone();

        let task = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            let mut orchestrator = lock(&orchestrator);

            let events = tx.clone();
            orchestrator.set_event_callback(Some(Box::new(move |event| {
                let _ = events.send(event);
            })));
            job(&mut orchestrator, tx);
            // Drops the last sender so the receiver sees the end of the run.
            orchestrator.set_event_callback(None);
        });

        Ok(WorkerHandle { events: rx, task })
    }
}

fn lock(orchestrator: &Mutex<Orchestrator>) -> MutexGuard<'_, Orchestrator> {
    orchestrator
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn test_gate_rejects_second_acquire() {
        let gate = RunGate::new();
        let permit = gate.try_acquire().unwrap();
        assert!(gate.is_busy());
        assert!(matches!(gate.try_acquire(), Err(WorkerError::Busy)));

        drop(permit);
        assert!(!gate.is_busy());
        assert!(gate.try_acquire().is_ok());
    }

    #[test]
    fn test_gate_shared_between_clones() {
        let gate = RunGate::new();
        let other = gate.clone();
        let _permit = gate.try_acquire().unwrap();
        assert!(matches!(other.try_acquire(), Err(WorkerError::Busy)));
    }

    #[tokio::test]
    async fn test_imaging_requires_preflight() {
        let worker = ImagingWorker::new(Orchestrator::new(Config::default()));
        let err = worker.spawn_imaging().err().unwrap();
        assert!(matches!(err, WorkerError::NotReady(ImagingState::Idle)));
    }

    #[tokio::test]
    async fn test_preflight_with_missing_tools() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut config = Config::default();
        config.tools.search_path = Some(dir.path().display().to_string());
        config.tools.converter_fallbacks.clear();

        let worker = ImagingWorker::new(Orchestrator::new(config));
        let handle = worker.spawn_preflight().unwrap();

        let mut states = Vec::new();
        let mut report = None;
        handle
            .follow(|event| match event {
                ImagingEvent::State(state) => states.push(state),
                ImagingEvent::Preflight(r) => report = Some(r),
                _ => {}
            })
            .await
            .unwrap();

        assert_eq!(
            states,
            vec![ImagingState::PreflightRunning, ImagingState::PreflightFailed]
        );
        let report = report.unwrap();
        assert!(!report.ok());
        assert!(report.probe.is_none());
        assert!(!worker.is_busy());
        assert_eq!(worker.state(), Some(ImagingState::PreflightFailed));
    }
}
