//! Imaging orchestration: the read/convert/verify sequence, its state
//! machine, and the background worker that drives it.

mod orchestrator;
pub mod session;
mod state;
mod worker;

pub use orchestrator::{
    CommandPlan, EventCallback, ImagingOutcome, Orchestrator, PreflightReport, ProbeReport,
};
pub use session::{read_summary, write_summary, ImagingSession, SessionSummary};
pub use state::{FailureCause, ImagingEvent, ImagingState};
pub use worker::{ImagingWorker, RunGate, RunPermit, WorkerError, WorkerHandle};
