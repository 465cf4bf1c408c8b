use super::orchestrator::{ImagingOutcome, PreflightReport};
use serde::Serialize;
use std::fmt;

/// Lifecycle of the imaging front end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImagingState {
    Idle,
    PreflightRunning,
    PreflightOk,
    PreflightFailed,
    ImagingRunning,
    ReadFailed,
    ConvertFailed,
    Done,
}

impl ImagingState {
    /// Whether the imaging action may be triggered from this state.
    pub fn can_start_imaging(&self) -> bool {
        matches!(
            self,
            ImagingState::PreflightOk
                | ImagingState::ReadFailed
                | ImagingState::ConvertFailed
                | ImagingState::Done
        )
    }

    /// Whether a background task is active in this state.
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            ImagingState::PreflightRunning | ImagingState::ImagingRunning
        )
    }

    /// Short status line for the interactive surface.
    pub fn status_text(&self) -> &'static str {
        match self {
            ImagingState::Idle => "Ready",
            ImagingState::PreflightRunning => "Running checks",
            ImagingState::PreflightOk => "Ready",
            ImagingState::PreflightFailed => "Checks failed",
            ImagingState::ImagingRunning => "Imaging, please wait",
            ImagingState::ReadFailed => "Read failed",
            ImagingState::ConvertFailed => "Conversion failed",
            ImagingState::Done => "Completed successfully, see log",
        }
    }
}

impl fmt::Display for ImagingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.status_text())
    }
}

/// Why an imaging run stopped short of `Done`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureCause {
    /// One or both executables could not be resolved at trigger time.
    ToolsUnresolved(String),
    /// The reader's capability probe failed at trigger time.
    DeviceUnavailable(String),
    /// The read stage exited non-zero or produced no capture.
    ReadFailed { exit_code: i32, capture_missing: bool },
    /// The convert stage exited non-zero, produced nothing recognizable, or
    /// its output could not be verified.
    ConvertFailed { exit_code: Option<i32>, detail: String },
}

impl fmt::Display for FailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureCause::ToolsUnresolved(detail) => write!(f, "Executables unresolved: {detail}"),
            FailureCause::DeviceUnavailable(detail) => f.write_str(detail),
            FailureCause::ReadFailed { .. } => f.write_str("Read failed, see log file"),
            FailureCause::ConvertFailed { .. } => f.write_str("Conversion failed, see log file"),
        }
    }
}

/// Progress messages sent from a background task to the interactive surface.
#[derive(Debug, Clone)]
pub enum ImagingEvent {
    /// The orchestrator entered a new state.
    State(ImagingState),
    /// Free-form status update.
    Status(String),
    /// One line of subprocess output.
    Line(String),
    /// Pre-flight finished.
    Preflight(PreflightReport),
    /// Imaging finished; `Err` carries a template or I/O error message.
    Finished(Result<ImagingOutcome, String>),
}
