use super::session::{write_summary, ImagingSession};
use super::state::{FailureCause, ImagingEvent, ImagingState};
use crate::config::Config;
use anyhow::{Context, Result};
use chrono::{Local, Utc};
use diskforged_tools::template::{display_command, Placeholder};
use diskforged_tools::{
    compute_digests, locate_output, ProbeOutput, ProcessRunner, ResolvedTool, RunLog,
    TemplateContext, ToolKind, ToolResolver,
};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Event callback type
pub type EventCallback = Box<dyn Fn(ImagingEvent) + Send + Sync>;

/// Result of the reader capability probe.
#[derive(Debug, Clone, Serialize)]
pub struct ProbeReport {
    pub help_exit_code: i32,
    pub info_exit_code: Option<i32>,
    pub passed: bool,
    pub message: String,
}

/// Outcome of a pre-flight check.
#[derive(Debug, Clone, Serialize)]
pub struct PreflightReport {
    pub reader: ResolvedTool,
    pub converter: ResolvedTool,
    pub probe: Option<ProbeReport>,
    /// Reason imaging is blocked, if it is.
    pub failure: Option<String>,
}

impl PreflightReport {
    pub fn ok(&self) -> bool {
        self.failure.is_none()
    }
}

/// Fully expanded stage commands for one prospective run.
#[derive(Debug, Clone)]
pub struct CommandPlan {
    pub session: ImagingSession,
    pub read: Vec<String>,
    pub convert: Vec<String>,
}

/// How an imaging run ended.
#[derive(Debug, Clone)]
pub struct ImagingOutcome {
    pub state: ImagingState,
    pub cause: Option<FailureCause>,
    pub session: Option<ImagingSession>,
    pub summary_path: Option<PathBuf>,
}

impl ImagingOutcome {
    pub fn succeeded(&self) -> bool {
        self.state == ImagingState::Done
    }

    /// User-facing result message.
    pub fn message(&self) -> String {
        match &self.cause {
            Some(cause) => cause.to_string(),
            None => "Imaging complete, see log".to_string(),
        }
    }
}

/// Sequences pre-flight and the two-stage imaging run.
///
/// Configuration is handed in at construction and only read here; saving it
/// back is the caller's business.
pub struct Orchestrator {
    config: Config,
    runner: ProcessRunner,
    state: ImagingState,
    event_callback: Option<EventCallback>,
}

impl Orchestrator {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            runner: ProcessRunner::new(),
            state: ImagingState::Idle,
            event_callback: None,
        }
    }

    pub fn with_runner(mut self, runner: ProcessRunner) -> Self {
        self.runner = runner;
        self
    }

    pub fn with_event_callback(mut self, callback: EventCallback) -> Self {
        self.event_callback = Some(callback);
        self
    }

    pub fn set_event_callback(&mut self, callback: Option<EventCallback>) {
        self.event_callback = callback;
    }

    pub fn state(&self) -> ImagingState {
        self.state
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Mutable access for edits between runs (override paths, parameters).
    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    fn emit(&self, event: ImagingEvent) {
        if let Some(ref cb) = self.event_callback {
            cb(event);
        }
    }

    fn set_state(&mut self, state: ImagingState) {
        tracing::info!("state: {:?} -> {:?}", self.state, state);
        self.state = state;
        self.emit(ImagingEvent::State(state));
    }

    fn status(&self, text: impl Into<String>) {
        self.emit(ImagingEvent::Status(text.into()));
    }

    fn resolver(&self) -> ToolResolver {
        let tools = &self.config.tools;
        let resolver = ToolResolver::new(tools.converter_fallbacks.clone());
        match tools.search_path.as_deref() {
            Some(path) => resolver.with_search_path(path),
            None => resolver,
        }
    }

    /// Resolve both tools against the current configuration.
    pub fn resolve_tools(&self) -> (ResolvedTool, ResolvedTool) {
        let resolver = self.resolver();
        let tools = &self.config.tools;
        (
            resolver.resolve(ToolKind::Reader, tools.reader_path.as_deref()),
            resolver.resolve(ToolKind::Converter, tools.converter_path.as_deref()),
        )
    }

    /// Resolve both tools and probe the reader.
    pub fn preflight(&mut self) -> PreflightReport {
        self.set_state(ImagingState::PreflightRunning);
        self.status(ImagingState::PreflightRunning.status_text());

        let (reader, converter) = self.resolve_tools();
        let probe = reader.path.as_deref().map(|path| self.probe_reader(path));

        let failure = if !reader.is_resolved() || !converter.is_resolved() {
            let mut missing = Vec::new();
            for tool in [&reader, &converter] {
                if !tool.is_resolved() {
                    missing.push(tool.message.clone());
                }
            }
            Some(missing.join("; "))
        } else {
            probe.as_ref().filter(|p| !p.passed).map(|p| p.message.clone())
        };

        if let Some(ref reason) = failure {
            tracing::warn!("Pre-flight failed: {}", reason);
            self.set_state(ImagingState::PreflightFailed);
        } else {
            self.set_state(ImagingState::PreflightOk);
        }

        let report = PreflightReport {
            reader,
            converter,
            probe,
            failure,
        };
        self.emit(ImagingEvent::Preflight(report.clone()));
        report
    }

    fn probe_reader(&self, reader: &Path) -> ProbeReport {
        let probe_cfg = &self.config.probe;
        let name = ToolKind::Reader.executable_name();

        let help = self.runner.probe(&probe_argv(reader, &probe_cfg.help_args));
        if !help_looks_usable(&help) {
            return ProbeReport {
                help_exit_code: help.exit_code,
                info_exit_code: None,
                passed: false,
                message: format!("'{name}' not runnable: {}", help.output.trim()),
            };
        }

        let info = self.runner.probe(&probe_argv(reader, &probe_cfg.info_args));
        let passed = info.success();
        let message = if passed {
            format!("'{name} {}' succeeded", probe_cfg.info_args.join(" "))
        } else {
            format!(
                "'{name} {}' failed. Ensure the device is connected and you have permissions.",
                probe_cfg.info_args.join(" ")
            )
        };
        ProbeReport {
            help_exit_code: help.exit_code,
            info_exit_code: Some(info.exit_code),
            passed,
            message,
        }
    }

    fn new_session(&self) -> ImagingSession {
        let imaging = &self.config.imaging;
        let base = imaging.resolved_base_name(Local::now());
        ImagingSession::new(&base, &imaging.resolved_output_dir(), Utc::now())
    }

    fn template_context(
        &self,
        session: &ImagingSession,
        reader: &Path,
        converter: &Path,
    ) -> TemplateContext {
        let imaging = &self.config.imaging;
        TemplateContext::new()
            .with_path(Placeholder::Reader, reader)
            .with_path(Placeholder::Converter, converter)
            .with_path(Placeholder::Capture, &session.capture_path)
            .with_path(Placeholder::OutBase, &session.output_base)
            .with_value(Placeholder::Drive, imaging.drive.to_string())
            .with_value(Placeholder::Tracks, imaging.tracks.trim())
            .with_value(Placeholder::Revs, imaging.revs.to_string())
    }

    /// Expand both stage commands without running anything. Unresolved
    /// tools are shown by their executable names.
    pub fn plan(&self) -> Result<CommandPlan> {
        let (reader, converter) = self.resolve_tools();
        let session = self.new_session();
        let reader = reader
            .path
            .unwrap_or_else(|| PathBuf::from(ToolKind::Reader.executable_name()));
        let converter = converter
            .path
            .unwrap_or_else(|| PathBuf::from(ToolKind::Converter.executable_name()));

        let ctx = self.template_context(&session, &reader, &converter);
        let read = ctx
            .expand_args(&self.config.templates.read)
            .context("Invalid read command template")?;
        let convert = ctx
            .expand_args(&self.config.templates.convert)
            .context("Invalid convert command template")?;

        Ok(CommandPlan {
            session,
            read,
            convert,
        })
    }

    /// Run one imaging attempt: re-validate, read, convert, locate, verify.
    ///
    /// Stage failures end in a terminal state and are returned as `Ok`.
    /// Template errors and I/O errors around the run are returned as `Err`.
    pub fn run(&mut self) -> Result<ImagingOutcome> {
        let report = self.preflight();
        if !report.ok() {
            let detail = report.failure.unwrap_or_default();
            let cause = if report.reader.is_resolved() && report.converter.is_resolved() {
                FailureCause::DeviceUnavailable(detail)
            } else {
                FailureCause::ToolsUnresolved(detail)
            };
            self.status(cause.to_string());
            return Ok(ImagingOutcome {
                state: self.state,
                cause: Some(cause),
                session: None,
                summary_path: None,
            });
        }
        let reader = report.reader.require()?;
        let converter = report.converter.require()?;

        self.set_state(ImagingState::ImagingRunning);
        self.status(ImagingState::ImagingRunning.status_text());

        let mut session = self.new_session();
        match self.run_stages(&mut session, &reader, &converter) {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                tracing::error!("Imaging aborted: {:#}", e);
                if self.state == ImagingState::ImagingRunning {
                    self.set_state(ImagingState::PreflightOk);
                }
                Err(e)
            }
        }
    }

    fn run_stages(
        &mut self,
        session: &mut ImagingSession,
        reader: &Path,
        converter: &Path,
    ) -> Result<ImagingOutcome> {
        std::fs::create_dir_all(&session.output_dir).with_context(|| {
            format!("Failed to create output directory: {:?}", session.output_dir)
        })?;

        let mut log = RunLog::create(&session.log_path)
            .with_context(|| format!("Failed to create log file: {:?}", session.log_path))?;
        log.header(
            &session.base_name,
            &Local::now().format("%Y-%m-%dT%H:%M:%S").to_string(),
            &session.output_dir,
        )?;

        let ctx = self.template_context(session, reader, converter);
        let templates = self.config.templates.clone();
        let expanded = ctx
            .expand_args(&templates.read)
            .context("Invalid read command template")
            .and_then(|read| {
                ctx.expand_args(&templates.convert)
                    .context("Invalid convert command template")
                    .map(|convert| (read, convert))
            });
        let (read_cmd, convert_cmd) = match expanded {
            Ok(cmds) => cmds,
            Err(e) => {
                log.line(&format!("{e:#}"))?;
                return Err(e);
            }
        };

        // Read stage
        tracing::info!("Read stage: {}", display_command(&read_cmd));
        self.status("Reading disk");
        let read_code = self.run_stage(&read_cmd, &mut log)?;
        session.read_exit_code = Some(read_code);

        let capture_size = std::fs::metadata(&session.capture_path)
            .map(|m| m.len())
            .unwrap_or(0);
        if read_code != 0 || capture_size == 0 {
            tracing::error!(
                "Read stage failed: exit code {}, capture {:?} ({} bytes)",
                read_code,
                session.capture_path,
                capture_size
            );
            log.line("Read failed")?;
            return Ok(self.fail(
                ImagingState::ReadFailed,
                FailureCause::ReadFailed {
                    exit_code: read_code,
                    capture_missing: capture_size == 0,
                },
                session,
            ));
        }

        // Convert stage
        tracing::info!("Convert stage: {}", display_command(&convert_cmd));
        self.status("Converting capture");
        let convert_code = self.run_stage(&convert_cmd, &mut log)?;
        session.convert_exit_code = Some(convert_code);

        let located = locate_output(&session.expected_image_path, &session.base_name);
        let image = match (convert_code, located) {
            (0, Some(image)) => image,
            (code, located) => {
                let detail = if code != 0 {
                    format!("converter exited with code {code}")
                } else {
                    format!(
                        "no output matching {:?} found in {:?}",
                        session.base_name, session.output_dir
                    )
                };
                tracing::error!("Convert stage failed: {}", detail);
                session.image_path = located;
                log.line(&format!("Conversion failed: {detail}"))?;
                return Ok(self.fail(
                    ImagingState::ConvertFailed,
                    FailureCause::ConvertFailed {
                        exit_code: Some(code),
                        detail,
                    },
                    session,
                ));
            }
        };
        session.image_path = Some(image.clone());

        // Verification
        self.status("Computing digests");
        let algorithms = self.config.digest.algorithms.clone();
        let digests = compute_digests(&session.capture_path, &algorithms)
            .and_then(|capture| compute_digests(&image, &algorithms).map(|img| (capture, img)));
        let (capture_digests, image_digests) = match digests {
            Ok(d) => d,
            Err(e) => {
                let detail = format!("could not hash artifacts: {e}");
                log.line(&detail)?;
                return Ok(self.fail(
                    ImagingState::ConvertFailed,
                    FailureCause::ConvertFailed {
                        exit_code: Some(convert_code),
                        detail,
                    },
                    session,
                ));
            }
        };
        session.capture_digests = capture_digests;
        session.image_digests = image_digests;

        let mut entries = vec![
            ("SCP".to_string(), session.capture_path.display().to_string()),
            ("DSK".to_string(), image.display().to_string()),
        ];
        for (label, digests) in [("SCP", &session.capture_digests), ("DSK", &session.image_digests)] {
            for (alg, hex) in digests {
                entries.push((format!("{label} {}", alg.name()), hex.clone()));
            }
        }
        log.summary(&entries)?;
        log.line(&format!(
            "Finished: {}",
            Local::now().format("%Y-%m-%dT%H:%M:%S")
        ))?;

        let summary_path = session.summary_path();
        let summary = session
            .summary(Utc::now())
            .context("Session incomplete after successful stages")?;
        write_summary(&summary_path, &summary)?;
        tracing::info!("Imaging complete: {:?}", image);

        self.set_state(ImagingState::Done);
        self.status(ImagingState::Done.status_text());
        Ok(ImagingOutcome {
            state: ImagingState::Done,
            cause: None,
            session: Some(session.clone()),
            summary_path: Some(summary_path),
        })
    }

    fn run_stage(&self, argv: &[String], log: &mut RunLog) -> Result<i32> {
        let code = self.runner.run(argv, log, &mut |line| {
            self.emit(ImagingEvent::Line(line.to_string()));
        })?;
        Ok(code)
    }

    fn fail(
        &mut self,
        state: ImagingState,
        cause: FailureCause,
        session: &ImagingSession,
    ) -> ImagingOutcome {
        self.set_state(state);
        self.status(cause.to_string());
        ImagingOutcome {
            state,
            cause: Some(cause),
            session: Some(session.clone()),
            summary_path: None,
        }
    }
}

fn probe_argv(program: &Path, args: &[String]) -> Vec<String> {
    std::iter::once(program.display().to_string())
        .chain(args.iter().cloned())
        .collect()
}

/// A help invocation counts as usable if it exits 0 or prints usage text.
fn help_looks_usable(probe: &ProbeOutput) -> bool {
    probe.success()
        || probe.output.contains("Usage")
        || probe.output.to_lowercase().contains("help")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_help_looks_usable() {
        let ok = ProbeOutput {
            exit_code: 0,
            output: String::new(),
        };
        let usage = ProbeOutput {
            exit_code: 2,
            output: "Usage: gw [--help] <command>".to_string(),
        };
        let broken = ProbeOutput {
            exit_code: 1,
            output: "ImportError: no module".to_string(),
        };
        assert!(help_looks_usable(&ok));
        assert!(help_looks_usable(&usage));
        assert!(!help_looks_usable(&broken));
    }

    #[test]
    fn test_probe_argv() {
        let argv = probe_argv(Path::new("/usr/bin/gw"), &["info".to_string()]);
        assert_eq!(argv, vec!["/usr/bin/gw", "info"]);
    }

    #[test]
    fn test_new_orchestrator_is_idle() {
        let orchestrator = Orchestrator::new(Config::default());
        assert_eq!(orchestrator.state(), ImagingState::Idle);
    }
}
