//! Supervised execution of external tools with a durable run log.
//!
//! Standard output and standard error share one pipe, so lines keep the order
//! the child wrote them in. They are handed over one line at a time as they
//! arrive, so a live view can follow the reader's progress. Every line reaches
//! the [`RunLog`] before the caller's callback sees it.

use crate::template::display_command;
use crate::Result;
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};

/// Exit code reported when the executable does not exist.
pub const EXIT_NOT_FOUND: i32 = 127;

/// Exit code reported when the executable may not be run.
pub const EXIT_PERMISSION_DENIED: i32 = 126;

/// Exit code reported for any other launch failure.
pub const EXIT_LAUNCH_FAILED: i32 = 1;

/// Append-only text log for one imaging run.
pub struct RunLog {
    path: PathBuf,
    file: File,
}

impl RunLog {
    /// Create (truncating) the log at `path`.
    pub fn create(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let file = File::create(&path)?;
        Ok(Self { path, file })
    }

    /// Open the log at `path` for appending, creating it if needed.
    pub fn append(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self { path, file })
    }

    /// Location of the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the run header.
    pub fn header(&mut self, base_name: &str, started: &str, output_dir: &Path) -> Result<()> {
        writeln!(self.file, "diskforged log for {base_name}")?;
        writeln!(self.file, "Started: {started}")?;
        writeln!(self.file, "Output directory: {}", output_dir.display())?;
        self.file.flush()?;
        Ok(())
    }

    /// Record a command line, quoted for display.
    pub fn command(&mut self, argv: &[String]) -> Result<()> {
        writeln!(self.file, "\n$ {}", display_command(argv))?;
        self.file.flush()?;
        Ok(())
    }

    /// Record one line of output or commentary.
    pub fn line(&mut self, line: &str) -> Result<()> {
        writeln!(self.file, "{line}")?;
        self.file.flush()?;
        Ok(())
    }

    /// Record a stage exit code.
    pub fn exit_code(&mut self, code: i32) -> Result<()> {
        self.line(&format!("[exit code: {code}]"))
    }

    /// Record a titled block of `key: value` lines.
    pub fn summary<K: AsRef<str>>(&mut self, entries: &[(K, String)]) -> Result<()> {
        writeln!(self.file, "\n===== Summary =====")?;
        for (key, value) in entries {
            writeln!(self.file, "{}: {value}", key.as_ref())?;
        }
        writeln!(self.file, "===================")?;
        self.file.flush()?;
        Ok(())
    }
}

/// Captured output of a short probe invocation.
#[derive(Debug, Clone)]
pub struct ProbeOutput {
    /// Exit code, or a launch-failure sentinel.
    pub exit_code: i32,
    /// Combined stdout and stderr.
    pub output: String,
}

impl ProbeOutput {
    /// Whether the process exited with code 0.
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Runs external commands from an explicit argument vector, never via a shell.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
    env: Vec<(String, String)>,
}

impl ProcessRunner {
    /// Create a runner that inherits the parent environment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an environment variable for every child process.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    fn command(&self, argv: &[String]) -> Option<Command> {
        let (program, args) = argv.split_first()?;
        let mut cmd = Command::new(program);
        cmd.args(args)
            .envs(self.env.iter().map(|(k, v)| (k, v)))
            .stdin(Stdio::null());
        Some(cmd)
    }

    /// Run `argv` to completion, streaming merged output to `log` and `on_line`.
    ///
    /// Launch failures are not errors: they are logged and reported as
    /// [`EXIT_NOT_FOUND`], [`EXIT_PERMISSION_DENIED`] or [`EXIT_LAUNCH_FAILED`].
    /// Only a failure to write the log itself is returned as `Err`.
    pub fn run(
        &self,
        argv: &[String],
        log: &mut RunLog,
        on_line: &mut dyn FnMut(&str),
    ) -> Result<i32> {
        log.command(argv)?;

        let Some(mut cmd) = self.command(argv) else {
            log.line("Executable not found: empty command line")?;
            return Ok(EXIT_NOT_FOUND);
        };
        let program = &argv[0];

        let (output, writer) = io::pipe()?;
        cmd.stdout(writer.try_clone()?).stderr(writer);
        let spawned = cmd.spawn();
        // The command holds the write ends; EOF only arrives once they are gone.
        drop(cmd);

        let mut child = match spawned {
            Ok(child) => child,
            Err(e) => {
                let code = launch_failure_code(&e);
                let text = match code {
                    EXIT_NOT_FOUND => format!("Executable not found: {program}\n{e}"),
                    EXIT_PERMISSION_DENIED => format!("Permission denied running: {program}\n{e}"),
                    _ => format!("Error launching {argv:?}: {e}"),
                };
                tracing::error!(program = %program, code, "launch failed: {e}");
                log.line(&text)?;
                return Ok(code);
            }
        };

        tracing::debug!(program = %program, pid = child.id(), "process started");

        let streamed = forward_lines(output, |line| {
            log.line(line)?;
            on_line(line);
            Ok(())
        });
        if let Err(ref e) = streamed {
            tracing::error!(program = %program, "run log write failed, stopping process: {e}");
            let _ = child.kill();
        }

        let status = child.wait()?;
        streamed?;
        let code = exit_code_of(status);
        log.exit_code(code)?;
        tracing::debug!(program = %program, code, "process exited");
        Ok(code)
    }

    /// Run a short capability probe and capture its combined output.
    pub fn probe(&self, argv: &[String]) -> ProbeOutput {
        let Some(mut cmd) = self.command(argv) else {
            return ProbeOutput {
                exit_code: EXIT_NOT_FOUND,
                output: "empty command line".to_string(),
            };
        };
        match cmd.output() {
            Ok(out) => {
                let mut output = String::from_utf8_lossy(&out.stdout).into_owned();
                output.push_str(&String::from_utf8_lossy(&out.stderr));
                ProbeOutput {
                    exit_code: exit_code_of(out.status),
                    output,
                }
            }
            Err(e) => ProbeOutput {
                exit_code: launch_failure_code(&e),
                output: format!("{}: {e}", argv[0]),
            },
        }
    }
}

/// Feed each line of `source` to `sink` until EOF or the first sink error.
fn forward_lines<R, F>(source: R, mut sink: F) -> Result<()>
where
    R: Read,
    F: FnMut(&str) -> Result<()>,
{
    let mut reader = BufReader::new(source);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) | Err(_) => return Ok(()),
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                sink(line.trim_end_matches(['\n', '\r']))?;
            }
        }
    }
}

/// Map a spawn error onto the shell's conventional exit codes.
pub fn launch_failure_code(err: &std::io::Error) -> i32 {
    match err.kind() {
        std::io::ErrorKind::NotFound => EXIT_NOT_FOUND,
        std::io::ErrorKind::PermissionDenied => EXIT_PERMISSION_DENIED,
        _ => EXIT_LAUNCH_FAILED,
    }
}

fn exit_code_of(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    -1
}
