//! # diskforged-tools
//!
//! Plumbing for driving an external floppy imaging toolchain.
//!
//! This crate provides functionality for:
//! - Expanding command templates with typed placeholders
//! - Locating the reader and converter executables
//! - Running a tool with live, logged, line-by-line output
//! - Finding the converter's output despite inconsistent naming
//! - Hashing artifacts with several algorithms in one pass
//!
//! ## Example
//!
//! ```no_run
//! use diskforged_tools::{ProcessRunner, RunLog, TemplateContext};
//! use diskforged_tools::template::Placeholder;
//!
//! let ctx = TemplateContext::new()
//!     .with_value(Placeholder::Reader, "gw")
//!     .with_value(Placeholder::Drive, "0");
//! let argv = ctx.expand_args("{reader} info --drive={drive}")?;
//!
//! let mut log = RunLog::create("/tmp/Disk1.log")?;
//! let code = ProcessRunner::new().run(&argv, &mut log, &mut |line| println!("{line}"))?;
//! println!("exit code {code}");
//! # Ok::<(), diskforged_tools::Error>(())
//! ```

mod error;
pub mod digest;
pub mod locate;
pub mod runner;
pub mod template;
pub mod tools;

// Re-exports
pub use digest::{compute_digests, DigestSet, HashAlgorithm};
pub use error::{Error, Result};
pub use locate::locate_output;
pub use runner::{ProcessRunner, ProbeOutput, RunLog};
pub use template::TemplateContext;
pub use tools::{ResolvedTool, ToolKind, ToolResolver};
