//! Error types for diskforged-tools.

use std::path::PathBuf;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while preparing or locating external tool invocations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A command template referenced a placeholder outside the recognized set.
    #[error("unknown placeholder '{{{name}}}' in command template; allowed placeholders: {}", format_allowed(allowed))]
    UnknownPlaceholder { name: String, allowed: Vec<String> },

    /// A command template has unbalanced braces.
    #[error("malformed command template at byte {position}: {message}")]
    MalformedTemplate { position: usize, message: String },

    /// An expanded command line could not be split into arguments.
    #[error("cannot split command line into arguments (unbalanced quotes?): {line}")]
    Unsplittable { line: String },

    /// The tool was neither on the search path nor at any fallback location.
    #[error("'{tool}' not found; provide a path")]
    ToolNotFound { tool: String },

    /// A user-supplied override did not point at an executable file.
    #[error("override path for '{tool}' is not executable: {}", path.display())]
    OverrideNotExecutable { tool: String, path: PathBuf },

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid input provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

fn format_allowed(allowed: &[String]) -> String {
    allowed
        .iter()
        .map(|name| format!("{{{name}}}"))
        .collect::<Vec<_>>()
        .join(" ")
}

impl Error {
    /// Create a tool not found error.
    pub fn tool_not_found(tool: impl Into<String>) -> Self {
        Self::ToolNotFound { tool: tool.into() }
    }

    /// Create an override-not-executable error.
    pub fn override_not_executable(tool: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::OverrideNotExecutable {
            tool: tool.into(),
            path: path.into(),
        }
    }

    /// Create a malformed template error.
    pub fn malformed(position: usize, message: impl Into<String>) -> Self {
        Self::MalformedTemplate {
            position,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_placeholder_message_lists_names() {
        let err = Error::UnknownPlaceholder {
            name: "bogus".to_string(),
            allowed: vec!["drive".to_string(), "gw".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("'{bogus}'"), "{msg}");
        assert!(msg.contains("{drive} {gw}"), "{msg}");
    }
}
