//! Placeholder expansion for user-editable command templates.
//!
//! Templates are free-form text such as
//! `{reader} read --drive={drive} --tracks={tracks} --revs={revs} {capture}`.
//! Expansion is strict: a placeholder outside the recognized set is an error
//! naming the placeholder, never left in the output. The expanded text is then
//! split into an argument vector; nothing here ever goes through a shell.

use crate::tools::{CONVERTER_DEFAULT_NAME, READER_DEFAULT_NAME};
use crate::{Error, Result};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

/// The recognized placeholder roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Placeholder {
    /// Path to the flux reader executable.
    Reader,
    /// Path to the image converter executable.
    Converter,
    /// Path of the raw flux capture written by the read stage.
    Capture,
    /// Output path for the converter, without extension.
    OutBase,
    /// Drive index on the reader.
    Drive,
    /// Track range specification passed to the reader.
    Tracks,
    /// Number of revolutions to sample per track.
    Revs,
}

impl Placeholder {
    /// All canonical placeholders, in display order.
    pub const ALL: [Placeholder; 7] = [
        Placeholder::Reader,
        Placeholder::Converter,
        Placeholder::Capture,
        Placeholder::OutBase,
        Placeholder::Drive,
        Placeholder::Tracks,
        Placeholder::Revs,
    ];

    /// The name used between braces in a template.
    pub fn name(&self) -> &'static str {
        match self {
            Placeholder::Reader => "reader",
            Placeholder::Converter => "converter",
            Placeholder::Capture => "capture",
            Placeholder::OutBase => "outbase",
            Placeholder::Drive => "drive",
            Placeholder::Tracks => "tracks",
            Placeholder::Revs => "revs",
        }
    }
}

impl fmt::Display for Placeholder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}}}", self.name())
    }
}

/// A historical placeholder name kept for templates written against older
/// releases.
#[derive(Debug, Clone, Copy)]
pub struct LegacyAlias {
    /// Name between braces.
    pub name: &'static str,
    /// Canonical placeholder whose value the alias takes when present.
    pub canonical: Placeholder,
    /// Value used when the canonical placeholder has no value.
    pub default: Option<&'static str>,
}

/// Legacy aliases, in display order.
pub const LEGACY_ALIASES: [LegacyAlias; 4] = [
    LegacyAlias {
        name: "gw",
        canonical: Placeholder::Reader,
        default: Some(READER_DEFAULT_NAME),
    },
    LegacyAlias {
        name: "sugar",
        canonical: Placeholder::Converter,
        default: Some(CONVERTER_DEFAULT_NAME),
    },
    LegacyAlias {
        name: "scp",
        canonical: Placeholder::Capture,
        default: None,
    },
    LegacyAlias {
        name: "dsk",
        canonical: Placeholder::OutBase,
        default: None,
    },
];

/// Every placeholder name a template may use: canonical first, then legacy.
pub fn recognized_names() -> Vec<String> {
    Placeholder::ALL
        .iter()
        .map(|p| p.name().to_string())
        .chain(LEGACY_ALIASES.iter().map(|a| a.name.to_string()))
        .collect()
}

/// Placeholder values for one imaging run.
///
/// # Example
///
/// ```
/// use diskforged_tools::template::{Placeholder, TemplateContext};
///
/// let ctx = TemplateContext::new()
///     .with_value(Placeholder::Drive, "0")
///     .with_value(Placeholder::Capture, "/tmp/Disk1.scp");
///
/// assert_eq!(ctx.expand("--drive={drive} {capture}")?, "--drive=0 /tmp/Disk1.scp");
/// assert_eq!(ctx.expand("{gw} info")?, "gw info");
/// # Ok::<(), diskforged_tools::Error>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct TemplateContext {
    values: BTreeMap<Placeholder, String>,
}

impl TemplateContext {
    /// Create an empty context. Only legacy defaults resolve until values are set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a placeholder value.
    pub fn with_value(mut self, placeholder: Placeholder, value: impl Into<String>) -> Self {
        self.set(placeholder, value);
        self
    }

    /// Set a placeholder to a path, rendered with `Path::display`.
    pub fn with_path(self, placeholder: Placeholder, path: &Path) -> Self {
        self.with_value(placeholder, path.display().to_string())
    }

    /// Set a placeholder value in place.
    pub fn set(&mut self, placeholder: Placeholder, value: impl Into<String>) {
        self.values.insert(placeholder, value.into());
    }

    /// Get a canonical placeholder value.
    pub fn get(&self, placeholder: Placeholder) -> Option<&str> {
        self.values.get(&placeholder).map(String::as_str)
    }

    /// The full name → value mapping used for expansion.
    ///
    /// Legacy aliases take their canonical placeholder's value when one is set,
    /// otherwise their own default. They never shadow a canonical value.
    pub fn merged(&self) -> BTreeMap<&'static str, String> {
        let mut map: BTreeMap<&'static str, String> = self
            .values
            .iter()
            .map(|(p, v)| (p.name(), v.clone()))
            .collect();

        for alias in &LEGACY_ALIASES {
            let value = self
                .values
                .get(&alias.canonical)
                .cloned()
                .or_else(|| alias.default.map(str::to_string));
            if let Some(value) = value {
                map.entry(alias.name).or_insert(value);
            }
        }

        map
    }

    /// Expand every placeholder in `template`.
    ///
    /// `{{` and `}}` produce literal braces.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownPlaceholder`] if the template names a placeholder that is
    /// not in the merged mapping, [`Error::MalformedTemplate`] on unbalanced braces.
    pub fn expand(&self, template: &str) -> Result<String> {
        let map = self.merged();
        let mut out = String::with_capacity(template.len());
        let mut chars = template.char_indices().peekable();

        while let Some((pos, c)) = chars.next() {
            match c {
                '{' => {
                    if matches!(chars.peek(), Some((_, '{'))) {
                        chars.next();
                        out.push('{');
                        continue;
                    }
                    let mut name = String::new();
                    let mut closed = false;
                    for (_, c) in chars.by_ref() {
                        if c == '}' {
                            closed = true;
                            break;
                        }
                        name.push(c);
                    }
                    if !closed {
                        return Err(Error::malformed(pos, "unterminated placeholder"));
                    }
                    match map.get(name.as_str()) {
                        Some(value) => out.push_str(value),
                        None => {
                            return Err(Error::UnknownPlaceholder {
                                name,
                                allowed: recognized_names(),
                            })
                        }
                    }
                }
                '}' => {
                    if matches!(chars.peek(), Some((_, '}'))) {
                        chars.next();
                        out.push('}');
                    } else {
                        return Err(Error::malformed(pos, "single '}' encountered"));
                    }
                }
                _ => out.push(c),
            }
        }

        Ok(out)
    }

    /// Expand `template` and split the result into an argument vector using the
    /// host platform's quoting rules.
    pub fn expand_args(&self, template: &str) -> Result<Vec<String>> {
        let expanded = self.expand(template)?;
        split_args(&expanded)
    }
}

/// Split a command line with the host platform's rules.
pub fn split_args(line: &str) -> Result<Vec<String>> {
    if cfg!(windows) {
        split_windows(line)
    } else {
        split_posix(line)
    }
}

/// POSIX shell word splitting (quotes and backslash escapes, no expansion).
pub fn split_posix(line: &str) -> Result<Vec<String>> {
    shlex::split(line).ok_or_else(|| Error::Unsplittable {
        line: line.to_string(),
    })
}

/// Whitespace splitting with double-quote grouping that leaves backslashes in
/// paths alone. `\"` yields a literal quote.
pub fn split_windows(line: &str) -> Result<Vec<String>> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\\' if chars.peek() == Some(&'"') => {
                chars.next();
                current.push('"');
                in_token = true;
            }
            '"' => {
                in_quotes = !in_quotes;
                in_token = true;
            }
            c if c.is_whitespace() && !in_quotes => {
                if in_token {
                    args.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            c => {
                current.push(c);
                in_token = true;
            }
        }
    }

    if in_quotes {
        return Err(Error::Unsplittable {
            line: line.to_string(),
        });
    }
    if in_token {
        args.push(current);
    }
    Ok(args)
}

/// Join an argument vector with POSIX quoting, for logs and previews only.
pub fn display_command(argv: &[String]) -> String {
    shlex::try_join(argv.iter().map(String::as_str)).unwrap_or_else(|_| argv.join(" "))
}
