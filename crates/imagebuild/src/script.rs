//! Shell script lines built from argument vectors.
//!
//! Every argument is quoted unless it is explicitly marked as a CI variable
//! expansion, so configuration values and credentials cannot break out of
//! their argument.

use crate::error::{Error, Result};
use std::fmt::Write as _;

/// One argument of a script line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptArg {
    /// Literal value, shell-quoted when rendered
    Literal(String),
    /// Literal value whose prefix is a CI variable expansion such as
    /// `${CI_PROJECT_DIR}`; only `suffix` is quoted
    Expand {
        /// CI variable name, rendered as `${NAME}`
        variable: String,
        /// Literal text following the expansion
        suffix: String,
    },
}

/// A single shell command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptLine {
    args: Vec<ScriptArg>,
}

impl ScriptLine {
    /// Start a line with `program`.
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            args: vec![ScriptArg::Literal(program.into())],
        }
    }

    /// Append a literal argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(ScriptArg::Literal(arg.into()));
        self
    }

    /// Append several literal arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args
            .extend(args.into_iter().map(|a| ScriptArg::Literal(a.into())));
        self
    }

    /// Append `${variable}suffix`.
    #[must_use]
    pub fn expand(mut self, variable: impl Into<String>, suffix: impl Into<String>) -> Self {
        self.args.push(ScriptArg::Expand {
            variable: variable.into(),
            suffix: suffix.into(),
        });
        self
    }

    /// Append `flag value` as two literal arguments.
    #[must_use]
    pub fn flag(self, flag: &str, value: impl Into<String>) -> Self {
        self.arg(flag).arg(value)
    }

    /// Render the line for a POSIX shell.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnquotableArgument`] for arguments containing NUL.
    pub fn render(&self) -> Result<String> {
        let mut line = String::new();
        for (index, arg) in self.args.iter().enumerate() {
            if index > 0 {
                line.push(' ');
            }
            match arg {
                ScriptArg::Literal(value) => line.push_str(&quote(value)?),
                ScriptArg::Expand { variable, suffix } => {
                    let _ = write!(line, "\"${{{variable}}}\"");
                    if !suffix.is_empty() {
                        line.push_str(&quote(suffix)?);
                    }
                }
            }
        }
        Ok(line)
    }
}

fn quote(value: &str) -> Result<String> {
    shlex::try_quote(value)
        .map(|quoted| quoted.into_owned())
        .map_err(|_| Error::UnquotableArgument {
            argument: value.to_string(),
        })
}

/// Render several lines.
///
/// # Errors
///
/// Fails like [`ScriptLine::render`].
pub fn render_all(lines: &[ScriptLine]) -> Result<Vec<String>> {
    lines.iter().map(ScriptLine::render).collect()
}
