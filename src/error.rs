use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::token::Token;

/// Top-level failure surfaced by the library and the CLI.
#[derive(Debug, Error)]
pub enum NmfeError {
    #[error("IOError: {0}")]
    IO(#[from] std::io::Error),
    #[error(transparent)]
    Syntax(#[from] SyntaxError),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
    #[error("ConfigError: {0}")]
    Config(String),
    #[error("PatternError: {0}")]
    Pattern(#[from] regex::Error),
}

/// Failures raised while driving a loaded program.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuntimeError {
    #[error("end of program reached")]
    EndOfProgram,
    #[error("no choice has been selected for the pending prompt")]
    NoSelectionMade,
    #[error("selection {selection} is out of range for {count} choices")]
    InvalidSelection { selection: usize, count: usize },
    #[error("no choice prompt is awaiting a selection")]
    NoPendingChoice,
    #[error("visit {0} was never recorded")]
    InvalidContext(usize),
    #[error("step executed {0} instructions without producing a command")]
    RunawayStep(usize),
    #[error("the view is borrowed elsewhere")]
    ViewBusy,
}

/// Malformed script source. `line` and `position` are zero-based internally
/// and displayed one-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
    pub(crate) path: PathBuf,
    pub(crate) message: String,
    pub(crate) line: usize,
    pub(crate) position: usize,
}

impl std::error::Error for SyntaxError {}

impl SyntaxError {
    pub fn new(path: PathBuf, message: String, line: usize, position: usize) -> Self {
        Self {
            path,
            message,
            line,
            position,
        }
    }

    pub fn from_token(path: PathBuf, token: &Token, message: String) -> Self {
        Self {
            path,
            message,
            line: token.line,
            position: token.position,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// One-based line number of the offending source line.
    pub fn line(&self) -> usize {
        self.line + 1
    }
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "SyntaxError: {}\n  --> {}:{}:{}",
            self.message,
            self.path.display(),
            self.line + 1,
            self.position + 1,
        )
    }
}
