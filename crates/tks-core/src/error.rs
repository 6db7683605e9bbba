use std::io;
use std::path::PathBuf;

use thiserror::Error;
use tks_lang::Keyword;

#[derive(Debug, Error)]
/// Errors produced while loading or saving a script file.
pub enum BufferError {
    #[error("failed to read {}: {source}", path.display())]
    /// The script file could not be read.
    Read {
        /// File that was being read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    #[error("failed to write {}: {source}", path.display())]
    /// The script file could not be written. The buffer stays dirty.
    Write {
        /// File that was being written.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
/// Errors produced by editor operations (text edits and block edits).
pub enum EditError {
    #[error("editor is locked while a script is running")]
    /// The editor is read-only because a run is in progress.
    Locked,

    #[error("another block edit is in progress")]
    /// A structural block edit was attempted while another one was still applying.
    Busy,

    #[error("command index {index} is out of range (script has {count} commands)")]
    /// A command index does not address an existing command (or insertion slot).
    IndexOutOfRange {
        /// Requested index.
        index: usize,
        /// Number of commands in the script.
        count: usize,
    },

    #[error("command {command} has no parameter named '{param}'")]
    /// `update_param` named a parameter the keyword does not define.
    UnknownParam {
        /// Keyword of the target command.
        command: Keyword,
        /// Requested parameter name.
        param: String,
    },

    #[error("parameter '{param}' must be set before later parameters")]
    /// A later positional parameter was set while an earlier one has no value and no default.
    MissingPrecedingParam {
        /// The earlier parameter that is missing.
        param: &'static str,
    },

    #[error("value '{value}' for parameter '{param}' would not survive re-parsing")]
    /// The value contains a `]`, a `,` outside braces or unbalanced braces, so the serialized
    /// line would parse back to different parameters.
    InvalidParamValue {
        /// The parameter being set.
        param: &'static str,
        /// The rejected value.
        value: String,
    },

    #[error("parameter '{param}' cannot be empty")]
    /// An empty value was given for a parameter that is followed by other parameters.
    EmptyParam {
        /// The parameter that was cleared.
        param: &'static str,
    },
}
