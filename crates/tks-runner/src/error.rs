use std::io;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
/// Missing input detected before a run starts.
pub enum PreconditionError {
    #[error("no device selected")]
    /// No target device id.
    MissingDevice,

    #[error("no project open")]
    /// No project path.
    MissingProject,

    #[error("script has no executable commands")]
    /// The steps section contains no command lines.
    NoCommands,

    #[error("line is empty")]
    /// Single-line execution was asked to run a blank line.
    EmptyLine,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
/// Errors that reject a run request without starting it.
pub enum RunError {
    #[error("a script is already running")]
    /// Another run (or single-line run) is in progress.
    Busy,

    #[error(transparent)]
    /// Required execution context is missing.
    Precondition(#[from] PreconditionError),
}

#[derive(Debug, Error)]
/// Transport failures talking to the device collaborator.
pub enum DeviceError {
    #[error("failed to start `{program}`: {source}")]
    /// The collaborator process could not be spawned.
    Spawn {
        /// Program that was started.
        program: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    #[error("invalid collaborator output: {message}")]
    /// The collaborator printed something that is not a dispatch result.
    InvalidOutput {
        /// Parse error.
        message: String,
        /// Captured stdout.
        stdout: String,
    },

    #[error("I/O error: {0}")]
    /// Other I/O failure.
    Io(#[from] io::Error),
}
