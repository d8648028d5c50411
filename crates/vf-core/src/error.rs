//! Error taxonomy for the transcoding pipeline.
//!
//! Every stage has its own error enum. They all funnel into [`Error`], which
//! remembers the originating stage via [`Error::stage`] so callers can tell a
//! codec problem from an unreadable upload without string matching.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;

/// Pipeline stage an error originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Media inspection (stat + ffprobe).
    Probe,
    /// Bitrate ladder computation.
    Plan,
    /// Encoder invocation and output verification.
    Encode,
    /// External tool plumbing outside of a specific stage.
    Tool,
    /// Configuration or caller input validation.
    Config,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Probe => "probe",
            Stage::Plan => "plan",
            Stage::Encode => "encode",
            Stage::Tool => "tool",
            Stage::Config => "config",
        };
        f.write_str(name)
    }
}

/// Failures while inspecting the input container.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    /// The file is missing, empty, or not a parseable media container.
    #[error("unreadable media file {}: {reason}", path.display())]
    Unreadable {
        /// File that was inspected.
        path: PathBuf,
        /// What went wrong.
        reason: String,
    },

    /// The container holds no usable video stream.
    #[error("no video stream found in {}", path.display())]
    NoVideoStream {
        /// File that was inspected.
        path: PathBuf,
    },

    /// The caller cancelled while the prober was running.
    #[error("probe of {} cancelled", path.display())]
    Cancelled {
        /// File that was being inspected.
        path: PathBuf,
    },
}

impl ProbeError {
    /// Convenience constructor for [`ProbeError::Unreadable`].
    pub fn unreadable(path: impl Into<PathBuf>, reason: impl fmt::Display) -> Self {
        ProbeError::Unreadable {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

/// Failures while computing the bitrate ladder.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlannerError {
    /// The probe reported a zero dimension.
    #[error("invalid source dimensions {width}x{height}")]
    InvalidSourceDimensions {
        /// Reported source width.
        width: u32,
        /// Reported source height.
        height: u32,
    },

    /// No rungs were requested or the reference table is empty.
    #[error("ladder has no rungs to plan")]
    EmptyLadder,
}

/// Failures while running an external tool.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// The tool was not found in the registry or on `PATH`.
    #[error("{tool} not found; is it installed and in PATH?")]
    NotFound {
        /// Tool name.
        tool: String,
    },

    /// The process could not be started.
    #[error("failed to spawn {tool}: {source}")]
    Spawn {
        /// Tool name.
        tool: String,
        /// Underlying spawn error.
        source: std::io::Error,
    },

    /// The process ran and exited unsuccessfully.
    #[error("{tool} exited with {}: {stderr}", describe_exit(.exit_code))]
    Exited {
        /// Tool name.
        tool: String,
        /// Exit code, `None` when terminated by a signal.
        exit_code: Option<i32>,
        /// Tail of the captured stderr.
        stderr: String,
    },

    /// The caller-supplied deadline expired and the process was killed.
    #[error("{tool} timed out after {after:?}")]
    TimedOut {
        /// Tool name.
        tool: String,
        /// Deadline that expired.
        after: Duration,
    },

    /// The caller cancelled and the process was killed.
    #[error("{tool} cancelled")]
    Cancelled {
        /// Tool name.
        tool: String,
    },

    /// I/O failure while talking to the process.
    #[error("I/O error waiting for {tool}: {source}")]
    Io {
        /// Tool name.
        tool: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

/// Failures while producing HLS renditions.
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    /// The encoder binary is not available.
    #[error("encoder not available: {tool}")]
    ToolNotFound {
        /// Tool name.
        tool: String,
    },

    /// The encoder exited unsuccessfully; `diagnostic` is its own stderr.
    #[error("encoder exited with {}: {diagnostic}", describe_exit(.exit_code))]
    ProcessFailed {
        /// Exit code, `None` when terminated by a signal.
        exit_code: Option<i32>,
        /// Encoder diagnostic output.
        diagnostic: String,
    },

    /// Directory creation, playlist writing, or process I/O failed.
    #[error("I/O error while {context}: {source}")]
    Io {
        /// What the encoder was doing.
        context: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The caller-supplied deadline expired.
    #[error("encoder timed out after {0:?}")]
    Timeout(Duration),

    /// The caller cancelled the run.
    #[error("encode cancelled")]
    Cancelled,

    /// A declared output is missing, empty, or references a missing segment.
    #[error("incomplete output: {0}")]
    IncompleteOutput(String),
}

impl EncodeError {
    /// Convenience constructor for [`EncodeError::Io`].
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        EncodeError::Io {
            context: context.into(),
            source,
        }
    }

    /// Convenience constructor for [`EncodeError::ProcessFailed`].
    pub fn process_failed(exit_code: Option<i32>, diagnostic: impl Into<String>) -> Self {
        EncodeError::ProcessFailed {
            exit_code,
            diagnostic: diagnostic.into(),
        }
    }
}

impl From<ToolError> for EncodeError {
    fn from(err: ToolError) -> Self {
        match err {
            ToolError::NotFound { tool } => EncodeError::ToolNotFound { tool },
            ToolError::Spawn { tool, source } => {
                EncodeError::io(format!("spawning {tool}"), source)
            }
            ToolError::Exited {
                exit_code, stderr, ..
            } => EncodeError::ProcessFailed {
                exit_code,
                diagnostic: stderr,
            },
            ToolError::TimedOut { after, .. } => EncodeError::Timeout(after),
            ToolError::Cancelled { .. } => EncodeError::Cancelled,
            ToolError::Io { tool, source } => {
                EncodeError::io(format!("waiting for {tool}"), source)
            }
        }
    }
}

/// Top-level error carrying the originating stage.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Media probing failed.
    #[error("Probe error: {0}")]
    Probe(#[from] ProbeError),

    /// Ladder planning failed.
    #[error("Planner error: {0}")]
    Planner(#[from] PlannerError),

    /// Encoding failed.
    #[error("Encode error: {0}")]
    Encode(#[from] EncodeError),

    /// An external tool failed outside of a specific stage.
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    /// Caller input or configuration was rejected.
    #[error("Validation error: {0}")]
    Validation(String),
}

impl Error {
    /// The pipeline stage this error originated from.
    pub fn stage(&self) -> Stage {
        match self {
            Error::Probe(_) => Stage::Probe,
            Error::Planner(_) => Stage::Plan,
            Error::Encode(_) => Stage::Encode,
            Error::Tool(_) => Stage::Tool,
            Error::Validation(_) => Stage::Config,
        }
    }

    /// Whether the run ended because the caller cancelled it.
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            Error::Probe(ProbeError::Cancelled { .. })
                | Error::Encode(EncodeError::Cancelled)
                | Error::Tool(ToolError::Cancelled { .. })
        )
    }

    /// Whether the run ended because the caller's deadline expired.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Error::Encode(EncodeError::Timeout(_)) | Error::Tool(ToolError::TimedOut { .. })
        )
    }

    /// Convenience constructor for [`Error::Validation`].
    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation(message.into())
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => "termination by signal".to_string(),
    }
}
