//! Host client errors

use thiserror::Error;

/// Errors that can occur when talking to the host cluster through its CLIs
#[derive(Debug, Error)]
pub enum ClientError {
    /// The tool could not be started at all
    #[error("failed to execute {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    /// The tool ran and exited non-zero; `output` is everything it printed
    #[error("{tool} failed ({status})\nOutput:\n{output}")]
    CommandFailed {
        tool: String,
        status: String,
        output: String,
    },

    /// The requested object does not exist (yet)
    #[error("Not found: {0}")]
    NotFound(String),

    /// The tool's structured output did not match the expected shape
    #[error("failed to parse {what}: {source}")]
    Parse {
        what: String,
        #[source]
        source: serde_json::Error,
    },

    /// Output was not valid UTF-8 where text was expected
    #[error("{0} printed non UTF-8 output")]
    Encoding(String),
}

impl ClientError {
    /// Whether the error means "object absent" rather than a failure.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Whether the error came from malformed tool output.
    #[must_use]
    pub fn is_parse(&self) -> bool {
        matches!(self, Self::Parse { .. } | Self::Encoding(_))
    }
}
