//! Error types shared by the API client and the session controller.

use std::path::PathBuf;

use reqwest::StatusCode;

/// Failure talking to the document graph API.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The server answered with a non-success status.
    #[error("{}", rejected_message(.status, .detail))]
    Rejected {
        status: StatusCode,
        /// `detail` field of the JSON error body, when the server sent one
        detail: Option<String>,
        /// Machine-readable error code, when the server sent one
        code: Option<String>,
    },

    /// Connection, TLS or body transfer failure.
    #[error(transparent)]
    Transport(#[from] reqwest::Error),

    /// The body was not the JSON shape we expected.
    #[error("invalid response body: {0}")]
    Decode(#[from] serde_json::Error),

    /// A local file could not be read before sending it.
    #[error("could not read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn rejected_message(status: &StatusCode, detail: &Option<String>) -> String {
    match detail.as_deref() {
        Some(detail) if !detail.trim().is_empty() => detail.to_string(),
        _ => format!("HTTP error! status: {}", status.as_u16()),
    }
}

impl ApiError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::Rejected { status, .. } => Some(*status),
            ApiError::Transport(err) => err.status(),
            _ => None,
        }
    }

    pub fn code(&self) -> Option<&str> {
        match self {
            ApiError::Rejected { code, .. } => code.as_deref(),
            _ => None,
        }
    }
}

/// Why a chat message was not sent. No request is made in either case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SendRejected {
    #[error("Please enter a message.")]
    Empty,
    #[error("Please wait for the current answer to finish.")]
    Busy,
}

/// Why a file cannot be uploaded. Detected before any request is made.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FileRejected {
    #[error("Please select a PDF or text file.")]
    UnsupportedType { media_type: String },
    #[error("Please select a file first.")]
    NothingSelected,
}
