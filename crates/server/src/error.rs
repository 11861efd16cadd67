//! Structured errors for the toolshell server.
//!
//! Library failures arrive as `toolshell_core::Error`; these cover what only
//! the tool layer can get wrong.

use rmcp::model::{ErrorCode, ErrorData as McpError};

#[derive(Debug, thiserror::Error)]
pub enum ShellError {
    /// Invalid tool parameters (e.g., unknown request mode).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// Back was requested on the first history entry.
    #[error("NO_HISTORY: already at the oldest history entry")]
    NoHistory,

    /// A shell tool was called before `shell_open`.
    #[error("NO_PAGE: no page is open; call shell_open first")]
    NoPage,
}

impl From<ShellError> for McpError {
    fn from(err: ShellError) -> Self {
        let code = match &err {
            ShellError::InvalidInput(_) => -32602,
            ShellError::NoHistory => -32020,
            ShellError::NoPage => -32021,
        };

        McpError { code: ErrorCode(code), message: err.to_string().into(), data: None }
    }
}
