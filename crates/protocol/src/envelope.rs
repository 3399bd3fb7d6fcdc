use serde::{Deserialize, Serialize};

/// Response envelope used by every JSON endpoint.
///
/// `code` mirrors the HTTP status; errors carry the error text in `data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub code: u16,
    pub msg: String,
    pub data: T,
}

impl<T> ApiResponse<T> {
    /// A `200` response with the given message.
    pub fn ok(msg: impl Into<String>, data: T) -> Self {
        Self {
            code: 200,
            msg: msg.into(),
            data,
        }
    }

    /// A response with an explicit status code.
    pub fn with_code(code: u16, msg: impl Into<String>, data: T) -> Self {
        Self {
            code,
            msg: msg.into(),
            data,
        }
    }
}

impl ApiResponse<String> {
    /// An error envelope whose `data` is the raw error text.
    pub fn error(code: u16, msg: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::with_code(code, msg, detail.into())
    }
}
