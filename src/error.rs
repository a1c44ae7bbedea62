use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    InvalidInput,
    NotFound,
    Io,
    /// Network failure or an unexpected HTTP status from a remote service.
    Transport,
    /// The remote service answered, but not with anything we can interpret.
    MalformedResponse,
    Internal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolveError {
    pub code: ErrorCode,
    pub message: String,
}

impl ResolveError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Transport, message)
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::MalformedResponse, message)
    }
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.code, self.message)
    }
}

impl Error for ResolveError {}

impl From<std::io::Error> for ResolveError {
    fn from(err: std::io::Error) -> Self {
        ResolveError::new(ErrorCode::Io, err.to_string())
    }
}

impl From<csv::Error> for ResolveError {
    fn from(err: csv::Error) -> Self {
        let code = if err.is_io_error() {
            ErrorCode::Io
        } else {
            ErrorCode::InvalidInput
        };
        ResolveError::new(code, err.to_string())
    }
}

impl From<serde_json::Error> for ResolveError {
    fn from(err: serde_json::Error) -> Self {
        ResolveError::new(ErrorCode::InvalidInput, err.to_string())
    }
}

pub type ResolveResult<T> = Result<T, ResolveError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_code() {
        let err = ResolveError::transport("HTTP 503");
        assert_eq!(err.to_string(), "Transport: HTTP 503");
    }

    #[test]
    fn test_io_error_maps_to_io_code() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: ResolveError = io.into();
        assert_eq!(err.code, ErrorCode::Io);
        assert!(err.message.contains("gone"));
    }

    #[test]
    fn test_csv_parse_error_is_invalid_input() {
        let mut rdr = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .from_reader("a\tb\n1\n".as_bytes());
        let err: ResolveError = rdr
            .records()
            .find_map(|r| r.err())
            .expect("unequal lengths")
            .into();
        assert_eq!(err.code, ErrorCode::InvalidInput);
    }
}
