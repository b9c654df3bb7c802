use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong between reading the input sheet and saving the output.
///
/// Deleted or missing posts are not errors; they come back as data with `deleted = true`.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid post URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: &'static str },

    #[error("missing credential {0} (set it in the environment or the env file)")]
    MissingCredentials(&'static str),

    #[error("authentication rejected: {0}")]
    Auth(String),

    #[error("rate limited after {attempts} attempts: {path}")]
    RateLimited { path: String, attempts: u32 },

    #[error("network error after {attempts} attempts on {path}: {message}")]
    TransientNetwork {
        path: String,
        attempts: u32,
        message: String,
    },

    #[error("HTTP {status} on {path}")]
    Http { path: String, status: u16 },

    #[error("unexpected response shape from {path}: {message}")]
    Decode { path: String, message: String },

    #[error("input file not found: {}", .0.display())]
    InputNotFound(PathBuf),

    #[error("cannot read {} as a spreadsheet: {message}", .path.display())]
    InputFormat { path: PathBuf, message: String },

    #[error("output directory does not exist for {}", .0.display())]
    OutputPath(PathBuf),

    #[error("failed writing {}: {message}", .path.display())]
    OutputWrite { path: PathBuf, message: String },

    /// The task handling this URL died before reporting back.
    #[error("processing aborted: {0}")]
    Aborted(String),
}

/// Flat tag for an [`Error`], used in the run summary and the failures sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidUrl,
    MissingCredentials,
    Auth,
    RateLimited,
    TransientNetworkError,
    Http,
    Decode,
    InputNotFound,
    InputFormatError,
    OutputPathError,
    OutputWrite,
    Aborted,
    PartialResult,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidUrl { .. } => ErrorKind::InvalidUrl,
            Error::MissingCredentials(_) => ErrorKind::MissingCredentials,
            Error::Auth(_) => ErrorKind::Auth,
            Error::RateLimited { .. } => ErrorKind::RateLimited,
            Error::TransientNetwork { .. } => ErrorKind::TransientNetworkError,
            Error::Http { .. } => ErrorKind::Http,
            Error::Decode { .. } => ErrorKind::Decode,
            Error::InputNotFound(_) => ErrorKind::InputNotFound,
            Error::InputFormat { .. } => ErrorKind::InputFormatError,
            Error::OutputPath(_) => ErrorKind::OutputPathError,
            Error::OutputWrite { .. } => ErrorKind::OutputWrite,
            Error::Aborted(_) => ErrorKind::Aborted,
        }
    }

    pub(crate) fn decode(path: &str, message: impl Into<String>) -> Self {
        Error::Decode {
            path: path.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::InvalidUrl => "InvalidUrl",
            ErrorKind::MissingCredentials => "MissingCredentials",
            ErrorKind::Auth => "Auth",
            ErrorKind::RateLimited => "RateLimited",
            ErrorKind::TransientNetworkError => "TransientNetworkError",
            ErrorKind::Http => "Http",
            ErrorKind::Decode => "Decode",
            ErrorKind::InputNotFound => "InputNotFound",
            ErrorKind::InputFormatError => "InputFormatError",
            ErrorKind::OutputPathError => "OutputPathError",
            ErrorKind::OutputWrite => "OutputWrite",
            ErrorKind::Aborted => "Aborted",
            ErrorKind::PartialResult => "PartialResult",
        };
        f.write_str(s)
    }
}
