//! Core error type shared by the watcher runtime and the web service.
//!
//! HTTP-specific mapping to status codes lives in `crate::web::error`.

use derive_more::From;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, From)]
pub enum Error {
    #[from]
    Sqlx(sqlx::Error),

    #[from]
    Reqwest(reqwest::Error),

    #[from]
    Io(std::io::Error),

    #[from]
    Json(serde_json::Error),

    #[from]
    Join(tokio::task::JoinError),

    #[from]
    Addr(std::net::AddrParseError),

    /// Catch-all for domain-level failures that don't map to an external
    /// error type: malformed interval strings, unparseable probe stdout,
    /// missing probe types, etc.
    Message(String),
}

impl Error {
    pub fn msg(text: impl Into<String>) -> Self {
        Self::Message(text.into())
    }
}

impl core::fmt::Display for Error {
    fn fmt(&self, fmt: &mut core::fmt::Formatter) -> core::result::Result<(), core::fmt::Error> {
        match self {
            Self::Sqlx(e) => write!(fmt, "store error: {e}"),
            Self::Reqwest(e) => write!(fmt, "http error: {e}"),
            Self::Io(e) => write!(fmt, "io error: {e}"),
            Self::Json(e) => write!(fmt, "json error: {e}"),
            Self::Join(e) => write!(fmt, "task join error: {e}"),
            Self::Addr(e) => write!(fmt, "address parse error: {e}"),
            Self::Message(msg) => write!(fmt, "{msg}"),
        }
    }
}

impl std::error::Error for Error {}
