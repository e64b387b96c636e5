use std::path::PathBuf;

use reqwest::StatusCode;

/// Everything that can go wrong while building the client or gathering
/// one sub-resource.
///
/// Errors are reported per sub-resource pass; none of them is fatal to a
/// poll cycle.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The server answered 404: the resource is not configured on this
    /// server (or not supported by its version).
    #[error("{url} not found")]
    NotFound { url: String },

    #[error("error making HTTP request to {url:?}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP status {status}")]
    UnexpectedStatus { url: String, status: StatusCode },

    #[error("{url} returned unexpected content type {content_type}")]
    UnexpectedContentType { url: String, content_type: String },

    #[error("decoding response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("unable to parse address {url:?}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("reading TLS material from {}: {source}", .path.display())]
    TlsFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("creating client failed: {0}")]
    ClientBuild(#[source] reqwest::Error),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    /// The sentinel the poller suppresses: optional features that are
    /// not enabled on the polled server surface as 404s.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
