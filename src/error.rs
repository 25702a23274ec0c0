use std::io;
use std::num::ParseIntError;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors returned while talking to receiver-mock.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The base URL or an endpoint URL could not be parsed
    #[error("invalid receiver-mock url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The request never produced an HTTP response
    #[error("failed fetching {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: Box<ureq::Transport>,
    },

    /// receiver-mock answered with something other than 200
    #[error("received status code {status} in response to receiver request at {url:?}")]
    UnexpectedStatus { status: u16, url: String },

    /// The response body could not be read
    #[error("failed reading response body from {url}: {source}")]
    Body {
        url: String,
        #[source]
        source: io::Error,
    },

    /// A `/metrics-list` line without a usable `name:count` separator
    #[error("failed to parse metrics list line: {line:?}")]
    MalformedLine { line: String },

    /// A `/metrics-list` line whose count is not an integer
    #[error("invalid metric count in metrics list line {line:?}: {source}")]
    InvalidCount {
        line: String,
        #[source]
        source: ParseIntError,
    },

    /// The `/metrics-samples` body is not a JSON array of samples
    #[error("failed decoding metrics samples: {0}")]
    Decode(#[from] serde_json::Error),

    /// The tunnel to receiver-mock could not be opened
    #[error("tunnel error: {message}")]
    Tunnel {
        message: String,
        #[source]
        source: Option<io::Error>,
    },

    #[error(transparent)]
    Io(#[from] io::Error),
}
