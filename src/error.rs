use thiserror::Error;

use crate::{crypto::CipherError, meter::DataKind, roc::RocDateError};

/// Library error.
///
/// Every public failure path carries the human-readable status reported by the
/// vendor, so that a caller can decide whether to retry the whole session
/// (authentication failures), fix its configuration (unknown electric numbers),
/// or retry a single fetch.
#[derive(Debug, Error)]
pub enum Error {
    /// Login or reauthentication was rejected by the server or the transport.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Requested electric numbers are not among the AMI-enabled meters.
    #[error("electric numbers not available from the API: {missing:?}")]
    Configuration { missing: Vec<String> },

    /// The electric meter list could not be retrieved during login.
    #[error("failed to retrieve electric meters: {0}")]
    MemberList(#[source] FetchError),

    /// A single data-kind fetch failed.
    #[error("failed to fetch {kind}: {source}")]
    Fetch {
        kind: DataKind,
        #[source]
        source: FetchError,
    },

    /// One refresh batch accumulated one or more fetch failures.
    ///
    /// Partial successes from the same batch have already been committed to the
    /// meter registry.
    #[error("{n} refresh task(s) failed", n = errors.len())]
    BatchRefresh { errors: Vec<Error> },

    /// The HTTP client itself could not be built.
    #[error("failed to build the HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    #[error(transparent)]
    Cipher(#[from] CipherError),
}

impl Error {
    pub(crate) fn fetch(kind: DataKind, source: impl Into<FetchError>) -> Self {
        Self::Fetch { kind, source: source.into() }
    }
}

/// Failure of one vendor API call.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The vendor responded with a non-`"OK"` status label.
    #[error("{0}")]
    Status(String),

    #[error(transparent)]
    Transport(#[from] reqwest::Error),

    #[error(transparent)]
    Decode(#[from] serde_json::Error),

    #[error(transparent)]
    Date(#[from] RocDateError),

    /// A bearer-authenticated endpoint was called before login.
    #[error("not authenticated")]
    NotAuthenticated,
}
