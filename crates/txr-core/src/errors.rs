/// Core error type for the transaction relay.
///
/// Adapter crates map their specific errors into this type so the dispatcher
/// boundary can log and convert every failure the same way.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("external error: {0}")]
    External(String),
}

/// Why a remote configuration fetch did not produce a snapshot.
///
/// None of these are fatal on their own: the previous snapshot stays in place.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ConfigFetchError {
    #[error("config API returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("config API request timed out")]
    Timeout,

    #[error("network error: {0}")]
    Network(String),

    #[error("malformed config response: {0}")]
    Malformed(String),
}

pub type Result<T> = std::result::Result<T, Error>;
