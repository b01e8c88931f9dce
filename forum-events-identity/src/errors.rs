use thiserror::Error;

/// Represents errors that can occur while resolving a user's ENS identity.
///
/// None of these abort a batch; they terminate resolution for one address.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Invalid avatar pointer: {0}")]
    InvalidAvatarPointer(String),

    #[error("Unsupported token standard: {0}")]
    UnsupportedTokenStandard(String),

    #[error("Unsupported URI scheme: {0}")]
    UnsupportedScheme(String),

    #[error("Fetch error: {0}")]
    Fetch(String),

    #[error("Fetching {uri} returned status {status}")]
    Status { uri: String, status: u16 },

    #[error("Content exceeds {limit} bytes")]
    TooLarge { limit: usize },

    #[error("Metadata error: {0}")]
    Metadata(String),

    #[error("Not an image: {0}")]
    NotAnImage(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<alloy::contract::Error> for ResolveError {
    fn from(err: alloy::contract::Error) -> Self {
        Self::Rpc(err.to_string())
    }
}

impl From<reqwest::Error> for ResolveError {
    fn from(err: reqwest::Error) -> Self {
        Self::Fetch(err.to_string())
    }
}

impl From<std::io::Error> for ResolveError {
    fn from(err: std::io::Error) -> Self {
        Self::Storage(err.to_string())
    }
}
