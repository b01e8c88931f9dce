use serde::{Deserialize, Serialize};

/// Marks that an address just authenticated and its display identity may be
/// stale or absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigninEvent {
    pub address: String,
}

impl SigninEvent {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
        }
    }

    pub fn dedup_key(&self) -> String {
        self.address.clone()
    }
}
