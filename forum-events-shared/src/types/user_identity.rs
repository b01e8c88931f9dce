use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::Image;

/// A forum user's persisted display identity.
///
/// `ens_name` and `ens_avatar` are written only by identity hydration;
/// `reputation` belongs to the reputation indexer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub address: String,
    pub ens_name: Option<String>,
    pub ens_avatar: Option<Image>,
    pub reputation: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserIdentity {
    /// A freshly signed-up user with no hydrated identity.
    pub fn new(address: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            address: address.into(),
            ens_name: None,
            ens_avatar: None,
            reputation: 0,
            created_at: now,
            updated_at: now,
        }
    }
}
