use async_trait::async_trait;
use forum_events_shared::types::{Image, UserIdentity};

use crate::errors::RepositoryError;

/// Access to users' persisted display identities.
#[async_trait]
pub trait UsersRepository: Send + Sync {
    /// Replaces the ENS name and avatar of a user in a single update.
    ///
    /// `None` clears the corresponding field. The avatar is replaced wholesale.
    async fn persist_identity(
        &self,
        address: &str,
        ens_name: Option<&str>,
        ens_avatar: Option<&Image>,
    ) -> Result<(), RepositoryError>;

    /// Loads a user's identity, if the user exists.
    async fn get_identity(&self, address: &str) -> Result<Option<UserIdentity>, RepositoryError>;
}
