//! In-memory implementation of the forum repository for tests and local runs.
//!
//! Mirrors the PostgreSQL semantics: tallies are recomputed from the ledger,
//! unknown targets and unknown users are errors.
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use chrono::Utc;
use forum_events_shared::types::{Image, TallyTarget, TargetType, UserIdentity, VoteValue};

use crate::{RepositoryError, UsersRepository, VotesRepository};

/// In-memory storage backend.
#[derive(Default)]
pub struct MemoryForumRepository {
    ledger: RwLock<HashMap<TallyTarget, HashMap<String, VoteValue>>>,
    tallies: RwLock<HashMap<TallyTarget, i64>>,
    users: RwLock<HashMap<String, UserIdentity>>,
}

impl MemoryForumRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a votable target with an initial cached tally of zero.
    pub fn create_target(&self, target_id: i64, target_type: TargetType) {
        self.tallies
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry((target_id, target_type))
            .or_insert(0);
    }

    /// Upserts a voter's ledger row, as the forum's write path does.
    pub fn record_vote(
        &self,
        voter_address: &str,
        target_id: i64,
        target_type: TargetType,
        value: VoteValue,
    ) {
        self.create_target(target_id, target_type);
        self.ledger
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry((target_id, target_type))
            .or_default()
            .insert(voter_address.to_lowercase(), value);
    }

    /// The cached tally, as the API would read it.
    pub fn tally(&self, target_id: i64, target_type: TargetType) -> Option<i64> {
        self.tallies
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(target_id, target_type))
            .copied()
    }

    /// Inserts a user row, as sign-up does.
    pub fn insert_user(&self, identity: UserIdentity) {
        self.users
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(identity.address.to_lowercase(), identity);
    }
}

#[async_trait]
impl VotesRepository for MemoryForumRepository {
    async fn recompute_tally(
        &self,
        target_id: i64,
        target_type: TargetType,
    ) -> Result<i64, RepositoryError> {
        let key = (target_id, target_type);
        let sum = self
            .ledger
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .map(|voters| voters.values().map(VoteValue::weight).sum())
            .unwrap_or(0);

        let mut tallies = self.tallies.write().unwrap_or_else(PoisonError::into_inner);
        match tallies.get_mut(&key) {
            Some(tally) => {
                *tally = sum;
                Ok(sum)
            }
            None => Err(RepositoryError::TargetNotFound {
                target_id,
                target_type,
            }),
        }
    }
}

#[async_trait]
impl UsersRepository for MemoryForumRepository {
    async fn persist_identity(
        &self,
        address: &str,
        ens_name: Option<&str>,
        ens_avatar: Option<&Image>,
    ) -> Result<(), RepositoryError> {
        let mut users = self.users.write().unwrap_or_else(PoisonError::into_inner);
        let user = users
            .get_mut(&address.to_lowercase())
            .ok_or_else(|| RepositoryError::UserNotFound(address.to_string()))?;

        user.ens_name = ens_name.map(str::to_string);
        user.ens_avatar = ens_avatar.cloned();
        user.updated_at = Utc::now();
        Ok(())
    }

    async fn get_identity(&self, address: &str) -> Result<Option<UserIdentity>, RepositoryError> {
        Ok(self
            .users
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&address.to_lowercase())
            .cloned())
    }
}
