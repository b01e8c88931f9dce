//! PostgreSQL implementation of the vote and user repositories.
//!
//! ## Database Tables
//!
//! - `votes`: per-voter ledger keyed by `(address, target_id, target_type)`
//! - `threads` / `comments`: forum content carrying the cached `votes` tally
//! - `users`: identities with `ens_name` and the JSONB `ens_avatar`
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use forum_events_shared::types::{Image, TargetType, UserIdentity};
use sqlx::types::Json;

use crate::{RepositoryError, UsersRepository, VotesRepository};

const RECOMPUTE_THREAD_TALLY: &str = r#"
    UPDATE threads
    SET votes = (
        SELECT COALESCE(SUM(value), 0)::BIGINT
        FROM votes
        WHERE target_id = $1 AND target_type = 'thread'
    )
    WHERE id = $1
    RETURNING votes
"#;

const RECOMPUTE_COMMENT_TALLY: &str = r#"
    UPDATE comments
    SET votes = (
        SELECT COALESCE(SUM(value), 0)::BIGINT
        FROM votes
        WHERE target_id = $1 AND target_type = 'comment'
    )
    WHERE id = $1
    RETURNING votes
"#;

#[derive(sqlx::FromRow)]
struct UserRow {
    address: String,
    ens_name: Option<String>,
    ens_avatar: Option<Json<Image>>,
    reputation: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<UserRow> for UserIdentity {
    fn from(row: UserRow) -> Self {
        UserIdentity {
            address: row.address,
            ens_name: row.ens_name,
            ens_avatar: row.ens_avatar.map(|avatar| avatar.0),
            reputation: row.reputation,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// PostgreSQL implementation of the forum repository.
///
/// Tallies are recomputed with a single `UPDATE ... RETURNING` so the read of
/// the ledger and the write of the cached value happen in one statement.
pub struct PostgresForumRepository {
    pool: sqlx::PgPool,
}

impl PostgresForumRepository {
    /// Creates a new PostgreSQL repository instance.
    ///
    /// # Arguments
    ///
    /// * `pool` - Configured PostgreSQL connection pool with the forum schema
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }

    /// Connects a new pool to the given database URL.
    pub async fn connect(database_url: &str) -> Result<Self, RepositoryError> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }
}

#[async_trait]
impl VotesRepository for PostgresForumRepository {
    async fn recompute_tally(
        &self,
        target_id: i64,
        target_type: TargetType,
    ) -> Result<i64, RepositoryError> {
        let query = match target_type {
            TargetType::Thread => RECOMPUTE_THREAD_TALLY,
            TargetType::Comment => RECOMPUTE_COMMENT_TALLY,
        };

        sqlx::query_scalar::<_, i64>(query)
            .bind(target_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(RepositoryError::TargetNotFound {
                target_id,
                target_type,
            })
    }
}

#[async_trait]
impl UsersRepository for PostgresForumRepository {
    async fn persist_identity(
        &self,
        address: &str,
        ens_name: Option<&str>,
        ens_avatar: Option<&Image>,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET ens_name = $2, ens_avatar = $3, updated_at = NOW()
            WHERE LOWER(address) = LOWER($1)
            "#,
        )
        .bind(address)
        .bind(ens_name)
        .bind(ens_avatar.cloned().map(Json))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::UserNotFound(address.to_string()));
        }
        Ok(())
    }

    async fn get_identity(&self, address: &str) -> Result<Option<UserIdentity>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT address, ens_name, ens_avatar, reputation, created_at, updated_at
            FROM users
            WHERE LOWER(address) = LOWER($1)
            "#,
        )
        .bind(address)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(UserIdentity::from))
    }
}
