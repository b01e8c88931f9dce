//! Dependency initialization and wiring for the forum events pipeline.
use std::sync::Arc;
use std::time::Duration;

use forum_events_identity::{AvatarImagePipeline, EnsResolver, HttpFetchProxy, LocalObjectStore};
use forum_events_pipeline::{
    IdentityHydrator, Orchestrator, PipelineStats, RedisEventLog, VoteAggregator,
};
use forum_events_repository::PostgresForumRepository;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::AppError;
use crate::config::{ConnectionMode, Settings};

/// Container for all initialized dependencies.
pub struct Dependencies {
    /// The configured orchestrator ready to run.
    pub orchestrator: Orchestrator,
}

impl Dependencies {
    /// Connects every collaborator and builds the orchestrator.
    ///
    /// The database connection honours the configured [`ConnectionMode`].
    /// Failing to reach Redis is always fatal.
    pub async fn new(settings: Settings) -> Result<Self, AppError> {
        info!(
            group = %settings.pipeline.group,
            consumer = %settings.pipeline.consumer_name,
            votes_stream = %settings.pipeline.votes_stream,
            signins_stream = %settings.pipeline.signins_stream,
            connection_mode = ?settings.database_connection_mode,
            chain_id = settings.pipeline.chain_id,
            "Initializing dependencies"
        );

        let repository = Arc::new(
            Self::connect_to_database(
                &settings.database_url,
                settings.database_connection_mode,
                settings.database_retry_interval,
            )
            .await?,
        );
        info!("Database connection established");

        let log = Arc::new(
            RedisEventLog::connect(&settings.redis_url, settings.pipeline.read_block).await?,
        );

        let names = Arc::new(EnsResolver::connect_http(&settings.eth_rpc_url)?);
        match names.chain_id().await {
            Ok(chain_id) if chain_id != settings.pipeline.chain_id => warn!(
                rpc_chain_id = chain_id,
                configured_chain_id = settings.pipeline.chain_id,
                "RPC endpoint is on a different chain than CHAIN_ID"
            ),
            Ok(_) => {}
            Err(e) => warn!(error = %e, "Could not query RPC chain id"),
        }

        let fetcher = Arc::new(HttpFetchProxy::new(
            settings.fetch_proxy_url.clone(),
            settings.gateways.clone(),
        )?);
        let store = Arc::new(LocalObjectStore::new(
            settings.avatar_storage_dir.clone(),
            settings.avatar_public_url.clone(),
        ));
        let images = Arc::new(AvatarImagePipeline::new(fetcher.clone(), store));

        let stats = Arc::new(PipelineStats::new());
        let votes = VoteAggregator::new(
            repository.clone(),
            settings.pipeline.tally_concurrency,
            stats.clone(),
        );
        let identities = IdentityHydrator::new(
            names,
            fetcher,
            images,
            repository,
            settings.pipeline.chain_id,
            stats.clone(),
        );

        let orchestrator = Orchestrator::new(log, votes, identities, settings.pipeline, stats);

        Ok(Self { orchestrator })
    }

    /// Connect to PostgreSQL with retry logic based on connection mode.
    async fn connect_to_database(
        url: &str,
        mode: ConnectionMode,
        retry_interval: Duration,
    ) -> Result<PostgresForumRepository, AppError> {
        loop {
            match PostgresForumRepository::connect(url).await {
                Ok(repository) => return Ok(repository),
                Err(e) => match mode {
                    ConnectionMode::FailFast => return Err(e.into()),
                    ConnectionMode::Retry => {
                        warn!(
                            error = %e,
                            retry_interval_secs = retry_interval.as_secs(),
                            "Failed to connect to the database, retrying..."
                        );
                        sleep(retry_interval).await;
                    }
                },
            }
        }
    }
}
