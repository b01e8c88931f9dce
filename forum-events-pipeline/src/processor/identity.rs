use std::sync::Arc;

use alloy::primitives::Address;
use forum_events_identity::{
    AvatarPointer, FetchProxy, ImagePipeline, NameResolver, metadata_image_uri,
    substitute_token_id,
};
use forum_events_repository::UsersRepository;
use forum_events_shared::types::Image;
use tracing::{debug, error, info, instrument, warn};

use crate::errors::HydrationError;
use crate::metrics::PipelineStats;

/// How far hydration of one address got.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HydrationOutcome {
    /// No verified name; name and avatar were cleared.
    Cleared,
    /// Name stored, no avatar record.
    NameOnly,
    /// Name and avatar stored.
    Hydrated,
}

/// Resolves and persists display identities for signed-in addresses.
///
/// Per address: reverse name → avatar record → optional NFT indirection →
/// metadata → image upload → one persist. Any failure stops that address
/// before persisting, so its previous identity stays as it was.
pub struct IdentityHydrator {
    names: Arc<dyn NameResolver>,
    fetcher: Arc<dyn FetchProxy>,
    images: Arc<dyn ImagePipeline>,
    users: Arc<dyn UsersRepository>,
    chain_id: u64,
    stats: Arc<PipelineStats>,
}

impl IdentityHydrator {
    pub fn new(
        names: Arc<dyn NameResolver>,
        fetcher: Arc<dyn FetchProxy>,
        images: Arc<dyn ImagePipeline>,
        users: Arc<dyn UsersRepository>,
        chain_id: u64,
        stats: Arc<PipelineStats>,
    ) -> Self {
        Self {
            names,
            fetcher,
            images,
            users,
            chain_id,
            stats,
        }
    }

    /// Hydrates each address in turn. Failures are logged per address.
    #[instrument(skip_all, fields(addresses = addresses.len()))]
    pub async fn process(&self, addresses: Vec<String>) {
        if addresses.is_empty() {
            return;
        }

        let total = addresses.len();
        for address in addresses {
            match self.hydrate(&address).await {
                Ok(HydrationOutcome::Cleared) => {
                    debug!(%address, "No ENS name, identity cleared");
                    PipelineStats::incr(&self.stats.identities_cleared);
                }
                Ok(outcome) => {
                    debug!(%address, ?outcome, "Hydrated identity");
                    PipelineStats::incr(&self.stats.identities_hydrated);
                }
                Err(HydrationError::Repository(e)) => {
                    error!(%address, error = %e, "Failed to persist identity");
                    PipelineStats::incr(&self.stats.hydration_failures);
                }
                Err(e) => {
                    warn!(%address, error = %e, "Failed to hydrate identity");
                    PipelineStats::incr(&self.stats.hydration_failures);
                }
            }
        }

        info!(addresses = total, "Identity hydration complete");
    }

    pub async fn hydrate(&self, address: &str) -> Result<HydrationOutcome, HydrationError> {
        let parsed: Address = address
            .parse()
            .map_err(|_| HydrationError::InvalidAddress(address.to_string()))?;

        let Some(name) = self.names.resolve_name(parsed).await? else {
            self.users.persist_identity(address, None, None).await?;
            return Ok(HydrationOutcome::Cleared);
        };

        let Some(record) = self.names.resolve_avatar_pointer(&name).await? else {
            self.users.persist_identity(address, Some(&name), None).await?;
            return Ok(HydrationOutcome::NameOnly);
        };

        let avatar = self.resolve_avatar(&record).await?;
        self.users
            .persist_identity(address, Some(&name), Some(&avatar))
            .await?;
        Ok(HydrationOutcome::Hydrated)
    }

    async fn resolve_avatar(&self, record: &str) -> Result<Image, HydrationError> {
        match AvatarPointer::parse(record)? {
            AvatarPointer::Token(token) => {
                if token.chain_id != self.chain_id {
                    return Err(HydrationError::ChainMismatch {
                        expected: self.chain_id,
                        found: token.chain_id,
                    });
                }

                let template = self
                    .names
                    .resolve_token_metadata_uri(token.standard, token.contract, token.token_id)
                    .await?;
                let metadata_uri = substitute_token_id(&template, token.token_id);
                self.avatar_image(&metadata_uri, true).await
            }
            AvatarPointer::Uri(uri) => self.avatar_image(&uri, false).await,
        }
    }

    /// Stored image for `uri`, which points either at an image or at a
    /// metadata document naming one.
    ///
    /// A stored image is returned without fetching. Otherwise `uri` is
    /// fetched once; an image is stored from those bytes, while metadata
    /// hands its nested locator to the image pipeline.
    async fn avatar_image(&self, uri: &str, is_token: bool) -> Result<Image, HydrationError> {
        if let Some(image) = self.images.cached_avatar(uri, is_token).await? {
            return Ok(image);
        }

        let content = self.fetcher.fetch(uri).await?;
        if !content.is_json() {
            return Ok(self.images.store_avatar(uri, is_token, content).await?);
        }

        let image_uri = metadata_image_uri(&content.bytes)
            .ok_or_else(|| HydrationError::MissingImage(uri.to_string()))?;
        Ok(self.images.upload_avatar(&image_uri, is_token).await?)
    }
}
