//! ENS lookups over an Ethereum JSON-RPC provider.
use alloy::primitives::{Address, B256, U256, address, keccak256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::sol;
use async_trait::async_trait;
use tracing::debug;

use crate::{ResolveError, TokenStandard};

/// The ENS registry, deployed at the same address on mainnet and testnets.
pub const ENS_REGISTRY: Address = address!("0x00000000000C2E074eC69A0dFb2997BA6C7d2e1e");

const AVATAR_KEY: &str = "avatar";

sol! {
    #[sol(rpc)]
    interface EnsRegistry {
        function resolver(bytes32 node) external view returns (address);
    }

    #[sol(rpc)]
    interface PublicResolver {
        function addr(bytes32 node) external view returns (address);
        function name(bytes32 node) external view returns (string memory);
        function text(bytes32 node, string calldata key) external view returns (string memory);
    }

    #[sol(rpc)]
    interface Erc721Metadata {
        function tokenURI(uint256 tokenId) external view returns (string memory);
    }

    #[sol(rpc)]
    interface Erc1155Metadata {
        function uri(uint256 id) external view returns (string memory);
    }
}

/// Read-only name service queries used during identity hydration.
#[async_trait]
pub trait NameResolver: Send + Sync {
    /// Returns the primary (reverse) name of `address`, if it has one that
    /// forward-resolves back to the same address.
    async fn resolve_name(&self, address: Address) -> Result<Option<String>, ResolveError>;

    /// Returns the `avatar` text record of `name`, if set.
    async fn resolve_avatar_pointer(&self, name: &str) -> Result<Option<String>, ResolveError>;

    /// Returns the metadata URI of an NFT, via `tokenURI` for ERC-721 and
    /// `uri` for ERC-1155.
    async fn resolve_token_metadata_uri(
        &self,
        standard: TokenStandard,
        contract: Address,
        token_id: U256,
    ) -> Result<String, ResolveError>;
}

/// Computes the EIP-137 namehash of a dot-separated name.
pub fn namehash(name: &str) -> B256 {
    let mut node = B256::ZERO;
    if name.is_empty() {
        return node;
    }

    for label in name.rsplit('.') {
        let label_hash = keccak256(label.as_bytes());
        let mut buf = [0u8; 64];
        buf[..32].copy_from_slice(node.as_slice());
        buf[32..].copy_from_slice(label_hash.as_slice());
        node = keccak256(buf);
    }
    node
}

/// The reverse-registrar node name of an address: `<hex>.addr.reverse`.
pub fn reverse_name(address: Address) -> String {
    format!("{}.addr.reverse", hex::encode(address.as_slice()))
}

/// [`NameResolver`] backed by the ENS registry contracts.
///
/// Names are lowercased before hashing; full ENSIP-15 normalization is not
/// applied.
pub struct EnsResolver {
    provider: DynProvider,
    registry: Address,
}

impl EnsResolver {
    pub fn new(provider: DynProvider) -> Self {
        Self {
            provider,
            registry: ENS_REGISTRY,
        }
    }

    /// Connects an HTTP provider to `rpc_url`.
    pub fn connect_http(rpc_url: &str) -> Result<Self, ResolveError> {
        let url = rpc_url
            .parse()
            .map_err(|e| ResolveError::Rpc(format!("invalid RPC url {rpc_url}: {e}")))?;
        let provider = ProviderBuilder::new().connect_http(url).erased();
        Ok(Self::new(provider))
    }

    /// Returns the chain id the provider is connected to.
    pub async fn chain_id(&self) -> Result<u64, ResolveError> {
        self.provider
            .get_chain_id()
            .await
            .map_err(|e| ResolveError::Rpc(e.to_string()))
    }

    async fn resolver_of(&self, node: B256) -> Result<Option<Address>, ResolveError> {
        let registry = EnsRegistry::new(self.registry, self.provider.clone());
        let resolver = registry.resolver(node).call().await?;
        Ok((resolver != Address::ZERO).then_some(resolver))
    }
}

#[async_trait]
impl NameResolver for EnsResolver {
    async fn resolve_name(&self, address: Address) -> Result<Option<String>, ResolveError> {
        let reverse_node = namehash(&reverse_name(address));
        let Some(resolver) = self.resolver_of(reverse_node).await? else {
            return Ok(None);
        };

        let name = PublicResolver::new(resolver, self.provider.clone())
            .name(reverse_node)
            .call()
            .await?;
        if name.is_empty() {
            return Ok(None);
        }

        // A reverse record is only trusted if the name points back at the address.
        let node = namehash(&name.to_lowercase());
        let Some(forward_resolver) = self.resolver_of(node).await? else {
            return Ok(None);
        };
        let forward = PublicResolver::new(forward_resolver, self.provider.clone())
            .addr(node)
            .call()
            .await?;

        if forward != address {
            debug!(%address, %name, %forward, "Reverse name does not forward-resolve");
            return Ok(None);
        }
        Ok(Some(name))
    }

    async fn resolve_avatar_pointer(&self, name: &str) -> Result<Option<String>, ResolveError> {
        let node = namehash(&name.to_lowercase());
        let Some(resolver) = self.resolver_of(node).await? else {
            return Ok(None);
        };

        let record = PublicResolver::new(resolver, self.provider.clone())
            .text(node, AVATAR_KEY.to_string())
            .call()
            .await?;
        let record = record.trim();
        Ok((!record.is_empty()).then(|| record.to_string()))
    }

    async fn resolve_token_metadata_uri(
        &self,
        standard: TokenStandard,
        contract: Address,
        token_id: U256,
    ) -> Result<String, ResolveError> {
        let uri = match standard {
            TokenStandard::Erc721 => {
                Erc721Metadata::new(contract, self.provider.clone())
                    .tokenURI(token_id)
                    .call()
                    .await?
            }
            TokenStandard::Erc1155 => {
                Erc1155Metadata::new(contract, self.provider.clone())
                    .uri(token_id)
                    .call()
                    .await?
            }
        };

        if uri.trim().is_empty() {
            return Err(ResolveError::Metadata(format!(
                "{standard} contract {contract} returned an empty URI for token {token_id}"
            )));
        }
        Ok(uri.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namehash_root() {
        assert_eq!(namehash(""), B256::ZERO);
    }

    #[test]
    fn test_namehash_known_vectors() {
        let eth: B256 = "0x93cdeb708b7545dc668eb9280176169d1c33cfd8ed6f04690a0bcc88a93fc4ae"
            .parse()
            .unwrap();
        let foo_eth: B256 = "0xde9b09fd7c5f901e23a3f19fecc54828e9c848539801e86591bd9801b019f84f"
            .parse()
            .unwrap();

        assert_eq!(namehash("eth"), eth);
        assert_eq!(namehash("foo.eth"), foo_eth);
    }

    #[test]
    fn test_reverse_name_is_lowercase_hex() {
        let address: Address = "0xd8dA6BF26964aF9D7eEd9e03E53415D37aA96045".parse().unwrap();

        assert_eq!(
            reverse_name(address),
            "d8da6bf26964af9d7eed9e03e53415d37aa96045.addr.reverse"
        );
    }
}
