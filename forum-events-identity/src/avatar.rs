//! Parsing of ENS `avatar` text records.
//!
//! A record is either a plain URI (`https://`, `ipfs://`, `ipns://`, `ar://`,
//! `data:`) or an NFT locator of the form
//! `eip155:<chain>/<erc721|erc1155>:<contract>/<tokenId>`.
use std::fmt;
use std::str::FromStr;

use alloy::primitives::{Address, U256};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::ResolveError;

const EIP155_PREFIX: &str = "eip155:";
const URI_SCHEMES: [&str; 6] = ["http://", "https://", "ipfs://", "ipns://", "ar://", "data:"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenStandard {
    Erc721,
    Erc1155,
}

impl FromStr for TokenStandard {
    type Err = ResolveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "erc721" => Ok(TokenStandard::Erc721),
            "erc1155" => Ok(TokenStandard::Erc1155),
            other => Err(ResolveError::UnsupportedTokenStandard(other.to_string())),
        }
    }
}

impl fmt::Display for TokenStandard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenStandard::Erc721 => write!(f, "erc721"),
            TokenStandard::Erc1155 => write!(f, "erc1155"),
        }
    }
}

/// An NFT used as an avatar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPointer {
    pub chain_id: u64,
    pub standard: TokenStandard,
    pub contract: Address,
    pub token_id: U256,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AvatarPointer {
    Token(TokenPointer),
    Uri(String),
}

impl AvatarPointer {
    /// Parses an avatar text record.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::InvalidAvatarPointer`] for malformed NFT locators
    /// and for values that carry no recognised URI scheme.
    pub fn parse(record: &str) -> Result<Self, ResolveError> {
        let record = record.trim();
        let invalid = || ResolveError::InvalidAvatarPointer(record.to_string());

        let lowered = record.to_ascii_lowercase();
        if lowered.starts_with(EIP155_PREFIX) {
            let locator = &record[EIP155_PREFIX.len()..];
            let (chain, asset) = locator.split_once('/').ok_or_else(invalid)?;
            let (namespace, token_id) = asset.split_once('/').ok_or_else(invalid)?;
            let (standard, contract) = namespace.split_once(':').ok_or_else(invalid)?;

            return Ok(AvatarPointer::Token(TokenPointer {
                chain_id: chain.parse().map_err(|_| invalid())?,
                standard: standard.parse()?,
                contract: contract.parse().map_err(|_| invalid())?,
                token_id: U256::from_str(token_id).map_err(|_| invalid())?,
            }));
        }

        if URI_SCHEMES.iter().any(|scheme| lowered.starts_with(scheme)) {
            Ok(AvatarPointer::Uri(record.to_string()))
        } else {
            Err(invalid())
        }
    }
}

/// Replaces the ERC-1155 `{id}` placeholder with the token id as 64
/// lowercase hex characters, without a `0x` prefix.
pub fn substitute_token_id(uri: &str, token_id: U256) -> String {
    uri.replace("{id}", &hex::encode(token_id.to_be_bytes::<32>()))
}

/// Extracts the image URI from NFT-style JSON metadata.
///
/// Looks at `image`, then `image_url`, then `image_data`. Raw `image_data`
/// SVG markup is wrapped into a base64 `data:` URI. Returns `None` when the
/// bytes are not a JSON object or carry no image field.
pub fn metadata_image_uri(bytes: &[u8]) -> Option<String> {
    let metadata: serde_json::Value = serde_json::from_slice(bytes).ok()?;
    let fields = metadata.as_object()?;

    let field = |name: &str| {
        fields
            .get(name)
            .and_then(serde_json::Value::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty())
    };

    if let Some(uri) = field("image").or_else(|| field("image_url")) {
        return Some(uri.to_string());
    }

    field("image_data").map(|data| {
        if data.starts_with("data:") {
            data.to_string()
        } else {
            format!("data:image/svg+xml;base64,{}", STANDARD.encode(data))
        }
    })
}
