//! ENS identity resolution for forum users.
//!
//! This crate provides:
//! - [`NameResolver`] trait and the on-chain [`EnsResolver`] for reverse names,
//!   avatar text records and NFT metadata URIs
//! - [`AvatarPointer`] parsing of ENS avatar records, including NFT locators
//! - [`FetchProxy`] trait and [`HttpFetchProxy`], which routes every outbound
//!   fetch through a sandboxing proxy and rewrites decentralized-storage URIs
//! - [`ImagePipeline`] trait and [`AvatarImagePipeline`], which stores avatars
//!   under a deterministic key so repeated hydration is a cache hit

pub mod avatar;
pub mod ens;
pub mod errors;
pub mod images;
pub mod proxy;

pub use avatar::{AvatarPointer, TokenPointer, TokenStandard, metadata_image_uri, substitute_token_id};
pub use ens::{EnsResolver, NameResolver, namehash};
pub use errors::ResolveError;
pub use images::{AvatarImagePipeline, ImagePipeline, LocalObjectStore, MemoryObjectStore, ObjectStore};
pub use proxy::{FetchProxy, FetchedContent, GatewayConfig, HttpFetchProxy};

pub type Result<T> = std::result::Result<T, ResolveError>;
