//! Outbound fetches for avatar content.
//!
//! Every network fetch goes through the sandboxing proxy as
//! `GET <proxy>?url=<target>`. Decentralized-storage schemes are rewritten to
//! gateway URLs first; `data:` URIs are decoded in process and never leave it.
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use percent_encoding::percent_decode_str;
use reqwest::header::CONTENT_TYPE;
use tracing::debug;

use crate::ResolveError;

/// Default cap on fetched bodies.
pub const DEFAULT_MAX_CONTENT_BYTES: usize = 10 * 1024 * 1024;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedContent {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

impl FetchedContent {
    /// The declared media type without parameters, lowercased.
    pub fn media_type(&self) -> Option<String> {
        self.content_type.as_deref().map(media_type)
    }

    /// Whether the content should be treated as JSON metadata rather than an image.
    pub fn is_json(&self) -> bool {
        match self.media_type() {
            Some(media) if media == "application/json" || media.ends_with("+json") => true,
            Some(media) if media.starts_with("image/") => false,
            _ => self
                .bytes
                .iter()
                .find(|b| !b.is_ascii_whitespace())
                .is_some_and(|b| *b == b'{'),
        }
    }
}

fn media_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

#[async_trait]
pub trait FetchProxy: Send + Sync {
    async fn fetch(&self, uri: &str) -> Result<FetchedContent, ResolveError>;
}

/// Gateway prefixes for decentralized-storage schemes. Each prefix is used
/// verbatim, so it should end with `/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    pub ipfs: String,
    pub ipns: String,
    pub arweave: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            ipfs: "https://ipfs.io/ipfs/".to_string(),
            ipns: "https://ipfs.io/ipns/".to_string(),
            arweave: "https://arweave.net/".to_string(),
        }
    }
}

/// Rewrites `ipfs://`, `ipns://` and `ar://` URIs to gateway URLs. HTTP(S)
/// URIs pass through unchanged.
pub fn rewrite_uri(uri: &str, gateways: &GatewayConfig) -> Result<String, ResolveError> {
    let (scheme, rest) = uri
        .split_once("://")
        .ok_or_else(|| ResolveError::UnsupportedScheme(uri.to_string()))?;

    match scheme.to_ascii_lowercase().as_str() {
        "http" | "https" => Ok(uri.to_string()),
        "ipfs" => {
            let path = rest.strip_prefix("ipfs/").unwrap_or(rest);
            Ok(format!("{}{path}", gateways.ipfs))
        }
        "ipns" => Ok(format!("{}{rest}", gateways.ipns)),
        "ar" => Ok(format!("{}{rest}", gateways.arweave)),
        other => Err(ResolveError::UnsupportedScheme(other.to_string())),
    }
}

/// Decodes an RFC 2397 `data:` URI.
pub fn decode_data_uri(uri: &str) -> Result<FetchedContent, ResolveError> {
    let invalid = || ResolveError::Fetch(format!("malformed data URI: {}", truncate(uri)));

    let body = uri.strip_prefix("data:").ok_or_else(invalid)?;
    let (meta, data) = body.split_once(',').ok_or_else(invalid)?;

    let (content_type, is_base64) = match meta.strip_suffix(";base64") {
        Some(content_type) => (content_type, true),
        None => (meta, false),
    };

    let bytes = if is_base64 {
        STANDARD.decode(data.trim()).map_err(|_| invalid())?
    } else {
        percent_decode_str(data).collect()
    };

    let content_type = if content_type.is_empty() {
        "text/plain".to_string()
    } else {
        content_type.to_string()
    };

    Ok(FetchedContent {
        bytes,
        content_type: Some(content_type),
    })
}

fn truncate(uri: &str) -> &str {
    let end = uri
        .char_indices()
        .nth(64)
        .map(|(idx, _)| idx)
        .unwrap_or(uri.len());
    &uri[..end]
}

/// [`FetchProxy`] that forwards requests to the sandboxing proxy over HTTP.
pub struct HttpFetchProxy {
    client: reqwest::Client,
    proxy_url: String,
    gateways: GatewayConfig,
    max_bytes: usize,
}

impl HttpFetchProxy {
    pub fn new(proxy_url: impl Into<String>, gateways: GatewayConfig) -> Result<Self, ResolveError> {
        let client = reqwest::Client::builder().timeout(DEFAULT_TIMEOUT).build()?;
        Ok(Self {
            client,
            proxy_url: proxy_url.into(),
            gateways,
            max_bytes: DEFAULT_MAX_CONTENT_BYTES,
        })
    }

    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }
}

#[async_trait]
impl FetchProxy for HttpFetchProxy {
    async fn fetch(&self, uri: &str) -> Result<FetchedContent, ResolveError> {
        if uri.get(..5).is_some_and(|p| p.eq_ignore_ascii_case("data:")) {
            let content = decode_data_uri(uri)?;
            if content.bytes.len() > self.max_bytes {
                return Err(ResolveError::TooLarge {
                    limit: self.max_bytes,
                });
            }
            return Ok(content);
        }

        let target = rewrite_uri(uri, &self.gateways)?;
        debug!(uri, target = %target, "Fetching through proxy");

        let mut response = self
            .client
            .get(&self.proxy_url)
            .query(&[("url", target.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ResolveError::Status {
                uri: uri.to_string(),
                status: status.as_u16(),
            });
        }

        if response
            .content_length()
            .is_some_and(|len| len > self.max_bytes as u64)
        {
            return Err(ResolveError::TooLarge {
                limit: self.max_bytes,
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        let mut bytes = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            if bytes.len() + chunk.len() > self.max_bytes {
                return Err(ResolveError::TooLarge {
                    limit: self.max_bytes,
                });
            }
            bytes.extend_from_slice(&chunk);
        }

        Ok(FetchedContent {
            bytes,
            content_type,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rewrite_uri_gateways() {
        let gateways = GatewayConfig::default();

        assert_eq!(
            rewrite_uri("ipfs://QmHash/avatar.png", &gateways).unwrap(),
            "https://ipfs.io/ipfs/QmHash/avatar.png"
        );
        assert_eq!(
            rewrite_uri("ipfs://ipfs/QmHash", &gateways).unwrap(),
            "https://ipfs.io/ipfs/QmHash"
        );
        assert_eq!(
            rewrite_uri("ipns://app.eth/me.png", &gateways).unwrap(),
            "https://ipfs.io/ipns/app.eth/me.png"
        );
        assert_eq!(
            rewrite_uri("ar://tx-id", &gateways).unwrap(),
            "https://arweave.net/tx-id"
        );
        assert_eq!(
            rewrite_uri("https://example.com/a.png", &gateways).unwrap(),
            "https://example.com/a.png"
        );
    }

    #[test]
    fn test_rewrite_uri_rejects_other_schemes() {
        let gateways = GatewayConfig::default();

        assert!(matches!(
            rewrite_uri("file:///etc/passwd", &gateways),
            Err(ResolveError::UnsupportedScheme(_))
        ));
        assert!(matches!(
            rewrite_uri("not a uri", &gateways),
            Err(ResolveError::UnsupportedScheme(_))
        ));
    }

    #[test]
    fn test_decode_base64_data_uri() {
        let content = decode_data_uri("data:image/svg+xml;base64,PHN2Zy8+").unwrap();

        assert_eq!(content.bytes, b"<svg/>");
        assert_eq!(content.content_type.as_deref(), Some("image/svg+xml"));
    }

    #[test]
    fn test_decode_percent_encoded_data_uri() {
        let content = decode_data_uri("data:,%7B%22image%22%3A1%7D").unwrap();

        assert_eq!(content.bytes, br#"{"image":1}"#);
        assert_eq!(content.content_type.as_deref(), Some("text/plain"));
    }

    #[test]
    fn test_decode_data_uri_keeps_invalid_escapes() {
        let content =
            decode_data_uri("data:image/svg+xml,%3Csvg%20width='100%25'%2G%3E%").unwrap();

        assert_eq!(content.bytes, b"<svg width='100%'%2G>%");
        assert_eq!(content.content_type.as_deref(), Some("image/svg+xml"));
    }

    #[test]
    fn test_decode_malformed_data_uri() {
        assert!(decode_data_uri("data:image/png;base64").is_err());
        assert!(decode_data_uri("data:image/png;base64,!!!").is_err());
    }

    #[test]
    fn test_is_json() {
        let json = FetchedContent {
            bytes: b"{}".to_vec(),
            content_type: Some("application/json; charset=utf-8".to_string()),
        };
        let sniffed = FetchedContent {
            bytes: b"  {\"image\":\"x\"}".to_vec(),
            content_type: Some("text/plain".to_string()),
        };
        let image = FetchedContent {
            bytes: b"{".to_vec(),
            content_type: Some("image/png".to_string()),
        };

        assert!(json.is_json());
        assert!(sniffed.is_json());
        assert!(!image.is_json());
    }

    #[tokio::test]
    async fn test_fetch_data_uri_stays_in_process() {
        let proxy = HttpFetchProxy::new("http://127.0.0.1:1/fetch", GatewayConfig::default())
            .unwrap();

        let content = proxy.fetch("data:image/png;base64,iVBORw0KGgo=").await.unwrap();

        assert_eq!(content.bytes, b"\x89PNG\r\n\x1a\n");
    }

    #[tokio::test]
    async fn test_fetch_data_uri_respects_limit() {
        let proxy = HttpFetchProxy::new("http://127.0.0.1:1/fetch", GatewayConfig::default())
            .unwrap()
            .with_max_bytes(4);

        let result = proxy.fetch("data:image/png;base64,iVBORw0KGgo=").await;

        assert!(matches!(result, Err(ResolveError::TooLarge { limit: 4 })));
    }
}
