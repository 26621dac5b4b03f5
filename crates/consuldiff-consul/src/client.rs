//! Consul HTTP KV client.

use crate::{ConsulError, ConsulResult, KvSource};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use consuldiff_snapshot::KvPair;
use reqwest::StatusCode;
use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Default request timeout for KV listings.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Turn a `CONSUL_HTTP_ADDR`-style address into a base URL.
///
/// Accepts `host:port` or a full `http(s)://` URL. A scheme-less address
/// uses https when `use_ssl` is set.
pub fn parse_address(address: &str, use_ssl: bool) -> ConsulResult<Url> {
    let address = address.trim();
    if address.is_empty() {
        return Err(ConsulError::invalid_address(address, "address is empty"));
    }

    let with_scheme = if address.contains("://") {
        address.to_string()
    } else if use_ssl {
        format!("https://{address}")
    } else {
        format!("http://{address}")
    };

    let url = Url::parse(&with_scheme)
        .map_err(|e| ConsulError::invalid_address(address, e.to_string()))?;

    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(ConsulError::invalid_address(
                address,
                format!("unsupported scheme {other:?}"),
            ))
        }
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(ConsulError::invalid_address(address, "missing host"));
    }

    Ok(url)
}

/// Connection settings for [`ConsulClient`].
#[derive(Clone)]
pub struct ConsulConfig {
    /// Agent base URL.
    pub address: Url,
    /// ACL token sent as `X-Consul-Token`.
    pub token: Option<String>,
    /// Accept any server certificate.
    pub tls_skip_verify: bool,
    /// Request timeout.
    pub timeout: Duration,
}

impl ConsulConfig {
    pub fn new(address: Url) -> Self {
        Self {
            address,
            token: None,
            tls_skip_verify: false,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_tls_skip_verify(mut self, skip: bool) -> Self {
        self.tls_skip_verify = skip;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl fmt::Debug for ConsulConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsulConfig")
            .field("address", &self.address.as_str())
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("tls_skip_verify", &self.tls_skip_verify)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// One element of a `GET /v1/kv/<prefix>?recurse` listing.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct KvEntry {
    key: String,
    #[serde(default)]
    flags: u64,
    #[serde(default)]
    value: Option<String>,
}

impl KvEntry {
    fn into_pair(self) -> ConsulResult<KvPair> {
        let value = match self.value {
            Some(encoded) => Some(STANDARD.decode(encoded.as_bytes()).map_err(|e| {
                ConsulError::invalid_response(format!("value of {:?} is not base64: {e}", self.key))
            })?),
            None => None,
        };
        Ok(KvPair {
            key: self.key,
            flags: self.flags,
            value,
        })
    }
}

/// Consul KV client.
pub struct ConsulClient {
    client: reqwest::Client,
    config: ConsulConfig,
}

impl ConsulClient {
    /// Create a new client.
    pub fn new(config: ConsulConfig) -> ConsulResult<Self> {
        if config.tls_skip_verify {
            warn!("TLS certificate verification is disabled for Consul requests");
        }

        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(config.tls_skip_verify)
            .timeout(config.timeout)
            .build()?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ConsulConfig {
        &self.config
    }

    /// Build the recursive listing URL for a prefix.
    fn kv_url(&self, prefix: &str) -> ConsulResult<Url> {
        let mut url = self.config.address.clone();
        let base = url.to_string();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| ConsulError::invalid_address(base, "address cannot be a base URL"))?;
            segments.pop_if_empty().push("v1").push("kv");
            for segment in prefix.trim_start_matches('/').split('/') {
                segments.push(segment);
            }
        }
        url.query_pairs_mut().append_pair("recurse", "true");
        Ok(url)
    }
}

#[async_trait]
impl KvSource for ConsulClient {
    async fn fetch(&self, prefix: &str) -> ConsulResult<Vec<KvPair>> {
        let url = self.kv_url(prefix)?;
        debug!(url = %url, "Listing Consul KV");

        let mut request = self.client.get(url);
        if let Some(token) = &self.config.token {
            request = request.header("X-Consul-Token", token);
        }

        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            debug!(prefix = %prefix, "No keys under prefix");
            return Ok(Vec::new());
        }

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ConsulError::Api {
                status: status.as_u16(),
                message: message.trim().to_string(),
            });
        }

        let entries: Vec<KvEntry> = response
            .json()
            .await
            .map_err(|e| ConsulError::invalid_response(e.to_string()))?;

        debug!(prefix = %prefix, keys = entries.len(), "Fetched Consul KV");
        entries.into_iter().map(KvEntry::into_pair).collect()
    }
}
