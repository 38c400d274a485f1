//! Consul HTTP client.
//!
//! The engine talks to the store through the [`KvStore`] trait so runs can
//! be exercised against an in-memory store. [`ConsulClient`] is the
//! production implementation on top of blocking `reqwest`.

use crate::config::{SyncConfig, TlsConfig};
use crate::error::{SyncError, SyncResult};
use kvsync_protocol::{Batch, KvPair, LiveDataset};
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Certificate, Identity, StatusCode};
use std::sync::Arc;
use tracing::debug;

/// Header carrying the Consul ACL token.
pub const TOKEN_HEADER: &str = "X-Consul-Token";

/// Read and transactional-write access to a KV store.
pub trait KvStore: Send + Sync {
    /// Reads every key under `base_path`.
    ///
    /// A prefix with no keys yields an empty dataset, not an error.
    fn fetch(&self, base_path: &str) -> SyncResult<LiveDataset>;

    /// Applies one batch atomically.
    fn commit(&self, batch: &Batch) -> SyncResult<()>;
}

impl<S: KvStore + ?Sized> KvStore for Arc<S> {
    fn fetch(&self, base_path: &str) -> SyncResult<LiveDataset> {
        (**self).fetch(base_path)
    }

    fn commit(&self, batch: &Batch) -> SyncResult<()> {
        (**self).commit(batch)
    }
}

/// Blocking Consul client. One instance is reused for the fetch and every
/// transaction of a run.
#[derive(Debug, Clone)]
pub struct ConsulClient {
    base_url: String,
    token: Option<String>,
    client: Client,
}

impl ConsulClient {
    /// Builds a client from the engine configuration.
    pub fn new(config: &SyncConfig) -> SyncResult<Self> {
        let mut builder = Client::builder().timeout(config.timeout);

        if let Some(tls) = &config.tls {
            let (identity, ca) = load_tls(tls)?;
            builder = builder.identity(identity);
            if let Some(ca) = ca {
                builder = builder.add_root_certificate(ca);
            }
        }

        let client = builder
            .build()
            .map_err(|e| SyncError::BadConfig(format!("http client: {}", e)))?;

        Ok(Self {
            base_url: config.consul_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            client,
        })
    }

    /// Returns the base URL without trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// URL of a recursive read under `base_path`.
    pub fn kv_url(&self, base_path: &str) -> String {
        let prefix = base_path.trim_matches('/');
        if prefix.is_empty() {
            format!("{}/v1/kv/?recurse=true", self.base_url)
        } else {
            format!("{}/v1/kv/{}/?recurse=true", self.base_url, prefix)
        }
    }

    /// URL of the transaction endpoint.
    pub fn txn_url(&self) -> String {
        format!("{}/v1/txn", self.base_url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.header(TOKEN_HEADER, token),
            None => request,
        }
    }
}

impl KvStore for ConsulClient {
    fn fetch(&self, base_path: &str) -> SyncResult<LiveDataset> {
        let url = self.kv_url(base_path);
        debug!(url = %url, "fetching live dataset");

        let response = self
            .authorize(self.client.get(&url))
            .send()
            .map_err(|e| SyncError::ConnectionFailure(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            debug!("no keys under base path, starting from an empty store");
            return Ok(LiveDataset::new());
        }
        if status.as_u16() >= 400 {
            return Err(SyncError::ConnectionFailure(format!(
                "invalid response from consul: {}",
                status
            )));
        }

        let body = response
            .bytes()
            .map_err(|e| SyncError::ReadFailure(e.to_string()))?;
        let pairs: Vec<KvPair> =
            serde_json::from_slice(&body).map_err(|e| SyncError::DecodeFailure(e.to_string()))?;

        Ok(pairs
            .into_iter()
            .map(|pair| (pair.key, pair.value.unwrap_or_default()))
            .collect())
    }

    fn commit(&self, batch: &Batch) -> SyncResult<()> {
        debug!(
            operations = batch.len(),
            bytes = batch.payload_size(),
            "sending transaction"
        );

        let response = self
            .authorize(self.client.put(self.txn_url()))
            .header(CONTENT_TYPE, "application/json")
            .body(batch.payload())
            .send()
            .map_err(|e| SyncError::ConnectionFailure(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .map_err(|e| SyncError::ReadFailure(e.to_string()))?;
            return Err(SyncError::TransactionFailure {
                status: status.as_u16(),
                body,
            });
        }

        Ok(())
    }
}

fn load_tls(tls: &TlsConfig) -> SyncResult<(Identity, Option<Certificate>)> {
    let read = |path: &std::path::Path| {
        std::fs::read(path)
            .map_err(|e| SyncError::BadConfig(format!("cannot read {}: {}", path.display(), e)))
    };

    let cert = read(&tls.cert_file)?;
    let key = read(&tls.key_file)?;
    let identity = Identity::from_pkcs8_pem(&cert, &key)
        .map_err(|e| SyncError::BadConfig(format!("invalid client certificate: {}", e)))?;

    let ca = match &tls.ca_file {
        Some(path) => Some(
            Certificate::from_pem(&read(path)?)
                .map_err(|e| SyncError::BadConfig(format!("invalid CA certificate: {}", e)))?,
        ),
        None => None,
    };

    Ok((identity, ca))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(url: &str) -> ConsulClient {
        ConsulClient::new(&SyncConfig::new(url)).unwrap()
    }

    #[test]
    fn urls() {
        let consul = client("http://consul:8500/");
        assert_eq!(consul.base_url(), "http://consul:8500");
        assert_eq!(consul.kv_url(""), "http://consul:8500/v1/kv/?recurse=true");
        assert_eq!(consul.kv_url("/"), "http://consul:8500/v1/kv/?recurse=true");
        assert_eq!(
            consul.kv_url("apps/web/"),
            "http://consul:8500/v1/kv/apps/web/?recurse=true"
        );
        assert_eq!(consul.txn_url(), "http://consul:8500/v1/txn");
    }

    #[test]
    fn unreachable_store_is_a_connection_failure() {
        // Port 9 (discard) is closed on test hosts.
        let consul = ConsulClient::new(
            &SyncConfig::new("http://127.0.0.1:9").with_timeout(std::time::Duration::from_secs(1)),
        )
        .unwrap();
        let err = consul.fetch("apps").unwrap_err();
        assert!(matches!(err, SyncError::ConnectionFailure(_)));
    }

    #[test]
    fn missing_tls_files_are_bad_config() {
        let config = SyncConfig::new("https://consul:8501")
            .with_tls(TlsConfig::new("/nonexistent/cert.pem", "/nonexistent/key.pem"));
        let err = ConsulClient::new(&config).unwrap_err();
        assert!(matches!(err, SyncError::BadConfig(_)));
    }
}
