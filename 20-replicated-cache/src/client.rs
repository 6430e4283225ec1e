//! Typed client for a node's key/value endpoints.

use reqwest::header::HeaderName;
use reqwest::{Client, Response, StatusCode, Url};

use crate::error::ClientError;
use crate::http::{ACKED_HEADER, TOTAL_HEADER};
use crate::replication::WritePolicy;

/// Replication counts a node reported for a write. Absent when the node did
/// not send the headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteReceipt {
    pub acked: Option<usize>,
    pub total: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct CacheClient {
    http: Client,
    base: String,
}

impl CacheClient {
    /// `base` is the node's base URL, e.g. `http://localhost:8081`.
    pub fn new(base: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base)
    }

    pub fn with_client(http: Client, base: impl Into<String>) -> Self {
        let base = base.into().trim_end_matches('/').to_string();
        Self { http, base }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    /// Fetches a key. `Ok(None)` means the node answered `404`.
    pub async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, ClientError> {
        let response = self.http.get(self.key_url(key)?).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = ensure_success(response).await?;
        Ok(Some(response.bytes().await?.to_vec()))
    }

    /// Writes a key. `ttl` is passed through verbatim (`30s`, `60`, ...).
    pub async fn set(
        &self,
        key: &str,
        value: impl Into<Vec<u8>>,
        ttl: Option<&str>,
        policy: WritePolicy,
    ) -> Result<WriteReceipt, ClientError> {
        let mut query = policy_query(policy);
        if let Some(ttl) = ttl {
            query.push(("ttl", ttl.to_string()));
        }
        let response = self
            .http
            .put(self.key_url(key)?)
            .query(&query)
            .body(value.into())
            .send()
            .await?;
        Ok(receipt(&ensure_success(response).await?))
    }

    pub async fn delete(&self, key: &str, policy: WritePolicy) -> Result<WriteReceipt, ClientError> {
        let response = self
            .http
            .delete(self.key_url(key)?)
            .query(&policy_query(policy))
            .send()
            .await?;
        Ok(receipt(&ensure_success(response).await?))
    }

    /// `{base}/kv/{key}` with the key percent-encoded as one path segment.
    fn key_url(&self, key: &str) -> Result<Url, ClientError> {
        let bad_base = || ClientError::BadBase(self.base.clone());
        let mut url = Url::parse(&self.base).map_err(|_| bad_base())?;
        url.path_segments_mut()
            .map_err(|()| bad_base())?
            .pop_if_empty()
            .push("kv")
            .push(key);
        Ok(url)
    }
}

fn policy_query(policy: WritePolicy) -> Vec<(&'static str, String)> {
    vec![
        ("min", policy.min_acks.to_string()),
        ("full", policy.full.to_string()),
    ]
}

async fn ensure_success(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ClientError::Status {
        status,
        body: body.trim().to_string(),
    })
}

fn receipt(response: &Response) -> WriteReceipt {
    let count = |name: &HeaderName| -> Option<usize> {
        response
            .headers()
            .get(name)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse().ok())
    };
    WriteReceipt {
        acked: count(&ACKED_HEADER),
        total: count(&TOTAL_HEADER),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_encoded_as_one_segment() {
        let client = CacheClient::new("http://localhost:8081/");
        let url = client.key_url("a?b/c#d%e f").expect("valid base");
        assert_eq!(
            url.as_str(),
            "http://localhost:8081/kv/a%3Fb%2Fc%23d%25e%20f"
        );
        assert_eq!(url.query(), None);
        assert_eq!(url.fragment(), None);
    }

    #[test]
    fn base_path_is_kept() {
        let client = CacheClient::new("http://proxy:9000/cache");
        let url = client.key_url("k").expect("valid base");
        assert_eq!(url.as_str(), "http://proxy:9000/cache/kv/k");
    }

    #[test]
    fn unusable_base_is_an_error() {
        let client = CacheClient::new("not a url");
        assert!(matches!(
            client.key_url("k"),
            Err(ClientError::BadBase(base)) if base == "not a url"
        ));
    }
}
