//! Typed HTTP client for the downstream cluster-lifecycle service ("CS",
//! §6.2). Built the way the reference stack's `MetaClient` is built: a
//! thin `reqwest::Client` wrapper, one method per RPC, structured error
//! translation on non-2xx instead of bare `bail!`.

pub mod error;
pub mod models;

pub use error::CsError;
pub use models::*;

use reqwest::{Client, StatusCode};
use std::time::Duration;

type Result<T> = std::result::Result<T, CsError>;

#[derive(Clone)]
pub struct CsClient {
    client: Client,
    base_url: String,
}

impl CsClient {
    pub fn new(base_url: impl Into<String>, request_timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .expect("CS HTTP client builds with static config");
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn send<T: serde::de::DeserializeOwned>(
        &self,
        req: reqwest::RequestBuilder,
    ) -> Result<T> {
        let resp = req.send().await.map_err(|e| {
            if e.is_timeout() || e.is_connect() {
                CsError::Transient {
                    status: 0,
                    message: e.to_string(),
                }
            } else {
                CsError::Other(e.into())
            }
        })?;

        if resp.status().is_success() {
            return resp
                .json::<T>()
                .await
                .map_err(|e| CsError::Other(anyhow::anyhow!("failed to parse CS response: {e}")));
        }

        let status = resp.status();
        let body: CsErrorBody = resp.json().await.unwrap_or(CsErrorBody {
            code: "Unknown".to_string(),
            reason: "Unknown".to_string(),
            target: None,
            message: format!("CS returned {status} with an unparsable body"),
        });
        Err(CsError::classify(status, body))
    }

    async fn send_ack(&self, req: reqwest::RequestBuilder) -> Result<()> {
        let resp = req
            .send()
            .await
            .map_err(|e| CsError::Other(e.into()))?;
        if resp.status().is_success() || resp.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        let status = resp.status();
        let body: CsErrorBody = resp.json().await.unwrap_or(CsErrorBody {
            code: "Unknown".to_string(),
            reason: "Unknown".to_string(),
            target: None,
            message: format!("CS returned {status} with an unparsable body"),
        });
        Err(CsError::classify(status, body))
    }

    pub async fn post_cluster(&self, spec: &CsClusterSpec) -> Result<CsCluster> {
        let url = format!("{}/clusters", self.base_url);
        self.send(self.client.post(&url).json(spec)).await
    }

    pub async fn get_cluster(&self, internal_id: &str) -> Result<CsCluster> {
        let url = format!("{}/clusters/{}", self.base_url, internal_id);
        self.send(self.client.get(&url)).await
    }

    pub async fn update_cluster(&self, internal_id: &str, patch: &CsClusterPatch) -> Result<CsCluster> {
        let url = format!("{}/clusters/{}", self.base_url, internal_id);
        self.send(self.client.patch(&url).json(patch)).await
    }

    pub async fn delete_cluster(&self, internal_id: &str) -> Result<()> {
        let url = format!("{}/clusters/{}", self.base_url, internal_id);
        self.send_ack(self.client.delete(&url)).await
    }

    pub async fn post_node_pool(&self, cluster_id: &str, spec: &CsNodePoolSpec) -> Result<CsNodePool> {
        let url = format!("{}/clusters/{}/nodePools", self.base_url, cluster_id);
        self.send(self.client.post(&url).json(spec)).await
    }

    pub async fn get_node_pool(&self, internal_id: &str) -> Result<CsNodePool> {
        let url = format!("{}/nodePools/{}", self.base_url, internal_id);
        self.send(self.client.get(&url)).await
    }

    pub async fn update_node_pool(
        &self,
        internal_id: &str,
        patch: &CsNodePoolPatch,
    ) -> Result<CsNodePool> {
        let url = format!("{}/nodePools/{}", self.base_url, internal_id);
        self.send(self.client.patch(&url).json(patch)).await
    }

    pub async fn delete_node_pool(&self, internal_id: &str) -> Result<()> {
        let url = format!("{}/nodePools/{}", self.base_url, internal_id);
        self.send_ack(self.client.delete(&url)).await
    }

    pub async fn post_external_auth(
        &self,
        cluster_id: &str,
        spec: &CsExternalAuthSpec,
    ) -> Result<CsExternalAuth> {
        let url = format!("{}/clusters/{}/externalAuths", self.base_url, cluster_id);
        self.send(self.client.post(&url).json(spec)).await
    }

    pub async fn delete_external_auth(&self, internal_id: &str) -> Result<()> {
        let url = format!("{}/externalAuths/{}", self.base_url, internal_id);
        self.send_ack(self.client.delete(&url)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_not_found_maps_to_not_found() {
        let err = CsError::classify(
            StatusCode::BAD_REQUEST,
            CsErrorBody {
                code: "BadRequest".into(),
                reason: "VersionNotFound".into(),
                target: None,
                message: "no such version".into(),
            },
        );
        assert!(matches!(err, CsError::NotFound));
    }

    #[test]
    fn server_error_is_transient() {
        let err = CsError::classify(
            StatusCode::SERVICE_UNAVAILABLE,
            CsErrorBody {
                code: "Unavailable".into(),
                reason: "Unavailable".into(),
                target: None,
                message: "retry later".into(),
            },
        );
        assert!(err.is_transient());
    }
}
