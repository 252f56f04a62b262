//! HTTP adapter for the managed node-pool API
//!
//! The pool control plane speaks bearer-token HTTP/JSON: read a pool's
//! declared size, declare a new size, evict named member instances. Pools
//! are addressed under the cluster they belong to.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::pool::api::{NodePool, NodepoolApi, PoolError};

#[derive(Debug, Clone, Deserialize)]
struct NodepoolPayload {
    id: String,
    size: i64,
}

#[derive(Debug, Clone, Serialize)]
struct ScaleRequest {
    size: i64,
}

#[derive(Debug, Clone, Serialize)]
struct EvictRequest {
    instances: Vec<String>,
}

#[derive(Clone)]
pub struct HttpNodepoolClient {
    client: reqwest::Client,
    base_url: String,
    token: String,
    cluster_id: String,
}

impl HttpNodepoolClient {
    pub fn new(base_url: String, token: String, cluster_id: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            token,
            cluster_id,
        }
    }

    fn pool_url(&self, pool_id: &str) -> String {
        format!(
            "{}/v2/clusters/{}/nodepools/{}",
            self.base_url.trim_end_matches('/'),
            self.cluster_id,
            pool_id
        )
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, PoolError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        Err(PoolError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl NodepoolApi for HttpNodepoolClient {
    async fn get_pool(&self, pool_id: &str) -> Result<NodePool, PoolError> {
        let response = self
            .client
            .get(self.pool_url(pool_id))
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| PoolError::Http(e.to_string()))?;
        let payload: NodepoolPayload = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| PoolError::Parse(e.to_string()))?;
        Ok(NodePool {
            id: payload.id,
            size: payload.size,
        })
    }

    async fn scale_pool(&self, pool_id: &str, size: i64) -> Result<(), PoolError> {
        let response = self
            .client
            .put(format!("{}/scale", self.pool_url(pool_id)))
            .bearer_auth(&self.token)
            .json(&ScaleRequest { size })
            .send()
            .await
            .map_err(|e| PoolError::Http(e.to_string()))?;
        Self::check(response).await?;
        Ok(())
    }

    async fn evict_members(
        &self,
        pool_id: &str,
        instance_ids: &[String],
    ) -> Result<(), PoolError> {
        let response = self
            .client
            .put(format!("{}/evict", self.pool_url(pool_id)))
            .bearer_auth(&self.token)
            .json(&EvictRequest {
                instances: instance_ids.to_vec(),
            })
            .send()
            .await
            .map_err(|e| PoolError::Http(e.to_string()))?;
        Self::check(response).await?;
        Ok(())
    }
}
