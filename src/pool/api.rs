//! The managed node-pool API contract
//!
//! The cloud control plane owns pools: named groups of nodes scaled as a
//! unit. Only three operations are needed: read the desired size, request a
//! new size, and evict named member instances. The production
//! implementation lives in `crate::client::pool_http`.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PoolError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("pool API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(String),
}

/// A node pool as reported by the managed pool API.
#[derive(Debug, Clone)]
pub struct NodePool {
    pub id: String,
    /// Desired size declared on the pool, not the live member count.
    pub size: i64,
}

#[async_trait]
pub trait NodepoolApi: Send + Sync {
    async fn get_pool(&self, pool_id: &str) -> Result<NodePool, PoolError>;

    async fn scale_pool(&self, pool_id: &str, size: i64) -> Result<(), PoolError>;

    /// Remove the named member instances from the pool. Members are
    /// addressed by cloud instance identifier, not by node name.
    async fn evict_members(&self, pool_id: &str, instance_ids: &[String])
        -> Result<(), PoolError>;
}

// ============================================================================
// Mock implementation for testing (no I/O)
// ============================================================================
