//! Pool capacity growth
//!
//! Before a node is drained, its pool is grown by one so the displaced
//! workload has somewhere to land. Growth is requested as size+1 relative
//! to the last observed desired size; a concurrent external scaler can race
//! this, which is an accepted limitation. The join is detected by counting
//! live nodes carrying the pool-membership label, against a count captured
//! before the scale request.

use tracing::{info, warn};

use super::api::{NodepoolApi, PoolError};
use crate::cluster::api::ClusterApi;
use crate::cluster::readiness::{ReadinessGate, WaitError};
use crate::cluster::types::ClusterError;

pub struct CapacityController<'a> {
    cluster: &'a dyn ClusterApi,
    pool: &'a dyn NodepoolApi,
    gate: ReadinessGate,
    pool_label: &'a str,
}

impl<'a> CapacityController<'a> {
    pub fn new(
        cluster: &'a dyn ClusterApi,
        pool: &'a dyn NodepoolApi,
        gate: ReadinessGate,
        pool_label: &'a str,
    ) -> Self {
        Self {
            cluster,
            pool,
            gate,
            pool_label,
        }
    }

    /// Request one more member for the pool and block until the membership
    /// is observed to grow. A failed scale request is logged and the wait
    /// proceeds anyway: an already-in-progress scale operation delivers the
    /// same capacity.
    pub async fn grow_and_await_join(&self, pool_id: &str) -> Result<(), WaitError> {
        let before = self.member_count(pool_id).await?;

        match self.request_growth(pool_id).await {
            Ok(size) => info!("Requested growth of pool {} to {} members", pool_id, size),
            Err(e) => warn!(
                "Scale request for pool {} failed: {}; waiting for capacity anyway",
                pool_id, e
            ),
        }

        let what = format!("pool {} to grow beyond {} members", pool_id, before);
        self.gate
            .wait_until(&what, move || self.member_grown(pool_id, before))
            .await
    }

    async fn request_growth(&self, pool_id: &str) -> Result<i64, PoolError> {
        let pool = self.pool.get_pool(pool_id).await?;
        let next = pool.size + 1;
        self.pool.scale_pool(pool_id, next).await?;
        Ok(next)
    }

    async fn member_grown(&self, pool_id: &str, before: usize) -> Result<bool, ClusterError> {
        Ok(self.member_count(pool_id).await? > before)
    }

    /// Live member count: nodes whose pool-membership label names this pool.
    async fn member_count(&self, pool_id: &str) -> Result<usize, ClusterError> {
        let nodes = self.cluster.list_nodes().await?;
        Ok(nodes
            .iter()
            .filter(|n| n.labels.get(self.pool_label).map(String::as_str) == Some(pool_id))
            .count())
    }
}
