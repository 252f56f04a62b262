//! Pool membership removal
//!
//! Once a node is drained, its cloud instance is evicted from the pool.
//! The instance identifier is used rather than the node name: the name is
//! not guaranteed stable across the removal.

use tracing::info;

use super::api::{NodepoolApi, PoolError};

pub struct PoolMembershipEvictor<'a> {
    pool: &'a dyn NodepoolApi,
}

impl<'a> PoolMembershipEvictor<'a> {
    pub fn new(pool: &'a dyn NodepoolApi) -> Self {
        Self { pool }
    }

    /// Remove exactly one member instance from the pool. The caller decides
    /// what a failure means; nothing done so far is rolled back.
    pub async fn remove_member(&self, pool_id: &str, instance_id: &str) -> Result<(), PoolError> {
        self.pool
            .evict_members(pool_id, &[instance_id.to_string()])
            .await?;
        info!(
            "Instance {} submitted for removal from pool {}",
            instance_id, pool_id
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::api::mock::MockPoolApi;

    #[tokio::test]
    async fn test_remove_member_submits_single_instance() {
        let pool = MockPoolApi::new().with_pool("p1", 3);
        let evictor = PoolMembershipEvictor::new(&pool);
        evictor.remove_member("p1", "i-abc123").await.unwrap();

        assert_eq!(
            *pool.evictions.lock().unwrap(),
            vec![("p1".to_string(), vec!["i-abc123".to_string()])]
        );
    }
}
