//! Polling readiness gate
//!
//! A wait re-evaluates its predicate by re-querying live state on every
//! attempt; nothing is memoized between attempts. By default a wait blocks
//! until the predicate holds. An optional maximum wait turns a stuck
//! predicate into a dedicated error instead.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::{sleep, Instant};
use tracing::debug;

use super::api::ClusterApi;
use super::types::ClusterError;
use crate::selector::Selector;

/// Namespace whose pods gate fleet readiness.
pub const KUBE_SYSTEM_NAMESPACE: &str = "kube-system";

#[derive(Error, Debug)]
pub enum WaitError {
    #[error("gave up after {0:?} waiting for {1}")]
    DeadlineExceeded(Duration, String),

    #[error(transparent)]
    Cluster(#[from] ClusterError),
}

/// Blocks until a live-state predicate holds.
#[derive(Debug, Clone, Copy)]
pub struct ReadinessGate {
    interval: Duration,
    max_wait: Option<Duration>,
}

impl ReadinessGate {
    pub fn new(interval: Duration, max_wait: Option<Duration>) -> Self {
        Self { interval, max_wait }
    }

    /// Re-evaluate `probe` until it returns true, sleeping the configured
    /// interval between attempts. The probe always runs at least once.
    pub async fn wait_until<F, Fut>(&self, what: &str, mut probe: F) -> Result<(), WaitError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<bool, ClusterError>>,
    {
        let started = Instant::now();
        loop {
            if probe().await? {
                return Ok(());
            }
            if let Some(max) = self.max_wait {
                if started.elapsed() >= max {
                    return Err(WaitError::DeadlineExceeded(max, what.to_string()));
                }
            }
            debug!(
                "waiting for {}; checking again in {:?}",
                what, self.interval
            );
            sleep(self.interval).await;
        }
    }
}

/// Every node reports Ready and every kube-system pod on every node is
/// Running or Succeeded.
pub async fn fleet_ready(cluster: &dyn ClusterApi) -> Result<bool, ClusterError> {
    let nodes = cluster.list_nodes().await?;
    for node in &nodes {
        if !node.ready {
            return Ok(false);
        }
        let pods = cluster.list_pods_on_node(&node.name).await?;
        let system_healthy = pods
            .iter()
            .filter(|p| p.namespace == KUBE_SYSTEM_NAMESPACE)
            .all(|p| p.phase.is_running_or_succeeded());
        if !system_healthy {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Every pod matching the selector (or every pod cluster-wide when `None`)
/// is Running or Succeeded.
pub async fn workloads_ready(
    cluster: &dyn ClusterApi,
    selector: Option<&Selector>,
) -> Result<bool, ClusterError> {
    let pods = cluster.list_pods(selector).await?;
    Ok(pods.iter().all(|p| p.phase.is_running_or_succeeded()))
}
