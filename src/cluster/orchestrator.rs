//! Top-level cycling loop
//!
//! Takes one snapshot of the node fleet and processes each eligible node
//! start to finish: grow the pool, wait for the join and for fleet
//! readiness, cordon and drain, remove the instance from its pool, wait for
//! displaced workloads to settle. Per-node failures are logged and the loop
//! advances; a single stuck node must not block cycling the rest of the
//! pool. Only the initial snapshot is fatal.

use thiserror::Error;
use tracing::{debug, info, warn};

use super::api::ClusterApi;
use super::drain::{DrainEngine, DrainOutcome};
use super::readiness::{fleet_ready, workloads_ready, WaitError};
use super::types::{ClusterError, NodeRecord};
use crate::config::{CycleConfig, Eligibility};
use crate::pool::api::NodepoolApi;
use crate::pool::capacity::CapacityController;
use crate::pool::evict::PoolMembershipEvictor;

#[derive(Error, Debug)]
pub enum NodeCycleError {
    #[error("node '{0}' carries no '{1}' pool-membership label")]
    MissingPoolLabel(String, String),

    #[error(transparent)]
    Cluster(#[from] ClusterError),

    #[error(transparent)]
    Wait(#[from] WaitError),
}

/// Outcome counts for one full run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    pub visited: usize,
    pub skipped: usize,
    pub cycled: usize,
    pub left_cordoned: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeOutcome {
    Cycled,
    LeftCordoned,
}

pub struct CycleOrchestrator<'a> {
    cluster: &'a dyn ClusterApi,
    pool: &'a dyn NodepoolApi,
    config: &'a CycleConfig,
}

impl<'a> CycleOrchestrator<'a> {
    pub fn new(
        cluster: &'a dyn ClusterApi,
        pool: &'a dyn NodepoolApi,
        config: &'a CycleConfig,
    ) -> Self {
        Self {
            cluster,
            pool,
            config,
        }
    }

    /// Cycle every eligible node from a single snapshot taken now. Nodes
    /// that join the cluster during the run are not added to this run's
    /// candidate set.
    pub async fn run(&self) -> Result<CycleReport, ClusterError> {
        let nodes = self.cluster.list_nodes().await?;
        info!(
            "Considering {} nodes for cycling toward version {}",
            nodes.len(),
            self.config.target_version
        );

        let mut report = CycleReport::default();
        for node in &nodes {
            report.visited += 1;

            match self.config.node_eligibility(node) {
                Eligibility::AlreadyCurrent => {
                    debug!(
                        "Node {} already on {}; skipping",
                        node.name, node.version
                    );
                    report.skipped += 1;
                    continue;
                }
                Eligibility::VersionBehind => {
                    info!(
                        "Node {} is on {}; cycling to {}",
                        node.name, node.version, self.config.target_version
                    );
                }
                Eligibility::OverrideMatch => {
                    info!(
                        "Node {} is already on {} but matches the cycle selector; cycling anyway",
                        node.name, node.version
                    );
                }
            }

            match self.cycle_node(node).await {
                Ok(NodeOutcome::Cycled) => report.cycled += 1,
                Ok(NodeOutcome::LeftCordoned) => report.left_cordoned += 1,
                Err(e) => {
                    warn!(
                        "Cycling node {} failed: {}; continuing with the next node",
                        node.name, e
                    );
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }

    async fn cycle_node(&self, node: &NodeRecord) -> Result<NodeOutcome, NodeCycleError> {
        let pool_id = node
            .labels
            .get(&self.config.pool_label)
            .cloned()
            .ok_or_else(|| {
                NodeCycleError::MissingPoolLabel(
                    node.name.clone(),
                    self.config.pool_label.clone(),
                )
            })?;

        // Capacity first: the replacement must exist before workloads move.
        let capacity = CapacityController::new(
            self.cluster,
            self.pool,
            self.config.node_gate(),
            &self.config.pool_label,
        );
        capacity.grow_and_await_join(&pool_id).await?;

        self.config
            .node_gate()
            .wait_until("all nodes and system pods to be ready", move || {
                fleet_ready(self.cluster)
            })
            .await?;

        let drain = DrainEngine::new(self.cluster, self.config.node_poll_interval);
        if drain.drain(&node.name).await? == DrainOutcome::LeftCordoned {
            return Ok(NodeOutcome::LeftCordoned);
        }

        match &node.instance_id {
            Some(instance_id) => {
                let evictor = PoolMembershipEvictor::new(self.pool);
                if let Err(e) = evictor.remove_member(&pool_id, instance_id).await {
                    warn!(
                        "Removing instance {} from pool {} failed: {}; node {} needs manual follow-up",
                        instance_id, pool_id, e, node.name
                    );
                }
            }
            None => {
                warn!(
                    "Node {} exposes no instance identifier; leaving it in pool {} for manual follow-up",
                    node.name, pool_id
                );
            }
        }

        self.config
            .pod_gate()
            .wait_until("displaced workloads to be running", move || {
                workloads_ready(self.cluster, self.config.workload_selector.as_ref())
            })
            .await?;

        Ok(NodeOutcome::Cycled)
    }
}
