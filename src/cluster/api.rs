//! The cluster API contract consumed by the cycling engines
//!
//! One async trait covering the reads (node/pod snapshots, owner
//! resolution) and the mutations (cordon, eviction, rollout restart) the
//! engines need. Every call re-queries live state; nothing is cached. The
//! production implementation lives in `crate::client::kube`; tests run
//! against the in-memory mock below.

use async_trait::async_trait;

use super::types::{ClusterError, ControllerRef, NodeRecord, PodRecord};
use crate::selector::Selector;

#[async_trait]
pub trait ClusterApi: Send + Sync {
    /// All nodes in the cluster, in API order.
    async fn list_nodes(&self) -> Result<Vec<NodeRecord>, ClusterError>;

    /// All pods currently scheduled to the named node.
    async fn list_pods_on_node(&self, node_name: &str) -> Result<Vec<PodRecord>, ClusterError>;

    /// All pods matching the selector, cluster-wide when `None`.
    async fn list_pods(&self, selector: Option<&Selector>) -> Result<Vec<PodRecord>, ClusterError>;

    /// Resolve the pod's owning controller. A pod owned by a ReplicaSet
    /// resolves one hop further to the ReplicaSet's own owning Deployment,
    /// if any.
    async fn owning_controller(
        &self,
        pod: &PodRecord,
    ) -> Result<Option<ControllerRef>, ClusterError>;

    /// Current number of unavailable replicas reported by a
    /// deployment-style controller.
    async fn controller_unavailable_replicas(
        &self,
        controller: &ControllerRef,
    ) -> Result<i32, ClusterError>;

    /// Request a rolling restart of a deployment-style controller. Safe to
    /// repeat; the controller replaces its pods progressively within its
    /// own availability budget.
    async fn trigger_rollout_restart(&self, controller: &ControllerRef)
        -> Result<(), ClusterError>;

    /// Mark a node (un)schedulable.
    async fn set_unschedulable(
        &self,
        node_name: &str,
        unschedulable: bool,
    ) -> Result<(), ClusterError>;

    /// Request a disruption-budget-aware eviction of a pod. A pod that is
    /// already gone counts as success.
    async fn evict_pod(&self, namespace: &str, name: &str) -> Result<(), ClusterError>;
}

// ============================================================================
// Mock implementation for testing (no I/O)
// ============================================================================
