//! Domain records for cluster state
//!
//! These are point-in-time snapshots converted from API objects at the
//! adapter boundary. The core never holds live API types, and owner kinds
//! and pod phases are closed enums so the engines branch on a finite set
//! rather than on strings.

use std::collections::BTreeMap;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClusterError {
    #[error("cluster client construction failed: {0}")]
    Init(String),

    #[error("cluster query failed: {0}")]
    Query(String),

    #[error("node update failed: {0}")]
    Update(String),

    #[error("conflicting update on node '{0}' persisted across {1} attempts")]
    CordonConflict(String, u32),

    #[error("eviction of pod {0}/{1} failed: {2}")]
    Eviction(String, String, String),
}

/// A compute node as observed at one point in time.
#[derive(Debug, Clone)]
pub struct NodeRecord {
    pub name: String,
    /// Stable cloud instance identifier, when the provider reports one.
    /// Pool-membership removal is keyed on this, not on the node name.
    pub instance_id: Option<String>,
    /// Kubelet version currently running on the node.
    pub version: String,
    pub labels: BTreeMap<String, String>,
    pub unschedulable: bool,
    pub ready: bool,
    pub taints: Vec<TaintRecord>,
}

#[derive(Debug, Clone)]
pub struct TaintRecord {
    pub key: String,
    pub value: Option<String>,
    pub effect: String,
}

/// Lifecycle phase of a pod.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PodPhase {
    Pending,
    Running,
    Succeeded,
    Failed,
    Unknown,
}

impl PodPhase {
    pub fn from_api(phase: &str) -> Self {
        match phase {
            "Pending" => PodPhase::Pending,
            "Running" => PodPhase::Running,
            "Succeeded" => PodPhase::Succeeded,
            "Failed" => PodPhase::Failed,
            _ => PodPhase::Unknown,
        }
    }

    /// Running or terminal-success, the healthy states a readiness wait
    /// accepts.
    pub fn is_running_or_succeeded(self) -> bool {
        matches!(self, PodPhase::Running | PodPhase::Succeeded)
    }
}

/// A pod as observed at one point in time.
#[derive(Debug, Clone)]
pub struct PodRecord {
    pub namespace: String,
    pub name: String,
    pub node_name: Option<String>,
    pub phase: PodPhase,
    /// Deletion already requested; the pod is on its way out.
    pub terminating: bool,
    pub labels: BTreeMap<String, String>,
    /// Direct controller owner as reported by the API, unresolved.
    pub owner_ref: Option<OwnerRef>,
}

/// Raw owner reference carried on a pod: the directly owning object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnerRef {
    pub kind: String,
    pub name: String,
}

/// The closed set of controller kinds the drain engine distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControllerKind {
    DaemonSet,
    Deployment,
    ReplicaSet,
    StatefulSet,
    Job,
    Other,
}

impl ControllerKind {
    pub fn from_api(kind: &str) -> Self {
        match kind {
            "DaemonSet" => ControllerKind::DaemonSet,
            "Deployment" => ControllerKind::Deployment,
            "ReplicaSet" => ControllerKind::ReplicaSet,
            "StatefulSet" => ControllerKind::StatefulSet,
            "Job" => ControllerKind::Job,
            _ => ControllerKind::Other,
        }
    }
}

/// A pod's owning controller after resolution (one extra hop for pods owned
/// by a ReplicaSet that is itself owned by a Deployment).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerRef {
    pub kind: ControllerKind,
    pub namespace: String,
    pub name: String,
}
