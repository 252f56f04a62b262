//! Run configuration
//!
//! Built once from the CLI arguments and passed by reference into the
//! orchestrator. Core logic never reads configuration from ambient state.

use std::time::Duration;

use thiserror::Error;

use crate::cli::Args;
use crate::cluster::readiness::ReadinessGate;
use crate::cluster::types::NodeRecord;
use crate::selector::{Selector, SelectorError};

/// Node label naming the pool a node belongs to.
pub const DEFAULT_POOL_LABEL: &str = "nodecycle.io/nodepool-id";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid --cycle-selector: {0}")]
    CycleSelector(SelectorError),

    #[error("invalid --workload-selector: {0}")]
    WorkloadSelector(SelectorError),
}

/// Why a node does or does not enter the active cycling path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eligibility {
    /// Kubelet version differs from the target.
    VersionBehind,
    /// Already on the target version, but the override selector matches.
    OverrideMatch,
    /// Already on the target version; left untouched.
    AlreadyCurrent,
}

#[derive(Debug, Clone)]
pub struct CycleConfig {
    /// Kubelet/runtime version nodes are being rolled to.
    pub target_version: String,
    /// Label key carrying a node's pool id.
    pub pool_label: String,
    /// Nodes matching this selector are cycled even when already current.
    pub override_selector: Option<Selector>,
    /// Pods that must be Running before the run moves to the next node;
    /// all pods cluster-wide when unset.
    pub workload_selector: Option<Selector>,
    /// Poll interval for node, pool-membership and drain-pass waits.
    pub node_poll_interval: Duration,
    /// Poll interval for pod readiness waits.
    pub pod_poll_interval: Duration,
    /// Upper bound for any single wait; unbounded when unset.
    pub max_wait: Option<Duration>,
}

impl CycleConfig {
    pub fn from_args(args: &Args) -> Result<Self, ConfigError> {
        let override_selector = args
            .cycle_selector
            .as_deref()
            .map(Selector::parse)
            .transpose()
            .map_err(ConfigError::CycleSelector)?;
        let workload_selector = args
            .workload_selector
            .as_deref()
            .map(Selector::parse)
            .transpose()
            .map_err(ConfigError::WorkloadSelector)?;

        Ok(Self {
            target_version: args.target_version.clone(),
            pool_label: args.pool_label.clone(),
            override_selector,
            workload_selector,
            node_poll_interval: Duration::from_secs(args.node_poll_seconds),
            pod_poll_interval: Duration::from_secs(args.pod_poll_seconds),
            max_wait: args.max_wait_seconds.map(Duration::from_secs),
        })
    }

    pub fn node_eligibility(&self, node: &NodeRecord) -> Eligibility {
        if node.version != self.target_version {
            return Eligibility::VersionBehind;
        }
        let override_matches = self
            .override_selector
            .as_ref()
            .map(|s| s.matches(&node.labels))
            .unwrap_or(false);
        if override_matches {
            Eligibility::OverrideMatch
        } else {
            Eligibility::AlreadyCurrent
        }
    }

    /// Gate for node, pool-membership and fleet-readiness waits.
    pub fn node_gate(&self) -> ReadinessGate {
        ReadinessGate::new(self.node_poll_interval, self.max_wait)
    }

    /// Gate for pod readiness waits.
    pub fn pod_gate(&self) -> ReadinessGate {
        ReadinessGate::new(self.pod_poll_interval, self.max_wait)
    }
}
