//! Node cycling over live cluster state
//!
//! Everything in this module works against the [`api::ClusterApi`] contract
//! and never holds live API objects:
//!
//! - **types**: point-in-time domain records with closed owner/phase enums
//! - **api**: the cluster query/mutation contract the engines consume
//! - **classify**: per-pod drain dispositions, recomputed every pass
//! - **readiness**: the polling gate and its fleet/workload predicates
//! - **drain**: cordon, job guard, classify-and-act passes to convergence
//! - **orchestrator**: the per-node top loop with continue-on-error policy

pub mod api;
pub mod classify;
pub mod drain;
pub mod orchestrator;
pub mod readiness;
pub mod types;

pub use api::ClusterApi;
pub use classify::{classify, Disposition, JOB_NAME_LABEL};
pub use drain::{DrainEngine, DrainOutcome};
pub use orchestrator::{CycleOrchestrator, CycleReport, NodeCycleError};
pub use readiness::{fleet_ready, workloads_ready, ReadinessGate, WaitError};
pub use types::{
    ClusterError, ControllerKind, ControllerRef, NodeRecord, OwnerRef, PodPhase, PodRecord,
    TaintRecord,
};
