//! Per-pod drain classification
//!
//! A single function maps a pod and its resolved controller to the action
//! the drain engine takes. Dispositions are recomputed on every pass:
//! controller state (rollout progress, deletions) changes between passes,
//! so nothing here may be cached.
//!
//! Direct eviction is wrong for daemon-managed pods (the controller puts
//! one on every node, cordoned or not) and wasteful for deployment-managed
//! pods (one rollout restart reschedules the whole replica set within the
//! deployment's own availability budget).

use super::types::{ControllerKind, ControllerRef, PodPhase, PodRecord};

/// Label carried by pods created by a batch Job controller.
pub const JOB_NAME_LABEL: &str = "batch.kubernetes.io/job-name";

/// What the drain engine does with one pod on one pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// Deletion already in progress; counted, not acted on.
    AlreadyTerminating,
    /// Actively running on behalf of a batch job; left in place.
    SkipJobRunning,
    /// Daemon-managed; never evicted.
    SkipDaemonManaged,
    /// Deployment-managed; drained by restarting the controller.
    RescheduleViaController(ControllerRef),
    /// Everything else goes through the disruption API.
    Evict,
}

/// Classify one pod for one drain pass.
pub fn classify(pod: &PodRecord, controller: Option<&ControllerRef>) -> Disposition {
    if pod.terminating {
        return Disposition::AlreadyTerminating;
    }
    if is_running_job_pod(pod) {
        return Disposition::SkipJobRunning;
    }
    match controller {
        Some(ctrl) if ctrl.kind == ControllerKind::DaemonSet => Disposition::SkipDaemonManaged,
        Some(ctrl) if ctrl.kind == ControllerKind::Deployment => {
            Disposition::RescheduleViaController(ctrl.clone())
        }
        _ => Disposition::Evict,
    }
}

/// True for a pod a batch Job is still running.
pub fn is_running_job_pod(pod: &PodRecord) -> bool {
    pod.labels.contains_key(JOB_NAME_LABEL) && pod.phase == PodPhase::Running
}
