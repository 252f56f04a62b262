//! Node drain engine
//!
//! Runs after capacity has grown and the fleet is ready again. Cordons the
//! node, refuses to touch it further while a batch job is running on it,
//! then repeats classify-and-act passes over the resident pods until no pod
//! is left waiting on a controller reschedule or a deletion. Only a
//! converged drain clears the node for pool-membership removal.

use std::collections::HashSet;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, info, warn};

use super::api::ClusterApi;
use super::classify::{classify, is_running_job_pod, Disposition};
use super::types::ClusterError;

/// How a drain ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// Every non-skipped pod is gone; the node may leave its pool.
    Drained,
    /// A batch job was running: the node stays cordoned with its workload
    /// in place and must not be removed from the pool.
    LeftCordoned,
}

pub struct DrainEngine<'a> {
    cluster: &'a dyn ClusterApi,
    pass_interval: Duration,
}

impl<'a> DrainEngine<'a> {
    pub fn new(cluster: &'a dyn ClusterApi, pass_interval: Duration) -> Self {
        Self {
            cluster,
            pass_interval,
        }
    }

    pub async fn drain(&self, node_name: &str) -> Result<DrainOutcome, ClusterError> {
        self.cluster.set_unschedulable(node_name, true).await?;
        info!("Node {} cordoned", node_name);

        let pods = self.cluster.list_pods_on_node(node_name).await?;
        if pods.iter().any(is_running_job_pod) {
            warn!(
                "Node {} has running job pods; leaving it cordoned and in its pool",
                node_name
            );
            return Ok(DrainOutcome::LeftCordoned);
        }

        loop {
            let pass = self.run_pass(node_name).await?;
            if pass.reschedulable == 0 && pass.terminating == 0 {
                break;
            }
            debug!(
                "Node {} not yet drained ({} awaiting reschedule, {} terminating); next pass in {:?}",
                node_name, pass.reschedulable, pass.terminating, self.pass_interval
            );
            sleep(self.pass_interval).await;
        }

        info!("Node {} drained", node_name);
        Ok(DrainOutcome::Drained)
    }

    /// One full enumeration of the node's pods. Counts the pods that still
    /// hold the drain open: those waiting on a controller reschedule and
    /// those mid-deletion.
    async fn run_pass(&self, node_name: &str) -> Result<PassCounts, ClusterError> {
        let pods = self.cluster.list_pods_on_node(node_name).await?;
        let mut counts = PassCounts::default();
        // One restart per controller per pass; re-evaluated fresh next pass.
        let mut restarted: HashSet<(String, String)> = HashSet::new();

        for pod in &pods {
            let controller = self.cluster.owning_controller(pod).await?;
            if controller.is_none() && !pod.terminating {
                debug!(
                    "Pod {}/{} has no resolvable owner; falling through to eviction",
                    pod.namespace, pod.name
                );
            }

            match classify(pod, controller.as_ref()) {
                Disposition::AlreadyTerminating => {
                    counts.terminating += 1;
                }
                Disposition::SkipJobRunning => {
                    debug!(
                        "Pod {}/{} belongs to a running job; leaving it in place",
                        pod.namespace, pod.name
                    );
                }
                Disposition::SkipDaemonManaged => {
                    debug!(
                        "Pod {}/{} is daemon-managed; skipping",
                        pod.namespace, pod.name
                    );
                }
                Disposition::RescheduleViaController(ctrl) => {
                    counts.reschedulable += 1;
                    let key = (ctrl.namespace.clone(), ctrl.name.clone());
                    if restarted.contains(&key) {
                        continue;
                    }
                    match self.cluster.controller_unavailable_replicas(&ctrl).await {
                        Ok(0) => match self.cluster.trigger_rollout_restart(&ctrl).await {
                            Ok(()) => {
                                info!(
                                    "Triggered rolling restart of {}/{} for pod {}/{}",
                                    ctrl.namespace, ctrl.name, pod.namespace, pod.name
                                );
                                restarted.insert(key);
                            }
                            Err(e) => {
                                warn!(
                                    "Rolling restart of {}/{} failed: {}; retrying next pass",
                                    ctrl.namespace, ctrl.name, e
                                );
                            }
                        },
                        Ok(unavailable) => {
                            debug!(
                                "{}/{} is mid-rollout ({} unavailable); backing off this pass",
                                ctrl.namespace, ctrl.name, unavailable
                            );
                        }
                        Err(e) => {
                            warn!(
                                "Could not read rollout status of {}/{}: {}; backing off this pass",
                                ctrl.namespace, ctrl.name, e
                            );
                        }
                    }
                }
                Disposition::Evict => match self.cluster.evict_pod(&pod.namespace, &pod.name).await
                {
                    Ok(()) => {
                        info!("Pod {}/{} evicted", pod.namespace, pod.name);
                    }
                    Err(e) => {
                        warn!(
                            "Evicting pod {}/{} failed: {}; continuing",
                            pod.namespace, pod.name, e
                        );
                    }
                },
            }
        }

        Ok(counts)
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct PassCounts {
    reschedulable: usize,
    terminating: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::api::mock::{controller, node, pod, MockCluster, MockPod};
    use crate::cluster::classify::JOB_NAME_LABEL;
    use crate::cluster::types::ControllerKind;

    fn engine(cluster: &MockCluster) -> DrainEngine<'_> {
        DrainEngine::new(cluster, Duration::from_millis(2))
    }

    fn seed_node(cluster: &MockCluster, name: &str) {
        cluster
            .state()
            .lock()
            .unwrap()
            .nodes
            .push(node(name, "v1.30.0", &[]));
    }

    #[tokio::test]
    async fn test_empty_node_drains_immediately() {
        let cluster = MockCluster::new();
        seed_node(&cluster, "n1");

        let outcome = engine(&cluster).drain("n1").await.unwrap();
        assert_eq!(outcome, DrainOutcome::Drained);

        let state = cluster.state();
        let state = state.lock().unwrap();
        assert_eq!(state.cordons, vec![("n1".to_string(), true)]);
        assert!(state.evictions.is_empty());
    }

    #[tokio::test]
    async fn test_running_job_abandons_drain_but_keeps_cordon() {
        let cluster = MockCluster::new();
        seed_node(&cluster, "n1");
        {
            let state = cluster.state();
            let mut state = state.lock().unwrap();
            let mut job_pod = pod("default", "batch-7-abc", "n1");
            job_pod
                .labels
                .insert(JOB_NAME_LABEL.to_string(), "batch-7".to_string());
            state.pods.push(MockPod {
                record: job_pod,
                controller: Some(controller(ControllerKind::Job, "default", "batch-7")),
            });
        }

        let outcome = engine(&cluster).drain("n1").await.unwrap();
        assert_eq!(outcome, DrainOutcome::LeftCordoned);

        let state = cluster.state();
        let state = state.lock().unwrap();
        assert_eq!(state.cordons, vec![("n1".to_string(), true)]);
        assert!(state.evictions.is_empty());
        assert!(state.restarts.is_empty());
    }

    #[tokio::test]
    async fn test_daemon_pods_are_never_evicted_or_restarted() {
        let cluster = MockCluster::new();
        seed_node(&cluster, "n1");
        {
            let state = cluster.state();
            let mut state = state.lock().unwrap();
            state.pods.push(MockPod {
                record: pod("kube-system", "agent-abc", "n1"),
                controller: Some(controller(
                    ControllerKind::DaemonSet,
                    "kube-system",
                    "agent",
                )),
            });
        }

        let outcome = engine(&cluster).drain("n1").await.unwrap();
        assert_eq!(outcome, DrainOutcome::Drained);

        let state = cluster.state();
        let state = state.lock().unwrap();
        assert!(state.evictions.is_empty());
        assert!(state.restarts.is_empty());
        // The daemon pod is still there; the drain converged around it.
        assert_eq!(state.pods.len(), 1);
    }

    #[tokio::test]
    async fn test_deployment_pods_restart_controller_once_and_never_evict() {
        let cluster = MockCluster::new();
        seed_node(&cluster, "n1");
        {
            let state = cluster.state();
            let mut state = state.lock().unwrap();
            let web = controller(ControllerKind::Deployment, "default", "web");
            state.pods.push(MockPod {
                record: pod("default", "web-1", "n1"),
                controller: Some(web.clone()),
            });
            state.pods.push(MockPod {
                record: pod("default", "web-2", "n1"),
                controller: Some(web),
            });
        }

        let outcome = engine(&cluster).drain("n1").await.unwrap();
        assert_eq!(outcome, DrainOutcome::Drained);

        let state = cluster.state();
        let state = state.lock().unwrap();
        assert!(state.evictions.is_empty());
        // Two pods, one controller: a single restart covers both.
        assert_eq!(
            state.restarts,
            vec![("default".to_string(), "web".to_string())]
        );
    }

    #[tokio::test]
    async fn test_mid_rollout_deployment_backs_off_until_available() {
        let cluster = MockCluster::new();
        seed_node(&cluster, "n1");
        let state_handle = cluster.state();
        {
            let mut state = state_handle.lock().unwrap();
            state.pods.push(MockPod {
                record: pod("default", "web-1", "n1"),
                controller: Some(controller(ControllerKind::Deployment, "default", "web")),
            });
            state
                .unavailable_replicas
                .insert(("default".to_string(), "web".to_string()), 1);
        }

        let eng = engine(&cluster);
        let settle = async {
            sleep(Duration::from_millis(10)).await;
            // No restart may fire while the rollout is in flight.
            assert!(state_handle.lock().unwrap().restarts.is_empty());
            state_handle
                .lock()
                .unwrap()
                .unavailable_replicas
                .insert(("default".to_string(), "web".to_string()), 0);
        };
        let (outcome, ()) = tokio::join!(eng.drain("n1"), settle);
        assert_eq!(outcome.unwrap(), DrainOutcome::Drained);

        let state = state_handle.lock().unwrap();
        assert_eq!(
            state.restarts,
            vec![("default".to_string(), "web".to_string())]
        );
        assert!(state.evictions.is_empty());
    }

    #[tokio::test]
    async fn test_unowned_and_bare_replicaset_pods_are_evicted() {
        let cluster = MockCluster::new();
        seed_node(&cluster, "n1");
        {
            let state = cluster.state();
            let mut state = state.lock().unwrap();
            let mut orphan = pod("default", "orphan", "n1");
            orphan.owner_ref = None;
            state.pods.push(MockPod {
                record: orphan,
                controller: None,
            });
            state.pods.push(MockPod {
                record: pod("default", "bare-rs-1", "n1"),
                controller: Some(controller(
                    ControllerKind::ReplicaSet,
                    "default",
                    "bare-rs",
                )),
            });
        }

        let outcome = engine(&cluster).drain("n1").await.unwrap();
        assert_eq!(outcome, DrainOutcome::Drained);

        let state = cluster.state();
        let state = state.lock().unwrap();
        assert_eq!(state.evictions.len(), 2);
        assert!(state.restarts.is_empty());
    }

    #[tokio::test]
    async fn test_terminating_pods_hold_the_drain_until_gone() {
        let cluster = MockCluster::new();
        seed_node(&cluster, "n1");
        let state_handle = cluster.state();
        {
            let mut state = state_handle.lock().unwrap();
            let mut leaving = pod("default", "leaving", "n1");
            leaving.terminating = true;
            state.pods.push(MockPod {
                record: leaving,
                controller: None,
            });
        }

        let eng = engine(&cluster);
        let reap = async {
            sleep(Duration::from_millis(10)).await;
            state_handle
                .lock()
                .unwrap()
                .pods
                .retain(|p| p.record.name != "leaving");
        };
        let (outcome, ()) = tokio::join!(eng.drain("n1"), reap);
        assert_eq!(outcome.unwrap(), DrainOutcome::Drained);

        // A terminating pod is counted down, never acted on.
        let state = state_handle.lock().unwrap();
        assert!(state.evictions.is_empty());
    }
}
