//! End-to-end cycling scenarios against in-memory API fakes
//!
//! These tests drive the public orchestrator API with fake cluster and
//! pool backends that mutate shared state the way the real control planes
//! would: a scale request eventually delivers a joined node, a rollout
//! restart reschedules the controller's pods away, an eviction removes the
//! pod.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use nodecycle::cluster::{
    ClusterApi, ClusterError, ControllerKind, ControllerRef, CycleOrchestrator, NodeRecord,
    OwnerRef, PodPhase, PodRecord,
};
use nodecycle::config::{CycleConfig, DEFAULT_POOL_LABEL};
use nodecycle::pool::{NodePool, NodepoolApi, PoolError};
use nodecycle::selector::Selector;

#[derive(Default)]
struct SharedState {
    nodes: Vec<NodeRecord>,
    pods: Vec<(PodRecord, Option<ControllerRef>)>,
    unavailable: HashMap<(String, String), i32>,
    pool_sizes: HashMap<String, i64>,
    // Call logs.
    cordons: Vec<(String, bool)>,
    evictions: Vec<(String, String)>,
    restarts: Vec<(String, String)>,
    scales: Vec<(String, i64)>,
    pool_evictions: Vec<(String, Vec<String>)>,
}

struct FakeCluster(Arc<Mutex<SharedState>>);

#[async_trait]
impl ClusterApi for FakeCluster {
    async fn list_nodes(&self) -> Result<Vec<NodeRecord>, ClusterError> {
        Ok(self.0.lock().unwrap().nodes.clone())
    }

    async fn list_pods_on_node(&self, node_name: &str) -> Result<Vec<PodRecord>, ClusterError> {
        Ok(self
            .0
            .lock()
            .unwrap()
            .pods
            .iter()
            .filter(|(p, _)| p.node_name.as_deref() == Some(node_name))
            .map(|(p, _)| p.clone())
            .collect())
    }

    async fn list_pods(
        &self,
        selector: Option<&Selector>,
    ) -> Result<Vec<PodRecord>, ClusterError> {
        Ok(self
            .0
            .lock()
            .unwrap()
            .pods
            .iter()
            .filter(|(p, _)| selector.map(|s| s.matches(&p.labels)).unwrap_or(true))
            .map(|(p, _)| p.clone())
            .collect())
    }

    async fn owning_controller(
        &self,
        pod: &PodRecord,
    ) -> Result<Option<ControllerRef>, ClusterError> {
        Ok(self
            .0
            .lock()
            .unwrap()
            .pods
            .iter()
            .find(|(p, _)| p.namespace == pod.namespace && p.name == pod.name)
            .and_then(|(_, ctrl)| ctrl.clone()))
    }

    async fn controller_unavailable_replicas(
        &self,
        controller: &ControllerRef,
    ) -> Result<i32, ClusterError> {
        Ok(*self
            .0
            .lock()
            .unwrap()
            .unavailable
            .get(&(controller.namespace.clone(), controller.name.clone()))
            .unwrap_or(&0))
    }

    async fn trigger_rollout_restart(
        &self,
        controller: &ControllerRef,
    ) -> Result<(), ClusterError> {
        let mut state = self.0.lock().unwrap();
        state
            .restarts
            .push((controller.namespace.clone(), controller.name.clone()));
        // The controller reschedules its pods onto other nodes.
        state.pods.retain(|(_, ctrl)| ctrl.as_ref() != Some(controller));
        Ok(())
    }

    async fn set_unschedulable(
        &self,
        node_name: &str,
        unschedulable: bool,
    ) -> Result<(), ClusterError> {
        let mut state = self.0.lock().unwrap();
        state.cordons.push((node_name.to_string(), unschedulable));
        if let Some(node) = state.nodes.iter_mut().find(|n| n.name == node_name) {
            node.unschedulable = unschedulable;
        }
        Ok(())
    }

    async fn evict_pod(&self, namespace: &str, name: &str) -> Result<(), ClusterError> {
        let mut state = self.0.lock().unwrap();
        state
            .evictions
            .push((namespace.to_string(), name.to_string()));
        state
            .pods
            .retain(|(p, _)| !(p.namespace == namespace && p.name == name));
        Ok(())
    }
}

struct FakePool(Arc<Mutex<SharedState>>);

#[async_trait]
impl NodepoolApi for FakePool {
    async fn get_pool(&self, pool_id: &str) -> Result<NodePool, PoolError> {
        match self.0.lock().unwrap().pool_sizes.get(pool_id) {
            Some(&size) => Ok(NodePool {
                id: pool_id.to_string(),
                size,
            }),
            None => Err(PoolError::Api {
                status: 404,
                message: format!("pool {} not found", pool_id),
            }),
        }
    }

    async fn scale_pool(&self, pool_id: &str, size: i64) -> Result<(), PoolError> {
        let mut state = self.0.lock().unwrap();
        state.pool_sizes.insert(pool_id.to_string(), size);
        state.scales.push((pool_id.to_string(), size));
        // The control plane provisions a replacement on the target version.
        let name = format!("{}-new-{}", pool_id, size);
        state.nodes.push(node(&name, "v1.31.0", pool_id));
        Ok(())
    }

    async fn evict_members(
        &self,
        pool_id: &str,
        instance_ids: &[String],
    ) -> Result<(), PoolError> {
        self.0
            .lock()
            .unwrap()
            .pool_evictions
            .push((pool_id.to_string(), instance_ids.to_vec()));
        Ok(())
    }
}

fn node(name: &str, version: &str, pool_id: &str) -> NodeRecord {
    NodeRecord {
        name: name.to_string(),
        instance_id: Some(format!("i-{}", name)),
        version: version.to_string(),
        labels: [(DEFAULT_POOL_LABEL.to_string(), pool_id.to_string())]
            .into_iter()
            .collect(),
        unschedulable: false,
        ready: true,
        taints: Vec::new(),
    }
}

fn pod(
    namespace: &str,
    name: &str,
    node: &str,
    owner: Option<(&str, &str)>,
) -> PodRecord {
    PodRecord {
        namespace: namespace.to_string(),
        name: name.to_string(),
        node_name: Some(node.to_string()),
        phase: PodPhase::Running,
        terminating: false,
        labels: BTreeMap::new(),
        owner_ref: owner.map(|(kind, name)| OwnerRef {
            kind: kind.to_string(),
            name: name.to_string(),
        }),
    }
}

fn controller(kind: ControllerKind, namespace: &str, name: &str) -> ControllerRef {
    ControllerRef {
        kind,
        namespace: namespace.to_string(),
        name: name.to_string(),
    }
}

fn fast_config() -> CycleConfig {
    CycleConfig {
        target_version: "v1.31.0".to_string(),
        pool_label: DEFAULT_POOL_LABEL.to_string(),
        override_selector: None,
        workload_selector: None,
        node_poll_interval: Duration::from_millis(2),
        pod_poll_interval: Duration::from_millis(2),
        max_wait: Some(Duration::from_secs(5)),
    }
}

#[tokio::test]
async fn test_single_outdated_node_cycles_with_daemon_skip_and_one_restart() {
    let state = Arc::new(Mutex::new(SharedState::default()));
    {
        let mut s = state.lock().unwrap();
        s.nodes.push(node("n1", "v1.30.2", "p1"));
        s.nodes.push(node("n2", "v1.31.0", "p1"));
        s.nodes.push(node("n3", "v1.31.0", "p1"));
        s.pool_sizes.insert("p1".to_string(), 3);

        s.pods.push((
            pod("kube-system", "agent-n1", "n1", Some(("DaemonSet", "agent"))),
            Some(controller(ControllerKind::DaemonSet, "kube-system", "agent")),
        ));
        // A pod owned by a ReplicaSet owned by a Deployment with a clean
        // rollout status.
        s.pods.push((
            pod("default", "web-1", "n1", Some(("ReplicaSet", "web-rs"))),
            Some(controller(ControllerKind::Deployment, "default", "web")),
        ));
    }

    let cluster = FakeCluster(state.clone());
    let pool = FakePool(state.clone());
    let config = fast_config();

    let report = CycleOrchestrator::new(&cluster, &pool, &config)
        .run()
        .await
        .unwrap();

    assert_eq!(report.visited, 3);
    assert_eq!(report.cycled, 1);
    assert_eq!(report.skipped, 2);
    assert_eq!(report.failed, 0);

    let s = state.lock().unwrap();
    // The pool grew 3 -> 4 exactly once.
    assert_eq!(s.scales, vec![("p1".to_string(), 4)]);
    // Only n1 was cordoned.
    assert_eq!(s.cordons, vec![("n1".to_string(), true)]);
    // The deployment pod was never evicted; one restart covered it.
    assert_eq!(s.evictions, vec![]);
    assert_eq!(s.restarts, vec![("default".to_string(), "web".to_string())]);
    // The daemon pod is still on n1.
    assert!(s
        .pods
        .iter()
        .any(|(p, _)| p.name == "agent-n1" && p.node_name.as_deref() == Some("n1")));
    // n1's instance was submitted for pool removal exactly once.
    assert_eq!(
        s.pool_evictions,
        vec![("p1".to_string(), vec!["i-n1".to_string()])]
    );
}

#[tokio::test]
async fn test_override_selector_cycles_node_already_on_target_version() {
    let state = Arc::new(Mutex::new(SharedState::default()));
    {
        let mut s = state.lock().unwrap();
        let mut n2 = node("n2", "v1.31.0", "p1");
        n2.labels
            .insert("recycle".to_string(), "true".to_string());
        s.nodes.push(n2);
        s.pool_sizes.insert("p1".to_string(), 1);
    }

    let cluster = FakeCluster(state.clone());
    let pool = FakePool(state.clone());
    let mut config = fast_config();
    config.override_selector = Some(Selector::parse("recycle=true").unwrap());

    let report = CycleOrchestrator::new(&cluster, &pool, &config)
        .run()
        .await
        .unwrap();

    assert_eq!(report.cycled, 1);
    assert_eq!(report.skipped, 0);

    let s = state.lock().unwrap();
    assert_eq!(s.cordons, vec![("n2".to_string(), true)]);
    assert_eq!(
        s.pool_evictions,
        vec![("p1".to_string(), vec!["i-n2".to_string()])]
    );
}

#[tokio::test]
async fn test_node_with_running_job_is_cordoned_but_never_removed_from_pool() {
    let state = Arc::new(Mutex::new(SharedState::default()));
    {
        let mut s = state.lock().unwrap();
        s.nodes.push(node("n1", "v1.30.2", "p1"));
        s.pool_sizes.insert("p1".to_string(), 1);

        let mut job_pod = pod("default", "batch-7-abc", "n1", Some(("Job", "batch-7")));
        job_pod.labels.insert(
            "batch.kubernetes.io/job-name".to_string(),
            "batch-7".to_string(),
        );
        s.pods.push((
            job_pod,
            Some(controller(ControllerKind::Job, "default", "batch-7")),
        ));
    }

    let cluster = FakeCluster(state.clone());
    let pool = FakePool(state.clone());
    let config = fast_config();

    let report = CycleOrchestrator::new(&cluster, &pool, &config)
        .run()
        .await
        .unwrap();

    assert_eq!(report.left_cordoned, 1);
    assert_eq!(report.cycled, 0);

    let s = state.lock().unwrap();
    assert_eq!(s.cordons, vec![("n1".to_string(), true)]);
    // The job pod stayed put and the node stayed in its pool.
    assert_eq!(s.evictions, vec![]);
    assert!(s.pool_evictions.is_empty());
    assert!(s
        .pods
        .iter()
        .any(|(p, _)| p.name == "batch-7-abc" && p.node_name.as_deref() == Some("n1")));
}
