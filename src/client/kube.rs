//! Kubernetes adapter for the cluster contract
//!
//! Thin conversion layer between the cluster API and the domain records the
//! engines consume. All policy lives in the engines; the only behavior here
//! is what belongs to the wire: bounded re-fetch-and-reapply on conflicting
//! node updates, and not-found tolerated as success on evictions.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use k8s_openapi::api::apps::v1::{Deployment, ReplicaSet};
use k8s_openapi::api::core::v1::{Node, Pod};
use kube::api::{Api, EvictParams, ListParams, Patch, PatchParams, PostParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use tokio::time::sleep;
use tracing::debug;

use crate::cluster::api::ClusterApi;
use crate::cluster::types::{
    ClusterError, ControllerKind, ControllerRef, NodeRecord, OwnerRef, PodPhase, PodRecord,
    TaintRecord,
};
use crate::selector::Selector;

/// Attempts at reapplying a node update over conflicting concurrent writers.
const CONFLICT_RETRY_BUDGET: u32 = 5;
const CONFLICT_RETRY_DELAY: Duration = Duration::from_millis(500);

pub struct KubeClusterApi {
    client: Client,
}

impl KubeClusterApi {
    /// Build a client from an explicit kubeconfig path, or from the
    /// standard discovery rules (environment, default path, in-cluster)
    /// when none is given.
    pub async fn new(kubeconfig: Option<&Path>) -> Result<Self, ClusterError> {
        let client = match kubeconfig {
            Some(path) => {
                let kubeconfig = Kubeconfig::read_from(path)
                    .map_err(|e| ClusterError::Init(e.to_string()))?;
                let config =
                    Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                        .await
                        .map_err(|e| ClusterError::Init(e.to_string()))?;
                Client::try_from(config).map_err(|e| ClusterError::Init(e.to_string()))?
            }
            None => Client::try_default()
                .await
                .map_err(|e| ClusterError::Init(e.to_string()))?,
        };
        Ok(Self { client })
    }

    fn nodes(&self) -> Api<Node> {
        Api::all(self.client.clone())
    }

    fn pods(&self) -> Api<Pod> {
        Api::all(self.client.clone())
    }
}

#[async_trait]
impl ClusterApi for KubeClusterApi {
    async fn list_nodes(&self) -> Result<Vec<NodeRecord>, ClusterError> {
        let nodes = self
            .nodes()
            .list(&ListParams::default())
            .await
            .map_err(|e| ClusterError::Query(e.to_string()))?;
        Ok(nodes.into_iter().map(node_record).collect())
    }

    async fn list_pods_on_node(&self, node_name: &str) -> Result<Vec<PodRecord>, ClusterError> {
        let params = ListParams::default().fields(&format!("spec.nodeName={}", node_name));
        let pods = self
            .pods()
            .list(&params)
            .await
            .map_err(|e| ClusterError::Query(e.to_string()))?;
        Ok(pods.into_iter().map(pod_record).collect())
    }

    async fn list_pods(&self, selector: Option<&Selector>) -> Result<Vec<PodRecord>, ClusterError> {
        let mut params = ListParams::default();
        if let Some(selector) = selector {
            params = params.labels(&selector.to_string());
        }
        let pods = self
            .pods()
            .list(&params)
            .await
            .map_err(|e| ClusterError::Query(e.to_string()))?;
        Ok(pods.into_iter().map(pod_record).collect())
    }

    async fn owning_controller(
        &self,
        pod: &PodRecord,
    ) -> Result<Option<ControllerRef>, ClusterError> {
        let Some(owner) = &pod.owner_ref else {
            return Ok(None);
        };

        let kind = ControllerKind::from_api(&owner.kind);
        if kind != ControllerKind::ReplicaSet {
            return Ok(Some(ControllerRef {
                kind,
                namespace: pod.namespace.clone(),
                name: owner.name.clone(),
            }));
        }

        // A ReplicaSet is usually itself owned by a Deployment; resolve one
        // hop further so the drain engine sees the controller that actually
        // drives the rollout.
        let replica_sets: Api<ReplicaSet> = Api::namespaced(self.client.clone(), &pod.namespace);
        let bare = ControllerRef {
            kind: ControllerKind::ReplicaSet,
            namespace: pod.namespace.clone(),
            name: owner.name.clone(),
        };
        let replica_set = match replica_sets.get(&owner.name).await {
            Ok(rs) => rs,
            // Owner already deleted: treat the pod as bare-ReplicaSet-owned.
            Err(kube::Error::Api(e)) if e.code == 404 => return Ok(Some(bare)),
            Err(e) => return Err(ClusterError::Query(e.to_string())),
        };

        let parent = replica_set
            .metadata
            .owner_references
            .as_ref()
            .and_then(|refs| refs.iter().find(|r| r.controller == Some(true)));
        Ok(Some(match parent {
            Some(parent) => ControllerRef {
                kind: ControllerKind::from_api(&parent.kind),
                namespace: pod.namespace.clone(),
                name: parent.name.clone(),
            },
            None => bare,
        }))
    }

    async fn controller_unavailable_replicas(
        &self,
        controller: &ControllerRef,
    ) -> Result<i32, ClusterError> {
        let deployments: Api<Deployment> =
            Api::namespaced(self.client.clone(), &controller.namespace);
        let deployment = deployments
            .get(&controller.name)
            .await
            .map_err(|e| ClusterError::Query(e.to_string()))?;
        Ok(deployment
            .status
            .and_then(|s| s.unavailable_replicas)
            .unwrap_or(0))
    }

    async fn trigger_rollout_restart(
        &self,
        controller: &ControllerRef,
    ) -> Result<(), ClusterError> {
        let deployments: Api<Deployment> =
            Api::namespaced(self.client.clone(), &controller.namespace);
        let patch = serde_json::json!({
            "spec": {
                "template": {
                    "metadata": {
                        "annotations": {
                            "kubectl.kubernetes.io/restartedAt": Utc::now().to_rfc3339(),
                        }
                    }
                }
            }
        });
        deployments
            .patch(
                &controller.name,
                &PatchParams::default(),
                &Patch::Strategic(patch),
            )
            .await
            .map_err(|e| ClusterError::Update(e.to_string()))?;
        Ok(())
    }

    async fn set_unschedulable(
        &self,
        node_name: &str,
        unschedulable: bool,
    ) -> Result<(), ClusterError> {
        let nodes = self.nodes();
        for attempt in 1..=CONFLICT_RETRY_BUDGET {
            let mut node = nodes
                .get(node_name)
                .await
                .map_err(|e| ClusterError::Query(e.to_string()))?;
            node.spec.get_or_insert_with(Default::default).unschedulable = Some(unschedulable);

            match nodes.replace(node_name, &PostParams::default(), &node).await {
                Ok(_) => return Ok(()),
                Err(kube::Error::Api(e)) if e.code == 409 => {
                    debug!(
                        "Conflicting update on node {} (attempt {}); refetching",
                        node_name, attempt
                    );
                    sleep(CONFLICT_RETRY_DELAY).await;
                }
                Err(e) => return Err(ClusterError::Update(e.to_string())),
            }
        }
        Err(ClusterError::CordonConflict(
            node_name.to_string(),
            CONFLICT_RETRY_BUDGET,
        ))
    }

    async fn evict_pod(&self, namespace: &str, name: &str) -> Result<(), ClusterError> {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        match pods.evict(name, &EvictParams::default()).await {
            Ok(_) => Ok(()),
            // Already gone is what an eviction is for.
            Err(kube::Error::Api(e)) if e.code == 404 => Ok(()),
            Err(e) => Err(ClusterError::Eviction(
                namespace.to_string(),
                name.to_string(),
                e.to_string(),
            )),
        }
    }
}

fn node_record(node: Node) -> NodeRecord {
    let spec = node.spec.unwrap_or_default();
    let status = node.status.unwrap_or_default();

    let ready = status
        .conditions
        .as_ref()
        .map(|conditions| {
            conditions
                .iter()
                .any(|c| c.type_ == "Ready" && c.status == "True")
        })
        .unwrap_or(false);
    let version = status
        .node_info
        .map(|info| info.kubelet_version)
        .unwrap_or_default();
    let taints = spec
        .taints
        .unwrap_or_default()
        .into_iter()
        .map(|t| TaintRecord {
            key: t.key,
            value: t.value,
            effect: t.effect,
        })
        .collect();

    NodeRecord {
        name: node.metadata.name.unwrap_or_default(),
        instance_id: spec.provider_id.as_deref().map(instance_id_from_provider),
        version,
        labels: node.metadata.labels.unwrap_or_default(),
        unschedulable: spec.unschedulable.unwrap_or(false),
        ready,
        taints,
    }
}

fn pod_record(pod: Pod) -> PodRecord {
    let meta = pod.metadata;
    let owner_ref = meta
        .owner_references
        .as_ref()
        .and_then(|refs| refs.iter().find(|r| r.controller == Some(true)))
        .map(|r| OwnerRef {
            kind: r.kind.clone(),
            name: r.name.clone(),
        });

    PodRecord {
        namespace: meta.namespace.unwrap_or_default(),
        name: meta.name.unwrap_or_default(),
        node_name: pod.spec.and_then(|s| s.node_name),
        phase: pod
            .status
            .and_then(|s| s.phase)
            .map(|p| PodPhase::from_api(&p))
            .unwrap_or(PodPhase::Unknown),
        terminating: meta.deletion_timestamp.is_some(),
        labels: meta.labels.unwrap_or_default(),
        owner_ref,
    }
}

/// Provider ids are URI-shaped (`scheme://…/instance-id`); the final
/// non-empty path segment is the stable instance identifier.
fn instance_id_from_provider(provider_id: &str) -> String {
    provider_id
        .rsplit('/')
        .find(|segment| !segment.is_empty())
        .unwrap_or(provider_id)
        .to_string()
}
