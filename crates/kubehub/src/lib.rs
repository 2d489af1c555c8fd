//! Serpent kube integration: shared client bootstrap and the resource kind
//! registry exposing uniform list/delete over every supported kind.

#![forbid(unsafe_code)]

use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, ReplicaSet, StatefulSet};
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::{
    ConfigMap, Node, PersistentVolume, Pod, Secret, Service, ServiceAccount,
};
use k8s_openapi::api::networking::v1::{Ingress, NetworkPolicy};
use k8s_openapi::{ClusterResourceScope, NamespaceResourceScope};
use kube::api::{Api, DeleteParams, ListParams};
use kube::{Client, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use tokio::sync::OnceCell;
use tracing::debug;

use serpent_core::{ResourceKind, ResourceRecord};

/// Annotation marking a pod the scheduler considers critical.
pub const CRITICAL_POD_ANNOTATION: &str = "scheduler.alpha.kubernetes.io/critical-pod";

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("upstream api error: {0}")]
    Upstream(#[from] kube::Error),
    #[error("unsupported resource kind: {0}")]
    UnsupportedKind(String),
    #[error("{0} requires a namespace")]
    MissingNamespace(ResourceKind),
}

static CLIENT: OnceCell<Client> = OnceCell::const_new();

/// Shared client: kubeconfig first, in-cluster config as fallback.
/// Initialized once; later callers get a cheap clone.
pub async fn get_kube_client() -> Result<Client, RegistryError> {
    let client = CLIENT
        .get_or_try_init(|| async { Client::try_default().await })
        .await?;
    Ok(client.clone())
}

/// Pods the chaos pipeline must never touch: the legacy critical-pod
/// annotation or a system-reserved priority class.
pub fn is_critical_pod(pod: &Pod) -> bool {
    let annotated = pod
        .metadata
        .annotations
        .as_ref()
        .map_or(false, |a| a.contains_key(CRITICAL_POD_ANNOTATION));
    let reserved_priority = pod
        .spec
        .as_ref()
        .and_then(|s| s.priority_class_name.as_deref())
        .map_or(false, |p| p == "system-cluster-critical" || p == "system-node-critical");
    annotated || reserved_priority
}

async fn list_namespaced<K>(
    client: Client,
    kind: ResourceKind,
    ns: Option<&str>,
) -> Result<Vec<ResourceRecord>, RegistryError>
where
    K: Resource<Scope = NamespaceResourceScope> + Clone + DeserializeOwned + std::fmt::Debug,
    <K as Resource>::DynamicType: Default,
{
    let api: Api<K> = match ns {
        Some(ns) => Api::namespaced(client, ns),
        None => Api::all(client),
    };
    let list = api.list(&ListParams::default()).await?;
    Ok(list
        .items
        .into_iter()
        .map(|o| ResourceRecord { kind, name: o.name_any(), namespace: o.namespace() })
        .collect())
}

async fn list_cluster<K>(client: Client, kind: ResourceKind) -> Result<Vec<ResourceRecord>, RegistryError>
where
    K: Resource<Scope = ClusterResourceScope> + Clone + DeserializeOwned + std::fmt::Debug,
    <K as Resource>::DynamicType: Default,
{
    let api: Api<K> = Api::all(client);
    let list = api.list(&ListParams::default()).await?;
    Ok(list
        .items
        .into_iter()
        .map(|o| ResourceRecord { kind, name: o.name_any(), namespace: None })
        .collect())
}

/// A 404 on delete means the object vanished on its own; deletions are
/// idempotent so that outcome counts as success.
pub fn is_already_gone(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(ae) if ae.code == 404)
}

async fn delete_one<K>(api: Api<K>, record: &ResourceRecord) -> Result<(), RegistryError>
where
    K: Resource + Clone + DeserializeOwned + std::fmt::Debug,
    <K as Resource>::DynamicType: Default,
{
    match api.delete(&record.name, &DeleteParams::default()).await {
        Ok(_) => Ok(()),
        Err(e) if is_already_gone(&e) => {
            debug!(record = %record, "object already gone");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

/// Uniform list/delete over the closed kind set. Adding a kind means adding
/// one enum variant and one arm per operation; call sites stay untouched.
#[derive(Clone)]
pub struct KindRegistry {
    client: Client,
}

impl KindRegistry {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// List objects of `kind`. `ns = None` lists across all namespaces for
    /// namespaced kinds and is ignored for cluster-scoped ones. When
    /// `protect_critical` is set, pods carrying a critical marker are
    /// dropped here, before any namespace filtering applies.
    pub async fn list(
        &self,
        kind: ResourceKind,
        ns: Option<&str>,
        protect_critical: bool,
    ) -> Result<Vec<ResourceRecord>, RegistryError> {
        let client = self.client.clone();
        match kind {
            ResourceKind::Pod => self.list_pods(ns, protect_critical).await,
            ResourceKind::ReplicaSet => list_namespaced::<ReplicaSet>(client, kind, ns).await,
            ResourceKind::Deployment => list_namespaced::<Deployment>(client, kind, ns).await,
            ResourceKind::StatefulSet => list_namespaced::<StatefulSet>(client, kind, ns).await,
            ResourceKind::DaemonSet => list_namespaced::<DaemonSet>(client, kind, ns).await,
            ResourceKind::Job => list_namespaced::<Job>(client, kind, ns).await,
            ResourceKind::Node => list_cluster::<Node>(client, kind).await,
            ResourceKind::PersistentVolume => list_cluster::<PersistentVolume>(client, kind).await,
            ResourceKind::ConfigMap => list_namespaced::<ConfigMap>(client, kind, ns).await,
            ResourceKind::Secret => list_namespaced::<Secret>(client, kind, ns).await,
            ResourceKind::ServiceAccount => list_namespaced::<ServiceAccount>(client, kind, ns).await,
            ResourceKind::NetworkPolicy => list_namespaced::<NetworkPolicy>(client, kind, ns).await,
            ResourceKind::Service => list_namespaced::<Service>(client, kind, ns).await,
            ResourceKind::Ingress => list_namespaced::<Ingress>(client, kind, ns).await,
        }
    }

    async fn list_pods(
        &self,
        ns: Option<&str>,
        protect_critical: bool,
    ) -> Result<Vec<ResourceRecord>, RegistryError> {
        let api: Api<Pod> = match ns {
            Some(ns) => Api::namespaced(self.client.clone(), ns),
            None => Api::all(self.client.clone()),
        };
        let list = api.list(&ListParams::default()).await?;
        Ok(list
            .items
            .into_iter()
            .filter(|p| !(protect_critical && is_critical_pod(p)))
            .map(|p| ResourceRecord {
                kind: ResourceKind::Pod,
                name: p.name_any(),
                namespace: p.namespace(),
            })
            .collect())
    }

    pub async fn delete(&self, record: &ResourceRecord) -> Result<(), RegistryError> {
        let client = self.client.clone();
        if record.kind.cluster_scoped() {
            return match record.kind {
                ResourceKind::Node => delete_one::<Node>(Api::all(client), record).await,
                ResourceKind::PersistentVolume => {
                    delete_one::<PersistentVolume>(Api::all(client), record).await
                }
                _ => unreachable!("cluster_scoped covers exactly these kinds"),
            };
        }
        let ns = record
            .namespace
            .as_deref()
            .ok_or(RegistryError::MissingNamespace(record.kind))?;
        match record.kind {
            ResourceKind::Pod => delete_one::<Pod>(Api::namespaced(client, ns), record).await,
            ResourceKind::ReplicaSet => {
                delete_one::<ReplicaSet>(Api::namespaced(client, ns), record).await
            }
            ResourceKind::Deployment => {
                delete_one::<Deployment>(Api::namespaced(client, ns), record).await
            }
            ResourceKind::StatefulSet => {
                delete_one::<StatefulSet>(Api::namespaced(client, ns), record).await
            }
            ResourceKind::DaemonSet => {
                delete_one::<DaemonSet>(Api::namespaced(client, ns), record).await
            }
            ResourceKind::Job => delete_one::<Job>(Api::namespaced(client, ns), record).await,
            ResourceKind::ConfigMap => {
                delete_one::<ConfigMap>(Api::namespaced(client, ns), record).await
            }
            ResourceKind::Secret => delete_one::<Secret>(Api::namespaced(client, ns), record).await,
            ResourceKind::ServiceAccount => {
                delete_one::<ServiceAccount>(Api::namespaced(client, ns), record).await
            }
            ResourceKind::NetworkPolicy => {
                delete_one::<NetworkPolicy>(Api::namespaced(client, ns), record).await
            }
            ResourceKind::Service => {
                delete_one::<Service>(Api::namespaced(client, ns), record).await
            }
            ResourceKind::Ingress => {
                delete_one::<Ingress>(Api::namespaced(client, ns), record).await
            }
            ResourceKind::Node | ResourceKind::PersistentVolume => {
                unreachable!("handled by the cluster-scoped branch")
            }
        }
    }
}
