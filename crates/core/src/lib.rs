//! Serpent core types: resource kinds, records, and namespace filtering.

#![forbid(unsafe_code)]

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Namespace hosting control-plane components. Excluded by default and only
/// offered for deletion when listed verbatim in the include list.
pub const CONTROL_PLANE_NAMESPACE: &str = "kube-system";

/// Closed set of object kinds the registry knows how to list and delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    Pod,
    ReplicaSet,
    Deployment,
    StatefulSet,
    DaemonSet,
    Job,
    Node,
    PersistentVolume,
    ConfigMap,
    Secret,
    ServiceAccount,
    NetworkPolicy,
    Service,
    Ingress,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 14] = [
        ResourceKind::Pod,
        ResourceKind::ReplicaSet,
        ResourceKind::Deployment,
        ResourceKind::StatefulSet,
        ResourceKind::DaemonSet,
        ResourceKind::Job,
        ResourceKind::Node,
        ResourceKind::PersistentVolume,
        ResourceKind::ConfigMap,
        ResourceKind::Secret,
        ResourceKind::ServiceAccount,
        ResourceKind::NetworkPolicy,
        ResourceKind::Service,
        ResourceKind::Ingress,
    ];

    /// Cluster-scoped kinds carry no namespace; namespace rules are
    /// vacuously true for them.
    pub fn cluster_scoped(&self) -> bool {
        matches!(self, ResourceKind::Node | ResourceKind::PersistentVolume)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Pod => "pod",
            ResourceKind::ReplicaSet => "replicaset",
            ResourceKind::Deployment => "deployment",
            ResourceKind::StatefulSet => "statefulset",
            ResourceKind::DaemonSet => "daemonset",
            ResourceKind::Job => "job",
            ResourceKind::Node => "node",
            ResourceKind::PersistentVolume => "persistentvolume",
            ResourceKind::ConfigMap => "configmap",
            ResourceKind::Secret => "secret",
            ResourceKind::ServiceAccount => "serviceaccount",
            ResourceKind::NetworkPolicy => "networkpolicy",
            ResourceKind::Service => "service",
            ResourceKind::Ingress => "ingress",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raised when configuration references a kind the registry does not carry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported resource kind: {0}")]
pub struct UnsupportedKind(pub String);

impl FromStr for ResourceKind {
    type Err = UnsupportedKind;

    /// Accepts the plural config spellings ("pods") as well as the singular.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let kind = match s {
            "pod" | "pods" => ResourceKind::Pod,
            "replicaset" | "replicasets" => ResourceKind::ReplicaSet,
            "deployment" | "deployments" => ResourceKind::Deployment,
            "statefulset" | "statefulsets" => ResourceKind::StatefulSet,
            "daemonset" | "daemonsets" => ResourceKind::DaemonSet,
            "job" | "jobs" => ResourceKind::Job,
            "node" | "nodes" => ResourceKind::Node,
            "persistentvolume" | "persistentvolumes" => ResourceKind::PersistentVolume,
            "configmap" | "configmaps" => ResourceKind::ConfigMap,
            "secret" | "secrets" => ResourceKind::Secret,
            "serviceaccount" | "serviceaccounts" => ResourceKind::ServiceAccount,
            "networkpolicy" | "networkpolicies" => ResourceKind::NetworkPolicy,
            "service" | "services" => ResourceKind::Service,
            "ingress" | "ingresses" => ResourceKind::Ingress,
            other => return Err(UnsupportedKind(other.to_string())),
        };
        Ok(kind)
    }
}

/// A deletable cluster object. Identity is (kind, namespace, name);
/// immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRecord {
    pub kind: ResourceKind,
    pub name: String,
    /// `None` for cluster-scoped kinds.
    pub namespace: Option<String>,
}

impl fmt::Display for ResourceRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{} {} in namespace {}", self.kind, self.name, ns),
            None => write!(f, "{} {}", self.kind, self.name),
        }
    }
}

/// Namespace include/exclude rules plus the critical-object guard flag.
///
/// `kube-system` is excluded regardless of the exclude list; the only way to
/// expose it is naming it verbatim in `include`. That override is deliberate
/// and the sole exception to the default guard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterConfig {
    pub include: BTreeSet<String>,
    pub exclude: BTreeSet<String>,
    /// When set, objects carrying a scheduler-critical marker are dropped
    /// at listing time, independent of namespace rules.
    pub protect_critical: bool,
}

impl Default for FilterConfig {
    fn default() -> Self {
        let mut exclude = BTreeSet::new();
        exclude.insert(CONTROL_PLANE_NAMESPACE.to_string());
        Self { include: BTreeSet::new(), exclude, protect_critical: true }
    }
}

impl FilterConfig {
    pub fn new<I, E>(include: I, exclude: E, protect_critical: bool) -> Self
    where
        I: IntoIterator<Item = String>,
        E: IntoIterator<Item = String>,
    {
        Self {
            include: include.into_iter().collect(),
            exclude: exclude.into_iter().collect(),
            protect_critical,
        }
    }

    /// Namespace rules, applied in order: control-plane guard (overridable
    /// only via the include list), include list, exclude list.
    pub fn allows_namespace(&self, ns: &str) -> bool {
        if ns == CONTROL_PLANE_NAMESPACE && !self.include.contains(ns) {
            return false;
        }
        if !self.include.is_empty() && !self.include.contains(ns) {
            return false;
        }
        !self.exclude.contains(ns)
    }

    /// Cluster-scoped records (no namespace) match vacuously.
    pub fn allows(&self, ns: Option<&str>) -> bool {
        match ns {
            Some(ns) => self.allows_namespace(ns),
            None => true,
        }
    }

    /// Pure eligibility filter over a listed object set. Deterministic:
    /// keeps input order, no side effects. The critical-object rule is
    /// kind-specific and applied at listing time by the registry.
    pub fn eligible(&self, records: Vec<ResourceRecord>) -> Vec<ResourceRecord> {
        records
            .into_iter()
            .filter(|r| self.allows(r.namespace.as_deref()))
            .collect()
    }
}
