use crate::{
    gateway::{EgressInfo, IngressInfo},
    policy::PolicyRule,
    Labels,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The complete result of one topology computation.
///
/// Built fresh per request (subject to caching); nothing here is persisted.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TopologyData {
    pub namespace: String,
    pub services: HashMap<String, ServiceNode>,
    pub connectivity: HashMap<String, ConnectivityInfo>,
    pub ingress: IngressInfo,
    pub egress: EgressInfo,
    pub policies: Vec<PolicyRule>,
    pub infrastructure: Infrastructure,
    pub summary: TopologySummary,
    #[serde(default)]
    pub rbac: RbacData,
    #[serde(default)]
    pub drift: DriftData,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// RBAC bindings, consumed only to annotate the topology; never evaluated
/// for policy.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RbacData {
    pub role_bindings: Vec<RoleBindingInfo>,
    pub cluster_role_bindings: Vec<RoleBindingInfo>,
    pub service_accounts: Vec<ServiceAccountInfo>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RoleBindingInfo {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,
    pub role_name: String,
    /// "Role" or "ClusterRole".
    pub role_kind: String,
    pub subjects: Vec<SubjectInfo>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SubjectInfo {
    pub kind: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ServiceAccountInfo {
    pub name: String,
    pub namespace: String,
}

/// GitOps reconciliation state reported by drift-source applications.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DriftData {
    pub argo_enabled: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub applications: Vec<DriftApplication>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DriftApplication {
    pub name: String,
    pub namespace: String,
    /// "Synced", "OutOfSync", or empty when unreported.
    pub status: String,
    pub repo_url: String,
    pub target_revision: String,
}

/// One service vertex with its derived metadata.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServiceNode {
    pub name: String,
    pub namespace: String,
    pub service_type: String,
    pub cluster_ip: String,
    /// `"[name:]port/PROTO"` per declared port.
    pub ports: Vec<String>,
    pub labels: Labels,
    pub pods: Vec<String>,
    pub pod_count: usize,
    pub healthy_pods: usize,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub deployment: String,
    pub mesh: MeshKind,
    pub pod_security: PodSecurity,
    pub drift_status: DriftStatus,
    /// Set by the policy evaluator once rules are known; the only field
    /// mutated after construction.
    pub has_policy: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traffic: Option<TrafficStats>,
}

/// Service-mesh membership derived from the service's backing pods.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeshKind {
    #[default]
    None,
    Istio,
    Cilium,
}

/// Pod Security Standards tier, derived from backing pod specs.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PodSecurity {
    Restricted,
    #[default]
    Baseline,
    Privileged,
}

/// GitOps reconciliation status mapped onto a service.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DriftStatus {
    Synced,
    OutOfSync,
    #[default]
    Unknown,
}

/// Best-effort traffic and cost signal from the metrics endpoint.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TrafficStats {
    /// Rolling request rate over the sampling window.
    pub rps: f64,
    pub cpu: String,
    pub memory: String,
    /// Estimated monthly saving were the service removed. Computed from the
    /// first matching pod's requests, assuming homogeneous replicas.
    pub potential_saving: String,
    pub likely_unused: bool,
}

/// All outgoing edges for one graph vertex.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ConnectivityInfo {
    pub service: String,
    pub connections: Vec<ConnectivityEdge>,
    pub can_reach: Vec<String>,
    pub blocked_from: Vec<String>,
}

/// One directed allow/block verdict between two graph vertices.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ConnectivityEdge {
    /// Target graph key (`namespace/name` or a gateway key).
    pub target: String,
    pub allowed: bool,
    pub reason: String,
    pub via_mesh: bool,
    pub mesh: MeshKind,
    pub blocked_by_policy: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub blocking_policies: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub port: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub protocol: String,
}

/// Cluster infrastructure detected before fetching.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Infrastructure {
    /// CNI identity inferred from daemonset naming ("cilium", "calico", ...).
    pub cni: String,
    pub cilium_enabled: bool,
    pub istio_enabled: bool,
    pub kyverno_enabled: bool,
    pub hubble_enabled: bool,
    pub native_policies: usize,
    pub ebpf_policies: usize,
    pub mesh_policies: usize,
}

/// Aggregate statistics over one computed topology.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TopologySummary {
    pub total_services: usize,
    pub services_with_mesh: usize,
    pub total_connections: usize,
    pub allowed_connections: usize,
    pub blocked_connections: usize,
    pub mesh_coverage: String,
}

// === impl MeshKind ===

impl MeshKind {
    pub fn is_meshed(&self) -> bool {
        !matches!(self, Self::None)
    }
}

impl std::fmt::Display for MeshKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => "none".fmt(f),
            Self::Istio => "istio".fmt(f),
            Self::Cilium => "cilium".fmt(f),
        }
    }
}

// === impl DriftStatus ===

impl DriftStatus {
    pub fn parse(status: &str) -> Self {
        match status {
            "Synced" => Self::Synced,
            "OutOfSync" => Self::OutOfSync,
            _ => Self::Unknown,
        }
    }
}

// === impl PodSecurity ===

impl std::fmt::Display for PodSecurity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Privileged => "privileged".fmt(f),
            Self::Baseline => "baseline".fmt(f),
            Self::Restricted => "restricted".fmt(f),
        }
    }
}

