use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Ingress side of the graph: detected gateways, raw ingress resources, the
/// routes they declare, and the evaluated gateway-to-service edges.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct IngressInfo {
    pub gateways: Vec<GatewayNode>,
    pub ingresses: Vec<IngressResource>,
    pub routes: Vec<GatewayRoute>,
    pub connections: Vec<GatewayEdge>,
}

/// Egress side of the graph.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct EgressInfo {
    pub gateways: Vec<GatewayNode>,
    pub external_services: Vec<ExternalService>,
    pub connections: Vec<GatewayEdge>,
    pub has_egress_gateway: bool,
    pub direct_egress: bool,
}

/// A detected ingress or egress gateway workload.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GatewayNode {
    pub name: String,
    pub namespace: String,
    pub kind: RouteKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hosts: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub selector: BTreeMap<String, String>,
}

/// A Kubernetes Ingress resource, normalized.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct IngressResource {
    pub name: String,
    pub namespace: String,
    pub hosts: Vec<String>,
    pub paths: Vec<String>,
    pub backend: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub backend_port: String,
    pub tls: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub class: String,
}

/// One declared route: host + path forwarded to a backend service.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GatewayRoute {
    pub gateway: String,
    pub host: String,
    pub path: String,
    pub service: String,
    pub namespace: String,
    pub allowed: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub blocked_by: Vec<String>,
    pub kind: RouteKind,
}

/// Where a gateway or route was declared.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteKind {
    /// A Kubernetes Ingress (nginx-class or unclassed).
    #[default]
    Ingress,
    /// A service-mesh gateway / virtual-service route.
    Mesh,
}

/// A gateway-to-service (or service-to-egress) edge with its verdict.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GatewayEdge {
    pub from: String,
    /// Target graph key.
    pub to: String,
    pub allowed: bool,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub policies: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub port: String,
    /// Set when the edge is routed through the mesh rather than directly.
    pub via_mesh: bool,
    /// Direct egress with no gateway in between.
    pub direct: bool,
}

/// An external-service declaration (e.g. a mesh ServiceEntry).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ExternalService {
    pub name: String,
    pub namespace: String,
    pub hosts: Vec<String>,
    pub ports: Vec<String>,
}
