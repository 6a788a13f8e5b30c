//! Hop-by-hop path tracing over a computed topology.
//!
//! The walk is a small state machine over `{Ingress, Service, Egress}`. It
//! consumes only precomputed edges; a trace never re-evaluates policy. Hops
//! stop at the first blocked edge, and the overall verdict is the AND of
//! every hop taken.

use crate::{
    topology::{MeshKind, TopologyData},
    EGRESS_GATEWAY, INGRESS_GATEWAY,
};
use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HopKind {
    Ingress,
    Service,
    Egress,
}

/// One traversed edge.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PathHop {
    pub from: String,
    pub to: String,
    pub kind: HopKind,
    pub allowed: bool,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub policies: Vec<String>,
    pub mesh: MeshKind,
}

/// An ordered walk from source to destination with its overall verdict.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PathTrace {
    pub source: String,
    pub destination: String,
    pub path: Vec<PathHop>,
    pub allowed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocked_at: Option<PathHop>,
    pub reason: String,
}

/// A parsed trace endpoint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Endpoint {
    Ingress,
    Egress,
    Service(String),
}

// === impl Endpoint ===

impl Endpoint {
    /// `"ingress-gateway"` and `"egress-gateway"`/`"external"` name the
    /// synthetic vertices; anything else is a service key or bare name.
    pub fn parse(endpoint: &str) -> Self {
        match endpoint {
            INGRESS_GATEWAY => Self::Ingress,
            EGRESS_GATEWAY | "external" => Self::Egress,
            other => Self::Service(other.to_string()),
        }
    }
}

// === impl PathTrace ===

impl PathTrace {
    fn new(source: &str, destination: &str) -> Self {
        Self {
            source: source.to_string(),
            destination: destination.to_string(),
            path: Vec::new(),
            allowed: true,
            blocked_at: None,
            reason: String::new(),
        }
    }

    fn dead_end(&mut self, reason: impl ToString) {
        self.allowed = false;
        self.reason = reason.to_string();
    }

    /// Appends a hop; on a blocked hop the trace is finalized and `false`
    /// is returned so callers stop extending the path.
    fn push(&mut self, hop: PathHop, blocked_prefix: &str) -> bool {
        let allowed = hop.allowed;
        if !allowed {
            self.allowed = false;
            self.reason = format!("{}: {}", blocked_prefix, hop.reason);
            self.blocked_at = Some(hop.clone());
        }
        self.path.push(hop);
        allowed
    }
}

/// Qualifies a bare service name with the request namespace.
fn qualify(service: &str, namespace: &str) -> String {
    if !service.contains('/') && !namespace.is_empty() {
        return format!("{namespace}/{service}");
    }
    service.to_string()
}

/// Whether an edge target refers to the requested destination, which may be
/// a full key or a bare name.
fn target_matches(target: &str, dest: &str, namespace: &str) -> bool {
    target == dest || target == qualify(dest, namespace) || target.ends_with(&format!("/{dest}"))
}

/// Traces a path from `source` to `destination` over `topology`.
///
/// Unknown endpoints produce a blocked trace with an explanatory reason;
/// they are not errors.
pub fn trace_path(
    source: &str,
    destination: &str,
    namespace: &str,
    topology: &TopologyData,
) -> PathTrace {
    let mut trace = PathTrace::new(source, destination);
    let dst = Endpoint::parse(destination);

    let current = match Endpoint::parse(source) {
        Endpoint::Service(svc) => svc,
        Endpoint::Egress => {
            // The egress gateway has no outgoing edges in the graph.
            trace.dead_end("no connection path found");
            return trace;
        }
        Endpoint::Ingress => {
            let Some(hop) = first_ingress_hop(topology) else {
                trace.dead_end("no route from ingress gateway");
                return trace;
            };
            let to = hop.to.clone();
            if !trace.push(hop, "blocked at ingress") {
                return trace;
            }
            if let Endpoint::Service(dest) = &dst {
                if target_matches(&to, dest, namespace) {
                    return trace;
                }
            }
            to
        }
    };

    match dst {
        Endpoint::Service(dest) => service_hop(&mut trace, &current, &dest, namespace, topology),
        Endpoint::Egress => egress_hop(&mut trace, &current, namespace, topology),
        Endpoint::Ingress => trace.dead_end("no connection path found"),
    }

    trace
}

/// The entry hop from the ingress gateway: the first allowed route, or the
/// first route at all so a blocked gateway still yields something actionable.
fn first_ingress_hop(topology: &TopologyData) -> Option<PathHop> {
    let connections = &topology.ingress.connections;
    let conn = connections
        .iter()
        .find(|c| c.allowed)
        .or_else(|| connections.first())?;

    Some(PathHop {
        from: INGRESS_GATEWAY.to_string(),
        to: conn.to.clone(),
        kind: HopKind::Ingress,
        allowed: conn.allowed,
        reason: conn.reason.clone(),
        policies: conn.policies.clone(),
        mesh: MeshKind::None,
    })
}

fn service_hop(
    trace: &mut PathTrace,
    from: &str,
    dest: &str,
    namespace: &str,
    topology: &TopologyData,
) {
    let from_key = qualify(from, namespace);
    let Some(info) = topology.connectivity.get(&from_key) else {
        trace.dead_end("source service not found");
        return;
    };

    match info
        .connections
        .iter()
        .find(|c| target_matches(&c.target, dest, namespace))
    {
        Some(conn) => {
            trace.push(
                PathHop {
                    from: from_key,
                    to: conn.target.clone(),
                    kind: HopKind::Service,
                    allowed: conn.allowed,
                    reason: conn.reason.clone(),
                    policies: conn.blocking_policies.clone(),
                    mesh: conn.mesh,
                },
                "blocked",
            );
        }
        None => trace.dead_end("no connection path found"),
    }
}

fn egress_hop(trace: &mut PathTrace, from: &str, namespace: &str, topology: &TopologyData) {
    let from_key = qualify(from, namespace);
    let Some(info) = topology.connectivity.get(&from_key) else {
        trace.dead_end("source service not found");
        return;
    };

    match info
        .connections
        .iter()
        .find(|c| c.target == EGRESS_GATEWAY)
    {
        Some(conn) => {
            trace.push(
                PathHop {
                    from: from_key,
                    to: EGRESS_GATEWAY.to_string(),
                    kind: HopKind::Egress,
                    allowed: conn.allowed,
                    reason: conn.reason.clone(),
                    policies: conn.blocking_policies.clone(),
                    mesh: conn.mesh,
                },
                "blocked at egress",
            );
        }
        None => trace.dead_end("no egress route configured for service"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        gateway::GatewayEdge,
        testing::{mk_node, mk_topology},
        topology::ConnectivityEdge,
    };

    fn blocked_ingress_topology() -> TopologyData {
        let mut topology = mk_topology(vec![
            mk_node("ns1", "api", &[("app", "api")]),
            mk_node("ns1", "web", &[("app", "web")]),
        ]);
        topology.ingress.connections.push(GatewayEdge {
            from: "gw".to_string(),
            to: "ns1/api".to_string(),
            allowed: false,
            reason: "NetworkPolicy lockdown may block ingress".to_string(),
            policies: vec!["lockdown".to_string()],
            ..Default::default()
        });
        topology
    }

    #[test]
    fn endpoint_parsing() {
        assert_eq!(Endpoint::parse("ingress-gateway"), Endpoint::Ingress);
        assert_eq!(Endpoint::parse("egress-gateway"), Endpoint::Egress);
        assert_eq!(Endpoint::parse("external"), Endpoint::Egress);
        assert_eq!(
            Endpoint::parse("ns1/api"),
            Endpoint::Service("ns1/api".to_string())
        );
        assert_eq!(Endpoint::parse("api"), Endpoint::Service("api".to_string()));
    }

    #[test]
    fn service_to_service_allowed() {
        let topology = mk_topology(vec![
            mk_node("ns1", "web", &[("app", "web")]),
            mk_node("ns1", "api", &[("app", "api")]),
        ]);

        let trace = trace_path("web", "api", "ns1", &topology);
        assert!(trace.allowed);
        assert_eq!(trace.path.len(), 1);
        assert_eq!(trace.path[0].from, "ns1/web");
        assert_eq!(trace.path[0].to, "ns1/api");
        assert!(trace.blocked_at.is_none());
    }

    #[test]
    fn blocked_ingress_stops_after_one_hop() {
        let topology = blocked_ingress_topology();
        let trace = trace_path("ingress-gateway", "ns1/api", "ns1", &topology);

        assert!(!trace.allowed);
        assert_eq!(trace.path.len(), 1);
        let blocked = trace.blocked_at.as_ref().expect("must record blocked hop");
        assert_eq!(blocked.to, "ns1/api");
        assert_eq!(blocked.policies, vec!["lockdown".to_string()]);
        assert!(trace.reason.starts_with("blocked at ingress"));
    }

    #[test]
    fn ingress_prefers_first_allowed_route() {
        let mut topology = blocked_ingress_topology();
        topology.ingress.connections.push(GatewayEdge {
            from: "gw".to_string(),
            to: "ns1/web".to_string(),
            allowed: true,
            reason: "no policy blocking ingress".to_string(),
            ..Default::default()
        });

        let trace = trace_path("ingress-gateway", "ns1/web", "ns1", &topology);
        assert!(trace.allowed);
        assert_eq!(trace.path.len(), 1);
        assert_eq!(trace.path[0].to, "ns1/web");
    }

    #[test]
    fn ingress_continues_to_destination_service() {
        let mut topology = mk_topology(vec![
            mk_node("ns1", "web", &[("app", "web")]),
            mk_node("ns1", "api", &[("app", "api")]),
        ]);
        topology.ingress.connections.push(GatewayEdge {
            from: "gw".to_string(),
            to: "ns1/web".to_string(),
            allowed: true,
            reason: "no policy blocking ingress".to_string(),
            ..Default::default()
        });

        let trace = trace_path("ingress-gateway", "api", "ns1", &topology);
        assert!(trace.allowed);
        assert_eq!(trace.path.len(), 2);
        assert_eq!(trace.path[0].kind, HopKind::Ingress);
        assert_eq!(trace.path[1].kind, HopKind::Service);
        assert_eq!(trace.path[1].to, "ns1/api");
    }

    #[test]
    fn overall_verdict_is_and_of_hops() {
        let mut topology = mk_topology(vec![
            mk_node("ns1", "web", &[("app", "web")]),
            mk_node("ns1", "api", &[("app", "api")]),
        ]);
        topology.ingress.connections.push(GatewayEdge {
            from: "gw".to_string(),
            to: "ns1/web".to_string(),
            allowed: true,
            reason: "no policy blocking ingress".to_string(),
            ..Default::default()
        });
        // Force the web -> api edge to be blocked.
        let info = topology.connectivity.get_mut("ns1/web").unwrap();
        for conn in info.connections.iter_mut() {
            if conn.target == "ns1/api" {
                conn.allowed = false;
                conn.reason = "blocked by default-deny NetworkPolicy deny-all".to_string();
                conn.blocking_policies = vec!["deny-all".to_string()];
            }
        }

        let trace = trace_path("ingress-gateway", "api", "ns1", &topology);
        assert!(!trace.allowed);
        assert_eq!(trace.path.len(), 2);
        assert!(trace.path[0].allowed);
        assert!(!trace.path[1].allowed);
        assert_eq!(
            trace.blocked_at.as_ref().map(|h| h.to.as_str()),
            Some("ns1/api")
        );
    }

    #[test]
    fn unknown_source_is_a_blocked_trace_not_an_error() {
        let topology = mk_topology(vec![mk_node("ns1", "web", &[("app", "web")])]);
        let trace = trace_path("ghost", "web", "ns1", &topology);
        assert!(!trace.allowed);
        assert_eq!(trace.reason, "source service not found");
        assert!(trace.path.is_empty());
    }

    #[test]
    fn missing_edge_reports_no_path() {
        let topology = mk_topology(vec![
            mk_node("ns1", "web", &[("app", "web")]),
            mk_node("ns2", "api", &[("app", "api")]),
        ]);
        // web and api are in different namespaces, so no edge exists.
        let trace = trace_path("ns1/web", "ns2/api", "ns1", &topology);
        assert!(!trace.allowed);
        assert_eq!(trace.reason, "no connection path found");
    }

    #[test]
    fn service_to_egress_uses_precomputed_edge() {
        let mut topology = mk_topology(vec![mk_node("ns1", "web", &[("app", "web")])]);
        topology
            .connectivity
            .get_mut("ns1/web")
            .unwrap()
            .connections
            .push(ConnectivityEdge {
                target: EGRESS_GATEWAY.to_string(),
                allowed: true,
                reason: "direct egress (no egress gateway configured)".to_string(),
                ..Default::default()
            });

        let trace = trace_path("web", "egress-gateway", "ns1", &topology);
        assert!(trace.allowed);
        assert_eq!(trace.path.len(), 1);
        assert_eq!(trace.path[0].kind, HopKind::Egress);

        let aliased = trace_path("ns1/web", "external", "ns1", &topology);
        assert!(aliased.allowed, "\"external\" must resolve to the egress vertex");
    }
}
