//! Resolves ingress and egress gateways into graph routes and edges.
//!
//! Route verdicts reuse the policy evaluator with the synthetic gateway
//! identity as the calling party; gateway workloads never match pod
//! selectors, so every policy in the target namespace counts as potentially
//! blocking.

use std::collections::HashMap;
use topology_controller_core::{
    evaluate::{gateway_verdict, namespace_verdict},
    gateway::{
        EgressInfo, ExternalService, GatewayEdge, GatewayNode, GatewayRoute, IngressInfo,
        IngressResource, RouteKind,
    },
    policy::PolicyRule,
    service_key,
    topology::ServiceNode,
    EGRESS_GATEWAY,
};
use topology_controller_k8s_api::{
    self as k8s,
    mesh::{Gateway, ServiceEntry, VirtualService},
    ResourceExt,
};
use tracing::debug;

pub(crate) fn resolve_ingress(
    ingresses: Vec<IngressResource>,
    gateways: Vec<Gateway>,
    virtual_services: Vec<VirtualService>,
    services: &HashMap<String, ServiceNode>,
    rules: &[PolicyRule],
) -> IngressInfo {
    let mut info = IngressInfo::default();

    for gw in gateways {
        let name = gw.name_any();
        let namespace = gw.namespace().unwrap_or_default();
        let mut hosts = Vec::new();
        let mut ports = Vec::new();
        for server in &gw.spec.servers {
            hosts.extend(server.hosts.iter().cloned());
            if let Some(port) = &server.port {
                ports.push(format!("{}/{}", port.number, port.protocol));
            }
        }
        info.gateways.push(GatewayNode {
            name,
            namespace,
            kind: RouteKind::Mesh,
            hosts,
            ports,
            selector: gw.spec.selector.clone(),
        });
    }

    for vs in virtual_services {
        info.routes.extend(mesh_routes(&vs));
    }

    for ing in &ingresses {
        info.routes.extend(ingress_routes(ing));
    }
    info.ingresses = ingresses;

    // Evaluate each declared route against the rule set, with the gateway
    // as the caller.
    for route in info.routes.iter_mut() {
        let target = service_key(&route.namespace, &route.service);
        if !services.contains_key(&target) {
            debug!(%target, "route backend not in graph, skipping");
            continue;
        }
        let verdict = gateway_verdict(&route.namespace, rules);
        route.allowed = verdict.allowed;
        route.blocked_by = verdict.blocking.clone();
        info.connections.push(GatewayEdge {
            from: route.gateway.clone(),
            to: target,
            allowed: verdict.allowed,
            reason: verdict.reason,
            policies: verdict.blocking,
            ..Default::default()
        });
    }

    info
}

/// One route per (host, http rule) pair declared by a virtual service.
fn mesh_routes(vs: &VirtualService) -> Vec<GatewayRoute> {
    let name = vs.name_any();
    let vs_namespace = vs.namespace().unwrap_or_default();
    let mut routes = Vec::new();

    for http in &vs.spec.http {
        let path = http
            .matches
            .first()
            .and_then(|m| m.uri.as_ref())
            .and_then(|u| u.prefix.clone().or_else(|| u.exact.clone()))
            .unwrap_or_else(|| "/".to_string());

        let Some(dest) = http.route.first().and_then(|r| r.destination.as_ref()) else {
            continue;
        };
        let (service, dest_ns) = dest.service_and_namespace();
        if service.is_empty() {
            continue;
        }
        let namespace = dest_ns.unwrap_or_else(|| vs_namespace.clone());

        for host in &vs.spec.hosts {
            routes.push(GatewayRoute {
                gateway: name.clone(),
                host: host.clone(),
                path: path.clone(),
                service: service.clone(),
                namespace: namespace.clone(),
                allowed: true,
                blocked_by: Vec::new(),
                kind: RouteKind::Mesh,
            });
        }
    }

    routes
}

fn ingress_routes(ing: &IngressResource) -> Vec<GatewayRoute> {
    if ing.backend.is_empty() {
        return Vec::new();
    }

    let path = ing.paths.first().cloned().unwrap_or_else(|| "/".to_string());
    let unnamed = [String::new()];
    let hosts: &[String] = if ing.hosts.is_empty() {
        &unnamed
    } else {
        &ing.hosts
    };

    hosts
        .iter()
        .map(|host| GatewayRoute {
            gateway: ing.name.clone(),
            host: host.clone(),
            path: path.clone(),
            service: ing.backend.clone(),
            namespace: ing.namespace.clone(),
            allowed: true,
            blocked_by: Vec::new(),
            kind: RouteKind::Ingress,
        })
        .collect()
}

pub(crate) fn resolve_egress(
    services: &HashMap<String, ServiceNode>,
    service_entries: Vec<ServiceEntry>,
    egress_gateways: Vec<k8s::Deployment>,
    rules: &[PolicyRule],
) -> EgressInfo {
    let mut info = EgressInfo::default();

    for dep in egress_gateways {
        info.gateways.push(GatewayNode {
            name: dep.name_any(),
            namespace: dep.namespace().unwrap_or_default(),
            kind: RouteKind::Mesh,
            ..Default::default()
        });
    }
    info.has_egress_gateway = !info.gateways.is_empty();
    info.direct_egress = !info.has_egress_gateway;

    for se in service_entries {
        info.external_services.push(ExternalService {
            name: se.name_any(),
            namespace: se.namespace().unwrap_or_default(),
            hosts: se.spec.hosts.clone(),
            ports: se
                .spec
                .ports
                .iter()
                .map(|p| format!("{}/{}", p.number, p.protocol))
                .collect(),
        });
    }

    // Deterministic edge order regardless of map iteration.
    let mut keys: Vec<&String> = services.keys().collect();
    keys.sort();

    for key in keys {
        let namespace = &services[key].namespace;
        let edge = if info.has_egress_gateway {
            let verdict = namespace_verdict(namespace, rules);
            GatewayEdge {
                from: key.clone(),
                to: EGRESS_GATEWAY.to_string(),
                allowed: verdict.allowed,
                reason: verdict.reason,
                policies: verdict.blocking,
                via_mesh: true,
                direct: false,
                ..Default::default()
            }
        } else if !info.external_services.is_empty() {
            let verdict = namespace_verdict(namespace, rules);
            GatewayEdge {
                from: key.clone(),
                to: EGRESS_GATEWAY.to_string(),
                allowed: verdict.allowed,
                reason: verdict.reason,
                policies: verdict.blocking,
                via_mesh: false,
                direct: true,
                ..Default::default()
            }
        } else {
            // No declared external services and no gateway: unrestricted
            // direct egress, the finding surfaced by the recommendations.
            GatewayEdge {
                from: key.clone(),
                to: EGRESS_GATEWAY.to_string(),
                allowed: true,
                reason: "direct egress (no egress gateway configured)".to_string(),
                via_mesh: false,
                direct: true,
                ..Default::default()
            }
        };
        info.connections.push(edge);
    }

    info
}

#[cfg(test)]
mod tests {
    use super::*;
    use topology_controller_core::{
        policy::{NativeRules, PolicyEngine},
        Selector,
    };
    use topology_controller_k8s_api::mesh::{
        Destination, GatewaySpec, HttpMatch, HttpRoute, HttpRouteDestination, ServiceEntrySpec,
        StringMatch, VirtualServiceSpec,
    };
    use topology_controller_k8s_api::ObjectMeta;

    fn mk_node(ns: &str, name: &str) -> ServiceNode {
        ServiceNode {
            name: name.to_string(),
            namespace: ns.to_string(),
            service_type: "ClusterIP".to_string(),
            cluster_ip: String::new(),
            ports: Vec::new(),
            labels: Default::default(),
            pods: Vec::new(),
            pod_count: 0,
            healthy_pods: 0,
            deployment: String::new(),
            mesh: Default::default(),
            pod_security: Default::default(),
            drift_status: Default::default(),
            has_policy: false,
            traffic: None,
        }
    }

    fn mk_services(nodes: Vec<ServiceNode>) -> HashMap<String, ServiceNode> {
        nodes
            .into_iter()
            .map(|n| (service_key(&n.namespace, &n.name), n))
            .collect()
    }

    fn mk_virtual_service(ns: &str, name: &str, host: &str, dest: &str) -> VirtualService {
        VirtualService {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(ns.to_string()),
                ..Default::default()
            },
            spec: VirtualServiceSpec {
                hosts: vec![host.to_string()],
                gateways: vec!["mesh-gateway".to_string()],
                http: vec![HttpRoute {
                    matches: vec![HttpMatch {
                        uri: Some(StringMatch {
                            prefix: Some("/api".to_string()),
                            exact: None,
                        }),
                    }],
                    route: vec![HttpRouteDestination {
                        destination: Some(Destination {
                            host: dest.to_string(),
                            port: None,
                        }),
                    }],
                }],
            },
        }
    }

    #[test]
    fn virtual_service_routes_resolve_backend_namespace() {
        let services = mk_services(vec![mk_node("prod", "api")]);
        let vs = mk_virtual_service("gw-ns", "api-vs", "api.example.com", "api.prod.svc.cluster.local");

        let info = resolve_ingress(Vec::new(), Vec::new(), vec![vs], &services, &[]);
        assert_eq!(info.routes.len(), 1);
        let route = &info.routes[0];
        assert_eq!(route.kind, RouteKind::Mesh);
        assert_eq!(route.path, "/api");
        assert_eq!(route.namespace, "prod");
        assert!(route.allowed);

        assert_eq!(info.connections.len(), 1);
        assert_eq!(info.connections[0].to, "prod/api");
    }

    #[test]
    fn route_to_unknown_backend_yields_no_connection() {
        let services = mk_services(vec![mk_node("prod", "api")]);
        let vs = mk_virtual_service("gw-ns", "vs", "x.example.com", "ghost.prod");

        let info = resolve_ingress(Vec::new(), Vec::new(), vec![vs], &services, &[]);
        assert_eq!(info.routes.len(), 1);
        assert!(info.connections.is_empty());
    }

    #[test]
    fn policies_in_target_namespace_block_gateway_routes() {
        let services = mk_services(vec![mk_node("ns1", "api")]);
        let ing = IngressResource {
            name: "api-ingress".to_string(),
            namespace: "ns1".to_string(),
            hosts: vec!["api.example.com".to_string()],
            backend: "api".to_string(),
            tls: true,
            ..Default::default()
        };
        let rules = vec![PolicyRule::native(
            "lockdown",
            "ns1",
            NativeRules {
                pod_selector: Selector::default(),
                ingress_declared: true,
                egress_declared: false,
                ingress_rules: 0,
                egress_rules: 0,
            },
        )];

        let info = resolve_ingress(vec![ing], Vec::new(), Vec::new(), &services, &rules);
        assert_eq!(info.connections.len(), 1);
        let conn = &info.connections[0];
        assert!(!conn.allowed);
        assert_eq!(conn.policies, vec!["lockdown".to_string()]);
        assert!(!info.routes[0].allowed);
    }

    #[test]
    fn no_gateway_and_no_entries_is_permissive_direct_egress() {
        let services = mk_services(vec![mk_node("ns1", "web")]);
        let info = resolve_egress(&services, Vec::new(), Vec::new(), &[]);

        assert!(info.direct_egress);
        assert!(!info.has_egress_gateway);
        assert_eq!(info.connections.len(), 1);
        let conn = &info.connections[0];
        assert!(conn.allowed);
        assert!(conn.direct);
        assert!(!conn.via_mesh);
        assert_eq!(conn.to, EGRESS_GATEWAY);
    }

    #[test]
    fn egress_gateway_routes_via_mesh() {
        let services = mk_services(vec![mk_node("ns1", "web")]);
        let gateway = k8s::Deployment {
            metadata: ObjectMeta {
                name: Some("istio-egressgateway".to_string()),
                namespace: Some("istio-system".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };

        let info = resolve_egress(&services, Vec::new(), vec![gateway], &[]);
        assert!(info.has_egress_gateway);
        assert!(!info.direct_egress);
        assert!(info.connections[0].via_mesh);
        assert!(!info.connections[0].direct);
    }

    #[test]
    fn external_services_are_policy_evaluated() {
        let services = mk_services(vec![mk_node("ns1", "web")]);
        let entry = ServiceEntry {
            metadata: ObjectMeta {
                name: Some("external-api".to_string()),
                namespace: Some("ns1".to_string()),
                ..Default::default()
            },
            spec: ServiceEntrySpec {
                hosts: vec!["api.example.com".to_string()],
                ports: Vec::new(),
                location: Some("MESH_EXTERNAL".to_string()),
            },
        };
        let rules = vec![PolicyRule::opaque(PolicyEngine::Ebpf, "deny-egress", "ns1")];

        let info = resolve_egress(&services, vec![entry], Vec::new(), &rules);
        assert_eq!(info.external_services.len(), 1);
        let conn = &info.connections[0];
        assert!(!conn.allowed);
        assert!(conn.direct);
        assert_eq!(conn.policies, vec!["deny-egress".to_string()]);
    }

    #[test]
    fn mesh_gateway_listeners_are_recorded() {
        use topology_controller_k8s_api::mesh::{GatewayPort, GatewayServer};

        let gw = Gateway {
            metadata: ObjectMeta {
                name: Some("public-gw".to_string()),
                namespace: Some("istio-system".to_string()),
                ..Default::default()
            },
            spec: GatewaySpec {
                servers: vec![GatewayServer {
                    hosts: vec!["*.example.com".to_string()],
                    port: Some(GatewayPort {
                        number: 443,
                        protocol: "HTTPS".to_string(),
                        name: "https".to_string(),
                    }),
                }],
                selector: Default::default(),
            },
        };

        let info = resolve_ingress(Vec::new(), vec![gw], Vec::new(), &HashMap::new(), &[]);
        assert_eq!(info.gateways.len(), 1);
        assert_eq!(info.gateways[0].hosts, vec!["*.example.com".to_string()]);
        assert_eq!(info.gateways[0].ports, vec!["443/HTTPS".to_string()]);
    }
}
