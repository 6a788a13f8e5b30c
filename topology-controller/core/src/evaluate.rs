//! Connectivity evaluation over the service graph.
//!
//! Three rule languages are reconciled into per-edge verdicts. Native
//! NetworkPolicies are evaluated structurally (declared direction with zero
//! rule entries is default-deny). Mesh and eBPF policies are not parsed;
//! any such object in scope blocks conservatively and the verdict's reason
//! records that the call is a heuristic, so every result stays explainable.

use crate::{
    gateway::{EgressInfo, IngressInfo},
    policy::{PolicyEngine, PolicyRule},
    topology::{ConnectivityEdge, ConnectivityInfo, ServiceNode, TopologySummary},
    EGRESS_GATEWAY, INGRESS_GATEWAY,
};
use std::collections::HashMap;

/// The verdict shared by every edge leaving one namespace.
#[derive(Clone, Debug)]
pub struct Verdict {
    pub allowed: bool,
    pub reason: String,
    pub blocked_by_policy: bool,
    pub blocking: Vec<String>,
}

// === impl Verdict ===

impl Verdict {
    fn allow(reason: impl ToString) -> Self {
        Self {
            allowed: true,
            reason: reason.to_string(),
            blocked_by_policy: false,
            blocking: Vec::new(),
        }
    }

    fn block(&mut self, reason: String, policy: &str) {
        if self.allowed {
            self.reason = reason;
        }
        self.allowed = false;
        self.blocked_by_policy = true;
        if !self.blocking.iter().any(|p| p == policy) {
            self.blocking.push(policy.to_string());
        }
    }
}

/// Computes the verdict applied to traffic leaving workloads of `namespace`.
///
/// The verdict is target-independent: native policies select by the source's
/// namespace, and unparsed mesh/eBPF rules block the whole pair space.
pub fn namespace_verdict(namespace: &str, rules: &[PolicyRule]) -> Verdict {
    let mut verdict = Verdict::allow("no policies in namespace");
    let mut any = false;

    for rule in rules.iter().filter(|r| r.applies_in(namespace)) {
        any = true;
        match rule.engine {
            PolicyEngine::Native => match rule.native.as_ref() {
                Some(native) => {
                    if native.ingress_declared && native.ingress_rules == 0 {
                        verdict.block(
                            format!(
                                "blocked by default-deny NetworkPolicy {} (no ingress rules)",
                                rule.name
                            ),
                            &rule.name,
                        );
                    }
                    if native.egress_declared && native.egress_rules == 0 {
                        verdict.block(
                            format!(
                                "blocked by default-deny NetworkPolicy {} (no egress rules)",
                                rule.name
                            ),
                            &rule.name,
                        );
                    }
                }
                // Structured rules unavailable: fall back to the name
                // heuristic rather than silently allowing.
                None => {
                    if rule.name_suggests_deny() {
                        verdict.block(
                            format!("potentially blocked by NetworkPolicy {}", rule.name),
                            &rule.name,
                        );
                    }
                }
            },
            PolicyEngine::Mesh => verdict.block(
                format!(
                    "restricted by mesh AuthorizationPolicy {} (heuristic, rules not parsed)",
                    rule.name
                ),
                &rule.name,
            ),
            PolicyEngine::Ebpf => verdict.block(
                format!(
                    "restricted by CiliumNetworkPolicy {} (heuristic, rules not parsed)",
                    rule.name
                ),
                &rule.name,
            ),
        }
    }

    if any && verdict.allowed {
        verdict.reason = "no policy blocking".to_string();
    }
    verdict
}

/// Verdict for traffic entering `namespace` from a gateway. All three
/// engines are consulted; any policy in scope is treated as potentially
/// blocking, since the gateway identity never matches workload selectors.
pub fn gateway_verdict(namespace: &str, rules: &[PolicyRule]) -> Verdict {
    let mut verdict = Verdict::allow("no policy blocking ingress");
    for rule in rules.iter().filter(|r| r.applies_in(namespace)) {
        let reason = match rule.engine {
            PolicyEngine::Native => format!("NetworkPolicy {} may block ingress", rule.name),
            PolicyEngine::Mesh => {
                format!("AuthorizationPolicy {} may restrict ingress", rule.name)
            }
            PolicyEngine::Ebpf => {
                format!("CiliumNetworkPolicy {} may block ingress", rule.name)
            }
        };
        verdict.block(reason, &rule.name);
    }
    verdict
}

/// Builds the service-to-service adjacency map. Edges connect ordered pairs
/// within the same namespace; the default verdict is allow.
pub fn evaluate(
    services: &HashMap<String, ServiceNode>,
    rules: &[PolicyRule],
) -> HashMap<String, ConnectivityInfo> {
    let mut verdicts: HashMap<&str, Verdict> = HashMap::new();
    let mut connectivity = HashMap::with_capacity(services.len());

    for (key, service) in services {
        let verdict = verdicts
            .entry(service.namespace.as_str())
            .or_insert_with(|| namespace_verdict(&service.namespace, rules))
            .clone();

        let mut info = ConnectivityInfo {
            service: service.name.clone(),
            ..Default::default()
        };

        for (target_key, target) in services {
            if key == target_key || target.namespace != service.namespace {
                continue;
            }

            let edge = ConnectivityEdge {
                target: target_key.clone(),
                allowed: verdict.allowed,
                reason: verdict.reason.clone(),
                via_mesh: service.mesh.is_meshed(),
                mesh: service.mesh,
                blocked_by_policy: verdict.blocked_by_policy,
                blocking_policies: verdict.blocking.clone(),
                ..Default::default()
            };

            if edge.allowed {
                info.can_reach.push(target_key.clone());
            } else {
                info.blocked_from.push(target_key.clone());
            }
            info.connections.push(edge);
        }

        connectivity.insert(key.clone(), info);
    }

    connectivity
}

/// Marks services selected by a native policy in their namespace. The flag
/// is the only ServiceNode field mutated after construction.
pub fn apply_policy_coverage(services: &mut HashMap<String, ServiceNode>, rules: &[PolicyRule]) {
    for service in services.values_mut() {
        service.has_policy = rules.iter().any(|rule| {
            rule.engine == PolicyEngine::Native
                && rule.namespace == service.namespace
                && rule
                    .native
                    .as_ref()
                    .map(|n| !n.pod_selector.is_empty() && n.pod_selector.matches(&service.labels))
                    .unwrap_or(false)
        });
    }
}

/// Splices the synthetic gateway vertices and per-service egress edges into
/// the adjacency map, so gateways and services share one lookup mechanism.
pub fn attach_gateways(
    connectivity: &mut HashMap<String, ConnectivityInfo>,
    ingress: &IngressInfo,
    egress: &EgressInfo,
) {
    if !ingress.gateways.is_empty() || !ingress.ingresses.is_empty() {
        let mut info = ConnectivityInfo {
            service: INGRESS_GATEWAY.to_string(),
            ..Default::default()
        };
        for conn in &ingress.connections {
            let edge = ConnectivityEdge {
                target: conn.to.clone(),
                allowed: conn.allowed,
                reason: conn.reason.clone(),
                blocked_by_policy: !conn.allowed,
                blocking_policies: conn.policies.clone(),
                port: conn.port.clone(),
                ..Default::default()
            };
            if edge.allowed {
                info.can_reach.push(conn.to.clone());
            } else {
                info.blocked_from.push(conn.to.clone());
            }
            info.connections.push(edge);
        }
        connectivity.insert(INGRESS_GATEWAY.to_string(), info);
    }

    for conn in &egress.connections {
        if let Some(info) = connectivity.get_mut(&conn.from) {
            info.connections.push(ConnectivityEdge {
                target: EGRESS_GATEWAY.to_string(),
                allowed: conn.allowed,
                reason: conn.reason.clone(),
                via_mesh: conn.via_mesh,
                blocked_by_policy: !conn.allowed && !conn.policies.is_empty(),
                blocking_policies: conn.policies.clone(),
                ..Default::default()
            });
            if conn.allowed {
                info.can_reach.push(EGRESS_GATEWAY.to_string());
            } else {
                info.blocked_from.push(EGRESS_GATEWAY.to_string());
            }
        }
    }
}

/// Aggregates the summary in a single pass over services and edges.
pub fn summarize(
    services: &HashMap<String, ServiceNode>,
    connectivity: &HashMap<String, ConnectivityInfo>,
) -> TopologySummary {
    let total_services = services.len();
    let services_with_mesh = services.values().filter(|s| s.mesh.is_meshed()).count();

    let mut total = 0;
    let mut allowed = 0;
    for info in connectivity.values() {
        for edge in &info.connections {
            total += 1;
            if edge.allowed && !edge.blocked_by_policy {
                allowed += 1;
            }
        }
    }

    let mesh_coverage = if total_services > 0 {
        format!(
            "{:.0}%",
            services_with_mesh as f64 / total_services as f64 * 100.0
        )
    } else {
        "0%".to_string()
    };

    TopologySummary {
        total_services,
        services_with_mesh,
        total_connections: total,
        allowed_connections: allowed,
        blocked_connections: total - allowed,
        mesh_coverage,
    }
}
