//! Best-practice checks and the compliance score.
//!
//! Each check is a pure function over a computed topology. The score and
//! the findings are produced by the same single pass over the rule set, so
//! the two can never disagree.

use crate::{
    policy::PolicyEngine,
    split_key,
    topology::{ServiceNode, TopologyData},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Findings per failed check are capped so one widespread problem does not
/// drown out the rest of the report.
const MAX_FINDINGS_PER_CHECK: usize = 10;

/// Mesh coverage below this percentage fails `mesh-001`.
const MESH_COVERAGE_TARGET: usize = 80;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Security,
    Performance,
    Observability,
    Resilience,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

/// A machine-usable remediation: a manifest template, optionally the apply
/// command, and manual steps where a manifest alone is not enough.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Fix {
    pub kind: String,
    pub template: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub manual_steps: Vec<String>,
}

/// One actionable finding.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Recommendation {
    pub id: String,
    pub title: String,
    pub description: String,
    pub category: Category,
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    pub fix: Fix,
    pub impact: String,
}

/// A best-practice rule: findings are the failure evidence, so a check
/// passes exactly when it produces none.
pub struct BestPractice {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub category: Category,
    pub severity: Severity,
    check: fn(&TopologyData) -> Vec<Recommendation>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CheckResult {
    pub name: String,
    pub passed: bool,
}

/// The outcome of one pass over the rule set.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ComplianceReport {
    pub score: u32,
    pub passed: usize,
    pub total: usize,
    pub checks: BTreeMap<String, CheckResult>,
    pub recommendations: Vec<Recommendation>,
}

const BEST_PRACTICES: &[BestPractice] = &[
    BestPractice {
        id: "np-001",
        name: "Services should have network policies",
        description: "Non-system services should be covered by a NetworkPolicy or CiliumNetworkPolicy",
        category: Category::Security,
        severity: Severity::High,
        check: check_service_policies,
    },
    BestPractice {
        id: "ingress-001",
        name: "Ingress should use TLS",
        description: "Every ingress route should terminate TLS",
        category: Category::Security,
        severity: Severity::Critical,
        check: check_ingress_tls,
    },
    BestPractice {
        id: "mesh-mtls-001",
        name: "Mesh mTLS should be strict",
        description: "With a mesh installed, peer authentication should enforce STRICT mutual TLS",
        category: Category::Security,
        severity: Severity::High,
        check: check_strict_mtls,
    },
    BestPractice {
        id: "egress-001",
        name: "Egress should route through a gateway",
        description: "With a mesh installed, external traffic should leave through an egress gateway",
        category: Category::Security,
        severity: Severity::Medium,
        check: check_egress_gateway,
    },
    BestPractice {
        id: "policy-ratio-001",
        name: "Policy coverage ratio",
        description: "Fewer than one native policy per two services suggests incomplete coverage",
        category: Category::Security,
        severity: Severity::Medium,
        check: check_policy_ratio,
    },
    BestPractice {
        id: "mesh-001",
        name: "Service mesh coverage",
        description: "With a mesh installed, at least 80% of services should be in the mesh",
        category: Category::Observability,
        severity: Severity::Medium,
        check: check_mesh_coverage,
    },
    BestPractice {
        id: "blocked-001",
        name: "Blocked connection ratio",
        description: "More than 10% of edges blocked usually indicates misconfiguration rather than intentional lockdown",
        category: Category::Resilience,
        severity: Severity::High,
        check: check_blocked_ratio,
    },
];

/// The fixed, ordered rule set.
pub fn best_practices() -> &'static [BestPractice] {
    BEST_PRACTICES
}

/// Runs every check once, deriving the score, per-check results, and the
/// full finding list from that single pass.
pub fn run_checks(topology: &TopologyData) -> ComplianceReport {
    let total = BEST_PRACTICES.len();
    let mut passed = 0;
    let mut checks = BTreeMap::new();
    let mut recommendations = Vec::new();

    for practice in BEST_PRACTICES {
        let findings = (practice.check)(topology);
        let ok = findings.is_empty();
        if ok {
            passed += 1;
        }
        checks.insert(
            practice.id.to_string(),
            CheckResult {
                name: practice.name.to_string(),
                passed: ok,
            },
        );
        recommendations.extend(findings);
    }

    let score = if total > 0 {
        (passed * 100 / total) as u32
    } else {
        0
    };

    ComplianceReport {
        score,
        passed,
        total,
        checks,
        recommendations,
    }
}

/// All findings, in rule-set order.
pub fn recommendations(topology: &TopologyData) -> Vec<Recommendation> {
    run_checks(topology).recommendations
}

fn is_system_namespace(namespace: &str) -> bool {
    matches!(namespace, "kube-system" | "kube-public" | "kube-node-lease")
        || namespace.starts_with("kube-")
        || namespace.starts_with("istio-")
}

/// Deterministic service iteration order for stable, cappable findings.
fn sorted_services(topology: &TopologyData) -> Vec<(&String, &ServiceNode)> {
    let mut services: Vec<_> = topology.services.iter().collect();
    services.sort_by(|(a, _), (b, _)| a.cmp(b));
    services
}

fn check_service_policies(topology: &TopologyData) -> Vec<Recommendation> {
    let mut findings = Vec::new();

    for (key, service) in sorted_services(topology) {
        if is_system_namespace(&service.namespace) {
            continue;
        }

        let has_native = topology.policies.iter().any(|p| {
            p.engine == PolicyEngine::Native && p.namespace == service.namespace
        });
        let has_ebpf = topology.infrastructure.cilium_enabled
            && topology
                .policies
                .iter()
                .any(|p| p.engine == PolicyEngine::Ebpf && p.applies_in(&service.namespace));
        if has_native || has_ebpf {
            continue;
        }

        let (kind, template) = if topology.infrastructure.cilium_enabled {
            ("ciliumpolicy", cilium_policy_template(service))
        } else {
            ("networkpolicy", network_policy_template(service))
        };

        findings.push(Recommendation {
            id: format!("np-001-{key}"),
            title: format!(
                "Service {}/{} lacks network policy",
                service.namespace, service.name
            ),
            description: format!(
                "Service {}/{} has no {kind} in its namespace; traffic to and from it is unrestricted",
                service.namespace, service.name
            ),
            category: Category::Security,
            severity: Severity::High,
            service: Some(key.clone()),
            namespace: Some(service.namespace.clone()),
            fix: Fix {
                kind: kind.to_string(),
                command: Some(format!("kubectl apply -f - <<EOF\n{template}\nEOF")),
                template,
                manual_steps: Vec::new(),
            },
            impact: "Adds defense in depth by restricting traffic to declared paths".to_string(),
        });

        if findings.len() == MAX_FINDINGS_PER_CHECK {
            break;
        }
    }

    findings
}

fn check_ingress_tls(topology: &TopologyData) -> Vec<Recommendation> {
    topology
        .ingress
        .ingresses
        .iter()
        .filter(|ing| !ing.tls)
        .map(|ing| Recommendation {
            id: format!("ingress-001-{}", ing.name),
            title: format!("Ingress {}/{} missing TLS configuration", ing.namespace, ing.name),
            description: "This ingress route has no TLS section; traffic is exposed in plaintext"
                .to_string(),
            category: Category::Security,
            severity: Severity::Critical,
            service: None,
            namespace: Some(ing.namespace.clone()),
            fix: Fix {
                kind: "ingress".to_string(),
                template: tls_ingress_template(&ing.name, &ing.namespace, &ing.hosts, &ing.backend),
                command: None,
                manual_steps: vec![
                    "Ensure cert-manager is installed".to_string(),
                    "Verify a ClusterIssuer exists: kubectl get clusterissuer".to_string(),
                    "Add a tls section to the ingress spec with the issuer annotation".to_string(),
                ],
            },
            impact: "Encrypts traffic between clients and services".to_string(),
        })
        .collect()
}

fn check_strict_mtls(topology: &TopologyData) -> Vec<Recommendation> {
    if !topology.infrastructure.istio_enabled {
        return Vec::new();
    }

    vec![Recommendation {
        id: "mesh-mtls-001".to_string(),
        title: "Enforce STRICT mTLS in the mesh".to_string(),
        description:
            "A mesh is installed; verify PeerAuthentication enforces STRICT mode in production"
                .to_string(),
        category: Category::Security,
        severity: Severity::High,
        service: None,
        namespace: None,
        fix: Fix {
            kind: "meshpolicy".to_string(),
            template: STRICT_MTLS_TEMPLATE.to_string(),
            command: None,
            manual_steps: vec![
                "Start in PERMISSIVE mode and verify all services still connect".to_string(),
                "Migrate namespaces to STRICT once verified".to_string(),
            ],
        },
        impact: "Enforces mutual TLS between all meshed services".to_string(),
    }]
}

fn check_egress_gateway(topology: &TopologyData) -> Vec<Recommendation> {
    if !topology.infrastructure.istio_enabled || topology.egress.has_egress_gateway {
        return Vec::new();
    }

    vec![Recommendation {
        id: "egress-001".to_string(),
        title: "Route egress through a gateway".to_string(),
        description:
            "Services reach external endpoints directly; an egress gateway centralizes control and observability"
                .to_string(),
        category: Category::Security,
        severity: Severity::Medium,
        service: None,
        namespace: None,
        fix: Fix {
            kind: "egress".to_string(),
            template: EGRESS_GATEWAY_TEMPLATE.to_string(),
            command: None,
            manual_steps: vec![
                "Deploy the mesh egress gateway".to_string(),
                "Declare ServiceEntries for required external hosts".to_string(),
                "Route external traffic through the gateway with a VirtualService".to_string(),
            ],
        },
        impact: "Centralizes policy enforcement and monitoring for external traffic".to_string(),
    }]
}

fn check_policy_ratio(topology: &TopologyData) -> Vec<Recommendation> {
    let total = topology.services.len();
    if total == 0 {
        return Vec::new();
    }
    let native = topology
        .policies
        .iter()
        .filter(|p| p.engine == PolicyEngine::Native)
        .count();
    if native * 2 >= total {
        return Vec::new();
    }

    vec![Recommendation {
        id: "policy-ratio-001".to_string(),
        title: "Native policy coverage is suspiciously low".to_string(),
        description: format!(
            "{native} NetworkPolicies for {total} services (target: at least one per two services)"
        ),
        category: Category::Security,
        severity: Severity::Medium,
        service: None,
        namespace: None,
        fix: Fix {
            kind: "networkpolicy".to_string(),
            template: String::new(),
            command: None,
            manual_steps: vec![
                "Inventory namespaces without policies".to_string(),
                "Add a default-deny plus explicit allow policies per namespace".to_string(),
            ],
        },
        impact: "Raises baseline isolation across the cluster".to_string(),
    }]
}

fn check_mesh_coverage(topology: &TopologyData) -> Vec<Recommendation> {
    let total = topology.summary.total_services;
    if !topology.infrastructure.istio_enabled || total == 0 {
        return Vec::new();
    }

    let coverage = topology.summary.services_with_mesh * 100 / total;
    if coverage >= MESH_COVERAGE_TARGET {
        return Vec::new();
    }

    vec![Recommendation {
        id: "mesh-001".to_string(),
        title: "Low service mesh coverage".to_string(),
        description: format!(
            "Only {coverage}% of services are in the mesh (target: {MESH_COVERAGE_TARGET}%); services outside it miss mTLS and traffic telemetry"
        ),
        category: Category::Observability,
        severity: Severity::Medium,
        service: None,
        namespace: None,
        fix: Fix {
            kind: "mesh".to_string(),
            template: String::new(),
            command: None,
            manual_steps: vec![
                "Enable sidecar injection: kubectl label namespace <ns> istio-injection=enabled"
                    .to_string(),
                "Restart workloads so sidecars are injected".to_string(),
            ],
        },
        impact: "Extends mTLS, telemetry, and traffic management to uncovered services".to_string(),
    }]
}

fn check_blocked_ratio(topology: &TopologyData) -> Vec<Recommendation> {
    let total = topology.summary.total_connections;
    let blocked = topology.summary.blocked_connections;
    if total == 0 || blocked * 10 <= total {
        return Vec::new();
    }

    let mut findings = Vec::new();
    let mut sources: Vec<_> = topology.connectivity.iter().collect();
    sources.sort_by(|(a, _), (b, _)| a.cmp(b));

    'outer: for (source, info) in sources {
        for conn in info.connections.iter().filter(|c| !c.allowed) {
            let (source_ns, source_name) = split_key(source);
            let (target_ns, target_name) = split_key(&conn.target);
            findings.push(Recommendation {
                id: format!("blocked-001-{source}-to-{}", conn.target),
                title: format!("Blocked connection: {source} -> {}", conn.target),
                description: if conn.blocking_policies.is_empty() {
                    format!("Connection from {source} to {} is blocked", conn.target)
                } else {
                    format!(
                        "Connection from {source} to {} is blocked by: {}",
                        conn.target,
                        conn.blocking_policies.join(", ")
                    )
                },
                category: Category::Resilience,
                severity: Severity::High,
                service: Some(source.clone()),
                namespace: Some(source_ns.to_string()),
                fix: Fix {
                    kind: "networkpolicy".to_string(),
                    template: allow_connection_template(
                        source_ns,
                        source_name,
                        target_ns,
                        target_name,
                    ),
                    command: None,
                    manual_steps: vec![
                        format!(
                            "Review the blocking policies: {}",
                            conn.blocking_policies.join(", ")
                        ),
                        "Verify connectivity with the path tracer after updating".to_string(),
                    ],
                },
                impact: format!("Restores connectivity between {source} and {}", conn.target),
            });
            if findings.len() == MAX_FINDINGS_PER_CHECK {
                break 'outer;
            }
        }
    }

    findings
}

fn network_policy_template(service: &ServiceNode) -> String {
    format!(
        r#"apiVersion: networking.k8s.io/v1
kind: NetworkPolicy
metadata:
  name: {name}-network-policy
  namespace: {ns}
spec:
  podSelector:
    matchLabels:
      app: {name}
  policyTypes:
  - Ingress
  - Egress
  ingress:
  - from:
    - podSelector: {{}}
  egress:
  - to:
    - namespaceSelector:
        matchLabels:
          kubernetes.io/metadata.name: kube-system
      podSelector:
        matchLabels:
          k8s-app: kube-dns
    ports:
    - protocol: UDP
      port: 53
    - protocol: TCP
      port: 53
  - to:
    - podSelector: {{}}
"#,
        name = service.name,
        ns = service.namespace,
    )
}

fn cilium_policy_template(service: &ServiceNode) -> String {
    format!(
        r#"apiVersion: cilium.io/v2
kind: CiliumNetworkPolicy
metadata:
  name: {name}-cnp
  namespace: {ns}
spec:
  endpointSelector:
    matchLabels:
      app: {name}
  ingress:
  - fromEndpoints:
    - {{}}
  egress:
  - toEndpoints:
    - matchLabels:
        k8s-app: kube-dns
    toPorts:
    - ports:
      - port: "53"
        protocol: UDP
      - port: "53"
        protocol: TCP
"#,
        name = service.name,
        ns = service.namespace,
    )
}

fn allow_connection_template(
    source_ns: &str,
    source_name: &str,
    target_ns: &str,
    target_name: &str,
) -> String {
    if source_ns == target_ns {
        format!(
            r#"apiVersion: networking.k8s.io/v1
kind: NetworkPolicy
metadata:
  name: allow-{source_name}-to-{target_name}
  namespace: {source_ns}
spec:
  podSelector:
    matchLabels:
      app: {target_name}
  policyTypes:
  - Ingress
  ingress:
  - from:
    - podSelector:
        matchLabels:
          app: {source_name}
"#
        )
    } else {
        format!(
            r#"apiVersion: networking.k8s.io/v1
kind: NetworkPolicy
metadata:
  name: allow-{source_name}-to-{target_name}
  namespace: {target_ns}
spec:
  podSelector:
    matchLabels:
      app: {target_name}
  policyTypes:
  - Ingress
  ingress:
  - from:
    - namespaceSelector:
        matchLabels:
          kubernetes.io/metadata.name: {source_ns}
      podSelector:
        matchLabels:
          app: {source_name}
"#
        )
    }
}

fn tls_ingress_template(name: &str, namespace: &str, hosts: &[String], backend: &str) -> String {
    let host = hosts.first().map(String::as_str).unwrap_or("example.com");
    format!(
        r#"apiVersion: networking.k8s.io/v1
kind: Ingress
metadata:
  name: {name}
  namespace: {namespace}
  annotations:
    cert-manager.io/cluster-issuer: letsencrypt-prod
spec:
  tls:
  - hosts:
    - {host}
    secretName: {name}-tls
  rules:
  - host: {host}
    http:
      paths:
      - path: /
        pathType: Prefix
        backend:
          service:
            name: {backend}
            port:
              number: 80
"#
    )
}

const STRICT_MTLS_TEMPLATE: &str = r#"apiVersion: security.istio.io/v1beta1
kind: PeerAuthentication
metadata:
  name: default
  namespace: istio-system
spec:
  mtls:
    mode: STRICT
"#;

const EGRESS_GATEWAY_TEMPLATE: &str = r#"apiVersion: networking.istio.io/v1beta1
kind: ServiceEntry
metadata:
  name: external-api
spec:
  hosts:
  - api.example.com
  ports:
  - number: 443
    name: https
    protocol: HTTPS
  resolution: DNS
  location: MESH_EXTERNAL
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        policy::{NativeRules, PolicyRule},
        testing::{mk_node, mk_topology},
        topology::MeshKind,
        Selector,
    };
    use std::iter::FromIterator;

    fn native_policy(ns: &str) -> PolicyRule {
        PolicyRule::native(
            "default-policy",
            ns,
            NativeRules {
                pod_selector: Selector::from_iter(Some(("app", "web"))),
                ingress_declared: true,
                egress_declared: false,
                ingress_rules: 1,
                egress_rules: 0,
            },
        )
    }

    #[test]
    fn uncovered_service_yields_np_001() {
        let topology = mk_topology(vec![mk_node("default", "web", &[("app", "web")])]);
        let findings = recommendations(&topology);

        let finding = findings
            .iter()
            .find(|r| r.id.starts_with("np-001"))
            .expect("np-001 finding expected");
        assert_eq!(finding.service.as_deref(), Some("default/web"));
        assert!(finding.fix.template.contains("NetworkPolicy"));
    }

    #[test]
    fn covered_service_passes_np_001() {
        let mut topology = mk_topology(vec![mk_node("default", "web", &[("app", "web")])]);
        topology.policies.push(native_policy("default"));

        let report = run_checks(&topology);
        assert!(report.checks["np-001"].passed);
    }

    #[test]
    fn system_namespaces_are_skipped() {
        let topology = mk_topology(vec![mk_node("kube-system", "kube-dns", &[("k8s-app", "dns")])]);
        let report = run_checks(&topology);
        assert!(report.checks["np-001"].passed);
    }

    #[test]
    fn mesh_coverage_check_tracks_threshold() {
        // 1 of 2 services meshed: 50% coverage fails.
        let mut below = mk_topology(vec![
            mk_node("ns1", "web", &[("app", "web")]),
            mk_node("ns1", "api", &[("app", "api")]),
        ]);
        below.infrastructure.istio_enabled = true;
        below.summary.services_with_mesh = 1;
        assert!(recommendations(&below).iter().any(|r| r.id == "mesh-001"));

        // Raising membership above 80% removes the finding.
        let mut above = below.clone();
        above.summary.services_with_mesh = 2;
        assert!(!recommendations(&above).iter().any(|r| r.id == "mesh-001"));
    }

    #[test]
    fn mesh_checks_require_a_mesh() {
        let topology = mk_topology(vec![mk_node("ns1", "web", &[("app", "web")])]);
        let findings = recommendations(&topology);
        assert!(!findings.iter().any(|r| r.id == "mesh-001"));
        assert!(!findings.iter().any(|r| r.id == "mesh-mtls-001"));
        assert!(!findings.iter().any(|r| r.id == "egress-001"));
    }

    #[test]
    fn score_is_single_pass_consistent() {
        let topology = mk_topology(vec![mk_node("default", "web", &[("app", "web")])]);
        let report = run_checks(&topology);

        let failed = report.checks.values().filter(|c| !c.passed).count();
        assert_eq!(report.passed + failed, report.total);
        assert_eq!(
            report.score,
            (report.passed * 100 / report.total) as u32
        );
        // Every failed check contributed at least one finding.
        for (id, check) in &report.checks {
            let has_findings = report.recommendations.iter().any(|r| r.id.starts_with(id));
            assert_eq!(!check.passed, has_findings, "{id}");
        }
    }

    #[test]
    fn score_is_monotonic_in_policy_coverage() {
        let mut uncovered = mk_topology(vec![mk_node("default", "web", &[("app", "web")])]);
        let mut covered = uncovered.clone();
        covered.policies.push(native_policy("default"));

        let without = run_checks(&uncovered).score;
        let with = run_checks(&covered).score;
        assert!(with > without, "adding coverage must not lower the score");

        // Removing the policy again restores the prior score.
        uncovered.policies.clear();
        assert_eq!(run_checks(&uncovered).score, without);
    }

    #[test]
    fn blocked_ratio_over_ten_percent_fails() {
        let mut topology = mk_topology(vec![
            mk_node("ns1", "web", &[("app", "web")]),
            mk_node("ns1", "api", &[("app", "api")]),
        ]);
        // Both edges blocked: 100% blocked ratio.
        for info in topology.connectivity.values_mut() {
            for conn in info.connections.iter_mut() {
                conn.allowed = false;
                conn.blocking_policies = vec!["deny-all".to_string()];
            }
        }
        topology.summary.total_connections = 2;
        topology.summary.blocked_connections = 2;
        topology.summary.allowed_connections = 0;

        let findings = recommendations(&topology);
        let blocked: Vec<_> = findings
            .iter()
            .filter(|r| r.id.starts_with("blocked-001"))
            .collect();
        assert_eq!(blocked.len(), 2);
        assert!(blocked[0].description.contains("deny-all"));
    }

    #[test]
    fn ingress_without_tls_is_critical() {
        let mut topology = mk_topology(vec![mk_node("ns1", "web", &[("app", "web")])]);
        topology.ingress.ingresses.push(crate::gateway::IngressResource {
            name: "web".to_string(),
            namespace: "ns1".to_string(),
            hosts: vec!["web.example.com".to_string()],
            backend: "web".to_string(),
            tls: false,
            ..Default::default()
        });

        let findings = recommendations(&topology);
        let finding = findings
            .iter()
            .find(|r| r.id == "ingress-001-web")
            .expect("TLS finding expected");
        assert_eq!(finding.severity, Severity::Critical);
        assert!(finding.fix.template.contains("secretName: web-tls"));
    }

    #[test]
    fn policy_ratio_counts_only_native_rules() {
        let mut topology = mk_topology(vec![
            mk_node("ns1", "web", &[("app", "web")]),
            mk_node("ns1", "api", &[("app", "api")]),
        ]);
        topology
            .policies
            .push(PolicyRule::opaque(PolicyEngine::Ebpf, "cnp", "ns1"));
        let report = run_checks(&topology);
        assert!(!report.checks["policy-ratio-001"].passed);

        topology.policies.push(native_policy("ns1"));
        let report = run_checks(&topology);
        assert!(report.checks["policy-ratio-001"].passed);
    }

    #[test]
    fn meshed_node_coverage_uses_summary() {
        let mut node = mk_node("ns1", "web", &[("app", "web")]);
        node.mesh = MeshKind::Istio;
        let topology = mk_topology(vec![node]);
        assert_eq!(topology.summary.services_with_mesh, 1);
        assert_eq!(topology.summary.mesh_coverage, "100%");
    }
}
