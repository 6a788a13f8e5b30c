use crate::Selector;
use serde::{Deserialize, Serialize};

/// The policy engine a rule originates from.
///
/// Three independent rule languages are folded into one tagged
/// representation carrying only the fields the evaluator consults.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyEngine {
    /// Kubernetes NetworkPolicy.
    Native,
    /// Istio AuthorizationPolicy.
    Mesh,
    /// Cilium (eBPF) network policy, namespaced or cluster-wide.
    Ebpf,
}

/// One normalized policy object.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PolicyRule {
    pub engine: PolicyEngine,
    pub name: String,
    /// Empty for cluster-scoped objects.
    pub namespace: String,
    /// Structured rule content, retained for native policies only. Mesh and
    /// eBPF objects are carried as identity + name heuristic; their rule
    /// languages are not parsed.
    pub native: Option<NativeRules>,
}

/// The slice of a NetworkPolicy spec the evaluator needs: the workload
/// selector, which directions the policy declares, and how many rule entries
/// each direction carries. A declared direction with zero entries is
/// default-deny for that direction.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct NativeRules {
    pub pod_selector: Selector,
    pub ingress_declared: bool,
    pub egress_declared: bool,
    pub ingress_rules: usize,
    pub egress_rules: usize,
}

// === impl PolicyEngine ===

impl std::fmt::Display for PolicyEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Native => "native".fmt(f),
            Self::Mesh => "mesh".fmt(f),
            Self::Ebpf => "ebpf".fmt(f),
        }
    }
}

// === impl PolicyRule ===

impl PolicyRule {
    pub fn native(name: impl ToString, namespace: impl ToString, rules: NativeRules) -> Self {
        Self {
            engine: PolicyEngine::Native,
            name: name.to_string(),
            namespace: namespace.to_string(),
            native: Some(rules),
        }
    }

    pub fn opaque(engine: PolicyEngine, name: impl ToString, namespace: impl ToString) -> Self {
        Self {
            engine,
            name: name.to_string(),
            namespace: namespace.to_string(),
            native: None,
        }
    }

    /// Whether this rule is in scope for workloads of `namespace`.
    /// Cluster-scoped rules (empty namespace) apply everywhere.
    pub fn applies_in(&self, namespace: &str) -> bool {
        self.namespace.is_empty() || self.namespace == namespace
    }

    /// Name-based fallback used when a policy's structured rules are not
    /// available: a "deny"/"block" name is treated as blocking.
    pub fn name_suggests_deny(&self) -> bool {
        let name = self.name.to_lowercase();
        name.contains("deny") || name.contains("block")
    }
}
