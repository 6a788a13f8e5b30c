//! Fetch error taxonomy.
//!
//! Services and pods are load-bearing: without them there is no graph, so
//! their failures abort the whole computation. Every other resource kind
//! degrades to an empty set plus a warning.

use std::time::Duration;

/// The resource kinds the aggregator fetches.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Resource {
    Services,
    Pods,
    NetworkPolicies,
    MeshPolicies,
    EbpfPolicies,
    Rbac,
    DriftApplications,
    Ingresses,
    Gateways,
    ExternalServices,
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The topology cannot be computed without this resource.
    #[error("failed to fetch {resource}: {source}")]
    Fatal {
        resource: Resource,
        #[source]
        source: kube::Error,
    },

    /// The computation continues with an empty set for this resource.
    #[error("failed to fetch {resource}: {source}")]
    Soft {
        resource: Resource,
        #[source]
        source: kube::Error,
    },

    #[error("fetching {resource} timed out after {timeout:?}")]
    Timeout { resource: Resource, timeout: Duration },
}

// === impl Resource ===

impl Resource {
    /// Whether a failed fetch of this kind aborts the computation.
    pub fn is_essential(&self) -> bool {
        matches!(self, Self::Services | Self::Pods)
    }
}

impl std::fmt::Display for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Services => "services",
            Self::Pods => "pods",
            Self::NetworkPolicies => "networkpolicies",
            Self::MeshPolicies => "mesh policies",
            Self::EbpfPolicies => "ebpf policies",
            Self::Rbac => "rbac bindings",
            Self::DriftApplications => "drift applications",
            Self::Ingresses => "ingresses",
            Self::Gateways => "gateways",
            Self::ExternalServices => "external services",
        };
        name.fmt(f)
    }
}

// === impl FetchError ===

impl FetchError {
    pub fn new(resource: Resource, source: kube::Error) -> Self {
        if resource.is_essential() {
            Self::Fatal { resource, source }
        } else {
            Self::Soft { resource, source }
        }
    }

    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Fatal { .. } => true,
            Self::Soft { .. } => false,
            Self::Timeout { resource, .. } => resource.is_essential(),
        }
    }
}
