//! Partial Cilium policy definitions.
//!
//! The engine never parses Cilium's rule language; these resources are
//! consumed as identity plus endpoint selector only.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;

/// `cilium.io/v2` namespaced network policy.
#[derive(
    Clone, Debug, Default, kube::CustomResource, serde::Deserialize, serde::Serialize,
    schemars::JsonSchema,
)]
#[kube(
    group = "cilium.io",
    version = "v2",
    kind = "CiliumNetworkPolicy",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct CiliumNetworkPolicySpec {
    #[serde(default)]
    pub endpoint_selector: Option<LabelSelector>,
}

/// `cilium.io/v2` cluster-wide network policy.
#[derive(
    Clone, Debug, Default, kube::CustomResource, serde::Deserialize, serde::Serialize,
    schemars::JsonSchema,
)]
#[kube(
    group = "cilium.io",
    version = "v2",
    kind = "CiliumClusterwideNetworkPolicy"
)]
#[serde(rename_all = "camelCase")]
pub struct CiliumClusterwideNetworkPolicySpec {
    #[serde(default)]
    pub endpoint_selector: Option<LabelSelector>,
}
