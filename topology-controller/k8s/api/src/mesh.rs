//! Partial Istio resource definitions.
//!
//! Only the fields the topology engine reads are declared; everything else
//! in the upstream schemas is ignored on deserialization. Authorization
//! rules in particular are deliberately not modeled — the evaluator treats
//! AuthorizationPolicies by identity only.

use std::collections::BTreeMap;

/// `networking.istio.io` Gateway: listener hosts/ports plus the workload
/// selector identifying the gateway deployment.
#[derive(
    Clone, Debug, Default, kube::CustomResource, serde::Deserialize, serde::Serialize,
    schemars::JsonSchema,
)]
#[kube(
    group = "networking.istio.io",
    version = "v1beta1",
    kind = "Gateway",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct GatewaySpec {
    #[serde(default)]
    pub servers: Vec<GatewayServer>,
    #[serde(default)]
    pub selector: BTreeMap<String, String>,
}

#[derive(Clone, Debug, Default, serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GatewayServer {
    #[serde(default)]
    pub hosts: Vec<String>,
    pub port: Option<GatewayPort>,
}

#[derive(Clone, Debug, Default, serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GatewayPort {
    #[serde(default)]
    pub number: u32,
    #[serde(default)]
    pub protocol: String,
    #[serde(default)]
    pub name: String,
}

/// `networking.istio.io` VirtualService: hosts and HTTP routes to backend
/// services.
#[derive(
    Clone, Debug, Default, kube::CustomResource, serde::Deserialize, serde::Serialize,
    schemars::JsonSchema,
)]
#[kube(
    group = "networking.istio.io",
    version = "v1beta1",
    kind = "VirtualService",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct VirtualServiceSpec {
    #[serde(default)]
    pub hosts: Vec<String>,
    #[serde(default)]
    pub gateways: Vec<String>,
    #[serde(default)]
    pub http: Vec<HttpRoute>,
}

#[derive(Clone, Debug, Default, serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct HttpRoute {
    #[serde(default, rename = "match")]
    pub matches: Vec<HttpMatch>,
    #[serde(default)]
    pub route: Vec<HttpRouteDestination>,
}

#[derive(Clone, Debug, Default, serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct HttpMatch {
    pub uri: Option<StringMatch>,
}

#[derive(Clone, Debug, Default, serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StringMatch {
    pub prefix: Option<String>,
    pub exact: Option<String>,
}

#[derive(Clone, Debug, Default, serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct HttpRouteDestination {
    pub destination: Option<Destination>,
}

#[derive(Clone, Debug, Default, serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Destination {
    /// `svc`, `svc.ns` or a fully-qualified cluster DNS name.
    #[serde(default)]
    pub host: String,
    pub port: Option<DestinationPort>,
}

#[derive(Clone, Debug, Default, serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DestinationPort {
    #[serde(default)]
    pub number: u32,
}

/// `networking.istio.io` ServiceEntry: external hosts reachable from the
/// mesh.
#[derive(
    Clone, Debug, Default, kube::CustomResource, serde::Deserialize, serde::Serialize,
    schemars::JsonSchema,
)]
#[kube(
    group = "networking.istio.io",
    version = "v1beta1",
    kind = "ServiceEntry",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct ServiceEntrySpec {
    #[serde(default)]
    pub hosts: Vec<String>,
    #[serde(default)]
    pub ports: Vec<GatewayPort>,
    #[serde(default)]
    pub location: Option<String>,
}

/// `security.istio.io` AuthorizationPolicy, identity only.
#[derive(
    Clone, Debug, Default, kube::CustomResource, serde::Deserialize, serde::Serialize,
    schemars::JsonSchema,
)]
#[kube(
    group = "security.istio.io",
    version = "v1",
    kind = "AuthorizationPolicy",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationPolicySpec {
    #[serde(default)]
    pub action: Option<String>,
}

// === impl Destination ===

impl Destination {
    /// Splits the destination host into `(service, namespace)`. Hosts read
    /// `svc`, `svc.ns`, or `svc.ns.svc.cluster.local`; a missing namespace
    /// segment yields `None`.
    pub fn service_and_namespace(&self) -> (String, Option<String>) {
        let mut parts = self.host.split('.');
        let service = parts.next().unwrap_or_default().to_string();
        let namespace = parts.next().filter(|ns| *ns != "svc").map(str::to_string);
        (service, namespace)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn destination_host_forms() {
        for (host, svc, ns) in [
            ("reviews", "reviews", None),
            ("reviews.prod", "reviews", Some("prod")),
            ("reviews.prod.svc.cluster.local", "reviews", Some("prod")),
            ("reviews.svc.cluster.local", "reviews", None),
        ] {
            let dest = Destination {
                host: host.to_string(),
                port: None,
            };
            assert_eq!(
                dest.service_and_namespace(),
                (svc.to_string(), ns.map(str::to_string)),
                "{host}"
            );
        }
    }
}
