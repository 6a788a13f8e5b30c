//! The resource aggregator: one cached, deadline-bounded list operation per
//! resource kind.
//!
//! Services and pods return hard errors; every other kind degrades to an
//! empty result plus a warning string the caller collects. A CRD kind that
//! is not installed surfaces as a soft failure like any other.

use crate::{
    cache::Cache,
    error::{FetchError, Resource},
    ClusterConfig,
};
use kube::{
    api::{Api, ListParams},
    Client,
};
use serde::de::DeserializeOwned;
use std::{fmt::Debug, sync::Arc};
use topology_controller_core::{
    gateway::IngressResource,
    policy::{NativeRules, PolicyEngine, PolicyRule},
    topology::{
        DriftApplication, DriftData, RbacData, RoleBindingInfo, ServiceAccountInfo, SubjectInfo,
    },
    Expression, Operator, Selector,
};
use topology_controller_k8s_api::{
    self as k8s,
    ebpf::{CiliumClusterwideNetworkPolicy, CiliumNetworkPolicy},
    gitops::Application,
    mesh::{AuthorizationPolicy, Gateway, ServiceEntry, VirtualService},
    ResourceExt,
};
use tracing::{instrument, warn};

/// A soft fetch result: the records plus a warning when the fetch degraded.
pub type Degradable<T> = (T, Option<String>);

#[derive(Clone)]
pub(crate) struct Fetch {
    client: Client,
    cache: Arc<Cache>,
    config: Arc<ClusterConfig>,
}

// === impl Fetch ===

impl Fetch {
    pub(crate) fn new(client: Client, cache: Arc<Cache>, config: Arc<ClusterConfig>) -> Self {
        Self {
            client,
            cache,
            config,
        }
    }

    /// Lists a namespaced resource kind, all-namespaces when `ns` is empty.
    async fn list<K>(&self, resource: Resource, ns: &str) -> Result<Vec<K>, FetchError>
    where
        K: kube::Resource<Scope = k8s_openapi::NamespaceResourceScope>
            + Clone
            + DeserializeOwned
            + Debug,
        K::DynamicType: Default,
    {
        let api: Api<K> = if ns.is_empty() {
            Api::all(self.client.clone())
        } else {
            Api::namespaced(self.client.clone(), ns)
        };
        self.run_list(resource, api, ListParams::default()).await
    }

    /// Lists a cluster-scoped resource kind.
    async fn list_cluster<K>(&self, resource: Resource) -> Result<Vec<K>, FetchError>
    where
        K: kube::Resource + Clone + DeserializeOwned + Debug,
        K::DynamicType: Default,
    {
        let api: Api<K> = Api::all(self.client.clone());
        self.run_list(resource, api, ListParams::default()).await
    }

    async fn run_list<K>(
        &self,
        resource: Resource,
        api: Api<K>,
        params: ListParams,
    ) -> Result<Vec<K>, FetchError>
    where
        K: Clone + DeserializeOwned + Debug,
    {
        let timeout = self.config.fetch_timeout;
        match tokio::time::timeout(timeout, api.list(&params)).await {
            Ok(Ok(list)) => Ok(list.items),
            Ok(Err(source)) => Err(FetchError::new(resource, source)),
            Err(_) => Err(FetchError::Timeout { resource, timeout }),
        }
    }

    /// Runs a soft fetch against the cache, degrading failures to an empty
    /// result plus a warning.
    async fn cached_soft<T, F>(&self, key: String, fetch: F) -> Degradable<T>
    where
        T: Clone + Default + Send + Sync + 'static,
        F: std::future::Future<Output = Result<T, FetchError>>,
    {
        if let Some(hit) = self.cache.get::<T>(&key) {
            return (hit, None);
        }
        match fetch.await {
            Ok(value) => {
                self.cache.set(key, value.clone());
                (value, None)
            }
            Err(error) => {
                warn!(%error, "degrading to empty result");
                (T::default(), Some(error.to_string()))
            }
        }
    }

    #[instrument(skip(self))]
    pub(crate) async fn services(&self, ns: &str) -> Result<Vec<k8s::Service>, FetchError> {
        let key = format!("services:{ns}");
        if let Some(hit) = self.cache.get::<Vec<k8s::Service>>(&key) {
            return Ok(hit);
        }
        let items = self.list::<k8s::Service>(Resource::Services, ns).await?;
        self.cache.set(key, items.clone());
        Ok(items)
    }

    #[instrument(skip(self))]
    pub(crate) async fn pods(&self, ns: &str) -> Result<Vec<k8s::Pod>, FetchError> {
        let key = format!("pods:{ns}");
        if let Some(hit) = self.cache.get::<Vec<k8s::Pod>>(&key) {
            return Ok(hit);
        }
        let items = self.list::<k8s::Pod>(Resource::Pods, ns).await?;
        self.cache.set(key, items.clone());
        Ok(items)
    }

    #[instrument(skip(self))]
    pub(crate) async fn network_policies(&self, ns: &str) -> Degradable<Vec<PolicyRule>> {
        self.cached_soft(format!("networkpolicies:{ns}"), async {
            let items = self
                .list::<k8s::NetworkPolicy>(Resource::NetworkPolicies, ns)
                .await?;
            Ok(items.into_iter().map(normalize_network_policy).collect())
        })
        .await
    }

    #[instrument(skip(self))]
    pub(crate) async fn mesh_policies(&self, ns: &str) -> Degradable<Vec<PolicyRule>> {
        self.cached_soft(format!("meshpolicies:{ns}"), async {
            let items = self
                .list::<AuthorizationPolicy>(Resource::MeshPolicies, ns)
                .await?;
            Ok(items
                .into_iter()
                .map(|ap| {
                    PolicyRule::opaque(
                        PolicyEngine::Mesh,
                        ap.name_any(),
                        ap.namespace().unwrap_or_default(),
                    )
                })
                .collect())
        })
        .await
    }

    #[instrument(skip(self))]
    pub(crate) async fn ebpf_policies(&self, ns: &str) -> Degradable<Vec<PolicyRule>> {
        self.cached_soft(format!("ebpfpolicies:{ns}"), async {
            let mut rules: Vec<PolicyRule> = self
                .list::<CiliumNetworkPolicy>(Resource::EbpfPolicies, ns)
                .await?
                .into_iter()
                .map(|cnp| {
                    PolicyRule::opaque(
                        PolicyEngine::Ebpf,
                        cnp.name_any(),
                        cnp.namespace().unwrap_or_default(),
                    )
                })
                .collect();

            // Cluster-wide policies carry an empty namespace so they apply
            // in every scope.
            let cluster = self
                .list_cluster::<CiliumClusterwideNetworkPolicy>(Resource::EbpfPolicies)
                .await?;
            rules.extend(
                cluster
                    .into_iter()
                    .map(|c| PolicyRule::opaque(PolicyEngine::Ebpf, c.name_any(), "")),
            );
            Ok(rules)
        })
        .await
    }

    #[instrument(skip(self))]
    pub(crate) async fn rbac(&self, ns: &str) -> Degradable<RbacData> {
        self.cached_soft(format!("rbac:{ns}"), async {
            let role_bindings = self
                .list::<k8s::RoleBinding>(Resource::Rbac, ns)
                .await?
                .into_iter()
                .map(|rb| RoleBindingInfo {
                    name: rb.name_any(),
                    namespace: rb.namespace().unwrap_or_default(),
                    role_name: rb.role_ref.name.clone(),
                    role_kind: rb.role_ref.kind.clone(),
                    subjects: convert_subjects(rb.subjects),
                })
                .collect();

            let cluster_role_bindings = self
                .list_cluster::<k8s::ClusterRoleBinding>(Resource::Rbac)
                .await?
                .into_iter()
                .map(|crb| RoleBindingInfo {
                    name: crb.name_any(),
                    namespace: String::new(),
                    role_name: crb.role_ref.name.clone(),
                    role_kind: crb.role_ref.kind.clone(),
                    subjects: convert_subjects(crb.subjects),
                })
                .collect();

            let service_accounts = self
                .list::<k8s::ServiceAccount>(Resource::Rbac, ns)
                .await?
                .into_iter()
                .map(|sa| ServiceAccountInfo {
                    name: sa.name_any(),
                    namespace: sa.namespace().unwrap_or_default(),
                })
                .collect();

            Ok(RbacData {
                role_bindings,
                cluster_role_bindings,
                service_accounts,
            })
        })
        .await
    }

    #[instrument(skip(self))]
    pub(crate) async fn drift(&self) -> Degradable<DriftData> {
        self.cached_soft("drift:".to_string(), async {
            let apps = self
                .list::<Application>(Resource::DriftApplications, "")
                .await?;
            let applications = apps
                .into_iter()
                .map(|app| {
                    let source = app.spec.source.clone().unwrap_or_default();
                    let status = app
                        .status
                        .as_ref()
                        .and_then(|s| s.sync.as_ref())
                        .map(|s| s.status.clone())
                        .unwrap_or_default();
                    DriftApplication {
                        name: app.name_any(),
                        namespace: app.namespace().unwrap_or_default(),
                        status,
                        repo_url: source.repo_url,
                        target_revision: source.target_revision,
                    }
                })
                .collect::<Vec<_>>();
            Ok(DriftData {
                argo_enabled: !applications.is_empty(),
                applications,
            })
        })
        .await
    }

    #[instrument(skip(self))]
    pub(crate) async fn ingresses(&self, ns: &str) -> Degradable<Vec<IngressResource>> {
        self.cached_soft(format!("ingresses:{ns}"), async {
            let items = self.list::<k8s::Ingress>(Resource::Ingresses, ns).await?;
            Ok(items.into_iter().map(normalize_ingress).collect())
        })
        .await
    }

    #[instrument(skip(self))]
    pub(crate) async fn mesh_gateways(&self, ns: &str) -> Degradable<Vec<Gateway>> {
        self.cached_soft(format!("meshgateways:{ns}"), async {
            self.list::<Gateway>(Resource::Gateways, ns).await
        })
        .await
    }

    #[instrument(skip(self))]
    pub(crate) async fn virtual_services(&self, ns: &str) -> Degradable<Vec<VirtualService>> {
        self.cached_soft(format!("virtualservices:{ns}"), async {
            self.list::<VirtualService>(Resource::Gateways, ns).await
        })
        .await
    }

    #[instrument(skip(self))]
    pub(crate) async fn service_entries(&self, ns: &str) -> Degradable<Vec<ServiceEntry>> {
        self.cached_soft(format!("serviceentries:{ns}"), async {
            self.list::<ServiceEntry>(Resource::ExternalServices, ns).await
        })
        .await
    }

    /// Mesh egress-gateway workloads, found by their well-known label.
    #[instrument(skip(self))]
    pub(crate) async fn egress_gateways(&self) -> Degradable<Vec<k8s::Deployment>> {
        let label = self.config.egress_gateway_label.clone();
        self.cached_soft("egressgateways:".to_string(), async {
            let api: Api<k8s::Deployment> = Api::all(self.client.clone());
            self.run_list(
                Resource::Gateways,
                api,
                ListParams::default().labels(&label),
            )
            .await
        })
        .await
    }
}

fn convert_subjects(
    subjects: Option<Vec<k8s_openapi::api::rbac::v1::Subject>>,
) -> Vec<SubjectInfo> {
    subjects
        .unwrap_or_default()
        .into_iter()
        .map(|s| SubjectInfo {
            kind: s.kind,
            name: s.name,
            namespace: s.namespace.unwrap_or_default(),
        })
        .collect()
}

/// Converts a Kubernetes label selector into the engine's selector type.
pub(crate) fn convert_selector(
    selector: &k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector,
) -> Selector {
    let expressions = selector.match_expressions.as_ref().map(|exprs| {
        exprs
            .iter()
            .map(|e| Expression {
                key: e.key.clone(),
                operator: match e.operator.as_str() {
                    "In" => Operator::In,
                    "NotIn" => Operator::NotIn,
                    "DoesNotExist" => Operator::DoesNotExist,
                    _ => Operator::Exists,
                },
                values: e.values.clone().unwrap_or_default().into_iter().collect(),
            })
            .collect()
    });
    Selector::new(selector.match_labels.clone(), expressions)
}

fn normalize_network_policy(np: k8s::NetworkPolicy) -> PolicyRule {
    let name = np.name_any();
    let namespace = np.namespace().unwrap_or_default();

    let Some(spec) = np.spec else {
        return PolicyRule::opaque(PolicyEngine::Native, name, namespace);
    };

    let types = spec.policy_types.unwrap_or_default();
    // Absent policyTypes default to the directions that have rule sections.
    let (ingress_declared, egress_declared) = if types.is_empty() {
        (spec.ingress.is_some(), spec.egress.is_some())
    } else {
        (
            types.iter().any(|t| t == "Ingress"),
            types.iter().any(|t| t == "Egress"),
        )
    };

    PolicyRule::native(
        name,
        namespace,
        NativeRules {
            pod_selector: convert_selector(&spec.pod_selector),
            ingress_declared,
            egress_declared,
            ingress_rules: spec.ingress.map(|r| r.len()).unwrap_or(0),
            egress_rules: spec.egress.map(|r| r.len()).unwrap_or(0),
        },
    )
}

fn normalize_ingress(ing: k8s::Ingress) -> IngressResource {
    let name = ing.name_any();
    let namespace = ing.namespace().unwrap_or_default();
    let spec = ing.spec.unwrap_or_default();

    let class = spec.ingress_class_name.unwrap_or_default();
    let tls = spec.tls.map(|t| !t.is_empty()).unwrap_or(false);

    let mut hosts = Vec::new();
    let mut paths = Vec::new();
    let mut backend = String::new();
    let mut backend_port = String::new();

    for rule in spec.rules.unwrap_or_default() {
        if let Some(host) = rule.host {
            hosts.push(host);
        }
        for path in rule.http.map(|h| h.paths).unwrap_or_default() {
            if let Some(p) = path.path {
                paths.push(p);
            }
            if let Some(svc) = path.backend.service {
                backend = svc.name;
                if let Some(port) = svc.port.and_then(|p| p.number) {
                    backend_port = port.to_string();
                }
            }
        }
    }

    IngressResource {
        name,
        namespace,
        hosts,
        paths,
        backend,
        backend_port,
        tls,
        class,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::networking::v1::{
        NetworkPolicyIngressRule, NetworkPolicySpec,
    };
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
    use maplit::btreemap;
    use topology_controller_k8s_api::ObjectMeta;

    fn mk_policy(name: &str, ns: &str, spec: NetworkPolicySpec) -> k8s::NetworkPolicy {
        k8s::NetworkPolicy {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(ns.to_string()),
                ..Default::default()
            },
            spec: Some(spec),
        }
    }

    #[test]
    fn default_deny_normalizes_with_zero_rules() {
        let np = mk_policy(
            "deny-all",
            "ns1",
            NetworkPolicySpec {
                pod_selector: LabelSelector::default(),
                policy_types: Some(vec!["Ingress".to_string()]),
                ingress: Some(vec![]),
                ..Default::default()
            },
        );

        let rule = normalize_network_policy(np);
        assert_eq!(rule.engine, PolicyEngine::Native);
        let native = rule.native.expect("native rules retained");
        assert!(native.ingress_declared);
        assert!(!native.egress_declared);
        assert_eq!(native.ingress_rules, 0);
    }

    #[test]
    fn absent_policy_types_default_to_present_sections() {
        let np = mk_policy(
            "allow-web",
            "ns1",
            NetworkPolicySpec {
                pod_selector: LabelSelector {
                    match_labels: Some(btreemap! {
                        "app".to_string() => "web".to_string(),
                    }),
                    ..Default::default()
                },
                ingress: Some(vec![NetworkPolicyIngressRule::default()]),
                ..Default::default()
            },
        );

        let native = normalize_network_policy(np).native.unwrap();
        assert!(native.ingress_declared);
        assert!(!native.egress_declared);
        assert_eq!(native.ingress_rules, 1);
        assert!(!native.pod_selector.is_empty());
    }

    #[test]
    fn selector_conversion_handles_expressions() {
        use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelectorRequirement;

        let selector = convert_selector(&LabelSelector {
            match_labels: None,
            match_expressions: Some(vec![LabelSelectorRequirement {
                key: "tier".to_string(),
                operator: "In".to_string(),
                values: Some(vec!["front".to_string()]),
            }]),
        });

        let front: topology_controller_core::Labels =
            [("tier", "front")].into_iter().collect();
        let back: topology_controller_core::Labels =
            [("tier", "back")].into_iter().collect();
        assert!(selector.matches(&front));
        assert!(!selector.matches(&back));
    }

    #[test]
    fn ingress_normalization_reads_tls_and_backend() {
        use k8s_openapi::api::networking::v1::{
            HTTPIngressPath, HTTPIngressRuleValue, IngressBackend, IngressRule,
            IngressServiceBackend, IngressSpec, IngressTLS, ServiceBackendPort,
        };

        let ing = k8s::Ingress {
            metadata: ObjectMeta {
                name: Some("web".to_string()),
                namespace: Some("ns1".to_string()),
                ..Default::default()
            },
            spec: Some(IngressSpec {
                ingress_class_name: Some("nginx".to_string()),
                tls: Some(vec![IngressTLS::default()]),
                rules: Some(vec![IngressRule {
                    host: Some("web.example.com".to_string()),
                    http: Some(HTTPIngressRuleValue {
                        paths: vec![HTTPIngressPath {
                            path: Some("/".to_string()),
                            path_type: "Prefix".to_string(),
                            backend: IngressBackend {
                                service: Some(IngressServiceBackend {
                                    name: "web".to_string(),
                                    port: Some(ServiceBackendPort {
                                        number: Some(80),
                                        ..Default::default()
                                    }),
                                }),
                                ..Default::default()
                            },
                        }],
                    }),
                }]),
                ..Default::default()
            }),
            ..Default::default()
        };

        let resource = normalize_ingress(ing);
        assert_eq!(resource.class, "nginx");
        assert!(resource.tls);
        assert_eq!(resource.backend, "web");
        assert_eq!(resource.backend_port, "80");
        assert_eq!(resource.hosts, vec!["web.example.com".to_string()]);
    }
}
