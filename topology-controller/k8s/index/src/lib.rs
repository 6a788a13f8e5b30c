#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

//! Aggregates cluster state into a connectivity topology.
//!
//! One `Index::topology` call detects infrastructure, fans out the resource
//! fetches concurrently, builds the service graph, evaluates the policy
//! rule set, and splices in the synthetic gateway vertices. Results are
//! cached under a TTL; policy watches invalidate them.

mod cache;
mod detect;
mod error;
mod fetch;
mod gateways;
mod topology;
mod traffic;
mod watch;

pub use self::{
    cache::Cache,
    error::{FetchError, Resource},
    traffic::Traffic,
    watch::{ChangeKind, PolicyChange, PolicyWatcher},
};

use ahash::AHashMap;
use kube::Client;
use std::{sync::Arc, time::Duration};
use topology_controller_core::{
    evaluate, recommend,
    recommend::{ComplianceReport, Recommendation},
    topology::TopologyData,
    trace::{self, PathTrace},
};
use tracing::{debug, info, instrument, warn};

/// Cluster-specific knobs: well-known namespaces, control-plane names, and
/// the annotations that identify mesh and eBPF data planes.
#[derive(Clone, Debug)]
pub struct ClusterConfig {
    /// Namespace holding the mesh control plane.
    pub mesh_namespace: String,
    /// Control-plane deployment whose presence confirms the mesh.
    pub mesh_deployment: String,
    pub policy_engine_namespace: String,
    pub policy_engine_deployment: String,
    /// Image substring identifying a mesh sidecar container.
    pub mesh_proxy_image: String,
    /// Annotation stamped on injected pods.
    pub sidecar_annotation: String,
    /// Annotation naming the eBPF policy applied to a pod.
    pub ebpf_annotation: String,
    /// Label selector identifying mesh egress-gateway workloads.
    pub egress_gateway_label: String,
    /// Per-fetch deadline.
    pub fetch_timeout: Duration,
    /// Request rate below which a service counts as likely unused.
    pub unused_rps_threshold: f64,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            mesh_namespace: "istio-system".to_string(),
            mesh_deployment: "istiod".to_string(),
            policy_engine_namespace: "kyverno".to_string(),
            policy_engine_deployment: "kyverno".to_string(),
            mesh_proxy_image: "istio/".to_string(),
            sidecar_annotation: "sidecar.istio.io/status".to_string(),
            ebpf_annotation: "io.cilium.k8s.policy.name".to_string(),
            egress_gateway_label: "app=istio-egressgateway".to_string(),
            fetch_timeout: Duration::from_secs(15),
            unused_rps_threshold: 0.001,
        }
    }
}

/// The topology engine's public surface. Read-only against the cluster and
/// safe to call concurrently.
#[derive(Clone)]
pub struct Index {
    client: Client,
    cache: Arc<Cache>,
    config: Arc<ClusterConfig>,
    fetch: fetch::Fetch,
    traffic: Option<Traffic>,
}

// === impl Index ===

impl Index {
    pub fn new(
        client: Client,
        config: ClusterConfig,
        cache_ttl: Duration,
        metrics_url: Option<String>,
    ) -> Self {
        let cache = Arc::new(Cache::new(cache_ttl));
        let config = Arc::new(config);
        let traffic = metrics_url.and_then(|url| {
            Traffic::new(url, config.fetch_timeout)
                .map_err(|error| warn!(%error, "metrics client unavailable"))
                .ok()
        });
        let fetch = fetch::Fetch::new(client.clone(), cache.clone(), config.clone());
        Self {
            client,
            cache,
            config,
            fetch,
            traffic,
        }
    }

    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    /// Spawns the policy watches appropriate to the detected infrastructure
    /// and returns the notification hook.
    pub async fn policy_watcher(&self) -> PolicyWatcher {
        let infra = detect::detect(&self.client, self.config.as_ref()).await;
        PolicyWatcher::spawn(self.client.clone(), self.cache.clone(), &infra)
    }

    /// Forces the next `topology` call for `namespace` to recompute.
    pub fn invalidate(&self, namespace: &str) {
        let ns = normalize_namespace(namespace);
        self.cache.invalidate(&format!("topology:{ns}"));
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Computes (or returns the cached) topology for `namespace`; empty or
    /// `"all"` means the whole cluster.
    #[instrument(skip(self))]
    pub async fn topology(&self, namespace: &str) -> Result<Arc<TopologyData>, FetchError> {
        let ns = normalize_namespace(namespace);
        let key = format!("topology:{ns}");
        if let Some(hit) = self.cache.get::<Arc<TopologyData>>(&key) {
            debug!(%ns, "topology cache hit");
            return Ok(hit);
        }

        // Infrastructure first: it decides which CRD fetches are worth
        // attempting at all.
        let mut infra = detect::detect(&self.client, self.config.as_ref()).await;
        let mesh = infra.istio_enabled;
        let ebpf = infra.cilium_enabled;

        let (
            services,
            pods,
            native,
            mesh_policies,
            ebpf_policies,
            rbac,
            drift,
            ingresses,
            mesh_gateways,
            virtual_services,
            service_entries,
            egress_gateways,
            request_rates,
        ) = tokio::join!(
            self.fetch.services(ns),
            self.fetch.pods(ns),
            self.fetch.network_policies(ns),
            maybe(mesh, self.fetch.mesh_policies(ns)),
            maybe(ebpf, self.fetch.ebpf_policies(ns)),
            self.fetch.rbac(ns),
            self.fetch.drift(),
            self.fetch.ingresses(ns),
            maybe(mesh, self.fetch.mesh_gateways(ns)),
            maybe(mesh, self.fetch.virtual_services(ns)),
            maybe(mesh, self.fetch.service_entries(ns)),
            maybe(mesh, self.fetch.egress_gateways()),
            self.request_rates(ns),
        );

        // Services and pods are the only fatal fetches.
        let services = services?;
        let pods = pods?;

        let (native_rules, w_native) = native;
        let (mesh_rules, w_mesh) = mesh_policies;
        let (ebpf_rules, w_ebpf) = ebpf_policies;
        let (rbac, w_rbac) = rbac;
        let (drift, w_drift) = drift;
        let (ingresses, w_ing) = ingresses;
        let (mesh_gateways, w_gw) = mesh_gateways;
        let (virtual_services, w_vs) = virtual_services;
        let (service_entries, w_se) = service_entries;
        let (egress_gateways, w_egw) = egress_gateways;

        let warnings: Vec<String> = [
            w_native, w_mesh, w_ebpf, w_rbac, w_drift, w_ing, w_gw, w_vs, w_se, w_egw,
        ]
        .into_iter()
        .flatten()
        .collect();
        for warning in &warnings {
            warn!(%warning, "topology degraded");
        }

        infra.native_policies = native_rules.len();
        infra.mesh_policies = mesh_rules.len();
        infra.ebpf_policies = ebpf_rules.len();

        let mut rules = native_rules;
        rules.extend(mesh_rules);
        rules.extend(ebpf_rules);

        let mut nodes = topology::build_services(
            services,
            pods,
            &request_rates,
            &drift,
            &infra,
            self.config.as_ref(),
        );
        evaluate::apply_policy_coverage(&mut nodes, &rules);

        let ingress =
            gateways::resolve_ingress(ingresses, mesh_gateways, virtual_services, &nodes, &rules);
        let egress = gateways::resolve_egress(&nodes, service_entries, egress_gateways, &rules);

        let mut connectivity = evaluate::evaluate(&nodes, &rules);
        evaluate::attach_gateways(&mut connectivity, &ingress, &egress);
        let summary = evaluate::summarize(&nodes, &connectivity);

        info!(
            %ns,
            services = summary.total_services,
            connections = summary.total_connections,
            blocked = summary.blocked_connections,
            "computed topology"
        );

        let data = Arc::new(TopologyData {
            namespace: ns.to_string(),
            services: nodes,
            connectivity,
            ingress,
            egress,
            policies: rules,
            infrastructure: infra,
            summary,
            rbac,
            drift,
            warnings,
        });
        self.cache.set(key, data.clone());
        Ok(data)
    }

    /// Traces a path over a previously computed topology.
    pub fn trace_path(
        &self,
        source: &str,
        destination: &str,
        namespace: &str,
        topology: &TopologyData,
    ) -> PathTrace {
        trace::trace_path(source, destination, namespace, topology)
    }

    pub fn recommendations(&self, topology: &TopologyData) -> Vec<Recommendation> {
        recommend::recommendations(topology)
    }

    pub fn compliance_score(&self, topology: &TopologyData) -> ComplianceReport {
        recommend::run_checks(topology)
    }

    /// Best-effort traffic signal; failure leaves every service unsignalled.
    async fn request_rates(&self, namespace: &str) -> AHashMap<String, f64> {
        let Some(traffic) = &self.traffic else {
            return AHashMap::default();
        };
        match traffic.request_rates(namespace).await {
            Ok(rates) => rates,
            Err(error) => {
                warn!(%error, "metrics query failed, omitting traffic signal");
                AHashMap::default()
            }
        }
    }
}

fn normalize_namespace(namespace: &str) -> &str {
    if namespace == "all" {
        ""
    } else {
        namespace
    }
}

/// Runs a soft fetch only when its engine was detected; otherwise yields an
/// empty result with no warning.
async fn maybe<T: Default>(
    enabled: bool,
    fut: impl std::future::Future<Output = fetch::Degradable<T>>,
) -> fetch::Degradable<T> {
    if enabled {
        fut.await
    } else {
        (T::default(), None)
    }
}
