//! Builds `ServiceNode`s from fetched services and pods.
//!
//! Pods are indexed by namespace before any selector matching happens, so
//! each service only scans its own namespace rather than the whole cluster.

use crate::ClusterConfig;
use ahash::AHashMap;
use std::collections::HashMap;
use topology_controller_core::{
    service_key,
    topology::{DriftData, DriftStatus, Infrastructure, MeshKind, PodSecurity, ServiceNode, TrafficStats},
};
use topology_controller_k8s_api::{self as k8s, ResourceExt};
use tracing::trace;

/// Estimated $/month per vCPU of requested compute.
const CPU_DOLLARS_PER_CORE_MONTH: f64 = 30.0;
/// Estimated $/month per GiB of requested memory.
const MEM_DOLLARS_PER_GIB_MONTH: f64 = 4.0;

pub(crate) fn build_services(
    services: Vec<k8s::Service>,
    pods: Vec<k8s::Pod>,
    request_rates: &AHashMap<String, f64>,
    drift: &DriftData,
    infra: &Infrastructure,
    config: &ClusterConfig,
) -> HashMap<String, ServiceNode> {
    let mut pods_by_namespace: AHashMap<String, Vec<&k8s::Pod>> = AHashMap::default();
    for pod in &pods {
        pods_by_namespace
            .entry(pod.namespace().unwrap_or_default())
            .or_default()
            .push(pod);
    }

    let mut nodes = HashMap::with_capacity(services.len());
    for service in &services {
        let node = build_service(service, &pods_by_namespace, request_rates, infra, config);
        let key = service_key(&node.namespace, &node.name);
        nodes.insert(key, node);
    }

    map_drift(&mut nodes, drift);
    nodes
}

fn build_service(
    service: &k8s::Service,
    pods_by_namespace: &AHashMap<String, Vec<&k8s::Pod>>,
    request_rates: &AHashMap<String, f64>,
    infra: &Infrastructure,
    config: &ClusterConfig,
) -> ServiceNode {
    let name = service.name_any();
    let namespace = service.namespace().unwrap_or_default();
    let spec = service.spec.clone().unwrap_or_default();
    let selector = spec.selector.unwrap_or_default();

    let mut matching: Vec<&k8s::Pod> = Vec::new();
    if !selector.is_empty() {
        for pod in pods_by_namespace.get(&namespace).into_iter().flatten() {
            let labels = pod.metadata.labels.clone().unwrap_or_default();
            if selector.iter().all(|(k, v)| labels.get(k) == Some(v)) {
                matching.push(pod);
            }
        }
    }

    let healthy = matching
        .iter()
        .filter(|p| {
            p.status
                .as_ref()
                .and_then(|s| s.phase.as_deref())
                .map(|phase| phase == "Running")
                .unwrap_or(false)
        })
        .count();

    let has_istio = infra.istio_enabled && matching.iter().any(|p| pod_has_sidecar(p, config));
    let has_cilium_proxy = infra.cilium_enabled
        && matching.iter().any(|p| {
            p.annotations()
                .get(&config.ebpf_annotation)
                .map(|v| !v.is_empty())
                .unwrap_or(false)
        });
    let mesh = if has_istio {
        MeshKind::Istio
    } else if has_cilium_proxy {
        MeshKind::Cilium
    } else {
        MeshKind::None
    };

    let pod_security = service_security(&matching);

    let ports = spec
        .ports
        .unwrap_or_default()
        .iter()
        .map(|p| {
            let proto = p.protocol.as_deref().unwrap_or("TCP");
            match p.name.as_deref() {
                Some(n) if !n.is_empty() => format!("{n}:{}/{proto}", p.port),
                _ => format!("{}/{proto}", p.port),
            }
        })
        .collect();

    // The `app` label of a backing pod names the owning deployment, when the
    // convention is followed.
    let deployment = matching
        .iter()
        .find_map(|p| p.labels().get("app").cloned())
        .unwrap_or_default();

    let key = service_key(&namespace, &name);
    let traffic = request_rates
        .get(&key)
        .map(|&rps| traffic_stats(rps, &matching, config));

    trace!(%key, pods = matching.len(), healthy, %mesh, "built service node");

    ServiceNode {
        name,
        namespace,
        service_type: spec.type_.unwrap_or_default(),
        cluster_ip: spec.cluster_ip.unwrap_or_default(),
        ports,
        labels: service.metadata.labels.clone().into(),
        pods: matching.iter().map(|p| p.name_any()).collect(),
        pod_count: matching.len(),
        healthy_pods: healthy,
        deployment,
        mesh,
        pod_security,
        drift_status: DriftStatus::Unknown,
        has_policy: false,
        traffic,
    }
}

fn pod_has_sidecar(pod: &k8s::Pod, config: &ClusterConfig) -> bool {
    if pod.annotations().contains_key(&config.sidecar_annotation) {
        return true;
    }
    pod.spec
        .as_ref()
        .map(|spec| {
            spec.containers
                .iter()
                .any(|c| {
                    c.image
                        .as_deref()
                        .map(|i| i.contains(&config.mesh_proxy_image))
                        .unwrap_or(false)
                })
        })
        .unwrap_or(false)
}

/// Classifies one pod spec into a Pod Security Standards tier.
pub(crate) fn classify_pod_security(spec: &k8s::PodSpec) -> PodSecurity {
    let host_namespaces = spec.host_network.unwrap_or(false)
        || spec.host_pid.unwrap_or(false)
        || spec.host_ipc.unwrap_or(false);
    let privileged = spec.containers.iter().any(|c| {
        c.security_context
            .as_ref()
            .and_then(|sc| sc.privileged)
            .unwrap_or(false)
    });
    if host_namespaces || privileged {
        return PodSecurity::Privileged;
    }

    let restricted = !spec.containers.is_empty()
        && spec.containers.iter().all(|c| {
            c.security_context
                .as_ref()
                .map(|sc| {
                    sc.run_as_non_root == Some(true)
                        && sc.allow_privilege_escalation == Some(false)
                })
                .unwrap_or(false)
        });
    if restricted {
        return PodSecurity::Restricted;
    }

    PodSecurity::Baseline
}

/// The service's tier: privileged wins over any per-pod variance; restricted
/// requires every backing pod to qualify.
fn service_security(pods: &[&k8s::Pod]) -> PodSecurity {
    let mut tiers = pods
        .iter()
        .filter_map(|p| p.spec.as_ref())
        .map(classify_pod_security);

    let Some(first) = tiers.next() else {
        return PodSecurity::Baseline;
    };
    tiers.fold(first, |acc, tier| acc.max(tier))
}

fn traffic_stats(rps: f64, pods: &[&k8s::Pod], config: &ClusterConfig) -> TrafficStats {
    // Resource requests come from the first matching pod, assuming
    // homogeneous replicas.
    let (cpu_millis, mem_mib) = pods
        .first()
        .and_then(|p| p.spec.as_ref())
        .map(pod_requests)
        .unwrap_or((0, 0));

    let likely_unused = rps < config.unused_rps_threshold;
    let potential_saving = if likely_unused && (cpu_millis > 0 || mem_mib > 0) {
        let cpu_cost = cpu_millis as f64 / 1000.0 * CPU_DOLLARS_PER_CORE_MONTH;
        let mem_cost = mem_mib as f64 / 1024.0 * MEM_DOLLARS_PER_GIB_MONTH;
        format!("${:.2}/mo", cpu_cost + mem_cost)
    } else {
        "$0.00/mo".to_string()
    };

    TrafficStats {
        rps,
        cpu: format!("{cpu_millis}m"),
        memory: format!("{mem_mib}Mi"),
        potential_saving,
        likely_unused,
    }
}

/// Sums container CPU (millicores) and memory (MiB) requests.
fn pod_requests(spec: &k8s::PodSpec) -> (u64, u64) {
    let mut cpu = 0;
    let mut mem = 0;
    for container in &spec.containers {
        let Some(requests) = container
            .resources
            .as_ref()
            .and_then(|r| r.requests.as_ref())
        else {
            continue;
        };
        if let Some(q) = requests.get("cpu") {
            cpu += parse_cpu_millis(&q.0);
        }
        if let Some(q) = requests.get("memory") {
            mem += parse_memory_mib(&q.0);
        }
    }
    (cpu, mem)
}

fn parse_cpu_millis(quantity: &str) -> u64 {
    if let Some(millis) = quantity.strip_suffix('m') {
        return millis.parse().unwrap_or(0);
    }
    quantity
        .parse::<f64>()
        .map(|cores| (cores * 1000.0) as u64)
        .unwrap_or(0)
}

fn parse_memory_mib(quantity: &str) -> u64 {
    let parse = |s: &str| s.parse::<f64>().unwrap_or(0.0);
    let bytes = if let Some(v) = quantity.strip_suffix("Ki") {
        parse(v) * 1024.0
    } else if let Some(v) = quantity.strip_suffix("Mi") {
        parse(v) * 1024.0 * 1024.0
    } else if let Some(v) = quantity.strip_suffix("Gi") {
        parse(v) * 1024.0 * 1024.0 * 1024.0
    } else if let Some(v) = quantity.strip_suffix('k') {
        parse(v) * 1000.0
    } else if let Some(v) = quantity.strip_suffix('M') {
        parse(v) * 1_000_000.0
    } else if let Some(v) = quantity.strip_suffix('G') {
        parse(v) * 1_000_000_000.0
    } else {
        parse(quantity)
    };
    (bytes / (1024.0 * 1024.0)) as u64
}

/// Annotates services with the sync status of a matching drift application.
/// The match is a name-containment heuristic, not resource tracking.
fn map_drift(nodes: &mut HashMap<String, ServiceNode>, drift: &DriftData) {
    for node in nodes.values_mut() {
        for app in &drift.applications {
            let app_name = app.name.to_lowercase();
            if app_name.contains(&node.name.to_lowercase())
                || (app.namespace == node.namespace && app_name.contains("app"))
            {
                node.drift_status = DriftStatus::parse(&app.status);
                break;
            }
        }
    }
}
