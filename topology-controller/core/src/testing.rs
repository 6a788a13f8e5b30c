//! Shared constructors for in-crate tests.

use crate::topology::{DriftStatus, MeshKind, PodSecurity, ServiceNode, TopologyData};
use std::collections::HashMap;

pub(crate) fn mk_node(ns: &str, name: &str, labels: &[(&'static str, &'static str)]) -> ServiceNode {
    ServiceNode {
        name: name.to_string(),
        namespace: ns.to_string(),
        service_type: "ClusterIP".to_string(),
        cluster_ip: "10.0.0.1".to_string(),
        ports: vec!["80/TCP".to_string()],
        labels: labels.iter().copied().collect(),
        pods: Vec::new(),
        pod_count: 0,
        healthy_pods: 0,
        deployment: String::new(),
        mesh: MeshKind::None,
        pod_security: PodSecurity::Baseline,
        drift_status: DriftStatus::Unknown,
        has_policy: false,
        traffic: None,
    }
}

pub(crate) fn mk_services(nodes: Vec<ServiceNode>) -> HashMap<String, ServiceNode> {
    nodes
        .into_iter()
        .map(|n| (crate::service_key(&n.namespace, &n.name), n))
        .collect()
}

pub(crate) fn mk_topology(nodes: Vec<ServiceNode>) -> TopologyData {
    let services = mk_services(nodes);
    let connectivity = crate::evaluate::evaluate(&services, &[]);
    let summary = crate::evaluate::summarize(&services, &connectivity);
    TopologyData {
        services,
        connectivity,
        summary,
        ..Default::default()
    }
}
