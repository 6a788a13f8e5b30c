//! Infrastructure detection.
//!
//! Runs once per topology computation. All probes are best-effort: an API
//! failure leaves the corresponding capability off rather than failing the
//! computation.

use crate::ClusterConfig;
use kube::{
    api::{Api, ListParams},
    Client,
};
use topology_controller_core::topology::Infrastructure;
use topology_controller_k8s_api as k8s;
use tracing::{debug, instrument};

/// Mesh and policy-engine presence require both the well-known namespace
/// and its control-plane deployment; the namespace alone proves nothing.
async fn control_plane_present(client: &Client, namespace: &str, deployment: &str) -> bool {
    let namespaces: Api<k8s::Namespace> = Api::all(client.clone());
    match namespaces.get_opt(namespace).await {
        Ok(Some(_)) => {}
        _ => return false,
    }

    let deployments: Api<k8s::Deployment> = Api::namespaced(client.clone(), namespace);
    matches!(deployments.get_opt(deployment).await, Ok(Some(_)))
}

#[instrument(skip_all)]
pub(crate) async fn detect(client: &Client, config: &ClusterConfig) -> Infrastructure {
    let mut infra = Infrastructure::default();

    // CNI identity from daemonset workload naming.
    let daemonsets: Api<k8s::DaemonSet> = Api::all(client.clone());
    if let Ok(list) = daemonsets.list(&ListParams::default()).await {
        for ds in list.items {
            let name = ds.metadata.name.unwrap_or_default().to_lowercase();
            if name.contains("cilium") {
                infra.cni = "cilium".to_string();
                infra.cilium_enabled = true;
                break;
            } else if name.contains("flannel") {
                infra.cni = "flannel".to_string();
            } else if name.contains("calico") {
                infra.cni = "calico".to_string();
            }
        }
    }

    infra.istio_enabled =
        control_plane_present(client, &config.mesh_namespace, &config.mesh_deployment).await;
    infra.kyverno_enabled = control_plane_present(
        client,
        &config.policy_engine_namespace,
        &config.policy_engine_deployment,
    )
    .await;
    infra.hubble_enabled = detect_hubble(client).await;

    debug!(
        cni = %infra.cni,
        istio = infra.istio_enabled,
        cilium = infra.cilium_enabled,
        kyverno = infra.kyverno_enabled,
        hubble = infra.hubble_enabled,
        "detected infrastructure"
    );
    infra
}

/// Hubble (flow observability) runs as a labelled deployment or service.
async fn detect_hubble(client: &Client) -> bool {
    let params = ListParams::default().labels("k8s-app=hubble");

    let deployments: Api<k8s::Deployment> = Api::all(client.clone());
    if let Ok(list) = deployments.list(&params).await {
        if !list.items.is_empty() {
            return true;
        }
    }

    let services: Api<k8s::Service> = Api::all(client.clone());
    match services.list(&params).await {
        Ok(list) => !list.items.is_empty(),
        Err(_) => false,
    }
}
