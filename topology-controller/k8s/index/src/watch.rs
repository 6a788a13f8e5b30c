//! Policy change notifications.
//!
//! Watches the three policy resource families and forwards
//! `(event, engine, name, namespace)` records to subscribers. The engine
//! only emits these events; formatting and transport belong to the
//! notification layer. A change also invalidates cached topologies so the
//! next computation observes it.

use crate::cache::Cache;
use futures::StreamExt;
use kube::{
    api::Api,
    runtime::watcher::{self, watcher, Event},
    Client,
};
use serde::de::DeserializeOwned;
use std::{fmt::Debug, sync::Arc};
use tokio::sync::broadcast;
use topology_controller_core::{policy::PolicyEngine, topology::Infrastructure};
use topology_controller_k8s_api::{
    self as k8s, ebpf::CiliumNetworkPolicy, mesh::AuthorizationPolicy, ResourceExt,
};
use tracing::{debug, info};

/// How many undelivered changes to buffer per subscriber before lagging.
const CHANNEL_CAPACITY: usize = 64;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ChangeKind {
    Applied,
    Deleted,
}

/// One observed change to a watched policy resource.
#[derive(Clone, Debug)]
pub struct PolicyChange {
    pub event: ChangeKind,
    pub engine: PolicyEngine,
    pub name: String,
    pub namespace: String,
}

/// Owns the background watch tasks; dropping it stops them.
pub struct PolicyWatcher {
    tx: broadcast::Sender<PolicyChange>,
    tasks: Vec<tokio::task::JoinHandle<()>>,
}

// === impl PolicyWatcher ===

impl PolicyWatcher {
    /// Spawns watches for every policy engine present on the cluster.
    pub fn spawn(client: Client, cache: Arc<Cache>, infra: &Infrastructure) -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);

        let mut tasks = vec![spawn_watch::<k8s::NetworkPolicy>(
            client.clone(),
            PolicyEngine::Native,
            tx.clone(),
            cache.clone(),
        )];
        if infra.istio_enabled {
            tasks.push(spawn_watch::<AuthorizationPolicy>(
                client.clone(),
                PolicyEngine::Mesh,
                tx.clone(),
                cache.clone(),
            ));
        }
        if infra.cilium_enabled {
            tasks.push(spawn_watch::<CiliumNetworkPolicy>(
                client,
                PolicyEngine::Ebpf,
                tx.clone(),
                cache,
            ));
        }

        Self { tx, tasks }
    }

    /// The registration hook for the notification layer.
    pub fn subscribe(&self) -> broadcast::Receiver<PolicyChange> {
        self.tx.subscribe()
    }
}

impl Drop for PolicyWatcher {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

fn spawn_watch<K>(
    client: Client,
    engine: PolicyEngine,
    tx: broadcast::Sender<PolicyChange>,
    cache: Arc<Cache>,
) -> tokio::task::JoinHandle<()>
where
    K: kube::Resource + Clone + DeserializeOwned + Debug + Send + 'static,
    K::DynamicType: Default,
{
    tokio::spawn(async move {
        let api: Api<K> = Api::all(client);
        let mut stream = watcher(api, watcher::Config::default()).boxed();

        while let Some(event) = stream.next().await {
            let (kind, obj) = match event {
                Ok(Event::Apply(obj)) => (ChangeKind::Applied, obj),
                Ok(Event::Delete(obj)) => (ChangeKind::Deleted, obj),
                // Initial list replays are not changes.
                Ok(Event::Init | Event::InitApply(_) | Event::InitDone) => continue,
                Err(error) => {
                    info!(%error, %engine, "policy watch failed, retrying");
                    tokio::time::sleep(std::time::Duration::from_secs(1)).await;
                    continue;
                }
            };

            let change = PolicyChange {
                event: kind,
                engine,
                name: obj.name_any(),
                namespace: obj.namespace().unwrap_or_default(),
            };
            debug!(?change.event, %change.engine, name = %change.name, "policy changed");

            // Cached topologies are stale once any policy changes.
            cache.invalidate_prefix("topology:");
            // Send fails only when no subscriber is registered; that's fine.
            let _ = tx.send(change);
        }
    })
}
