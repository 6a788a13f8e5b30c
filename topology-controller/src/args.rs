use anyhow::{bail, Result};
use clap::Parser;
use std::time::Duration;
use topology_controller_k8s_index::{ClusterConfig, Index};
use tracing::{info, instrument};

#[derive(Debug, Parser)]
#[clap(name = "topology", about = "A cluster topology and policy analysis controller")]
pub struct Args {
    #[clap(
        long,
        default_value = "topology=info,warn",
        env = "TOPOLOGY_CONTROLLER_LOG"
    )]
    log_level: kubert::LogFilter,

    #[clap(long, default_value = "plain")]
    log_format: kubert::LogFormat,

    #[clap(flatten)]
    client: kubert::ClientArgs,

    #[clap(flatten)]
    admin: kubert::AdminArgs,

    /// How long fetched resources and computed topologies stay fresh.
    #[clap(long, default_value = "30")]
    cache_ttl_secs: u64,

    /// Deadline applied to each cluster API list call.
    #[clap(long, default_value = "15")]
    fetch_timeout_secs: u64,

    /// Prometheus-compatible endpoint for the traffic/cost signal.
    #[clap(long, env = "TOPOLOGY_CONTROLLER_PROMETHEUS_URL")]
    prometheus_url: Option<String>,

    #[clap(long, default_value = "istio-system")]
    mesh_namespace: String,

    #[clap(long, default_value = "istiod")]
    mesh_deployment: String,

    #[clap(long, default_value = "kyverno")]
    policy_engine_namespace: String,

    #[clap(long, default_value = "kyverno")]
    policy_engine_deployment: String,
}

impl Args {
    #[inline]
    pub async fn parse_and_run() -> Result<()> {
        Self::parse().run().await
    }

    pub async fn run(self) -> Result<()> {
        let Self {
            log_level,
            log_format,
            client,
            admin,
            cache_ttl_secs,
            fetch_timeout_secs,
            prometheus_url,
            mesh_namespace,
            mesh_deployment,
            policy_engine_namespace,
            policy_engine_deployment,
        } = self;

        let runtime = kubert::Runtime::builder()
            .with_log(log_level, log_format)
            .with_admin(admin)
            .with_client(client)
            .build()
            .await?;

        let config = ClusterConfig {
            mesh_namespace,
            mesh_deployment,
            policy_engine_namespace,
            policy_engine_deployment,
            fetch_timeout: Duration::from_secs(fetch_timeout_secs),
            ..ClusterConfig::default()
        };

        let index = Index::new(
            runtime.client(),
            config,
            Duration::from_secs(cache_ttl_secs),
            prometheus_url,
        );

        // Keep the watcher alive for the lifetime of the process; its
        // subscription feeds the notification layer.
        let watcher = index.policy_watcher().await;
        let changes = watcher.subscribe();
        tokio::spawn(log_policy_changes(changes));

        // Block on the shutdown signal.
        if runtime.run().await.is_err() {
            bail!("aborted");
        }

        Ok(())
    }
}

#[instrument(skip_all)]
async fn log_policy_changes(
    mut changes: tokio::sync::broadcast::Receiver<topology_controller_k8s_index::PolicyChange>,
) {
    use tokio::sync::broadcast::error::RecvError;

    loop {
        match changes.recv().await {
            Ok(change) => info!(
                event = ?change.event,
                engine = %change.engine,
                name = %change.name,
                namespace = %change.namespace,
                "policy changed"
            ),
            Err(RecvError::Lagged(missed)) => {
                info!(missed, "policy change stream lagged");
            }
            Err(RecvError::Closed) => return,
        }
    }
}
