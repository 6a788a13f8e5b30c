//! Best-effort request-rate signal from a Prometheus-compatible endpoint.
//!
//! Failures here never propagate: a missing or unreachable metrics endpoint
//! simply leaves services without a traffic signal.

use ahash::AHashMap;
use serde::Deserialize;
use std::time::Duration;
use topology_controller_core::service_key;
use tracing::{debug, instrument};

#[derive(Clone, Debug)]
pub struct Traffic {
    base_url: String,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    status: String,
    #[serde(default)]
    data: QueryData,
}

#[derive(Debug, Default, Deserialize)]
struct QueryData {
    #[serde(default)]
    result: Vec<Sample>,
}

#[derive(Debug, Deserialize)]
struct Sample {
    #[serde(default)]
    metric: std::collections::HashMap<String, String>,
    /// `[timestamp, value]`, the value encoded as a string.
    value: (f64, String),
}

// === impl Traffic ===

impl Traffic {
    pub fn new(base_url: String, timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { base_url, http })
    }

    /// Rolling per-service request rates over the last 24h, keyed by
    /// `namespace/name`.
    #[instrument(skip(self))]
    pub async fn request_rates(&self, namespace: &str) -> anyhow::Result<AHashMap<String, f64>> {
        let query = if namespace.is_empty() {
            "sum(rate(istio_requests_total[24h])) by (destination_service_name, destination_service_namespace)".to_string()
        } else {
            format!(
                "sum(rate(istio_requests_total{{destination_service_namespace=\"{namespace}\"}}[24h])) by (destination_service_name, destination_service_namespace)"
            )
        };

        let response: QueryResponse = self
            .http
            .get(format!("{}/api/v1/query", self.base_url))
            .query(&[("query", query.as_str())])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if response.status != "success" {
            anyhow::bail!("metrics query returned status {}", response.status);
        }

        let mut rates = AHashMap::default();
        for sample in response.data.result {
            let (Some(name), Some(ns)) = (
                sample.metric.get("destination_service_name"),
                sample.metric.get("destination_service_namespace"),
            ) else {
                continue;
            };
            if name.is_empty() || ns.is_empty() {
                continue;
            }
            let rps = sample.value.1.parse::<f64>().unwrap_or(0.0);
            rates.insert(service_key(ns, name), rps);
        }

        debug!(services = rates.len(), "fetched request rates");
        Ok(rates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_query_response() {
        let body = r#"{
            "status": "success",
            "data": {
                "resultType": "vector",
                "result": [
                    {
                        "metric": {
                            "destination_service_name": "web",
                            "destination_service_namespace": "ns1"
                        },
                        "value": [1714000000.0, "0.0004"]
                    },
                    {
                        "metric": {
                            "destination_service_name": "",
                            "destination_service_namespace": "ns1"
                        },
                        "value": [1714000000.0, "3.2"]
                    }
                ]
            }
        }"#;

        let response: QueryResponse = serde_json::from_str(body).expect("valid body");
        assert_eq!(response.status, "success");
        assert_eq!(response.data.result.len(), 2);
        assert_eq!(response.data.result[0].value.1, "0.0004");
    }
}
