//! Prometheus-backed health source.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::warn;

use crate::error::{FloodgateError, Result};

use super::{HealthSample, HealthSource};

/// Five-minute average CPU utilization across all cores, as a 0-1 ratio.
const CPU_QUERY: &str = r#"1 - avg(rate(node_cpu_seconds_total{mode="idle"}[5m]))"#;

/// P95 latency of HTTP requests, in seconds.
const P95_LATENCY_QUERY: &str =
    r#"histogram_quantile(0.95, rate(http_request_duration_seconds_bucket[5m]))"#;

/// 5xx error rate as a fraction of all requests.
const ERROR_RATE_QUERY: &str = r#"sum(rate(http_requests_total{status_code=~"5.."}[5m])) / sum(rate(http_requests_total[5m]))"#;

/// Fetches health metrics from the Prometheus HTTP API with instant queries.
pub struct PrometheusSource {
    client: reqwest::Client,
    query_url: String,
}

impl PrometheusSource {
    /// Connect to a Prometheus server at `base_url`
    /// (e.g. `http://prometheus:9090`).
    pub fn new(base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(3))
            .build()
            .map_err(|e| FloodgateError::Health(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            query_url: format!("{}/api/v1/query", base_url.trim_end_matches('/')),
        })
    }

    async fn query(&self, promql: &str) -> Result<f64> {
        let response: Value = self
            .client
            .get(&self.query_url)
            .query(&[("query", promql)])
            .send()
            .await
            .map_err(|e| FloodgateError::Health(format!("prometheus query failed: {e}")))?
            .json()
            .await
            .map_err(|e| FloodgateError::Health(format!("prometheus reply unreadable: {e}")))?;

        // An empty instant vector means no data; report zero and let the
        // factor computation treat the metric as unstressed.
        match instant_vector_value(&response) {
            Some(value) => Ok(value),
            None => {
                warn!(query = promql, "Prometheus returned no samples");
                Ok(0.0)
            }
        }
    }
}

/// Pull the scalar out of an instant-vector query response:
/// `data.result[0].value[1]`, which Prometheus encodes as a string.
fn instant_vector_value(response: &Value) -> Option<f64> {
    response
        .get("data")?
        .get("result")?
        .get(0)?
        .get("value")?
        .get(1)?
        .as_str()?
        .parse()
        .ok()
}

#[async_trait]
impl HealthSource for PrometheusSource {
    async fn fetch(&self) -> Result<HealthSample> {
        let cpu = self.query(CPU_QUERY).await?;
        let latency_secs = self.query(P95_LATENCY_QUERY).await?;
        let error_rate = self.query(ERROR_RATE_QUERY).await?;

        Ok(HealthSample {
            cpu_utilization: cpu,
            p95_latency_ms: latency_secs * 1000.0,
            error_rate,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_instant_vector() {
        let response = json!({
            "status": "success",
            "data": {
                "resultType": "vector",
                "result": [
                    {"metric": {}, "value": [1700000000.0, "0.42"]}
                ]
            }
        });
        assert_eq!(instant_vector_value(&response), Some(0.42));
    }

    #[test]
    fn test_empty_vector_yields_none() {
        let response = json!({
            "status": "success",
            "data": {"resultType": "vector", "result": []}
        });
        assert_eq!(instant_vector_value(&response), None);
    }

    #[test]
    fn test_malformed_reply_yields_none() {
        assert_eq!(instant_vector_value(&json!({"status": "error"})), None);
        assert_eq!(
            instant_vector_value(&json!({
                "data": {"result": [{"value": [1700000000.0, "not-a-number"]}]}
            })),
            None
        );
    }

    #[test]
    fn test_query_url_normalization() {
        let source = PrometheusSource::new("http://prometheus:9090/").unwrap();
        assert_eq!(source.query_url, "http://prometheus:9090/api/v1/query");
    }
}
