use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;

use serde_json::json;

/// Probes are operational visibility only, so they get a short fixed budget
/// instead of the (long) analysis timeout.
const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum ComputeError {
    #[error("cannot reach compute worker: {0}")]
    Unavailable(String),
    #[error("compute worker timed out after {0}s")]
    Timeout(u64),
    #[error("compute worker error: {0}")]
    Remote(String),
    #[error("staged upload unreadable: {0}")]
    Staging(#[from] std::io::Error),
}

/// The external analysis capability. The remote implementation talks to the
/// notebook worker over HTTP; the fixture implementation is how "no worker
/// configured" is expressed, so business logic never branches on configuration.
#[async_trait::async_trait]
pub trait ComputeWorker: Send + Sync {
    /// Upload the staged file and return the normalized result document.
    async fn analyze(
        &self,
        staged: &Path,
        filename: &str,
    ) -> Result<serde_json::Value, ComputeError>;

    /// Best-effort reachability probe; any failure is just `false`.
    async fn health_check(&self) -> bool;

    /// Best-effort status document; never errors.
    async fn server_info(&self) -> serde_json::Value;

    /// Configured endpoint, `None` for the fixture.
    fn endpoint(&self) -> Option<&str>;
}

fn http_client() -> &'static reqwest::Client {
    static CLIENT: OnceLock<reqwest::Client> = OnceLock::new();
    // Timeouts are per-request: analysis and probes need different budgets.
    CLIENT.get_or_init(|| {
        reqwest::Client::builder()
            .user_agent("taxaformer-server")
            .build()
            .expect("failed to build reqwest client")
    })
}

/// Unwrap the worker's `{status, data, message}` envelope.
fn normalize_envelope(body: serde_json::Value) -> Result<serde_json::Value, ComputeError> {
    if body.get("status").and_then(|s| s.as_str()) == Some("success") {
        // Some worker versions return the document bare instead of under
        // `data`; accept both.
        return Ok(body.get("data").cloned().unwrap_or(body));
    }
    let message = body
        .get("message")
        .and_then(|m| m.as_str())
        .unwrap_or("unknown error")
        .to_string();
    Err(ComputeError::Remote(message))
}

fn classify_request_error(e: reqwest::Error, timeout_secs: u64) -> ComputeError {
    if e.is_timeout() {
        ComputeError::Timeout(timeout_secs)
    } else if e.is_connect() {
        ComputeError::Unavailable(e.to_string())
    } else {
        ComputeError::Remote(format!("request failed: {e}"))
    }
}

/// Client for the remote analysis worker, typically a notebook server behind
/// an ngrok tunnel.
pub struct RemoteWorker {
    base_url: String,
    timeout: Duration,
}

impl RemoteWorker {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { base_url, timeout }
    }
}

#[async_trait::async_trait]
impl ComputeWorker for RemoteWorker {
    async fn analyze(
        &self,
        staged: &Path,
        filename: &str,
    ) -> Result<serde_json::Value, ComputeError> {
        let bytes = tokio::fs::read(staged).await?;

        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(filename.to_string())
            .mime_str("application/octet-stream")
            .map_err(|e| ComputeError::Remote(format!("build upload part: {e}")))?;
        let form = reqwest::multipart::Form::new().part("file", part);

        tracing::info!(%filename, worker = %self.base_url, "forwarding upload to compute worker");

        let resp = http_client()
            .post(format!("{}/analyze", self.base_url))
            // The worker sits behind ngrok; skip its browser interstitial.
            .header("ngrok-skip-browser-warning", "true")
            .multipart(form)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| classify_request_error(e, self.timeout.as_secs()))?;

        let status = resp.status();
        if !status.is_success() {
            let detail = resp
                .json::<serde_json::Value>()
                .await
                .ok()
                .and_then(|v| v.get("detail").and_then(|d| d.as_str()).map(str::to_string));
            let msg = match detail {
                Some(detail) => format!("worker returned {status}: {detail}"),
                None => format!("worker returned {status}"),
            };
            return Err(ComputeError::Remote(msg));
        }

        let body = resp
            .json::<serde_json::Value>()
            .await
            .map_err(|e| ComputeError::Remote(format!("invalid response body: {e}")))?;
        normalize_envelope(body)
    }

    async fn health_check(&self) -> bool {
        let resp = http_client()
            .get(format!("{}/health", self.base_url))
            .header("ngrok-skip-browser-warning", "true")
            .timeout(PROBE_TIMEOUT)
            .send()
            .await;
        matches!(resp, Ok(r) if r.status().is_success())
    }

    async fn server_info(&self) -> serde_json::Value {
        let resp = http_client()
            .get(format!("{}/", self.base_url))
            .header("ngrok-skip-browser-warning", "true")
            .timeout(PROBE_TIMEOUT)
            .send()
            .await;
        match resp {
            Ok(r) if r.status().is_success() => r
                .json::<serde_json::Value>()
                .await
                .unwrap_or_else(|e| json!({"status": "error", "message": e.to_string()})),
            Ok(r) => json!({"status": "error", "code": r.status().as_u16()}),
            Err(e) => json!({"status": "error", "message": e.to_string()}),
        }
    }

    fn endpoint(&self) -> Option<&str> {
        Some(&self.base_url)
    }
}

/// Placeholder worker used when no endpoint is configured. Returns the same
/// canned document for every upload; this is documented behavior, not an error.
pub struct FixtureWorker;

pub fn fixture_result(filename: &str) -> serde_json::Value {
    json!({
        "metadata": {
            "sampleName": filename,
            "totalSequences": 150,
            "processingTime": "2.8s",
            "avgConfidence": 89
        },
        "taxonomy_summary": [
            {"name": "Alveolata", "value": 45, "color": "#22D3EE"},
            {"name": "Chlorophyta", "value": 32, "color": "#10B981"},
            {"name": "Fungi", "value": 15, "color": "#A78BFA"},
            {"name": "Metazoa", "value": 28, "color": "#F59E0B"},
            {"name": "Rhodophyta", "value": 18, "color": "#EC4899"},
            {"name": "Unknown", "value": 12, "color": "#64748B"}
        ],
        "sequences": [
            {
                "accession": "SEQ_001",
                "taxonomy": "Alveolata; Dinoflagellata; Gymnodiniales",
                "length": 1842,
                "confidence": 0.94,
                "overlap": 87,
                "cluster": "C1"
            },
            {
                "accession": "SEQ_002",
                "taxonomy": "Chlorophyta; Chlorophyceae; Chlamydomonadales",
                "length": 1654,
                "confidence": 0.89,
                "overlap": 92,
                "cluster": "C2"
            },
            {
                "accession": "SEQ_003",
                "taxonomy": "Metazoa; Arthropoda; Copepoda",
                "length": 2103,
                "confidence": 0.96,
                "overlap": 94,
                "cluster": "C3"
            },
            {
                "accession": "SEQ_004",
                "taxonomy": "Unknown; Novel Cluster A",
                "length": 1723,
                "confidence": 0.42,
                "overlap": 34,
                "cluster": "N1"
            },
            {
                "accession": "SEQ_005",
                "taxonomy": "Rhodophyta; Florideophyceae; Ceramiales",
                "length": 1889,
                "confidence": 0.91,
                "overlap": 88,
                "cluster": "C4"
            }
        ],
        "cluster_data": [
            {"x": 12.5, "y": 8.3, "z": 45, "cluster": "Alveolata", "color": "#22D3EE"},
            {"x": -8.2, "y": 15.1, "z": 32, "cluster": "Chlorophyta", "color": "#10B981"},
            {"x": 3.4, "y": -12.7, "z": 28, "cluster": "Metazoa", "color": "#F59E0B"},
            {"x": -15.8, "y": -5.2, "z": 18, "cluster": "Rhodophyta", "color": "#EC4899"},
            {"x": 18.3, "y": 2.1, "z": 15, "cluster": "Fungi", "color": "#A78BFA"},
            {"x": -2.1, "y": -18.5, "z": 12, "cluster": "Unknown", "color": "#64748B"}
        ]
    })
}

#[async_trait::async_trait]
impl ComputeWorker for FixtureWorker {
    async fn analyze(
        &self,
        _staged: &Path,
        filename: &str,
    ) -> Result<serde_json::Value, ComputeError> {
        tracing::warn!(%filename, "no compute worker configured, returning fixture result");
        Ok(fixture_result(filename))
    }

    async fn health_check(&self) -> bool {
        false
    }

    async fn server_info(&self) -> serde_json::Value {
        json!({"status": "not_configured"})
    }

    fn endpoint(&self) -> Option<&str> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_success_unwraps_data() {
        let body = json!({"status": "success", "data": {"sequences": []}});
        assert_eq!(normalize_envelope(body).unwrap(), json!({"sequences": []}));
    }

    #[test]
    fn envelope_success_without_data_returns_body() {
        let body = json!({"status": "success", "sequences": []});
        assert_eq!(normalize_envelope(body.clone()).unwrap(), body);
    }

    #[test]
    fn envelope_error_carries_server_message() {
        let body = json!({"status": "error", "message": "model not loaded"});
        match normalize_envelope(body) {
            Err(ComputeError::Remote(msg)) => assert_eq!(msg, "model not loaded"),
            other => panic!("expected remote error, got {other:?}"),
        }
    }

    #[test]
    fn envelope_unknown_shape_is_remote_error() {
        match normalize_envelope(json!({"ok": true})) {
            Err(ComputeError::Remote(msg)) => assert_eq!(msg, "unknown error"),
            other => panic!("expected remote error, got {other:?}"),
        }
    }

    #[test]
    fn fixture_is_deterministic() {
        let a = fixture_result("sample.fasta");
        let b = fixture_result("sample.fasta");
        assert_eq!(a, b);
        assert_eq!(a["metadata"]["sampleName"], "sample.fasta");
        assert!(a["sequences"].as_array().is_some_and(|s| !s.is_empty()));
    }
}
