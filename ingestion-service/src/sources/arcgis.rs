use std::time::{Duration, SystemTime};

use reqwest::header::ACCEPT;
use serde_json::Value;

use crate::{
    config::UpstreamConfig,
    pipeline::{Envelope, PipelineError, Source},
    sources::RawAttributes,
};

const USER_AGENT: &str = "IGP-Sismos/1.0";
const ACCEPT_VALUE: &str = "application/json,text/plain,*/*";

/// Last ten events, newest first, attributes only.
const QUERY_PARAMS: [(&str, &str); 6] = [
    ("where", "1=1"),
    ("outFields", "*"),
    ("orderByFields", "fechaevento DESC"),
    ("resultRecordCount", "10"),
    ("returnGeometry", "false"),
    ("f", "json"),
];

/// Fetches recent events from the ArcGIS `SismosReportados` query endpoint.
///
/// Only transport failures (connect, timeout, dropped connection) are retried,
/// with a fixed pause between attempts. Error statuses and error payloads fail
/// immediately.
pub struct ArcGisSource {
    http: reqwest::Client,
    url: String,
    max_attempts: u32,
    retry_pause: Duration,
}

impl ArcGisSource {
    pub fn new(
        url: impl Into<String>,
        timeout: Duration,
        max_attempts: u32,
        retry_pause: Duration,
    ) -> Result<Self, PipelineError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| PipelineError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            url: url.into(),
            max_attempts: max_attempts.max(1),
            retry_pause,
        })
    }

    pub fn from_config(cfg: &UpstreamConfig) -> Result<Self, PipelineError> {
        Self::new(
            cfg.url.clone(),
            Duration::from_millis(cfg.timeout_ms),
            cfg.max_attempts,
            Duration::from_millis(cfg.retry_pause_ms),
        )
    }

    async fn send_with_retry(&self) -> Result<reqwest::Response, PipelineError> {
        let mut attempt: u32 = 1;
        loop {
            metrics::counter!("upstream_fetch_requests_total").increment(1);
            let res = self
                .http
                .get(&self.url)
                .query(&QUERY_PARAMS)
                .header(ACCEPT, ACCEPT_VALUE)
                .send()
                .await;

            match res {
                Ok(resp) => return Ok(resp),
                Err(e) if attempt < self.max_attempts => {
                    tracing::warn!(
                        error = %e,
                        attempt,
                        "upstream request failed, retrying after pause"
                    );
                    metrics::counter!("upstream_fetch_retry_total").increment(1);
                    tokio::time::sleep(self.retry_pause).await;
                    attempt += 1;
                }
                Err(e) => {
                    tracing::error!(error = %e, attempt, "upstream request failed, giving up");
                    metrics::counter!("upstream_fetch_errors_total").increment(1);
                    return Err(PipelineError::Upstream(format!(
                        "request failed after {attempt} attempt(s): {e}"
                    )));
                }
            }
        }
    }
}

#[async_trait::async_trait]
impl Source<RawAttributes> for ArcGisSource {
    async fn fetch(&self) -> Result<Vec<Envelope<RawAttributes>>, PipelineError> {
        tracing::info!(url = %self.url, "querying ArcGIS");
        let resp = self.send_with_retry().await?;

        let status = resp.status();
        if !status.is_success() {
            metrics::counter!("upstream_fetch_errors_total").increment(1);
            return Err(PipelineError::Upstream(format!("upstream returned status {status}")));
        }

        let body: Value = resp
            .json()
            .await
            .map_err(|e| PipelineError::Upstream(format!("invalid upstream body: {e}")))?;

        let received_at = SystemTime::now();
        let attrs = parse_query_response(body)?;
        tracing::info!(features = attrs.len(), "ArcGIS query returned features");

        Ok(attrs
            .into_iter()
            .map(|payload| Envelope { payload, received_at })
            .collect())
    }
}

/// Extract per-feature attributes from a decoded query response.
///
/// A feature whose `attributes` is missing or not an object yields an empty
/// mapping; the normalizer rejects it later.
pub fn parse_query_response(body: Value) -> Result<Vec<RawAttributes>, PipelineError> {
    if let Some(err) = body.get("error") {
        return Err(PipelineError::Upstream(format!("ArcGIS error: {err}")));
    }

    let features = body
        .get("features")
        .and_then(Value::as_array)
        .filter(|features| !features.is_empty())
        .ok_or_else(|| PipelineError::Upstream("ArcGIS returned no features".to_string()))?;

    Ok(features
        .iter()
        .map(|feature| match feature.get("attributes") {
            Some(Value::Object(attrs)) => attrs.clone(),
            _ => RawAttributes::new(),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, Router};
    use serde_json::json;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    /// Local upstream that answers every request with `status` and counts hits.
    async fn upstream_answering(status: StatusCode) -> (String, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let app = Router::new().fallback(move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                status
            }
        });

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        (format!("http://{addr}/query"), hits)
    }

    fn source(url: &str, max_attempts: u32) -> ArcGisSource {
        ArcGisSource::new(url, Duration::from_secs(2), max_attempts, Duration::from_millis(10)).unwrap()
    }

    #[test]
    fn returns_attributes_in_feature_order() {
        let body = json!({
            "features": [
                { "attributes": { "code": "A", "magnitud": 4.1 } },
                { "attributes": { "code": "B", "magnitud": 3.9 } },
            ]
        });

        let attrs = parse_query_response(body).unwrap();
        assert_eq!(attrs.len(), 2);
        assert_eq!(attrs[0]["code"], "A");
        assert_eq!(attrs[1]["code"], "B");
    }

    #[test]
    fn error_field_fails_even_when_features_are_present() {
        let body = json!({
            "error": { "code": 500, "message": "Unable to complete operation." },
            "features": [ { "attributes": { "code": "A" } } ]
        });

        let err = parse_query_response(body).unwrap_err();
        match err {
            PipelineError::Upstream(msg) => assert!(msg.contains("Unable to complete operation.")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_or_empty_features_is_an_upstream_error() {
        assert!(matches!(
            parse_query_response(json!({ "fields": [] })),
            Err(PipelineError::Upstream(_))
        ));
        assert!(matches!(
            parse_query_response(json!({ "features": [] })),
            Err(PipelineError::Upstream(_))
        ));
        assert!(matches!(
            parse_query_response(json!([1, 2, 3])),
            Err(PipelineError::Upstream(_))
        ));
    }

    #[test]
    fn null_attributes_become_an_empty_mapping() {
        let body = json!({ "features": [ { "attributes": null }, { "geometry": {} } ] });

        let attrs = parse_query_response(body).unwrap();
        assert_eq!(attrs.len(), 2);
        assert!(attrs.iter().all(|a| a.is_empty()));
    }

    #[test]
    fn builds_with_bounded_timeout_and_at_least_one_attempt() {
        let source = ArcGisSource::new(
            "http://127.0.0.1:9/query",
            Duration::from_secs(1),
            0,
            Duration::from_millis(10),
        )
        .unwrap();
        assert_eq!(source.max_attempts, 1);
    }

    #[tokio::test]
    async fn error_status_fails_without_retrying() {
        let (url, hits) = upstream_answering(StatusCode::SERVICE_UNAVAILABLE).await;

        let err = source(&url, 3).fetch().await.unwrap_err();

        match err {
            PipelineError::Upstream(msg) => assert!(msg.contains("503"), "{msg}"),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn transport_failure_is_retried_up_to_max_attempts() {
        // Bind then drop so the port refuses connections.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = source(&format!("http://{addr}/query"), 3).fetch().await.unwrap_err();

        match err {
            PipelineError::Upstream(msg) => assert!(msg.contains("after 3 attempt(s)"), "{msg}"),
            other => panic!("unexpected error: {other}"),
        }
    }
}
