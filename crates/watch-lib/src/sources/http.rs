//! HTTP metrics source

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use url::Url;

use super::{parse_statistics, MetricQuery, MetricsSource};
use crate::error::{SourceError, WatchError};
use crate::models::Datapoint;

/// Metrics source querying `GET <endpoint>/v1/datapoints`
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: Client,
    endpoint: Url,
}

impl HttpSource {
    /// Create a new HTTP source; `timeout` bounds each request
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, WatchError> {
        let mut endpoint = Url::parse(endpoint)
            .map_err(|e| WatchError::invalid(format!("invalid source endpoint {endpoint}: {e}")))?;

        // Url::join replaces the last path segment unless the base ends in '/'
        if !endpoint.path().ends_with('/') {
            let path = format!("{}/", endpoint.path());
            endpoint.set_path(&path);
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| WatchError::invalid(format!("failed to create HTTP client: {e}")))?;

        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn datapoints_url(&self, query: &MetricQuery) -> Result<Url, SourceError> {
        let mut url = self
            .endpoint
            .join("v1/datapoints")
            .map_err(|e| SourceError::Unreachable(format!("invalid request URL: {e}")))?;

        url.query_pairs_mut()
            .append_pair("resource", &query.resource_id)
            .append_pair("metric", &query.metric_name)
            .append_pair("start", &query.start.to_rfc3339())
            .append_pair("end", &query.end.to_rfc3339())
            .append_pair("period", &query.period_seconds.to_string())
            .append_pair("statistic", &query.statistic);

        Ok(url)
    }
}

#[async_trait]
impl MetricsSource for HttpSource {
    async fn get_datapoints(&self, query: &MetricQuery) -> Result<Vec<Datapoint>, SourceError> {
        let url = self.datapoints_url(query)?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| SourceError::Unreachable(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SourceError::Unreachable(format!("HTTP {status}: {body}")));
        }

        let body = response
            .text()
            .await
            .map_err(|e| SourceError::Malformed(format!("failed to read body: {e}")))?;

        parse_statistics(&body, &query.statistic)
    }

    fn name(&self) -> &str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};

    fn query() -> MetricQuery {
        MetricQuery {
            resource_id: "db-1".to_string(),
            metric_name: "FreeStorageSpace".to_string(),
            start: DateTime::<Utc>::from_timestamp(0, 0).unwrap(),
            end: DateTime::<Utc>::from_timestamp(3600, 0).unwrap(),
            period_seconds: 300,
            statistic: "Minimum".to_string(),
        }
    }

    #[test]
    fn test_invalid_endpoint() {
        let err = HttpSource::new("not a url", Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, WatchError::InvalidArgument(_)));
    }

    #[test]
    fn test_url_keeps_base_path() {
        let source = HttpSource::new("http://metrics.local:9090/api", Duration::from_secs(1)).unwrap();
        let url = source.datapoints_url(&query()).unwrap();
        assert_eq!(url.path(), "/api/v1/datapoints");

        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("resource".to_string(), "db-1".to_string())));
        assert!(pairs.contains(&("statistic".to_string(), "Minimum".to_string())));
        assert!(pairs.contains(&("period".to_string(), "300".to_string())));
    }

    #[tokio::test]
    async fn test_fetches_datapoints() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/v1/datapoints")
            .match_query(mockito::Matcher::UrlEncoded(
                "metric".into(),
                "FreeStorageSpace".into(),
            ))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"Datapoints": [{"Timestamp": "1970-01-01T00:10:00Z", "Minimum": 2048.0}]}"#,
            )
            .create_async()
            .await;

        let source = HttpSource::new(&server.url(), Duration::from_secs(5)).unwrap();
        let points = source.get_datapoints(&query()).await.unwrap();

        mock.assert_async().await;
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].value, 2048.0);
    }

    #[tokio::test]
    async fn test_server_error_is_unreachable() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", mockito::Matcher::Any)
            .with_status(503)
            .with_body("throttled")
            .create_async()
            .await;

        let source = HttpSource::new(&server.url(), Duration::from_secs(5)).unwrap();
        let err = source.get_datapoints(&query()).await.unwrap_err();
        match err {
            SourceError::Unreachable(msg) => assert!(msg.contains("503")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_garbage_body_is_malformed() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", mockito::Matcher::Any)
            .with_status(200)
            .with_body("<html>oops</html>")
            .create_async()
            .await;

        let source = HttpSource::new(&server.url(), Duration::from_secs(5)).unwrap();
        let err = source.get_datapoints(&query()).await.unwrap_err();
        assert!(matches!(err, SourceError::Malformed(_)));
    }
}
