// ============================================================================
// Service Client
// ============================================================================
//
// HTTP client for forwarding requests to downstream services.
// Handles:
// - Request forwarding
// - Response proxying
// - Error handling
//
// ============================================================================

use std::time::Duration;

use anyhow::Result;
use axum::body::Body;
use axum::http::{Request, Response};
use tracing::warn;

/// HTTP client for forwarding requests to downstream services
#[derive(Clone)]
pub struct ServiceClient {
    client: reqwest::Client,
}

impl ServiceClient {
    pub fn new(timeout_secs: u64) -> Self {
        // Connection pooling and keep-alive for the hot forwarding path.
        // Client construction only fails on broken TLS backends, which is a
        // startup-time condition.
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .tcp_keepalive(Duration::from_secs(30))
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .unwrap_or_default();

        Self { client }
    }

    /// Forward an HTTP request to a downstream service, preserving method,
    /// path, query, headers and body.
    pub async fn forward_request(
        &self,
        service_url: &str,
        request: Request<Body>,
    ) -> Result<Response<Body>> {
        let path = request.uri().path();
        let query = request.uri().query();
        let target_url = if let Some(query) = query {
            format!("{}{}?{}", service_url, path, query)
        } else {
            format!("{}{}", service_url, path)
        };

        let method = request.method().clone();
        let headers = request.headers().clone();

        let (_parts, body) = request.into_parts();
        let body_bytes = axum::body::to_bytes(body, usize::MAX).await?;

        let mut reqwest_request = self.client.request(method, &target_url);

        // Host must reflect the target, reqwest sets it
        for (key, value) in headers.iter() {
            if key != "host" {
                reqwest_request = reqwest_request.header(key, value);
            }
        }

        if !body_bytes.is_empty() {
            reqwest_request = reqwest_request.body(body_bytes.to_vec());
        }

        let response = reqwest_request.send().await?;

        let mut axum_response = Response::builder().status(response.status());
        for (key, value) in response.headers().iter() {
            axum_response = axum_response.header(key, value);
        }

        let body_bytes = response.bytes().await?;

        Ok(axum_response
            .body(Body::from(body_bytes.to_vec()))
            .map_err(|e| anyhow::anyhow!("Failed to build response: {}", e))?)
    }

    /// Check if a service is healthy
    pub async fn check_health(&self, service_url: &str) -> bool {
        let health_url = format!("{}/health", service_url);
        match self
            .client
            .get(&health_url)
            .timeout(Duration::from_secs(5))
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                warn!(service_url = %service_url, error = %e, "Service health check failed");
                false
            }
        }
    }
}
