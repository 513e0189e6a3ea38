//! HTTP backend seam.
//!
//! `Transport` owns the interceptor logic; a backend only moves bytes. The
//! production backend is `reqwest`; tests script responses instead.

use std::time::Duration;

use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};

use super::types::{ApiResponse, OutboundRequest, TransportError};
use crate::config::Timeouts;

#[async_trait::async_trait]
pub trait HttpBackend: Send + Sync {
    /// Perform one request. Any received status is `Ok`; only a missing
    /// response is an error.
    async fn execute(&self, request: OutboundRequest) -> Result<ApiResponse, TransportError>;
}

pub struct ReqwestBackend {
    http: reqwest::Client,
}

impl ReqwestBackend {
    /// Build a client with the given timeouts.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Build`] if the TLS backend cannot initialize.
    pub fn new(timeouts: Timeouts) -> Result<Self, TransportError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(timeouts.request_secs))
            .connect_timeout(Duration::from_secs(timeouts.connect_secs))
            .build()
            .map_err(|e| TransportError::Build(e.to_string()))?;
        Ok(Self { http })
    }
}

#[async_trait::async_trait]
impl HttpBackend for ReqwestBackend {
    async fn execute(&self, request: OutboundRequest) -> Result<ApiResponse, TransportError> {
        let mut builder = self.http.request(request.method, &request.url).headers(request.headers);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        Ok(ApiResponse { status, body })
    }
}
