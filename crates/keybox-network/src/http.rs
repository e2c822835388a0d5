//! HTTPS transport to the fleet backend.
//!
//! Endpoints, relative to `{base_url}/{device_id}`:
//!
//! | Method | Path | Body |
//! |--------|------|------|
//! | `PUT` | `/status` | [`StatusPayload`] |
//! | `GET` | `/codes` | none, answers with [`CodesResponse`] |
//! | `POST` | `/code_log` | [`AuditPayload`] |
//! | `POST` | `/error_log` | [`ErrorLogPayload`] |
//!
//! Every request carries the API key in the `Authorization` header.
//!
//! The whole exchange, including reading the body, runs under
//! [`tokio::time::timeout`], so a stalled server cannot hold the caller past
//! the requested timeout.

use crate::error::{Result, TransportError};
use crate::payload::{
    AuditPayload, CodesResponse, ErrorLogPayload, StatusPayload, code_table_from_response,
};
use crate::transport::BackendTransport;
use keybox_core::CodeTable;
use keybox_core::constants::STATUS_OK;
use reqwest::{Client, RequestBuilder, header};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, trace};

/// Connection settings for [`HttpTransport`].
#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
    /// Base URL without trailing slash, e.g. `https://backend.example/api/v1/keybox`.
    pub base_url: String,

    /// Device id used as the first path segment.
    pub device_id: String,

    pub api_key: String,

    /// Timeout for establishing the TCP/TLS connection.
    pub connect_timeout: Duration,
}

/// [`BackendTransport`] over HTTPS using `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    device_url: String,
    api_key: String,
}

impl HttpTransport {
    /// Build the transport.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialised.
    pub fn new(config: HttpTransportConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()?;

        let device_url = format!(
            "{}/{}",
            config.base_url.trim_end_matches('/'),
            config.device_id
        );
        debug!("HTTP transport targeting {}", device_url);

        Ok(Self {
            client,
            device_url,
            api_key: config.api_key,
        })
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.device_url, endpoint)
    }

    fn authorized(&self, request: RequestBuilder, timeout: Duration) -> RequestBuilder {
        request
            .header(header::AUTHORIZATION, &self.api_key)
            .timeout(timeout)
    }

    async fn bounded<T, F>(timeout: Duration, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match tokio::time::timeout(timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::timeout(timeout)),
        }
    }

    async fn send_json<B: serde::Serialize>(
        &self,
        request: RequestBuilder,
        body: &B,
        timeout: Duration,
    ) -> Result<u16> {
        Self::bounded(timeout, async {
            let response = self.authorized(request, timeout).json(body).send().await?;
            Ok(response.status().as_u16())
        })
        .await
    }
}

impl BackendTransport for HttpTransport {
    async fn put_status(&self, status: &StatusPayload, timeout: Duration) -> Result<u16> {
        trace!(uptime = %status.uptime, "PUT status");
        self.send_json(self.client.put(self.url("status")), status, timeout)
            .await
    }

    async fn get_codes(&self, timeout: Duration) -> Result<(u16, Option<CodeTable>)> {
        Self::bounded(timeout, async {
            let response = self
                .authorized(self.client.get(self.url("codes")), timeout)
                .send()
                .await?;
            let status = response.status().as_u16();
            if status != STATUS_OK {
                return Ok((status, None));
            }

            let raw: CodesResponse = response.json().await?;
            Ok((status, Some(code_table_from_response(raw))))
        })
        .await
    }

    async fn post_audit(&self, event: &AuditPayload, timeout: Duration) -> Result<u16> {
        trace!(code_entered = %event.code_entered, "POST code_log");
        self.send_json(self.client.post(self.url("code_log")), event, timeout)
            .await
    }

    async fn post_error(&self, record: &ErrorLogPayload, timeout: Duration) -> Result<u16> {
        self.send_json(self.client.post(self.url("error_log")), record, timeout)
            .await
    }
}
