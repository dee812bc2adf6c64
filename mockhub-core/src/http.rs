//! HTTP client abstraction for talking to subscriber callbacks.
//!
//! The hub makes two kinds of outbound calls: the verification `GET` that carries a challenge,
//! and the signed `POST` that delivers an event. Both go through [`HubHttpClient`] so the services
//! can be exercised without a network, and so status handling (success, retryable, fatal) stays
//! in the services rather than in the transport.
//!
//! # Example Usage:
//! ``
//! use mockhub_core::http::{DefaultHttpClient, HubHttpClient};
//!
//! let client = DefaultHttpClient::new(Duration::from_secs(10), 10)?;
//! let response = client.get("http://localhost:9000/cb?hub.challenge=abc".into()).await?;
//! assert!(response.is_success());
//! ``

use std::collections::HashMap;
use std::time::Duration;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest;
use crate::Error;

/// Status and body of a callback's answer. Non-2xx statuses are not errors at this layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    /// Raw body bytes, as received. No charset decoding or BOM stripping.
    pub body: Bytes,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Outbound calls the hub makes. Transport failures (refused, timed out, too many redirects)
/// are `Err`; any HTTP answer is `Ok`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HubHttpClient: Send + Sync {
    async fn get(&self, url: String) -> Result<HttpResponse, Error>;
    async fn post(&self, url: String, body: String, headers: HashMap<String, String>) -> Result<HttpResponse, Error>;
}

#[derive(Clone)]
pub struct DefaultHttpClient {
    client: reqwest::Client,
}

impl DefaultHttpClient {
    /// `timeout` applies to each request as a whole; redirects past `max_redirects` fail the request.
    pub fn new(timeout: Duration, max_redirects: usize) -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(max_redirects))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HubHttpClient for DefaultHttpClient {
    async fn get(&self, url: String) -> Result<HttpResponse, Error> {
        let response = self.client.get(&url).send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?;
        Ok(HttpResponse { status, body })
    }

    async fn post(&self, url: String, body: String, headers: HashMap<String, String>) -> Result<HttpResponse, Error> {
        let mut request = self.client.post(&url).body(body);
        for (key, value) in headers {
            request = request.header(&key, value);
        }
        let response = request.send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?;
        Ok(HttpResponse { status, body })
    }
}
