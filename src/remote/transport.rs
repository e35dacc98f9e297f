//! Transport seam for the remote service.

use std::time::Duration;

use serde_json::Value;
use url::Url;

use crate::error::{Error, Result};

/// Posts one JSON body and returns the parsed JSON response.
///
/// Implementations are stateless request/response plumbing: they know
/// nothing about queuing, connectivity state or retries.
#[allow(async_fn_in_trait)]
pub trait Transport: Send + Sync {
  async fn send(&self, body: &Value) -> Result<Value>;
}

/// HTTP transport backed by reqwest.
pub struct HttpTransport {
  http: reqwest::Client,
  url: Url,
}

impl HttpTransport {
  pub fn new(url: &str, timeout: Duration) -> Result<Self> {
    let url = Url::parse(url)
      .map_err(|e| Error::InvalidInput(format!("invalid remote url {url}: {e}")))?;

    let http = reqwest::Client::builder()
      .timeout(timeout)
      .build()
      .map_err(|e| Error::Remote(format!("http client init failed: {e}")))?;

    Ok(Self { http, url })
  }
}

impl Transport for HttpTransport {
  async fn send(&self, body: &Value) -> Result<Value> {
    let response = self
      .http
      .post(self.url.clone())
      .json(body)
      .send()
      .await
      .map_err(|e| Error::Remote(format!("request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
      return Err(Error::Remote(format!("HTTP {status}")));
    }

    let text = response
      .text()
      .await
      .map_err(|e| Error::Remote(format!("reading response failed: {e}")))?;

    serde_json::from_str(&text).map_err(|_| Error::Protocol("response is not JSON".into()))
  }
}
