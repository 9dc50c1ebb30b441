//! HTTP transport for the wallet service.

use std::future::Future;
use std::time::Duration;

use color_eyre::{eyre::eyre, Result};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::config::ApiConfig;
use crate::sync::FetchError;

/// Raw JSON exchange with the wallet service.
///
/// The coordinator only ever sees futures produced by a transport, so tests
/// can swap the HTTP implementation for a scripted one.
pub trait Transport: Clone + Send + Sync + 'static {
  /// GET `path` with query parameters, returning the decoded JSON body.
  fn get(
    &self,
    path: &str,
    query: Vec<(&'static str, String)>,
  ) -> impl Future<Output = Result<Value, FetchError>> + Send;

  /// POST a JSON body to `path`, returning the decoded JSON body.
  fn post(&self, path: &str, body: Value)
    -> impl Future<Output = Result<Value, FetchError>> + Send;
}

/// Transport over HTTPS using reqwest.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct HttpTransport {
  client: Client,
  base_url: Url,
  token: Option<String>,
  timeout: Duration,
}

impl HttpTransport {
  pub fn new(config: &ApiConfig, token: Option<String>) -> Result<Self> {
    // Url::join drops the last segment unless the base ends with '/'
    let mut base = config.url.trim().to_string();
    if !base.ends_with('/') {
      base.push('/');
    }
    let base_url =
      Url::parse(&base).map_err(|e| eyre!("Invalid API url {}: {}", config.url, e))?;

    let timeout = Duration::from_secs(config.timeout_secs);
    let client = Client::builder()
      .timeout(timeout)
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self {
      client,
      base_url,
      token,
      timeout,
    })
  }

  fn url(&self, path: &str) -> Result<Url, FetchError> {
    self
      .base_url
      .join(path.trim_start_matches('/'))
      .map_err(|e| FetchError::InvalidRequest(format!("bad path {}: {}", path, e)))
  }

  fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
    match &self.token {
      Some(token) => request.bearer_auth(token),
      None => request,
    }
  }

  async fn send(&self, request: RequestBuilder) -> Result<Value, FetchError> {
    let response = self
      .authorize(request)
      .header(reqwest::header::ACCEPT, "application/json")
      .send()
      .await
      .map_err(|e| self.transport_error(e))?;

    let status = response.status();
    if !status.is_success() {
      let body = response.text().await.unwrap_or_default();
      return Err(FetchError::from_status(status.as_u16(), &body));
    }

    response
      .json::<Value>()
      .await
      .map_err(|e| FetchError::Decode(e.to_string()))
  }

  fn transport_error(&self, err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
      FetchError::Timeout(self.timeout)
    } else {
      FetchError::NetworkFailure(err.to_string())
    }
  }
}

impl Transport for HttpTransport {
  fn get(
    &self,
    path: &str,
    query: Vec<(&'static str, String)>,
  ) -> impl Future<Output = Result<Value, FetchError>> + Send {
    let url = self.url(path);
    async move {
      let url = url?;
      debug!(url = %url, "GET");
      self.send(self.client.get(url).query(&query)).await
    }
  }

  fn post(&self, path: &str, body: Value) -> impl Future<Output = Result<Value, FetchError>> + Send {
    let url = self.url(path);
    async move {
      let url = url?;
      debug!(url = %url, "POST");
      self.send(self.client.post(url).json(&body)).await
    }
  }
}

/// Decode a JSON body into a typed response.
pub fn decode<T: DeserializeOwned>(value: Value) -> Result<T, FetchError> {
  serde_json::from_value(value).map_err(|e| FetchError::Decode(e.to_string()))
}
