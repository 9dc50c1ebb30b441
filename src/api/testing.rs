//! Scripted transport for tests.

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;

use crate::sync::FetchError;

use super::client::Transport;

type Handler =
  dyn Fn(&str, &[(&'static str, String)]) -> Result<Value, FetchError> + Send + Sync;

/// Transport answering from a closure, recording every request.
#[derive(Clone)]
pub struct ScriptedTransport {
  handler: Arc<Handler>,
  requests: Arc<Mutex<Vec<String>>>,
  delay: Duration,
}

impl ScriptedTransport {
  pub fn new<H>(handler: H) -> Self
  where
    H: Fn(&str, &[(&'static str, String)]) -> Result<Value, FetchError> + Send + Sync + 'static,
  {
    Self {
      handler: Arc::new(handler),
      requests: Arc::new(Mutex::new(Vec::new())),
      delay: Duration::ZERO,
    }
  }

  /// Simulate network latency on every request.
  pub fn with_delay(mut self, delay: Duration) -> Self {
    self.delay = delay;
    self
  }

  /// Number of requests that reached the transport.
  pub fn request_count(&self) -> usize {
    self.requests.lock().unwrap().len()
  }

  /// Requests seen so far as `path?name=value&...`.
  pub fn requests(&self) -> Vec<String> {
    self.requests.lock().unwrap().clone()
  }

  fn respond(
    &self,
    path: &str,
    query: Vec<(&'static str, String)>,
  ) -> impl Future<Output = Result<Value, FetchError>> + Send {
    let rendered = query
      .iter()
      .map(|(name, value)| format!("{}={}", name, value))
      .collect::<Vec<_>>()
      .join("&");
    self.requests.lock().unwrap().push(format!("{}?{}", path, rendered));

    let result = (self.handler)(path, &query);
    let delay = self.delay;
    async move {
      if !delay.is_zero() {
        tokio::time::sleep(delay).await;
      }
      result
    }
  }
}

impl Transport for ScriptedTransport {
  fn get(
    &self,
    path: &str,
    query: Vec<(&'static str, String)>,
  ) -> impl Future<Output = Result<Value, FetchError>> + Send {
    self.respond(path, query)
  }

  fn post(&self, path: &str, _body: Value) -> impl Future<Output = Result<Value, FetchError>> + Send {
    self.respond(path, Vec::new())
  }
}
