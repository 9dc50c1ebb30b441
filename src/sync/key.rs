//! Endpoint keys shared by the throttle registry and the response cache.

use std::collections::BTreeMap;
use std::fmt;

use url::form_urlencoded::byte_serialize;

/// Normalized identifier for one logical remote operation and its parameters.
///
/// The key is a readable canonical string: `resource:param=value:...` with
/// parameters sorted by name and empty values dropped, so two call sites that
/// describe the same request always land on the same throttle and cache slot.
/// Names and values are form-encoded, so `:` and `=` inside a value cannot
/// forge another parameter. When a name repeats, the last value wins.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EndpointKey(String);

impl EndpointKey {
  /// Key for an operation without parameters.
  pub fn new(resource: &str) -> Self {
    Self(normalize_name(resource))
  }

  /// Key for an operation with parameters.
  pub fn with_params<I, K, V>(resource: &str, params: I) -> Self
  where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
  {
    let mut pairs = BTreeMap::new();
    for (name, value) in params {
      let value = value.as_ref().trim();
      if value.is_empty() {
        continue;
      }
      pairs.insert(normalize_name(name.as_ref()), value.to_string());
    }

    let mut key = normalize_name(resource);
    for (name, value) in pairs {
      key.push(':');
      key.extend(byte_serialize(name.as_bytes()));
      key.push('=');
      key.extend(byte_serialize(value.as_bytes()));
    }
    Self(key)
  }
}

impl fmt::Display for EndpointKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

/// Typed description of a remote query that knows how to build its key.
pub trait QueryKey {
  /// Canonical key used for throttling and caching.
  fn endpoint_key(&self) -> EndpointKey;
}

/// Trim and lowercase resource and parameter names.
fn normalize_name(name: &str) -> String {
  name.trim().to_lowercase()
}
