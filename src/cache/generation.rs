//! Naming of cache generations.

use std::fmt;

use url::Url;

/// Version assumed when the worker script URL does not carry one.
pub const DEFAULT_VERSION: &str = "1.0.0";

/// Query parameter on the worker script URL that carries the app version.
pub const VERSION_PARAM: &str = "v";

/// Read the app version from the worker's registration URL.
///
/// Falls back to [`DEFAULT_VERSION`] when the URL does not parse or the `v`
/// parameter is missing or blank. Never fails.
pub fn resolve_version(script_url: &str) -> String {
  Url::parse(script_url)
    .ok()
    .and_then(|url| {
      url
        .query_pairs()
        .find(|(key, _)| key == VERSION_PARAM)
        .map(|(_, value)| value.trim().to_string())
    })
    .filter(|version| !version.is_empty())
    .unwrap_or_else(|| DEFAULT_VERSION.to_string())
}

/// One versioned cache container: `prefix + version`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generation {
  prefix: String,
  version: String,
}

impl Generation {
  pub fn new(prefix: impl Into<String>, version: impl Into<String>) -> Self {
    Self {
      prefix: prefix.into(),
      version: version.into(),
    }
  }

  /// The generation selected by the worker script URL.
  pub fn current(prefix: &str, script_url: &str) -> Self {
    Self::new(prefix, resolve_version(script_url))
  }

  pub fn prefix(&self) -> &str {
    &self.prefix
  }

  pub fn version(&self) -> &str {
    &self.version
  }

  pub fn name(&self) -> String {
    format!("{}{}", self.prefix, self.version)
  }
}

impl fmt::Display for Generation {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}{}", self.prefix, self.version)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_version_from_query() {
    assert_eq!(resolve_version("https://ledger.example/sw.js?v=2.0.1"), "2.0.1");
  }

  #[test]
  fn test_version_among_other_params() {
    assert_eq!(
      resolve_version("https://ledger.example/sw.js?debug=1&v=3.1.0&x=y"),
      "3.1.0"
    );
  }

  #[test]
  fn test_version_percent_decoded() {
    assert_eq!(
      resolve_version("https://ledger.example/sw.js?v=1.0.0%2Bbuild7"),
      "1.0.0+build7"
    );
  }

  #[test]
  fn test_missing_version_defaults() {
    assert_eq!(resolve_version("https://ledger.example/sw.js"), DEFAULT_VERSION);
    assert_eq!(resolve_version("https://ledger.example/sw.js?x=1"), DEFAULT_VERSION);
  }

  #[test]
  fn test_blank_version_defaults() {
    assert_eq!(resolve_version("https://ledger.example/sw.js?v="), DEFAULT_VERSION);
    assert_eq!(resolve_version("https://ledger.example/sw.js?v=%20"), DEFAULT_VERSION);
  }

  #[test]
  fn test_unparseable_url_defaults() {
    assert_eq!(resolve_version("sw.js?v=9.9.9"), DEFAULT_VERSION);
    assert_eq!(resolve_version(""), DEFAULT_VERSION);
  }

  #[test]
  fn test_generation_name() {
    let generation = Generation::current("ledger-cache-v", "https://ledger.example/sw.js?v=2.0.1");
    assert_eq!(generation.name(), "ledger-cache-v2.0.1");
    assert_eq!(generation.to_string(), generation.name());
    assert_eq!(generation.version(), "2.0.1");
  }
}
