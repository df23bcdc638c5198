//! Responses tagged with where they came from.

use crate::net::Response;

/// Indicates where a served response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
  /// Fresh data from network
  Network,
  /// Entry of the current generation
  Cache,
  /// Cached shell document served in place of an uncached navigation
  Shell,
  /// The worker did not intervene; plain network fetch
  Passthrough,
}

impl ResponseSource {
  pub fn label(&self) -> &'static str {
    match self {
      Self::Network => "network",
      Self::Cache => "cache",
      Self::Shell => "shell",
      Self::Passthrough => "passthrough",
    }
  }
}

/// Result of a handled fetch, including the response and its source.
#[derive(Debug, Clone)]
pub struct Served {
  pub response: Response,
  pub source: ResponseSource,
}

impl Served {
  pub fn from_network(response: Response) -> Self {
    Self {
      response,
      source: ResponseSource::Network,
    }
  }

  pub fn from_cache(response: Response) -> Self {
    Self {
      response,
      source: ResponseSource::Cache,
    }
  }

  pub fn shell(response: Response) -> Self {
    Self {
      response,
      source: ResponseSource::Shell,
    }
  }

  pub fn passthrough(response: Response) -> Self {
    Self {
      response,
      source: ResponseSource::Passthrough,
    }
  }
}
