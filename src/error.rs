//! Typed failures surfaced by the worker.

use std::fmt::Display;

use thiserror::Error;
use url::Url;

use crate::worker::WorkerState;

/// A fetch that could not be answered.
///
/// Network failures only propagate when the selected strategy has no
/// fallback left; storage failures come from the cache database.
#[derive(Debug, Error)]
pub enum FetchError {
  #[error("network request for {url} failed: {message}")]
  Network { url: String, message: String },
  #[error("cache storage failed: {0}")]
  Storage(String),
}

impl FetchError {
  pub fn network(url: &Url, err: impl Display) -> Self {
    Self::Network {
      url: url.to_string(),
      message: err.to_string(),
    }
  }

  pub fn storage(report: color_eyre::Report) -> Self {
    Self::Storage(format!("{:#}", report))
  }

  pub fn is_network(&self) -> bool {
    matches!(self, Self::Network { .. })
  }
}

/// Failure of an `install` or `activate` event.
#[derive(Debug, Error)]
pub enum LifecycleError {
  #[error("cannot {action} a worker in state {state}")]
  InvalidState {
    action: &'static str,
    state: WorkerState,
  },
  #[error("cache storage failed: {0}")]
  Storage(String),
}

impl LifecycleError {
  pub fn storage(report: color_eyre::Report) -> Self {
    Self::Storage(format!("{:#}", report))
  }
}
