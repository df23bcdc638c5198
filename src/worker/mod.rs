//! The offline cache worker and its lifecycle.
//!
//! A worker is built around one [`WorkerContext`] and moves through
//! `Parsed → Installing → Installed → Activating → Activated`. Install
//! precaches the manifest and skips waiting; activate purges stale
//! generations and claims clients, after which every fetch is intercepted.

mod context;
mod lifetime;
mod precache;
mod router;
mod strategy;

use std::fmt;
use std::sync::{Mutex, PoisonError};

use tracing::{debug, info};

use crate::cache::{CacheStorage, Served};
use crate::error::{FetchError, LifecycleError};
use crate::net::{FetchMode, Network, Request};

pub use context::{WorkerContext, WorkerSettings};
pub use precache::PrecacheReport;
pub use router::{route, Route};

use lifetime::Lifetimes;

#[cfg(test)]
pub(crate) use context::tests as test_support;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
  Parsed,
  Installing,
  Installed,
  Activating,
  Activated,
  Redundant,
}

impl fmt::Display for WorkerState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      Self::Parsed => "parsed",
      Self::Installing => "installing",
      Self::Installed => "installed",
      Self::Activating => "activating",
      Self::Activated => "activated",
      Self::Redundant => "redundant",
    };
    f.write_str(name)
  }
}

/// Result of bringing a worker up with [`Worker::start`].
#[derive(Debug, Default)]
pub struct Startup {
  /// Present when an install ran
  pub precache: Option<PrecacheReport>,
  pub purged: Vec<String>,
}

pub struct Worker<S: CacheStorage, N: Network> {
  ctx: WorkerContext<S, N>,
  state: Mutex<WorkerState>,
  lifetimes: Lifetimes,
}

impl<S: CacheStorage, N: Network> Worker<S, N> {
  pub fn new(ctx: WorkerContext<S, N>) -> Self {
    Self {
      ctx,
      state: Mutex::new(WorkerState::Parsed),
      lifetimes: Lifetimes::new(),
    }
  }

  #[cfg(test)]
  pub fn context(&self) -> &WorkerContext<S, N> {
    &self.ctx
  }

  pub fn lifetimes(&self) -> &Lifetimes {
    &self.lifetimes
  }

  pub fn state(&self) -> WorkerState {
    *self.state.lock().unwrap_or_else(PoisonError::into_inner)
  }

  fn set_state(&self, state: WorkerState) {
    *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    debug!(generation = %self.ctx.generation, %state, "worker state changed");
  }

  /// Move `from → to` atomically, or report the state we were actually in.
  fn transition(
    &self,
    action: &'static str,
    from: WorkerState,
    to: WorkerState,
  ) -> Result<(), LifecycleError> {
    let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
    if *state != from {
      return Err(LifecycleError::InvalidState {
        action,
        state: *state,
      });
    }
    *state = to;
    Ok(())
  }

  /// `install` event: open the current generation and precache the manifest.
  ///
  /// Individual precache failures do not fail the install. The worker is
  /// ready to activate as soon as this returns (skip-waiting).
  pub async fn install(&self) -> Result<PrecacheReport, LifecycleError> {
    self.transition("install", WorkerState::Parsed, WorkerState::Installing)?;
    info!(
      generation = %self.ctx.generation,
      version = self.ctx.generation.version(),
      "installing"
    );

    let handle = match self.ctx.open_current() {
      Ok(handle) => handle,
      Err(e) => {
        self.set_state(WorkerState::Redundant);
        return Err(LifecycleError::storage(e));
      }
    };

    let report = precache::precache_all(&handle, &self.ctx.network, &self.ctx.manifest).await;

    // Only a generation carrying the mark is resumed by a later run
    if let Err(e) = self.ctx.store.mark_installed(handle.name()) {
      self.set_state(WorkerState::Redundant);
      return Err(LifecycleError::storage(e));
    }

    self.set_state(WorkerState::Installed);
    info!(generation = %self.ctx.generation, "installed, skipping wait");
    Ok(report)
  }

  /// `activate` event: purge stale generations and claim clients.
  ///
  /// Returns the names of the deleted generations.
  pub async fn activate(&self) -> Result<Vec<String>, LifecycleError> {
    self.transition("activate", WorkerState::Installed, WorkerState::Activating)?;
    self.finish_activation()
  }

  fn finish_activation(&self) -> Result<Vec<String>, LifecycleError> {
    let current = self.ctx.generation.name();
    let purged = match self.ctx.store.purge_stale(self.ctx.generation.prefix(), &current) {
      Ok(purged) => purged,
      Err(e) => {
        self.set_state(WorkerState::Redundant);
        return Err(LifecycleError::storage(e));
      }
    };

    self.set_state(WorkerState::Activated);
    info!(generation = %current, purged = purged.len(), "activated, clients claimed");
    Ok(purged)
  }

  /// Bring the worker up. A generation whose install completed in an earlier
  /// run skips precaching but is still activated; a missing or partially
  /// precached one goes through install and activate.
  pub async fn start(&self) -> Result<Startup, LifecycleError> {
    let current = self.ctx.generation.name();
    let installed = self
      .ctx
      .store
      .is_installed(&current)
      .map_err(LifecycleError::storage)?;

    if installed {
      self.transition("resume", WorkerState::Parsed, WorkerState::Activating)?;
      info!(generation = %current, "resuming installed generation");
      let purged = self.finish_activation()?;
      return Ok(Startup {
        precache: None,
        purged,
      });
    }

    let precache = self.install().await?;
    let purged = self.activate().await?;
    Ok(Startup {
      precache: Some(precache),
      purged,
    })
  }

  /// `fetch` event. Until the worker is activated nothing is intercepted.
  pub async fn handle_fetch(&self, request: &Request) -> Result<Served, FetchError> {
    if self.state() != WorkerState::Activated {
      return self.passthrough(request).await;
    }

    match route(&self.ctx.scope, request) {
      Route::Passthrough => self.passthrough(request).await,
      Route::Handle(strategy) => strategy.execute(&self.ctx, request).await,
    }
  }

  async fn passthrough(&self, request: &Request) -> Result<Served, FetchError> {
    debug!(url = %request.url, "not intercepted");
    let response = self.ctx.network.fetch(request, FetchMode::Default).await?;
    Ok(Served::passthrough(response))
  }
}
