use std::sync::Arc;

use color_eyre::{eyre::eyre, Result};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::cache::{CacheStorage, Served};
use crate::error::{FetchError, LifecycleError};
use crate::net::{Network, Request};
use crate::worker::{PrecacheReport, Startup, Worker};

/// Events delivered to the worker by its host
#[derive(Debug)]
pub enum WorkerEvent {
  Install(oneshot::Sender<Result<PrecacheReport, LifecycleError>>),
  Activate(oneshot::Sender<Result<Vec<String>, LifecycleError>>),
  /// Resume an installed generation, or install and activate
  Start(oneshot::Sender<Result<Startup, LifecycleError>>),
  Fetch(Request, oneshot::Sender<Result<Served, FetchError>>),
}

/// Host side of a running worker.
///
/// Events are sent over a channel; the worker loop runs each one as an
/// independent task that keeps the worker alive until it settles.
pub struct EventHandler {
  tx: mpsc::UnboundedSender<WorkerEvent>,
  task: JoinHandle<()>,
}

impl EventHandler {
  /// Spawn the event loop for `worker`
  pub fn new<S, N>(worker: Arc<Worker<S, N>>) -> Self
  where
    S: CacheStorage + 'static,
    N: Network,
  {
    let (tx, rx) = mpsc::unbounded_channel();
    let task = tokio::spawn(run(worker, rx));
    Self { tx, task }
  }

  pub async fn install(&self) -> Result<PrecacheReport> {
    let (done, rx) = oneshot::channel();
    self.send(WorkerEvent::Install(done))?;
    Ok(rx.await.map_err(|_| eyre!("Worker dropped install event"))??)
  }

  pub async fn activate(&self) -> Result<Vec<String>> {
    let (done, rx) = oneshot::channel();
    self.send(WorkerEvent::Activate(done))?;
    Ok(rx.await.map_err(|_| eyre!("Worker dropped activate event"))??)
  }

  pub async fn start(&self) -> Result<Startup> {
    let (done, rx) = oneshot::channel();
    self.send(WorkerEvent::Start(done))?;
    Ok(rx.await.map_err(|_| eyre!("Worker dropped start event"))??)
  }

  /// Dispatch a fetch event without waiting for it.
  pub fn submit_fetch(
    &self,
    request: Request,
  ) -> Result<oneshot::Receiver<Result<Served, FetchError>>> {
    let (respond, rx) = oneshot::channel();
    self.send(WorkerEvent::Fetch(request, respond))?;
    Ok(rx)
  }

  pub async fn fetch(&self, request: Request) -> Result<Served> {
    let rx = self.submit_fetch(request)?;
    Ok(rx.await.map_err(|_| eyre!("Worker dropped fetch event"))??)
  }

  /// Stop accepting events and wait for every pending one to settle.
  pub async fn shutdown(self) -> Result<()> {
    drop(self.tx);
    self
      .task
      .await
      .map_err(|e| eyre!("Worker event loop failed: {}", e))
  }

  fn send(&self, event: WorkerEvent) -> Result<()> {
    self
      .tx
      .send(event)
      .map_err(|_| eyre!("Worker event loop is not running"))
  }
}

async fn run<S, N>(worker: Arc<Worker<S, N>>, mut rx: mpsc::UnboundedReceiver<WorkerEvent>)
where
  S: CacheStorage + 'static,
  N: Network,
{
  while let Some(event) = rx.recv().await {
    // Taken before spawning so the event counts as pending immediately
    let guard = worker.lifetimes().extend();
    let worker = Arc::clone(&worker);

    tokio::spawn(async move {
      let _guard = guard;
      dispatch(&worker, event).await;
    });
  }

  debug!(pending = worker.lifetimes().pending(), "event channel closed");
  worker.lifetimes().settled().await;
  debug!("worker idle, event loop finished");
}

async fn dispatch<S, N>(worker: &Worker<S, N>, event: WorkerEvent)
where
  S: CacheStorage,
  N: Network,
{
  // A dropped receiver means the host stopped waiting; the work still completes
  match event {
    WorkerEvent::Install(done) => {
      let _ = done.send(worker.install().await);
    }
    WorkerEvent::Activate(done) => {
      let _ = done.send(worker.activate().await);
    }
    WorkerEvent::Start(done) => {
      let _ = done.send(worker.start().await);
    }
    WorkerEvent::Fetch(request, respond) => {
      let _ = respond.send(worker.handle_fetch(&request).await);
    }
  }
}
