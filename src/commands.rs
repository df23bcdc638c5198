use std::sync::Arc;

use clap::Subcommand;
use color_eyre::{eyre::eyre, Result};
use tracing::warn;
use url::Url;

use crate::cache::{CacheStore, Generation, ResponseSource, SqliteStorage};
use crate::config::Config;
use crate::event::EventHandler;
use crate::net::{Destination, HttpNetwork, Request};
use crate::worker::{PrecacheReport, Worker, WorkerContext};

#[derive(Subcommand, Debug)]
pub enum Command {
  /// Install the current generation (precache) and activate it
  Install,
  /// Fetch URLs through the worker, installing first if needed
  Fetch {
    /// Absolute URLs, or paths relative to the worker script
    #[arg(required = true)]
    urls: Vec<String>,
    /// Request destination used for routing
    #[arg(short, long, value_enum, default_value_t = Destination::Empty)]
    destination: Destination,
    /// Treat the requests as page navigations
    #[arg(short, long)]
    navigate: bool,
  },
  /// List cache generations
  Generations,
  /// List entries of a generation (current one by default)
  Entries {
    #[arg(short, long)]
    generation: Option<String>,
  },
}

pub async fn run(command: Command, config: &Config) -> Result<()> {
  let store = CacheStore::new(SqliteStorage::open(&config.database_path()?)?);

  match command {
    Command::Install => install(config, store).await,
    Command::Fetch {
      urls,
      destination,
      navigate,
    } => fetch(config, store, &urls, destination, navigate).await,
    Command::Generations => generations(config, &store),
    Command::Entries { generation } => entries(config, &store, generation),
  }
}

fn spawn_worker(config: &Config, store: CacheStore<SqliteStorage>) -> Result<EventHandler> {
  let network = HttpNetwork::new(&config.network)?;
  let ctx = WorkerContext::new(&config.worker_settings()?, store, network)?;
  Ok(EventHandler::new(Arc::new(Worker::new(ctx))))
}

async fn install(config: &Config, store: CacheStore<SqliteStorage>) -> Result<()> {
  let handler = spawn_worker(config, store)?;

  let report = handler.install().await?;
  let purged = handler.activate().await?;
  handler.shutdown().await?;

  if !report.is_complete() {
    warn!(
      failed = report.failed.len(),
      "some precache entries are unavailable offline"
    );
  }
  print_report(&report);
  for name in purged {
    println!("purged  {}", name);
  }
  Ok(())
}

async fn fetch(
  config: &Config,
  store: CacheStore<SqliteStorage>,
  urls: &[String],
  destination: Destination,
  navigate: bool,
) -> Result<()> {
  let script_url = Url::parse(config.script_url()?)
    .map_err(|e| eyre!("Invalid worker script URL: {}", e))?;
  let requests = urls
    .iter()
    .map(|raw| {
      let url = script_url
        .join(raw)
        .map_err(|e| eyre!("Invalid URL '{}': {}", raw, e))?;
      let request = if navigate {
        Request::navigate(url)
      } else {
        Request::get(url).with_destination(destination)
      };
      Ok(request)
    })
    .collect::<Result<Vec<_>>>()?;

  let handler = spawn_worker(config, store)?;
  let startup = handler.start().await?;
  if let Some(report) = &startup.precache {
    print_report(report);
  }

  // All fetch events are in flight before any is awaited
  let pending = requests
    .into_iter()
    .map(|request| {
      let url = request.url.clone();
      handler.submit_fetch(request).map(|rx| (url, rx))
    })
    .collect::<Result<Vec<_>>>()?;

  let mut failures = 0;
  for (url, rx) in pending {
    match rx.await.map_err(|_| eyre!("Worker dropped fetch event"))? {
      Ok(served) => {
        let note = if served.source == ResponseSource::Shell {
          "  (offline shell)"
        } else {
          ""
        };
        println!(
          "{:<11} {} {:>8}B  {}{}",
          served.source.label(),
          served.response.status,
          served.response.body.len(),
          url,
          note
        );
      }
      Err(e) => {
        failures += 1;
        warn!(url = %url, "fetch failed: {}", e);
        let label = if e.is_network() { "offline" } else { "failed" };
        println!("{:<11} --- {:>9}  {}", label, "-", url);
      }
    }
  }
  handler.shutdown().await?;

  if failures > 0 {
    return Err(eyre!("{} of {} requests failed", failures, urls.len()));
  }
  Ok(())
}

fn current_generation(config: &Config) -> Option<String> {
  config
    .script_url()
    .ok()
    .map(|url| Generation::current(&config.cache_prefix, url).name())
}

fn generations(config: &Config, store: &CacheStore<SqliteStorage>) -> Result<()> {
  let current = current_generation(config);
  for name in store.keys()? {
    let marker = if Some(&name) == current.as_ref() { "*" } else { " " };
    let stale = if name.starts_with(&config.cache_prefix) && marker != "*" {
      "  (stale)"
    } else {
      ""
    };
    println!("{} {:<32} {:>5} entries{}", marker, name, store.len(&name)?, stale);
  }
  Ok(())
}

fn entries(
  config: &Config,
  store: &CacheStore<SqliteStorage>,
  generation: Option<String>,
) -> Result<()> {
  let name = generation
    .or_else(|| current_generation(config))
    .ok_or_else(|| eyre!("No generation given and no worker script URL configured"))?;

  if !store.has(&name)? {
    return Err(eyre!("Cache generation not found: {}", name));
  }

  for entry in store.handle(&name).entries()? {
    println!(
      "{} {}  {}  {}",
      entry.response.status,
      entry.digest.get(..12).unwrap_or(&entry.digest),
      entry.cached_at.format("%Y-%m-%d %H:%M:%S"),
      entry.url
    );
  }
  Ok(())
}

fn print_report(report: &PrecacheReport) {
  for url in &report.cached {
    println!("cached  {}", url);
  }
  for failure in &report.failed {
    println!("skipped {}  ({})", failure.url, failure.reason);
  }
}
