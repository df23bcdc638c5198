//! Network side of the worker: request/response values and the fetch client.

mod client;
#[cfg(test)]
pub mod mock;
mod types;

pub use client::{FetchMode, HttpNetwork, Network};
pub use types::{cache_key, Destination, Request, Response};
