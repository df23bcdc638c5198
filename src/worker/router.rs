//! Classification of intercepted requests.

use reqwest::Method;

use crate::net::{Destination, Request};

use super::context::Scope;
use super::strategy::Strategy;

/// What the worker does with a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
  /// Do not intervene; the host fetches it natively
  Passthrough,
  Handle(Strategy),
}

/// Pick the handling for `request`. Pure; performs no I/O.
pub fn route(scope: &Scope, request: &Request) -> Route {
  // Only GET responses can be stored
  if request.method != Method::GET {
    return Route::Passthrough;
  }

  if request.url.origin() != scope.origin {
    return Route::Passthrough;
  }

  // Whole last segment, so `old-sw.js` is not mistaken for `sw.js`
  let last_segment = request.url.path_segments().and_then(|mut s| s.next_back());
  if last_segment == Some(scope.script_name.as_str()) {
    return Route::Handle(Strategy::NetworkOnly);
  }

  let page_resource = matches!(
    request.destination,
    Destination::Document | Destination::Script | Destination::Style
  );
  if request.is_navigation() || page_resource {
    return Route::Handle(Strategy::NetworkFirst);
  }

  Route::Handle(Strategy::CacheFirst)
}
