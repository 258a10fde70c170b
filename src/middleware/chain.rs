//! Per-route middleware composition.
//!
//! `chain(handler, vec![a, b])` wraps the handler with `a` first and `b`
//! second, so a request passes through `b`, then `a`, then the handler:
//! the entry listed nearest the handler runs nearest the handler.
//!
//! Context resolution is not part of the list. It is a router-wide layer
//! (see `middleware::auth::context`) and always runs before any of these.

use axum::routing::MethodRouter;

/// One wrapping step over a route's handler.
pub type Middleware<S> = Box<dyn FnOnce(MethodRouter<S>) -> MethodRouter<S> + Send>;

pub fn chain<S>(handler: MethodRouter<S>, middlewares: Vec<Middleware<S>>) -> MethodRouter<S>
where
    S: Clone + Send + Sync + 'static,
{
    middlewares
        .into_iter()
        .fold(handler, |route, wrap| wrap(route))
}
