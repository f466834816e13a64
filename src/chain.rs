//! Middleware chains
//!
//! A [`Chain`] is an ordered list of request-wrapping functions that can be
//! folded around a terminal handler. The first middleware in the list is the
//! outermost one: it sees the request first and its post-processing runs last.
//!
//! Chains are immutable values. Every append returns a new chain, so two
//! chains built from a common prefix never observe each other's additions:
//!
//! ```ignore
//! let base = Chain::new().with(log_request());
//! let authenticated = base.with(require_session(sessions));
//! // `base` still holds exactly one middleware
//! ```

use std::convert::Infallible;
use std::sync::Arc;

use axum::{body::Body, extract::Request, response::Response};
use tower::util::BoxCloneService;
use tower::{Service, ServiceExt};

/// Type-erased terminal handler that a chain wraps.
pub type BoxHandler = BoxCloneService<Request<Body>, Response, Infallible>;

/// A single middleware: takes the next handler and returns a wrapped one.
pub type Middleware = Arc<dyn Fn(BoxHandler) -> BoxHandler + Send + Sync>;

/// Ordered, immutable middleware list.
#[derive(Clone, Default)]
pub struct Chain {
    middleware: Arc<[Middleware]>,
}

impl std::fmt::Debug for Chain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chain")
            .field("len", &self.middleware.len())
            .finish()
    }
}

impl Chain {
    /// Create an empty chain
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of middleware in the chain
    pub fn len(&self) -> usize {
        self.middleware.len()
    }

    pub fn is_empty(&self) -> bool {
        self.middleware.is_empty()
    }

    /// Return a new chain with `middleware` appended. `self` is left untouched.
    pub fn with(&self, middleware: Middleware) -> Self {
        self.middleware
            .iter()
            .cloned()
            .chain(std::iter::once(middleware))
            .collect()
    }

    /// Return a new chain with all of `other`'s middleware after this chain's.
    pub fn append(&self, other: &Chain) -> Self {
        self.middleware
            .iter()
            .chain(other.middleware.iter())
            .cloned()
            .collect()
    }

    /// Wrap `handler` so that the chain runs in order before it.
    ///
    /// The result is `m1(m2(...mn(handler)))`.
    pub fn then<S>(&self, handler: S) -> BoxHandler
    where
        S: Service<Request<Body>, Response = Response, Error = Infallible>
            + Clone
            + Send
            + 'static,
        S::Future: Send + 'static,
    {
        self.middleware
            .iter()
            .rev()
            .fold(BoxCloneService::new(handler), |next, middleware| {
                middleware(next)
            })
    }
}

impl FromIterator<Middleware> for Chain {
    fn from_iter<I: IntoIterator<Item = Middleware>>(iter: I) -> Self {
        Self {
            middleware: iter.into_iter().collect(),
        }
    }
}

/// Wrap an async function `(request, next) -> response` as a middleware.
pub fn middleware_fn<F, Fut>(f: F) -> Middleware
where
    F: Fn(Request<Body>, BoxHandler) -> Fut + Clone + Send + Sync + 'static,
    Fut: std::future::Future<Output = Response> + Send + 'static,
{
    Arc::new(move |next: BoxHandler| {
        let f = f.clone();
        BoxCloneService::new(tower::service_fn(move |request: Request<Body>| {
            let fut = f(request, next.clone());
            async move { Ok::<_, Infallible>(fut.await) }
        }))
    })
}

/// Run the rest of the chain for `request`.
pub async fn run(next: BoxHandler, request: Request<Body>) -> Response {
    match next.oneshot(request).await {
        Ok(response) => response,
        Err(never) => match never {},
    }
}

/// Middleware that logs every request it sees.
pub fn log_request() -> Middleware {
    middleware_fn(|request: Request<Body>, next: BoxHandler| async move {
        tracing::info!(
            method = %request.method(),
            path = %request.uri().path(),
            "request received"
        );
        run(next, request).await
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        Router,
        http::StatusCode,
        routing::{MethodRouter, get},
    };
    use std::sync::Mutex;

    type Recorder = Arc<Mutex<String>>;

    fn noop() -> MethodRouter {
        get(|| async {})
    }

    fn recording(recorder: &Recorder, tag: &'static str) -> Middleware {
        let recorder = recorder.clone();
        middleware_fn(move |request: Request<Body>, next: BoxHandler| {
            let recorder = recorder.clone();
            async move {
                recorder.lock().unwrap().push_str(tag);
                run(next, request).await
            }
        })
    }

    async fn call(router: &Router, path: &str) -> StatusCode {
        let request = Request::builder().uri(path).body(Body::empty()).unwrap();
        router.clone().oneshot(request).await.unwrap().status()
    }

    #[tokio::test]
    async fn chain_runs_middleware_in_order_before_handler() {
        let recorder = Recorder::default();
        let chain = Chain::new()
            .with(recording(&recorder, "1"))
            .with(recording(&recorder, "2"));

        let handler_recorder = recorder.clone();
        let handler: MethodRouter = get(move || {
            let recorder = handler_recorder.clone();
            async move {
                recorder.lock().unwrap().push('h');
                "ok"
            }
        });

        let router = Router::new().route_service("/", chain.then(handler));
        assert_eq!(call(&router, "/").await, StatusCode::OK);
        assert_eq!(recorder.lock().unwrap().as_str(), "12h");
    }

    #[tokio::test]
    async fn derived_chains_do_not_alias_their_prefix() {
        let recorder = Recorder::default();
        let handler = noop();

        let c1 = Chain::new()
            .with(recording(&recorder, "1"))
            .with(recording(&recorder, "2"));
        let mut router = Router::new().route_service("/", c1.then(handler.clone()));

        let c2 = c1
            .with(recording(&recorder, "3"))
            .with(recording(&recorder, "4"));
        router = router.route_service("/foo", c2.then(handler.clone()));

        let c3 = c2.with(recording(&recorder, "5"));
        router = router.route_service("/nested/foo", c3.then(handler.clone()));

        let c4 = c1.with(recording(&recorder, "6"));
        router = router.route_service("/bar", c4.then(handler.clone()));

        router = router.route_service("/baz", c1.then(handler.clone()));

        let cases = [
            ("/", "12"),
            ("/foo", "1234"),
            ("/nested/foo", "12345"),
            ("/bar", "126"),
            ("/baz", "12"),
        ];

        for (path, expected) in cases {
            recorder.lock().unwrap().clear();
            assert_eq!(call(&router, path).await, StatusCode::OK, "{path}");
            assert_eq!(recorder.lock().unwrap().as_str(), expected, "{path}");
        }

        assert_eq!(c1.len(), 2);
        assert_eq!(c2.len(), 4);
    }

    #[tokio::test]
    async fn append_joins_two_chains() {
        let recorder = Recorder::default();
        let outer = Chain::new().with(recording(&recorder, "a"));
        let inner = Chain::new()
            .with(recording(&recorder, "b"))
            .with(recording(&recorder, "c"));

        let router =
            Router::new().route_service("/", outer.append(&inner).then(noop()));
        call(&router, "/").await;

        assert_eq!(recorder.lock().unwrap().as_str(), "abc");
        assert_eq!(outer.len(), 1);
    }

    #[tokio::test]
    async fn middleware_can_short_circuit() {
        use axum::response::IntoResponse;

        let deny = middleware_fn(|_request: Request<Body>, _next: BoxHandler| async {
            StatusCode::FORBIDDEN.into_response()
        });
        let router = Router::new().route_service("/", Chain::new().with(deny).then(noop()));

        assert_eq!(call(&router, "/").await, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn empty_chain_is_the_handler() {
        let hello: MethodRouter = get(|| async { "hi" });
        let router = Router::new().route_service("/", Chain::new().then(hello));
        assert_eq!(call(&router, "/").await, StatusCode::OK);
        assert!(Chain::new().is_empty());
    }
}
