//! Request introspection and the httpbin-style endpoints
//!
//! [`EchoApp`] is the entry point: it runs the middleware chain and the
//! [`Router`] for one already-read request and returns the response. Nothing
//! here touches the network, so everything is testable with hand-built
//! [`Request`]s.

pub mod auth;
pub mod body;
pub mod describe;
pub mod flatten;
pub mod media_type;
pub mod middleware;
pub mod multipart;
pub mod routes;


pub use auth::AuthResult;
pub use body::{BodyKind, DecodedBody};
pub use describe::{Describer, RequestDescriptor};
pub use flatten::{FlatValue, FlattenedMap};
pub use media_type::MediaType;
pub use middleware::{Middleware, ResponseTime, TrailingSlash};
pub use multipart::{FileInfo, MultipartBody};
pub use routes::{Route, Router};

use crate::http::{Request, Response};
use crate::server::ServerConfig;
use std::time::Instant;

/// The echo application: middleware chain plus router
pub struct EchoApp {
    router: Router,
    middlewares: Vec<Box<dyn Middleware>>,
}

impl EchoApp {
    /// Router with the default middleware chain: response timing, then
    /// trailing-slash normalization
    pub fn new(router: Router) -> Self {
        Self {
            router,
            middlewares: vec![Box::new(ResponseTime), Box::new(TrailingSlash)],
        }
    }

    pub fn from_config(config: &ServerConfig) -> Self {
        Self::new(Router::new(Describer::new(config.trust_forwarded_for)))
    }

    /// Appends a middleware to the end of the chain
    pub fn with_middleware(mut self, middleware: impl Middleware + 'static) -> Self {
        self.middlewares.push(Box::new(middleware));
        self
    }

    pub fn handle(&self, request: &Request) -> Response {
        let start = Instant::now();

        let early = self.middlewares.iter().find_map(|mw| mw.before(request));
        let mut response = early.unwrap_or_else(|| self.router.dispatch(request));

        let latency = start.elapsed();
        for mw in &self.middlewares {
            mw.after(request, &mut response, latency);
        }
        response
    }
}

impl Default for EchoApp {
    fn default() -> Self {
        Self::new(Router::default())
    }
}
