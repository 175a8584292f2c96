//! HTTP middleware stack for storefront.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layers (hub per request, transaction per request)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID (add unique ID to each request)
//!
//! Caller identity is not a layer: handlers that need it take the
//! [`RequireCaller`] extractor; public routes take [`FromGateway`].

pub mod auth;
pub mod request_id;

pub use auth::{FromGateway, GATEWAY_TOKEN_HEADER, RequireCaller, USER_ID_HEADER, USER_ROLE_HEADER};
pub use request_id::{REQUEST_ID_HEADER, request_id_middleware};
