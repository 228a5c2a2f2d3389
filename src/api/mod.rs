//! API Module
//!
//! HTTP handlers and routing for the photo feed JSON surface. The acting
//! user id and the anti-forgery token arrive already validated.

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
