//! HTTP front end: upstream proxies, perception signal intake, and access to
//! the running assessment loop.

pub mod config;
pub mod error;
pub mod prompt_loader;
pub mod routes;
pub mod state;

pub use routes::router;
