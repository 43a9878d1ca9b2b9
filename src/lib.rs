//! Widget REST library
//!
//! This library exposes a site's sidebar and widget placement data through a
//! REST API. It contains the placement engine that keeps an ordered list of
//! widget ids per sidebar, the instance store for per-widget settings, a
//! best-effort form-schema inferrer, and the axum endpoint layer.

// Module declarations
pub mod config;
pub mod constants;
pub mod error;
pub mod host;
pub mod models;
pub mod placement;
pub mod services;
pub mod store;
#[cfg(feature = "web")]
pub mod web;
