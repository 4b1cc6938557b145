//! SSE HTTP handlers for the web layer.
//!
//! This module contains only the Axum handlers for the stream endpoints.
//! The core SSE infrastructure (Manager, registries, stream lifecycle)
//! lives in the `sse` crate to avoid circular dependencies.

pub mod handler;
