//! HTTP request handlers.

pub mod render;
