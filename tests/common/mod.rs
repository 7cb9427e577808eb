//! Common test utilities for blog-image-archiver integration tests

#[allow(dead_code)]
pub mod fixtures;

pub use fixtures::*;
