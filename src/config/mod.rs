//! Configuration module for nosmooth
//!
//! Provides types, discovery and loading for `nosmooth.toml`.

pub mod loader;
pub mod schema;

pub use loader::*;
pub use schema::*;
