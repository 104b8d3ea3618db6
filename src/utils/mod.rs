//! Common utilities and helpers

pub mod compress;

pub use compress::{gunzip, GzipPool};
