//! Synchronization pipeline, cache, and serving layer for the
//! definition mirror.

pub mod cache;
pub mod config;
pub mod pipeline;
pub mod serve;
