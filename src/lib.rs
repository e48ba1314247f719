//! reelkit - lossless container repacking and release-name cleanup
//!
//! This library crate exposes the core functionality for integration testing.

pub mod batch;
pub mod config;
pub mod events;
pub mod rename;
