//! `resource_viewer`
//!
//! Drives a `ResourceLoader` the way an application frame loop would:
//! - Command-line/config parsing
//! - Manifest registration with the stock builders
//! - One `drain()` per tick, re-resolving whatever is still in flight
//! - A final status table

pub mod args;
pub mod driver;

pub use driver::FrameDriver;
