//! `resource_engine`
//!
//! Lazy, dependency-aware resource registry.
//!
//! Design goals:
//! - Opaque numeric ids resolve into typed, cross-referencing runtime objects.
//! - Construction (wiring handles) is staged separately from loading (I/O,
//!   compilation), so cyclic and diamond graphs can be built at all.
//! - Single-threaded and cooperative: deferred loads are drained by an
//!   explicit per-frame call, never by background tasks.
//! - The registry only caches weak references; object lifetime belongs to
//!   whoever holds the strong ones.
//! - No `unsafe`.

pub mod builder;
pub mod config;
pub mod data;
pub mod error;
pub mod handle;
pub mod id;
pub mod loader;
pub mod manifest;
pub mod resource;
pub mod state;
pub mod stock;

pub use handle::Handle;
pub use loader::ResourceLoader;

pub mod prelude {
    //! Commonly used exports.

    pub use crate::config::*;
    pub use crate::data::*;
    pub use crate::error::*;
    pub use crate::handle::*;
    pub use crate::id::*;
    pub use crate::loader::*;
    pub use crate::resource::*;
    pub use crate::state::*;
}
