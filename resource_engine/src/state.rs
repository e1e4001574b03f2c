//! Lifecycle states and resolution urgency.

use serde::{Deserialize, Serialize};

/// Observed progress of a resource.
///
/// `NotRequested -> InProgress -> {Ready | Failed}`. `Invalid` only ever
/// appears in resolution results and handles; the registry never stores it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceState {
    /// Id is zero, or nothing is registered under it.
    Invalid,
    /// Registered, no object built yet (or the last one was dropped).
    #[default]
    NotRequested,
    /// Object constructed and wired, load not finished.
    InProgress,
    /// Loaded and usable.
    Ready,
    /// Load failed, a dependency failed, or the kind could not be built.
    /// Sticky until the id is registered again.
    Failed,
}

impl ResourceState {
    /// `Ready` or `Failed`.
    pub fn is_terminal(self) -> bool {
        matches!(self, ResourceState::Ready | ResourceState::Failed)
    }

    /// Still on its way to `Ready` or `Failed` without anyone re-registering
    /// it.
    pub fn in_flight(self) -> bool {
        matches!(self, ResourceState::NotRequested | ResourceState::InProgress)
    }
}

/// How urgently a resolution should finish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolveMode {
    /// Construct and load now, recursively, on the calling thread.
    Immediate,
    /// Construct now, queue the load for the next `drain()`.
    #[default]
    Deferred,
}
