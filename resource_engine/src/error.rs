//! Failure diagnostics.
//!
//! Every variant collapses to `ResourceState::Failed` for callers; the loader
//! keeps the last one per id so logs and tools can tell them apart.

use thiserror::Error;

use crate::{data::ResourceKind, id::ResourceId};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResourceError {
    /// Configuration error: nothing registered to build this kind.
    #[error("no builder registered for kind '{kind}' (resource {id})")]
    MissingBuilder { id: ResourceId, kind: ResourceKind },

    /// Configuration error: the builder rejected the build data.
    #[error("malformed build data for {kind} resource {id}: {reason}")]
    MalformedBuildData {
        id: ResourceId,
        kind: ResourceKind,
        reason: String,
    },

    /// A dependency failed to load or was never registered.
    #[error("resource {id} failed because dependency {dependency} failed")]
    Dependency {
        id: ResourceId,
        dependency: ResourceId,
    },

    /// The resource's own load step failed.
    #[error("resource {id} failed to load: {reason}")]
    Load { id: ResourceId, reason: String },
}

impl ResourceError {
    /// The id this failure was recorded against.
    pub fn id(&self) -> ResourceId {
        match self {
            ResourceError::MissingBuilder { id, .. }
            | ResourceError::MalformedBuildData { id, .. }
            | ResourceError::Dependency { id, .. }
            | ResourceError::Load { id, .. } => *id,
        }
    }

    /// Setup mistakes rather than resource problems.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            ResourceError::MissingBuilder { .. } | ResourceError::MalformedBuildData { .. }
        )
    }
}
