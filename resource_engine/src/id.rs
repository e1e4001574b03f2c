//! Resource identifiers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque resource id. Zero is reserved and always means "no resource".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(pub u64);

impl ResourceId {
    /// The "no resource" sentinel.
    pub const NONE: ResourceId = ResourceId(0);

    pub fn is_none(self) -> bool {
        self.0 == 0
    }

    pub fn is_some(self) -> bool {
        self.0 != 0
    }
}

impl From<u64> for ResourceId {
    fn from(raw: u64) -> Self {
        ResourceId(raw)
    }
}

impl From<ResourceId> for u64 {
    fn from(id: ResourceId) -> Self {
        id.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_is_the_sentinel() {
        assert!(ResourceId::NONE.is_none());
        assert!(ResourceId::default().is_none());
        assert!(ResourceId(7).is_some());
    }

    #[test]
    fn serializes_as_bare_number() {
        let json = serde_json::to_string(&ResourceId(42)).unwrap();
        assert_eq!(json, "42");
        let back: ResourceId = serde_json::from_str("42").unwrap();
        assert_eq!(back, ResourceId(42));
    }
}
