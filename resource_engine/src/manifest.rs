//! Package manifest reader.
//!
//! Stand-in for the packaged build-data source: a JSON document listing every
//! resource to register, keyed by numeric id and optionally by name.
//!
//! ```json
//! { "resources": [
//!     { "id": 1, "name": "basic.vert", "kind": "shader",
//!       "data": { "stage": "vertex", "path": "basic.vert" } }
//! ] }
//! ```

use std::{collections::HashSet, path::Path};

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    data::{BuildData, ResourceKind},
    id::ResourceId,
    loader::ResourceLoader,
};

/// One registration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub id: ResourceId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub kind: ResourceKind,
    #[serde(default)]
    pub data: BuildData,
}

/// A parsed, validated package manifest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PackageManifest {
    pub resources: Vec<ManifestEntry>,
}

impl PackageManifest {
    /// Parses and validates a manifest.
    pub fn from_json_str(s: &str) -> anyhow::Result<Self> {
        let manifest: Self = serde_json::from_str(s).context("parse manifest")?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Reads, parses and validates a manifest file.
    pub fn from_path(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read manifest {}", path.display()))?;
        Self::from_json_str(&text).with_context(|| format!("load manifest {}", path.display()))
    }

    /// Rejects id 0 and duplicate ids or names.
    pub fn validate(&self) -> anyhow::Result<()> {
        let mut ids = HashSet::new();
        let mut names = HashSet::new();
        for entry in &self.resources {
            if entry.id.is_none() {
                bail!("manifest entry uses reserved id 0");
            }
            if !ids.insert(entry.id) {
                bail!("duplicate resource id {}", entry.id);
            }
            if let Some(name) = &entry.name {
                if !names.insert(name.as_str()) {
                    bail!("duplicate resource name '{}'", name);
                }
            }
        }
        Ok(())
    }

    /// Registers every entry with `loader`. Returns how many were registered.
    pub fn apply(&self, loader: &ResourceLoader) -> anyhow::Result<usize> {
        for entry in &self.resources {
            loader
                .register(entry.id, entry.kind.clone(), entry.data.clone())
                .with_context(|| format!("register {}", entry.id))?;
            debug!(id = %entry.id, kind = %entry.kind, name = ?entry.name, "manifest entry registered");
        }
        Ok(self.resources.len())
    }

    /// Id registered under `name`.
    pub fn id_of(&self, name: &str) -> Option<ResourceId> {
        self.resources
            .iter()
            .find(|entry| entry.name.as_deref() == Some(name))
            .map(|entry| entry.id)
    }

    /// Ids in manifest order.
    pub fn ids(&self) -> Vec<ResourceId> {
        self.resources.iter().map(|entry| entry.id).collect()
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::ResourceState;

    const MANIFEST: &str = r#"{
        "resources": [
            { "id": 1, "name": "basic.vert", "kind": "shader",
              "data": { "stage": "vertex", "path": "basic.vert" } },
            { "id": 2, "kind": "font", "data": { "path": "ui.ttf", "size": 14 } }
        ]
    }"#;

    #[test]
    fn parses_and_looks_up_names() {
        let manifest = PackageManifest::from_json_str(MANIFEST).unwrap();
        assert_eq!(manifest.len(), 2);
        assert_eq!(manifest.id_of("basic.vert"), Some(ResourceId(1)));
        assert_eq!(manifest.id_of("ui.ttf"), None);
        assert_eq!(manifest.ids(), vec![ResourceId(1), ResourceId(2)]);
        assert_eq!(manifest.resources[1].kind, ResourceKind::FONT);
    }

    #[test]
    fn missing_data_is_an_empty_object() {
        let manifest =
            PackageManifest::from_json_str(r#"{ "resources": [ { "id": 3, "kind": "fixture" } ] }"#)
                .unwrap();
        assert_eq!(manifest.resources[0].data, BuildData::empty());
    }

    #[test]
    fn rejects_duplicates_and_reserved_ids() {
        let dup = r#"{ "resources": [
            { "id": 4, "kind": "mesh" }, { "id": 4, "kind": "mesh" } ] }"#;
        assert!(PackageManifest::from_json_str(dup).is_err());

        let zero = r#"{ "resources": [ { "id": 0, "kind": "mesh" } ] }"#;
        assert!(PackageManifest::from_json_str(zero).is_err());
    }

    #[test]
    fn apply_registers_everything() {
        let manifest = PackageManifest::from_json_str(MANIFEST).unwrap();
        let loader = ResourceLoader::new();
        assert_eq!(manifest.apply(&loader).unwrap(), 2);
        assert_eq!(loader.len(), 2);
        assert_eq!(loader.state(ResourceId(1)), ResourceState::NotRequested);
        assert_eq!(loader.kind(ResourceId(2)), Some(ResourceKind::FONT));
    }
}
