//! Type tags and build data.
//!
//! Build data is the opaque, immutable payload registered alongside an id:
//! file paths, ids of other resources, property tables. It arrives as JSON
//! from a package reader and is decoded by each kind's builder.

use std::{borrow::Cow, fmt};

use anyhow::Context;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

/// Type tag selecting which builder constructs a resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceKind(Cow<'static, str>);

impl ResourceKind {
    pub const MESH: ResourceKind = ResourceKind::from_static("mesh");
    pub const TEXTURE: ResourceKind = ResourceKind::from_static("texture");
    pub const SHADER: ResourceKind = ResourceKind::from_static("shader");
    pub const PROGRAM: ResourceKind = ResourceKind::from_static("program");
    pub const MATERIAL: ResourceKind = ResourceKind::from_static("material");
    pub const FONT: ResourceKind = ResourceKind::from_static("font");
    pub const RENDERABLE_MESH: ResourceKind = ResourceKind::from_static("renderable_mesh");
    pub const RENDERABLE_TEXTURE: ResourceKind = ResourceKind::from_static("renderable_texture");

    pub const fn from_static(name: &'static str) -> Self {
        ResourceKind(Cow::Borrowed(name))
    }

    pub fn new(name: impl Into<String>) -> Self {
        ResourceKind(Cow::Owned(name.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&'static str> for ResourceKind {
    fn from(name: &'static str) -> Self {
        ResourceKind::from_static(name)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

/// Immutable construction/load parameters for one resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BuildData(serde_json::Value);

impl BuildData {
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    /// Build data with no parameters: an empty object, so parameter structs
    /// whose fields all have defaults still decode.
    pub fn empty() -> Self {
        Self(serde_json::Value::Object(serde_json::Map::new()))
    }

    /// Decodes the payload into a kind's parameter struct.
    pub fn decode<T: DeserializeOwned>(&self) -> anyhow::Result<T> {
        T::deserialize(&self.0).context("decode build data")
    }

    /// Reads a single field, if present.
    pub fn field<T: DeserializeOwned>(&self, key: &str) -> anyhow::Result<Option<T>> {
        match self.0.get(key) {
            None | Some(serde_json::Value::Null) => Ok(None),
            Some(value) => T::deserialize(value)
                .map(Some)
                .with_context(|| format!("decode build data field '{}'", key)),
        }
    }
}

impl Default for BuildData {
    fn default() -> Self {
        Self::empty()
    }
}

impl From<serde_json::Value> for BuildData {
    fn from(value: serde_json::Value) -> Self {
        Self(value)
    }
}
