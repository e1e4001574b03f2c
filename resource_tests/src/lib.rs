//! Shared fixtures for the integration tests.
//!
//! `Fixture` is a test double for the resource contract: its build data names
//! its dependencies, whether its load should fail, and ids it should request
//! while loading. Every build and load is recorded in a shared `FixtureLog`,
//! keyed by the fixture's tag.

use std::{cell::RefCell, collections::HashMap, rc::Rc};

use anyhow::bail;
use resource_engine::{
    data::{BuildData, ResourceKind},
    handle::Handle,
    id::ResourceId,
    loader::ResourceLoader,
    resource::Resource,
    state::ResolveMode,
};
use serde::Deserialize;

pub const FIXTURE: ResourceKind = ResourceKind::from_static("fixture");

#[derive(Debug, Default, Deserialize)]
pub struct FixtureParams {
    #[serde(default)]
    pub tag: String,
    #[serde(default)]
    pub deps: Vec<Handle<Fixture>>,
    #[serde(default)]
    pub fail: bool,
    /// Requested with `Deferred` from inside `load`.
    #[serde(default)]
    pub spawns: Vec<ResourceId>,
}

/// Builds and loads per tag, plus the global load order.
#[derive(Debug, Default)]
pub struct FixtureLog {
    builds: RefCell<HashMap<String, u32>>,
    loads: RefCell<HashMap<String, u32>>,
    order: RefCell<Vec<String>>,
}

impl FixtureLog {
    pub fn builds(&self, tag: &str) -> u32 {
        self.builds.borrow().get(tag).copied().unwrap_or(0)
    }

    pub fn loads(&self, tag: &str) -> u32 {
        self.loads.borrow().get(tag).copied().unwrap_or(0)
    }

    pub fn order(&self) -> Vec<String> {
        self.order.borrow().clone()
    }
}

pub struct Fixture {
    params: FixtureParams,
    log: Rc<FixtureLog>,
}

impl Fixture {
    pub fn tag(&self) -> &str {
        &self.params.tag
    }

    pub fn deps(&self) -> &[Handle<Fixture>] {
        &self.params.deps
    }
}

impl Resource for Fixture {
    fn dependencies(&self) -> Vec<ResourceId> {
        self.params.deps.iter().map(Handle::id).collect()
    }

    fn wire_dependencies(&self, loader: &ResourceLoader, mode: ResolveMode) {
        for dep in &self.params.deps {
            dep.resolve(loader, mode);
        }
    }

    fn load(&self, _data: &BuildData, loader: &ResourceLoader) -> anyhow::Result<()> {
        *self
            .log
            .loads
            .borrow_mut()
            .entry(self.params.tag.clone())
            .or_default() += 1;
        self.log.order.borrow_mut().push(self.params.tag.clone());
        for &id in &self.params.spawns {
            loader.resolve(id, ResolveMode::Deferred);
        }
        if self.params.fail {
            bail!("fixture '{}' told to fail", self.params.tag);
        }
        Ok(())
    }
}

/// A loader with the fixture builder registered.
pub fn fixture_loader() -> (ResourceLoader, Rc<FixtureLog>) {
    let log = Rc::new(FixtureLog::default());
    let loader = ResourceLoader::new();
    let builder_log = log.clone();
    loader.register_builder(FIXTURE, move |data| {
        let params: FixtureParams = data.decode()?;
        *builder_log
            .builds
            .borrow_mut()
            .entry(params.tag.clone())
            .or_default() += 1;
        Ok(Fixture {
            params,
            log: builder_log.clone(),
        })
    });
    (loader, log)
}

/// Registers a fixture under `id` from a JSON parameter object.
pub fn register_fixture(loader: &ResourceLoader, id: u64, params: serde_json::Value) {
    loader
        .register(ResourceId(id), FIXTURE, BuildData::new(params))
        .expect("fixture registration");
}

/// Installs a test subscriber once per process.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer()
        .try_init();
}
