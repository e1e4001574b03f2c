//! Frame driver.
//!
//! Holds the strong references a real consumer would (so resources stay
//! alive once built) and pumps the loader once per tick.

use std::{rc::Rc, time::Duration};

use resource_engine::{
    config::LoaderConfig,
    data::ResourceKind,
    id::ResourceId,
    loader::{LoaderStats, ResourceLoader},
    manifest::PackageManifest,
    resource::Resource,
    state::{ResolveMode, ResourceState},
    stock::register_stock_builders,
};
use tokio::time::Instant;
use tracing::{debug, info};

/// One resource the driver asked for.
pub struct Request {
    pub id: ResourceId,
    pub name: Option<String>,
    pub kind: ResourceKind,
    pub state: ResourceState,
    object: Option<Rc<dyn Resource>>,
}

impl Request {
    pub fn is_alive(&self) -> bool {
        self.object.is_some()
    }
}

/// What happened during one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameReport {
    pub frame: u32,
    /// Loads run by this tick's `drain()`.
    pub loads: usize,
    /// Requests not yet `Ready` or `Failed`.
    pub unsettled: usize,
}

pub struct FrameDriver {
    loader: ResourceLoader,
    manifest: PackageManifest,
    requests: Vec<Request>,
    frame: u32,
}

impl FrameDriver {
    /// Registers `manifest` on `loader`.
    pub fn new(loader: ResourceLoader, manifest: PackageManifest) -> anyhow::Result<Self> {
        let registered = manifest.apply(&loader)?;
        info!(registered, "manifest applied");
        Ok(Self {
            loader,
            manifest,
            requests: Vec::new(),
            frame: 0,
        })
    }

    /// Fresh loader with the stock builders, manifest read from `cfg.manifest`.
    pub fn from_config(cfg: &LoaderConfig) -> anyhow::Result<Self> {
        let loader = ResourceLoader::new();
        register_stock_builders(&loader, &cfg.asset_root);
        let manifest = PackageManifest::from_path(&cfg.manifest)?;
        Self::new(loader, manifest)
    }

    /// Requests every manifest resource.
    pub fn request_all(&mut self, mode: ResolveMode) {
        for entry in &self.manifest.resources {
            let (object, state) = self.loader.resolve(entry.id, mode);
            debug!(id = %entry.id, ?state, "requested");
            self.requests.push(Request {
                id: entry.id,
                name: entry.name.clone(),
                kind: entry.kind.clone(),
                state,
                object,
            });
        }
    }

    /// Drains the loader and refreshes every unsettled request.
    pub fn tick(&mut self) -> FrameReport {
        let loads = self.loader.drain();
        for request in self.requests.iter_mut().filter(|r| !r.state.is_terminal()) {
            let (object, state) = self.loader.resolve(request.id, ResolveMode::Deferred);
            request.object = object;
            request.state = state;
        }
        self.frame += 1;
        let report = FrameReport {
            frame: self.frame,
            loads,
            unsettled: self.unsettled(),
        };
        debug!(?report, "frame");
        report
    }

    /// Ticks at `frame_hz` until settled or `max_frames` have run in total.
    pub async fn run_until_settled(&mut self, frame_hz: u32, max_frames: u32) {
        let dt = Duration::from_secs_f32(1.0 / frame_hz.max(1) as f32);
        let mut next = Instant::now();

        while !self.is_settled() && self.frame < max_frames {
            next += dt;
            self.tick();
            tokio::time::sleep_until(next).await;
        }
    }

    /// Every request is `Ready` or `Failed` (or `Invalid`, which never
    /// changes on its own).
    pub fn is_settled(&self) -> bool {
        self.unsettled() == 0
    }

    fn unsettled(&self) -> usize {
        self.requests
            .iter()
            .filter(|r| r.state.in_flight())
            .count()
    }

    pub fn requests(&self) -> &[Request] {
        &self.requests
    }

    pub fn failed(&self) -> impl Iterator<Item = &Request> {
        self.requests
            .iter()
            .filter(|r| matches!(r.state, ResourceState::Failed | ResourceState::Invalid))
    }

    pub fn frame(&self) -> u32 {
        self.frame
    }

    pub fn loader(&self) -> &ResourceLoader {
        &self.loader
    }

    pub fn stats(&self) -> LoaderStats {
        self.loader.stats()
    }

    /// One line per request, failures with their reason.
    pub fn status_lines(&self) -> Vec<String> {
        self.requests
            .iter()
            .map(|r| {
                let name = r.name.as_deref().unwrap_or("-");
                let mut line = format!("{:>6}  {:<16} {:<24} {:?}", r.id.to_string(), r.kind, name, r.state);
                if let Some(failure) = self.loader.failure(r.id) {
                    line.push_str(&format!("  ({})", failure));
                }
                line
            })
            .collect()
    }
}
