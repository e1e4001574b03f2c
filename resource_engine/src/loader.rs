//! The resource loader.
//!
//! Maps ids to entries `{weak cached object, build data, kind, state}`, owns
//! the builder table and the deferred-load queue, and is the only place ids
//! are turned into live objects.
//!
//! Resolution runs in two phases:
//! - construct: build an empty object, record it, construct every dependency,
//!   then let the object wire its handles with `Deferred` resolution. No load
//!   ever happens here, which is what lets mutually-referencing graphs exist.
//! - load: load every dependency first (fail fast), then the object itself.
//!
//! Everything is single-threaded and re-entrant through `&self`: resources
//! call back into the loader while wiring and loading, so no `RefCell`
//! borrow is ever held across a call into resource code.

use std::{
    cell::{Cell, RefCell},
    collections::{HashMap, HashSet, VecDeque},
    rc::{Rc, Weak},
};

use anyhow::bail;
use tracing::{debug, error, warn};

use crate::{
    builder::BuilderTable,
    data::{BuildData, ResourceKind},
    error::ResourceError,
    id::ResourceId,
    resource::Resource,
    state::{ResolveMode, ResourceState},
};

/// Result of a resolution: the object (if any) and the state it is in.
pub type Resolution = (Option<Rc<dyn Resource>>, ResourceState);

/// Running counters, mostly for diagnostics and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoaderStats {
    /// Objects built by a builder.
    pub constructed: u64,
    /// Successful `load` calls.
    pub loaded: u64,
    /// Entries that transitioned to `Failed`.
    pub failed: u64,
}

struct ResourceEntry {
    kind: Option<ResourceKind>,
    data: Option<Rc<BuildData>>,
    cached: Option<Weak<dyn Resource>>,
    state: ResourceState,
    failure: Option<ResourceError>,
}

impl ResourceEntry {
    fn registered(kind: ResourceKind, data: BuildData) -> Self {
        Self {
            kind: Some(kind),
            data: Some(Rc::new(data)),
            cached: None,
            state: ResourceState::NotRequested,
            failure: None,
        }
    }

    fn ready(object: &Rc<dyn Resource>) -> Self {
        Self {
            kind: None,
            data: None,
            cached: Some(Rc::downgrade(object)),
            state: ResourceState::Ready,
            failure: None,
        }
    }

    fn live_object(&self) -> Option<Rc<dyn Resource>> {
        self.cached.as_ref()?.upgrade()
    }

    fn holds(&self, object: &Rc<dyn Resource>) -> bool {
        self.live_object()
            .is_some_and(|live| Rc::ptr_eq(&live, object))
    }
}

/// A queued load. Keeps the constructed object alive until drained.
struct PendingLoad {
    id: ResourceId,
    object: Rc<dyn Resource>,
}

/// The registry. Create one at startup and pass it by reference to every
/// subsystem that resolves resources.
#[derive(Default)]
pub struct ResourceLoader {
    builders: RefCell<BuilderTable>,
    entries: RefCell<HashMap<ResourceId, ResourceEntry>>,
    queue: RefCell<VecDeque<PendingLoad>>,
    queued: RefCell<HashSet<ResourceId>>,
    /// Ids whose load is in flight, outermost first.
    load_stack: RefCell<Vec<ResourceId>>,
    /// Cycle roots still loading, with the ids that finished loading while
    /// relying on the root's optimistic success.
    provisional: RefCell<HashMap<ResourceId, Vec<ResourceId>>>,
    constructing: Cell<usize>,
    stats: Cell<LoaderStats>,
}

impl ResourceLoader {
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Registers the constructor for `kind`. Returns `true` if it replaced a
    /// previous one.
    pub fn register_builder<T, F>(&self, kind: impl Into<ResourceKind>, build: F) -> bool
    where
        T: Resource,
        F: Fn(&BuildData) -> anyhow::Result<T> + 'static,
    {
        self.builders.borrow_mut().register(kind.into(), build)
    }

    /// Inserts or replaces the entry for `id` in state `NotRequested`.
    ///
    /// Any cached object is forgotten, so the next resolution builds a fresh
    /// one from `data`. Whether `kind` has a builder is only checked at
    /// construction time.
    pub fn register(
        &self,
        id: ResourceId,
        kind: impl Into<ResourceKind>,
        data: BuildData,
    ) -> anyhow::Result<()> {
        if id.is_none() {
            bail!("resource id 0 is reserved");
        }
        let kind = kind.into();
        debug!(%id, %kind, "register");
        let replaced = self
            .entries
            .borrow_mut()
            .insert(id, ResourceEntry::registered(kind, data));
        if replaced.is_some() {
            self.forget_pending(id);
        }
        Ok(())
    }

    /// Registers a host-constructed object as `Ready`.
    ///
    /// The loader only keeps a weak reference; the caller must hold `object`
    /// for as long as it should stay resolvable.
    pub fn insert_ready<T: Resource>(&self, id: ResourceId, object: &Rc<T>) -> anyhow::Result<()> {
        if id.is_none() {
            bail!("resource id 0 is reserved");
        }
        let object: Rc<dyn Resource> = object.clone();
        debug!(%id, "insert ready");
        let replaced = self
            .entries
            .borrow_mut()
            .insert(id, ResourceEntry::ready(&object));
        if replaced.is_some() {
            self.forget_pending(id);
        }
        Ok(())
    }

    /// Drops the entry for `id`. Live objects stay alive with their owners.
    pub fn remove(&self, id: ResourceId) -> bool {
        let removed = self.entries.borrow_mut().remove(&id).is_some();
        if removed {
            debug!(%id, "removed");
            self.forget_pending(id);
        }
        removed
    }

    // =========================================================================
    // Resolution
    // =========================================================================

    /// Turns `id` into an object.
    ///
    /// - `0` or unregistered: `(None, Invalid)`.
    /// - `Failed`: `(None, Failed)`, without retrying.
    /// - live cached object: returned as-is with its current state.
    /// - otherwise constructed; `Immediate` then loads it now and reports the
    ///   post-load state, `Deferred` queues the load and reports `InProgress`.
    pub fn resolve(&self, id: ResourceId, mode: ResolveMode) -> Resolution {
        if id.is_none() {
            return (None, ResourceState::Invalid);
        }

        let (state, live) = match self.entries.borrow().get(&id) {
            None => {
                debug!(%id, "resolve: not registered");
                return (None, ResourceState::Invalid);
            }
            Some(entry) if entry.state == ResourceState::Failed => {
                return (None, ResourceState::Failed);
            }
            Some(entry) => (entry.state, entry.live_object()),
        };

        if let Some(object) = live {
            if state == ResourceState::InProgress {
                match mode {
                    ResolveMode::Immediate => return self.finish_now(id, object),
                    // Wiring must stay pointer-only; the dependent's load
                    // takes care of its dependencies.
                    ResolveMode::Deferred if self.constructing.get() == 0 => {
                        self.enqueue(id, &object)
                    }
                    ResolveMode::Deferred => {}
                }
            }
            return (Some(object), state);
        }

        let Some(object) = self.construct(id) else {
            return (None, self.unresolved_state(id));
        };

        match mode {
            ResolveMode::Immediate => self.finish_now(id, object),
            ResolveMode::Deferred => {
                self.enqueue(id, &object);
                (Some(object), ResourceState::InProgress)
            }
        }
    }

    /// Builds the object for `id` (if not already alive) and wires its
    /// dependencies, without loading anything.
    ///
    /// Returns `None` for `0`, unregistered or failed ids, and when the kind
    /// cannot be built.
    pub fn construct(&self, id: ResourceId) -> Option<Rc<dyn Resource>> {
        if id.is_none() {
            return None;
        }

        let (kind, data) = {
            let entries = self.entries.borrow();
            let Some(entry) = entries.get(&id) else {
                debug!(%id, "construct: not registered");
                return None;
            };
            if entry.state == ResourceState::Failed {
                return None;
            }
            if let Some(object) = entry.live_object() {
                return Some(object);
            }
            match (&entry.kind, &entry.data) {
                (Some(kind), Some(data)) => (kind.clone(), data.clone()),
                _ => {
                    debug!(%id, "construct: host-supplied resource was dropped");
                    return None;
                }
            }
        };

        let build = self.builders.borrow().get(&kind);
        let Some(build) = build else {
            let failure = ResourceError::MissingBuilder { id, kind };
            error!(%id, error = %failure, "configuration error");
            self.fail(id, None, failure);
            return None;
        };

        let object = match build(&*data) {
            Ok(object) => object,
            Err(e) => {
                let failure = ResourceError::MalformedBuildData {
                    id,
                    kind,
                    reason: format!("{e:#}"),
                };
                error!(%id, error = %failure, "configuration error");
                self.fail(id, None, failure);
                return None;
            }
        };

        if let Some(entry) = self.entries.borrow_mut().get_mut(&id) {
            entry.cached = Some(Rc::downgrade(&object));
            entry.state = ResourceState::InProgress;
            entry.failure = None;
        }
        self.bump(|stats| stats.constructed += 1);
        debug!(%id, %kind, "constructed");

        self.constructing.set(self.constructing.get() + 1);
        // Held until wiring is done so the handles find them alive.
        let _dependencies: Vec<Rc<dyn Resource>> = object
            .dependencies()
            .into_iter()
            .filter_map(|dependency| self.construct(dependency))
            .collect();
        object.wire_dependencies(self, ResolveMode::Deferred);
        self.constructing.set(self.constructing.get() - 1);

        Some(object)
    }

    /// Loads `id` and everything it depends on, synchronously.
    ///
    /// `0` trivially succeeds. A dependency failure marks `id` failed without
    /// running its own load.
    ///
    /// Re-entering the load of an id already in flight (a dependency cycle)
    /// reports success so the outer load can finish. Whatever loads on the
    /// strength of that answer is marked failed if the outer load fails.
    pub fn load(&self, id: ResourceId) -> bool {
        if id.is_none() {
            return true;
        }
        let Some(object) = self.construct(id) else {
            return false;
        };

        match self.state(id) {
            ResourceState::InProgress => {}
            ResourceState::Ready => return true,
            _ => return false,
        }

        if self.load_stack.borrow().contains(&id) {
            debug!(%id, "load cycle; finishing from the outer load");
            self.provisional.borrow_mut().entry(id).or_default();
            return true;
        }

        self.load_stack.borrow_mut().push(id);
        let loaded = self.load_constructed(id, &object);
        self.load_stack.borrow_mut().pop();

        let dependents = self.provisional.borrow_mut().remove(&id).unwrap_or_default();
        if loaded {
            let dependencies = object.dependencies();
            self.record_provisional(id, &dependencies, dependents);
        } else {
            self.fail_provisional(id, dependents);
        }
        loaded
    }

    /// `id` loaded. If any of its dependencies is an open cycle root, or
    /// relied on one, `id` and everything that relied on `id` stand or fall
    /// with that root.
    fn record_provisional(
        &self,
        id: ResourceId,
        dependencies: &[ResourceId],
        dependents: Vec<ResourceId>,
    ) {
        for (root, relying) in self.provisional.borrow_mut().iter_mut() {
            if dependencies
                .iter()
                .any(|dependency| dependency == root || relying.contains(dependency))
            {
                relying.push(id);
                relying.extend_from_slice(&dependents);
            }
        }
    }

    /// The cycle root `root` failed; undo the loads that assumed otherwise.
    fn fail_provisional(&self, root: ResourceId, dependents: Vec<ResourceId>) {
        for id in dependents {
            if self.state(id) != ResourceState::Ready {
                continue;
            }
            warn!(%id, dependency = %root, "cycle dependency failed after load");
            self.fail(id, None, ResourceError::Dependency { id, dependency: root });
        }
    }

    fn load_constructed(&self, id: ResourceId, object: &Rc<dyn Resource>) -> bool {
        for dependency in object.dependencies() {
            if !self.load(dependency) {
                let failure = ResourceError::Dependency { id, dependency };
                warn!(%id, %dependency, "dependency failed; skipping load");
                self.fail(id, Some(object), failure);
                return false;
            }
        }

        let data = {
            let entries = self.entries.borrow();
            match entries.get(&id) {
                Some(entry) if entry.holds(object) => entry.data.clone(),
                _ => {
                    debug!(%id, "entry replaced while loading dependencies");
                    return false;
                }
            }
        };
        let data = data.unwrap_or_default();

        match object.load(&data, self) {
            Ok(()) => {
                if let Some(entry) = self.entries.borrow_mut().get_mut(&id) {
                    if entry.holds(object) {
                        entry.state = ResourceState::Ready;
                    }
                }
                self.bump(|stats| stats.loaded += 1);
                debug!(%id, "loaded");
                true
            }
            Err(e) => {
                let failure = ResourceError::Load {
                    id,
                    reason: format!("{e:#}"),
                };
                warn!(%id, error = %failure, "load failed");
                self.fail(id, Some(object), failure);
                false
            }
        }
    }

    /// Loads every queued id, including ids queued while draining.
    ///
    /// Returns the number of loads performed. Call once per frame.
    pub fn drain(&self) -> usize {
        let mut loads = 0;
        loop {
            let batch: Vec<PendingLoad> = self.queue.borrow_mut().drain(..).collect();
            if batch.is_empty() {
                break;
            }
            for pending in batch {
                self.queued.borrow_mut().remove(&pending.id);
                if !self.is_current(pending.id, &pending.object) {
                    debug!(id = %pending.id, "drain: skipping stale object");
                    continue;
                }
                self.load(pending.id);
                loads += 1;
            }
        }
        loads
    }

    // =========================================================================
    // Introspection
    // =========================================================================

    /// Registry state of `id`; `Invalid` for `0` or unregistered ids.
    pub fn state(&self, id: ResourceId) -> ResourceState {
        if id.is_none() {
            return ResourceState::Invalid;
        }
        self.entries
            .borrow()
            .get(&id)
            .map(|entry| entry.state)
            .unwrap_or(ResourceState::Invalid)
    }

    /// Why `id` failed, if it did.
    pub fn failure(&self, id: ResourceId) -> Option<ResourceError> {
        self.entries
            .borrow()
            .get(&id)
            .and_then(|entry| entry.failure.clone())
    }

    /// Kind tag `id` was registered with. `None` for host-supplied objects.
    pub fn kind(&self, id: ResourceId) -> Option<ResourceKind> {
        self.entries
            .borrow()
            .get(&id)
            .and_then(|entry| entry.kind.clone())
    }

    pub fn contains(&self, id: ResourceId) -> bool {
        self.entries.borrow().contains_key(&id)
    }

    /// Whether someone still holds the object last built for `id`.
    pub fn is_alive(&self, id: ResourceId) -> bool {
        self.entries
            .borrow()
            .get(&id)
            .is_some_and(|entry| entry.live_object().is_some())
    }

    /// Registered ids, sorted.
    pub fn ids(&self) -> Vec<ResourceId> {
        let mut ids: Vec<ResourceId> = self.entries.borrow().keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// Number of loads waiting for the next `drain()`.
    pub fn pending(&self) -> usize {
        self.queue.borrow().len()
    }

    pub fn stats(&self) -> LoaderStats {
        self.stats.get()
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn finish_now(&self, id: ResourceId, object: Rc<dyn Resource>) -> Resolution {
        self.load(id);
        match self.state(id) {
            ResourceState::Failed => (None, ResourceState::Failed),
            ResourceState::Invalid => (None, ResourceState::Invalid),
            state => (Some(object), state),
        }
    }

    fn unresolved_state(&self, id: ResourceId) -> ResourceState {
        match self.state(id) {
            ResourceState::Failed => ResourceState::Failed,
            _ => ResourceState::Invalid,
        }
    }

    fn enqueue(&self, id: ResourceId, object: &Rc<dyn Resource>) {
        if !self.queued.borrow_mut().insert(id) {
            return;
        }
        debug!(%id, "queued for deferred load");
        self.queue.borrow_mut().push_back(PendingLoad {
            id,
            object: object.clone(),
        });
    }

    fn forget_pending(&self, id: ResourceId) {
        if self.queued.borrow_mut().remove(&id) {
            let stale: VecDeque<PendingLoad> = {
                let mut queue = self.queue.borrow_mut();
                let (stale, keep): (VecDeque<PendingLoad>, VecDeque<PendingLoad>) =
                    queue.drain(..).partition(|pending| pending.id == id);
                *queue = keep;
                stale
            };
            // Dropped outside the borrow; releasing the object may release
            // others.
            drop(stale);
        }
    }

    fn is_current(&self, id: ResourceId, object: &Rc<dyn Resource>) -> bool {
        self.entries
            .borrow()
            .get(&id)
            .is_some_and(|entry| entry.holds(object))
    }

    /// Marks `id` failed. When `object` is given, only if the entry still
    /// refers to it.
    fn fail(&self, id: ResourceId, object: Option<&Rc<dyn Resource>>, failure: ResourceError) {
        let mut entries = self.entries.borrow_mut();
        let Some(entry) = entries.get_mut(&id) else {
            return;
        };
        if object.is_some_and(|object| !entry.holds(object)) {
            return;
        }
        entry.state = ResourceState::Failed;
        entry.failure = Some(failure);
        drop(entries);
        self.bump(|stats| stats.failed += 1);
    }

    fn bump(&self, update: impl FnOnce(&mut LoaderStats)) {
        let mut stats = self.stats.get();
        update(&mut stats);
        self.stats.set(stats);
    }
}
