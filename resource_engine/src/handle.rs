//! Typed lazy handles.
//!
//! A `Handle<T>` is what consumers hold: either a direct object, or an id plus
//! the last object/state it resolved to. Once the cached state is terminal
//! (`Ready` or `Failed`) resolving is O(1) and never touches the loader
//! again, so it is cheap to resolve every frame.
//!
//! Handles serialize as their bare id, so build-data parameter structs can
//! declare `Handle<T>` fields directly.

use std::{cell::RefCell, fmt, rc::Rc};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::warn;

use crate::{
    id::ResourceId,
    loader::ResourceLoader,
    resource::{downcast_resource, Resource},
    state::{ResolveMode, ResourceState},
};

struct HandleCache<T> {
    object: Option<Rc<T>>,
    state: ResourceState,
}

/// Typed, lazily resolved reference to a resource.
pub struct Handle<T: Resource> {
    id: ResourceId,
    cache: RefCell<HandleCache<T>>,
}

impl<T: Resource> Handle<T> {
    /// Handle that resolves `id` on first use.
    pub fn from_id(id: ResourceId) -> Self {
        Self::with_cache(id, None, ResourceState::NotRequested)
    }

    /// Handle to an object that is already usable.
    pub fn from_object(object: Rc<T>) -> Self {
        Self::with_cache(ResourceId::NONE, Some(object), ResourceState::Ready)
    }

    /// `Ready` for `Some`, `Invalid` for `None`.
    pub fn from_optional(object: Option<Rc<T>>) -> Self {
        match object {
            Some(object) => Self::from_object(object),
            None => Self::with_cache(ResourceId::NONE, None, ResourceState::Invalid),
        }
    }

    /// Handle to nothing.
    pub fn none() -> Self {
        Self::from_id(ResourceId::NONE)
    }

    fn with_cache(id: ResourceId, object: Option<Rc<T>>, state: ResourceState) -> Self {
        Self {
            id,
            cache: RefCell::new(HandleCache { object, state }),
        }
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    /// Cached state, without asking the loader.
    pub fn state(&self) -> ResourceState {
        self.cache.borrow().state
    }

    /// Cached object, without asking the loader. May not be loaded yet.
    pub fn peek(&self) -> Option<Rc<T>> {
        self.cache.borrow().object.clone()
    }

    pub fn is_ready(&self) -> bool {
        self.state() == ResourceState::Ready
    }

    /// Resolves through `loader` unless the cached state is `Ready` or
    /// `Failed`.
    ///
    /// `Invalid` is asked again every time, so a handle resolved before its
    /// id was registered picks the registration up later.
    ///
    /// A `Deferred` resolution may hand back an object that is still
    /// `InProgress`; check the state before reading loaded data.
    pub fn resolve(&self, loader: &ResourceLoader, mode: ResolveMode) -> (Option<Rc<T>>, ResourceState) {
        {
            let cache = self.cache.borrow();
            if cache.state.is_terminal() {
                return (cache.object.clone(), cache.state);
            }
        }

        let (object, state) = loader.resolve(self.id, mode);
        let (object, state) = match object {
            Some(object) => match downcast_resource::<T>(object) {
                Some(object) => (Some(object), state),
                None => {
                    warn!(
                        id = %self.id,
                        expected = std::any::type_name::<T>(),
                        "resource is not of the handle's type"
                    );
                    (None, ResourceState::Failed)
                }
            },
            None => (None, state),
        };

        let mut cache = self.cache.borrow_mut();
        cache.object = object.clone();
        cache.state = state;
        (object, state)
    }

    /// The object, only once it is `Ready`.
    pub fn get(&self, loader: &ResourceLoader, mode: ResolveMode) -> Option<Rc<T>> {
        match self.resolve(loader, mode) {
            (Some(object), ResourceState::Ready) => Some(object),
            _ => None,
        }
    }

    /// Forgets the cached result so the next resolve asks the loader again,
    /// e.g. after a `Ready` or `Failed` id was registered anew.
    pub fn reset(&self) {
        if self.id.is_some() {
            let mut cache = self.cache.borrow_mut();
            cache.object = None;
            cache.state = ResourceState::NotRequested;
        }
    }
}

impl<T: Resource> Default for Handle<T> {
    fn default() -> Self {
        Self::none()
    }
}

impl<T: Resource> Clone for Handle<T> {
    fn clone(&self) -> Self {
        let cache = self.cache.borrow();
        Self::with_cache(self.id, cache.object.clone(), cache.state)
    }
}

impl<T: Resource> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("id", &self.id)
            .field("state", &self.state())
            .finish()
    }
}

impl<T: Resource> From<ResourceId> for Handle<T> {
    fn from(id: ResourceId) -> Self {
        Self::from_id(id)
    }
}

impl<T: Resource> From<&Handle<T>> for ResourceId {
    fn from(handle: &Handle<T>) -> Self {
        handle.id
    }
}

impl<T: Resource> From<Handle<T>> for ResourceId {
    fn from(handle: Handle<T>) -> Self {
        handle.id
    }
}

impl<T: Resource> Serialize for Handle<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.id.serialize(serializer)
    }
}

impl<'de, T: Resource> Deserialize<'de> for Handle<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        ResourceId::deserialize(deserializer).map(Self::from_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{BuildData, ResourceKind};
    use std::cell::Cell;

    struct Counted {
        loads: Rc<Cell<u32>>,
    }

    impl Resource for Counted {
        fn load(&self, _data: &BuildData, _loader: &ResourceLoader) -> anyhow::Result<()> {
            self.loads.set(self.loads.get() + 1);
            Ok(())
        }
    }

    struct Unrelated;

    impl Resource for Unrelated {
        fn load(&self, _data: &BuildData, _loader: &ResourceLoader) -> anyhow::Result<()> {
            Ok(())
        }
    }

    const COUNTED: ResourceKind = ResourceKind::from_static("counted");

    fn loader_with_counter() -> (ResourceLoader, Rc<Cell<u32>>) {
        let loads = Rc::new(Cell::new(0));
        let loader = ResourceLoader::new();
        let shared = loads.clone();
        loader.register_builder(COUNTED, move |_| {
            Ok(Counted {
                loads: shared.clone(),
            })
        });
        (loader, loads)
    }

    #[test]
    fn direct_objects_never_touch_the_loader() {
        let loader = ResourceLoader::new();
        let handle = Handle::from_object(Rc::new(Unrelated));
        let (object, state) = handle.resolve(&loader, ResolveMode::Immediate);
        assert!(object.is_some());
        assert_eq!(state, ResourceState::Ready);

        let empty: Handle<Unrelated> = Handle::from_optional(None);
        assert_eq!(empty.resolve(&loader, ResolveMode::Immediate).1, ResourceState::Invalid);
    }

    #[test]
    fn ready_handle_stops_querying() {
        let (loader, loads) = loader_with_counter();
        loader.register(ResourceId(1), COUNTED, BuildData::empty()).unwrap();
        let handle: Handle<Counted> = Handle::from_id(ResourceId(1));

        let first = handle.get(&loader, ResolveMode::Immediate).unwrap();
        // Even with the entry gone the cached object is still handed out.
        loader.remove(ResourceId(1));
        let second = handle.get(&loader, ResolveMode::Immediate).unwrap();
        assert!(Rc::ptr_eq(&first, &second));
        assert_eq!(loads.get(), 1);
    }

    #[test]
    fn deferred_handle_becomes_ready_after_drain() {
        let (loader, loads) = loader_with_counter();
        loader.register(ResourceId(1), COUNTED, BuildData::empty()).unwrap();
        let handle: Handle<Counted> = Handle::from_id(ResourceId(1));

        let (object, state) = handle.resolve(&loader, ResolveMode::Deferred);
        assert!(object.is_some());
        assert_eq!(state, ResourceState::InProgress);
        assert!(handle.get(&loader, ResolveMode::Deferred).is_none());

        loader.drain();
        assert!(handle.get(&loader, ResolveMode::Deferred).is_some());
        assert_eq!(loads.get(), 1);
    }

    #[test]
    fn type_mismatch_fails_the_handle() {
        let (loader, _loads) = loader_with_counter();
        loader.register(ResourceId(1), COUNTED, BuildData::empty()).unwrap();
        let handle: Handle<Unrelated> = Handle::from_id(ResourceId(1));

        let (object, state) = handle.resolve(&loader, ResolveMode::Immediate);
        assert!(object.is_none());
        assert_eq!(state, ResourceState::Failed);
        // The registry entry itself is fine.
        assert_eq!(loader.state(ResourceId(1)), ResourceState::Ready);
    }

    #[test]
    fn converts_to_and_from_ids() {
        let handle: Handle<Unrelated> = ResourceId(12).into();
        assert_eq!(ResourceId::from(&handle), ResourceId(12));
        assert_eq!(serde_json::to_string(&handle).unwrap(), "12");
        let back: Handle<Unrelated> = serde_json::from_str("12").unwrap();
        assert_eq!(back.id(), ResourceId(12));
        assert_eq!(back.state(), ResourceState::NotRequested);
    }

    #[test]
    fn invalid_handle_picks_up_later_registration() {
        let (loader, loads) = loader_with_counter();
        let handle: Handle<Counted> = Handle::from_id(ResourceId(4));
        assert_eq!(handle.resolve(&loader, ResolveMode::Immediate).1, ResourceState::Invalid);
        assert_eq!(handle.state(), ResourceState::Invalid);

        loader.register(ResourceId(4), COUNTED, BuildData::empty()).unwrap();
        let (object, state) = handle.resolve(&loader, ResolveMode::Immediate);
        assert!(object.is_some());
        assert_eq!(state, ResourceState::Ready);
        assert_eq!(loads.get(), 1);
    }

    #[test]
    fn reset_requeries_after_reregistration() {
        let (loader, loads) = loader_with_counter();
        loader.register(ResourceId(1), COUNTED, BuildData::empty()).unwrap();
        let handle: Handle<Counted> = Handle::from_id(ResourceId(1));
        let first = handle.get(&loader, ResolveMode::Immediate).unwrap();

        loader.register(ResourceId(1), COUNTED, BuildData::empty()).unwrap();
        handle.reset();
        let second = handle.get(&loader, ResolveMode::Immediate).unwrap();
        assert!(!Rc::ptr_eq(&first, &second));
        assert_eq!(loads.get(), 2);
    }
}
