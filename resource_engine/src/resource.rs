//! The buildable-resource capability.

use std::{any::Any, rc::Rc};

use crate::{data::BuildData, id::ResourceId, loader::ResourceLoader, state::ResolveMode};

/// Anything the loader can construct and load.
///
/// A freshly built object is empty: its builder has only decoded build data.
/// The loader then asks it for its dependency ids, constructs those, calls
/// [`Resource::wire_dependencies`] so it can resolve its handles, and later
/// calls [`Resource::load`] once every dependency has loaded.
///
/// Objects are shared through `Rc`, so every method takes `&self`; state that
/// changes after construction lives behind cells (handles already do this).
pub trait Resource: AsAnyRc {
    /// Ids this resource needs constructed before wiring and loaded before
    /// its own load. Zero ids are ignored.
    fn dependencies(&self) -> Vec<ResourceId> {
        Vec::new()
    }

    /// Resolves dependency handles. The loader always passes
    /// [`ResolveMode::Deferred`] here, so wiring never triggers a load.
    fn wire_dependencies(&self, _loader: &ResourceLoader, _mode: ResolveMode) {}

    /// Performs the expensive work. Dependencies are loaded at this point.
    fn load(&self, data: &BuildData, loader: &ResourceLoader) -> anyhow::Result<()>;
}

/// Upcast for `Rc<dyn Resource>` so handles can downcast to a concrete kind.
pub trait AsAnyRc: Any {
    fn into_any_rc(self: Rc<Self>) -> Rc<dyn Any>;
}

impl<T: Any> AsAnyRc for T {
    fn into_any_rc(self: Rc<Self>) -> Rc<dyn Any> {
        self
    }
}

/// Downcasts a type-erased resource to `T`.
pub fn downcast_resource<T: Resource>(object: Rc<dyn Resource>) -> Option<Rc<T>> {
    object.into_any_rc().downcast::<T>().ok()
}
