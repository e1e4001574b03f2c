//! Builder table: type tag -> constructor.

use std::{collections::HashMap, rc::Rc};

use crate::{
    data::{BuildData, ResourceKind},
    resource::Resource,
};

/// Constructs an empty, unwired resource from its build data.
pub type BuilderFn = Rc<dyn Fn(&BuildData) -> anyhow::Result<Rc<dyn Resource>>>;

/// Maps kinds to constructors. Later registrations replace earlier ones.
#[derive(Default)]
pub struct BuilderTable {
    builders: HashMap<ResourceKind, BuilderFn>,
}

impl BuilderTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a typed constructor for `kind`, returning whether it
    /// replaced an existing one.
    pub fn register<T, F>(&mut self, kind: ResourceKind, build: F) -> bool
    where
        T: Resource,
        F: Fn(&BuildData) -> anyhow::Result<T> + 'static,
    {
        let erased: BuilderFn =
            Rc::new(move |data: &BuildData| -> anyhow::Result<Rc<dyn Resource>> {
                Ok(Rc::new(build(data)?))
            });
        self.builders.insert(kind, erased).is_some()
    }

    /// Cloned out so the caller can run it without holding a borrow of the
    /// table.
    pub fn get(&self, kind: &ResourceKind) -> Option<BuilderFn> {
        self.builders.get(kind).cloned()
    }

    pub fn contains(&self, kind: &ResourceKind) -> bool {
        self.builders.contains_key(kind)
    }

    pub fn len(&self) -> usize {
        self.builders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.builders.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::ResourceLoader;

    struct Tagged(u32);

    impl Resource for Tagged {
        fn load(&self, _data: &BuildData, _loader: &ResourceLoader) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn last_registration_wins() {
        let mut table = BuilderTable::new();
        assert!(!table.register(ResourceKind::MESH, |_| Ok(Tagged(1))));
        assert!(table.register(ResourceKind::MESH, |_| Ok(Tagged(2))));
        assert_eq!(table.len(), 1);

        let build = table.get(&ResourceKind::MESH).unwrap();
        let object = build(&BuildData::empty()).unwrap();
        let tagged = crate::resource::downcast_resource::<Tagged>(object).unwrap();
        assert_eq!(tagged.0, 2);
    }

    #[test]
    fn unknown_kind_has_no_builder() {
        let table = BuilderTable::new();
        assert!(table.get(&ResourceKind::FONT).is_none());
        assert!(!table.contains(&ResourceKind::FONT));
    }
}
