use fnv::FnvHashMap;
use parking_lot::Mutex;
use std::fmt::{self, Debug, Formatter};
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::sync::Arc;

/// A dense monotonic identifier for an entity of type `T`, stable across the transport
/// boundary. Routing inbound callbacks through an `Id` instead of a captured reference
/// keeps raw pointers from crossing the boundary.
pub struct Id<T> {
    value: usize,
    marker: PhantomData<fn() -> T>,
}

impl<T> Id<T> {
    pub(crate) fn new(value: usize) -> Self {
        Self {
            value,
            marker: PhantomData,
        }
    }

    /// The raw identifier value.
    pub fn value(&self) -> usize {
        self.value
    }
}

// Manual impls: the derived ones would require `T` bounds that `Id` does not need.
impl<T> Copy for Id<T> {}

impl<T> Clone for Id<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> PartialEq for Id<T> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl<T> Eq for Id<T> {}

impl<T> PartialOrd for Id<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Id<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.value.cmp(&other.value)
    }
}

impl<T> Hash for Id<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value.hash(state);
    }
}

impl<T> Debug for Id<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Id({})", self.value)
    }
}

#[derive(Debug)]
struct RegistryInner<T> {
    next_id: usize,
    by_id: FnvHashMap<usize, Arc<T>>,
    ids_by_identity: FnvHashMap<usize, usize>,
}

/// A typed table mapping a dense monotonic [`Id<T>`] to a live strong reference.
///
/// Registration is idempotent by identity: registering the same `Arc` twice returns
/// the same id. [`EntityRegistry::lookup`] hands out a strong reference that outlives
/// the lookup. All operations take one internal lock.
#[derive(Debug)]
pub struct EntityRegistry<T> {
    inner: Mutex<RegistryInner<T>>,
}

impl<T> Default for EntityRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> EntityRegistry<T> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(RegistryInner {
                next_id: 0,
                by_id: FnvHashMap::default(),
                ids_by_identity: FnvHashMap::default(),
            }),
        }
    }

    fn identity(entity: &Arc<T>) -> usize {
        Arc::as_ptr(entity) as usize
    }

    /// Register an entity, returning its id. Idempotent by identity.
    pub fn register(&self, entity: &Arc<T>) -> Id<T> {
        let identity = Self::identity(entity);
        let mut inner = self.inner.lock();

        if let Some(&existing) = inner.ids_by_identity.get(&identity) {
            return Id::new(existing);
        }

        let id = inner.next_id;
        inner.next_id += 1;
        inner.by_id.insert(id, Arc::clone(entity));
        inner.ids_by_identity.insert(identity, id);

        Id::new(id)
    }

    /// Look up an entity by id, returning a strong reference.
    pub fn lookup(&self, id: Id<T>) -> Option<Arc<T>> {
        self.inner.lock().by_id.get(&id.value).cloned()
    }

    /// The id of a registered entity, if any.
    pub fn id_of(&self, entity: &Arc<T>) -> Option<Id<T>> {
        self.inner
            .lock()
            .ids_by_identity
            .get(&Self::identity(entity))
            .map(|&value| Id::new(value))
    }

    /// Unregister by id. Returns whether an entity was removed.
    pub fn unregister(&self, id: Id<T>) -> bool {
        let mut inner = self.inner.lock();

        match inner.by_id.remove(&id.value) {
            Some(removed) => {
                let identity = Self::identity(&removed);
                inner.ids_by_identity.remove(&identity);
                true
            }
            None => false,
        }
    }

    /// Unregister by identity. Returns whether the entity was registered.
    pub fn unregister_entity(&self, entity: &Arc<T>) -> bool {
        let identity = Self::identity(entity);
        let mut inner = self.inner.lock();

        match inner.ids_by_identity.remove(&identity) {
            Some(id) => {
                inner.by_id.remove(&id);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, id: Id<T>) -> bool {
        self.inner.lock().by_id.contains_key(&id.value)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().by_id.is_empty()
    }

    /// Strong references to every registered entity, in registration order.
    pub fn snapshot(&self) -> Vec<Arc<T>> {
        let inner = self.inner.lock();

        let mut entries = inner
            .by_id
            .iter()
            .map(|(&id, entity)| (id, Arc::clone(entity)))
            .collect::<Vec<_>>();
        entries.sort_by_key(|(id, _)| *id);

        entries.into_iter().map(|(_, entity)| entity).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_is_idempotent_by_identity() {
        let registry = EntityRegistry::new();
        let entity = Arc::new("entity".to_string());

        let first = registry.register(&entity);
        let second = registry.register(&entity);
        assert_eq!(first, second);
        assert_eq!(registry.len(), 1);

        // A distinct entity with equal contents gets a fresh id.
        let other = Arc::new("entity".to_string());
        let third = registry.register(&other);
        assert_ne!(first, third);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_ids_are_dense_and_monotonic() {
        let registry = EntityRegistry::new();

        let first = registry.register(&Arc::new(1));
        let second = registry.register(&Arc::new(2));
        let third = registry.register(&Arc::new(3));

        assert_eq!(first.value() + 1, second.value());
        assert_eq!(second.value() + 1, third.value());
    }

    #[test]
    fn test_lookup_returns_strong_reference() {
        let registry = EntityRegistry::new();
        let entity = Arc::new("entity".to_string());
        let id = registry.register(&entity);

        let looked_up = registry.lookup(id).unwrap();
        drop(entity);

        // The registry and the lookup result both keep the entity alive.
        assert_eq!(*looked_up, "entity");
        assert!(registry.contains(id));
    }

    #[test]
    fn test_unregister() {
        let registry = EntityRegistry::new();
        let entity = Arc::new("entity".to_string());
        let id = registry.register(&entity);

        assert!(registry.unregister(id));
        assert!(!registry.unregister(id));
        assert!(registry.lookup(id).is_none());
        assert!(!registry.unregister_entity(&entity));
    }
}
