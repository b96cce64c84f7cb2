//! Bus - Type-Safe Host State
//!
//! The Bus carries the host-owned state that gates read: wallet
//! connection, eligibility lookups, warnings, challenge results.
//!
//! # Philosophy
//! > Gates read, hosts write.
//!
//! The flow controller only ever receives `&Bus`. Mutation belongs to the
//! host glue (or the async driver acting on its behalf).

use std::any::{Any, TypeId};
use std::collections::HashMap;

/// Type-safe state container (TypeMap pattern).
///
/// No string keys, no `Any` downcasting at the call site*.
///
/// (*TypeId is used internally, but the API is fully typed)
#[derive(Default)]
pub struct Bus {
    resources: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl Bus {
    /// Create a new empty Bus
    pub fn new() -> Self {
        Bus {
            resources: HashMap::new(),
        }
    }

    /// Builder-style insert.
    pub fn with<T: Send + Sync + 'static>(mut self, resource: T) -> Self {
        self.insert(resource);
        self
    }

    /// Insert a resource into the Bus.
    ///
    /// If a resource of this type already exists, it is replaced.
    pub fn insert<T: Send + Sync + 'static>(&mut self, resource: T) {
        self.resources.insert(TypeId::of::<T>(), Box::new(resource));
    }

    /// Get a reference to a resource.
    ///
    /// Returns `None` if the resource type is not present.
    pub fn get<T: 'static>(&self) -> Option<&T> {
        self.resources
            .get(&TypeId::of::<T>())
            .and_then(|boxed| boxed.downcast_ref())
    }

    /// Get a mutable reference to a resource.
    pub fn get_mut<T: 'static>(&mut self) -> Option<&mut T> {
        self.resources
            .get_mut(&TypeId::of::<T>())
            .and_then(|boxed| boxed.downcast_mut())
    }

    /// Get a mutable reference, inserting the default first if absent.
    pub fn entry<T: Default + Send + Sync + 'static>(&mut self) -> &mut T {
        let slot = self
            .resources
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Box::new(T::default()));
        match slot.downcast_mut::<T>() {
            Some(value) => value,
            // The map is keyed by TypeId, so the slot always holds a T.
            None => unreachable!("bus slot type mismatch"),
        }
    }

    /// Read a resource, falling back to its default when absent.
    pub fn get_or_default<T: Default + Clone + 'static>(&self) -> T {
        self.get::<T>().cloned().unwrap_or_default()
    }

    /// Check if a resource type is present.
    pub fn contains<T: 'static>(&self) -> bool {
        self.resources.contains_key(&TypeId::of::<T>())
    }

    /// Remove a resource from the Bus, returning it if present.
    pub fn remove<T: 'static>(&mut self) -> Option<T> {
        self.resources
            .remove(&TypeId::of::<T>())
            .and_then(|boxed| boxed.downcast().ok())
            .map(|boxed| *boxed)
    }
}

impl std::fmt::Debug for Bus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bus")
            .field("resource_count", &self.resources.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_get() {
        let mut bus = Bus::new();
        bus.insert(42i32);
        bus.insert("hello".to_string());

        assert_eq!(bus.get::<i32>(), Some(&42));
        assert_eq!(bus.get::<String>(), Some(&"hello".to_string()));
        assert_eq!(bus.get::<f64>(), None);
    }

    #[test]
    fn test_entry_inserts_default() {
        let mut bus = Bus::new();
        bus.entry::<Vec<i32>>().push(7);
        bus.entry::<Vec<i32>>().push(8);

        assert_eq!(bus.get::<Vec<i32>>(), Some(&vec![7, 8]));
    }

    #[test]
    fn test_get_or_default() {
        let bus = Bus::new().with(3u8);
        assert_eq!(bus.get_or_default::<u8>(), 3);
        assert_eq!(bus.get_or_default::<u16>(), 0);
    }
}
