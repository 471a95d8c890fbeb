//! Body-keyed controller registry
//!
//! Answers "which controller owns this body" in O(log n) without scanning
//! controllers. Owned by [`super::SimState`] and passed to whoever needs it.

use std::collections::BTreeMap;

use super::world::BodyId;
use crate::error::WorldError;

/// Keyed table `BodyId -> T`, iterated in id order
#[derive(Debug, Clone)]
pub struct Registry<T> {
    entries: BTreeMap<BodyId, T>,
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }
}

impl<T> Registry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a controller; a body can own only one
    pub fn add(&mut self, body: BodyId, controller: T) -> Result<(), WorldError> {
        if self.entries.contains_key(&body) {
            return Err(WorldError::AlreadyRegistered(body));
        }
        self.entries.insert(body, controller);
        Ok(())
    }

    /// Unregister, handing the controller back
    pub fn remove(&mut self, body: BodyId) -> Option<T> {
        self.entries.remove(&body)
    }

    #[inline]
    pub fn find(&self, body: BodyId) -> Option<&T> {
        self.entries.get(&body)
    }

    #[inline]
    pub fn find_mut(&mut self, body: BodyId) -> Option<&mut T> {
        self.entries.get_mut(&body)
    }

    #[inline]
    pub fn contains(&self, body: BodyId) -> bool {
        self.entries.contains_key(&body)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (BodyId, &T)> {
        self.entries.iter().map(|(&id, c)| (id, c))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (BodyId, &mut T)> {
        self.entries.iter_mut().map(|(&id, c)| (id, c))
    }
}
