///
/// Handle registry.
///
/// Engine objects are stored by the numeric id handed out as their handle.
/// Ids come from one counter shared by every registry of an engine, so a
/// session, a statement and a LOB transfer never share an id and
/// diagnostics can be looked up by handle alone. Id 0 is never issued.
///

use std::collections::HashMap;

#[derive(Debug)]
pub struct IdSource {
    next_id: u64,
}

impl IdSource {
    pub fn new() -> Self {
        Self { next_id: 1 }
    }

    pub fn issue(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

impl Default for IdSource {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
pub struct Registry<T> {
    entries: HashMap<u64, T>,
}

impl<T> Registry<T> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    pub fn insert(&mut self, ids: &mut IdSource, value: T) -> u64 {
        let id = ids.issue();
        self.entries.insert(id, value);
        id
    }

    pub fn get(&self, id: u64) -> Option<&T> {
        self.entries.get(&id)
    }

    pub fn get_mut(&mut self, id: u64) -> Option<&mut T> {
        self.entries.get_mut(&id)
    }

    pub fn remove(&mut self, id: u64) -> Option<T> {
        self.entries.remove(&id)
    }

    pub fn contains(&self, id: u64) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Ids of every entry matching `predicate`.
    pub fn ids_where(&self, predicate: impl Fn(&T) -> bool) -> Vec<u64> {
        self.entries
            .iter()
            .filter(|(_, entry)| predicate(entry))
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.entries.values_mut()
    }
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self::new()
    }
}
