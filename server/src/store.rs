//! In-memory table of live sessions with per-record exclusive access
//!
//! The store maps an id to a slot. The map itself is only locked for the
//! instant it takes to look up, insert or unlink a slot; everything that
//! reads or changes a record goes through that record's own async mutex.
//! Operations on different ids therefore never wait on each other, while
//! two operations on the same id are strictly serialized.
//!
//! A slot whose record has been deleted or replaced holds `None`. Anyone
//! who was queued on such a slot sees the tombstone, looks the id up again
//! and either finds the replacement or reports `NotFound`.

use crate::error::StoreError;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Implemented by everything kept in a [`SessionStore`].
pub trait Record {
    /// A retired record is unlinked by the same `mutate` call that retired it.
    fn is_retired(&self) -> bool {
        false
    }
}

type Slot<T> = Arc<Mutex<Option<T>>>;

pub struct SessionStore<T> {
    slots: RwLock<HashMap<String, Slot<T>>>,
}

impl<T: Record> Default for SessionStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Record> SessionStore<T> {
    pub fn new() -> Self {
        Self {
            slots: RwLock::new(HashMap::new()),
        }
    }

    // The map only ever holds `Arc`s and is never left half-updated, so a
    // panic elsewhere cannot corrupt it.
    fn read_slots(&self) -> RwLockReadGuard<'_, HashMap<String, Slot<T>>> {
        self.slots.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_slots(&self) -> RwLockWriteGuard<'_, HashMap<String, Slot<T>>> {
        self.slots.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn slot(&self, id: &str) -> Result<Slot<T>, StoreError> {
        self.read_slots()
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    /// Waits for exclusive access to the live record behind `id`.
    pub(crate) async fn lock_live(&self, id: &str) -> Result<(Slot<T>, OwnedMutexGuard<Option<T>>), StoreError> {
        loop {
            let slot = self.slot(id)?;
            let guard = Arc::clone(&slot).lock_owned().await;
            if guard.is_some() {
                return Ok((slot, guard));
            }
            // Tombstone: the record was deleted or replaced while we queued.
        }
    }

    /// Removes `slot` from the map unless `id` has since been re-created.
    fn unlink(&self, id: &str, slot: &Slot<T>) {
        let mut slots = self.write_slots();
        if slots.get(id).is_some_and(|current| Arc::ptr_eq(current, slot)) {
            slots.remove(id);
        }
    }

    /// Returns a copy of the record, safe to inspect after the call returns.
    pub async fn get(&self, id: &str) -> Result<T, StoreError>
    where
        T: Clone,
    {
        let (_, guard) = self.lock_live(id).await?;
        guard
            .as_ref()
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    /// Runs `f` against the authoritative record while holding its lock.
    ///
    /// `f` is synchronous, so once it starts nothing can interleave with it
    /// and a caller that gives up while waiting for the lock changes
    /// nothing. The record is kept exactly as `f` leaves it, which means `f`
    /// must finish validating before it writes anything. If the record is
    /// retired afterwards it is removed before the lock is released.
    pub async fn mutate<R, E, F>(&self, id: &str, f: F) -> Result<R, E>
    where
        F: FnOnce(&mut T) -> Result<R, E>,
        E: From<StoreError>,
    {
        let (slot, mut guard) = self.lock_live(id).await?;
        let record = guard
            .as_mut()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        let result = f(record)?;

        if record.is_retired() {
            self.unlink(id, &slot);
            *guard = None;
        }
        Ok(result)
    }

    /// Inserts `initial` under `id`, replacing whatever was there.
    pub async fn create(&self, id: impl Into<String>, initial: T) {
        let previous = {
            let mut slots = self.write_slots();
            slots.insert(id.into(), Arc::new(Mutex::new(Some(initial))))
        };
        if let Some(previous) = previous {
            *previous.lock().await = None;
        }
    }

    /// Inserts `initial` only if `id` is free.
    pub fn insert_new(&self, id: impl Into<String>, initial: T) -> Result<(), StoreError> {
        let mut slots = self.write_slots();
        match slots.entry(id.into()) {
            Entry::Occupied(entry) => Err(StoreError::AlreadyExists(entry.key().clone())),
            Entry::Vacant(entry) => {
                entry.insert(Arc::new(Mutex::new(Some(initial))));
                Ok(())
            }
        }
    }

    /// Removes the record. Returns false if there was nothing to remove.
    pub async fn delete(&self, id: &str) -> bool {
        let removed = {
            let mut slots = self.write_slots();
            slots.remove(id)
        };
        match removed {
            Some(slot) => slot.lock().await.take().is_some(),
            None => false,
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.read_slots().contains_key(id)
    }

    pub fn ids(&self) -> Vec<String> {
        self.read_slots().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.read_slots().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read_slots().is_empty()
    }
}
