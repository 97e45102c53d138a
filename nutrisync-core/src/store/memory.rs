//! In-memory local store.
//!
//! Every handle opened with [`MemoryLocalStore::open_tab`] shares the same
//! key space, like browser tabs sharing one origin's storage, and each sees
//! the others' writes as external.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::broadcast;

use super::{next_origin, ExternalWrites, LocalStore, StoreError, StoreEvent};

const EVENT_CAPACITY: usize = 64;

struct Shared {
    values: Mutex<HashMap<String, String>>,
    events: broadcast::Sender<StoreEvent>,
    fail_writes: AtomicBool,
}

pub struct MemoryLocalStore {
    origin: u64,
    shared: Arc<Shared>,
}

impl MemoryLocalStore {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            origin: next_origin(),
            shared: Arc::new(Shared {
                values: Mutex::new(HashMap::new()),
                events,
                fail_writes: AtomicBool::new(false),
            }),
        }
    }

    /// Opens another handle on the same storage with its own origin.
    pub fn open_tab(&self) -> Self {
        Self {
            origin: next_origin(),
            shared: Arc::clone(&self.shared),
        }
    }

    /// Makes every subsequent write fail, as a full or blocked storage would.
    pub fn fail_writes(&self, fail: bool) {
        self.shared.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if self.shared.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("storage quota exceeded".to_string()));
        }
        Ok(())
    }

    fn publish(&self, key: &str, value: Option<String>) {
        // No subscribers is fine.
        let _ = self.shared.events.send(StoreEvent {
            origin: self.origin,
            key: key.to_string(),
            value,
        });
    }
}

impl Default for MemoryLocalStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalStore for MemoryLocalStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let values = self
            .shared
            .values
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.check_writable()?;
        self.shared
            .values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
        self.publish(key, Some(value.to_string()));
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.check_writable()?;
        let removed = self
            .shared
            .values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        if removed.is_some() {
            self.publish(key, None);
        }
        Ok(())
    }

    fn subscribe(&self) -> ExternalWrites {
        ExternalWrites::new(self.origin, self.shared.events.subscribe())
    }
}
