//! Callback sets with unsubscribe capabilities.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

pub type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Set of callbacks keyed by identity. Registering the same `Arc` twice is a no-op.
pub struct SubscriberSet<T> {
    next_id: AtomicU64,
    entries: Mutex<Vec<(u64, Callback<T>)>>,
}

impl<T> Default for SubscriberSet<T> {
    fn default() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            entries: Mutex::new(Vec::new()),
        }
    }
}

fn same_callback<T>(a: &Callback<T>, b: &Callback<T>) -> bool {
    // Compare data pointers only; vtable pointers are not unique.
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

impl<T: 'static> SubscriberSet<T> {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Adds `callback` and returns the capability that removes it again.
    pub fn subscribe(self: &Arc<Self>, callback: Callback<T>) -> Subscription {
        let id = {
            let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
            match entries.iter().find(|(_, cb)| same_callback(cb, &callback)) {
                Some((id, _)) => *id,
                None => {
                    let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                    entries.push((id, callback));
                    id
                }
            }
        };

        let set: Weak<Self> = Arc::downgrade(self);
        Subscription::new(move || {
            if let Some(set) = set.upgrade() {
                set.remove(id);
            }
        })
    }

    fn remove(&self, id: u64) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|(entry_id, _)| *entry_id != id);
    }

    /// Invokes every registered callback with `value` and returns how many ran.
    /// Callbacks run outside the lock, so they may subscribe or unsubscribe.
    pub fn emit(&self, value: &T) -> usize {
        let callbacks: Vec<Callback<T>> = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, cb)| cb.clone())
            .collect();
        for callback in &callbacks {
            callback(value);
        }
        callbacks.len()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

/// Capability returned by every subscribe call.
///
/// Dropping it keeps the callback registered; call [`Subscription::unsubscribe`] to remove it.
pub struct Subscription {
    remove: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    fn new(remove: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            remove: Some(Box::new(remove)),
        }
    }

    pub fn unsubscribe(mut self) {
        if let Some(remove) = self.remove.take() {
            remove();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}
