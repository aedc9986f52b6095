//! Ordered callback registries with identity-based removal.
//!
//! A [`Listeners`] registry holds the subscribers of one category. Dispatch
//! iterates over a snapshot taken under the lock and calls every callback with
//! the lock released, so a callback may subscribe, unsubscribe or dispatch
//! again without deadlocking. Each slot carries an `active` flag that is cleared
//! before the slot is removed: a callback unsubscribed mid-dispatch is skipped
//! for the rest of that dispatch.

use log::*;
use std::any::Any;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Slot<T> {
    id: u64,
    active: Arc<AtomicBool>,
    callback: Callback<T>,
}

impl<T> Clone for Slot<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            active: self.active.clone(),
            callback: self.callback.clone(),
        }
    }
}

struct Registry<T> {
    next_id: u64,
    slots: Vec<Slot<T>>,
}

trait Revoke: Send + Sync {
    fn revoke(&self, id: u64);
}

impl<T> Revoke for Mutex<Registry<T>> {
    fn revoke(&self, id: u64) {
        let mut registry = self.lock().unwrap_or_else(PoisonError::into_inner);
        registry.slots.retain(|slot| slot.id != id);
    }
}

/// Subscribers of a single event category, invoked in registration order.
pub struct Listeners<T> {
    registry: Arc<Mutex<Registry<T>>>,
    category: &'static str,
}

impl<T: 'static> Listeners<T> {
    pub fn new(category: &'static str) -> Self {
        Self {
            registry: Arc::new(Mutex::new(Registry {
                next_id: 0,
                slots: Vec::new(),
            })),
            category,
        }
    }

    /// Register `callback`; it stays registered until the returned handle is
    /// unsubscribed or dropped.
    pub fn subscribe(&self, callback: impl Fn(&T) + Send + Sync + 'static) -> Subscription {
        let active = Arc::new(AtomicBool::new(true));
        let id = {
            let mut registry = self.lock();
            let id = registry.next_id;
            registry.next_id += 1;
            registry.slots.push(Slot {
                id,
                active: active.clone(),
                callback: Arc::new(callback),
            });
            id
        };
        trace!("Subscribed listener {} to {}", id, self.category);

        let registry: Arc<dyn Revoke> = self.registry.clone();
        Subscription {
            id,
            active,
            registry: Arc::downgrade(&registry),
            detached: false,
        }
    }

    /// Invoke every active callback with `value` and return how many ran to
    /// completion. A panicking callback is logged and does not stop delivery.
    ///
    /// A callback whose `active` check passed before a concurrent
    /// [`Subscription::unsubscribe`] on another thread still runs for this
    /// dispatch. Any dispatch that starts after `unsubscribe` returns skips it.
    pub fn emit(&self, value: &T) -> usize {
        let snapshot: Vec<Slot<T>> = self.lock().slots.clone();

        let mut delivered = 0;
        for slot in snapshot {
            if !slot.active.load(Ordering::Acquire) {
                continue;
            }
            match catch_unwind(AssertUnwindSafe(|| (slot.callback)(value))) {
                Ok(()) => delivered += 1,
                Err(panic) => error!(
                    "Listener {} for {} panicked: {}",
                    slot.id,
                    self.category,
                    panic_message(panic.as_ref())
                ),
            }
        }
        delivered
    }

    pub fn len(&self) -> usize {
        self.lock().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Registry<T>> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> Clone for Listeners<T> {
    fn clone(&self) -> Self {
        Self {
            registry: self.registry.clone(),
            category: self.category,
        }
    }
}

impl<T> fmt::Debug for Listeners<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listeners")
            .field("category", &self.category)
            .finish_non_exhaustive()
    }
}

/// Handle for one registered callback.
///
/// Dropping the handle unsubscribes the callback; call [`Subscription::detach`]
/// to keep it registered for the lifetime of the registry instead.
#[must_use = "dropping a Subscription unsubscribes its callback"]
pub struct Subscription {
    id: u64,
    active: Arc<AtomicBool>,
    registry: Weak<dyn Revoke>,
    detached: bool,
}

impl Subscription {
    /// Remove exactly this callback. Calling it again is a no-op.
    ///
    /// Does not wait for a dispatch already running on another thread.
    pub fn unsubscribe(&self) {
        if self.active.swap(false, Ordering::AcqRel) {
            if let Some(registry) = self.registry.upgrade() {
                registry.revoke(self.id);
            }
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Leave the callback registered and forget the handle.
    pub fn detach(mut self) {
        self.detached = true;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if !self.detached {
            self.unsubscribe();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
