//! Typing presence derived from `typing_indicator` events.
//!
//! Each entry is keyed by (target, field, actor) and owns the task that expires
//! it. Replacing or removing an entry drops that task's handle, which aborts it.
//! An expiry that still fires after a refresh finds a newer generation in the
//! map and leaves the entry alone.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use events::{Actor, TypingIndicator};
use log::*;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::listener::{Listeners, Subscription};
use crate::router::EventRouter;

pub const DEFAULT_TYPING_EXPIRY: Duration = Duration::from_millis(3000);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct PresenceKey {
    target_gid: String,
    field: String,
    actor_gid: String,
}

impl PresenceKey {
    fn of(indicator: &TypingIndicator) -> Self {
        Self {
            target_gid: indicator.target_gid.clone(),
            field: indicator.field.clone(),
            actor_gid: indicator.user.gid.clone(),
        }
    }
}

struct AbortOnDrop(JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

struct PresenceEntry {
    indicator: TypingIndicator,
    generation: u64,
    first_seen: u64,
    _expiry: AbortOnDrop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceChangeKind {
    Started,
    Stopped,
    Expired,
}

/// The set of actors typing on `(target_gid, field)` changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceChange {
    pub target_gid: String,
    pub field: String,
    pub actor: Actor,
    pub kind: PresenceChangeKind,
}

struct Inner {
    entries: DashMap<PresenceKey, PresenceEntry>,
    expiry: Duration,
    next_generation: AtomicU64,
    changes: Listeners<PresenceChange>,
}

impl Inner {
    fn expire(&self, key: &PresenceKey, generation: u64) {
        let removed = self
            .entries
            .remove_if(key, |_, entry| entry.generation == generation);
        if let Some((key, entry)) = removed {
            debug!(
                "Typing indicator for {} on {}.{} expired",
                entry.indicator.user.name, key.target_gid, key.field
            );
            self.notify(&key, &entry.indicator.user, PresenceChangeKind::Expired);
        }
    }

    fn notify(&self, key: &PresenceKey, actor: &Actor, kind: PresenceChangeKind) {
        self.changes.emit(&PresenceChange {
            target_gid: key.target_gid.clone(),
            field: key.field.clone(),
            actor: actor.clone(),
            kind,
        });
    }
}

/// Who is typing where, with automatic expiry.
///
/// Timers run on the tokio runtime, so [`PresenceAggregator::handle`] must be
/// called from within one. Cloning shares the same state.
#[derive(Clone)]
pub struct PresenceAggregator {
    inner: Arc<Inner>,
}

impl Default for PresenceAggregator {
    fn default() -> Self {
        Self::new(DEFAULT_TYPING_EXPIRY)
    }
}

impl PresenceAggregator {
    pub fn new(expiry: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                entries: DashMap::new(),
                expiry,
                next_generation: AtomicU64::new(0),
                changes: Listeners::new("presence"),
            }),
        }
    }

    /// Feed every typing indicator the router delivers into this aggregator.
    pub fn attach(&self, router: &EventRouter) -> Subscription {
        let aggregator = self.clone();
        router.on_typing_indicator(move |indicator| aggregator.handle(indicator))
    }

    pub fn on_change(&self, f: impl Fn(&PresenceChange) + Send + Sync + 'static) -> Subscription {
        self.inner.changes.subscribe(f)
    }

    /// Apply one indicator: start or refresh on `is_typing`, remove otherwise.
    pub fn handle(&self, indicator: &TypingIndicator) {
        let key = PresenceKey::of(indicator);
        if indicator.is_typing {
            self.upsert(key, indicator);
        } else if let Some((key, entry)) = self.inner.entries.remove(&key) {
            trace!("{} stopped typing on {}", entry.indicator.user.name, key.target_gid);
            self.inner
                .notify(&key, &entry.indicator.user, PresenceChangeKind::Stopped);
        }
    }

    fn upsert(&self, key: PresenceKey, indicator: &TypingIndicator) {
        let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed) + 1;
        let expiry = self.spawn_expiry(key.clone(), generation);

        let started = match self.inner.entries.entry(key.clone()) {
            Entry::Occupied(mut occupied) => {
                let entry = occupied.get_mut();
                entry.indicator = indicator.clone();
                entry.generation = generation;
                entry._expiry = expiry;
                false
            }
            Entry::Vacant(vacant) => {
                vacant.insert(PresenceEntry {
                    indicator: indicator.clone(),
                    generation,
                    first_seen: generation,
                    _expiry: expiry,
                });
                true
            }
        };

        if started {
            trace!("{} started typing on {}", indicator.user.name, key.target_gid);
            self.inner
                .notify(&key, &indicator.user, PresenceChangeKind::Started);
        }
    }

    fn spawn_expiry(&self, key: PresenceKey, generation: u64) -> AbortOnDrop {
        let inner: Weak<Inner> = Arc::downgrade(&self.inner);
        let delay = self.inner.expiry;
        AbortOnDrop(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(inner) = inner.upgrade() {
                inner.expire(&key, generation);
            }
        }))
    }

    /// Actors currently typing on `field` of `target_gid`, in the order they started.
    pub fn typing_users(&self, target_gid: &str, field: &str) -> Vec<Actor> {
        let mut live: Vec<(u64, Actor)> = self
            .inner
            .entries
            .iter()
            .filter(|entry| entry.key().target_gid == target_gid && entry.key().field == field)
            .map(|entry| (entry.first_seen, entry.indicator.user.clone()))
            .collect();
        live.sort_by_key(|(first_seen, _)| *first_seen);
        live.into_iter().map(|(_, actor)| actor).collect()
    }

    /// Every live indicator, in the order the actors started typing.
    pub fn all_typing(&self) -> Vec<TypingIndicator> {
        let mut live: Vec<(u64, TypingIndicator)> = self
            .inner
            .entries
            .iter()
            .map(|entry| (entry.first_seen, entry.indicator.clone()))
            .collect();
        live.sort_by_key(|(first_seen, _)| *first_seen);
        live.into_iter().map(|(_, indicator)| indicator).collect()
    }

    /// Summary line for `field` of `target_gid`, ignoring `exclude_gid` (usually
    /// the local user).
    pub fn summary(&self, target_gid: &str, field: &str, exclude_gid: Option<&str>) -> Option<String> {
        let names: Vec<String> = self
            .typing_users(target_gid, field)
            .into_iter()
            .filter(|actor| Some(actor.gid.as_str()) != exclude_gid)
            .map(|actor| actor.name)
            .collect();
        typing_summary(&names)
    }

    pub fn len(&self) -> usize {
        self.inner.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.entries.is_empty()
    }
}

/// Human-readable line for a list of typing users.
pub fn typing_summary<S: AsRef<str>>(names: &[S]) -> Option<String> {
    match names {
        [] => None,
        [one] => Some(format!("{} is typing", one.as_ref())),
        [first, second] => Some(format!(
            "{} and {} are typing",
            first.as_ref(),
            second.as_ref()
        )),
        [first, second, third] => Some(format!(
            "{}, {} and {} are typing",
            first.as_ref(),
            second.as_ref(),
            third.as_ref()
        )),
        [first, second, rest @ ..] => Some(format!(
            "{}, {} and {} others are typing",
            first.as_ref(),
            second.as_ref(),
            rest.len()
        )),
    }
}
