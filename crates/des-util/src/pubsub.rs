//! `PubSub` — fan-out of events to subscribers keyed by exact event type.
//!
//! Publishing is ordinary scheduling with the router as the handler:
//!
//! ```rust,ignore
//! let router = PubSub::new();
//! router.subscribe::<PriceTick>(ledger.clone());
//! es.schedule_now(router.clone(), Arc::new(PriceTick { .. }))?;
//! ```
//!
//! Routing uses the concrete type only.  A subscriber to `PriceTick` does not
//! see a `Wrapped<PriceTick>`, and an event type nobody subscribed to is
//! silently dropped.

use std::any::TypeId;
use std::sync::{Arc, PoisonError, RwLock};

use des_core::{Event, EventRef, Time};
use des_sched::{Handler, HandlerRef, Scheduler};
use tracing::trace;

#[cfg(feature = "fx-hash")]
type TagMap<V> = rustc_hash::FxHashMap<TypeId, V>;
#[cfg(not(feature = "fx-hash"))]
type TagMap<V> = std::collections::HashMap<TypeId, V>;

/// Type-keyed router.  Share it as an `Arc<PubSub>`; it is itself a
/// [`Handler`].
#[derive(Default)]
pub struct PubSub {
    subscriptions: RwLock<TagMap<Vec<HandlerRef>>>,
}

impl PubSub {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Deliver every `E` routed through here to `subscriber` as well.
    ///
    /// Returns `false` if `subscriber` was already subscribed to `E`.
    pub fn subscribe<E: Event>(&self, subscriber: HandlerRef) -> bool {
        self.subscribe_tag(TypeId::of::<E>(), subscriber)
    }

    /// Stop delivering `E` to `subscriber`.  Subscribers are matched by
    /// pointer identity.  Returns whether a subscription was removed.
    pub fn unsubscribe<E: Event>(&self, subscriber: &HandlerRef) -> bool {
        self.unsubscribe_tag(TypeId::of::<E>(), subscriber)
    }

    /// [`subscribe`][Self::subscribe] with a runtime type tag, as returned by
    /// `<dyn Event>::type_tag` or `des_core::type_tag_of`.
    pub fn subscribe_tag(&self, tag: TypeId, subscriber: HandlerRef) -> bool {
        let mut subs = self.subscriptions.write().unwrap_or_else(PoisonError::into_inner);
        let list = subs.entry(tag).or_default();
        if list.iter().any(|s| Arc::ptr_eq(s, &subscriber)) {
            return false;
        }
        list.push(subscriber);
        true
    }

    pub fn unsubscribe_tag(&self, tag: TypeId, subscriber: &HandlerRef) -> bool {
        let mut subs = self.subscriptions.write().unwrap_or_else(PoisonError::into_inner);
        let Some(list) = subs.get_mut(&tag) else { return false };
        let before = list.len();
        list.retain(|s| !Arc::ptr_eq(s, subscriber));
        let removed = list.len() != before;
        if list.is_empty() {
            subs.remove(&tag);
        }
        removed
    }

    pub fn subscriber_count<E: Event>(&self) -> usize {
        self.subscriber_count_tag(TypeId::of::<E>())
    }

    pub fn subscriber_count_tag(&self, tag: TypeId) -> usize {
        let subs = self.subscriptions.read().unwrap_or_else(PoisonError::into_inner);
        subs.get(&tag).map_or(0, Vec::len)
    }
}

impl Handler for PubSub {
    /// Snapshot the subscribers of the event's exact type, then call each in
    /// turn, outside the lock, with the same event, scheduler and time.
    fn handle(&self, event: &EventRef, scheduler: &Scheduler, time: Time) {
        let targets: Vec<HandlerRef> = {
            let subs = self.subscriptions.read().unwrap_or_else(PoisonError::into_inner);
            match subs.get(&event.type_tag()) {
                Some(list) => list.clone(),
                None => {
                    trace!(scheduler = %scheduler, ?event, "no subscribers");
                    return;
                }
            }
        };
        trace!(scheduler = %scheduler, ?event, subscribers = targets.len(), "publishing");
        for target in targets {
            target.handle(event, scheduler, time);
        }
    }
}

impl std::fmt::Debug for PubSub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let subs = self.subscriptions.read().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("PubSub")
            .field("event_types", &subs.len())
            .field("subscriptions", &subs.values().map(Vec::len).sum::<usize>())
            .finish()
    }
}
