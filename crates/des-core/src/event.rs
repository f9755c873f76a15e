//! The `Event` capability.
//!
//! The kernel never looks inside an event.  It moves `EventRef`s from
//! producers to handlers and, for exact-type fan-out, reads the concrete type
//! through `type_tag`.  Structurally related event
//! types (a wrapper around another event, two structs with the same fields)
//! have different tags and are never routed together.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::{Arc, LazyLock};

/// Blanket `&dyn Any` access for every `'static` type.
///
/// A supertrait of [`Event`] so a `&dyn Event` can be downcast without
/// unsafe code.
pub trait AsAny {
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any> AsAny for T {
    #[inline]
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// An opaque value delivered to a handler.
///
/// Implement it for any `'static + Send + Sync + Debug` type; there are no required
/// methods.
///
/// ```
/// use des_core::{Event, EventRef};
/// use std::sync::Arc;
///
/// #[derive(Debug)]
/// struct Arrival { passenger: u32 }
/// impl Event for Arrival {}
///
/// let e: EventRef = Arc::new(Arrival { passenger: 7 });
/// assert_eq!(e.downcast_ref::<Arrival>().map(|a| a.passenger), Some(7));
/// ```
pub trait Event: AsAny + Send + Sync + fmt::Debug + 'static {}

/// Shared handle to an event, as stored in queued records.
pub type EventRef = Arc<dyn Event>;

impl dyn Event {
    /// Tag identifying the concrete event type.
    #[inline]
    pub fn type_tag(&self) -> TypeId {
        <dyn Event as AsAny>::as_any(self).type_id()
    }

    /// `true` if the concrete type is `E`.
    #[inline]
    pub fn is<E: Event>(&self) -> bool {
        self.type_tag() == TypeId::of::<E>()
    }

    /// Borrow the payload as `E`, if that is its concrete type.
    #[inline]
    pub fn downcast_ref<E: Event>(&self) -> Option<&E> {
        <dyn Event as AsAny>::as_any(self).downcast_ref::<E>()
    }
}

/// Tag for the event type `E`; compare against `<dyn Event>::type_tag`.
#[inline]
pub fn type_tag_of<E: Event>() -> TypeId {
    TypeId::of::<E>()
}

// ── Generic sentinel ──────────────────────────────────────────────────────────

/// Payload-free event for handlers that only care about being called.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct GenericEvent;

impl Event for GenericEvent {}

static GENERIC_EVENT: LazyLock<EventRef> = LazyLock::new(|| Arc::new(GenericEvent));

/// The shared generic event.  Every call returns the same allocation, so
/// `Arc::ptr_eq` identifies it.
pub fn generic_event() -> EventRef {
    Arc::clone(&GENERIC_EVENT)
}
