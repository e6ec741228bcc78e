//! # ember-lifecycle
//!
//! Typed publish/subscribe channel linking Ember driver resources.
//!
//! Each parent resource (connection, transaction) owns one [`LifecycleHub`]
//! per event type. Dependents subscribe with a callback and receive a
//! [`SubscriptionId`] token; unsubscription is explicit and must happen
//! before the subscriber is destroyed. Broadcasts are synchronous calls on
//! the publishing thread — there is no queueing, deduplication, or
//! cross-thread delivery.
//!
//! The hub is a single-threaded type: callbacks are `Rc<dyn Fn(E)>` and the
//! subscriber list lives behind a `RefCell`. Broadcast dispatches over a
//! snapshot of the list so a callback may subscribe or unsubscribe (itself
//! or any other subscriber) mid-dispatch without corrupting iteration.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use tracing::trace;

/// Events a connection publishes to its dependent transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionEvent {
   /// The attachment is about to be detached. Dependents must release any
   /// engine handles that reference it before this broadcast returns.
   Disconnected,

   /// The connection object is being destroyed. Dependents release their
   /// handles and must not expect a reconnection.
   Closed,
}

/// Events a transaction publishes to its dependent statements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionEvent {
   /// The transaction context is ending (commit, rollback, or connection
   /// loss). Statement-level handles tied to it are no longer valid.
   Disconnected,

   /// The transaction object is being destroyed.
   Closed,
}

/// Token identifying one subscription.
///
/// Only meaningful for the hub that issued it; ids are never reused within
/// a hub's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Synchronous, single-threaded event channel owned by a parent resource.
pub struct LifecycleHub<E> {
   next_id: Cell<u64>,
   subscribers: RefCell<Vec<(SubscriptionId, Rc<dyn Fn(E)>)>>,
}

impl<E: Copy + std::fmt::Debug> LifecycleHub<E> {
   pub fn new() -> Self {
      Self {
         next_id: Cell::new(0),
         subscribers: RefCell::new(Vec::new()),
      }
   }

   /// Registers a callback and returns its revocation token.
   pub fn subscribe(&self, callback: impl Fn(E) + 'static) -> SubscriptionId {
      let id = SubscriptionId(self.next_id.get());
      self.next_id.set(self.next_id.get() + 1);
      self
         .subscribers
         .borrow_mut()
         .push((id, Rc::new(callback)));
      trace!(id = id.0, "lifecycle subscription added");
      id
   }

   /// Removes a subscription.
   ///
   /// Removing an unknown or already-removed id is a no-op, not an error.
   pub fn unsubscribe(&self, id: SubscriptionId) {
      self.subscribers.borrow_mut().retain(|(sid, _)| *sid != id);
   }

   /// Invokes every currently-subscribed callback with `event`, in
   /// subscription order, synchronously on the calling thread.
   ///
   /// Dispatch iterates a snapshot taken before the first callback runs: a
   /// subscriber removed during the broadcast still receives this event,
   /// and one added during the broadcast does not.
   pub fn broadcast(&self, event: E) {
      let snapshot: Vec<Rc<dyn Fn(E)>> = self
         .subscribers
         .borrow()
         .iter()
         .map(|(_, callback)| Rc::clone(callback))
         .collect();

      trace!(?event, subscribers = snapshot.len(), "broadcasting lifecycle event");

      for callback in snapshot {
         callback(event);
      }
   }

   /// Number of live subscriptions.
   pub fn subscriber_count(&self) -> usize {
      self.subscribers.borrow().len()
   }
}

impl<E: Copy + std::fmt::Debug> Default for LifecycleHub<E> {
   fn default() -> Self {
      Self::new()
   }
}

impl<E> std::fmt::Debug for LifecycleHub<E> {
   fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
      f.debug_struct("LifecycleHub")
         .field("subscribers", &self.subscribers.borrow().len())
         .finish()
   }
}
