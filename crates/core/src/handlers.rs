//! Listener registry and disposer handles.
//!
//! Each event kind keeps its listeners in a [`HandlerMap`] ([`IndexMap`] for
//! O(1) removal and stable delivery order). Registering returns a
//! [`Subscription`]; a session keeps its subscriptions in a
//! [`SubscriptionSet`] and disposes all of them on teardown.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::Mutex;

/// Unique identifier for event handlers.
pub type HandlerId = u64;

static NEXT_HANDLER_ID: AtomicU64 = AtomicU64::new(1);

/// Returns a new globally-unique handler ID.
pub fn next_handler_id() -> HandlerId {
	NEXT_HANDLER_ID.fetch_add(1, Ordering::SeqCst)
}

/// Handler function invoked with a borrowed event payload.
pub type HandlerFn<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// Registered handler.
pub struct HandlerEntry<E: ?Sized> {
	pub id: HandlerId,
	pub handler: HandlerFn<E>,
}

impl<E: ?Sized> Clone for HandlerEntry<E> {
	fn clone(&self) -> Self {
		Self {
			id: self.id,
			handler: Arc::clone(&self.handler),
		}
	}
}

/// Handler storage: [`IndexMap`] for O(1) removal with stable insertion order.
pub type HandlerMap<E> = Arc<Mutex<IndexMap<HandlerId, HandlerEntry<E>>>>;

/// Creates an empty handler map.
pub fn handler_map<E: ?Sized>() -> HandlerMap<E> {
	Arc::new(Mutex::new(IndexMap::new()))
}

/// Registers `handler` and returns a subscription that removes it again.
pub fn register<E>(map: &HandlerMap<E>, handler: HandlerFn<E>) -> Subscription
where
	E: ?Sized + Send + Sync + 'static,
{
	let id = next_handler_id();
	map.lock().insert(id, HandlerEntry { id, handler });
	Subscription::from_handler_map(id, map)
}

/// Invokes every handler in `map` with `event`.
///
/// The handler list is copied before dispatch so handlers may unsubscribe
/// (or subscribe) while being called.
pub fn dispatch<E: ?Sized>(map: &HandlerMap<E>, event: &E) {
	let handlers: Vec<_> = {
		let map = map.lock();
		map.values().map(|e| e.handler.clone()).collect()
	};

	for handler in handlers {
		handler(event);
	}
}

/// RAII handle that unregisters an event handler on drop.
///
/// Holds a weak reference to the handler map, so dropping after the owning
/// bus is gone is safe (becomes a no-op). Unsubscribing twice is a no-op.
pub struct Subscription {
	id: HandlerId,
	dropper: Option<Arc<dyn Fn(HandlerId) + Send + Sync>>,
}

impl Subscription {
	/// Creates a subscription with a custom dropper function.
	pub fn new(id: HandlerId, dropper: Arc<dyn Fn(HandlerId) + Send + Sync>) -> Self {
		Self {
			id,
			dropper: Some(dropper),
		}
	}

	/// Creates a subscription from a handler map using a weak reference.
	pub fn from_handler_map<E>(id: HandlerId, handlers: &HandlerMap<E>) -> Self
	where
		E: ?Sized + Send + Sync + 'static,
	{
		let weak: Weak<Mutex<IndexMap<HandlerId, HandlerEntry<E>>>> = Arc::downgrade(handlers);
		let dropper = Arc::new(move |id: HandlerId| {
			if let Some(map) = weak.upgrade() {
				map.lock().shift_remove(&id);
			}
		});
		Self::new(id, dropper)
	}

	/// Returns this subscription's handler ID.
	pub fn id(&self) -> HandlerId {
		self.id
	}

	/// Returns true until the handler has been removed.
	pub fn is_active(&self) -> bool {
		self.dropper.is_some()
	}

	/// Removes the handler. Later calls do nothing.
	pub fn unsubscribe(&mut self) {
		if let Some(dropper) = self.dropper.take() {
			(dropper)(self.id);
		}
	}
}

impl Drop for Subscription {
	fn drop(&mut self) {
		self.unsubscribe();
	}
}

impl std::fmt::Debug for Subscription {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Subscription")
			.field("id", &self.id)
			.field("active", &self.dropper.is_some())
			.finish()
	}
}

/// Owned collection of subscriptions disposed together.
#[derive(Debug, Default)]
pub struct SubscriptionSet {
	subscriptions: Vec<Subscription>,
}

impl SubscriptionSet {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn push(&mut self, subscription: Subscription) {
		self.subscriptions.push(subscription);
	}

	pub fn len(&self) -> usize {
		self.subscriptions.len()
	}

	pub fn is_empty(&self) -> bool {
		self.subscriptions.is_empty()
	}

	/// Unsubscribes every handle. Returns how many were still active.
	pub fn dispose_all(&mut self) -> usize {
		let mut disposed = 0;
		for mut subscription in self.subscriptions.drain(..) {
			if subscription.is_active() {
				disposed += 1;
			}
			subscription.unsubscribe();
		}
		disposed
	}
}

#[cfg(test)]
mod tests {
	use std::sync::atomic::{AtomicBool, AtomicUsize};

	use super::*;

	#[test]
	fn test_handler_id_increments() {
		let id1 = next_handler_id();
		let id2 = next_handler_id();
		let id3 = next_handler_id();
		assert!(id2 > id1);
		assert!(id3 > id2);
	}

	#[test]
	fn test_subscription_unsubscribe_is_idempotent() {
		let calls = Arc::new(AtomicUsize::new(0));
		let calls_clone = Arc::clone(&calls);

		let dropper = Arc::new(move |_id: HandlerId| {
			calls_clone.fetch_add(1, Ordering::SeqCst);
		});

		let mut sub = Subscription::new(1, dropper);
		assert_eq!(calls.load(Ordering::SeqCst), 0);

		sub.unsubscribe();
		sub.unsubscribe();
		drop(sub);
		assert_eq!(calls.load(Ordering::SeqCst), 1);
	}

	#[test]
	fn test_subscription_drop() {
		let called = Arc::new(AtomicBool::new(false));
		let called_clone = Arc::clone(&called);

		let dropper = Arc::new(move |_id: HandlerId| {
			called_clone.store(true, Ordering::SeqCst);
		});

		{
			let _sub = Subscription::new(1, dropper);
			assert!(!called.load(Ordering::SeqCst));
		}
		assert!(called.load(Ordering::SeqCst));
	}

	#[test]
	fn test_register_and_dispatch() {
		let map: HandlerMap<String> = handler_map();
		let seen = Arc::new(Mutex::new(Vec::new()));
		let seen_clone = Arc::clone(&seen);

		let _sub = register(
			&map,
			Arc::new(move |event: &String| seen_clone.lock().push(event.clone())),
		);

		dispatch(&map, &"first".to_string());
		dispatch(&map, &"second".to_string());
		assert_eq!(*seen.lock(), vec!["first".to_string(), "second".to_string()]);
	}

	#[test]
	fn test_subscription_from_handler_map_removes_entry() {
		let map: HandlerMap<String> = handler_map();
		{
			let _sub = register(&map, Arc::new(|_: &String| {}));
			assert_eq!(map.lock().len(), 1);
		}
		assert_eq!(map.lock().len(), 0);
	}

	#[test]
	fn test_subscription_weak_reference() {
		let map: HandlerMap<String> = handler_map();
		let sub = register(&map, Arc::new(|_: &String| {}));

		drop(map);

		// Weak ref is dead; dropping must not panic.
		drop(sub);
	}

	#[test]
	fn test_handler_may_unsubscribe_during_dispatch() {
		let map: HandlerMap<u32> = handler_map();
		let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
		let slot_clone = Arc::clone(&slot);

		let sub = register(
			&map,
			Arc::new(move |_: &u32| {
				if let Some(mut sub) = slot_clone.lock().take() {
					sub.unsubscribe();
				}
			}),
		);
		*slot.lock() = Some(sub);

		dispatch(&map, &1);
		assert_eq!(map.lock().len(), 0);
	}

	#[test]
	fn test_subscription_set_disposes_everything() {
		let map: HandlerMap<u32> = handler_map();
		let mut set = SubscriptionSet::new();
		for _ in 0..4 {
			set.push(register(&map, Arc::new(|_: &u32| {})));
		}
		assert_eq!(map.lock().len(), 4);

		assert_eq!(set.dispose_all(), 4);
		assert!(set.is_empty());
		assert_eq!(map.lock().len(), 0);
		assert_eq!(set.dispose_all(), 0);
	}
}
