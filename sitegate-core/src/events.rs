//! Synchronous, in-process publish/subscribe for entity and system events.
//!
//! Observers register per event kind (or for every kind) and are called in
//! registration order on the publishing thread. Callbacks run after the
//! registry lock is released, so an observer may query the manager or
//! (un)subscribe from inside its callback.

use parking_lot::RwLock;
use sitegate_types::{EntityEvent, EntityEventAction, SystemEvent, SystemEventAction};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::trace;

/// Handle returned by every subscription; pass it to
/// [`EventBus::unsubscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "subscription-{}", self.0)
    }
}

type EntityCallback = Arc<dyn Fn(&EntityEvent) + Send + Sync>;
type SystemCallback = Arc<dyn Fn(&SystemEvent) + Send + Sync>;

struct Subscriber<A, C> {
    id: SubscriptionId,
    /// `None` receives every action.
    action: Option<A>,
    callback: C,
}

impl<A: PartialEq, C> Subscriber<A, C> {
    fn wants(&self, action: &A) -> bool {
        self.action.as_ref().is_none_or(|wanted| wanted == action)
    }
}

#[derive(Default)]
pub struct EventBus {
    next_id: AtomicU64,
    entity: RwLock<Vec<Subscriber<EntityEventAction, EntityCallback>>>,
    system: RwLock<Vec<Subscriber<SystemEventAction, SystemCallback>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&self) -> SubscriptionId {
        SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    // ── Subscription ─────────────────────────────────────────────

    pub fn on_entity<F>(&self, action: EntityEventAction, callback: F) -> SubscriptionId
    where
        F: Fn(&EntityEvent) + Send + Sync + 'static,
    {
        self.add_entity(Some(action), Arc::new(callback))
    }

    pub fn on_any_entity<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&EntityEvent) + Send + Sync + 'static,
    {
        self.add_entity(None, Arc::new(callback))
    }

    pub fn on_system<F>(&self, action: SystemEventAction, callback: F) -> SubscriptionId
    where
        F: Fn(&SystemEvent) + Send + Sync + 'static,
    {
        self.add_system(Some(action), Arc::new(callback))
    }

    pub fn on_any_system<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&SystemEvent) + Send + Sync + 'static,
    {
        self.add_system(None, Arc::new(callback))
    }

    /// Removes a subscription. Returns false if it was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut entity = self.entity.write();
        let before = entity.len();
        entity.retain(|s| s.id != id);
        if entity.len() != before {
            return true;
        }
        drop(entity);

        let mut system = self.system.write();
        let before = system.len();
        system.retain(|s| s.id != id);
        system.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.entity.read().len() + self.system.read().len()
    }

    fn add_entity(
        &self,
        action: Option<EntityEventAction>,
        callback: EntityCallback,
    ) -> SubscriptionId {
        let id = self.next_id();
        self.entity.write().push(Subscriber {
            id,
            action,
            callback,
        });
        id
    }

    fn add_system(
        &self,
        action: Option<SystemEventAction>,
        callback: SystemCallback,
    ) -> SubscriptionId {
        let id = self.next_id();
        self.system.write().push(Subscriber {
            id,
            action,
            callback,
        });
        id
    }

    // ── Publishing ───────────────────────────────────────────────

    /// Delivers to every matching observer; returns how many were called.
    pub fn publish_entity(&self, event: &EntityEvent) -> usize {
        let callbacks: Vec<EntityCallback> = self
            .entity
            .read()
            .iter()
            .filter(|s| s.wants(&event.action))
            .map(|s| s.callback.clone())
            .collect();

        trace!(
            entity = %event.entity,
            action = %event.action,
            observers = callbacks.len(),
            "entity event published"
        );
        for callback in &callbacks {
            callback(event);
        }
        callbacks.len()
    }

    pub fn publish_system(&self, event: &SystemEvent) -> usize {
        let callbacks: Vec<SystemCallback> = self
            .system
            .read()
            .iter()
            .filter(|s| s.wants(&event.action))
            .map(|s| s.callback.clone())
            .collect();

        trace!(action = %event.action, observers = callbacks.len(), "system event published");
        for callback in &callbacks {
            callback(event);
        }
        callbacks.len()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("entity_subscribers", &self.entity.read().len())
            .field("system_subscribers", &self.system.read().len())
            .finish()
    }
}
