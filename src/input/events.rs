//! Input event source
//!
//! The simulation never hooks window events itself. Whoever owns the surface
//! publishes [`InputEvent`]s into an [`InputSource`]; the simulation
//! subscribes when its input is mounted and unsubscribes when unmounted or
//! destroyed. Events travel over bounded crossbeam channels and are drained
//! once per frame. A subscriber that falls behind loses the newest events
//! past [`MAX_PENDING_EVENTS`] instead of growing without limit.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use crossbeam::channel::{bounded, Receiver, Sender, TrySendError};

/// Pointer identity: `-1` for the mouse, device ids for touches.
pub type PointerId = i64;

/// Events one subscription holds before further events are dropped.
pub const MAX_PENDING_EVENTS: usize = 1024;

/// Raw pointer event in logical client coordinates (origin top-left).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    PointerDown { id: PointerId, x: f32, y: f32 },
    PointerMove { id: PointerId, x: f32, y: f32 },
    PointerUp { id: PointerId },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Detach = Box<dyn FnOnce(SubscriptionId) + Send>;

/// Receiving end of one subscription.
///
/// Dropping it detaches it from its source right away.
pub struct InputSubscription {
    id: SubscriptionId,
    receiver: Receiver<InputEvent>,
    detach: Option<Detach>,
}

impl InputSubscription {
    /// Subscription whose source is told through `detach` when it is dropped.
    pub fn new(id: SubscriptionId, receiver: Receiver<InputEvent>, detach: Option<Detach>) -> Self {
        Self { id, receiver, detach }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// All events published since the last drain, in order.
    pub fn drain(&self) -> Vec<InputEvent> {
        self.receiver.try_iter().collect()
    }

    /// Events waiting to be drained.
    pub fn pending(&self) -> usize {
        self.receiver.len()
    }
}

impl Drop for InputSubscription {
    fn drop(&mut self) {
        if let Some(detach) = self.detach.take() {
            detach(self.id);
        }
    }
}

impl std::fmt::Debug for InputSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InputSubscription")
            .field("id", &self.id)
            .field("pending", &self.pending())
            .finish()
    }
}

/// Something that produces pointer events.
pub trait InputSource {
    fn subscribe(&mut self) -> InputSubscription;

    /// Stop delivering events to `id`. Unknown ids are ignored.
    fn unsubscribe(&mut self, id: SubscriptionId);
}

type Subscribers = Mutex<Vec<(SubscriptionId, Sender<InputEvent>)>>;

fn lock(subscribers: &Subscribers) -> MutexGuard<'_, Vec<(SubscriptionId, Sender<InputEvent>)>> {
    subscribers.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Fan-out hub: every published event goes to every live subscriber.
#[derive(Debug, Default)]
pub struct InputHub {
    subscribers: Arc<Subscribers>,
    next_id: u64,
}

impl InputHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&mut self, event: InputEvent) {
        lock(&self.subscribers).retain(|(id, sender)| match sender.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                log::trace!("Input subscription {:?} full, dropping event", id);
                true
            }
            Err(TrySendError::Disconnected(_)) => false,
        });
    }

    pub fn subscriber_count(&self) -> usize {
        lock(&self.subscribers).len()
    }
}

impl InputSource for InputHub {
    fn subscribe(&mut self) -> InputSubscription {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;

        let (sender, receiver) = bounded(MAX_PENDING_EVENTS);
        lock(&self.subscribers).push((id, sender));
        log::debug!("Input subscription {:?} added", id);

        let subscribers: Weak<Subscribers> = Arc::downgrade(&self.subscribers);
        let detach: Detach = Box::new(move |id: SubscriptionId| {
            if let Some(subscribers) = subscribers.upgrade() {
                lock(&subscribers).retain(|(subscriber, _)| *subscriber != id);
            }
        });

        InputSubscription::new(id, receiver, Some(detach))
    }

    fn unsubscribe(&mut self, id: SubscriptionId) {
        lock(&self.subscribers).retain(|(subscriber, _)| *subscriber != id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fan_out_in_order() {
        let mut hub = InputHub::new();
        let a = hub.subscribe();
        let b = hub.subscribe();

        hub.publish(InputEvent::PointerDown { id: -1, x: 1.0, y: 2.0 });
        hub.publish(InputEvent::PointerUp { id: -1 });

        let expected = vec![
            InputEvent::PointerDown { id: -1, x: 1.0, y: 2.0 },
            InputEvent::PointerUp { id: -1 },
        ];
        assert_eq!(a.drain(), expected);
        assert_eq!(b.drain(), expected);
        assert!(a.drain().is_empty());
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let mut hub = InputHub::new();
        let subscription = hub.subscribe();
        hub.unsubscribe(subscription.id());
        hub.publish(InputEvent::PointerUp { id: 3 });

        assert!(subscription.drain().is_empty());
        assert_eq!(hub.subscriber_count(), 0);
    }

    #[test]
    fn test_dropped_subscription_detaches_immediately() {
        let mut hub = InputHub::new();
        let kept = hub.subscribe();
        drop(hub.subscribe());
        assert_eq!(hub.subscriber_count(), 1);

        hub.unsubscribe(kept.id());
        drop(kept);
        assert_eq!(hub.subscriber_count(), 0);
    }

    #[test]
    fn test_subscription_outliving_hub() {
        let mut hub = InputHub::new();
        let subscription = hub.subscribe();
        drop(hub);
        assert!(subscription.drain().is_empty());
    }

    #[test]
    fn test_pending_events_are_capped() {
        let mut hub = InputHub::new();
        let subscription = hub.subscribe();
        for i in 0..MAX_PENDING_EVENTS + 100 {
            hub.publish(InputEvent::PointerUp { id: i as i64 });
        }

        assert_eq!(subscription.pending(), MAX_PENDING_EVENTS);
        assert_eq!(hub.subscriber_count(), 1);
        // Oldest events are kept
        assert_eq!(subscription.drain()[0], InputEvent::PointerUp { id: 0 });
    }
}
