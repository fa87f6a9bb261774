//! Delivery of alarm events to listeners, and the single "ringing" slot.

use crossbeam_channel::{Receiver, Sender};
use log::{debug, info, warn};
use parking_lot::Mutex;

use crate::alarm::AlarmId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// the alarm started ringing, listeners should start playback
    AlarmTriggered(AlarmId),
    /// the alarm was stopped or deleted while ringing
    AlarmStopped(AlarmId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subscription(u64);

#[derive(Debug, Default)]
struct Inner {
    ringing: Option<AlarmId>,
    subscribers: Vec<(Subscription, Sender<Event>)>,
    next_subscription: u64,
}

impl Inner {
    /// sends to every subscriber in registration order, dropping the ones whose
    /// receiver is gone
    fn deliver(&mut self, event: Event) {
        self.subscribers.retain(|(subscription, sender)| {
            if sender.send(event).is_ok() {
                true
            } else {
                warn!("couldn't deliver {event:?} to {subscription:?}, its receiver is gone");
                false
            }
        });
    }
}

/// Publish/subscribe channel for alarm events.
///
/// Also owns the ringing state: at most one alarm rings at a time and it keeps
/// ringing until [`stop`](Self::stop) is called.
#[derive(Debug, Default)]
pub struct NotificationChannel {
    inner: Mutex<Inner>,
}

impl NotificationChannel {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn subscribe(&self) -> (Subscription, Receiver<Event>) {
        let (sender, receiver) = crossbeam_channel::unbounded();
        (self.subscribe_with(sender), receiver)
    }

    /// registers an existing sender, useful for fanning several channels into one receiver
    pub fn subscribe_with(&self, sender: Sender<Event>) -> Subscription {
        let mut inner = self.inner.lock();
        let subscription = Subscription(inner.next_subscription);
        inner.next_subscription += 1;
        inner.subscribers.push((subscription, sender));
        debug!("added {subscription:?}");
        subscription
    }

    /// returns whether the subscription was still registered
    pub fn unsubscribe(&self, subscription: Subscription) -> bool {
        let mut inner = self.inner.lock();
        let before = inner.subscribers.len();
        inner.subscribers.retain(|(registered, _)| *registered != subscription);
        inner.subscribers.len() != before
    }

    /// Makes `alarm` the ringing alarm and tells every subscriber, but only if
    /// nothing is ringing yet. Returns whether the alarm took the channel.
    pub fn try_ring(&self, alarm: AlarmId) -> bool {
        let mut inner = self.inner.lock();
        if let Some(ringing) = inner.ringing {
            info!("alarm {alarm} is due but alarm {ringing} is still ringing");
            return false;
        }
        inner.ringing = Some(alarm);
        info!("alarm {alarm} triggered");
        inner.deliver(Event::AlarmTriggered(alarm));
        true
    }

    /// Sends a trigger for `alarm` to every subscriber without touching the ringing state.
    pub fn emit_trigger(&self, alarm: AlarmId) {
        self.inner.lock().deliver(Event::AlarmTriggered(alarm));
    }

    /// Clears the ringing state. Stopping while idle does nothing.
    /// Returns the alarm that was ringing.
    pub fn stop(&self) -> Option<AlarmId> {
        let mut inner = self.inner.lock();
        let stopped = inner.ringing.take()?;
        info!("alarm {stopped} stopped");
        inner.deliver(Event::AlarmStopped(stopped));
        Some(stopped)
    }

    /// stops only if `alarm` is the one ringing
    pub fn stop_if_ringing(&self, alarm: AlarmId) -> bool {
        let mut inner = self.inner.lock();
        if inner.ringing != Some(alarm) {
            return false;
        }
        inner.ringing = None;
        info!("alarm {alarm} stopped because it was removed");
        inner.deliver(Event::AlarmStopped(alarm));
        true
    }

    #[must_use]
    pub fn ringing(&self) -> Option<AlarmId> {
        self.inner.lock().ringing
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().subscribers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ringing_is_first_come_first_served() {
        let channel = NotificationChannel::new();
        let (_, events) = channel.subscribe();
        assert!(channel.try_ring(1));
        assert!(!channel.try_ring(2));
        assert_eq!(channel.ringing(), Some(1));
        assert_eq!(events.try_iter().collect::<Vec<_>>(), vec![Event::AlarmTriggered(1)]);
    }

    #[test]
    fn stop_is_idempotent() {
        let channel = NotificationChannel::new();
        let (_, events) = channel.subscribe();
        channel.try_ring(7);
        assert_eq!(channel.stop(), Some(7));
        assert_eq!(channel.stop(), None);
        assert_eq!(channel.ringing(), None);
        assert_eq!(
            events.try_iter().collect::<Vec<_>>(),
            vec![Event::AlarmTriggered(7), Event::AlarmStopped(7)]
        );
    }

    #[test]
    fn stop_when_idle_sends_nothing() {
        let channel = NotificationChannel::new();
        let (_, events) = channel.subscribe();
        assert_eq!(channel.stop(), None);
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn stop_if_ringing_ignores_other_alarms() {
        let channel = NotificationChannel::new();
        channel.try_ring(1);
        assert!(!channel.stop_if_ringing(2));
        assert_eq!(channel.ringing(), Some(1));
        assert!(channel.stop_if_ringing(1));
        assert_eq!(channel.ringing(), None);
    }

    #[test]
    fn delivers_in_registration_order() {
        let channel = NotificationChannel::new();
        let (sender, receiver) = crossbeam_channel::unbounded();
        let first = channel.subscribe_with(sender.clone());
        let second = channel.subscribe_with(sender);
        assert_ne!(first, second);
        channel.emit_trigger(3);
        assert_eq!(
            receiver.try_iter().collect::<Vec<_>>(),
            vec![Event::AlarmTriggered(3), Event::AlarmTriggered(3)]
        );
        // emitting on its own leaves the ringing slot alone
        assert_eq!(channel.ringing(), None);
    }

    #[test]
    fn unsubscribed_listeners_get_nothing() {
        let channel = NotificationChannel::new();
        let (subscription, events) = channel.subscribe();
        assert!(channel.unsubscribe(subscription));
        assert!(!channel.unsubscribe(subscription));
        channel.try_ring(1);
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn dropped_listener_does_not_block_others() {
        let channel = NotificationChannel::new();
        let (_, dropped) = channel.subscribe();
        let (_, kept) = channel.subscribe();
        drop(dropped);
        assert!(channel.try_ring(5));
        assert_eq!(kept.try_recv().unwrap(), Event::AlarmTriggered(5));
        // the ringing state doesn't care whether anyone heard it
        assert_eq!(channel.ringing(), Some(5));
        assert_eq!(channel.subscriber_count(), 1);
    }
}
