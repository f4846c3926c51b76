//! Push notification dispatch.
//!
//! The hub is per-session state: a table of listeners keyed by
//! (service, notification name), a per-service wildcard, and one fallback
//! handler for everything nobody asked for. The duplex reader hands every
//! push here synchronously, so dispatch of one notification always
//! finishes before the next envelope is read.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, warn};

/// One asynchronous push from the device.
#[derive(Debug, Clone)]
pub struct NotificationEnvelope {
    /// Owning service, when the notification name is declared in the
    /// device's self-description; unattributed pushes carry `None`
    pub service: Option<String>,
    /// Notification name, e.g. "notifyVolumeInformation"
    pub name: String,
    /// Raw parameter list as it arrived on the wire
    pub payload: Vec<Value>,
}

/// Callback invoked for matching notifications.
pub type Listener = Arc<dyn Fn(&NotificationEnvelope) + Send + Sync>;

/// Handle identifying one registration; pass back to
/// [`NotificationHub::unsubscribe`] to cancel it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    id: u64,
    pub service: String,
    /// `None` subscribes to every notification of the service
    pub name: Option<String>,
}

struct SubscriptionEntry {
    id: u64,
    service: String,
    name: Option<String>,
    listener: Listener,
}

#[derive(Default)]
struct HubState {
    next_id: u64,
    entries: Vec<SubscriptionEntry>,
}

/// Per-session subscription table and dispatcher.
#[derive(Default)]
pub struct NotificationHub {
    state: Mutex<HubState>,
    fallback: Mutex<Option<Listener>>,
}

impl NotificationHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener for (service, name), or for every notification
    /// of the service when `name` is `None`.
    pub fn subscribe(
        &self,
        service: &str,
        name: Option<&str>,
        listener: Listener,
    ) -> Subscription {
        let mut state = self.state.lock();
        state.next_id += 1;
        let id = state.next_id;
        state.entries.push(SubscriptionEntry {
            id,
            service: service.to_string(),
            name: name.map(str::to_string),
            listener,
        });
        Subscription {
            id,
            service: service.to_string(),
            name: name.map(str::to_string),
        }
    }

    /// Remove one registration. Unknown handles are ignored.
    pub fn unsubscribe(&self, subscription: &Subscription) {
        self.state
            .lock()
            .entries
            .retain(|e| e.id != subscription.id);
    }

    /// Replace the fallback handler receiving unmatched notifications.
    /// The default traces and discards.
    pub fn set_fallback(&self, listener: Listener) {
        *self.fallback.lock() = Some(listener);
    }

    /// Deliver one notification.
    ///
    /// Exact (service, name) listeners win; with none registered, the
    /// service's wildcard listeners run; with none of those either, the
    /// fallback sees it. Listeners run in subscription order and a
    /// panicking listener never stops the rest.
    pub fn dispatch(&self, envelope: &NotificationEnvelope) {
        let matched = self.matching_listeners(envelope);

        if matched.is_empty() {
            let fallback = self.fallback.lock().clone();
            match fallback {
                Some(listener) => Self::run_listener(&listener, envelope),
                None => debug!(
                    name = %envelope.name,
                    service = envelope.service.as_deref().unwrap_or("<unknown>"),
                    "dropping notification nobody subscribed to"
                ),
            }
            return;
        }

        for listener in matched {
            Self::run_listener(&listener, envelope);
        }
    }

    /// Drop every registration. Invoked at connection teardown; the
    /// fallback handler survives, it is hub configuration rather than a
    /// connection-scoped subscription.
    pub fn clear(&self) {
        self.state.lock().entries.clear();
    }

    pub fn subscription_count(&self) -> usize {
        self.state.lock().entries.len()
    }

    /// Matching listeners, cloned out of the lock so dispatch never holds
    /// it while running callbacks.
    fn matching_listeners(&self, envelope: &NotificationEnvelope) -> Vec<Listener> {
        let Some(service) = envelope.service.as_deref() else {
            return Vec::new();
        };
        let state = self.state.lock();

        let exact: Vec<Listener> = state
            .entries
            .iter()
            .filter(|e| e.service == service && e.name.as_deref() == Some(envelope.name.as_str()))
            .map(|e| Arc::clone(&e.listener))
            .collect();
        if !exact.is_empty() {
            return exact;
        }

        state
            .entries
            .iter()
            .filter(|e| e.service == service && e.name.is_none())
            .map(|e| Arc::clone(&e.listener))
            .collect()
    }

    fn run_listener(listener: &Listener, envelope: &NotificationEnvelope) {
        if catch_unwind(AssertUnwindSafe(|| listener(envelope))).is_err() {
            warn!(name = %envelope.name, "notification listener panicked, continuing");
        }
    }
}

impl std::fmt::Debug for NotificationHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationHub")
            .field("subscriptions", &self.subscription_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn envelope(service: Option<&str>, name: &str) -> NotificationEnvelope {
        NotificationEnvelope {
            service: service.map(str::to_string),
            name: name.to_string(),
            payload: vec![],
        }
    }

    fn counter_listener(counter: Arc<AtomicUsize>) -> Listener {
        Arc::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn exact_match_dispatch() {
        let hub = NotificationHub::new();
        let hits = Arc::new(AtomicUsize::new(0));
        hub.subscribe(
            "audio",
            Some("notifyVolumeInformation"),
            counter_listener(Arc::clone(&hits)),
        );

        hub.dispatch(&envelope(Some("audio"), "notifyVolumeInformation"));
        hub.dispatch(&envelope(Some("audio"), "notifySomethingElse"));

        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn wildcard_catches_whole_service_when_no_exact_match() {
        let hub = NotificationHub::new();
        let exact = Arc::new(AtomicUsize::new(0));
        let wildcard = Arc::new(AtomicUsize::new(0));
        hub.subscribe(
            "audio",
            Some("notifyVolumeInformation"),
            counter_listener(Arc::clone(&exact)),
        );
        hub.subscribe("audio", None, counter_listener(Arc::clone(&wildcard)));

        // Exact listeners win over the wildcard for their name
        hub.dispatch(&envelope(Some("audio"), "notifyVolumeInformation"));
        assert_eq!(exact.load(Ordering::SeqCst), 1);
        assert_eq!(wildcard.load(Ordering::SeqCst), 0);

        // Unmatched names of the service go to the wildcard
        hub.dispatch(&envelope(Some("audio"), "notifyWutangInfo"));
        assert_eq!(wildcard.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn listeners_run_in_subscription_order() {
        let hub = NotificationHub::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for tag in ["first", "second", "third"] {
            let order = Arc::clone(&order);
            hub.subscribe(
                "system",
                Some("notifyPowerStatus"),
                Arc::new(move |_| order.lock().push(tag)),
            );
        }

        hub.dispatch(&envelope(Some("system"), "notifyPowerStatus"));
        assert_eq!(*order.lock(), vec!["first", "second", "third"]);
    }

    #[test]
    fn panicking_listener_does_not_stop_the_rest() {
        let hub = NotificationHub::new();
        let hits = Arc::new(AtomicUsize::new(0));
        hub.subscribe(
            "system",
            Some("notifyPowerStatus"),
            Arc::new(|_| panic!("listener bug")),
        );
        hub.subscribe(
            "system",
            Some("notifyPowerStatus"),
            counter_listener(Arc::clone(&hits)),
        );

        hub.dispatch(&envelope(Some("system"), "notifyPowerStatus"));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unmatched_notification_goes_to_fallback() {
        let hub = NotificationHub::new();
        let fallback_hits = Arc::new(AtomicUsize::new(0));
        hub.set_fallback(counter_listener(Arc::clone(&fallback_hits)));

        hub.dispatch(&envelope(Some("audio"), "notifyNobodyCares"));
        hub.dispatch(&envelope(None, "notifyUnattributed"));

        assert_eq!(fallback_hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn unmatched_notification_without_fallback_is_silently_dropped() {
        let hub = NotificationHub::new();
        // Must not panic or error
        hub.dispatch(&envelope(Some("audio"), "notifyNobodyCares"));
    }

    #[test]
    fn unsubscribe_and_clear() {
        let hub = NotificationHub::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let sub = hub.subscribe("audio", None, counter_listener(Arc::clone(&hits)));
        hub.subscribe("system", None, counter_listener(Arc::clone(&hits)));
        assert_eq!(hub.subscription_count(), 2);

        hub.unsubscribe(&sub);
        assert_eq!(hub.subscription_count(), 1);
        hub.dispatch(&envelope(Some("audio"), "notifyVolumeInformation"));
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        hub.clear();
        assert_eq!(hub.subscription_count(), 0);
    }
}
