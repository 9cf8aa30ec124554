//! Listener-based event plumbing.
//!
//! Components that have something worth observing (the breaker, the request
//! executor) define their own event enum and emit it through an
//! [`EventListeners`] collection. The core never depends on the observers:
//! a request makes the same decisions whether or not anyone is listening.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// An event emitted somewhere in the request lifecycle.
pub trait ClientEvent: Send + Sync + fmt::Debug {
    /// Short machine-readable label, e.g. `"state_transition"`.
    fn event_type(&self) -> &'static str;

    /// When the event occurred.
    fn timestamp(&self) -> Instant;
}

/// Receives events of one type.
pub trait EventListener<E: ClientEvent>: Send + Sync {
    fn on_event(&self, event: &E);
}

/// An ordered collection of listeners for one event type.
#[derive(Clone)]
pub struct EventListeners<E: ClientEvent> {
    listeners: Vec<Arc<dyn EventListener<E>>>,
}

impl<E: ClientEvent> EventListeners<E> {
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
        }
    }

    pub fn add<L>(&mut self, listener: L)
    where
        L: EventListener<E> + 'static,
    {
        self.listeners.push(Arc::new(listener));
    }

    /// Emits to every listener. A panicking listener is isolated so the
    /// remaining ones still run.
    pub fn emit(&self, event: &E) {
        for listener in &self.listeners {
            let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                listener.on_event(event);
            }));
        }
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }
}

impl<E: ClientEvent> Default for EventListeners<E> {
    fn default() -> Self {
        Self::new()
    }
}

/// Wraps a closure as a listener.
pub struct FnListener<E, F>
where
    F: Fn(&E) + Send + Sync,
{
    f: F,
    _marker: std::marker::PhantomData<fn(&E)>,
}

impl<E, F> FnListener<E, F>
where
    F: Fn(&E) + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self {
            f,
            _marker: std::marker::PhantomData,
        }
    }
}

impl<E, F> EventListener<E> for FnListener<E, F>
where
    E: ClientEvent,
    F: Fn(&E) + Send + Sync,
{
    fn on_event(&self, event: &E) {
        (self.f)(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug)]
    struct Ping(Instant);

    impl ClientEvent for Ping {
        fn event_type(&self) -> &'static str {
            "ping"
        }

        fn timestamp(&self) -> Instant {
            self.0
        }
    }

    #[test]
    fn emits_to_every_listener() {
        let a = Arc::new(AtomicUsize::new(0));
        let b = Arc::new(AtomicUsize::new(0));
        let (ac, bc) = (Arc::clone(&a), Arc::clone(&b));

        let mut listeners = EventListeners::new();
        listeners.add(FnListener::new(move |_: &Ping| {
            ac.fetch_add(1, Ordering::SeqCst);
        }));
        listeners.add(FnListener::new(move |_: &Ping| {
            bc.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(listeners.len(), 2);

        listeners.emit(&Ping(Instant::now()));
        listeners.emit(&Ping(Instant::now()));

        assert_eq!(a.load(Ordering::SeqCst), 2);
        assert_eq!(b.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn panicking_listener_does_not_block_others() {
        let hits = Arc::new(AtomicUsize::new(0));
        let hc = Arc::clone(&hits);

        let mut listeners = EventListeners::new();
        listeners.add(FnListener::new(|_: &Ping| panic!("bad listener")));
        listeners.add(FnListener::new(move |_: &Ping| {
            hc.fetch_add(1, Ordering::SeqCst);
        }));

        listeners.emit(&Ping(Instant::now()));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
