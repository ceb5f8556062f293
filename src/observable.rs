use std::{
    cell::{Cell, RefCell},
    fmt,
    rc::Rc,
};

pub type SubscriptionId = usize;

type Handler<T> = Rc<dyn Fn(&T)>;

/// A single typed event with synchronous delivery to its subscribers.
///
/// Handlers run in subscription order on the publishing thread. The handler
/// list is copied before delivery, so a handler may subscribe or unsubscribe
/// while an event is being published; such changes apply to the next event.
pub struct EventChannel<T> {
    handlers: RefCell<Vec<(SubscriptionId, Handler<T>)>>,
    next_id: Cell<SubscriptionId>,
}

impl<T> EventChannel<T> {
    pub fn new() -> Self {
        Self {
            handlers: RefCell::new(Vec::new()),
            next_id: Cell::new(0),
        }
    }

    pub fn subscribe<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&T) + 'static,
    {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.handlers.borrow_mut().push((id, Rc::new(handler)));
        id
    }

    /// Returns false if `id` was not subscribed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut handlers = self.handlers.borrow_mut();
        let before = handlers.len();
        handlers.retain(|(handler_id, _)| *handler_id != id);
        handlers.len() != before
    }

    pub fn publish(&self, payload: &T) {
        let handlers: Vec<Handler<T>> = self
            .handlers
            .borrow()
            .iter()
            .map(|(_, handler)| Rc::clone(handler))
            .collect();
        for handler in handlers {
            handler(payload);
        }
    }

    #[inline(always)]
    pub fn subscriber_count(&self) -> usize {
        self.handlers.borrow().len()
    }
}

impl<T> Default for EventChannel<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for EventChannel<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventChannel")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

/// Payload of events that report a field change.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ValueChange<T> {
    pub new: T,
    pub old: T,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_reaches_all_subscribers_in_order() {
        let channel: EventChannel<u32> = EventChannel::new();
        let seen = Rc::new(RefCell::new(vec![]));
        let first = Rc::clone(&seen);
        channel.subscribe(move |v| first.borrow_mut().push(("first", *v)));
        let second = Rc::clone(&seen);
        channel.subscribe(move |v| second.borrow_mut().push(("second", *v)));

        channel.publish(&7);
        assert_eq!(*seen.borrow(), vec![("first", 7), ("second", 7)]);
    }

    #[test]
    fn test_unsubscribe() {
        let channel: EventChannel<()> = EventChannel::new();
        let count = Rc::new(Cell::new(0));
        let counter = Rc::clone(&count);
        let id = channel.subscribe(move |_| counter.set(counter.get() + 1));
        channel.publish(&());
        assert!(channel.unsubscribe(id));
        assert!(!channel.unsubscribe(id));
        channel.publish(&());
        assert_eq!(count.get(), 1);
        assert_eq!(channel.subscriber_count(), 0);
    }

    #[test]
    fn test_handler_may_subscribe_during_publish() {
        let channel: Rc<EventChannel<()>> = Rc::new(EventChannel::new());
        let inner = Rc::clone(&channel);
        channel.subscribe(move |_| {
            inner.subscribe(|_| {});
        });
        channel.publish(&());
        assert_eq!(channel.subscriber_count(), 2);
    }
}
