//! One-deep overwrite-on-full hand-off from the main loop to the worker.

use parking_lot::{Condvar, Mutex};

struct SlotState<T> {
    pending: Option<T>,
    signalled: bool,
}

/// Single pending item plus a wake signal.
///
/// `put` never blocks beyond the short critical section; it replaces whatever
/// the consumer has not picked up yet and returns it to the caller.
pub(crate) struct Mailbox<T> {
    state: Mutex<SlotState<T>>,
    ready: Condvar,
}

impl<T> Mailbox<T> {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(SlotState {
                pending: None,
                signalled: false,
            }),
            ready: Condvar::new(),
        }
    }

    /// Store `item`, wake the consumer, and return the displaced item.
    pub(crate) fn put(&self, item: T) -> Option<T> {
        let mut state = self.state.lock();
        let displaced = state.pending.replace(item);
        state.signalled = true;
        self.ready.notify_one();
        displaced
    }

    /// Wake the consumer without storing anything.
    pub(crate) fn wake(&self) {
        let mut state = self.state.lock();
        state.signalled = true;
        self.ready.notify_one();
    }

    /// Block until signalled, then take the pending item if there is one.
    pub(crate) fn wait_take(&self) -> Option<T> {
        let mut state = self.state.lock();
        while !state.signalled {
            self.ready.wait(&mut state);
        }
        state.signalled = false;
        state.pending.take()
    }

    /// Take the pending item without waiting.
    pub(crate) fn take(&self) -> Option<T> {
        self.state.lock().pending.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn put_replaces_pending_item() {
        let mailbox = Mailbox::new();
        assert_eq!(mailbox.put(1), None);
        assert_eq!(mailbox.put(2), Some(1));
        assert_eq!(mailbox.put(3), Some(2));
        assert_eq!(mailbox.wait_take(), Some(3));
        assert_eq!(mailbox.take(), None);
    }

    #[test]
    fn wake_without_item_yields_none() {
        let mailbox: Mailbox<u32> = Mailbox::new();
        mailbox.wake();
        assert_eq!(mailbox.wait_take(), None);
    }

    #[test]
    fn consumer_blocks_until_put() {
        let mailbox = Arc::new(Mailbox::new());
        let consumer = {
            let mailbox = Arc::clone(&mailbox);
            thread::spawn(move || mailbox.wait_take())
        };
        mailbox.put("frame");
        assert_eq!(consumer.join().unwrap(), Some("frame"));
    }
}
