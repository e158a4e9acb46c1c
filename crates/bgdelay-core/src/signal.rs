//! Single-fire start signal between a mounted player and the placeholder.
//!
//! Both halves are consumed on use, and the shared slot latches after the
//! first notification, so the `Activating -> Playing` step can happen at
//! most once per page load.

use std::cell::RefCell;
use std::rc::Rc;

enum Slot {
    /// Nothing registered, not fired
    Empty,
    /// Listener waiting for the signal
    Waiting(Box<dyn FnOnce()>),
    /// Fired before anyone listened
    FiredEarly,
    /// Done; further notifications are ignored
    Spent,
}

/// Create a connected notifier/listener pair
pub fn start_signal() -> (StartNotifier, StartListener) {
    let slot = Rc::new(RefCell::new(Slot::Empty));
    (
        StartNotifier { slot: Rc::clone(&slot) },
        StartListener { slot },
    )
}

/// Sending half, held by the mounted player.
///
/// Clones share the slot; only the first `notify` across all clones has an
/// effect.
#[derive(Clone)]
pub struct StartNotifier {
    slot: Rc<RefCell<Slot>>,
}

impl StartNotifier {
    /// Report that the player started
    pub fn notify(self) {
        let previous = std::mem::replace(&mut *self.slot.borrow_mut(), Slot::Spent);
        match previous {
            Slot::Waiting(callback) => callback(),
            Slot::Empty => *self.slot.borrow_mut() = Slot::FiredEarly,
            Slot::FiredEarly => *self.slot.borrow_mut() = Slot::FiredEarly,
            Slot::Spent => {}
        }
    }

    pub fn has_fired(&self) -> bool {
        matches!(*self.slot.borrow(), Slot::FiredEarly | Slot::Spent)
    }
}

impl std::fmt::Debug for StartNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StartNotifier")
            .field("fired", &self.has_fired())
            .finish()
    }
}

/// Receiving half, held by the engine
pub struct StartListener {
    slot: Rc<RefCell<Slot>>,
}

impl StartListener {
    /// Run `callback` once the player starts, or right away if it
    /// already has
    pub fn on_start<F>(self, callback: F)
    where
        F: FnOnce() + 'static,
    {
        let previous = std::mem::replace(&mut *self.slot.borrow_mut(), Slot::Spent);
        match previous {
            Slot::FiredEarly => callback(),
            Slot::Empty => *self.slot.borrow_mut() = Slot::Waiting(Box::new(callback)),
            // A listener is consumed on registration, so these cannot recur
            Slot::Waiting(existing) => *self.slot.borrow_mut() = Slot::Waiting(existing),
            Slot::Spent => {}
        }
    }

    pub fn has_fired(&self) -> bool {
        matches!(*self.slot.borrow(), Slot::FiredEarly | Slot::Spent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_notify_after_listen() {
        let (notifier, listener) = start_signal();
        let hits = Rc::new(Cell::new(0));
        let h = Rc::clone(&hits);
        listener.on_start(move || h.set(h.get() + 1));
        assert_eq!(hits.get(), 0);
        notifier.notify();
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn test_notify_before_listen() {
        let (notifier, listener) = start_signal();
        notifier.notify();
        assert!(listener.has_fired());
        let hits = Rc::new(Cell::new(0));
        let h = Rc::clone(&hits);
        listener.on_start(move || h.set(h.get() + 1));
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn test_clones_fire_once() {
        let (notifier, listener) = start_signal();
        let hits = Rc::new(Cell::new(0));
        let h = Rc::clone(&hits);
        listener.on_start(move || h.set(h.get() + 1));

        let second = notifier.clone();
        let third = notifier.clone();
        notifier.notify();
        second.notify();
        third.notify();
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn test_never_notified() {
        let (_notifier, listener) = start_signal();
        let hits = Rc::new(Cell::new(0));
        let h = Rc::clone(&hits);
        listener.on_start(move || h.set(h.get() + 1));
        assert_eq!(hits.get(), 0);
    }
}
