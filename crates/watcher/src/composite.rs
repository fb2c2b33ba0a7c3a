//! One-shot aggregation shared by the composite waiters
//!
//! Each waiter invocation owns one [`CompositeWaitState`] behind its own
//! `Rc<RefCell<_>>`; nothing is shared between invocations.

use std::cell::RefCell;
use std::rc::Rc;
use uuid::Uuid;

use dom::ObserverId;

use crate::events::{WaiterKind, WatchEvent};
use crate::page::{ListenerId, Page};

/// Whether a waiter resolved while it was being registered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// Callback already ran; no subscription was left behind
    Immediate,
    /// Callback runs later, from a mutation delivery or a signal
    Pending,
}

/// Required vs matched conditions plus the fired flag
///
/// `fired` flips exactly once, the first time every condition is matched.
#[derive(Debug, Clone)]
pub struct CompositeWaitState {
    matched: Vec<bool>,
    matched_count: usize,
    fired: bool,
}

impl CompositeWaitState {
    pub fn new(required: usize) -> Self {
        Self {
            matched: vec![false; required],
            matched_count: 0,
            fired: false,
        }
    }

    /// Returns true if `index` was not matched before
    pub fn mark(&mut self, index: usize) -> bool {
        match self.matched.get_mut(index) {
            Some(slot) if !*slot => {
                *slot = true;
                self.matched_count += 1;
                true
            }
            _ => false,
        }
    }

    pub fn is_marked(&self, index: usize) -> bool {
        self.matched.get(index).copied().unwrap_or(false)
    }

    pub fn is_complete(&self) -> bool {
        self.matched_count == self.matched.len()
    }

    pub fn fired(&self) -> bool {
        self.fired
    }

    /// The one-shot guard: true once, on the first call after completion
    pub fn try_fire(&mut self) -> bool {
        if self.fired || !self.is_complete() {
            return false;
        }
        self.fired = true;
        true
    }

    pub fn pending(&self) -> impl Iterator<Item = usize> + '_ {
        self.matched
            .iter()
            .enumerate()
            .filter(|(_, matched)| !**matched)
            .map(|(index, _)| index)
    }
}

struct Composite {
    waiter: Uuid,
    kind: WaiterKind,
    state: CompositeWaitState,
    callback: Option<Box<dyn FnOnce(&Page)>>,
    listeners: Vec<ListenerId>,
    observers: Vec<ObserverId>,
}

/// Handle captured by every channel feeding one waiter
#[derive(Clone)]
pub(crate) struct SharedComposite(Rc<RefCell<Composite>>);

impl SharedComposite {
    pub(crate) fn new<F>(page: &Page, kind: WaiterKind, required: usize, callback: F) -> Self
    where
        F: FnOnce(&Page) + 'static,
    {
        let waiter = Uuid::now_v7();
        tracing::debug!(
            "[Composite] {:?} waiter {} registered with {} condition(s)",
            kind,
            waiter,
            required
        );
        page.event_bus()
            .publish(WatchEvent::WaiterRegistered { waiter, kind });
        Self(Rc::new(RefCell::new(Composite {
            waiter,
            kind,
            state: CompositeWaitState::new(required),
            callback: Some(Box::new(callback)),
            listeners: Vec::new(),
            observers: Vec::new(),
        })))
    }

    pub(crate) fn id(&self) -> Uuid {
        self.0.borrow().waiter
    }

    pub(crate) fn mark(&self, index: usize) {
        if self.0.borrow_mut().state.mark(index) {
            tracing::trace!("[Composite] {} matched condition {}", self.id(), index);
        }
    }

    pub(crate) fn pending(&self) -> Vec<usize> {
        self.0.borrow().state.pending().collect()
    }

    /// Remember a listener to remove once the waiter fires
    pub(crate) fn track_listener(&self, id: ListenerId) {
        self.0.borrow_mut().listeners.push(id);
    }

    /// Remember an observer to disconnect once the waiter fires
    pub(crate) fn track_observer(&self, id: ObserverId) {
        self.0.borrow_mut().observers.push(id);
    }

    /// Fire if complete and not yet fired; returns true if this call fired
    ///
    /// Subscriptions are retired and the borrow released before the user
    /// callback runs, so the callback may touch the page (and even feed
    /// this waiter again) without effect.
    pub(crate) fn settle(&self, page: &Page) -> bool {
        let (waiter, kind, callback, listeners, observers) = {
            let mut composite = self.0.borrow_mut();
            if !composite.state.try_fire() {
                return false;
            }
            (
                composite.waiter,
                composite.kind,
                composite.callback.take(),
                std::mem::take(&mut composite.listeners),
                std::mem::take(&mut composite.observers),
            )
        };

        for id in listeners {
            page.remove_event_listener(id);
        }
        for id in observers {
            page.disconnect(id);
        }

        tracing::debug!("[Composite] {:?} waiter {} resolved", kind, waiter);
        page.event_bus()
            .publish(WatchEvent::WaiterResolved { waiter, kind });
        if let Some(callback) = callback {
            callback(page);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_state_fires_once_when_complete() {
        let mut state = CompositeWaitState::new(2);
        assert!(!state.try_fire());
        assert!(state.mark(1));
        assert!(!state.mark(1));
        assert!(!state.try_fire());
        assert_eq!(state.pending().collect::<Vec<_>>(), vec![0]);
        assert!(state.mark(0));
        assert!(state.try_fire());
        assert!(!state.try_fire());
        assert!(state.fired());
    }

    #[test]
    fn test_out_of_range_mark_is_ignored() {
        let mut state = CompositeWaitState::new(1);
        assert!(!state.mark(5));
        assert!(!state.is_marked(5));
        assert!(!state.is_complete());
    }

    #[test]
    fn test_empty_state_is_complete() {
        let mut state = CompositeWaitState::new(0);
        assert!(state.try_fire());
    }

    #[test]
    fn test_reentrant_settle_runs_callback_once() {
        let page = Page::blank();
        let calls = Rc::new(Cell::new(0));

        let slot: Rc<RefCell<Option<SharedComposite>>> = Rc::new(RefCell::new(None));
        let inner_slot = slot.clone();
        let counter = calls.clone();
        let composite = SharedComposite::new(&page, WaiterKind::InputHasValue, 1, move |page| {
            counter.set(counter.get() + 1);
            // Feeding the waiter from its own callback must not fire it again
            if let Some(me) = inner_slot.borrow().as_ref() {
                me.mark(0);
                assert!(!me.settle(page));
            }
        });
        *slot.borrow_mut() = Some(composite.clone());

        composite.mark(0);
        assert!(composite.settle(&page));
        assert!(!composite.settle(&page));
        assert_eq!(calls.get(), 1);
        assert!(composite.pending().is_empty());
    }

    #[test]
    fn test_settle_retires_listeners() {
        let page = Page::blank();
        let body = page.observe_root();
        let composite = SharedComposite::new(&page, WaiterKind::InputHasValue, 1, |_| {});
        let id = page.add_event_listener(body, "input", |_, _| {}).unwrap();
        composite.track_listener(id);

        composite.mark(0);
        composite.settle(&page);
        assert_eq!(page.listener_count(), 0);
    }
}
