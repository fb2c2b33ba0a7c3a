//! Page - the single-threaded host the waiters run in
//!
//! Plays the part of the browser event loop for a [`Document`]:
//!
//! - mutation records pile up in the document as it changes
//! - [`Page::flush`] is the delivery checkpoint: every observer with pending
//!   records gets its batch, in creation order, until nothing is pending
//! - [`Page::dispatch_event`] runs element listeners synchronously
//!
//! No `RefCell` borrow is held while a callback runs, so callbacks may query
//! and mutate the page freely.

use ahash::AHashMap;
use dom::serializer::describe_node;
use dom::{Document, ElementMatcher, MutationRecord, NodeId, ObserveOptions, ObserverId, Selector};
use std::cell::{Cell, Ref, RefCell, RefMut};
use std::rc::Rc;

use crate::config::WatchConfig;
use crate::error::Result;
use crate::events::{EventBus, WatchEvent};

/// What an observer wants after handling a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Keep,
    Disconnect,
}

/// A signal dispatched on an element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub event_type: String,
    pub target: NodeId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerId(u64);

type ObserverCallback = Rc<RefCell<dyn FnMut(&Page, &[MutationRecord]) -> Disposition>>;
type ListenerCallback = Rc<RefCell<dyn FnMut(&Page, &Event)>>;

struct ListenerEntry {
    id: ListenerId,
    target: NodeId,
    event_type: String,
    callback: ListenerCallback,
}

struct PageInner {
    document: RefCell<Document>,
    observers: RefCell<AHashMap<ObserverId, ObserverCallback>>,
    listeners: RefCell<Vec<ListenerEntry>>,
    next_listener: Cell<u64>,
    flushing: Cell<bool>,
    /// None when the configured root is not a usable selector
    observe_root: Option<Selector>,
    config: WatchConfig,
    bus: EventBus,
}

/// Cheap handle; clones share the same page
#[derive(Clone)]
pub struct Page {
    inner: Rc<PageInner>,
}

impl Page {
    /// Page over `document` with the default config
    pub fn new(document: Document) -> Self {
        let config = WatchConfig::default();
        let observe_root = Selector::parse(&config.observe_root).ok();
        Self::build(document, config, observe_root)
    }

    /// Empty `html > (head, body)` page
    pub fn blank() -> Self {
        Self::new(Document::new())
    }

    pub fn with_config(document: Document, config: WatchConfig) -> Result<Self> {
        config.validate()?;
        let observe_root = Selector::parse(&config.observe_root)?;
        Ok(Self::build(document, config, Some(observe_root)))
    }

    fn build(document: Document, config: WatchConfig, observe_root: Option<Selector>) -> Self {
        let config = config.normalized();
        let bus = EventBus::with_capacity(config.event_bus_capacity);
        Self {
            inner: Rc::new(PageInner {
                document: RefCell::new(document),
                observers: RefCell::new(AHashMap::new()),
                listeners: RefCell::new(Vec::new()),
                next_listener: Cell::new(0),
                flushing: Cell::new(false),
                observe_root,
                config,
                bus,
            }),
        }
    }

    pub fn config(&self) -> &WatchConfig {
        &self.inner.config
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.inner.bus
    }

    /// Borrow the document. Do not hold the guard across page calls.
    pub fn document(&self) -> Ref<'_, Document> {
        self.inner.document.borrow()
    }

    /// Mutably borrow the document. Do not hold the guard across page calls.
    pub fn document_mut(&self) -> RefMut<'_, Document> {
        self.inner.document.borrow_mut()
    }

    /// Root of the subtree insertion watches observe
    pub fn observe_root(&self) -> NodeId {
        let doc = self.document();
        let root = self
            .inner
            .observe_root
            .as_ref()
            .and_then(|selector| doc.query_selector(selector))
            .unwrap_or(doc.root());
        root
    }

    /// XPath of a node, for logs
    pub fn describe(&self, node_id: NodeId) -> String {
        describe_node(self.document().arena(), node_id)
    }

    /// Snapshot query, tree order
    pub fn query_all<M>(&self, matcher: &M) -> Vec<NodeId>
    where
        M: ElementMatcher + ?Sized,
    {
        self.document().query_selector_all(matcher)
    }

    // -----------------------------------------------------------------------
    // Mutation observers
    // -----------------------------------------------------------------------

    /// Allocate an observer; it hears nothing until [`Page::observe`]
    pub(crate) fn create_observer<F>(&self, callback: F) -> ObserverId
    where
        F: FnMut(&Page, &[MutationRecord]) -> Disposition + 'static,
    {
        let observer = self.document_mut().create_observer();
        let callback: ObserverCallback = Rc::new(RefCell::new(callback));
        self.inner.observers.borrow_mut().insert(observer, callback);
        observer
    }

    pub fn observe(
        &self,
        observer: ObserverId,
        target: NodeId,
        options: ObserveOptions,
    ) -> Result<()> {
        self.document_mut().observe(observer, target, options)?;
        Ok(())
    }

    /// Drop an observer and whatever it had pending
    pub(crate) fn disconnect(&self, observer: ObserverId) {
        self.document_mut().disconnect(observer);
        if self.inner.observers.borrow_mut().remove(&observer).is_some() {
            tracing::debug!("[Page] Observer {:?} disconnected", observer);
        }
    }

    pub fn observer_count(&self) -> usize {
        self.inner.observers.borrow().len()
    }

    pub fn observed_targets(&self, observer: ObserverId) -> Vec<NodeId> {
        self.document().observed_targets(observer)
    }

    /// Deliver pending mutation batches; returns how many were delivered
    ///
    /// Re-entrant calls (from inside a callback) return 0; the outer
    /// checkpoint picks up whatever the callback queued.
    pub fn flush(&self) -> usize {
        if self.inner.flushing.replace(true) {
            return 0;
        }
        let _guard = FlushGuard(&self.inner.flushing);

        let mut delivered = 0;
        loop {
            let next = self.document_mut().next_batch();
            let Some((observer, records)) = next else {
                break;
            };
            let callback = self.inner.observers.borrow().get(&observer).cloned();
            let Some(callback) = callback else {
                continue;
            };

            tracing::trace!(
                "[Page] Delivering {} record(s) to observer {:?}",
                records.len(),
                observer
            );
            self.inner.bus.publish(WatchEvent::BatchDelivered {
                observer,
                records: records.len(),
            });

            let disposition = {
                let mut callback = callback.borrow_mut();
                (&mut *callback)(self, records.as_slice())
            };
            delivered += 1;

            if disposition == Disposition::Disconnect {
                self.disconnect(observer);
            }
        }
        delivered
    }

    pub fn has_pending_records(&self) -> bool {
        self.document().has_pending_records()
    }

    // -----------------------------------------------------------------------
    // Element signals
    // -----------------------------------------------------------------------

    pub fn add_event_listener<F>(
        &self,
        target: NodeId,
        event_type: &str,
        callback: F,
    ) -> Result<ListenerId>
    where
        F: FnMut(&Page, &Event) + 'static,
    {
        self.document().node(target)?;

        let id = ListenerId(self.inner.next_listener.get());
        self.inner.next_listener.set(id.0 + 1);

        let callback: ListenerCallback = Rc::new(RefCell::new(callback));
        self.inner.listeners.borrow_mut().push(ListenerEntry {
            id,
            target,
            event_type: event_type.to_string(),
            callback,
        });
        tracing::trace!(
            "[Page] Listener {:?} for '{}' on {}",
            id,
            event_type,
            self.describe(target)
        );
        Ok(id)
    }

    /// Returns false if the listener was already gone
    pub fn remove_event_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.inner.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|l| l.id != id);
        listeners.len() != before
    }

    pub fn has_listener(&self, target: NodeId, event_type: &str) -> bool {
        self.inner
            .listeners
            .borrow()
            .iter()
            .any(|l| l.target == target && l.event_type == event_type)
    }

    pub fn listener_count(&self) -> usize {
        self.inner.listeners.borrow().len()
    }

    /// Run the listeners for `event_type` on `target` (no propagation)
    ///
    /// Returns how many listeners ran. A listener removed by an earlier
    /// listener of the same dispatch does not run.
    pub fn dispatch_event(&self, target: NodeId, event_type: &str) -> Result<usize> {
        self.document().node(target)?;
        let event = Event {
            event_type: event_type.to_string(),
            target,
        };

        let matching: Vec<(ListenerId, ListenerCallback)> = self
            .inner
            .listeners
            .borrow()
            .iter()
            .filter(|l| l.target == target && l.event_type == event_type)
            .map(|l| (l.id, l.callback.clone()))
            .collect();

        let mut invoked = 0;
        for (id, callback) in matching {
            let alive = self.inner.listeners.borrow().iter().any(|l| l.id == id);
            if !alive {
                continue;
            }
            match callback.try_borrow_mut() {
                Ok(mut callback) => {
                    (&mut *callback)(self, &event);
                    invoked += 1;
                }
                Err(_) => {
                    tracing::warn!(
                        "[Page] Listener {:?} re-entered by its own '{}' dispatch; skipped",
                        id,
                        event_type
                    );
                }
            }
        }
        Ok(invoked)
    }
}

struct FlushGuard<'a>(&'a Cell<bool>);

impl Drop for FlushGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}
