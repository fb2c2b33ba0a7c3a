//! Availability waiters
//!
//! "Available" means matching now or inserted later. The composite form
//! resolves once per invocation, the first moment every matcher has seen
//! at least one element.

use std::rc::Rc;

use dom::{DomArena, ElementMatcher, NodeId, ObserverId};

use crate::composite::{SharedComposite, WaitOutcome};
use crate::error::Result;
use crate::events::WaiterKind;
use crate::page::{Disposition, Page};
use crate::registry::watch_insertions;

/// Report every element matching now (tree order), then every insertion
///
/// An element that already exists and is later re-inserted is reported
/// twice.
pub fn on_element_available<M, F>(page: &Page, matcher: M, mut callback: F) -> Result<ObserverId>
where
    M: ElementMatcher + 'static,
    F: FnMut(&Page, NodeId) + 'static,
{
    let existing = page.query_all(&matcher);
    tracing::debug!(
        "[Registry] '{}' available on {} element(s) at registration",
        matcher.describe(),
        existing.len()
    );
    for node in existing {
        callback(page, node);
    }
    watch_insertions(page, matcher, move |page, node| {
        callback(page, node);
        Disposition::Keep
    })
}

/// Call `callback` once, when each of `matchers` has matched an element
///
/// Arrival order does not matter, nor does arriving in one batch. When
/// everything is already present the callback runs before this returns
/// and nothing is left subscribed. Repeated matchers are tracked by
/// position, so they are satisfied together.
pub fn all_elements_available<M, F>(page: &Page, matchers: Vec<M>, callback: F) -> Result<WaitOutcome>
where
    M: ElementMatcher + 'static,
    F: FnOnce(&Page) + 'static,
{
    let composite =
        SharedComposite::new(page, WaiterKind::AllElementsAvailable, matchers.len(), callback);

    for (index, matcher) in matchers.iter().enumerate() {
        let present = page.document().query_selector(matcher).is_some();
        if present {
            composite.mark(index);
        }
    }
    if composite.settle(page) {
        return Ok(WaitOutcome::Immediate);
    }

    let matchers: Rc<[M]> = matchers.into();
    let any = {
        let matchers = matchers.clone();
        move |arena: &DomArena, node: NodeId| matchers.iter().any(|m| m.matches(arena, node))
    };

    let state = composite.clone();
    let observer = watch_insertions(page, any, move |page, node| {
        for index in state.pending() {
            let matched = page.document().matches(node, &matchers[index]);
            if matched {
                state.mark(index);
            }
        }
        if state.settle(page) {
            Disposition::Disconnect
        } else {
            Disposition::Keep
        }
    })?;
    composite.track_observer(observer);

    tracing::debug!(
        "[Composite] Waiter {} pending on {:?}",
        composite.id(),
        composite.pending()
    );
    Ok(WaitOutcome::Pending)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dom::Selector;
    use std::cell::{Cell, RefCell};

    fn selectors(sources: &[&str]) -> Vec<Selector> {
        Selector::parse_all(sources).unwrap()
    }

    #[test]
    fn test_existing_elements_reported_first() {
        let page = Page::blank();
        let body = page.observe_root();
        let existing = {
            let mut doc = page.document_mut();
            let a = doc.create_element_with("div", &[("class", "hotel")]);
            let b = doc.create_element_with("div", &[("class", "hotel")]);
            doc.append_children(body, &[a, b]).unwrap();
            vec![a, b]
        };
        page.flush();

        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        on_element_available(&page, Selector::parse(".hotel").unwrap(), move |_, node| {
            sink.borrow_mut().push(node)
        })
        .unwrap();
        assert_eq!(*seen.borrow(), existing);

        let late = page.document_mut().create_element_with("div", &[("class", "hotel")]);
        page.document_mut().append_child(body, late).unwrap();
        page.flush();
        assert_eq!(seen.borrow().len(), 3);
        assert_eq!(seen.borrow()[2], late);
    }

    #[test]
    fn test_all_available_fires_once_in_either_order() {
        for order in [["a", "b"], ["b", "a"]] {
            let page = Page::blank();
            let body = page.observe_root();
            let fired = Rc::new(Cell::new(0));

            let counter = fired.clone();
            let outcome = all_elements_available(&page, selectors(&["a", "b"]), move |_| {
                counter.set(counter.get() + 1)
            })
            .unwrap();
            assert_eq!(outcome, WaitOutcome::Pending);

            for tag in order {
                let node = page.document_mut().create_element(tag);
                page.document_mut().append_child(body, node).unwrap();
                page.flush();
            }
            let extra = page.document_mut().create_element("a");
            page.document_mut().append_child(body, extra).unwrap();
            page.flush();

            assert_eq!(fired.get(), 1, "order {:?}", order);
            assert_eq!(page.observer_count(), 0);
        }
    }

    #[test]
    fn test_all_available_immediate_without_subscription() {
        let page = Page::blank();
        let body = page.observe_root();
        {
            let mut doc = page.document_mut();
            let table = doc.create_element("table");
            let form = doc.create_element("form");
            doc.append_children(body, &[table, form]).unwrap();
        }

        let fired = Rc::new(Cell::new(false));
        let flag = fired.clone();
        let outcome =
            all_elements_available(&page, selectors(&["table", "form"]), move |_| flag.set(true))
                .unwrap();

        assert_eq!(outcome, WaitOutcome::Immediate);
        assert!(fired.get());
        assert_eq!(page.observer_count(), 0);
    }

    #[test]
    fn test_empty_matcher_list_fires_immediately() {
        let page = Page::blank();
        let fired = Rc::new(Cell::new(false));
        let flag = fired.clone();
        let outcome =
            all_elements_available(&page, Vec::<Selector>::new(), move |_| flag.set(true))
                .unwrap();
        assert_eq!(outcome, WaitOutcome::Immediate);
        assert!(fired.get());
    }

    #[test]
    fn test_duplicate_matchers_satisfied_together() {
        let page = Page::blank();
        let body = page.observe_root();
        let fired = Rc::new(Cell::new(0));

        let counter = fired.clone();
        all_elements_available(&page, selectors(&["p", "p"]), move |_| {
            counter.set(counter.get() + 1)
        })
        .unwrap();

        let p = page.document_mut().create_element("p");
        page.document_mut().append_child(body, p).unwrap();
        page.flush();
        assert_eq!(fired.get(), 1);
    }
}
