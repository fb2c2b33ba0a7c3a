//! Click binding and the click-handled waiter
//!
//! An element counts as click-handled when a handler was bound through
//! [`bind_click`] (which leaves a marker attribute and dispatches the
//! configured signal) or when it carries a non-empty inline handler
//! attribute.

use std::rc::Rc;

use dom::{DomArena, ElementMatcher, NodeId};

use crate::composite::{SharedComposite, WaitOutcome};
use crate::error::Result;
use crate::events::{WaiterKind, WatchEvent};
use crate::page::{Disposition, Event, ListenerId, Page};
use crate::registry::watch_attribute;

/// Attach a click handler to `node` and announce it
///
/// Sets the marker attribute to `"true"` and dispatches the click signal on
/// the element, so waiters can tell the element is now interactive.
pub fn bind_click<F>(page: &Page, node: NodeId, handler: F) -> Result<ListenerId>
where
    F: FnMut(&Page, &Event) + 'static,
{
    let listener = page.add_event_listener(node, "click", handler)?;
    let config = page.config();
    page.document_mut()
        .set_attribute(node, &config.click_marker_attribute, "true")?;

    tracing::debug!("[ClickWaiter] Click handler bound on {}", page.describe(node));
    page.event_bus().publish(WatchEvent::ClickBound { node });
    page.dispatch_event(node, &config.click_signal)?;
    Ok(listener)
}

/// Inline handler or bound-handler marker present and non-empty
pub fn is_click_handled(page: &Page, node: NodeId) -> bool {
    let config = page.config();
    let doc = page.document();
    [
        &config.inline_click_attribute,
        &config.click_marker_attribute,
    ]
    .iter()
    .any(|name| doc.attribute(node, name).is_some_and(|v| !v.is_empty()))
}

/// Call `callback` once, when each of `matchers` has a click-handled element
///
/// Fast path: if every matcher is already satisfied the callback runs before
/// this returns and nothing is subscribed. Otherwise, for the matchers still
/// missing, the click signal is listened for on their current elements and
/// the inline handler attribute is watched on them; either satisfies a
/// matcher.
pub fn all_elements_click_handled<M, F>(
    page: &Page,
    matchers: Vec<M>,
    callback: F,
) -> Result<WaitOutcome>
where
    M: ElementMatcher + 'static,
    F: FnOnce(&Page) + 'static,
{
    let composite = SharedComposite::new(
        page,
        WaiterKind::AllElementsClickHandled,
        matchers.len(),
        callback,
    );

    for (index, matcher) in matchers.iter().enumerate() {
        let handled = page
            .query_all(matcher)
            .into_iter()
            .any(|node| is_click_handled(page, node));
        if handled {
            composite.mark(index);
        }
    }
    if composite.settle(page) {
        tracing::debug!("[ClickWaiter] All elements already click-handled");
        return Ok(WaitOutcome::Immediate);
    }

    let matchers: Rc<[M]> = matchers.into();
    let remaining = composite.pending();
    let signal = page.config().click_signal.clone();

    for &index in &remaining {
        for node in page.query_all(&matchers[index]) {
            let state = composite.clone();
            let listener = page.add_event_listener(node, &signal, move |page, _| {
                state.mark(index);
                state.settle(page);
            })?;
            composite.track_listener(listener);
        }
    }

    let union = {
        let matchers = matchers.clone();
        let remaining = remaining.clone();
        move |arena: &DomArena, node: NodeId| {
            remaining
                .iter()
                .any(|&index| matchers[index].matches(arena, node))
        }
    };
    let inline_attribute = page.config().inline_click_attribute.clone();
    let watched = inline_attribute.clone();
    let state = composite.clone();
    let observer = watch_attribute(page, union, &inline_attribute, move |page, node, _| {
        let has_handler = page
            .document()
            .attribute(node, &watched)
            .is_some_and(|v| !v.is_empty());
        if !has_handler {
            return Disposition::Keep;
        }
        for &index in &remaining {
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
        "[ClickWaiter] Waiter {} pending on {:?}",
        composite.id(),
        composite.pending()
    );
    Ok(WaitOutcome::Pending)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dom::Selector;
    use std::cell::Cell;

    fn page_with(elements: &[(&str, Option<(&str, &str)>)]) -> (Page, Vec<NodeId>) {
        let page = Page::blank();
        let body = page.observe_root();
        let nodes = {
            let mut doc = page.document_mut();
            let nodes: Vec<NodeId> = elements
                .iter()
                .map(|(tag, attr)| match attr {
                    Some(attr) => doc.create_element_with(tag, &[*attr]),
                    None => doc.create_element(tag),
                })
                .collect();
            doc.append_children(body, &nodes).unwrap();
            nodes
        };
        page.flush();
        (page, nodes)
    }

    #[test]
    fn test_bind_click_marks_and_signals() {
        let (page, nodes) = page_with(&[("button", None)]);
        let button = nodes[0];
        let signalled = Rc::new(Cell::new(false));

        let flag = signalled.clone();
        page.add_event_listener(button, "click_event_handled", move |_, _| flag.set(true))
            .unwrap();
        assert!(!is_click_handled(&page, button));

        let clicks = Rc::new(Cell::new(0));
        let counter = clicks.clone();
        bind_click(&page, button, move |_, _| counter.set(counter.get() + 1)).unwrap();

        assert!(signalled.get());
        assert!(is_click_handled(&page, button));
        assert_eq!(page.document().attribute(button, "click_handled"), Some("true"));

        page.dispatch_event(button, "click").unwrap();
        assert_eq!(clicks.get(), 1);
    }

    #[test]
    fn test_empty_inline_handler_does_not_count() {
        let (page, nodes) = page_with(&[
            ("a", Some(("onclick", ""))),
            ("a", Some(("onclick", "go()"))),
        ]);
        assert!(!is_click_handled(&page, nodes[0]));
        assert!(is_click_handled(&page, nodes[1]));
    }

    #[test]
    fn test_fast_path_leaves_nothing_subscribed() {
        let (page, nodes) = page_with(&[("a", Some(("onclick", "next()"))), ("button", None)]);
        bind_click(&page, nodes[1], |_, _| {}).unwrap();
        let listeners = page.listener_count();
        let observers = page.observer_count();

        let fired = Rc::new(Cell::new(false));
        let flag = fired.clone();
        let outcome = all_elements_click_handled(
            &page,
            Selector::parse_all(&["a", "button"]).unwrap(),
            move |_| flag.set(true),
        )
        .unwrap();

        assert_eq!(outcome, WaitOutcome::Immediate);
        assert!(fired.get());
        assert_eq!(page.listener_count(), listeners);
        assert_eq!(page.observer_count(), observers);
    }

    #[test]
    fn test_signal_and_inline_attribute_both_satisfy() {
        let (page, nodes) = page_with(&[("a", None), ("button", None), ("span", None)]);
        let fired = Rc::new(Cell::new(0));

        let counter = fired.clone();
        let outcome = all_elements_click_handled(
            &page,
            Selector::parse_all(&["a", "button"]).unwrap(),
            move |_| counter.set(counter.get() + 1),
        )
        .unwrap();
        assert_eq!(outcome, WaitOutcome::Pending);

        bind_click(&page, nodes[1], |_, _| {}).unwrap();
        assert_eq!(fired.get(), 0);

        page.document_mut()
            .set_attribute(nodes[0], "onclick", "open()")
            .unwrap();
        page.flush();
        assert_eq!(fired.get(), 1);

        // Everything the waiter installed is gone; only bind_click's listener remains
        assert_eq!(page.observer_count(), 0);
        assert_eq!(page.listener_count(), 1);

        bind_click(&page, nodes[0], |_, _| {}).unwrap();
        assert_eq!(fired.get(), 1);
    }

    #[test]
    fn test_cleared_inline_handler_is_ignored() {
        let (page, nodes) = page_with(&[("a", Some(("title", "x")))]);
        let fired = Rc::new(Cell::new(false));

        let flag = fired.clone();
        all_elements_click_handled(
            &page,
            Selector::parse_all(&["a"]).unwrap(),
            move |_| flag.set(true),
        )
        .unwrap();

        page.document_mut().set_attribute(nodes[0], "onclick", "").unwrap();
        page.flush();
        assert!(!fired.get());
    }

    #[test]
    fn test_mixed_case_marker_attribute_is_seen() {
        let config = crate::config::WatchConfig {
            click_marker_attribute: "Click_Handled".to_string(),
            inline_click_attribute: "ONCLICK".to_string(),
            ..Default::default()
        };
        let page = Page::with_config(dom::Document::new(), config).unwrap();
        let body = page.observe_root();
        let (button, link) = {
            let mut doc = page.document_mut();
            let button = doc.create_element("button");
            let link = doc.create_element_with("a", &[("onclick", "go()")]);
            doc.append_children(body, &[button, link]).unwrap();
            (button, link)
        };
        page.flush();

        bind_click(&page, button, |_, _| {}).unwrap();
        assert!(is_click_handled(&page, button));
        assert!(is_click_handled(&page, link));

        let fired = Rc::new(Cell::new(false));
        let flag = fired.clone();
        let outcome = all_elements_click_handled(
            &page,
            Selector::parse_all(&["button", "a"]).unwrap(),
            move |_| flag.set(true),
        )
        .unwrap();
        assert_eq!(outcome, WaitOutcome::Immediate);
        assert!(fired.get());
    }
}
