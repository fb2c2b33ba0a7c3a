//! Async adapters over the waiters
//!
//! Each adapter hands back a `oneshot::Receiver` that completes when the
//! waiter resolves. The page still has to be driven (mutations flushed,
//! signals dispatched) for that to happen; a waiter that never resolves
//! leaves the receiver pending.

use std::cell::Cell;
use std::rc::Rc;

use dom::{ElementMatcher, NodeId};
use tokio::sync::oneshot;

use crate::available::all_elements_available;
use crate::click::all_elements_click_handled;
use crate::composite::SharedComposite;
use crate::error::Result;
use crate::events::WaiterKind;
use crate::input::on_input_has_value;
use crate::page::{Disposition, Page};
use crate::registry::watch_insertions;

/// First element matching `matcher`, now or once inserted
pub fn element_available<M>(page: &Page, matcher: M) -> Result<oneshot::Receiver<NodeId>>
where
    M: ElementMatcher + 'static,
{
    let (tx, rx) = oneshot::channel();
    let found = Rc::new(Cell::new(None));
    let slot = found.clone();
    let composite = SharedComposite::new(page, WaiterKind::ElementAvailable, 1, move |_| {
        if let Some(node) = slot.get() {
            let _ = tx.send(node);
        }
    });

    let existing = page.document().query_selector(&matcher);
    if let Some(node) = existing {
        found.set(Some(node));
        composite.mark(0);
        composite.settle(page);
        return Ok(rx);
    }

    let state = composite.clone();
    let observer = watch_insertions(page, matcher, move |page, node| {
        found.set(Some(node));
        state.mark(0);
        if state.settle(page) {
            Disposition::Disconnect
        } else {
            Disposition::Keep
        }
    })?;
    composite.track_observer(observer);
    Ok(rx)
}

pub fn elements_available<M>(page: &Page, matchers: Vec<M>) -> Result<oneshot::Receiver<()>>
where
    M: ElementMatcher + 'static,
{
    let (tx, rx) = oneshot::channel();
    all_elements_available(page, matchers, move |_| {
        let _ = tx.send(());
    })?;
    Ok(rx)
}

pub fn elements_click_handled<M>(page: &Page, matchers: Vec<M>) -> Result<oneshot::Receiver<()>>
where
    M: ElementMatcher + 'static,
{
    let (tx, rx) = oneshot::channel();
    all_elements_click_handled(page, matchers, move |_| {
        let _ = tx.send(());
    })?;
    Ok(rx)
}

pub fn input_has_value<M>(page: &Page, matcher: M, value: &str) -> Result<oneshot::Receiver<()>>
where
    M: ElementMatcher,
{
    let (tx, rx) = oneshot::channel();
    on_input_has_value(page, matcher, value, move |_| {
        let _ = tx.send(());
    })?;
    Ok(rx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dom::Selector;

    #[tokio::test]
    async fn test_element_available_resolves_on_insertion() {
        let page = Page::blank();
        let body = page.observe_root();
        let mut rx = element_available(&page, Selector::parse("div.price").unwrap()).unwrap();
        assert!(rx.try_recv().is_err());

        let price = page.document_mut().create_element_with("div", &[("class", "price")]);
        page.document_mut().append_child(body, price).unwrap();
        page.flush();

        assert_eq!(rx.await.unwrap(), price);
        assert_eq!(page.observer_count(), 0);
    }

    #[tokio::test]
    async fn test_element_available_resolves_immediately() {
        let page = Page::blank();
        let rx = element_available(&page, Selector::parse("body").unwrap()).unwrap();
        assert_eq!(rx.await.unwrap(), page.observe_root());
        assert_eq!(page.observer_count(), 0);
    }
}
