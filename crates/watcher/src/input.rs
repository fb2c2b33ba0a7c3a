//! Value-reached waiter for form controls

use dom::{ElementMatcher, NodeId};

use crate::composite::{SharedComposite, WaitOutcome};
use crate::error::Result;
use crate::events::WaiterKind;
use crate::page::Page;

/// Call `callback` once, when the first element matching `matcher` holds
/// `value`
///
/// The element is resolved once, at call time. A missing value reads as
/// the empty string. Each configured input signal re-checks the value; the
/// listeners go away as soon as it matches. With no matching element the
/// waiter stays pending for good.
pub fn on_input_has_value<M, F>(
    page: &Page,
    matcher: M,
    value: &str,
    callback: F,
) -> Result<WaitOutcome>
where
    M: ElementMatcher,
    F: FnOnce(&Page) + 'static,
{
    let composite = SharedComposite::new(page, WaiterKind::InputHasValue, 1, callback);

    let element = page.document().query_selector(&matcher);
    let Some(element) = element else {
        tracing::warn!(
            "[InputWaiter] No element matches '{}'; waiter {} will never resolve",
            matcher.describe(),
            composite.id()
        );
        return Ok(WaitOutcome::Pending);
    };

    if has_value(page, element, value) {
        composite.mark(0);
        composite.settle(page);
        return Ok(WaitOutcome::Immediate);
    }

    let expected = value.to_string();
    for signal in &page.config().input_signals {
        let state = composite.clone();
        let expected = expected.clone();
        let listener = page.add_event_listener(element, signal, move |page, event| {
            if has_value(page, event.target, &expected) {
                state.mark(0);
                state.settle(page);
            }
        })?;
        composite.track_listener(listener);
    }

    tracing::debug!(
        "[InputWaiter] Waiting for {} to hold {:?}",
        page.describe(element),
        value
    );
    Ok(WaitOutcome::Pending)
}

fn has_value(page: &Page, node: NodeId, expected: &str) -> bool {
    page.document().value(node).unwrap_or("") == expected
}
