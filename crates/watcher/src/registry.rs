//! Condition Registry - insertion and attribute watches
//!
//! Both watches match at delivery time, against the tree as it is when
//! [`Page::flush`] runs. The document borrow used for matching is released
//! before any callback is entered.

use dom::{ElementMatcher, MutationType, NodeId, ObserveOptions, ObserverId};

use crate::error::Result;
use crate::page::{Disposition, Page};

/// Run `callback` for every inserted element that satisfies `matcher`
///
/// Fires once per insertion, so an element that is removed and inserted
/// again is reported again. Only the nodes a record adds directly are
/// tested, not their descendants.
pub fn on_element_inserted<M, F>(page: &Page, matcher: M, mut callback: F) -> Result<ObserverId>
where
    M: ElementMatcher + 'static,
    F: FnMut(&Page, NodeId) + 'static,
{
    tracing::debug!("[Registry] Watching insertions of '{}'", matcher.describe());
    watch_insertions(page, matcher, move |page, node| {
        callback(page, node);
        Disposition::Keep
    })
}

/// Run `callback` whenever `attr_name` changes on an element matching now
///
/// The callback gets the element and the attribute's previous value.
/// Elements that only start matching after this call are not watched.
pub fn on_attr_changed<M, F>(
    page: &Page,
    matcher: M,
    attr_name: &str,
    mut callback: F,
) -> Result<ObserverId>
where
    M: ElementMatcher + 'static,
    F: FnMut(&Page, NodeId, Option<&str>) + 'static,
{
    watch_attribute(page, matcher, attr_name, move |page, node, old_value| {
        callback(page, node, old_value);
        Disposition::Keep
    })
}

/// Insertion watch on the configured observe root
///
/// `on_match` may stop the rest of the batch by returning
/// [`Disposition::Disconnect`], which also retires the observer.
pub(crate) fn watch_insertions<M, F>(page: &Page, matcher: M, mut on_match: F) -> Result<ObserverId>
where
    M: ElementMatcher + 'static,
    F: FnMut(&Page, NodeId) -> Disposition + 'static,
{
    let root = page.observe_root();
    let observer = page.create_observer(move |page, records| {
        for record in records {
            if record.mutation_type != MutationType::ChildList {
                continue;
            }
            for &node in &record.added_nodes {
                let matched = {
                    let doc = page.document();
                    doc.arena().is_element(node) && doc.matches(node, &matcher)
                };
                if !matched {
                    continue;
                }
                tracing::trace!("[Registry] Inserted {}", page.describe(node));
                if on_match(page, node) == Disposition::Disconnect {
                    return Disposition::Disconnect;
                }
            }
        }
        Disposition::Keep
    });

    if let Err(e) = page.observe(observer, root, ObserveOptions::child_list_subtree()) {
        page.disconnect(observer);
        return Err(e);
    }
    Ok(observer)
}

/// Attribute watch on a snapshot of the elements matching now
pub(crate) fn watch_attribute<M, F>(
    page: &Page,
    matcher: M,
    attr_name: &str,
    mut on_change: F,
) -> Result<ObserverId>
where
    M: ElementMatcher + 'static,
    F: FnMut(&Page, NodeId, Option<&str>) -> Disposition + 'static,
{
    let attr_name = attr_name.to_ascii_lowercase();
    let targets = page.query_all(&matcher);
    tracing::debug!(
        "[Registry] Watching '{}' on {} element(s) matching '{}'",
        attr_name,
        targets.len(),
        matcher.describe()
    );

    let options =
        ObserveOptions::attributes_with_old_value().with_attribute_filter([attr_name.clone()]);
    let watched = attr_name.clone();
    let observer = page.create_observer(move |page, records| {
        for record in records {
            if record.mutation_type != MutationType::Attributes
                || record.attribute_name.as_deref() != Some(watched.as_str())
            {
                continue;
            }
            // The element must still match when the change is delivered
            let still_matches = page.document().matches(record.target, &matcher);
            if !still_matches {
                continue;
            }
            tracing::trace!(
                "[Registry] '{}' changed on {}",
                watched,
                page.describe(record.target)
            );
            if on_change(page, record.target, record.old_value.as_deref())
                == Disposition::Disconnect
            {
                return Disposition::Disconnect;
            }
        }
        Disposition::Keep
    });

    for target in targets {
        if let Err(e) = page.observe(observer, target, options.clone()) {
            page.disconnect(observer);
            return Err(e);
        }
    }
    Ok(observer)
}
