//! Mutation Listener - raw batch delivery for a subtree
//!
//! Subscriptions live as long as the page; there is no public disconnect.

use dom::{MutationRecord, NodeId, ObserveOptions, ObserverId};
use tokio::sync::mpsc;

use crate::error::Result;
use crate::page::{Disposition, Page};

/// Deliver every batch of `options`-matching records below `root`
///
/// Batches arrive at [`Page::flush`], in the order the mutations happened.
pub fn observe<F>(
    page: &Page,
    root: NodeId,
    options: ObserveOptions,
    mut callback: F,
) -> Result<ObserverId>
where
    F: FnMut(&Page, &[MutationRecord]) + 'static,
{
    let observer = page.create_observer(move |page, records| {
        callback(page, records);
        Disposition::Keep
    });
    if let Err(e) = page.observe(observer, root, options) {
        page.disconnect(observer);
        return Err(e);
    }
    tracing::debug!(
        "[Listener] Observer {:?} listening below {}",
        observer,
        page.describe(root)
    );
    Ok(observer)
}

/// Same batches as [`observe`], pushed into a channel
///
/// The stream never ends on its own. Dropping the receiver retires the
/// observer at the next delivery.
pub fn mutation_stream(
    page: &Page,
    root: NodeId,
    options: ObserveOptions,
) -> Result<mpsc::UnboundedReceiver<Vec<MutationRecord>>> {
    let (tx, rx) = mpsc::unbounded_channel();
    let observer = page.create_observer(move |_, records| {
        match tx.send(records.to_vec()) {
            Ok(()) => Disposition::Keep,
            Err(_) => Disposition::Disconnect,
        }
    });
    if let Err(e) = page.observe(observer, root, options) {
        page.disconnect(observer);
        return Err(e);
    }
    Ok(rx)
}
