//! Mutation records and observer registrations
//!
//! Follows the DOM "queue a mutation record" algorithm: a record for `target`
//! is offered to every registration on an inclusive ancestor of `target`,
//! each interested observer receives it at most once, and records wait in a
//! per-observer queue until someone takes them.

use crate::arena::DomArena;
use crate::types::NodeId;
use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::BTreeMap;

/// Opaque observer handle, ordered by creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObserverId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MutationType {
    ChildList,
    Attributes,
}

/// A single change to the tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationRecord {
    pub mutation_type: MutationType,
    pub target: NodeId,
    pub added_nodes: SmallVec<[NodeId; 2]>,
    pub removed_nodes: SmallVec<[NodeId; 2]>,
    pub attribute_name: Option<String>,
    pub old_value: Option<String>,
}

impl MutationRecord {
    pub fn child_list(
        target: NodeId,
        added_nodes: SmallVec<[NodeId; 2]>,
        removed_nodes: SmallVec<[NodeId; 2]>,
    ) -> Self {
        Self {
            mutation_type: MutationType::ChildList,
            target,
            added_nodes,
            removed_nodes,
            attribute_name: None,
            old_value: None,
        }
    }

    pub fn attributes(target: NodeId, name: &str, old_value: Option<String>) -> Self {
        Self {
            mutation_type: MutationType::Attributes,
            target,
            added_nodes: SmallVec::new(),
            removed_nodes: SmallVec::new(),
            attribute_name: Some(name.to_string()),
            old_value,
        }
    }
}

/// What an observer wants to hear about (MutationObserverInit)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObserveOptions {
    pub child_list: bool,
    pub attributes: bool,
    pub subtree: bool,
    pub attribute_old_value: bool,
    /// Restrict attribute records to these names
    pub attribute_filter: Option<Vec<String>>,
}

impl ObserveOptions {
    /// Inserted and removed children anywhere below the target
    pub fn child_list_subtree() -> Self {
        Self {
            child_list: true,
            subtree: true,
            ..Self::default()
        }
    }

    /// Attribute changes on the target itself, with previous values
    pub fn attributes_with_old_value() -> Self {
        Self {
            attributes: true,
            attribute_old_value: true,
            ..Self::default()
        }
    }

    pub fn with_attribute_filter<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attributes = true;
        self.attribute_filter = Some(names.into_iter().map(Into::into).collect());
        self
    }

    fn wants(&self, record: &MutationRecord) -> bool {
        match record.mutation_type {
            MutationType::ChildList => self.child_list,
            MutationType::Attributes => {
                self.attributes
                    && match (&self.attribute_filter, &record.attribute_name) {
                        (Some(filter), Some(name)) => filter.iter().any(|f| f == name),
                        (Some(_), None) => false,
                        (None, _) => true,
                    }
            }
        }
    }
}

#[derive(Debug, Clone)]
struct Registration {
    observer: ObserverId,
    options: ObserveOptions,
}

/// Registrations plus pending record queues for every observer
#[derive(Debug, Default)]
pub struct MutationQueue {
    next_id: u32,
    /// target node → registrations on that node
    registrations: AHashMap<NodeId, SmallVec<[Registration; 2]>>,
    /// Ordered by observer creation, which is also delivery order
    pending: BTreeMap<ObserverId, Vec<MutationRecord>>,
}

impl MutationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate an observer with an empty queue
    pub fn create_observer(&mut self) -> ObserverId {
        let id = ObserverId(self.next_id);
        self.next_id += 1;
        self.pending.insert(id, Vec::new());
        id
    }

    /// Register (or re-register) `observer` on `target`
    ///
    /// Observing the same node again replaces the previous options, as
    /// `MutationObserver.observe` does.
    pub fn observe(&mut self, observer: ObserverId, target: NodeId, options: ObserveOptions) {
        let regs = self.registrations.entry(target).or_default();
        match regs.iter_mut().find(|r| r.observer == observer) {
            Some(existing) => existing.options = options,
            None => regs.push(Registration { observer, options }),
        }
    }

    /// Drop every registration and pending record of `observer`
    pub fn disconnect(&mut self, observer: ObserverId) {
        self.registrations.retain(|_, regs| {
            regs.retain(|r| r.observer != observer);
            !regs.is_empty()
        });
        self.pending.remove(&observer);
    }

    /// Live observers (created and not disconnected)
    pub fn observer_count(&self) -> usize {
        self.pending.len()
    }

    /// Nodes `observer` is registered on
    pub fn observed_targets(&self, observer: ObserverId) -> Vec<NodeId> {
        let mut targets: Vec<NodeId> = self
            .registrations
            .iter()
            .filter(|(_, regs)| regs.iter().any(|r| r.observer == observer))
            .map(|(&target, _)| target)
            .collect();
        targets.sort_unstable();
        targets
    }

    /// Fan a record out to every interested observer
    pub fn queue(&mut self, arena: &DomArena, record: MutationRecord) {
        // observer → whether it asked for the old value
        let mut interested: SmallVec<[(ObserverId, bool); 4]> = SmallVec::new();

        for node in arena.inclusive_ancestors(record.target) {
            let Some(regs) = self.registrations.get(&node) else {
                continue;
            };
            for reg in regs {
                if node != record.target && !reg.options.subtree {
                    continue;
                }
                if !reg.options.wants(&record) {
                    continue;
                }
                match interested.iter_mut().find(|(id, _)| *id == reg.observer) {
                    Some((_, old)) => *old |= reg.options.attribute_old_value,
                    None => interested.push((reg.observer, reg.options.attribute_old_value)),
                }
            }
        }

        for (observer, keep_old_value) in interested {
            let Some(queue) = self.pending.get_mut(&observer) else {
                continue;
            };
            let mut delivered = record.clone();
            if delivered.mutation_type == MutationType::Attributes && !keep_old_value {
                delivered.old_value = None;
            }
            queue.push(delivered);
        }
    }

    /// Take the queued records of one observer
    pub fn take_records(&mut self, observer: ObserverId) -> Vec<MutationRecord> {
        self.pending
            .get_mut(&observer)
            .map(std::mem::take)
            .unwrap_or_default()
    }

    /// First observer (creation order) with a non-empty queue, and its batch
    pub fn next_batch(&mut self) -> Option<(ObserverId, Vec<MutationRecord>)> {
        let (&observer, queue) = self.pending.iter_mut().find(|(_, q)| !q.is_empty())?;
        Some((observer, std::mem::take(queue)))
    }

    pub fn has_pending(&self) -> bool {
        self.pending.values().any(|q| !q.is_empty())
    }
}
