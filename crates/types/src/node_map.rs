//! Dense per-node storage.

use crate::NodeId;
use std::collections::BTreeMap;

/// A fixed-size map with one slot per node id in `1..=N`.
///
/// Sized once at construction. Lookups with an id outside the line return
/// `None`; there is no panicking index operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeMap<T> {
    slots: Vec<T>,
}

impl<T> NodeMap<T> {
    /// Build a map for `node_count` nodes, initializing each slot from its id.
    pub fn from_fn(node_count: u32, mut init: impl FnMut(NodeId) -> T) -> Self {
        let slots = (1..=node_count).map(|id| init(NodeId(id))).collect();
        Self { slots }
    }

    /// Number of slots (the node count).
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the map has no slots.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn slot(&self, id: NodeId) -> Option<usize> {
        let index = (id.0 as usize).checked_sub(1)?;
        (index < self.slots.len()).then_some(index)
    }

    /// Get the value for `id`, or `None` if `id` is outside the line.
    pub fn get(&self, id: NodeId) -> Option<&T> {
        self.slot(id).map(|i| &self.slots[i])
    }

    /// Get a mutable reference to the value for `id`.
    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut T> {
        self.slot(id).map(move |i| &mut self.slots[i])
    }

    /// Replace the value for `id`. Returns `false` if `id` is outside the line.
    pub fn set(&mut self, id: NodeId, value: T) -> bool {
        match self.get_mut(id) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    /// Iterate `(id, value)` pairs in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &T)> {
        self.slots
            .iter()
            .enumerate()
            .map(|(i, v)| (NodeId(i as u32 + 1), v))
    }

    /// Iterate `(id, &mut value)` pairs in ascending id order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (NodeId, &mut T)> {
        self.slots
            .iter_mut()
            .enumerate()
            .map(|(i, v)| (NodeId(i as u32 + 1), v))
    }

    /// Whether every slot satisfies `predicate`.
    pub fn all(&self, predicate: impl FnMut(&T) -> bool) -> bool {
        self.slots.iter().all(predicate)
    }
}

impl<T: Clone> NodeMap<T> {
    /// Build a map with every slot set to `value`.
    pub fn filled(node_count: u32, value: T) -> Self {
        Self {
            slots: vec![value; node_count as usize],
        }
    }

    /// Copy into an ordered map keyed by node id.
    pub fn to_btree(&self) -> BTreeMap<NodeId, T> {
        self.iter().map(|(id, v)| (id, v.clone())).collect()
    }
}
