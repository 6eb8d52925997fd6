//! Line topology.

use crate::{Direction, NodeId};

/// Errors that can occur when validating topology information.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TopologyError {
    /// A line needs at least one node.
    #[error("node count must be at least 1")]
    EmptyLine,

    /// The local node id does not fit in `1..=node_count`.
    #[error("node {local} is outside the line 1..={node_count}")]
    LocalOutOfRange { local: NodeId, node_count: u32 },
}

/// A fixed line of `node_count` nodes, seen from `local`.
///
/// Node ids are dense in `1..=node_count`. Each node is physically linked to
/// `id - 1` and `id + 1` when those exist; everything else is reached by
/// relaying along the line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineTopology {
    local: NodeId,
    node_count: u32,
}

impl LineTopology {
    /// Create a topology, validating that `local` is inside the line.
    pub fn new(local: NodeId, node_count: u32) -> Result<Self, TopologyError> {
        if node_count == 0 {
            return Err(TopologyError::EmptyLine);
        }
        if local.0 < 1 || local.0 > node_count {
            return Err(TopologyError::LocalOutOfRange { local, node_count });
        }
        Ok(Self { local, node_count })
    }

    /// This node's id.
    pub fn local(&self) -> NodeId {
        self.local
    }

    /// Number of nodes in the line.
    pub fn node_count(&self) -> u32 {
        self.node_count
    }

    /// Whether `id` names a node of this line.
    pub fn contains(&self, id: NodeId) -> bool {
        id.0 >= 1 && id.0 <= self.node_count
    }

    /// Whether `id` is this node.
    pub fn is_local(&self, id: NodeId) -> bool {
        id == self.local
    }

    /// Whether `id` is a valid remote peer (in range and not this node).
    pub fn is_remote(&self, id: NodeId) -> bool {
        self.contains(id) && !self.is_local(id)
    }

    /// All node ids in ascending order.
    pub fn all_nodes(&self) -> impl Iterator<Item = NodeId> {
        (1..=self.node_count).map(NodeId)
    }

    /// All node ids except the local one, in ascending order.
    pub fn other_nodes(&self) -> impl Iterator<Item = NodeId> {
        let local = self.local;
        self.all_nodes().filter(move |id| *id != local)
    }

    /// The physically adjacent node in `direction`, if the line continues.
    pub fn neighbor(&self, direction: Direction) -> Option<NodeId> {
        let id = match direction {
            Direction::Prev => self.local.prev(),
            Direction::Next => self.local.next(),
        };
        self.contains(id).then_some(id)
    }

    /// Whether this node has a physical link in `direction`.
    pub fn has_link(&self, direction: Direction) -> bool {
        self.neighbor(direction).is_some()
    }
}
