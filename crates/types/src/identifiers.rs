//! Identifier newtypes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a node in the line, in `1..=N`.
///
/// Serialized as a bare integer so it can appear directly on the wire and as
/// a JSON object key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u32);

impl NodeId {
    /// The id immediately to the left in the line (may be out of range).
    pub fn prev(self) -> NodeId {
        NodeId(self.0.saturating_sub(1))
    }

    /// The id immediately to the right in the line (may be out of range).
    pub fn next(self) -> NodeId {
        NodeId(self.0.saturating_add(1))
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for NodeId {
    fn from(id: u32) -> Self {
        NodeId(id)
    }
}

/// One of the two physical links a node has in the line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Towards lower node ids.
    Prev,
    /// Towards higher node ids.
    Next,
}

impl Direction {
    /// The opposite link.
    pub fn reverse(self) -> Direction {
        match self {
            Direction::Prev => Direction::Next,
            Direction::Next => Direction::Prev,
        }
    }

    /// Short name for logging.
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Prev => "prev",
            Direction::Next => "next",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
