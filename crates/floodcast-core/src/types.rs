//! Identifier types for the floodcast protocol

use serde::{Deserialize, Serialize};

/// Per-sender message sequence number used for request/response correlation.
pub type MsgId = u64;

/// Unique node identifier (newtype for type safety)
///
/// Cluster nodes are named `n1`, `n2`, ... and external clients `c1`, `c2`,
/// ... by the substrate; this type treats both uniformly.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// Create a node identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for NodeId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_id_is_transparent_on_the_wire() {
        let id = NodeId::new("n1");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"n1\"");

        let parsed: NodeId = serde_json::from_str("\"c7\"").unwrap();
        assert_eq!(parsed.as_str(), "c7");
    }

    #[test]
    fn test_node_id_ordering_is_lexicographic() {
        let mut ids = vec![NodeId::new("n3"), NodeId::new("n1"), NodeId::new("n2")];
        ids.sort();
        assert_eq!(ids, vec!["n1".into(), "n2".into(), "n3".into()]);
    }
}
