//! Eenrichtingsverbindingen tussen attributen.

use std::fmt;

use super::node::NodeId;

/// Verwijzing naar één attribuut van één node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AttrRef {
    pub node: NodeId,
    pub attr: String,
}

impl AttrRef {
    #[must_use]
    pub fn new(node: impl Into<NodeId>, attr: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            attr: attr.into(),
        }
    }
}

impl fmt::Display for AttrRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.node, self.attr)
    }
}

/// Verbinding van een bronattribuut naar een doelattribuut.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Wire {
    pub from: AttrRef,
    pub to: AttrRef,
}

impl Wire {
    #[must_use]
    pub fn new<F, T, AF, AT>(from_node: F, from_attr: AF, to_node: T, to_attr: AT) -> Self
    where
        F: Into<NodeId>,
        T: Into<NodeId>,
        AF: Into<String>,
        AT: Into<String>,
    {
        Self {
            from: AttrRef::new(from_node, from_attr),
            to: AttrRef::new(to_node, to_attr),
        }
    }

    #[must_use]
    pub fn touches(&self, node: NodeId) -> bool {
        self.from.node == node || self.to.node == node
    }
}
