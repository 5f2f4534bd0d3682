//! Topologische ordening van de afhankelijkheden in een scene.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;

use super::MemoryScene;
use super::node::{NodeData, NodeId};

/// Resultaat van een topologische sortering.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Topology {
    pub order: Vec<NodeId>,
}

/// Fouttype voor topologische sortering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopologyError {
    /// De afhankelijkheden bevatten een cyclus. Bevat een pad dat de cyclus illustreert.
    Cycle { cycle: Vec<NodeId> },
}

impl fmt::Display for TopologyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cycle { cycle } => {
                if cycle.is_empty() {
                    f.write_str("scene bevat een cyclus")
                } else {
                    let chain = cycle
                        .iter()
                        .map(|NodeId(id)| id.to_string())
                        .collect::<Vec<_>>()
                        .join(" -> ");
                    write!(f, "scene bevat een cyclus: {chain}")
                }
            }
        }
    }
}

impl std::error::Error for TopologyError {}

impl Topology {
    /// Sorteert alle nodes van de scene zodat elke node na zijn afhankelijkheden
    /// komt: parent voor kind, bron voor doel, expressie-invoer voor expressie,
    /// driver en parent van de driven voor de constraint.
    pub fn sort(scene: &MemoryScene) -> Result<Self, TopologyError> {
        let nodes: Vec<NodeId> = scene.nodes().map(|node| node.id).collect();
        Self::sort_edges(&nodes, &dependency_edges(scene))
    }

    /// Kahn-sortering over een expliciete lijst van randen.
    pub fn sort_edges(nodes: &[NodeId], edges: &[(NodeId, NodeId)]) -> Result<Self, TopologyError> {
        let mut indegree: BTreeMap<NodeId, usize> = nodes.iter().map(|id| (*id, 0)).collect();
        let mut adjacency: BTreeMap<NodeId, BTreeSet<NodeId>> = nodes.iter().map(|id| (*id, BTreeSet::new())).collect();

        for (from, to) in edges {
            if from == to || !indegree.contains_key(from) || !indegree.contains_key(to) {
                continue;
            }
            if adjacency.entry(*from).or_default().insert(*to) {
                *indegree.entry(*to).or_insert(0) += 1;
            }
        }

        let mut queue: VecDeque<NodeId> = indegree
            .iter()
            .filter_map(|(node, &count)| (count == 0).then_some(*node))
            .collect();
        let mut order = Vec::with_capacity(nodes.len());

        while let Some(node) = queue.pop_front() {
            order.push(node);
            if let Some(neighbours) = adjacency.get(&node) {
                for neighbour in neighbours {
                    if let Some(count) = indegree.get_mut(neighbour) {
                        *count -= 1;
                        if *count == 0 {
                            queue.push_back(*neighbour);
                        }
                    }
                }
            }
        }

        if order.len() == indegree.len() {
            return Ok(Self { order });
        }

        let cycle = find_cycle(&adjacency).unwrap_or_default();
        Err(TopologyError::Cycle { cycle })
    }
}

fn dependency_edges(scene: &MemoryScene) -> Vec<(NodeId, NodeId)> {
    let mut edges = Vec::new();
    for node in scene.nodes() {
        if let Some(parent) = node.parent {
            edges.push((parent, node.id));
        }
        match &node.data {
            NodeData::Expression(program) => {
                for read in program.attribute_reads() {
                    if let Some(source) = scene.find_node(&read.node) {
                        edges.push((source, node.id));
                    }
                }
                for assignment in &program.assignments {
                    if let Some(target) = scene.find_node(&assignment.target.node) {
                        edges.push((node.id, target));
                    }
                }
            }
            NodeData::ParentConstraint { driver, driven } => {
                edges.push((*driver, node.id));
                if let Some(parent) = scene.node(*driven).and_then(|n| n.parent) {
                    edges.push((parent, node.id));
                }
                edges.push((node.id, *driven));
            }
            _ => {}
        }
    }
    for wire in scene.wires() {
        edges.push((wire.from.node, wire.to.node));
    }
    edges
}

fn find_cycle(adjacency: &BTreeMap<NodeId, BTreeSet<NodeId>>) -> Option<Vec<NodeId>> {
    #[derive(Clone, Copy, PartialEq, Eq)]
    enum VisitState {
        Unvisited,
        Visiting,
        Visited,
    }

    fn dfs(
        node: NodeId,
        adjacency: &BTreeMap<NodeId, BTreeSet<NodeId>>,
        state: &mut BTreeMap<NodeId, VisitState>,
        stack: &mut Vec<NodeId>,
    ) -> Option<Vec<NodeId>> {
        state.insert(node, VisitState::Visiting);
        stack.push(node);

        if let Some(neighbours) = adjacency.get(&node) {
            for neighbour in neighbours {
                match state.get(neighbour).copied().unwrap_or(VisitState::Unvisited) {
                    VisitState::Unvisited => {
                        if let Some(cycle) = dfs(*neighbour, adjacency, state, stack) {
                            return Some(cycle);
                        }
                    }
                    VisitState::Visiting => {
                        if let Some(position) = stack.iter().position(|&n| n == *neighbour) {
                            let mut cycle = stack[position..].to_vec();
                            cycle.push(*neighbour);
                            return Some(cycle);
                        }
                    }
                    VisitState::Visited => {}
                }
            }
        }

        stack.pop();
        state.insert(node, VisitState::Visited);
        None
    }

    let mut state = BTreeMap::new();
    for node in adjacency.keys() {
        if state.get(node).copied().unwrap_or(VisitState::Unvisited) == VisitState::Unvisited {
            let mut stack = Vec::new();
            if let Some(cycle) = dfs(*node, adjacency, &mut state, &mut stack) {
                return Some(cycle);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sort_respects_edges() {
        let nodes = [NodeId(0), NodeId(1), NodeId(2)];
        let edges = [(NodeId(2), NodeId(1)), (NodeId(1), NodeId(0))];
        let topo = Topology::sort_edges(&nodes, &edges).expect("acyclisch");
        assert_eq!(topo.order, vec![NodeId(2), NodeId(1), NodeId(0)]);
    }

    #[test]
    fn cycle_is_reported_with_path() {
        let nodes = [NodeId(0), NodeId(1)];
        let edges = [(NodeId(0), NodeId(1)), (NodeId(1), NodeId(0))];
        let err = Topology::sort_edges(&nodes, &edges).unwrap_err();
        let TopologyError::Cycle { cycle } = err;
        assert_eq!(cycle.first(), cycle.last());
        assert!(cycle.len() >= 3);
    }
}
