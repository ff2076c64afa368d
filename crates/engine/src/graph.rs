//! The in-memory flow graph — built once per execution and read-only from
//! then on, so concurrent edits to a flow never change a run already in
//! flight.
//!
//! Nodes and edges are stored flat and referenced by stable string IDs
//! rather than by pointers; the node/edge model is a general directed graph
//! and cycles are representable, so termination is enforced by the engine's
//! step ceiling, not here.
//!
//! Build-time rules:
//! 1. Node IDs must be unique within the flow.
//! 2. Exactly one node must be a start node (zero behaves as "flow not
//!    found"; the flow is not executable).
//! 3. Every non-start, non-end node must have at least one outgoing edge.
//!
//! Edges referencing missing nodes are deliberately NOT rejected here: the
//! editor can save them, and they surface as `NodeNotFound` when traversal
//! actually reaches them.

use std::collections::{HashMap, HashSet, VecDeque};

use tracing::warn;
use uuid::Uuid;

use crate::models::{FlowEdge, FlowNode};
use crate::EngineError;

/// Adjacency view over one flow's nodes and edges.
#[derive(Debug)]
pub struct FlowGraph {
    flow_id: Uuid,
    nodes: HashMap<String, FlowNode>,
    edges: Vec<FlowEdge>,
    /// Edge indices per source node, in insertion order (stable fan-out).
    outgoing: HashMap<String, Vec<usize>>,
    start_id: String,
}

impl FlowGraph {
    /// Validate and index a flow's structure.
    pub fn new(
        flow_id: Uuid,
        nodes: Vec<FlowNode>,
        edges: Vec<FlowEdge>,
    ) -> Result<Self, EngineError> {
        let mut node_map: HashMap<String, FlowNode> = HashMap::with_capacity(nodes.len());
        let mut start_ids: Vec<String> = Vec::new();

        for node in nodes {
            if node.kind.is_start() {
                start_ids.push(node.node_id.clone());
            }
            if node_map.insert(node.node_id.clone(), node).is_some() {
                return Err(EngineError::InvalidGraph(format!(
                    "duplicate node id in flow {flow_id}"
                )));
            }
        }

        let start_id = match start_ids.as_slice() {
            [only] => only.clone(),
            [] => return Err(EngineError::FlowNotFound(flow_id)),
            many => {
                return Err(EngineError::InvalidGraph(format!(
                    "flow {flow_id} has {} start nodes",
                    many.len()
                )))
            }
        };

        let mut outgoing: HashMap<String, Vec<usize>> = HashMap::new();
        for (idx, edge) in edges.iter().enumerate() {
            outgoing.entry(edge.source.clone()).or_default().push(idx);
        }

        for node in node_map.values() {
            if node.kind.is_start() || node.kind.is_end() {
                continue;
            }
            if !outgoing.contains_key(&node.node_id) {
                return Err(EngineError::InvalidGraph(format!(
                    "node '{}' has no outgoing edge",
                    node.node_id
                )));
            }
        }

        let graph = Self {
            flow_id,
            nodes: node_map,
            edges,
            outgoing,
            start_id,
        };
        graph.warn_unreachable();
        Ok(graph)
    }

    /// The unique start node.
    pub fn start_node(&self) -> &FlowNode {
        // Guaranteed present by `new`.
        &self.nodes[&self.start_id]
    }

    /// Look up a node; a miss means a corrupt edge reference.
    pub fn node(&self, node_id: &str) -> Result<&FlowNode, EngineError> {
        self.nodes.get(node_id).ok_or_else(|| EngineError::NodeNotFound {
            node_id: node_id.to_string(),
        })
    }

    /// All edges whose source is `node_id`, in a stable order.
    pub fn outgoing_edges(&self, node_id: &str) -> Vec<&FlowEdge> {
        self.outgoing
            .get(node_id)
            .map(|indices| indices.iter().map(|&i| &self.edges[i]).collect())
            .unwrap_or_default()
    }

    /// Outgoing edges restricted to a selected branch handle, when one was
    /// reported by the node executor.
    pub fn matching_edges(&self, node_id: &str, handle: Option<&str>) -> Vec<&FlowEdge> {
        let edges = self.outgoing_edges(node_id);
        match handle {
            Some(handle) => edges
                .into_iter()
                .filter(|e| e.source_handle.as_deref() == Some(handle))
                .collect(),
            None => edges,
        }
    }

    pub fn flow_id(&self) -> Uuid {
        self.flow_id
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    fn warn_unreachable(&self) {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut queue: VecDeque<&str> = VecDeque::new();
        seen.insert(self.start_id.as_str());
        queue.push_back(self.start_id.as_str());

        while let Some(node_id) = queue.pop_front() {
            for edge in self.outgoing_edges(node_id) {
                if self.nodes.contains_key(&edge.target) && seen.insert(edge.target.as_str()) {
                    queue.push_back(edge.target.as_str());
                }
            }
        }

        for node_id in self.nodes.keys() {
            if !seen.contains(node_id.as_str()) {
                warn!(flow_id = %self.flow_id, node_id, "node is unreachable from the start node");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Position;
    use nodes::kind::{EndData, MessageData};
    use nodes::NodeKind;
    use serde_json::Value;

    fn node(id: &str, kind: NodeKind) -> FlowNode {
        FlowNode {
            node_id: id.to_string(),
            kind,
            position: Position::default(),
        }
    }

    fn message(id: &str) -> FlowNode {
        node(
            id,
            NodeKind::Message(MessageData {
                label: None,
                message: "hi".into(),
            }),
        )
    }

    fn end(id: &str) -> FlowNode {
        node(id, NodeKind::End(EndData::default()))
    }

    fn edge(id: &str, source: &str, target: &str, handle: Option<&str>) -> FlowEdge {
        FlowEdge {
            edge_id: id.to_string(),
            source: source.to_string(),
            target: target.to_string(),
            source_handle: handle.map(str::to_string),
            target_handle: None,
            data: Value::Null,
        }
    }

    #[test]
    fn valid_linear_graph_builds() {
        let graph = FlowGraph::new(
            Uuid::new_v4(),
            vec![node("s", NodeKind::Start), message("m"), end("e")],
            vec![edge("e1", "s", "m", None), edge("e2", "m", "e", None)],
        )
        .expect("should be valid");

        assert_eq!(graph.start_node().node_id, "s");
        assert_eq!(graph.node_count(), 3);
        assert_eq!(graph.outgoing_edges("m").len(), 1);
    }

    #[test]
    fn missing_start_node_reads_as_flow_not_found() {
        let result = FlowGraph::new(
            Uuid::new_v4(),
            vec![message("m"), end("e")],
            vec![edge("e1", "m", "e", None)],
        );
        assert!(matches!(result, Err(EngineError::FlowNotFound(_))));
    }

    #[test]
    fn multiple_start_nodes_are_rejected() {
        let result = FlowGraph::new(
            Uuid::new_v4(),
            vec![node("s1", NodeKind::Start), node("s2", NodeKind::Start)],
            vec![],
        );
        assert!(matches!(result, Err(EngineError::InvalidGraph(_))));
    }

    #[test]
    fn duplicate_node_ids_are_rejected() {
        let result = FlowGraph::new(
            Uuid::new_v4(),
            vec![node("s", NodeKind::Start), message("dup"), message("dup")],
            vec![edge("e1", "s", "dup", None), edge("e2", "dup", "dup", None)],
        );
        assert!(matches!(result, Err(EngineError::InvalidGraph(_))));
    }

    #[test]
    fn dead_end_message_node_is_rejected() {
        let result = FlowGraph::new(
            Uuid::new_v4(),
            vec![node("s", NodeKind::Start), message("m")],
            vec![edge("e1", "s", "m", None)],
        );
        assert!(matches!(result, Err(EngineError::InvalidGraph(_))));
    }

    #[test]
    fn dangling_edge_target_survives_build_but_fails_lookup() {
        let graph = FlowGraph::new(
            Uuid::new_v4(),
            vec![node("s", NodeKind::Start)],
            vec![edge("e1", "s", "ghost", None)],
        )
        .expect("dangling targets are a traversal-time problem");

        assert!(matches!(
            graph.node("ghost"),
            Err(EngineError::NodeNotFound { node_id }) if node_id == "ghost"
        ));
    }

    #[test]
    fn matching_edges_filters_by_handle() {
        let graph = FlowGraph::new(
            Uuid::new_v4(),
            vec![node("s", NodeKind::Start), end("yes"), end("no")],
            vec![
                edge("e1", "s", "yes", Some("true")),
                edge("e2", "s", "no", Some("false")),
            ],
        )
        .unwrap();

        let matched = graph.matching_edges("s", Some("true"));
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].target, "yes");

        assert!(graph.matching_edges("s", Some("maybe")).is_empty());
        assert_eq!(graph.matching_edges("s", None).len(), 2);
    }

    #[test]
    fn cycles_are_representable() {
        // m1 → m2 → m1: valid structure, termination is the engine's job.
        let graph = FlowGraph::new(
            Uuid::new_v4(),
            vec![node("s", NodeKind::Start), message("m1"), message("m2")],
            vec![
                edge("e1", "s", "m1", None),
                edge("e2", "m1", "m2", None),
                edge("e3", "m2", "m1", None),
            ],
        );
        assert!(graph.is_ok());
    }
}
