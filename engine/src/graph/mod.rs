//! Operation graph.
//!
//! Nodes live in a single arena (`Vec<Node>`) and reference each other by id.
//! Node `0` is a no-op root every traversal starts from.

mod plan;

pub use plan::{ExecutionPlan, MapSource, MapTarget, MappingEntry, SourceKind};

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::{PlanError, PlanResult};
use crate::models::RecordLocators;

pub type NodeId = u64;

/// Id of the traversal root.
pub const ROOT: NodeId = 0;

const EMPTY_PLAN: &str = r#"{"operations":[{"id":0,"in":[],"out":[]}]}"#;

/// One operation of the plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: NodeId,
    #[serde(rename = "in", default)]
    pub inputs: Vec<NodeId>,
    #[serde(default)]
    pub out: Vec<NodeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_locators: Option<RecordLocators>,
    #[serde(default)]
    pub mapping: Vec<MappingEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub result_mapping: Vec<MappingEntry>,
}

impl Node {
    pub fn new(id: NodeId) -> Self {
        Self {
            id,
            inputs: Vec::new(),
            out: Vec::new(),
            record_locators: None,
            mapping: Vec::new(),
            result_mapping: Vec::new(),
        }
    }
}

/// DAG of operations plus the set of nodes already run.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    nodes: Vec<Node>,
    visited: HashSet<NodeId>,
}

fn invalid(message: String) -> PlanError {
    PlanError::InvalidExecutionPlan(message)
}

impl Graph {
    /// Load the graph from a plan document, or an empty graph when `doc` is `None`.
    pub fn parse(doc: Option<&str>) -> PlanResult<Self> {
        let plan = ExecutionPlan::parse(doc.unwrap_or(EMPTY_PLAN))?;
        Self::from_nodes(plan.operations)
    }

    /// Build a graph from nodes, checking its structure.
    pub fn from_nodes(nodes: Vec<Node>) -> PlanResult<Self> {
        let graph = Self {
            nodes,
            visited: HashSet::new(),
        };
        graph.check_structure()?;
        Ok(graph)
    }

    fn check_structure(&self) -> PlanResult<()> {
        let root = self.node(ROOT)?;
        if !root.inputs.is_empty() {
            return Err(invalid("root node 0 must not have incoming edges".into()));
        }

        let mut seen = HashSet::new();
        for node in &self.nodes {
            if !seen.insert(node.id) {
                return Err(invalid(format!("duplicate node id {}", node.id)));
            }
        }

        for node in &self.nodes {
            for child in &node.out {
                if !self.node(*child)?.inputs.contains(&node.id) {
                    return Err(invalid(format!(
                        "edge {} -> {} is missing from the 'in' list of node {}",
                        node.id, child, child
                    )));
                }
            }
            for parent in &node.inputs {
                if !self.node(*parent)?.out.contains(&node.id) {
                    return Err(invalid(format!(
                        "edge {} -> {} is missing from the 'out' list of node {}",
                        parent, node.id, parent
                    )));
                }
            }
        }

        self.check_acyclic()
    }

    fn check_acyclic(&self) -> PlanResult<()> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Active,
            Done,
        }

        fn visit(graph: &Graph, id: NodeId, marks: &mut HashMap<NodeId, Mark>) -> PlanResult<()> {
            match marks.get(&id) {
                Some(Mark::Done) => return Ok(()),
                Some(Mark::Active) => {
                    return Err(invalid(format!("cycle detected through node {}", id)))
                }
                None => {}
            }
            marks.insert(id, Mark::Active);
            for child in &graph.node(id)?.out {
                visit(graph, *child, marks)?;
            }
            marks.insert(id, Mark::Done);
            Ok(())
        }

        let mut marks = HashMap::new();
        for node in &self.nodes {
            visit(self, node.id, &mut marks)?;
        }
        Ok(())
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn position(&self, id: NodeId) -> PlanResult<usize> {
        self.nodes
            .iter()
            .position(|n| n.id == id)
            .ok_or_else(|| invalid(format!("node {} not found", id)))
    }

    pub fn node(&self, id: NodeId) -> PlanResult<&Node> {
        Ok(&self.nodes[self.position(id)?])
    }

    pub fn node_mut(&mut self, id: NodeId) -> PlanResult<&mut Node> {
        let index = self.position(id)?;
        Ok(&mut self.nodes[index])
    }

    fn next_id(&self) -> NodeId {
        self.nodes.iter().map(|n| n.id).max().map_or(ROOT, |max| max + 1)
    }

    /// Append an empty child to `parent` and return its id.
    pub fn add_node_after(&mut self, parent: NodeId) -> PlanResult<NodeId> {
        self.position(parent)?;
        let id = self.next_id();
        let mut node = Node::new(id);
        node.inputs.push(parent);
        self.nodes.push(node);
        self.node_mut(parent)?.out.push(id);
        Ok(id)
    }

    /// Duplicate the subtree rooted at `original` with fresh ids.
    ///
    /// The copy is attached to every parent of the original except `detach`.
    /// Descendant copies are wired under the new root instead of the original.
    pub fn copy(&mut self, original: NodeId, detach: Option<NodeId>) -> PlanResult<NodeId> {
        if original == ROOT {
            return Err(invalid("the root node cannot be copied".into()));
        }

        let source = self.node(original)?.clone();
        let id = self.next_id();
        let inputs: Vec<NodeId> = source
            .inputs
            .iter()
            .copied()
            .filter(|parent| Some(*parent) != detach)
            .collect();

        self.nodes.push(Node {
            id,
            inputs: inputs.clone(),
            out: Vec::new(),
            ..source.clone()
        });
        for parent in inputs {
            self.node_mut(parent)?.out.push(id);
        }

        for child in source.out {
            let child_copy = self.copy(child, Some(original))?;
            self.node_mut(child_copy)?.inputs.push(id);
            self.node_mut(id)?.out.push(child_copy);
        }

        Ok(id)
    }

    pub fn is_visited(&self, id: NodeId) -> bool {
        self.visited.contains(&id)
    }

    pub fn mark_visited(&mut self, id: NodeId) {
        self.visited.insert(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RecordLocator;

    fn node(id: NodeId, inputs: &[NodeId], out: &[NodeId]) -> Node {
        Node {
            inputs: inputs.to_vec(),
            out: out.to_vec(),
            ..Node::new(id)
        }
    }

    fn chain() -> Graph {
        // 0 -> 1 -> 2 -> 3, 1 -> 4
        Graph::from_nodes(vec![
            node(0, &[], &[1]),
            node(1, &[0], &[2, 4]),
            node(2, &[1], &[3]),
            node(3, &[2], &[]),
            node(4, &[1], &[]),
        ])
        .unwrap()
    }

    #[test]
    fn test_parse_empty_graph() {
        let graph = Graph::parse(None).unwrap();
        assert_eq!(graph.len(), 1);
        assert!(graph.node(ROOT).unwrap().out.is_empty());
    }

    #[test]
    fn test_unknown_node_is_plan_error() {
        let graph = Graph::parse(None).unwrap();
        assert!(matches!(graph.node(9), Err(PlanError::InvalidExecutionPlan(_))));
    }

    #[test]
    fn test_structure_checks() {
        assert!(Graph::from_nodes(vec![node(1, &[], &[])]).is_err());
        assert!(Graph::from_nodes(vec![node(0, &[], &[1]), node(1, &[], &[])]).is_err());
        assert!(Graph::from_nodes(vec![node(0, &[], &[]), node(0, &[], &[])]).is_err());
        assert!(Graph::from_nodes(vec![node(0, &[], &[7])]).is_err());
        let cyclic = vec![
            node(0, &[], &[1]),
            node(1, &[0, 2], &[2]),
            node(2, &[1], &[1]),
        ];
        assert!(Graph::from_nodes(cyclic).is_err());
    }

    #[test]
    fn test_add_node_after() {
        let mut graph = chain();
        let id = graph.add_node_after(3).unwrap();
        assert_eq!(id, 5);
        assert_eq!(graph.node(3).unwrap().out, vec![5]);
        assert_eq!(graph.node(5).unwrap().inputs, vec![3]);
    }

    #[test]
    fn test_copy_leaf() {
        let mut graph = chain();
        let before = graph.len();
        let copy = graph.copy(4, None).unwrap();

        assert_eq!(graph.len(), before + 1);
        assert!(graph.node(4).unwrap().out.is_empty());
        assert_eq!(graph.node(1).unwrap().out, vec![2, 4, copy]);
        assert_eq!(graph.node(copy).unwrap().inputs, vec![1]);
    }

    #[test]
    fn test_copy_branch_duplicates_descendants() {
        let mut graph = chain();
        graph.node_mut(2).unwrap().record_locators = Some(RecordLocators {
            source: Some(RecordLocator::new("grades")),
            target: None,
        });

        let copy = graph.copy(2, None).unwrap();
        assert_eq!(graph.len(), 7);

        let copied = graph.node(copy).unwrap().clone();
        assert_eq!(copied.inputs, vec![1]);
        assert_eq!(copied.out.len(), 1);
        assert_eq!(copied.record_locators, graph.node(2).unwrap().record_locators);

        let grandchild = graph.node(copied.out[0]).unwrap();
        assert_eq!(grandchild.inputs, vec![copy]);
        assert!(grandchild.out.is_empty());

        // the original subtree is untouched
        assert_eq!(graph.node(2).unwrap().out, vec![3]);
        assert_eq!(graph.node(3).unwrap().inputs, vec![2]);
    }

    #[test]
    fn test_copy_with_detach() {
        let mut graph = chain();
        let copy = graph.copy(3, Some(2)).unwrap();
        assert!(graph.node(copy).unwrap().inputs.is_empty());
        assert_eq!(graph.node(2).unwrap().out, vec![3]);
    }

    #[test]
    fn test_copy_root_fails() {
        let mut graph = chain();
        assert!(matches!(
            graph.copy(ROOT, None),
            Err(PlanError::InvalidExecutionPlan(_))
        ));
    }

    #[test]
    fn test_visited() {
        let mut graph = chain();
        assert!(!graph.is_visited(1));
        graph.mark_visited(1);
        assert!(graph.is_visited(1));
    }
}
