use crate::types::{EdgeKind, ElementId, SymbolEdge, SymbolNode};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::HashMap;

type Relation = (ElementId, EdgeKind);

/// Read-optimized view over the committed symbol graph, rebuilt on every switch to read mode.
#[derive(Debug, Default)]
pub struct SymbolGraph {
    graph: DiGraph<ElementId, EdgeKind>,
    index: HashMap<ElementId, NodeIndex>,
    by_name: HashMap<String, Vec<ElementId>>,
}

impl SymbolGraph {
    pub fn build<'a>(
        nodes: impl IntoIterator<Item = &'a SymbolNode>,
        edges: impl IntoIterator<Item = &'a SymbolEdge>,
    ) -> Self {
        let mut graph = DiGraph::new();
        let mut index = HashMap::new();
        let mut by_name: HashMap<String, Vec<ElementId>> = HashMap::new();

        for node in nodes {
            let idx = graph.add_node(node.id);
            index.insert(node.id, idx);
            by_name.entry(node.name.clone()).or_default().push(node.id);
        }

        for edge in edges {
            let (Some(&from), Some(&to)) = (index.get(&edge.source), index.get(&edge.target))
            else {
                continue;
            };
            graph.add_edge(from, to, edge.kind);
        }

        Self {
            graph,
            index,
            by_name,
        }
    }

    #[must_use]
    pub fn find(&self, name: &str) -> &[ElementId] {
        self.by_name.get(name).map_or(&[], Vec::as_slice)
    }

    /// Outgoing relations (what the element uses, calls, includes).
    #[must_use]
    pub fn outgoing(&self, id: ElementId) -> Vec<Relation> {
        self.relations(id, Direction::Outgoing)
    }

    /// Incoming relations (who uses, calls, includes the element).
    #[must_use]
    pub fn incoming(&self, id: ElementId) -> Vec<Relation> {
        self.relations(id, Direction::Incoming)
    }

    fn relations(&self, id: ElementId, direction: Direction) -> Vec<Relation> {
        let Some(&idx) = self.index.get(&id) else {
            return Vec::new();
        };
        let mut out: Vec<Relation> = self
            .graph
            .edges_directed(idx, direction)
            .map(|e| {
                let other = match direction {
                    Direction::Outgoing => e.target(),
                    Direction::Incoming => e.source(),
                };
                (self.graph[other], *e.weight())
            })
            .collect();
        out.sort_by_key(|(other, _)| *other);
        out
    }

    /// Node and edge count.
    #[must_use]
    pub fn stats(&self) -> (usize, usize) {
        (self.graph.node_count(), self.graph.edge_count())
    }
}
