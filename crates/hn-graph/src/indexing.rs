//! Stable indexing for simulation-engine integration.
//!
//! Provides bidirectional mappings between domain IDs (ElementId,
//! ConnectionId) and contiguous indices (0..N), plus an upstream-first
//! ordering of elements.

use std::collections::{BTreeMap, VecDeque};

use hn_core::{ConnectionId, ElementId};

use crate::error::{EntityRef, GraphError, GraphResult};
use crate::graph::NetworkGraph;

/// Index map providing stable, contiguous indices for graph objects.
///
/// Index to id is O(1); id to index is O(log n). Ids are sparse after
/// removals and may be anywhere in the `u32` range after a load, so the
/// reverse lookups are maps rather than vectors sized to the largest id.
#[derive(Debug, Clone)]
pub struct IndexMap {
    /// Contiguous list of element IDs (index -> ElementId), in id order.
    element_ids: Vec<ElementId>,

    /// Contiguous list of connection IDs (index -> ConnectionId), in id order.
    connection_ids: Vec<ConnectionId>,

    /// Reverse lookup: ElementId -> index.
    element_to_idx: BTreeMap<ElementId, usize>,

    /// Reverse lookup: ConnectionId -> index.
    connection_to_idx: BTreeMap<ConnectionId, usize>,
}

impl IndexMap {
    /// Build an index map from a graph.
    pub fn from_graph(graph: &NetworkGraph) -> Self {
        let element_ids: Vec<ElementId> = graph.elements().map(|e| e.id).collect();
        let connection_ids: Vec<ConnectionId> = graph.connections().map(|c| c.id).collect();

        let element_to_idx = element_ids.iter().enumerate().map(|(i, &id)| (id, i)).collect();
        let connection_to_idx = connection_ids
            .iter()
            .enumerate()
            .map(|(i, &id)| (id, i))
            .collect();

        Self {
            element_ids,
            connection_ids,
            element_to_idx,
            connection_to_idx,
        }
    }

    /// Number of elements in the index.
    pub fn element_count(&self) -> usize {
        self.element_ids.len()
    }

    /// Number of connections in the index.
    pub fn connection_count(&self) -> usize {
        self.connection_ids.len()
    }

    /// Get the contiguous index for an element ID.
    pub fn element_idx(&self, id: ElementId) -> GraphResult<usize> {
        self.element_to_idx
            .get(&id)
            .copied()
            .ok_or(GraphError::NotFound(EntityRef::Element(id)))
    }

    /// Get the contiguous index for a connection ID.
    pub fn connection_idx(&self, id: ConnectionId) -> GraphResult<usize> {
        self.connection_to_idx
            .get(&id)
            .copied()
            .ok_or(GraphError::NotFound(EntityRef::Connection(id)))
    }

    /// Get the element ID for a contiguous index (panics if out of bounds).
    pub fn element_id(&self, i: usize) -> ElementId {
        self.element_ids[i]
    }

    /// Get the connection ID for a contiguous index (panics if out of bounds).
    pub fn connection_id(&self, i: usize) -> ConnectionId {
        self.connection_ids[i]
    }

    pub fn element_ids(&self) -> &[ElementId] {
        &self.element_ids
    }

    pub fn connection_ids(&self) -> &[ConnectionId] {
        &self.connection_ids
    }

    /// Outgoing `(connection, target index)` pairs per element index, in
    /// connection id order. Connections with a missing endpoint are skipped.
    pub fn adjacency(&self, graph: &NetworkGraph) -> Vec<Vec<(ConnectionId, usize)>> {
        let mut adjacency = vec![Vec::new(); self.element_ids.len()];
        for conn in graph.connections() {
            if let (Ok(s), Ok(t)) = (self.element_idx(conn.source), self.element_idx(conn.target))
            {
                adjacency[s].push((conn.id, t));
            }
        }
        adjacency
    }
}

/// Elements ordered so that every element comes after all of its upstream
/// elements. Ties are broken by id. Returns `None` if the network has a cycle.
pub fn upstream_order(graph: &NetworkGraph) -> Option<Vec<ElementId>> {
    let index = IndexMap::from_graph(graph);
    let adjacency = index.adjacency(graph);

    let mut in_degree = vec![0usize; index.element_count()];
    for edges in &adjacency {
        for &(_, t) in edges {
            in_degree[t] += 1;
        }
    }

    let mut ready: VecDeque<usize> = (0..index.element_count())
        .filter(|&i| in_degree[i] == 0)
        .collect();
    let mut order = Vec::with_capacity(index.element_count());

    while let Some(i) = ready.pop_front() {
        order.push(index.element_id(i));
        for &(_, t) in &adjacency[i] {
            in_degree[t] -= 1;
            if in_degree[t] == 0 {
                ready.push_back(t);
            }
        }
    }

    (order.len() == index.element_count()).then_some(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Connection, Element, GraphParts, Position};
    use crate::params::ElementParams;

    fn node(g: &mut NetworkGraph) -> ElementId {
        g.add_element(ElementParams::Node, Position::default())
            .unwrap()
    }

    #[test]
    fn index_map_basic() {
        let mut g = NetworkGraph::new();
        let n1 = node(&mut g);
        let n2 = node(&mut g);
        let c1 = g.add_connection(n1, n2, None).unwrap();

        let idx_map = IndexMap::from_graph(&g);

        assert_eq!(idx_map.element_count(), 2);
        assert_eq!(idx_map.connection_count(), 1);

        // Round-trip ids
        let i1 = idx_map.element_idx(n1).unwrap();
        assert_eq!(idx_map.element_id(i1), n1);
        let ic = idx_map.connection_idx(c1).unwrap();
        assert_eq!(idx_map.connection_id(ic), c1);
    }

    #[test]
    fn index_map_is_contiguous_after_removal() {
        let mut g = NetworkGraph::new();
        let n1 = node(&mut g);
        let n2 = node(&mut g);
        let n3 = node(&mut g);
        g.remove_element(n2).unwrap();

        let idx_map = IndexMap::from_graph(&g);
        assert_eq!(idx_map.element_idx(n1).unwrap(), 0);
        assert_eq!(idx_map.element_idx(n3).unwrap(), 1);
        assert!(idx_map.element_idx(n2).is_err());
        assert!(idx_map.element_idx(ElementId::from_index(999)).is_err());
    }

    #[test]
    fn index_map_handles_ids_near_the_top_of_the_range() {
        let low = ElementId::from_index(0);
        let high = ElementId::from_index(u32::MAX - 1);
        let elements = [low, high]
            .into_iter()
            .map(|id| Element {
                id,
                name: String::new(),
                position: Position::default(),
                params: ElementParams::Node,
            })
            .collect();
        let wire = ConnectionId::from_index(u32::MAX - 1);
        let g = NetworkGraph::restore(GraphParts {
            elements,
            connections: vec![Connection {
                id: wire,
                source: high,
                target: low,
                order: None,
            }],
            counters: None,
        })
        .unwrap();

        let idx_map = IndexMap::from_graph(&g);
        assert_eq!(idx_map.element_idx(high).unwrap(), 1);
        assert_eq!(idx_map.connection_idx(wire).unwrap(), 0);
        assert_eq!(idx_map.adjacency(&g), vec![vec![], vec![(wire, 0)]]);
        assert_eq!(upstream_order(&g), Some(vec![high, low]));
    }

    #[test]
    fn upstream_order_respects_edges() {
        let mut g = NetworkGraph::new();
        let outlet = node(&mut g);
        let mid = node(&mut g);
        let head = node(&mut g);
        g.add_connection(head, mid, None).unwrap();
        g.add_connection(mid, outlet, None).unwrap();

        assert_eq!(upstream_order(&g), Some(vec![head, mid, outlet]));
    }

    #[test]
    fn upstream_order_none_on_cycle() {
        let mut g = NetworkGraph::new();
        let a = node(&mut g);
        let b = node(&mut g);
        g.add_connection(a, b, None).unwrap();
        g.add_connection(b, a, None).unwrap();

        assert_eq!(upstream_order(&g), None);
    }
}
