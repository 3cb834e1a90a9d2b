//! Core graph data structures and the mutation API.

use std::collections::BTreeMap;

use hn_core::{ConnectionId, ElementId, Real};
use tracing::debug;

use crate::error::{EntityRef, GraphError, GraphResult, IdSpace};
use crate::params::ElementParams;
use crate::registry::{ElementKind, ParamValue, ParameterRecord};

/// Canvas placement. Stored and round-tripped; only finiteness is checked.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Position {
    pub x: Real,
    pub y: Real,
}

impl Position {
    pub fn new(x: Real, y: Real) -> Self {
        Self { x, y }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// An element of the network (subbasin, reach, node or diversion).
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub id: ElementId,
    pub name: String,
    pub position: Position,
    pub params: ElementParams,
}

impl Element {
    pub fn kind(&self) -> ElementKind {
        self.params.kind()
    }
}

/// Directed edge from `source`'s outlet to `target`'s inlet.
///
/// `order` addresses one outlet of a diversion's split rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Connection {
    pub id: ConnectionId,
    pub source: ElementId,
    pub target: ElementId,
    pub order: Option<u32>,
}

impl Connection {
    pub fn touches(&self, element: ElementId) -> bool {
        self.source == element || self.target == element
    }

    /// The connection's fields as described by [`crate::connection_schema`].
    pub fn to_record(&self) -> ParameterRecord {
        self.order
            .map(|o| ("order".to_string(), ParamValue::Number(Real::from(o))))
            .into_iter()
            .collect()
    }
}

/// Per-kind counters behind the default display names (`B1`, `C2`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LabelCounters {
    pub subbasin: u32,
    pub reach: u32,
    pub node: u32,
    pub diversion: u32,
}

impl LabelCounters {
    pub fn get(&self, kind: ElementKind) -> u32 {
        match kind {
            ElementKind::Subbasin => self.subbasin,
            ElementKind::Reach => self.reach,
            ElementKind::Node => self.node,
            ElementKind::Diversion => self.diversion,
        }
    }

    pub fn set(&mut self, kind: ElementKind, value: u32) {
        let slot = match kind {
            ElementKind::Subbasin => &mut self.subbasin,
            ElementKind::Reach => &mut self.reach,
            ElementKind::Node => &mut self.node,
            ElementKind::Diversion => &mut self.diversion,
        };
        *slot = value;
    }
}

/// Id and label counters. Persisted so ids are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Counters {
    /// Index of the next element id.
    pub next_element: u32,
    /// Index of the next connection id.
    pub next_connection: u32,
    pub labels: LabelCounters,
}

/// Number of elements of each kind, plus connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ElementCounts {
    pub subbasins: usize,
    pub reaches: usize,
    pub nodes: usize,
    pub diversions: usize,
    pub connections: usize,
}

/// Stored contents of a graph, as decoded from a document.
#[derive(Debug, Clone, Default)]
pub struct GraphParts {
    pub elements: Vec<Element>,
    pub connections: Vec<Connection>,
    /// `None` for documents that predate stored counters.
    pub counters: Option<Counters>,
}

/// The network: elements, connections and the only legal ways to change them.
///
/// Mutations check what can be checked locally (ids, schema, self-loops,
/// outlet capacity) and leave the graph untouched on error. Model-wide rules
/// such as acyclicity are reported by [`crate::validate`].
///
/// Equality ignores the revision counter, which is session state.
#[derive(Debug, Clone, Default)]
pub struct NetworkGraph {
    elements: BTreeMap<ElementId, Element>,
    connections: BTreeMap<ConnectionId, Connection>,
    counters: Counters,
    revision: u64,
}

impl PartialEq for NetworkGraph {
    fn eq(&self, other: &Self) -> bool {
        self.elements == other.elements
            && self.connections == other.connections
            && self.counters == other.counters
    }
}

impl NetworkGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Incremented by every successful mutation.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn counters(&self) -> Counters {
        self.counters
    }

    pub fn element(&self, id: ElementId) -> Option<&Element> {
        self.elements.get(&id)
    }

    pub fn connection(&self, id: ConnectionId) -> Option<&Connection> {
        self.connections.get(&id)
    }

    /// All elements, in id order.
    pub fn elements(&self) -> impl Iterator<Item = &Element> + Clone + '_ {
        self.elements.values()
    }

    /// All connections, in id order.
    pub fn connections(&self) -> impl Iterator<Item = &Connection> + Clone + '_ {
        self.connections.values()
    }

    pub fn element_count(&self) -> usize {
        self.elements.len()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn outgoing(&self, id: ElementId) -> impl Iterator<Item = &Connection> + '_ {
        self.connections.values().filter(move |c| c.source == id)
    }

    pub fn incoming(&self, id: ElementId) -> impl Iterator<Item = &Connection> + '_ {
        self.connections.values().filter(move |c| c.target == id)
    }

    pub fn element_counts(&self) -> ElementCounts {
        let mut counts = ElementCounts {
            connections: self.connections.len(),
            ..ElementCounts::default()
        };
        for element in self.elements.values() {
            match element.kind() {
                ElementKind::Subbasin => counts.subbasins += 1,
                ElementKind::Reach => counts.reaches += 1,
                ElementKind::Node => counts.nodes += 1,
                ElementKind::Diversion => counts.diversions += 1,
            }
        }
        counts
    }

    /// Add an element with a default display name (`B1`, `C1`, `N1`, `D1`).
    pub fn add_element(
        &mut self,
        params: ElementParams,
        position: Position,
    ) -> GraphResult<ElementId> {
        Self::check_params(&params)?;
        let kind = params.kind();
        let label = self
            .counters
            .labels
            .get(kind)
            .checked_add(1)
            .ok_or(GraphError::IdSpaceExhausted(IdSpace::Label(kind)))?;
        let name = format!("{}{}", kind.label_prefix(), label);
        let id = self.insert_element(name, params, position)?;
        self.counters.labels.set(kind, label);
        Ok(id)
    }

    /// Add an element with an explicit display name.
    pub fn add_named_element(
        &mut self,
        name: impl Into<String>,
        params: ElementParams,
        position: Position,
    ) -> GraphResult<ElementId> {
        Self::check_params(&params)?;
        self.insert_element(name.into(), params, position)
    }

    fn check_params(params: &ElementParams) -> GraphResult<()> {
        params
            .check()
            .map_err(|violation| GraphError::SchemaViolation {
                element_kind: params.kind(),
                violation,
            })
    }

    fn check_position(position: Position) -> GraphResult<()> {
        if position.is_finite() {
            Ok(())
        } else {
            Err(GraphError::NonFinitePosition { position })
        }
    }

    fn insert_element(
        &mut self,
        name: String,
        params: ElementParams,
        position: Position,
    ) -> GraphResult<ElementId> {
        Self::check_position(position)?;
        let id = ElementId::try_from_index(self.counters.next_element)
            .ok_or(GraphError::IdSpaceExhausted(IdSpace::Element))?;
        // try_from_index rejects u32::MAX, so this cannot overflow.
        self.counters.next_element = id.index() + 1;
        debug!(element = %id, kind = %params.kind(), name = %name, "element added");
        self.elements.insert(
            id,
            Element {
                id,
                name,
                position,
                params,
            },
        );
        self.touch();
        Ok(id)
    }

    /// Remove an element and every connection touching it.
    ///
    /// Removing an unknown (or already removed) element is an error.
    pub fn remove_element(&mut self, id: ElementId) -> GraphResult<Element> {
        let element = self
            .elements
            .remove(&id)
            .ok_or(GraphError::NotFound(EntityRef::Element(id)))?;

        let incident: Vec<ConnectionId> = self
            .connections
            .values()
            .filter(|c| c.touches(id))
            .map(|c| c.id)
            .collect();
        for conn_id in &incident {
            self.connections.remove(conn_id);
        }

        debug!(element = %id, cascaded = incident.len(), "element removed");
        self.touch();
        Ok(element)
    }

    /// Connect `source`'s outlet to `target`'s inlet.
    ///
    /// A diversion source given no `order` gets its smallest unused index.
    pub fn add_connection(
        &mut self,
        source: ElementId,
        target: ElementId,
        order: Option<u32>,
    ) -> GraphResult<ConnectionId> {
        if source == target {
            return Err(GraphError::SelfLoop { element: source });
        }
        let source_kind = self
            .element(source)
            .ok_or(GraphError::NotFound(EntityRef::Element(source)))?
            .kind();
        if !self.elements.contains_key(&target) {
            return Err(GraphError::NotFound(EntityRef::Element(target)));
        }

        let used: Vec<Option<u32>> = self.outgoing(source).map(|c| c.order).collect();
        if let Some(limit) = source_kind.max_outlets()
            && used.len() >= limit
        {
            return Err(GraphError::OutletCapacityExceeded {
                element: source,
                kind: source_kind,
                limit,
            });
        }

        let order = if source_kind == ElementKind::Diversion {
            match order {
                Some(o) if used.contains(&Some(o)) => {
                    return Err(GraphError::OrderConflict {
                        element: source,
                        order: o,
                    });
                }
                Some(o) => Some(o),
                None => (0..).find(|o| !used.contains(&Some(*o))),
            }
        } else {
            order
        };

        let id = ConnectionId::try_from_index(self.counters.next_connection)
            .ok_or(GraphError::IdSpaceExhausted(IdSpace::Connection))?;
        self.counters.next_connection = id.index() + 1;
        self.connections.insert(
            id,
            Connection {
                id,
                source,
                target,
                order,
            },
        );
        debug!(connection = %id, %source, %target, ?order, "connection added");
        self.touch();
        Ok(id)
    }

    pub fn remove_connection(&mut self, id: ConnectionId) -> GraphResult<Connection> {
        let conn = self
            .connections
            .remove(&id)
            .ok_or(GraphError::NotFound(EntityRef::Connection(id)))?;
        debug!(connection = %id, "connection removed");
        self.touch();
        Ok(conn)
    }

    pub fn rename_element(&mut self, id: ElementId, name: impl Into<String>) -> GraphResult<()> {
        let element = self.element_mut(id)?;
        element.name = name.into();
        self.touch();
        Ok(())
    }

    pub fn move_element(&mut self, id: ElementId, position: Position) -> GraphResult<()> {
        Self::check_position(position)?;
        let element = self.element_mut(id)?;
        element.position = position;
        self.touch();
        Ok(())
    }

    /// Replace an element's parameters. The kind cannot change.
    pub fn update_parameters(&mut self, id: ElementId, params: ElementParams) -> GraphResult<()> {
        let expected = self
            .element(id)
            .ok_or(GraphError::NotFound(EntityRef::Element(id)))?
            .kind();
        if params.kind() != expected {
            return Err(GraphError::KindMismatch {
                element: id,
                expected,
                found: params.kind(),
            });
        }
        Self::check_params(&params)?;
        self.element_mut(id)?.params = params;
        debug!(element = %id, "parameters updated");
        self.touch();
        Ok(())
    }

    fn element_mut(&mut self, id: ElementId) -> GraphResult<&mut Element> {
        self.elements
            .get_mut(&id)
            .ok_or(GraphError::NotFound(EntityRef::Element(id)))
    }

    fn touch(&mut self) {
        self.revision += 1;
    }

    /// Rebuild a graph from stored parts, keeping every id.
    ///
    /// Rejects duplicate ids, dangling or self-referencing connections,
    /// non-finite positions and parameters that fail their schema. Topological problems (extra
    /// outlets, cycles) are accepted so that work in progress can be
    /// reopened; [`crate::validate`] reports them.
    pub fn restore(parts: GraphParts) -> GraphResult<Self> {
        let mut graph = NetworkGraph::new();

        for element in parts.elements {
            Self::check_params(&element.params)?;
            Self::check_position(element.position)?;
            let id = element.id;
            if graph.elements.insert(id, element).is_some() {
                return Err(GraphError::DuplicateId(EntityRef::Element(id)));
            }
        }

        for conn in parts.connections {
            if conn.source == conn.target {
                return Err(GraphError::SelfLoop {
                    element: conn.source,
                });
            }
            for end in [conn.source, conn.target] {
                if !graph.elements.contains_key(&end) {
                    return Err(GraphError::DanglingConnection {
                        connection: conn.id,
                        element: end,
                    });
                }
            }
            if graph.connections.insert(conn.id, conn).is_some() {
                return Err(GraphError::DuplicateId(EntityRef::Connection(conn.id)));
            }
        }

        let mut counters = match parts.counters {
            Some(counters) => counters,
            None => Counters {
                labels: graph.labels_from_names(),
                ..Counters::default()
            },
        };
        // Never hand out an id that is already taken. The largest index is
        // u32::MAX - 1, so the floor fits; a full id space fails on the next
        // insertion instead.
        let element_floor = graph.elements.keys().last().map_or(0, |id| id.index() + 1);
        let connection_floor = graph
            .connections
            .keys()
            .last()
            .map_or(0, |id| id.index() + 1);
        counters.next_element = counters.next_element.max(element_floor);
        counters.next_connection = counters.next_connection.max(connection_floor);
        graph.counters = counters;

        debug!(
            elements = graph.elements.len(),
            connections = graph.connections.len(),
            "graph restored"
        );
        Ok(graph)
    }

    /// Label counters implied by default-style names such as `B3`.
    fn labels_from_names(&self) -> LabelCounters {
        let mut labels = LabelCounters::default();
        for element in self.elements.values() {
            let kind = element.kind();
            let n = element
                .name
                .strip_prefix(kind.label_prefix())
                .and_then(|rest| rest.parse::<u32>().ok());
            if let Some(n) = n
                && n > labels.get(kind)
            {
                labels.set(kind, n);
            }
        }
        labels
    }
}
