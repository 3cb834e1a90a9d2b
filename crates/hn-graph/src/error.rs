//! Graph-specific error types.

use std::fmt;

use hn_core::{ConnectionId, ElementId};

use crate::graph::Position;
use crate::registry::{ElementKind, SchemaViolation};

pub type GraphResult<T> = Result<T, GraphError>;

/// Reference to an element or a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityRef {
    Element(ElementId),
    Connection(ConnectionId),
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityRef::Element(id) => write!(f, "element {id}"),
            EntityRef::Connection(id) => write!(f, "connection {id}"),
        }
    }
}

/// A counter that hands out ids or default names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdSpace {
    Element,
    Connection,
    Label(ElementKind),
}

impl fmt::Display for IdSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdSpace::Element => f.write_str("element ids"),
            IdSpace::Connection => f.write_str("connection ids"),
            IdSpace::Label(kind) => write!(f, "{kind} labels"),
        }
    }
}

/// Rejected graph mutation. The graph is left unchanged.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GraphError {
    #[error("Invalid {element_kind} parameters: {violation}")]
    SchemaViolation {
        element_kind: ElementKind,
        violation: SchemaViolation,
    },

    #[error("Position ({}, {}) is not finite", .position.x, .position.y)]
    NonFinitePosition { position: Position },

    #[error("No {0} left")]
    IdSpaceExhausted(IdSpace),

    #[error("{0} not found")]
    NotFound(EntityRef),

    #[error("Element {element} cannot connect to itself")]
    SelfLoop { element: ElementId },

    #[error("Element {element} ({kind}) already has {limit} outgoing connection(s)")]
    OutletCapacityExceeded {
        element: ElementId,
        kind: ElementKind,
        limit: usize,
    },

    #[error("Diversion {element} already has an outlet with order {order}")]
    OrderConflict { element: ElementId, order: u32 },

    #[error("Element {element} is a {expected}, got {found} parameters")]
    KindMismatch {
        element: ElementId,
        expected: ElementKind,
        found: ElementKind,
    },

    /// Raised while restoring a graph from stored parts.
    #[error("Duplicate {0}")]
    DuplicateId(EntityRef),

    /// Raised while restoring a graph from stored parts.
    #[error("Connection {connection} refers to missing element {element}")]
    DanglingConnection {
        connection: ConnectionId,
        element: ElementId,
    },
}

impl GraphError {
    /// The violated field, for schema errors.
    pub fn schema_field(&self) -> Option<&str> {
        match self {
            GraphError::SchemaViolation { violation, .. } => Some(&violation.field),
            _ => None,
        }
    }
}
