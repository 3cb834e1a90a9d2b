//! hn-graph: network model layer for hydronet.
//!
//! Provides:
//! - Element kinds and their parameter schemas
//! - Typed element parameters checked against those schemas
//! - The network graph and its mutation API
//! - Model-wide validation with severity-tagged diagnostics
//! - Stable indexing and upstream-first ordering for simulation engines
//!
//! # Example
//!
//! ```
//! use hn_graph::{ElementParams, NetworkGraph, Position, SubbasinParams, validate};
//!
//! let mut graph = NetworkGraph::new();
//! let basin = graph
//!     .add_element(
//!         ElementParams::Subbasin(SubbasinParams::with_area(12.5)),
//!         Position::new(0.0, 0.0),
//!     )
//!     .unwrap();
//! let outlet = graph
//!     .add_element(ElementParams::Node, Position::new(100.0, 0.0))
//!     .unwrap();
//! graph.add_connection(basin, outlet, None).unwrap();
//!
//! assert_eq!(graph.element(basin).unwrap().name, "B1");
//! assert!(validate(&graph).is_empty());
//! ```

pub mod error;
pub mod graph;
pub mod indexing;
pub mod params;
pub mod registry;
pub mod validate;

// Re-exports for ergonomics
pub use error::{EntityRef, GraphError, GraphResult, IdSpace};
pub use graph::{
    Connection, Counters, Element, ElementCounts, GraphParts, LabelCounters, NetworkGraph,
    Position,
};
pub use indexing::{IndexMap, upstream_order};
pub use params::{
    ChannelGeometry, ElementParams, Hyetograph, RainfallStep, RatingPoint, ReachParams,
    RoutingMethod, SplitRule, SubbasinParams, TimeUnit,
};
pub use registry::{
    ElementKind, ParamValue, ParameterRecord, ParameterSchema, SchemaViolation, ViolationReason,
    connection_schema, schema_for,
};
pub use validate::{Diagnostic, DiagnosticCode, Severity, has_errors, validate};
