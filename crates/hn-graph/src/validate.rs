//! Model-wide validation.
//!
//! [`validate`] is a pure function over a graph snapshot. It never fails and
//! never stops early: every finding is returned so a caller can show them all
//! at once.

use std::collections::BTreeSet;

use hn_core::{ConnectionId, ElementId};
use serde::Serialize;

use crate::graph::{Connection, Element, NetworkGraph};
use crate::indexing::IndexMap;
use crate::params::ElementParams;
use crate::registry::{ElementKind, connection_schema};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
}

/// Stable code for each kind of finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticCode {
    /// A connection endpoint does not exist.
    DanglingReference,
    SelfLoop,
    /// More outgoing connections than the element kind allows.
    OutletCapacity,
    /// Diversion outlet without an ordering index, or with a duplicate one.
    DiversionOrdering,
    /// Diversion outlets do not match the outlets of its split rule.
    SplitRuleMismatch,
    Cycle,
    SchemaViolation,
    /// A subbasin receiving inflow.
    SubbasinInflow,
    IsolatedElement,
    UnroutedRunoff,
    /// Ordering index on a connection whose source is not a diversion.
    IgnoredOrder,
}

impl DiagnosticCode {
    pub fn severity(self) -> Severity {
        match self {
            DiagnosticCode::IsolatedElement
            | DiagnosticCode::UnroutedRunoff
            | DiagnosticCode::IgnoredOrder => Severity::Warning,
            _ => Severity::Error,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: DiagnosticCode,
    pub elements: Vec<ElementId>,
    pub connections: Vec<ConnectionId>,
    pub message: String,
}

impl Diagnostic {
    fn new(code: DiagnosticCode, message: String) -> Self {
        Self {
            severity: code.severity(),
            code,
            elements: Vec::new(),
            connections: Vec::new(),
            message,
        }
    }

    fn with_elements(mut self, elements: impl IntoIterator<Item = ElementId>) -> Self {
        self.elements.extend(elements);
        self
    }

    fn with_connections(mut self, connections: impl IntoIterator<Item = ConnectionId>) -> Self {
        self.connections.extend(connections);
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

/// True if any finding is an error.
pub fn has_errors(diagnostics: &[Diagnostic]) -> bool {
    diagnostics.iter().any(Diagnostic::is_error)
}

/// Check every structural and parameter rule against `graph`.
///
/// An empty result means the graph is fully valid.
pub fn validate(graph: &NetworkGraph) -> Vec<Diagnostic> {
    let mut out = Vec::new();
    check_references(graph, &mut out);
    check_parameters(graph, &mut out);

    let index = IndexMap::from_graph(graph);
    let adjacency = index.adjacency(graph);
    let links = Links::new(graph, &index);
    check_outlets(graph, &links, &mut out);
    check_inlets(graph, &links, &mut out);
    check_cycles(&index, &adjacency, &mut out);
    out
}

/// Connections leaving and entering each element, by contiguous index.
/// Built in one pass so the per-element checks stay linear.
struct Links<'a> {
    outgoing: Vec<Vec<&'a Connection>>,
    incoming: Vec<Vec<&'a Connection>>,
}

impl<'a> Links<'a> {
    fn new(graph: &'a NetworkGraph, index: &IndexMap) -> Self {
        let mut outgoing = vec![Vec::new(); index.element_count()];
        let mut incoming = vec![Vec::new(); index.element_count()];
        for conn in graph.connections() {
            if let Ok(s) = index.element_idx(conn.source) {
                outgoing[s].push(conn);
            }
            if let Ok(t) = index.element_idx(conn.target) {
                incoming[t].push(conn);
            }
        }
        Self { outgoing, incoming }
    }
}

fn check_references(graph: &NetworkGraph, out: &mut Vec<Diagnostic>) {
    for conn in graph.connections() {
        for end in [conn.source, conn.target] {
            if graph.element(end).is_none() {
                out.push(
                    Diagnostic::new(
                        DiagnosticCode::DanglingReference,
                        format!("connection {} refers to missing element {end}", conn.id),
                    )
                    .with_elements([end])
                    .with_connections([conn.id]),
                );
            }
        }
        if conn.source == conn.target {
            out.push(
                Diagnostic::new(
                    DiagnosticCode::SelfLoop,
                    format!("connection {} loops on element {}", conn.id, conn.source),
                )
                .with_elements([conn.source])
                .with_connections([conn.id]),
            );
        }
    }
}

fn check_parameters(graph: &NetworkGraph, out: &mut Vec<Diagnostic>) {
    for element in graph.elements() {
        if let Err(violation) = element.params.check() {
            out.push(
                Diagnostic::new(
                    DiagnosticCode::SchemaViolation,
                    format!("{}: {violation}", describe(element)),
                )
                .with_elements([element.id]),
            );
        }
    }
    for conn in graph.connections() {
        if let Err(violation) = connection_schema().check(&conn.to_record()) {
            out.push(
                Diagnostic::new(
                    DiagnosticCode::SchemaViolation,
                    format!("connection {}: {violation}", conn.id),
                )
                .with_connections([conn.id]),
            );
        }
    }
}

// Elements and index positions share id order.
fn check_outlets(graph: &NetworkGraph, links: &Links<'_>, out: &mut Vec<Diagnostic>) {
    for (i, element) in graph.elements().enumerate() {
        let outlets = &links.outgoing[i];
        let kind = element.kind();

        if let Some(limit) = kind.max_outlets()
            && outlets.len() > limit
        {
            out.push(
                Diagnostic::new(
                    DiagnosticCode::OutletCapacity,
                    format!(
                        "{} has {} outgoing connections (at most {limit} allowed)",
                        describe(element),
                        outlets.len()
                    ),
                )
                .with_elements([element.id])
                .with_connections(outlets.iter().map(|c| c.id)),
            );
        }

        match &element.params {
            ElementParams::Diversion(rule) => {
                let unordered: Vec<ConnectionId> = outlets
                    .iter()
                    .filter(|c| c.order.is_none())
                    .map(|c| c.id)
                    .collect();
                if !unordered.is_empty() {
                    out.push(
                        Diagnostic::new(
                            DiagnosticCode::DiversionOrdering,
                            format!("{} has outlets without an ordering index", describe(element)),
                        )
                        .with_elements([element.id])
                        .with_connections(unordered),
                    );
                    continue;
                }

                let mut seen = BTreeSet::new();
                let duplicates: Vec<ConnectionId> = outlets
                    .iter()
                    .filter(|c| !seen.insert(c.order))
                    .map(|c| c.id)
                    .collect();
                if !duplicates.is_empty() {
                    out.push(
                        Diagnostic::new(
                            DiagnosticCode::DiversionOrdering,
                            format!("{} has outlets sharing an ordering index", describe(element)),
                        )
                        .with_elements([element.id])
                        .with_connections(duplicates),
                    );
                    continue;
                }

                let expected = rule.outlet_count();
                let found: BTreeSet<u32> = outlets.iter().filter_map(|c| c.order).collect();
                let matches = found.len() == expected
                    && found.iter().all(|&o| (o as usize) < expected);
                if !matches {
                    out.push(
                        Diagnostic::new(
                            DiagnosticCode::SplitRuleMismatch,
                            format!(
                                "{} splits flow by {} over outlets 0..{expected}, found outlets {:?}",
                                describe(element),
                                rule.name(),
                                found
                            ),
                        )
                        .with_elements([element.id])
                        .with_connections(outlets.iter().map(|c| c.id)),
                    );
                }
            }
            _ => {
                for conn in outlets.iter().filter(|c| c.order.is_some()) {
                    out.push(
                        Diagnostic::new(
                            DiagnosticCode::IgnoredOrder,
                            format!(
                                "connection {} carries an ordering index but {} is not a diversion",
                                conn.id,
                                describe(element)
                            ),
                        )
                        .with_elements([element.id])
                        .with_connections([conn.id]),
                    );
                }
            }
        }

        let has_inflow = !links.incoming[i].is_empty();
        if outlets.is_empty() && !has_inflow {
            out.push(
                Diagnostic::new(
                    DiagnosticCode::IsolatedElement,
                    format!("{} is not connected", describe(element)),
                )
                .with_elements([element.id]),
            );
        } else if outlets.is_empty() && kind == ElementKind::Subbasin {
            out.push(
                Diagnostic::new(
                    DiagnosticCode::UnroutedRunoff,
                    format!("runoff from {} is not routed anywhere", describe(element)),
                )
                .with_elements([element.id]),
            );
        }
    }
}

fn check_inlets(graph: &NetworkGraph, links: &Links<'_>, out: &mut Vec<Diagnostic>) {
    for (i, element) in graph.elements().enumerate() {
        if element.kind().accepts_inflow() {
            continue;
        }
        let inflows: Vec<ConnectionId> = links.incoming[i].iter().map(|c| c.id).collect();
        if !inflows.is_empty() {
            out.push(
                Diagnostic::new(
                    DiagnosticCode::SubbasinInflow,
                    format!("{} is a headwater element but receives inflow", describe(element)),
                )
                .with_elements([element.id])
                .with_connections(inflows),
            );
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

/// Depth-first walk with an explicit stack. Every edge that reaches an
/// element still on the stack closes a cycle and is reported once, so deep
/// networks cannot overflow the call stack.
fn check_cycles(
    index: &IndexMap,
    adjacency: &[Vec<(ConnectionId, usize)>],
    out: &mut Vec<Diagnostic>,
) {
    let mut marks = vec![Mark::Unvisited; index.element_count()];
    // (element index, next edge to follow)
    let mut stack: Vec<(usize, usize)> = Vec::new();

    for start in 0..index.element_count() {
        if marks[start] != Mark::Unvisited {
            continue;
        }
        marks[start] = Mark::InProgress;
        stack.push((start, 0));

        while let Some(&(node, cursor)) = stack.last() {
            let Some(&(conn, target)) = adjacency[node].get(cursor) else {
                marks[node] = Mark::Done;
                stack.pop();
                continue;
            };
            if let Some(top) = stack.last_mut() {
                top.1 += 1;
            }
            // Self-loops are reported on their own.
            if target == node {
                continue;
            }

            match marks[target] {
                Mark::Unvisited => {
                    marks[target] = Mark::InProgress;
                    stack.push((target, 0));
                }
                Mark::InProgress => {
                    let source = index.element_id(node);
                    let back_to = index.element_id(target);
                    out.push(
                        Diagnostic::new(
                            DiagnosticCode::Cycle,
                            format!(
                                "connection {conn} from element {source} back to element {back_to} closes a flow cycle"
                            ),
                        )
                        .with_elements([source, back_to])
                        .with_connections([conn]),
                    );
                }
                Mark::Done => {}
            }
        }
    }
}

fn describe(element: &Element) -> String {
    format!("{} {} '{}'", element.kind(), element.id, element.name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Position;
    use crate::params::{ReachParams, RoutingMethod, SplitRule, SubbasinParams};

    fn add(g: &mut NetworkGraph, params: ElementParams) -> ElementId {
        g.add_element(params, Position::default()).unwrap()
    }

    fn codes(diags: &[Diagnostic]) -> Vec<DiagnosticCode> {
        diags.iter().map(|d| d.code).collect()
    }

    #[test]
    fn empty_graph_is_valid() {
        assert!(validate(&NetworkGraph::new()).is_empty());
    }

    #[test]
    fn simple_chain_is_valid() {
        let mut g = NetworkGraph::new();
        let b = add(&mut g, ElementParams::Subbasin(SubbasinParams::with_area(2.0)));
        let r = add(
            &mut g,
            ElementParams::Reach(ReachParams::new(RoutingMethod::Lag, 500.0, 0.01)),
        );
        let n = add(&mut g, ElementParams::Node);
        g.add_connection(b, r, None).unwrap();
        g.add_connection(r, n, None).unwrap();

        assert_eq!(validate(&g), vec![]);
    }

    #[test]
    fn isolated_and_unrouted_are_warnings() {
        let mut g = NetworkGraph::new();
        let lone = add(&mut g, ElementParams::Node);
        let b = add(&mut g, ElementParams::Subbasin(SubbasinParams::with_area(2.0)));
        let n = add(&mut g, ElementParams::Node);
        // subbasin receiving inflow and routing nowhere
        g.add_connection(n, b, None).unwrap();

        let diags = validate(&g);
        assert!(has_errors(&diags));
        let warnings: Vec<_> = diags.iter().filter(|d| !d.is_error()).collect();
        assert_eq!(warnings.len(), 2);
        assert!(
            warnings
                .iter()
                .any(|d| d.code == DiagnosticCode::IsolatedElement && d.elements == vec![lone])
        );
        assert!(
            warnings
                .iter()
                .any(|d| d.code == DiagnosticCode::UnroutedRunoff && d.elements == vec![b])
        );
        assert!(codes(&diags).contains(&DiagnosticCode::SubbasinInflow));
    }

    #[test]
    fn diversion_outlets_must_match_rule() {
        let mut g = NetworkGraph::new();
        let d = add(
            &mut g,
            ElementParams::Diversion(SplitRule::Fraction {
                fractions: vec![0.5, 0.3, 0.2],
            }),
        );
        let a = add(&mut g, ElementParams::Node);
        let b = add(&mut g, ElementParams::Node);
        g.add_connection(d, a, Some(0)).unwrap();
        g.add_connection(d, b, Some(1)).unwrap();

        let diags = validate(&g);
        assert_eq!(codes(&diags), vec![DiagnosticCode::SplitRuleMismatch]);

        let c = add(&mut g, ElementParams::Node);
        g.add_connection(d, c, Some(2)).unwrap();
        assert!(validate(&g).is_empty());
    }

    #[test]
    fn order_on_plain_outlet_is_a_warning() {
        let mut g = NetworkGraph::new();
        let a = add(&mut g, ElementParams::Node);
        let b = add(&mut g, ElementParams::Node);
        g.add_connection(a, b, Some(3)).unwrap();

        let diags = validate(&g);
        assert_eq!(codes(&diags), vec![DiagnosticCode::IgnoredOrder]);
        assert!(!has_errors(&diags));
    }

    #[test]
    fn each_back_edge_is_reported_once() {
        // two independent 2-cycles
        let mut g = NetworkGraph::new();
        let a = add(&mut g, ElementParams::Node);
        let b = add(&mut g, ElementParams::Node);
        let c = add(&mut g, ElementParams::Node);
        let d = add(&mut g, ElementParams::Node);
        g.add_connection(a, b, None).unwrap();
        let back1 = g.add_connection(b, a, None).unwrap();
        g.add_connection(c, d, None).unwrap();
        let back2 = g.add_connection(d, c, None).unwrap();

        let cycles: Vec<_> = validate(&g)
            .into_iter()
            .filter(|d| d.code == DiagnosticCode::Cycle)
            .collect();
        assert_eq!(cycles.len(), 2);
        assert_eq!(cycles[0].connections, vec![back1]);
        assert_eq!(cycles[1].connections, vec![back2]);
    }

    #[test]
    fn long_chain_with_fan_in_is_valid() {
        let mut g = NetworkGraph::new();
        let outlet = add(&mut g, ElementParams::Node);
        let mut downstream = outlet;
        for _ in 0..2000 {
            let n = add(&mut g, ElementParams::Node);
            g.add_connection(n, downstream, None).unwrap();
            let b = add(&mut g, ElementParams::Subbasin(SubbasinParams::with_area(1.0)));
            g.add_connection(b, n, None).unwrap();
            downstream = n;
        }
        assert!(validate(&g).is_empty());

        let inflow = add(&mut g, ElementParams::Node);
        let first_subbasin = g
            .elements()
            .find(|e| e.kind() == ElementKind::Subbasin)
            .map(|e| e.id)
            .unwrap();
        let into_subbasin = g.add_connection(inflow, first_subbasin, None).unwrap();
        let diags = validate(&g);
        assert_eq!(codes(&diags), vec![DiagnosticCode::SubbasinInflow]);
        assert_eq!(diags[0].connections, vec![into_subbasin]);
    }

    #[test]
    fn diversion_outlet_records_match_connection_schema() {
        let mut g = NetworkGraph::new();
        let d = add(
            &mut g,
            ElementParams::Diversion(SplitRule::Threshold { threshold: 2.0 }),
        );
        let a = add(&mut g, ElementParams::Node);
        let b = add(&mut g, ElementParams::Node);
        let c0 = g.add_connection(d, a, None).unwrap();
        let c1 = g.add_connection(d, b, None).unwrap();

        let record = g.connection(c1).unwrap().to_record();
        assert_eq!(record.get("order").and_then(|v| v.as_number()), Some(1.0));
        assert!(connection_schema().check(&g.connection(c0).unwrap().to_record()).is_ok());
        assert!(validate(&g).is_empty());
    }
}
