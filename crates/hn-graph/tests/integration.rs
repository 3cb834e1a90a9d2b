//! Integration tests for hn-graph.

use hn_core::ElementId;
use hn_graph::{
    DiagnosticCode, ElementKind, ElementParams, GraphError, NetworkGraph, ParamValue, Position,
    ReachParams, RoutingMethod, SplitRule, SubbasinParams, has_errors, upstream_order, validate,
};
use proptest::prelude::*;

fn subbasin(area: f64) -> ElementParams {
    ElementParams::Subbasin(SubbasinParams::with_area(area))
}

fn reach() -> ElementParams {
    ElementParams::Reach(ReachParams::new(RoutingMethod::Muskingum, 800.0, 0.004))
}

fn fraction_diversion(fractions: &[f64]) -> ElementParams {
    ElementParams::Diversion(SplitRule::Fraction {
        fractions: fractions.to_vec(),
    })
}

fn add(graph: &mut NetworkGraph, params: ElementParams) -> ElementId {
    graph.add_element(params, Position::default()).unwrap()
}

#[test]
fn catchment_with_diversion_is_valid() {
    // B1 -> C1 -> D1 -> { N1, N2 }
    let mut g = NetworkGraph::new();
    let b = add(&mut g, subbasin(3.2));
    let c = add(&mut g, reach());
    let d = add(&mut g, fraction_diversion(&[0.7, 0.3]));
    let n1 = add(&mut g, ElementParams::Node);
    let n2 = add(&mut g, ElementParams::Node);

    g.add_connection(b, c, None).unwrap();
    g.add_connection(c, d, None).unwrap();
    let main = g.add_connection(d, n1, None).unwrap();
    let side = g.add_connection(d, n2, None).unwrap();

    // Diversion outlets get the next free index.
    assert_eq!(g.connection(main).unwrap().order, Some(0));
    assert_eq!(g.connection(side).unwrap().order, Some(1));

    let names: Vec<_> = g.elements().map(|e| e.name.as_str()).collect();
    assert_eq!(names, ["B1", "C1", "D1", "N1", "N2"]);

    assert_eq!(validate(&g), vec![]);
    assert_eq!(upstream_order(&g).unwrap()[0], b);
}

#[test]
fn three_cycle_reports_exactly_one_cycle() {
    let mut g = NetworkGraph::new();
    let a = add(&mut g, ElementParams::Node);
    let b = add(&mut g, ElementParams::Node);
    let c = add(&mut g, ElementParams::Node);
    g.add_connection(a, b, None).unwrap();
    g.add_connection(b, c, None).unwrap();
    let closing = g.add_connection(c, a, None).unwrap();

    let diags = validate(&g);
    let cycles: Vec<_> = diags
        .iter()
        .filter(|d| d.code == DiagnosticCode::Cycle)
        .collect();
    assert_eq!(cycles.len(), 1);
    assert!(cycles[0].is_error());
    assert_eq!(cycles[0].connections, vec![closing]);
    assert!(upstream_order(&g).is_none());
}

#[test]
fn second_subbasin_outlet_is_rejected() {
    let mut g = NetworkGraph::new();
    let b = add(&mut g, subbasin(1.0));
    let n1 = add(&mut g, ElementParams::Node);
    let n2 = add(&mut g, ElementParams::Node);
    g.add_connection(b, n1, None).unwrap();

    let before = g.clone();
    let err = g.add_connection(b, n2, None).unwrap_err();
    assert_eq!(
        err,
        GraphError::OutletCapacityExceeded {
            element: b,
            kind: ElementKind::Subbasin,
            limit: 1,
        }
    );
    assert_eq!(g, before);
    assert_eq!(g.revision(), before.revision());
}

#[test]
fn diversion_accepts_several_outlets() {
    let mut g = NetworkGraph::new();
    let d = add(&mut g, fraction_diversion(&[0.5, 0.5]));
    let n1 = add(&mut g, ElementParams::Node);
    let n2 = add(&mut g, ElementParams::Node);

    g.add_connection(d, n1, Some(0)).unwrap();
    g.add_connection(d, n2, Some(1)).unwrap();
    assert_eq!(g.outgoing(d).count(), 2);

    let err = g.add_connection(d, n2, Some(1)).unwrap_err();
    assert_eq!(err, GraphError::OrderConflict { element: d, order: 1 });
}

#[test]
fn removing_an_element_cascades_to_its_connections() {
    let mut g = NetworkGraph::new();
    let b = add(&mut g, subbasin(1.0));
    let c = add(&mut g, reach());
    let n = add(&mut g, ElementParams::Node);
    g.add_connection(b, c, None).unwrap();
    let kept_out = g.add_connection(c, n, None).unwrap();
    let other = add(&mut g, subbasin(2.0));
    let kept = g.add_connection(other, n, None).unwrap();

    let removed = g.remove_element(c).unwrap();
    assert_eq!(removed.id, c);
    assert_eq!(g.connection_count(), 1);
    assert!(g.connection(kept).is_some());
    assert!(g.connection(kept_out).is_none());
    assert!(g.connections().all(|conn| !conn.touches(c)));

    // Gone for good.
    assert!(matches!(g.remove_element(c), Err(GraphError::NotFound(_))));
}

#[test]
fn negative_area_names_the_field() {
    let mut g = NetworkGraph::new();
    let mut params = SubbasinParams::with_area(1.0);
    params.area = -5.0;

    let err = g
        .add_element(ElementParams::Subbasin(params), Position::default())
        .unwrap_err();
    assert_eq!(err.schema_field(), Some("area"));
    assert!(g.is_empty());
}

#[test]
fn record_with_negative_area_is_rejected() {
    let mut record = ElementParams::Subbasin(SubbasinParams::with_area(1.0)).to_record();
    record.insert("area".into(), ParamValue::Number(-5.0));

    let violation = ElementParams::from_record(ElementKind::Subbasin, &record).unwrap_err();
    assert_eq!(violation.field, "area");
}

#[test]
fn self_loop_leaves_graph_unchanged() {
    let mut g = NetworkGraph::new();
    let n = add(&mut g, ElementParams::Node);
    let before = g.clone();

    assert_eq!(
        g.add_connection(n, n, None),
        Err(GraphError::SelfLoop { element: n })
    );
    assert_eq!(g, before);
    assert_eq!(g.connection_count(), 0);
}

#[test]
fn update_parameters_keeps_the_kind() {
    let mut g = NetworkGraph::new();
    let b = add(&mut g, subbasin(1.0));

    let err = g.update_parameters(b, ElementParams::Node).unwrap_err();
    assert!(matches!(err, GraphError::KindMismatch { .. }));

    g.update_parameters(b, subbasin(9.0)).unwrap();
    match &g.element(b).unwrap().params {
        ElementParams::Subbasin(p) => assert_eq!(p.area, 9.0),
        other => panic!("unexpected params {other:?}"),
    }
}

#[test]
fn ids_are_not_reused_after_removal() {
    let mut g = NetworkGraph::new();
    let a = add(&mut g, ElementParams::Node);
    g.remove_element(a).unwrap();
    let b = add(&mut g, ElementParams::Node);
    assert_ne!(a, b);
    assert_eq!(g.element(b).unwrap().name, "N2");
}

#[test]
fn validation_is_complete_not_first_failure() {
    let mut g = NetworkGraph::new();
    let a = add(&mut g, ElementParams::Node);
    let b = add(&mut g, ElementParams::Node);
    g.add_connection(a, b, None).unwrap();
    g.add_connection(b, a, None).unwrap();
    let head = add(&mut g, subbasin(1.0));
    g.add_connection(a, head, None).unwrap_err();
    let feeder = add(&mut g, ElementParams::Node);
    g.add_connection(feeder, head, None).unwrap();

    let diags = validate(&g);
    assert!(has_errors(&diags));
    let codes: Vec<_> = diags.iter().map(|d| d.code).collect();
    assert!(codes.contains(&DiagnosticCode::Cycle));
    assert!(codes.contains(&DiagnosticCode::SubbasinInflow));
    assert!(codes.contains(&DiagnosticCode::UnroutedRunoff));
}

#[derive(Debug, Clone)]
enum Op {
    Add(u8),
    Remove(usize),
    Connect(usize, usize),
    Disconnect(usize),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u8..4).prop_map(Op::Add),
        (0usize..16).prop_map(Op::Remove),
        (0usize..16, 0usize..16).prop_map(|(s, t)| Op::Connect(s, t)),
        (0usize..16).prop_map(Op::Disconnect),
    ]
}

fn params_for(kind: u8) -> ElementParams {
    match kind {
        0 => subbasin(1.0),
        1 => reach(),
        2 => ElementParams::Node,
        _ => fraction_diversion(&[0.5, 0.5]),
    }
}

proptest! {
    #[test]
    fn mutations_preserve_structural_invariants(ops in prop::collection::vec(op(), 0..60)) {
        let mut g = NetworkGraph::new();
        for op in ops {
            let ids: Vec<_> = g.elements().map(|e| e.id).collect();
            let conns: Vec<_> = g.connections().map(|c| c.id).collect();
            let _ = match op {
                Op::Add(kind) => g.add_element(params_for(kind), Position::default()).map(|_| ()),
                Op::Remove(i) if !ids.is_empty() => g.remove_element(ids[i % ids.len()]).map(|_| ()),
                Op::Connect(s, t) if !ids.is_empty() => g
                    .add_connection(ids[s % ids.len()], ids[t % ids.len()], None)
                    .map(|_| ()),
                Op::Disconnect(i) if !conns.is_empty() => {
                    g.remove_connection(conns[i % conns.len()]).map(|_| ())
                }
                _ => Ok(()),
            };
        }

        for conn in g.connections() {
            prop_assert!(g.element(conn.source).is_some());
            prop_assert!(g.element(conn.target).is_some());
            prop_assert_ne!(conn.source, conn.target);
        }
        for element in g.elements() {
            if let Some(limit) = element.kind().max_outlets() {
                prop_assert!(g.outgoing(element.id).count() <= limit);
            }
        }
        let diags = validate(&g);
        prop_assert!(diags.iter().all(|d| !matches!(
            d.code,
            DiagnosticCode::DanglingReference | DiagnosticCode::SelfLoop | DiagnosticCode::OutletCapacity
        )));
    }
}
