//! Conversion between a [`NetworkGraph`] and its current-version [`Document`].

use std::collections::BTreeMap;

use hn_graph::{
    Connection, Counters, Element, ElementKind, ElementParams, GraphParts,
    LabelCounters, NetworkGraph, Position,
};

use crate::migrate::CURRENT_FORMAT_VERSION;
use crate::schema::{ConnectionDoc, CountersDoc, Document, ElementDoc, PositionDoc};
use crate::{DocumentError, DocumentResult};

/// Snapshot `graph` as a document.
///
/// Never fails: topologically invalid work in progress is saved as is.
/// Elements are written by id and connections by (source, order, id), so
/// saving an unchanged graph always yields the same document.
pub fn save(graph: &NetworkGraph) -> Document {
    let elements = graph
        .elements()
        .map(|e| ElementDoc {
            id: e.id,
            kind: e.kind(),
            name: e.name.clone(),
            position: PositionDoc {
                x: e.position.x,
                y: e.position.y,
            },
            parameters: e.params.to_record(),
        })
        .collect();

    let mut connections: Vec<ConnectionDoc> = graph
        .connections()
        .map(|c| ConnectionDoc {
            id: c.id,
            source: c.source,
            target: c.target,
            order: c.order,
        })
        .collect();
    connections.sort_by_key(|c| (c.source, c.order, c.id));

    let counters = graph.counters();
    Document {
        format_version: CURRENT_FORMAT_VERSION,
        counters: Some(CountersDoc {
            next_element_id: counters.next_element,
            next_connection_id: counters.next_connection,
            labels: ElementKind::ALL
                .iter()
                .map(|&kind| (kind.as_str().to_string(), counters.labels.get(kind)))
                .collect(),
        }),
        elements,
        connections,
    }
}

/// Rebuild a graph from a current-version document.
///
/// Returns the complete graph or an error, never a partial graph.
pub fn load(document: Document) -> DocumentResult<NetworkGraph> {
    if document.format_version != CURRENT_FORMAT_VERSION {
        return Err(DocumentError::format(format!(
            "expected format version {CURRENT_FORMAT_VERSION}, found {} (migrate first)",
            document.format_version
        )));
    }

    let mut elements = Vec::with_capacity(document.elements.len());
    for doc in document.elements {
        let params = ElementParams::from_record(doc.kind, &doc.parameters).map_err(|violation| {
            DocumentError::Schema {
                element: doc.id,
                kind: doc.kind,
                violation,
            }
        })?;
        elements.push(Element {
            id: doc.id,
            name: doc.name,
            position: Position::new(doc.position.x, doc.position.y),
            params,
        });
    }

    let connections = document
        .connections
        .into_iter()
        .map(|doc| Connection {
            id: doc.id,
            source: doc.source,
            target: doc.target,
            order: doc.order,
        })
        .collect();

    let counters = document.counters.map(decode_counters).transpose()?;

    NetworkGraph::restore(GraphParts {
        elements,
        connections,
        counters,
    })
    .map_err(|err| DocumentError::corrupt(err.to_string()))
}

fn decode_counters(doc: CountersDoc) -> DocumentResult<Counters> {
    let by_name: BTreeMap<&str, ElementKind> =
        ElementKind::ALL.iter().map(|&k| (k.as_str(), k)).collect();

    let mut labels = LabelCounters::default();
    for (name, value) in &doc.labels {
        let kind = by_name
            .get(name.as_str())
            .ok_or_else(|| DocumentError::corrupt(format!("unknown label counter '{name}'")))?;
        labels.set(*kind, *value);
    }

    Ok(Counters {
        next_element: doc.next_element_id,
        next_connection: doc.next_connection_id,
        labels,
    })
}
