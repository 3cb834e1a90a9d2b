//! Schema migration framework.
//!
//! Migrations run on the generic `serde_json::Value` tree so that each step
//! only needs to know the shape of its own input version. Every step is a
//! pure function from version `n` to `n + 1`.

use std::collections::BTreeMap;

use serde_json::{Map, Value, json};
use tracing::debug;

use crate::{DocumentError, DocumentResult};

pub const CURRENT_FORMAT_VERSION: u32 = 3;

/// Oldest version the migration chain can upgrade.
pub const MIN_FORMAT_VERSION: u32 = 1;

/// Legacy upper-case subbasin codes, the field names that replaced them and
/// the value a legacy model assumed when the code was absent.
const LEGACY_SUBBASIN_CODES: &[(&str, &str, f64)] = &[
    ("AREA", "area", 0.0),
    ("IMP", "imperviousness", 0.0),
    ("LAG", "lag", 0.0),
    ("INFIL", "infiltration", 0.0),
    ("SS", "surface_store", 3.0),
    ("FS", "evaporation_scaling", 0.4),
    ("RC", "runoff_coefficient", 0.3),
    ("RS", "surface_recession", 0.0),
    ("RR", "excess_threshold", 0.0),
    ("RK", "routing_coefficient", 0.3),
    ("RX", "routing_exponent", 1.2),
    ("RDEL", "runoff_delay", 0.0),
    ("FC", "field_capacity", 0.8),
    ("DCS", "dry_store", 300.0),
    ("DCT", "drain_threshold", 360.0),
    ("A", "percolation_fraction", 0.3),
    ("GSU", "groundwater_limit", 300.0),
    ("GSP", "groundwater_power", 2.0),
    ("GDEL", "groundwater_delay", 0.0),
];

/// Legacy counter keys carried into the label counters.
const LEGACY_LABEL_COUNTERS: &[&str] = &["subbasin", "node", "reach", "diversion"];

/// Read the version tag of a raw document.
///
/// First-release documents carry `"version": "1.0"` instead of an integer
/// `format_version`; only the major number is significant.
pub fn document_version(value: &Value) -> DocumentResult<u32> {
    let root = value
        .as_object()
        .ok_or_else(|| DocumentError::format("document root is not a mapping"))?;

    if let Some(tag) = root.get("format_version") {
        return tag
            .as_u64()
            .and_then(|v| u32::try_from(v).ok())
            .ok_or_else(|| DocumentError::format(format!("invalid format_version {tag}")));
    }

    match root.get("version").and_then(Value::as_str) {
        Some(text) => text
            .split('.')
            .next()
            .and_then(|major| major.trim().parse::<u32>().ok())
            .ok_or_else(|| DocumentError::format(format!("invalid version tag '{text}'"))),
        None => Err(DocumentError::format("missing format_version")),
    }
}

/// Upgrade a raw document to [`CURRENT_FORMAT_VERSION`].
///
/// Versions newer than the current one are rejected rather than guessed at.
pub fn migrate_to_current(mut value: Value) -> DocumentResult<Value> {
    let mut version = document_version(&value)?;
    if version > CURRENT_FORMAT_VERSION {
        return Err(DocumentError::format(format!(
            "format version {version} is newer than the supported version {CURRENT_FORMAT_VERSION}"
        )));
    }
    if version < MIN_FORMAT_VERSION {
        return Err(DocumentError::format(format!(
            "format version {version} is older than the oldest supported version {MIN_FORMAT_VERSION}"
        )));
    }

    while version < CURRENT_FORMAT_VERSION {
        value = migrate_one_version(version, value)?;
        version += 1;
        debug!(to = version, "document migrated");
    }
    Ok(value)
}

fn migrate_one_version(version: u32, value: Value) -> DocumentResult<Value> {
    match version {
        1 => migrate_v1_to_v2(value),
        2 => migrate_v2_to_v3(value),
        v => Err(DocumentError::format(format!(
            "No migration path from version {v}"
        ))),
    }
}

/// v1 kept subbasins and nodes in their own lists under string ids
/// (`subbasin_3`), drew reaches and diversions as edges between two nodes and
/// listed subbasin-to-node links as `connections`. v2 has one element list
/// with integer ids; a reach or diversion edge becomes an element halfway
/// along the edge, wired in by two connections.
fn migrate_v1_to_v2(value: Value) -> DocumentResult<Value> {
    let Value::Object(mut root) = value else {
        return Err(DocumentError::corrupt("document is not a mapping"));
    };

    let mut elements = Vec::new();
    let mut connections = Vec::new();
    let mut subbasins = BTreeMap::new();
    let mut nodes = BTreeMap::new();

    for item in take_list(&mut root, "subbasins")? {
        let mut item = into_object(item, "subbasin")?;
        let placed = register(&mut subbasins, &item, "subbasin", elements.len())?;
        let parameters = subbasin_parameters(&mut item)?;
        elements.push(legacy_element(&item, "subbasin", placed, parameters));
    }
    for item in take_list(&mut root, "nodes")? {
        let item = into_object(item, "node")?;
        let placed = register(&mut nodes, &item, "node", elements.len())?;
        elements.push(legacy_element(&item, "node", placed, json!({})));
    }

    for link in take_list(&mut root, "connections")? {
        let link = into_object(link, "connection")?;
        let (Some(source), Some(target)) = (
            endpoint(&subbasins, &link, "source_subbasin_id"),
            endpoint(&nodes, &link, "dest_node_id"),
        ) else {
            debug!(connection = ?link.get("id"), "dropping link with unknown endpoint");
            continue;
        };
        push_connection(&mut connections, source.id, target.id, None);
    }

    for kind in ["reach", "diversion"] {
        let list = if kind == "reach" { "reaches" } else { "diversions" };
        for edge in take_list(&mut root, list)? {
            let edge = into_object(edge, kind)?;
            let (Some(source), Some(target)) = (
                endpoint(&nodes, &edge, "source_node_id"),
                endpoint(&nodes, &edge, "dest_node_id"),
            ) else {
                debug!(kind, edge = ?edge.get("id"), "dropping edge with unknown endpoint");
                continue;
            };
            let placed = Placed {
                id: elements.len(),
                x: (source.x + target.x) / 2.0,
                y: (source.y + target.y) / 2.0,
            };
            let (parameters, outlet_order) = if kind == "reach" {
                (default_reach_parameters(), None)
            } else {
                (json!({ "rule": "fraction", "fractions": [1.0] }), Some(0))
            };
            elements.push(legacy_element(&edge, kind, placed, parameters));
            push_connection(&mut connections, source.id, placed.id, None);
            push_connection(&mut connections, placed.id, target.id, outlet_order);
        }
    }

    let counters = match root.remove("counters") {
        None | Some(Value::Null) => None,
        Some(Value::Object(legacy)) => Some(json!({
            "next_element_id": elements.len(),
            "next_connection_id": connections.len(),
            "labels": legacy_labels(&legacy)?,
        })),
        Some(other) => {
            return Err(DocumentError::corrupt(format!("counters {other} is not a mapping")));
        }
    };

    let mut upgraded = Map::new();
    upgraded.insert("format_version".into(), json!(2));
    if let Some(counters) = counters {
        upgraded.insert("counters".into(), counters);
    }
    upgraded.insert("elements".into(), Value::Array(elements));
    upgraded.insert("connections".into(), Value::Array(connections));
    Ok(Value::Object(upgraded))
}

/// A legacy subbasin or node, by its new integer id.
#[derive(Debug, Clone, Copy)]
struct Placed {
    id: usize,
    x: f64,
    y: f64,
}

fn register(
    table: &mut BTreeMap<String, Placed>,
    item: &Map<String, Value>,
    kind: &str,
    id: usize,
) -> DocumentResult<Placed> {
    let key = item
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| DocumentError::corrupt(format!("{kind} without a string id")))?;
    let placed = Placed {
        id,
        x: coordinate(item, "x")?,
        y: coordinate(item, "y")?,
    };
    if table.insert(key.to_string(), placed).is_some() {
        return Err(DocumentError::corrupt(format!("duplicate {kind} id '{key}'")));
    }
    Ok(placed)
}

fn endpoint(
    table: &BTreeMap<String, Placed>,
    item: &Map<String, Value>,
    field: &str,
) -> Option<Placed> {
    item.get(field)
        .and_then(Value::as_str)
        .and_then(|key| table.get(key))
        .copied()
}

/// Missing coordinates read as zero.
fn coordinate(item: &Map<String, Value>, axis: &str) -> DocumentResult<f64> {
    match item.get(axis) {
        None | Some(Value::Null) => Ok(0.0),
        Some(v) => v
            .as_f64()
            .ok_or_else(|| DocumentError::corrupt(format!("coordinate {axis} = {v} is not a number"))),
    }
}

fn legacy_element(item: &Map<String, Value>, kind: &str, at: Placed, parameters: Value) -> Value {
    let name = item.get("label").and_then(Value::as_str).unwrap_or_default();
    json!({
        "id": at.id,
        "kind": kind,
        "name": name,
        "position": { "x": at.x, "y": at.y },
        "parameters": parameters,
    })
}

fn push_connection(connections: &mut Vec<Value>, source: usize, target: usize, order: Option<u32>) {
    let id = connections.len();
    connections.push(json!({ "id": id, "source": source, "target": target, "order": order }));
}

/// Upper-case codes become field names, absent codes take their legacy
/// default and the element-level rainfall moves into the parameters.
fn subbasin_parameters(item: &mut Map<String, Value>) -> DocumentResult<Value> {
    let mut params = match item.remove("parameters") {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(params)) => params,
        Some(other) => {
            return Err(DocumentError::corrupt(format!("parameters {other} is not a mapping")));
        }
    };
    for (code, name, default) in LEGACY_SUBBASIN_CODES {
        let value = params.remove(*code).unwrap_or(json!(default));
        params.insert((*name).to_string(), value);
    }
    let unit = item.remove("rainfall_time_unit").unwrap_or(json!("hours"));
    params.insert("rainfall_time_unit".into(), unit);
    let rows = item.remove("rainfall_data").unwrap_or(json!([]));
    params.insert("rainfall".into(), rainfall_table(rows)?);
    Ok(Value::Object(params))
}

/// Legacy reaches had no parameters of their own.
fn default_reach_parameters() -> Value {
    json!({
        "routing_method": "muskingum",
        "length": 1000.0,
        "slope": 0.001,
        "bottom_width": 5.0,
        "side_slope": 2.0,
        "manning_n": 0.035,
    })
}

fn legacy_labels(legacy: &Map<String, Value>) -> DocumentResult<Value> {
    let mut labels = Map::new();
    for &kind in LEGACY_LABEL_COUNTERS {
        let Some(value) = legacy.get(kind) else {
            continue;
        };
        let n = value
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .ok_or_else(|| DocumentError::corrupt(format!("{kind} counter {value} is not a count")))?;
        labels.insert(kind.to_string(), json!(n));
    }
    Ok(Value::Object(labels))
}

/// `[{time, rainfall_mm}, ...]` to `[[time, rainfall_mm], ...]`. Missing
/// cells read as zero.
fn rainfall_table(rows: Value) -> DocumentResult<Value> {
    let Value::Array(rows) = rows else {
        return Err(DocumentError::corrupt("rainfall_data is not a list"));
    };
    rows.into_iter()
        .map(|row| {
            let row = row
                .as_object()
                .ok_or_else(|| DocumentError::corrupt("rainfall_data row is not a mapping"))?;
            let cell = |name: &str| row.get(name).cloned().unwrap_or(json!(0.0));
            Ok(json!([cell("time"), cell("rainfall_mm")]))
        })
        .collect::<DocumentResult<Vec<_>>>()
        .map(Value::Array)
}

/// v2 diversions held one `split_fraction`, the share sent to the diverted
/// outlet. v3 stores an explicit rule and adds the counters block; unless a
/// v1 document supplied one, it is left absent here and rebuilt on load.
fn migrate_v2_to_v3(mut value: Value) -> DocumentResult<Value> {
    let root = as_object_mut(&mut value, "document")?;
    root.insert("format_version".into(), json!(3));

    for element in list_mut(root, "elements")? {
        let element = as_object_mut(element, "element")?;
        if element.get("kind").and_then(Value::as_str) != Some("diversion") {
            continue;
        }
        let Some(params) = element.get_mut("parameters") else {
            continue;
        };
        let params = as_object_mut(params, "parameters")?;
        let Some(split) = params.remove("split_fraction") else {
            continue;
        };
        let f = split
            .as_f64()
            .ok_or_else(|| DocumentError::corrupt(format!("split_fraction {split} is not a number")))?;
        params.insert("rule".into(), json!("fraction"));
        params.insert("fractions".into(), json!([1.0 - f, f]));
    }

    Ok(value)
}

fn into_object(value: Value, what: &str) -> DocumentResult<Map<String, Value>> {
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(DocumentError::corrupt(format!("{what} is not a mapping"))),
    }
}

/// Take an optional list field out of `root`; a missing field is empty.
fn take_list(root: &mut Map<String, Value>, field: &str) -> DocumentResult<Vec<Value>> {
    match root.remove(field) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => Ok(items),
        Some(_) => Err(DocumentError::corrupt(format!("{field} is not a list"))),
    }
}

fn as_object_mut<'a>(value: &'a mut Value, what: &str) -> DocumentResult<&'a mut Map<String, Value>> {
    value
        .as_object_mut()
        .ok_or_else(|| DocumentError::corrupt(format!("{what} is not a mapping")))
}

/// Entries of an optional list field; a missing field has no entries.
fn list_mut<'a>(
    root: &'a mut Map<String, Value>,
    field: &str,
) -> DocumentResult<std::slice::IterMut<'a, Value>> {
    match root.get_mut(field) {
        Some(Value::Array(items)) => Ok(items.iter_mut()),
        Some(_) => Err(DocumentError::corrupt(format!("{field} is not a list"))),
        None => Ok(Default::default()),
    }
}
