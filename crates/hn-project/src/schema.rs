//! Serde view of the current (v3) document.
//!
//! Older documents are upgraded at the `serde_json::Value` level by
//! [`crate::migrate`] before they are decoded into these types.

use std::collections::BTreeMap;

use hn_core::{ConnectionId, ElementId, Real};
use hn_graph::{ElementKind, ParameterRecord};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Document {
    pub format_version: u32,
    /// Absent in documents migrated from before counters were stored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counters: Option<CountersDoc>,
    #[serde(default)]
    pub elements: Vec<ElementDoc>,
    #[serde(default)]
    pub connections: Vec<ConnectionDoc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CountersDoc {
    pub next_element_id: u32,
    pub next_connection_id: u32,
    /// Keyed by element kind name (`subbasin`, `reach`, ...).
    #[serde(default)]
    pub labels: BTreeMap<String, u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ElementDoc {
    pub id: ElementId,
    pub kind: ElementKind,
    pub name: String,
    pub position: PositionDoc,
    #[serde(default)]
    pub parameters: ParameterRecord,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PositionDoc {
    pub x: Real,
    pub y: Real,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConnectionDoc {
    pub id: ConnectionId,
    pub source: ElementId,
    pub target: ElementId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<u32>,
}
