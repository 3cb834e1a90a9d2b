//! Element kinds and the parameter schema of each kind.
//!
//! Schemas are static data: dialogs build their input forms from them, the
//! palette enumerates [`ElementKind::ALL`], and every parameter record that
//! enters a graph (through a mutation or a loaded document) is checked
//! against them.

use std::collections::BTreeMap;
use std::fmt;

use hn_core::{Real, Tolerances, all_finite, nearly_equal};
use serde::{Deserialize, Serialize};

/// The closed set of element kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    Subbasin,
    Reach,
    Node,
    Diversion,
}

impl ElementKind {
    /// Every creatable kind, in palette order.
    pub const ALL: [ElementKind; 4] = [
        ElementKind::Subbasin,
        ElementKind::Reach,
        ElementKind::Node,
        ElementKind::Diversion,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ElementKind::Subbasin => "subbasin",
            ElementKind::Reach => "reach",
            ElementKind::Node => "node",
            ElementKind::Diversion => "diversion",
        }
    }

    /// Prefix of the default display name (`B1`, `C1`, `N1`, `D1`).
    pub fn label_prefix(self) -> &'static str {
        match self {
            ElementKind::Subbasin => "B",
            ElementKind::Reach => "C",
            ElementKind::Node => "N",
            ElementKind::Diversion => "D",
        }
    }

    /// Maximum number of outgoing connections, `None` when unbounded.
    ///
    /// A diversion's outlets are bounded by its split rule instead, which the
    /// validator checks.
    pub fn max_outlets(self) -> Option<usize> {
        match self {
            ElementKind::Subbasin | ElementKind::Reach | ElementKind::Node => Some(1),
            ElementKind::Diversion => None,
        }
    }

    /// Whether the kind has an inlet. Subbasins are headwater elements.
    pub fn accepts_inflow(self) -> bool {
        !matches!(self, ElementKind::Subbasin)
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored parameter value.
///
/// Variant order matters for untagged decoding: an empty list decodes as an
/// empty table, which [`ParamValue::as_series`] also accepts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Number(Real),
    Text(String),
    Table(Vec<Vec<Real>>),
    Series(Vec<Real>),
}

impl ParamValue {
    pub fn as_number(&self) -> Option<Real> {
        match self {
            ParamValue::Number(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ParamValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_series(&self) -> Option<&[Real]> {
        match self {
            ParamValue::Series(values) => Some(values),
            ParamValue::Table(rows) if rows.is_empty() => Some(&[]),
            _ => None,
        }
    }

    pub fn as_table(&self) -> Option<&[Vec<Real>]> {
        match self {
            ParamValue::Table(rows) => Some(rows),
            ParamValue::Series(values) if values.is_empty() => Some(&[]),
            _ => None,
        }
    }
}

/// Untyped parameter record keyed by field name.
///
/// `BTreeMap` keeps field order stable in saved documents.
pub type ParameterRecord = BTreeMap<String, ParamValue>;

/// One end of a numeric domain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Bound {
    Unbounded,
    Inclusive(Real),
    Exclusive(Real),
}

/// Admissible range of a numeric value. Non-finite values are never admissible.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Domain {
    pub min: Bound,
    pub max: Bound,
}

impl Domain {
    pub const ANY: Domain = Domain {
        min: Bound::Unbounded,
        max: Bound::Unbounded,
    };
    pub const NON_NEGATIVE: Domain = Domain {
        min: Bound::Inclusive(0.0),
        max: Bound::Unbounded,
    };
    pub const POSITIVE: Domain = Domain {
        min: Bound::Exclusive(0.0),
        max: Bound::Unbounded,
    };
    pub const UNIT_INTERVAL: Domain = Domain {
        min: Bound::Inclusive(0.0),
        max: Bound::Inclusive(1.0),
    };
    pub const PERCENT: Domain = Domain {
        min: Bound::Inclusive(0.0),
        max: Bound::Inclusive(100.0),
    };

    pub fn contains(&self, value: Real) -> bool {
        if !value.is_finite() {
            return false;
        }
        let above_min = match self.min {
            Bound::Unbounded => true,
            Bound::Inclusive(m) => value >= m,
            Bound::Exclusive(m) => value > m,
        };
        let below_max = match self.max {
            Bound::Unbounded => true,
            Bound::Inclusive(m) => value <= m,
            Bound::Exclusive(m) => value < m,
        };
        above_min && below_max
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.min {
            Bound::Unbounded => write!(f, "(-inf")?,
            Bound::Inclusive(m) => write!(f, "[{m}")?,
            Bound::Exclusive(m) => write!(f, "({m}")?,
        }
        match self.max {
            Bound::Unbounded => write!(f, ", inf)"),
            Bound::Inclusive(m) => write!(f, ", {m}]"),
            Bound::Exclusive(m) => write!(f, ", {m})"),
        }
    }
}

/// One column of a tabular field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColumnSpec {
    pub name: &'static str,
    pub domain: Domain,
}

/// Value type of a field, with its constraints.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldType {
    Number(Domain),
    /// A whole, non-negative number that fits an `u32`.
    Index,
    Choice(&'static [&'static str]),
    /// A list of numbers, optionally constrained to a fixed sum.
    Series {
        domain: Domain,
        sum_to: Option<Real>,
    },
    /// Ordered rows, each a fixed-width tuple of numbers.
    Table {
        columns: &'static [ColumnSpec],
        /// Column whose values must strictly increase from row to row.
        increasing_column: Option<usize>,
        min_rows: usize,
    },
}

/// When a field must be present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Required,
    Optional,
    /// Required when the choice field `field` equals `equals`, and not
    /// allowed otherwise.
    RequiredWhen {
        field: &'static str,
        equals: &'static str,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldSpec {
    pub name: &'static str,
    /// Human-readable description for input forms.
    pub label: &'static str,
    pub unit: Option<&'static str>,
    pub ty: FieldType,
    pub presence: Presence,
}

/// Parameter schema of one element kind (or of a connection).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParameterSchema {
    pub name: &'static str,
    pub fields: &'static [FieldSpec],
}

/// Why a parameter record does not satisfy its schema.
#[derive(Debug, Clone, PartialEq)]
pub enum ViolationReason {
    Missing,
    Unknown,
    NotApplicable {
        selector: &'static str,
        value: String,
    },
    WrongType {
        expected: &'static str,
    },
    NonFinite,
    NotWhole {
        value: Real,
    },
    OutOfDomain {
        value: Real,
        domain: Domain,
    },
    UnknownChoice {
        value: String,
        allowed: &'static [&'static str],
    },
    RowWidth {
        row: usize,
        expected: usize,
        found: usize,
    },
    ColumnOutOfDomain {
        row: usize,
        column: &'static str,
        value: Real,
        domain: Domain,
    },
    NotIncreasing {
        row: usize,
        column: &'static str,
    },
    TooFewRows {
        min: usize,
        found: usize,
    },
    SumMismatch {
        sum: Real,
        expected: Real,
    },
}

impl fmt::Display for ViolationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViolationReason::Missing => write!(f, "required field is missing"),
            ViolationReason::Unknown => write!(f, "field is not part of the schema"),
            ViolationReason::NotApplicable { selector, value } => {
                write!(f, "field does not apply when {selector} is '{value}'")
            }
            ViolationReason::WrongType { expected } => write!(f, "expected {expected}"),
            ViolationReason::NonFinite => write!(f, "value is not finite"),
            ViolationReason::NotWhole { value } => {
                write!(f, "value {value} is not a whole number in [0, {}]", u32::MAX)
            }
            ViolationReason::OutOfDomain { value, domain } => {
                write!(f, "value {value} is outside {domain}")
            }
            ViolationReason::UnknownChoice { value, allowed } => {
                write!(f, "'{value}' is not one of {}", allowed.join(", "))
            }
            ViolationReason::RowWidth {
                row,
                expected,
                found,
            } => write!(f, "row {row} has {found} values (expected {expected})"),
            ViolationReason::ColumnOutOfDomain {
                row,
                column,
                value,
                domain,
            } => write!(f, "row {row} {column} = {value} is outside {domain}"),
            ViolationReason::NotIncreasing { row, column } => {
                write!(f, "row {row} {column} does not increase")
            }
            ViolationReason::TooFewRows { min, found } => {
                write!(f, "{found} rows (at least {min} required)")
            }
            ViolationReason::SumMismatch { sum, expected } => {
                write!(f, "values sum to {sum} (expected {expected})")
            }
        }
    }
}

/// A parameter record that does not satisfy its kind's schema.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{schema} parameter '{field}': {reason}")]
pub struct SchemaViolation {
    pub schema: &'static str,
    pub field: String,
    pub reason: ViolationReason,
}

impl ParameterSchema {
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Check a record, returning the first violation found.
    ///
    /// Unknown fields are reported first, then fields in schema order, so a
    /// bad selector is reported before the payload that depends on it.
    pub fn check(&self, record: &ParameterRecord) -> Result<(), SchemaViolation> {
        if let Some(name) = record.keys().find(|name| self.field(name).is_none()) {
            return Err(self.violation(name, ViolationReason::Unknown));
        }

        for spec in self.fields {
            // `excluded_by` names the selector field when the field must be absent.
            let (required, excluded_by) = match spec.presence {
                Presence::Required => (true, None),
                Presence::Optional => (false, None),
                Presence::RequiredWhen { field, equals } => {
                    let selected =
                        record.get(field).and_then(ParamValue::as_text) == Some(equals);
                    (selected, (!selected).then_some(field))
                }
            };

            match (record.get(spec.name), excluded_by) {
                (None, _) if required => {
                    return Err(self.violation(spec.name, ViolationReason::Missing));
                }
                (None, _) => {}
                (Some(_), Some(selector)) => {
                    let value = record
                        .get(selector)
                        .and_then(ParamValue::as_text)
                        .unwrap_or_default()
                        .to_string();
                    return Err(self.violation(
                        spec.name,
                        ViolationReason::NotApplicable { selector, value },
                    ));
                }
                (Some(value), None) => spec
                    .ty
                    .check(value)
                    .map_err(|reason| self.violation(spec.name, reason))?,
            }
        }

        Ok(())
    }

    pub(crate) fn violation(&self, field: &str, reason: ViolationReason) -> SchemaViolation {
        SchemaViolation {
            schema: self.name,
            field: field.to_string(),
            reason,
        }
    }
}

impl FieldType {
    fn check(&self, value: &ParamValue) -> Result<(), ViolationReason> {
        match *self {
            FieldType::Number(domain) => {
                let v = value
                    .as_number()
                    .ok_or(ViolationReason::WrongType { expected: "number" })?;
                check_number(v, domain)
            }
            FieldType::Index => {
                let v = value
                    .as_number()
                    .ok_or(ViolationReason::WrongType { expected: "number" })?;
                check_number(v, Domain::NON_NEGATIVE)?;
                if v.fract() != 0.0 || v > Real::from(u32::MAX) {
                    return Err(ViolationReason::NotWhole { value: v });
                }
                Ok(())
            }
            FieldType::Choice(allowed) => {
                let s = value
                    .as_text()
                    .ok_or(ViolationReason::WrongType { expected: "text" })?;
                if allowed.contains(&s) {
                    Ok(())
                } else {
                    Err(ViolationReason::UnknownChoice {
                        value: s.to_string(),
                        allowed,
                    })
                }
            }
            FieldType::Series { domain, sum_to } => {
                let values = value.as_series().ok_or(ViolationReason::WrongType {
                    expected: "list of numbers",
                })?;
                for &v in values {
                    check_number(v, domain)?;
                }
                if let Some(expected) = sum_to {
                    let sum: Real = values.iter().sum();
                    if !nearly_equal(sum, expected, Tolerances::default()) {
                        return Err(ViolationReason::SumMismatch { sum, expected });
                    }
                }
                Ok(())
            }
            FieldType::Table {
                columns,
                increasing_column,
                min_rows,
            } => {
                let rows = value
                    .as_table()
                    .ok_or(ViolationReason::WrongType { expected: "table" })?;
                if rows.len() < min_rows {
                    return Err(ViolationReason::TooFewRows {
                        min: min_rows,
                        found: rows.len(),
                    });
                }
                for (row, values) in rows.iter().enumerate() {
                    if values.len() != columns.len() {
                        return Err(ViolationReason::RowWidth {
                            row,
                            expected: columns.len(),
                            found: values.len(),
                        });
                    }
                    if !all_finite(values) {
                        return Err(ViolationReason::NonFinite);
                    }
                    for (column, &v) in columns.iter().zip(values) {
                        if !column.domain.contains(v) {
                            return Err(ViolationReason::ColumnOutOfDomain {
                                row,
                                column: column.name,
                                value: v,
                                domain: column.domain,
                            });
                        }
                    }
                }
                if let Some(col) = increasing_column {
                    for (row, pair) in rows.windows(2).enumerate() {
                        if pair[1][col] <= pair[0][col] {
                            return Err(ViolationReason::NotIncreasing {
                                row: row + 1,
                                column: columns[col].name,
                            });
                        }
                    }
                }
                Ok(())
            }
        }
    }
}

fn check_number(v: Real, domain: Domain) -> Result<(), ViolationReason> {
    if !v.is_finite() {
        return Err(ViolationReason::NonFinite);
    }
    if !domain.contains(v) {
        return Err(ViolationReason::OutOfDomain { value: v, domain });
    }
    Ok(())
}

/// Parameter schema for an element kind.
pub fn schema_for(kind: ElementKind) -> &'static ParameterSchema {
    match kind {
        ElementKind::Subbasin => &SUBBASIN_SCHEMA,
        ElementKind::Reach => &REACH_SCHEMA,
        ElementKind::Node => &NODE_SCHEMA,
        ElementKind::Diversion => &DIVERSION_SCHEMA,
    }
}

/// Schema of a connection's own attributes.
pub fn connection_schema() -> &'static ParameterSchema {
    &CONNECTION_SCHEMA
}

pub const TIME_UNITS: &[&str] = &["hours", "days", "minutes"];
pub const ROUTING_METHODS: &[&str] = &["muskingum", "kinematic_wave", "lag"];
pub const SPLIT_RULES: &[&str] = &["fraction", "threshold", "rating_curve"];

const fn number(
    name: &'static str,
    label: &'static str,
    unit: Option<&'static str>,
    domain: Domain,
) -> FieldSpec {
    FieldSpec {
        name,
        label,
        unit,
        ty: FieldType::Number(domain),
        presence: Presence::Required,
    }
}

const RAINFALL_COLUMNS: &[ColumnSpec] = &[
    ColumnSpec {
        name: "time",
        domain: Domain::NON_NEGATIVE,
    },
    ColumnSpec {
        name: "rainfall_mm",
        domain: Domain::NON_NEGATIVE,
    },
];

const RATING_COLUMNS: &[ColumnSpec] = &[
    ColumnSpec {
        name: "inflow",
        domain: Domain::NON_NEGATIVE,
    },
    ColumnSpec {
        name: "diverted",
        domain: Domain::NON_NEGATIVE,
    },
];

static SUBBASIN_SCHEMA: ParameterSchema = ParameterSchema {
    name: "subbasin",
    fields: &[
        // Basin characteristics
        number("area", "Area", Some("km2"), Domain::POSITIVE),
        number("imperviousness", "Imperviousness", Some("%"), Domain::PERCENT),
        number("lag", "Lag time", Some("h"), Domain::NON_NEGATIVE),
        number("infiltration", "Infiltration rate", Some("mm/h"), Domain::NON_NEGATIVE),
        // Surface / runoff store
        number("surface_store", "Surface store capacity", Some("mm"), Domain::NON_NEGATIVE),
        number("evaporation_scaling", "Evaporation scaling factor", None, Domain::UNIT_INTERVAL),
        number("runoff_coefficient", "Runoff coefficient", None, Domain::UNIT_INTERVAL),
        number("surface_recession", "Recession constant for surface", None, Domain::NON_NEGATIVE),
        number("excess_threshold", "Rainfall excess threshold", None, Domain::NON_NEGATIVE),
        number("routing_coefficient", "Routing storage coefficient", None, Domain::NON_NEGATIVE),
        number("routing_exponent", "Routing storage exponent", None, Domain::POSITIVE),
        number("runoff_delay", "Runoff delay", Some("steps"), Domain::NON_NEGATIVE),
        // Groundwater store
        number("field_capacity", "Field capacity fraction", None, Domain::UNIT_INTERVAL),
        number("dry_store", "Dry condition store", Some("mm"), Domain::NON_NEGATIVE),
        number("drain_threshold", "Drain capacity threshold", Some("mm"), Domain::NON_NEGATIVE),
        number("percolation_fraction", "Groundwater percolation fraction", None, Domain::UNIT_INTERVAL),
        number("groundwater_limit", "Groundwater store upper limit", Some("mm"), Domain::NON_NEGATIVE),
        number("groundwater_power", "Groundwater store power", None, Domain::POSITIVE),
        number("groundwater_delay", "Groundwater delay", Some("steps"), Domain::NON_NEGATIVE),
        // Hyetograph
        FieldSpec {
            name: "rainfall_time_unit",
            label: "Rainfall time step unit",
            unit: None,
            ty: FieldType::Choice(TIME_UNITS),
            presence: Presence::Optional,
        },
        FieldSpec {
            name: "rainfall",
            label: "Rainfall hyetograph",
            unit: Some("mm"),
            ty: FieldType::Table {
                columns: RAINFALL_COLUMNS,
                increasing_column: Some(0),
                min_rows: 0,
            },
            presence: Presence::Optional,
        },
    ],
};

static REACH_SCHEMA: ParameterSchema = ParameterSchema {
    name: "reach",
    fields: &[
        FieldSpec {
            name: "routing_method",
            label: "Routing method",
            unit: None,
            ty: FieldType::Choice(ROUTING_METHODS),
            presence: Presence::Required,
        },
        number("length", "Channel length", Some("m"), Domain::POSITIVE),
        number("slope", "Channel slope", Some("m/m"), Domain::POSITIVE),
        number("bottom_width", "Bottom width", Some("m"), Domain::NON_NEGATIVE),
        number("side_slope", "Side slope", Some("h:v"), Domain::NON_NEGATIVE),
        number("manning_n", "Manning roughness", None, Domain::POSITIVE),
    ],
};

static NODE_SCHEMA: ParameterSchema = ParameterSchema {
    name: "node",
    fields: &[],
};

static DIVERSION_SCHEMA: ParameterSchema = ParameterSchema {
    name: "diversion",
    fields: &[
        FieldSpec {
            name: "rule",
            label: "Split rule",
            unit: None,
            ty: FieldType::Choice(SPLIT_RULES),
            presence: Presence::Required,
        },
        FieldSpec {
            name: "fractions",
            label: "Share of inflow per outlet",
            unit: None,
            ty: FieldType::Series {
                domain: Domain::UNIT_INTERVAL,
                sum_to: Some(1.0),
            },
            presence: Presence::RequiredWhen {
                field: "rule",
                equals: "fraction",
            },
        },
        FieldSpec {
            name: "threshold",
            label: "Flow kept on the main outlet",
            unit: Some("m3/s"),
            ty: FieldType::Number(Domain::NON_NEGATIVE),
            presence: Presence::RequiredWhen {
                field: "rule",
                equals: "threshold",
            },
        },
        FieldSpec {
            name: "rating_curve",
            label: "Diverted flow by inflow",
            unit: Some("m3/s"),
            ty: FieldType::Table {
                columns: RATING_COLUMNS,
                increasing_column: Some(0),
                min_rows: 2,
            },
            presence: Presence::RequiredWhen {
                field: "rule",
                equals: "rating_curve",
            },
        },
    ],
};

static CONNECTION_SCHEMA: ParameterSchema = ParameterSchema {
    name: "connection",
    fields: &[FieldSpec {
        name: "order",
        label: "Outlet ordering index",
        unit: None,
        ty: FieldType::Index,
        presence: Presence::Optional,
    }],
};

#[cfg(test)]
mod tests {
    use super::*;

    fn record(pairs: &[(&str, ParamValue)]) -> ParameterRecord {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn every_kind_has_a_schema() {
        for kind in ElementKind::ALL {
            assert_eq!(schema_for(kind).name, kind.as_str());
        }
    }

    #[test]
    fn domain_bounds() {
        assert!(Domain::POSITIVE.contains(1e-9));
        assert!(!Domain::POSITIVE.contains(0.0));
        assert!(Domain::NON_NEGATIVE.contains(0.0));
        assert!(Domain::UNIT_INTERVAL.contains(1.0));
        assert!(!Domain::UNIT_INTERVAL.contains(1.01));
        assert!(!Domain::ANY.contains(Real::NAN));
        assert_eq!(Domain::POSITIVE.to_string(), "(0, inf)");
    }

    #[test]
    fn reach_missing_field() {
        let rec = record(&[
            ("routing_method", ParamValue::Text("lag".into())),
            ("length", ParamValue::Number(100.0)),
        ]);
        let err = schema_for(ElementKind::Reach).check(&rec).unwrap_err();
        assert_eq!(err.field, "slope");
        assert_eq!(err.reason, ViolationReason::Missing);
    }

    #[test]
    fn unknown_field_is_rejected() {
        let rec = record(&[("color", ParamValue::Text("red".into()))]);
        let err = schema_for(ElementKind::Node).check(&rec).unwrap_err();
        assert_eq!(err.field, "color");
        assert_eq!(err.reason, ViolationReason::Unknown);
    }

    #[test]
    fn diversion_payload_follows_rule() {
        let schema = schema_for(ElementKind::Diversion);

        let ok = record(&[
            ("rule", ParamValue::Text("fraction".into())),
            ("fractions", ParamValue::Series(vec![0.25, 0.75])),
        ]);
        assert!(schema.check(&ok).is_ok());

        let missing = record(&[("rule", ParamValue::Text("threshold".into()))]);
        assert_eq!(schema.check(&missing).unwrap_err().field, "threshold");

        let stray = record(&[
            ("rule", ParamValue::Text("threshold".into())),
            ("threshold", ParamValue::Number(2.0)),
            ("fractions", ParamValue::Series(vec![1.0])),
        ]);
        let err = schema.check(&stray).unwrap_err();
        assert_eq!(err.field, "fractions");
        assert!(matches!(err.reason, ViolationReason::NotApplicable { .. }));
    }

    #[test]
    fn fractions_must_sum_to_one() {
        let rec = record(&[
            ("rule", ParamValue::Text("fraction".into())),
            ("fractions", ParamValue::Series(vec![0.5, 0.4])),
        ]);
        let err = schema_for(ElementKind::Diversion).check(&rec).unwrap_err();
        assert!(matches!(err.reason, ViolationReason::SumMismatch { .. }));
    }

    #[test]
    fn rating_curve_must_increase() {
        let rec = record(&[
            ("rule", ParamValue::Text("rating_curve".into())),
            (
                "rating_curve",
                ParamValue::Table(vec![vec![0.0, 0.0], vec![5.0, 1.0], vec![5.0, 2.0]]),
            ),
        ]);
        let err = schema_for(ElementKind::Diversion).check(&rec).unwrap_err();
        assert_eq!(
            err.reason,
            ViolationReason::NotIncreasing {
                row: 2,
                column: "inflow"
            }
        );
    }

    #[test]
    fn unknown_choice_reported_before_payload() {
        let rec = record(&[
            ("rule", ParamValue::Text("weir".into())),
            ("threshold", ParamValue::Number(1.0)),
        ]);
        let err = schema_for(ElementKind::Diversion).check(&rec).unwrap_err();
        assert_eq!(err.field, "rule");
        assert!(matches!(err.reason, ViolationReason::UnknownChoice { .. }));
    }

    #[test]
    fn empty_list_decodes_as_either_shape() {
        let v: ParamValue = serde_json::from_str("[]").unwrap();
        assert_eq!(v.as_series(), Some(&[][..]));
        assert_eq!(v.as_table().map(|t| t.len()), Some(0));

        let v: ParamValue = serde_json::from_str("[0.5, 0.5]").unwrap();
        assert_eq!(v, ParamValue::Series(vec![0.5, 0.5]));

        let v: ParamValue = serde_json::from_str("3").unwrap();
        assert_eq!(v, ParamValue::Number(3.0));
    }

    #[test]
    fn connection_order_must_be_whole() {
        let schema = connection_schema();
        let order = |v: f64| record(&[("order", ParamValue::Number(v))]);
        assert!(schema.check(&order(2.0)).is_ok());
        assert!(schema.check(&ParameterRecord::new()).is_ok());
        assert_eq!(
            schema.check(&order(1.5)).unwrap_err().reason,
            ViolationReason::NotWhole { value: 1.5 }
        );
        assert!(matches!(
            schema.check(&order(-1.0)).unwrap_err().reason,
            ViolationReason::OutOfDomain { .. }
        ));
        assert_eq!(
            schema.check(&order(5.0e9)).unwrap_err().reason,
            ViolationReason::NotWhole { value: 5.0e9 }
        );
    }

    #[test]
    fn violation_message_names_field() {
        let rec = record(&[
            ("routing_method", ParamValue::Text("lag".into())),
            ("length", ParamValue::Number(-1.0)),
            ("slope", ParamValue::Number(0.01)),
            ("bottom_width", ParamValue::Number(1.0)),
            ("side_slope", ParamValue::Number(1.0)),
            ("manning_n", ParamValue::Number(0.03)),
        ]);
        let err = schema_for(ElementKind::Reach).check(&rec).unwrap_err();
        assert_eq!(
            err.to_string(),
            "reach parameter 'length': value -1 is outside (0, inf)"
        );
    }
}
