//! Typed parameter records for each element kind.
//!
//! The graph stores these typed values. Conversion to and from the untyped
//! [`ParameterRecord`] always passes through the kind's schema, so the
//! registry remains the single place where domains are declared.

use hn_core::Real;

use crate::registry::{
    ElementKind, ParamValue, ParameterRecord, SchemaViolation, ViolationReason, schema_for,
};

/// Time unit of a rainfall hyetograph's time column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeUnit {
    #[default]
    Hours,
    Days,
    Minutes,
}

impl TimeUnit {
    pub fn as_str(self) -> &'static str {
        match self {
            TimeUnit::Hours => "hours",
            TimeUnit::Days => "days",
            TimeUnit::Minutes => "minutes",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "hours" => Some(TimeUnit::Hours),
            "days" => Some(TimeUnit::Days),
            "minutes" => Some(TimeUnit::Minutes),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RainfallStep {
    pub time: Real,
    pub rainfall_mm: Real,
}

/// Rainfall time series applied to a subbasin.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Hyetograph {
    pub time_unit: TimeUnit,
    pub steps: Vec<RainfallStep>,
}

/// Rainfall-runoff parameters of a subbasin.
///
/// Field groups follow the basin characteristics, the surface/runoff store
/// and the groundwater store.
#[derive(Debug, Clone, PartialEq)]
pub struct SubbasinParams {
    pub area: Real,
    pub imperviousness: Real,
    pub lag: Real,
    pub infiltration: Real,

    pub surface_store: Real,
    pub evaporation_scaling: Real,
    pub runoff_coefficient: Real,
    pub surface_recession: Real,
    pub excess_threshold: Real,
    pub routing_coefficient: Real,
    pub routing_exponent: Real,
    pub runoff_delay: Real,

    pub field_capacity: Real,
    pub dry_store: Real,
    pub drain_threshold: Real,
    pub percolation_fraction: Real,
    pub groundwater_limit: Real,
    pub groundwater_power: Real,
    pub groundwater_delay: Real,

    pub rainfall: Hyetograph,
}

impl SubbasinParams {
    /// Default store coefficients for a basin of the given area (km²).
    pub fn with_area(area: Real) -> Self {
        Self {
            area,
            imperviousness: 0.0,
            lag: 0.0,
            infiltration: 0.0,
            surface_store: 3.0,
            evaporation_scaling: 0.4,
            runoff_coefficient: 0.3,
            surface_recession: 0.0,
            excess_threshold: 0.0,
            routing_coefficient: 0.3,
            routing_exponent: 1.2,
            runoff_delay: 0.0,
            field_capacity: 0.8,
            dry_store: 300.0,
            drain_threshold: 360.0,
            percolation_fraction: 0.3,
            groundwater_limit: 300.0,
            groundwater_power: 2.0,
            groundwater_delay: 0.0,
            rainfall: Hyetograph::default(),
        }
    }

    fn numbers(&self) -> [(&'static str, Real); 19] {
        [
            ("area", self.area),
            ("imperviousness", self.imperviousness),
            ("lag", self.lag),
            ("infiltration", self.infiltration),
            ("surface_store", self.surface_store),
            ("evaporation_scaling", self.evaporation_scaling),
            ("runoff_coefficient", self.runoff_coefficient),
            ("surface_recession", self.surface_recession),
            ("excess_threshold", self.excess_threshold),
            ("routing_coefficient", self.routing_coefficient),
            ("routing_exponent", self.routing_exponent),
            ("runoff_delay", self.runoff_delay),
            ("field_capacity", self.field_capacity),
            ("dry_store", self.dry_store),
            ("drain_threshold", self.drain_threshold),
            ("percolation_fraction", self.percolation_fraction),
            ("groundwater_limit", self.groundwater_limit),
            ("groundwater_power", self.groundwater_power),
            ("groundwater_delay", self.groundwater_delay),
        ]
    }

    fn write(&self, record: &mut ParameterRecord) {
        for (name, value) in self.numbers() {
            record.insert(name.to_string(), ParamValue::Number(value));
        }
        record.insert(
            "rainfall_time_unit".to_string(),
            ParamValue::Text(self.rainfall.time_unit.as_str().to_string()),
        );
        record.insert(
            "rainfall".to_string(),
            ParamValue::Table(
                self.rainfall
                    .steps
                    .iter()
                    .map(|s| vec![s.time, s.rainfall_mm])
                    .collect(),
            ),
        );
    }

    fn read(r: &Reader<'_>) -> Result<Self, SchemaViolation> {
        let time_unit = match r.optional_text("rainfall_time_unit")? {
            Some(s) => TimeUnit::parse(s).ok_or_else(|| {
                r.violation(
                    "rainfall_time_unit",
                    ViolationReason::WrongType {
                        expected: "time unit",
                    },
                )
            })?,
            None => TimeUnit::default(),
        };
        let steps = r
            .optional_table("rainfall")?
            .unwrap_or_default()
            .iter()
            .map(|row| RainfallStep {
                time: row[0],
                rainfall_mm: row[1],
            })
            .collect();

        Ok(Self {
            area: r.number("area")?,
            imperviousness: r.number("imperviousness")?,
            lag: r.number("lag")?,
            infiltration: r.number("infiltration")?,
            surface_store: r.number("surface_store")?,
            evaporation_scaling: r.number("evaporation_scaling")?,
            runoff_coefficient: r.number("runoff_coefficient")?,
            surface_recession: r.number("surface_recession")?,
            excess_threshold: r.number("excess_threshold")?,
            routing_coefficient: r.number("routing_coefficient")?,
            routing_exponent: r.number("routing_exponent")?,
            runoff_delay: r.number("runoff_delay")?,
            field_capacity: r.number("field_capacity")?,
            dry_store: r.number("dry_store")?,
            drain_threshold: r.number("drain_threshold")?,
            percolation_fraction: r.number("percolation_fraction")?,
            groundwater_limit: r.number("groundwater_limit")?,
            groundwater_power: r.number("groundwater_power")?,
            groundwater_delay: r.number("groundwater_delay")?,
            rainfall: Hyetograph { time_unit, steps },
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutingMethod {
    Muskingum,
    KinematicWave,
    Lag,
}

impl RoutingMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            RoutingMethod::Muskingum => "muskingum",
            RoutingMethod::KinematicWave => "kinematic_wave",
            RoutingMethod::Lag => "lag",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "muskingum" => Some(RoutingMethod::Muskingum),
            "kinematic_wave" => Some(RoutingMethod::KinematicWave),
            "lag" => Some(RoutingMethod::Lag),
            _ => None,
        }
    }
}

/// Trapezoidal channel cross-section.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelGeometry {
    pub bottom_width: Real,
    /// Horizontal run per unit rise of each bank.
    pub side_slope: Real,
    pub manning_n: Real,
}

impl Default for ChannelGeometry {
    fn default() -> Self {
        Self {
            bottom_width: 5.0,
            side_slope: 2.0,
            manning_n: 0.035,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReachParams {
    pub routing: RoutingMethod,
    /// Metres.
    pub length: Real,
    pub slope: Real,
    pub geometry: ChannelGeometry,
}

impl ReachParams {
    pub fn new(routing: RoutingMethod, length: Real, slope: Real) -> Self {
        Self {
            routing,
            length,
            slope,
            geometry: ChannelGeometry::default(),
        }
    }

    fn write(&self, record: &mut ParameterRecord) {
        record.insert(
            "routing_method".to_string(),
            ParamValue::Text(self.routing.as_str().to_string()),
        );
        for (name, value) in [
            ("length", self.length),
            ("slope", self.slope),
            ("bottom_width", self.geometry.bottom_width),
            ("side_slope", self.geometry.side_slope),
            ("manning_n", self.geometry.manning_n),
        ] {
            record.insert(name.to_string(), ParamValue::Number(value));
        }
    }

    fn read(r: &Reader<'_>) -> Result<Self, SchemaViolation> {
        let method = r.text("routing_method")?;
        let routing = RoutingMethod::parse(method).ok_or_else(|| {
            r.violation(
                "routing_method",
                ViolationReason::WrongType {
                    expected: "routing method",
                },
            )
        })?;
        Ok(Self {
            routing,
            length: r.number("length")?,
            slope: r.number("slope")?,
            geometry: ChannelGeometry {
                bottom_width: r.number("bottom_width")?,
                side_slope: r.number("side_slope")?,
                manning_n: r.number("manning_n")?,
            },
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatingPoint {
    pub inflow: Real,
    pub diverted: Real,
}

/// How a diversion splits its inflow among its outlets.
///
/// Outlets are addressed by the ordering index of the outgoing connection.
#[derive(Debug, Clone, PartialEq)]
pub enum SplitRule {
    /// `fractions[i]` of the inflow leaves through outlet `i`.
    Fraction { fractions: Vec<Real> },
    /// Flow up to `threshold` stays on outlet 0, the excess goes to outlet 1.
    Threshold { threshold: Real },
    /// Diverted flow (outlet 1) interpolated from inflow; the rest stays on outlet 0.
    RatingCurve { points: Vec<RatingPoint> },
}

impl SplitRule {
    pub fn name(&self) -> &'static str {
        match self {
            SplitRule::Fraction { .. } => "fraction",
            SplitRule::Threshold { .. } => "threshold",
            SplitRule::RatingCurve { .. } => "rating_curve",
        }
    }

    /// Number of outlets the rule distributes flow to.
    pub fn outlet_count(&self) -> usize {
        match self {
            SplitRule::Fraction { fractions } => fractions.len(),
            SplitRule::Threshold { .. } | SplitRule::RatingCurve { .. } => 2,
        }
    }

    fn write(&self, record: &mut ParameterRecord) {
        record.insert("rule".to_string(), ParamValue::Text(self.name().to_string()));
        match self {
            SplitRule::Fraction { fractions } => {
                record.insert("fractions".to_string(), ParamValue::Series(fractions.clone()));
            }
            SplitRule::Threshold { threshold } => {
                record.insert("threshold".to_string(), ParamValue::Number(*threshold));
            }
            SplitRule::RatingCurve { points } => {
                record.insert(
                    "rating_curve".to_string(),
                    ParamValue::Table(points.iter().map(|p| vec![p.inflow, p.diverted]).collect()),
                );
            }
        }
    }

    fn read(r: &Reader<'_>) -> Result<Self, SchemaViolation> {
        match r.text("rule")? {
            "fraction" => Ok(SplitRule::Fraction {
                fractions: r.series("fractions")?.to_vec(),
            }),
            "threshold" => Ok(SplitRule::Threshold {
                threshold: r.number("threshold")?,
            }),
            "rating_curve" => Ok(SplitRule::RatingCurve {
                points: r
                    .table("rating_curve")?
                    .iter()
                    .map(|row| RatingPoint {
                        inflow: row[0],
                        diverted: row[1],
                    })
                    .collect(),
            }),
            _ => Err(r.violation(
                "rule",
                ViolationReason::WrongType {
                    expected: "split rule",
                },
            )),
        }
    }
}

/// Kind-specific parameters of an element.
#[derive(Debug, Clone, PartialEq)]
pub enum ElementParams {
    Subbasin(SubbasinParams),
    Reach(ReachParams),
    /// Pure junction: sums its inflows.
    Node,
    Diversion(SplitRule),
}

impl ElementParams {
    pub fn kind(&self) -> ElementKind {
        match self {
            ElementParams::Subbasin(_) => ElementKind::Subbasin,
            ElementParams::Reach(_) => ElementKind::Reach,
            ElementParams::Node => ElementKind::Node,
            ElementParams::Diversion(_) => ElementKind::Diversion,
        }
    }

    /// Untyped view, as stored in documents and shown in forms.
    pub fn to_record(&self) -> ParameterRecord {
        let mut record = ParameterRecord::new();
        match self {
            ElementParams::Subbasin(p) => p.write(&mut record),
            ElementParams::Reach(p) => p.write(&mut record),
            ElementParams::Node => {}
            ElementParams::Diversion(rule) => rule.write(&mut record),
        }
        record
    }

    /// Check and decode an untyped record for `kind`.
    pub fn from_record(
        kind: ElementKind,
        record: &ParameterRecord,
    ) -> Result<Self, SchemaViolation> {
        schema_for(kind).check(record)?;
        let r = Reader { kind, record };
        match kind {
            ElementKind::Subbasin => SubbasinParams::read(&r).map(ElementParams::Subbasin),
            ElementKind::Reach => ReachParams::read(&r).map(ElementParams::Reach),
            ElementKind::Node => Ok(ElementParams::Node),
            ElementKind::Diversion => SplitRule::read(&r).map(ElementParams::Diversion),
        }
    }

    /// Check the typed values against the kind's schema.
    pub fn check(&self) -> Result<(), SchemaViolation> {
        schema_for(self.kind()).check(&self.to_record())
    }
}

/// Field access over a record that already passed its schema check.
struct Reader<'a> {
    kind: ElementKind,
    record: &'a ParameterRecord,
}

impl<'a> Reader<'a> {
    fn violation(&self, field: &str, reason: ViolationReason) -> SchemaViolation {
        schema_for(self.kind).violation(field, reason)
    }

    fn get(&self, field: &str) -> Result<&'a ParamValue, SchemaViolation> {
        self.record
            .get(field)
            .ok_or_else(|| self.violation(field, ViolationReason::Missing))
    }

    fn number(&self, field: &str) -> Result<Real, SchemaViolation> {
        self.get(field)?
            .as_number()
            .ok_or_else(|| self.violation(field, ViolationReason::WrongType { expected: "number" }))
    }

    fn text(&self, field: &str) -> Result<&'a str, SchemaViolation> {
        self.get(field)?
            .as_text()
            .ok_or_else(|| self.violation(field, ViolationReason::WrongType { expected: "text" }))
    }

    fn series(&self, field: &str) -> Result<&'a [Real], SchemaViolation> {
        self.get(field)?.as_series().ok_or_else(|| {
            self.violation(
                field,
                ViolationReason::WrongType {
                    expected: "list of numbers",
                },
            )
        })
    }

    fn table(&self, field: &str) -> Result<&'a [Vec<Real>], SchemaViolation> {
        self.get(field)?
            .as_table()
            .ok_or_else(|| self.violation(field, ViolationReason::WrongType { expected: "table" }))
    }

    fn optional_text(&self, field: &str) -> Result<Option<&'a str>, SchemaViolation> {
        match self.record.get(field) {
            Some(_) => self.text(field).map(Some),
            None => Ok(None),
        }
    }

    fn optional_table(&self, field: &str) -> Result<Option<&'a [Vec<Real>]>, SchemaViolation> {
        match self.record.get(field) {
            Some(_) => self.table(field).map(Some),
            None => Ok(None),
        }
    }
}
