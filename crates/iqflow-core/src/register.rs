//! Register schemas and hardware field sets
//!
//! A [`RegisterSchema`] lists, for one module, which parameter field feeds which
//! hardware register field and how it is encoded. Schemas are fixed per module and
//! chip generation; [`quantize_to_hardware_fields`] applies one to a blended block.

use crate::block::{FieldValue, ParameterBlock};
use crate::quantize::{check_q_bits, encode, Encoding, FieldRange};
use crate::slope::{encode_slope_table, SlopeEncoding, SlopeEntry};
use crate::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::trace;

/// Encoding rule of one register field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldRule {
    /// Q-format scaling of a scalar or of every array element
    Fixed {
        /// Fractional bits
        q_bits: u32,
        /// Range of every element without an index-specific range
        range: FieldRange,
        /// Per-index ranges for arrays whose elements differ in width
        #[serde(default)]
        index_ranges: Vec<FieldRange>,
        /// Storage encoding
        #[serde(default)]
        encoding: Encoding,
    },
    /// Unscaled copy of a flag or integer field, clamped to `range`
    Raw {
        /// Field range
        range: FieldRange,
    },
    /// Slope table over an array of control points
    Slope {
        /// Integer array field holding the knot positions
        knots: String,
        /// Mantissa width and bias
        encoding: SlopeEncoding,
        /// Optional clamp applied to every mantissa
        #[serde(default)]
        mantissa_range: Option<FieldRange>,
    },
}

impl FieldRule {
    /// Every range the rule clamps to
    pub fn ranges(&self) -> impl Iterator<Item = &FieldRange> + '_ {
        let (main, extra): (Option<&FieldRange>, &[FieldRange]) = match self {
            FieldRule::Fixed {
                range,
                index_ranges,
                ..
            } => (Some(range), index_ranges.as_slice()),
            FieldRule::Raw { range } => (Some(range), &[][..]),
            FieldRule::Slope { mantissa_range, .. } => (mantissa_range.as_ref(), &[][..]),
        };
        main.into_iter().chain(extra)
    }

    fn accepts(&self) -> &'static str {
        match self {
            FieldRule::Fixed { .. } => "scalar or array",
            FieldRule::Raw { .. } => "flag, int or int array",
            FieldRule::Slope { .. } => "array",
        }
    }
}

/// One register field of a schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Register field name
    pub register: String,
    /// Parameter block field it is computed from
    pub source: String,
    /// Encoding rule
    pub rule: FieldRule,
}

impl FieldSpec {
    /// Q-format field with a uniform range
    pub fn fixed(
        register: impl Into<String>,
        source: impl Into<String>,
        q_bits: u32,
        range: FieldRange,
    ) -> Self {
        Self {
            register: register.into(),
            source: source.into(),
            rule: FieldRule::Fixed {
                q_bits,
                range,
                index_ranges: Vec::new(),
                encoding: Encoding::Direct,
            },
        }
    }

    /// Unscaled flag or integer field
    pub fn raw(register: impl Into<String>, source: impl Into<String>, range: FieldRange) -> Self {
        Self {
            register: register.into(),
            source: source.into(),
            rule: FieldRule::Raw { range },
        }
    }

    /// Slope table field
    pub fn slope(
        register: impl Into<String>,
        source: impl Into<String>,
        knots: impl Into<String>,
        encoding: SlopeEncoding,
    ) -> Self {
        Self {
            register: register.into(),
            source: source.into(),
            rule: FieldRule::Slope {
                knots: knots.into(),
                encoding,
                mantissa_range: None,
            },
        }
    }
}

/// Register fields of one module
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegisterSchema {
    /// Fields in output order
    pub fields: Vec<FieldSpec>,
}

impl RegisterSchema {
    /// Schema from its fields
    pub fn new(fields: Vec<FieldSpec>) -> Self {
        Self { fields }
    }

    /// Builder-style append
    pub fn with(mut self, spec: FieldSpec) -> Self {
        self.fields.push(spec);
        self
    }

    /// Every parameter field the schema reads, knot fields included
    pub fn source_fields(&self) -> Vec<&str> {
        let mut names = Vec::new();
        for spec in &self.fields {
            names.push(spec.source.as_str());
            if let FieldRule::Slope { knots, .. } = &spec.rule {
                names.push(knots.as_str());
            }
        }
        names
    }
}

/// Quantized value of a register field, always inside its range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QuantizedField {
    value: i64,
    range: FieldRange,
}

impl QuantizedField {
    /// Clamp `raw` into `range`
    pub fn new(raw: i64, range: FieldRange) -> Self {
        Self {
            value: range.clamp(raw),
            range,
        }
    }

    /// Stored integer
    pub fn value(&self) -> i64 {
        self.value
    }

    /// Range of the field
    pub fn range(&self) -> FieldRange {
        self.range
    }
}

/// Encoded register value
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum RegisterValue {
    /// Single field
    Single(QuantizedField),
    /// Array of fields
    Table(Vec<QuantizedField>),
    /// Slope table
    Slopes(Vec<SlopeEntry>),
}

/// Encoded register fields of one module, keyed by register name
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RegisterFieldSet {
    fields: BTreeMap<String, RegisterValue>,
}

impl RegisterFieldSet {
    /// Value by register name
    pub fn get(&self, register: &str) -> Option<&RegisterValue> {
        self.fields.get(register)
    }

    /// Integer of a single-valued register
    pub fn value(&self, register: &str) -> Option<i64> {
        match self.fields.get(register) {
            Some(RegisterValue::Single(field)) => Some(field.value()),
            _ => None,
        }
    }

    /// Integers of a table register
    pub fn table(&self, register: &str) -> Option<Vec<i64>> {
        match self.fields.get(register) {
            Some(RegisterValue::Table(fields)) => Some(fields.iter().map(|f| f.value()).collect()),
            _ => None,
        }
    }

    /// Entries of a slope register
    pub fn slopes(&self, register: &str) -> Option<&[SlopeEntry]> {
        match self.fields.get(register) {
            Some(RegisterValue::Slopes(entries)) => Some(entries),
            _ => None,
        }
    }

    /// Registers in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &RegisterValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of registers
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether no register was produced
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

fn fixed_field(
    index: usize,
    value: f32,
    q_bits: u32,
    range: FieldRange,
    index_ranges: &[FieldRange],
    encoding: Encoding,
) -> QuantizedField {
    let range = index_ranges.get(index).copied().unwrap_or(range);
    QuantizedField::new(encode(value, q_bits, range, encoding), range)
}

/// Encode `block` into register fields following `schema`.
///
/// Out-of-range values are clamped, never reported. Errors mean the block does not
/// match the schema.
pub fn quantize_to_hardware_fields(
    block: &ParameterBlock,
    schema: &RegisterSchema,
) -> Result<RegisterFieldSet> {
    let mut out = RegisterFieldSet::default();

    for spec in &schema.fields {
        if spec.rule.ranges().any(FieldRange::is_empty) {
            return Err(CoreError::EmptyFieldRange(spec.register.clone()));
        }
        let value = block
            .get(&spec.source)
            .ok_or_else(|| CoreError::MissingField(spec.source.clone()))?;

        let encoded = match (&spec.rule, value) {
            (
                FieldRule::Fixed {
                    q_bits,
                    range,
                    index_ranges,
                    encoding,
                },
                FieldValue::Scalar(v),
            ) => {
                check_q_bits(*q_bits)?;
                RegisterValue::Single(fixed_field(0, *v, *q_bits, *range, index_ranges, *encoding))
            }
            (
                FieldRule::Fixed {
                    q_bits,
                    range,
                    index_ranges,
                    encoding,
                },
                FieldValue::Array(values),
            ) => {
                check_q_bits(*q_bits)?;
                RegisterValue::Table(
                    values
                        .iter()
                        .enumerate()
                        .map(|(i, &v)| fixed_field(i, v, *q_bits, *range, index_ranges, *encoding))
                        .collect(),
                )
            }
            (FieldRule::Raw { range }, FieldValue::Flag(v)) => {
                RegisterValue::Single(QuantizedField::new(i64::from(*v), *range))
            }
            (FieldRule::Raw { range }, FieldValue::Int(v)) => {
                RegisterValue::Single(QuantizedField::new(i64::from(*v), *range))
            }
            (FieldRule::Raw { range }, FieldValue::IntArray(values)) => RegisterValue::Table(
                values
                    .iter()
                    .map(|&v| QuantizedField::new(i64::from(v), *range))
                    .collect(),
            ),
            (
                FieldRule::Slope {
                    knots,
                    encoding,
                    mantissa_range,
                },
                FieldValue::Array(points),
            ) => {
                let knots = match block.get(knots) {
                    Some(FieldValue::IntArray(k)) => k,
                    Some(other) => {
                        return Err(CoreError::FieldKindMismatch {
                            field: knots.clone(),
                            expected: "int array",
                            found: other.kind().name(),
                        })
                    }
                    None => return Err(CoreError::MissingField(knots.clone())),
                };
                let mut entries = encode_slope_table(points, knots, *encoding)?;
                if let Some(range) = mantissa_range {
                    for entry in &mut entries {
                        entry.mantissa = range.clamp_i32(entry.mantissa);
                    }
                }
                RegisterValue::Slopes(entries)
            }
            (rule, value) => {
                return Err(CoreError::FieldKindMismatch {
                    field: spec.source.clone(),
                    expected: rule.accepts(),
                    found: value.kind().name(),
                })
            }
        };

        out.fields.insert(spec.register.clone(), encoded);
    }

    trace!(fields = out.len(), "Quantized parameter block");
    Ok(out)
}
