//! Parameter blocks
//!
//! A [`ParameterBlock`] is a module's tunable parameter record keyed by field name.
//! The value kind of each field decides how it blends: floating scalars and arrays
//! blend linearly, flags and integers (table sizes, mode bits) are copied through.

use crate::blend::{lerp, lerp_slice, Interpolate};
use crate::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Value kind of a parameter field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldKind {
    /// Floating scalar, blended
    Scalar,
    /// Floating array, blended element-wise
    Array,
    /// Enable flag, copied from the first block
    Flag,
    /// Integer, copied from the first block
    Int,
    /// Integer array, copied from the first block
    IntArray,
}

impl FieldKind {
    /// Whether fields of this kind are blended
    pub fn is_blendable(self) -> bool {
        matches!(self, FieldKind::Scalar | FieldKind::Array)
    }

    /// Short lowercase name
    pub fn name(self) -> &'static str {
        match self {
            FieldKind::Scalar => "scalar",
            FieldKind::Array => "array",
            FieldKind::Flag => "flag",
            FieldKind::Int => "int",
            FieldKind::IntArray => "int array",
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Value of one parameter field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    /// Floating scalar
    Scalar(f32),
    /// Floating coefficients or LUT
    Array(Vec<f32>),
    /// Enable flag
    Flag(bool),
    /// Non-blendable integer
    Int(i32),
    /// Non-blendable integer array
    IntArray(Vec<i32>),
}

impl FieldValue {
    /// Kind of this value
    pub fn kind(&self) -> FieldKind {
        match self {
            FieldValue::Scalar(_) => FieldKind::Scalar,
            FieldValue::Array(_) => FieldKind::Array,
            FieldValue::Flag(_) => FieldKind::Flag,
            FieldValue::Int(_) => FieldKind::Int,
            FieldValue::IntArray(_) => FieldKind::IntArray,
        }
    }

    /// Number of elements (1 for scalars)
    pub fn len(&self) -> usize {
        match self {
            FieldValue::Array(values) => values.len(),
            FieldValue::IntArray(values) => values.len(),
            _ => 1,
        }
    }

    /// Whether this is an empty array
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn blend(&self, name: &str, other: &FieldValue, ratio: f32) -> Result<FieldValue> {
        match (self, other) {
            (FieldValue::Scalar(a), FieldValue::Scalar(b)) => {
                Ok(FieldValue::Scalar(lerp(*a, *b, ratio)))
            }
            (FieldValue::Array(a), FieldValue::Array(b)) => {
                lerp_slice(name, a, b, ratio).map(FieldValue::Array)
            }
            (a, b) if a.kind() == b.kind() => Ok(a.clone()),
            _ => Err(CoreError::FieldMismatch {
                field: name.to_string(),
            }),
        }
    }
}

/// Named parameter fields of one module
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterBlock {
    fields: BTreeMap<String, FieldValue>,
}

impl ParameterBlock {
    /// Empty block
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, name: impl Into<String>, value: FieldValue) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    /// Insert or replace a field
    pub fn insert(&mut self, name: impl Into<String>, value: FieldValue) -> Option<FieldValue> {
        self.fields.insert(name.into(), value)
    }

    /// Field by name
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// Scalar field value
    pub fn scalar(&self, name: &str) -> Option<f32> {
        match self.fields.get(name) {
            Some(FieldValue::Scalar(v)) => Some(*v),
            _ => None,
        }
    }

    /// Array field values
    pub fn array(&self, name: &str) -> Option<&[f32]> {
        match self.fields.get(name) {
            Some(FieldValue::Array(v)) => Some(v),
            _ => None,
        }
    }

    /// Flag field value
    pub fn flag(&self, name: &str) -> Option<bool> {
        match self.fields.get(name) {
            Some(FieldValue::Flag(v)) => Some(*v),
            _ => None,
        }
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the block has no fields
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Fields in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Field names and kinds in name order
    pub fn shape(&self) -> Vec<(&str, FieldKind)> {
        self.iter().map(|(name, v)| (name, v.kind())).collect()
    }
}

impl Interpolate for ParameterBlock {
    fn blend_fields(&self, other: &Self, ratio: f32) -> Result<Self> {
        if let Some(extra) = other.fields.keys().find(|k| !self.fields.contains_key(*k)) {
            return Err(CoreError::FieldMismatch {
                field: extra.clone(),
            });
        }

        let mut fields = BTreeMap::new();
        for (name, a) in &self.fields {
            let b = other.fields.get(name).ok_or_else(|| CoreError::FieldMismatch {
                field: name.clone(),
            })?;
            fields.insert(name.clone(), a.blend(name, b, ratio)?);
        }
        Ok(Self { fields })
    }
}
