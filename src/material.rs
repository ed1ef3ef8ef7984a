//! The in-memory material record.
//!
//! A [`Material`] is the loaded form of one `.yml` material file: the
//! identifier derived from the file name, the `meta` block with its
//! `references` BibTeX blob already parsed out, and the `data` block
//! broken down into typed value records.

use indexmap::IndexMap;
use serde::Serialize;
use serde_yaml::{Mapping, Value};

use crate::refs::ReferenceMap;

/// Parameter data: parameter name, then citation key, in source order.
pub type DataMap = IndexMap<String, ParameterMap>;

/// The sources of one parameter, keyed by the citation key backing each
/// value.
pub type ParameterMap = IndexMap<String, ValueRecord>;

/// A fully loaded material file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Material {
    /// Identifier derived from the file name. Any `ID` key in the file
    /// body is ignored in favor of this one.
    pub id: String,
    /// The `meta` block minus `references`, in source order.
    pub meta: Mapping,
    /// Citation records parsed from the embedded BibTeX blob.
    pub references: ReferenceMap,
    /// Parameter values grouped by parameter name, then citation key.
    pub data: DataMap,
}

impl Material {
    /// Creates an empty material with the given identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Material {
            id: id.into(),
            meta: Mapping::new(),
            references: ReferenceMap::new(),
            data: DataMap::new(),
        }
    }

    /// Looks up the record at `data.<param>.<key>`.
    pub fn value(&self, param: &str, key: &str) -> Option<&ValueRecord> {
        self.data.get(param).and_then(|sources| sources.get(key))
    }
}

/// One leaf of the `data` block: the tabulated `value` plus any sibling
/// annotation fields (`unit`, `comment`, ...).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValueRecord {
    /// The value itself. Its variant decides the serialization style.
    pub value: ParamValue,
    /// Annotation fields in source order, re-emitted after `value`.
    #[serde(flatten)]
    pub extras: Mapping,
}

impl ValueRecord {
    /// Creates a record holding a scalar value.
    pub fn scalar(value: impl Into<Value>) -> Self {
        ValueRecord {
            value: ParamValue::Scalar(value.into()),
            extras: Mapping::new(),
        }
    }

    /// Creates a record holding a compound (mapping) value.
    pub fn compound(value: Mapping) -> Self {
        ValueRecord {
            value: ParamValue::Compound(value),
            extras: Mapping::new(),
        }
    }

    /// Builder-style annotation field, convenient for tests and tooling.
    pub fn with_extra(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extras.insert(Value::String(name.into()), value.into());
        self
    }
}

/// The shape of a record's `value`, fixed when the file is loaded.
///
/// Compound values (sub-field mappings such as polynomial coefficients)
/// are re-emitted as inline flow collections; scalar values in plain
/// block style. Classifying once at load time means the dumper never has
/// to inspect raw YAML again.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// A nested mapping of named sub-values.
    Compound(Mapping),
    /// Everything else: numbers, strings, booleans, sequences, null.
    Scalar(Value),
}

impl ParamValue {
    /// Classifies a raw YAML value: mappings become [`ParamValue::Compound`],
    /// everything else [`ParamValue::Scalar`].
    pub fn classify(value: Value) -> Self {
        match value {
            Value::Mapping(mapping) => ParamValue::Compound(mapping),
            other => ParamValue::Scalar(other),
        }
    }

    /// Whether this is a compound value.
    pub fn is_compound(&self) -> bool {
        matches!(self, ParamValue::Compound(_))
    }

    /// The value as plain YAML, cloning out of the variant.
    pub fn to_value(&self) -> Value {
        match self {
            ParamValue::Compound(mapping) => Value::Mapping(mapping.clone()),
            ParamValue::Scalar(value) => value.clone(),
        }
    }
}
