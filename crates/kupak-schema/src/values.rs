//! Tagged property values and the default-fill → normalize → validate pipeline
//! that reconciles caller input with a pak's property schema.

use crate::descriptor::{Property, PropertyType};
use serde::{Deserialize, Serialize, Serializer};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Values keyed by property name, in the form templates are executed against.
pub type ValueMap = BTreeMap<String, Value>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueError {
    #[error("required property '{0}' is not specified")]
    Missing(String),
    #[error("value {value} for property '{property}' is not a valid {expected}")]
    TypeMismatch {
        property: String,
        expected: PropertyType,
        value: Value,
    },
    #[error("value for '{name}' is not supported: {reason}")]
    Unsupported { name: String, reason: String },
    #[error("failed to parse values: {0}")]
    Parse(String),
}

/// A dynamically typed input value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(try_from = "serde_yaml::Value")]
pub enum Value {
    Int(i64),
    Bool(bool),
    String(String),
    #[default]
    Absent,
}

impl Value {
    pub fn is_absent(&self) -> bool {
        matches!(self, Value::Absent)
    }

    /// The textual form used for coercion and template output.
    /// `Absent` renders as the empty string.
    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            Value::Int(n) => Cow::Owned(n.to_string()),
            Value::Bool(b) => Cow::Borrowed(if *b { "true" } else { "false" }),
            Value::String(s) => Cow::Borrowed(s),
            Value::Absent => Cow::Borrowed(""),
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Int(n) => *n != 0,
            Value::Bool(b) => *b,
            Value::String(s) => !s.is_empty(),
            Value::Absent => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{n}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::String(s) => write!(f, "{s:?}"),
            Value::Absent => f.write_str("null"),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Int(n) => serializer.serialize_i64(*n),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::String(s) => serializer.serialize_str(s),
            Value::Absent => serializer.serialize_none(),
        }
    }
}

impl TryFrom<serde_yaml::Value> for Value {
    type Error = String;

    fn try_from(value: serde_yaml::Value) -> Result<Self, Self::Error> {
        match value {
            serde_yaml::Value::Null => Ok(Value::Absent),
            serde_yaml::Value::Bool(b) => Ok(Value::Bool(b)),
            serde_yaml::Value::Number(n) => match n.as_i64() {
                Some(i) => Ok(Value::Int(i)),
                None => Ok(Value::String(n.to_string())),
            },
            serde_yaml::Value::String(s) => Ok(Value::String(s)),
            serde_yaml::Value::Sequence(_) => Err("sequences are not supported".to_owned()),
            serde_yaml::Value::Mapping(_) => Err("mappings are not supported".to_owned()),
            serde_yaml::Value::Tagged(tagged) => Value::try_from(tagged.value),
        }
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

/// Parse the case-insensitive boolean spellings accepted for `bool` properties.
pub fn parse_bool(s: &str) -> Option<bool> {
    match s.to_lowercase().as_str() {
        "true" | "yes" | "y" | "ok" | "t" | "1" => Some(true),
        "false" | "no" | "n" | "f" | "0" => Some(false),
        _ => None,
    }
}

/// Coerce `value` towards `kind` when a natural textual coercion exists.
/// Values that cannot be coerced are returned unchanged; validation decides.
pub fn normalize_value(kind: PropertyType, value: Value) -> Value {
    if value.is_absent() {
        return value;
    }
    match kind {
        PropertyType::Int => {
            let parsed = value.as_text().trim().parse::<i64>();
            parsed.map_or(value, Value::Int)
        }
        PropertyType::Bool => {
            let parsed = parse_bool(value.as_text().trim());
            parsed.map_or(value, Value::Bool)
        }
        PropertyType::String => value,
    }
}

/// Insert each property's default for names the caller did not supply.
pub fn add_defaults(properties: &[Property], values: &mut ValueMap) {
    for property in properties {
        values
            .entry(property.name.clone())
            .or_insert_with(|| property.default.clone());
    }
}

pub fn normalize(properties: &[Property], values: &mut ValueMap) {
    for property in properties {
        if let Some(slot) = values.get_mut(&property.name) {
            let current = std::mem::take(slot);
            *slot = normalize_value(property.kind, current);
        }
    }
}

/// Every declared property must be present and hold exactly its declared type.
/// Names outside the schema are not checked.
pub fn validate(properties: &[Property], values: &ValueMap) -> Result<(), ValueError> {
    for property in properties {
        let value = match values.get(&property.name) {
            None | Some(Value::Absent) => {
                return Err(ValueError::Missing(property.name.clone()));
            }
            Some(v) => v,
        };
        if !property.kind.matches(value) {
            return Err(ValueError::TypeMismatch {
                property: property.name.clone(),
                expected: property.kind,
                value: value.clone(),
            });
        }
    }
    Ok(())
}

/// Run default fill, normalization and validation, in that order, on a copy of
/// the caller's values.
pub fn prepare_values(properties: &[Property], supplied: &ValueMap) -> Result<ValueMap, ValueError> {
    let mut values = supplied.clone();
    add_defaults(properties, &mut values);
    normalize(properties, &mut values);
    validate(properties, &values)?;
    Ok(values)
}

/// Parse a YAML mapping of caller values. An empty document yields no values.
pub fn parse_values_str(input: &str) -> Result<ValueMap, ValueError> {
    let doc: serde_yaml::Value =
        serde_yaml::from_str(input).map_err(|e| ValueError::Parse(e.to_string()))?;
    let mapping = match doc {
        serde_yaml::Value::Null => return Ok(ValueMap::new()),
        serde_yaml::Value::Mapping(m) => m,
        other => {
            return Err(ValueError::Parse(format!(
                "expected a mapping of property values, got {}",
                yaml_kind(&other)
            )))
        }
    };

    let mut values = ValueMap::new();
    for (key, raw) in mapping {
        let name = match key {
            serde_yaml::Value::String(s) => s,
            serde_yaml::Value::Number(n) => n.to_string(),
            serde_yaml::Value::Bool(b) => b.to_string(),
            other => {
                return Err(ValueError::Parse(format!(
                    "value names must be scalars, got {}",
                    yaml_kind(&other)
                )))
            }
        };
        let value = Value::try_from(raw).map_err(|reason| ValueError::Unsupported {
            name: name.clone(),
            reason,
        })?;
        values.insert(name, value);
    }
    Ok(values)
}

fn yaml_kind(value: &serde_yaml::Value) -> &'static str {
    match value {
        serde_yaml::Value::Null => "null",
        serde_yaml::Value::Bool(_) => "a boolean",
        serde_yaml::Value::Number(_) => "a number",
        serde_yaml::Value::String(_) => "a string",
        serde_yaml::Value::Sequence(_) => "a sequence",
        serde_yaml::Value::Mapping(_) => "a mapping",
        serde_yaml::Value::Tagged(_) => "a tagged value",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prop(name: &str, kind: PropertyType, default: Value) -> Property {
        Property {
            name: name.to_owned(),
            kind,
            default,
            description: String::new(),
        }
    }

    fn values(pairs: &[(&str, Value)]) -> ValueMap {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), v.clone()))
            .collect()
    }

    #[test]
    fn accepted_bool_spellings_normalize() {
        for s in ["true", "yes", "y", "ok", "t", "1", "TRUE", "Yes", "OK"] {
            assert_eq!(
                normalize_value(PropertyType::Bool, Value::from(s)),
                Value::Bool(true),
                "{s}"
            );
        }
        for s in ["false", "no", "n", "f", "0", "FALSE", "No", "F"] {
            assert_eq!(
                normalize_value(PropertyType::Bool, Value::from(s)),
                Value::Bool(false),
                "{s}"
            );
        }
    }

    #[test]
    fn integer_one_and_zero_normalize_to_bool() {
        assert_eq!(
            normalize_value(PropertyType::Bool, Value::Int(1)),
            Value::Bool(true)
        );
        assert_eq!(
            normalize_value(PropertyType::Bool, Value::Int(0)),
            Value::Bool(false)
        );
    }

    #[test]
    fn unrecognized_bool_passes_through_then_fails_validation() {
        let props = vec![prop("tls", PropertyType::Bool, Value::Absent)];
        let normalized = normalize_value(PropertyType::Bool, Value::from("maybe"));
        assert_eq!(normalized, Value::from("maybe"));

        let err = prepare_values(&props, &values(&[("tls", Value::from("maybe"))])).unwrap_err();
        assert!(matches!(err, ValueError::TypeMismatch { ref property, .. } if property == "tls"));
    }

    #[test]
    fn int_normalization_parses_strings() {
        assert_eq!(
            normalize_value(PropertyType::Int, Value::from("42")),
            Value::Int(42)
        );
        assert_eq!(
            normalize_value(PropertyType::Int, Value::from(" -7 ")),
            Value::Int(-7)
        );
        assert_eq!(
            normalize_value(PropertyType::Int, Value::from("4.5")),
            Value::from("4.5")
        );
    }

    #[test]
    fn string_normalization_is_identity() {
        assert_eq!(
            normalize_value(PropertyType::String, Value::Int(3)),
            Value::Int(3)
        );
    }

    #[test]
    fn defaults_fill_missing_values() {
        let props = vec![
            prop("replicas", PropertyType::Int, Value::Int(1)),
            prop("image", PropertyType::String, Value::from("nginx")),
        ];
        let out = prepare_values(&props, &ValueMap::new()).unwrap();
        assert_eq!(out["replicas"], Value::Int(1));
        assert_eq!(out["image"], Value::from("nginx"));
    }

    #[test]
    fn supplied_values_override_defaults_and_are_normalized() {
        let props = vec![prop("replicas", PropertyType::Int, Value::Int(1))];
        let out = prepare_values(&props, &values(&[("replicas", Value::from("3"))])).unwrap();
        assert_eq!(out["replicas"], Value::Int(3));
    }

    #[test]
    fn missing_value_without_default_fails() {
        let props = vec![prop("host", PropertyType::String, Value::Absent)];
        let err = prepare_values(&props, &ValueMap::new()).unwrap_err();
        assert_eq!(err, ValueError::Missing("host".to_owned()));
    }

    #[test]
    fn explicit_null_counts_as_missing() {
        let props = vec![prop("host", PropertyType::String, Value::Absent)];
        let err = prepare_values(&props, &values(&[("host", Value::Absent)])).unwrap_err();
        assert_eq!(err, ValueError::Missing("host".to_owned()));
    }

    #[test]
    fn undeclared_values_pass_through() {
        let props = vec![prop("replicas", PropertyType::Int, Value::Int(1))];
        let out = prepare_values(&props, &values(&[("helper", Value::from("x"))])).unwrap();
        assert_eq!(out["helper"], Value::from("x"));
    }

    #[test]
    fn prepare_does_not_mutate_input() {
        let props = vec![prop("replicas", PropertyType::Int, Value::Int(1))];
        let input = values(&[("other", Value::Bool(true))]);
        let _ = prepare_values(&props, &input).unwrap();
        assert_eq!(input.len(), 1);
    }

    #[test]
    fn parses_values_document() {
        let parsed = parse_values_str("replicas: \"3\"\ntls: yes\nport: 8080\nname: web\nempty:\n")
            .unwrap();
        assert_eq!(parsed["replicas"], Value::from("3"));
        assert_eq!(parsed["tls"], Value::from("yes"));
        assert_eq!(parsed["port"], Value::Int(8080));
        assert_eq!(parsed["name"], Value::from("web"));
        assert_eq!(parsed["empty"], Value::Absent);
    }

    #[test]
    fn empty_values_document_is_empty_map() {
        assert!(parse_values_str("").unwrap().is_empty());
        assert!(parse_values_str("# nothing\n").unwrap().is_empty());
    }

    #[test]
    fn nested_values_are_rejected() {
        let err = parse_values_str("ports: [80, 443]\n").unwrap_err();
        assert!(matches!(err, ValueError::Unsupported { ref name, .. } if name == "ports"));
    }

    #[test]
    fn non_mapping_values_document_is_rejected() {
        assert!(matches!(
            parse_values_str("- a\n- b\n"),
            Err(ValueError::Parse(_))
        ));
    }

    #[test]
    fn floats_decode_as_strings() {
        let v: Value = serde_yaml::from_str("1.5").unwrap();
        assert_eq!(v, Value::from("1.5"));
    }

    #[test]
    fn value_serializes_to_plain_json() {
        let json = serde_json::to_string(&vec![
            Value::Int(1),
            Value::Bool(false),
            Value::from("a"),
            Value::Absent,
        ])
        .unwrap();
        assert_eq!(json, r#"[1,false,"a",null]"#);
    }
}
