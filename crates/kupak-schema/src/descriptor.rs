use crate::values::{normalize_value, Value};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DescriptorError {
    #[error("failed to parse pak descriptor: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error(transparent)]
    Schema(#[from] SchemaError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("duplicated property '{0}'")]
    DuplicateProperty(String),
    #[error("property '{property}' has unknown type '{kind}', expected int, bool or string")]
    UnknownType { property: String, kind: String },
    #[error("default {value} of property '{property}' is not a valid {kind}")]
    InvalidDefault {
        property: String,
        kind: PropertyType,
        value: Value,
    },
}

/// The closed set of property types a pak may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyType {
    Int,
    Bool,
    String,
}

impl PropertyType {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "int" => Some(Self::Int),
            "bool" => Some(Self::Bool),
            "string" => Some(Self::String),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Int => "int",
            Self::Bool => "bool",
            Self::String => "string",
        }
    }

    /// Whether `value` holds exactly this type. `Absent` never matches.
    pub fn matches(self, value: &Value) -> bool {
        matches!(
            (self, value),
            (Self::Int, Value::Int(_)) | (Self::Bool, Value::Bool(_)) | (Self::String, Value::String(_))
        )
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A pak descriptor exactly as written in `pak.yaml`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct DescriptorV1 {
    pub name: String,
    #[serde(default, deserialize_with = "scalar_string")]
    pub version: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub properties: Vec<PropertyDecl>,
    #[serde(default)]
    pub resources: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct PropertyDecl {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub default: Value,
    #[serde(default)]
    pub description: String,
}

/// A descriptor whose property schema has been validated.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PakDescriptor {
    pub name: String,
    pub version: String,
    pub description: String,
    pub tags: Vec<String>,
    pub properties: Vec<Property>,
    pub resources: Vec<String>,
}

/// One named, typed input slot of a pak.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Property {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: PropertyType,
    #[serde(skip_serializing_if = "Value::is_absent")]
    pub default: Value,
    pub description: String,
}

impl DescriptorV1 {
    /// Validate the property schema: names must be unique, types must be known,
    /// and a declared default must normalize to the declared type.
    pub fn validate(self) -> Result<PakDescriptor, SchemaError> {
        let mut seen = HashSet::with_capacity(self.properties.len());
        let mut properties = Vec::with_capacity(self.properties.len());

        for decl in self.properties {
            if !seen.insert(decl.name.clone()) {
                return Err(SchemaError::DuplicateProperty(decl.name));
            }
            let Some(kind) = PropertyType::parse(&decl.kind) else {
                return Err(SchemaError::UnknownType {
                    property: decl.name,
                    kind: decl.kind,
                });
            };

            let default = normalize_value(kind, decl.default);
            if !default.is_absent() && !kind.matches(&default) {
                return Err(SchemaError::InvalidDefault {
                    property: decl.name,
                    kind,
                    value: default,
                });
            }

            properties.push(Property {
                name: decl.name,
                kind,
                default,
                description: decl.description,
            });
        }

        Ok(PakDescriptor {
            name: self.name,
            version: self.version,
            description: self.description,
            tags: self.tags,
            properties,
            resources: self.resources,
        })
    }
}

impl PakDescriptor {
    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name == name)
    }
}

/// Accept `version: 1.0` as well as `version: "1.0"`.
pub(crate) fn scalar_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error as _;
    match serde_yaml::Value::deserialize(deserializer)? {
        serde_yaml::Value::String(s) => Ok(s),
        serde_yaml::Value::Number(n) => Ok(n.to_string()),
        serde_yaml::Value::Bool(b) => Ok(b.to_string()),
        serde_yaml::Value::Null => Ok(String::new()),
        _ => Err(D::Error::custom("expected a scalar")),
    }
}

pub fn parse_descriptor_str(input: &str) -> Result<PakDescriptor, DescriptorError> {
    let raw: DescriptorV1 = serde_yaml::from_str(input)?;
    Ok(raw.validate()?)
}

pub fn parse_descriptor(data: &[u8]) -> Result<PakDescriptor, DescriptorError> {
    let raw: DescriptorV1 = serde_yaml::from_slice(data)?;
    Ok(raw.validate()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
name: nginx
version: "1.2.0"
description: |
  A small web server.
tags: [web, proxy]
properties:
  - name: replicas
    type: int
    default: 1
    description: number of pods
  - name: tls
    type: bool
    default: "yes"
  - name: image
    type: string
    default: nginx:1.25
resources:
  - rc.yaml
  - ./svc.yaml
"#;

    #[test]
    fn parses_full_descriptor() {
        let pak = parse_descriptor_str(FULL).expect("should parse");
        assert_eq!(pak.name, "nginx");
        assert_eq!(pak.version, "1.2.0");
        assert_eq!(pak.tags, vec!["web", "proxy"]);
        assert_eq!(pak.properties.len(), 3);
        assert_eq!(pak.properties[0].kind, PropertyType::Int);
        assert_eq!(pak.properties[0].default, Value::Int(1));
        assert_eq!(pak.resources, vec!["rc.yaml", "./svc.yaml"]);
    }

    #[test]
    fn defaults_are_normalized_at_load() {
        let pak = parse_descriptor_str(FULL).unwrap();
        assert_eq!(pak.property("tls").unwrap().default, Value::Bool(true));
        assert_eq!(
            pak.property("image").unwrap().default,
            Value::String("nginx:1.25".to_owned())
        );
    }

    #[test]
    fn parses_minimal_descriptor() {
        let pak = parse_descriptor_str("name: bare\n").unwrap();
        assert!(pak.properties.is_empty());
        assert!(pak.resources.is_empty());
        assert_eq!(pak.version, "");
    }

    #[test]
    fn property_without_default_is_absent() {
        let pak = parse_descriptor_str(
            r"
name: p
properties:
  - name: host
    type: string
",
        )
        .unwrap();
        assert!(pak.properties[0].default.is_absent());
    }

    #[test]
    fn rejects_duplicate_property() {
        let err = parse_descriptor_str(
            r"
name: p
properties:
  - name: port
    type: int
  - name: port
    type: string
",
        )
        .unwrap_err();
        assert!(matches!(
            err,
            DescriptorError::Schema(SchemaError::DuplicateProperty(ref n)) if n == "port"
        ));
    }

    #[test]
    fn rejects_unknown_type() {
        let err = parse_descriptor_str(
            r"
name: p
properties:
  - name: ratio
    type: number
",
        )
        .unwrap_err();
        assert!(matches!(
            err,
            DescriptorError::Schema(SchemaError::UnknownType { ref kind, .. }) if kind == "number"
        ));
    }

    #[test]
    fn rejects_default_of_wrong_type() {
        let err = parse_descriptor_str(
            r"
name: p
properties:
  - name: replicas
    type: int
    default: many
",
        )
        .unwrap_err();
        assert!(matches!(
            err,
            DescriptorError::Schema(SchemaError::InvalidDefault { .. })
        ));
    }

    #[test]
    fn rejects_malformed_yaml() {
        let err = parse_descriptor_str("name: [unterminated").unwrap_err();
        assert!(matches!(err, DescriptorError::Parse(_)));
    }

    #[test]
    fn accepts_numeric_version() {
        let pak = parse_descriptor_str("name: p\nversion: 0.3\n").unwrap();
        assert_eq!(pak.version, "0.3");
    }

    #[test]
    fn rejects_missing_name() {
        assert!(parse_descriptor_str("version: 1.0\n").is_err());
    }

    #[test]
    fn parsing_is_deterministic() {
        let a = parse_descriptor(FULL.as_bytes()).unwrap();
        let b = parse_descriptor(FULL.as_bytes()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn property_type_round_trips_through_str() {
        for kind in [PropertyType::Int, PropertyType::Bool, PropertyType::String] {
            assert_eq!(PropertyType::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(PropertyType::parse("Int"), None);
    }
}
