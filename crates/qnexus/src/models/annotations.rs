//! Names, descriptions and user properties attached to resources.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::NexusResult;

/// A single property value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Bool(b) => write!(f, "{b}"),
            PropertyValue::Int(i) => write!(f, "{i}"),
            PropertyValue::Float(x) => write!(f, "{x}"),
            PropertyValue::String(s) => write!(f, "{s}"),
        }
    }
}

impl From<bool> for PropertyValue {
    fn from(v: bool) -> Self {
        PropertyValue::Bool(v)
    }
}

impl From<i64> for PropertyValue {
    fn from(v: i64) -> Self {
        PropertyValue::Int(v)
    }
}

impl From<i32> for PropertyValue {
    fn from(v: i32) -> Self {
        PropertyValue::Int(i64::from(v))
    }
}

impl From<f64> for PropertyValue {
    fn from(v: f64) -> Self {
        PropertyValue::Float(v)
    }
}

impl From<&str> for PropertyValue {
    fn from(v: &str) -> Self {
        PropertyValue::String(v.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(v: String) -> Self {
        PropertyValue::String(v)
    }
}

/// Properties keyed by name, kept in sorted order.
pub type PropertiesDict = BTreeMap<String, PropertyValue>;

/// Annotations carried by every stored resource.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Annotations {
    pub name: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub properties: PropertiesDict,
    pub created: Option<DateTime<Utc>>,
    pub modified: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
struct AttributesWire {
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    properties: PropertiesDict,
    #[serde(default)]
    timestamps: TimestampsWire,
}

#[derive(Default, Deserialize)]
struct TimestampsWire {
    created: Option<DateTime<Utc>>,
    modified: Option<DateTime<Utc>>,
}

impl Annotations {
    /// Read annotations out of a JSON:API `attributes` object.
    pub fn from_attributes(attributes: &Value) -> NexusResult<Self> {
        let wire = AttributesWire::deserialize(attributes)?;
        Ok(Self {
            name: wire.name,
            description: wire.description,
            properties: wire.properties,
            created: wire.timestamps.created,
            modified: wire.timestamps.modified,
        })
    }

    /// Name, or an empty string when unnamed.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("")
    }
}

/// Annotations for creating a resource; the name is mandatory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateAnnotations {
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub properties: PropertiesDict,
}

impl CreateAnnotations {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            properties: PropertiesDict::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Merge `defaults` underneath the explicit properties.
    pub fn merge_properties(mut self, defaults: &PropertiesDict) -> Self {
        for (key, value) in defaults {
            self.properties
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }
        self
    }
}

/// Changes to apply to a stored resource; unset fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateAnnotations {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub properties: PropertiesDict,
}

impl UpdateAnnotations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn property(mut self, key: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Merge `defaults` underneath the explicit properties.
    pub fn merge_properties(mut self, defaults: &PropertiesDict) -> Self {
        for (key, value) in defaults {
            self.properties
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }
        self
    }
}
