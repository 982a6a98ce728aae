//! Session-wide properties kept consistent across every backend.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// The closed set of coordinated session properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PropertyKind {
    AutoCommit,
    ReadOnly,
    Schema,
    Catalog,
    NetworkTimeout,
    TypeMap,
}

impl PropertyKind {
    pub const ALL: [PropertyKind; 6] = [
        Self::AutoCommit,
        Self::ReadOnly,
        Self::Schema,
        Self::Catalog,
        Self::NetworkTimeout,
        Self::TypeMap,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::AutoCommit => "auto_commit",
            Self::ReadOnly => "read_only",
            Self::Schema => "schema",
            Self::Catalog => "catalog",
            Self::NetworkTimeout => "network_timeout",
            Self::TypeMap => "type_map",
        }
    }
}

impl std::fmt::Display for PropertyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// How a column's raw value is rendered as JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    Text,
    Integer,
    Float,
    Boolean,
    Json,
    Binary,
}

/// SQL type name (case-insensitive) to value kind override.
pub type TypeMap = BTreeMap<String, ValueKind>;

/// A typed value for one [`PropertyKind`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "property", content = "value", rename_all = "snake_case")]
pub enum PropertyValue {
    AutoCommit(bool),
    ReadOnly(bool),
    Schema(String),
    Catalog(String),
    /// Milliseconds; 0 disables the timeout.
    NetworkTimeout(u64),
    TypeMap(TypeMap),
}

impl PropertyValue {
    pub fn kind(&self) -> PropertyKind {
        match self {
            Self::AutoCommit(_) => PropertyKind::AutoCommit,
            Self::ReadOnly(_) => PropertyKind::ReadOnly,
            Self::Schema(_) => PropertyKind::Schema,
            Self::Catalog(_) => PropertyKind::Catalog,
            Self::NetworkTimeout(_) => PropertyKind::NetworkTimeout,
            Self::TypeMap(_) => PropertyKind::TypeMap,
        }
    }

    pub fn network_timeout(timeout: Option<Duration>) -> Self {
        Self::NetworkTimeout(timeout.map(|d| d.as_millis() as u64).unwrap_or(0))
    }
}

/// Convert a network timeout in milliseconds back to a duration.
pub fn timeout_from_millis(millis: u64) -> Option<Duration> {
    (millis > 0).then(|| Duration::from_millis(millis))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_of_value() {
        assert_eq!(
            PropertyValue::Schema("s".into()).kind(),
            PropertyKind::Schema
        );
        assert_eq!(
            PropertyValue::TypeMap(TypeMap::new()).kind(),
            PropertyKind::TypeMap
        );
    }

    #[test]
    fn test_property_names() {
        assert_eq!(PropertyKind::AutoCommit.to_string(), "auto_commit");
        assert_eq!(PropertyKind::NetworkTimeout.to_string(), "network_timeout");
    }

    #[test]
    fn test_property_value_json_shape() {
        let value: PropertyValue =
            serde_json::from_str(r#"{"property": "read_only", "value": true}"#).unwrap();
        assert_eq!(value, PropertyValue::ReadOnly(true));

        let value: PropertyValue = serde_json::from_str(
            r#"{"property": "type_map", "value": {"money": "text"}}"#,
        )
        .unwrap();
        let PropertyValue::TypeMap(map) = value else {
            panic!("expected type map");
        };
        assert_eq!(map.get("money"), Some(&ValueKind::Text));
    }

    #[test]
    fn test_network_timeout_zero_disables() {
        assert_eq!(timeout_from_millis(0), None);
        assert_eq!(
            timeout_from_millis(1500),
            Some(Duration::from_millis(1500))
        );
        assert_eq!(
            PropertyValue::network_timeout(None),
            PropertyValue::NetworkTimeout(0)
        );
    }
}
