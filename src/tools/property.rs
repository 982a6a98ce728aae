//! Session property tools.
//!
//! A property set here is applied to every backend; reads return the last
//! value confirmed on all of them.

use crate::error::{RouterError, RouterResult};
use crate::models::{PropertyKind, PropertyValue};
use crate::tools::SharedSession;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Input for the set_property tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SetPropertyInput {
    /// auto_commit, read_only, schema, catalog, network_timeout or type_map
    pub property: PropertyKind,
    /// Booleans for auto_commit/read_only, a string for schema/catalog,
    /// milliseconds for network_timeout (0 = none), and for type_map an
    /// object mapping database type names to text, integer, float, boolean,
    /// json or binary
    pub value: serde_json::Value,
}

impl SetPropertyInput {
    /// Check the value against the property's type.
    pub fn to_value(&self) -> RouterResult<PropertyValue> {
        let tagged = serde_json::json!({
            "property": self.property,
            "value": self.value,
        });
        serde_json::from_value(tagged).map_err(|e| {
            RouterError::config(format!("Invalid value for {}: {}", self.property, e))
        })
    }
}

/// Output from the set_property tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct SetPropertyOutput {
    pub success: bool,
    pub property: PropertyKind,
    /// Number of backends the value was applied to
    pub backends: usize,
    pub message: String,
}

/// Input for the get_property tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct GetPropertyInput {
    /// auto_commit, read_only, schema, catalog, network_timeout or type_map
    pub property: PropertyKind,
}

/// Output from the get_property tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct GetPropertyOutput {
    pub property: PropertyKind,
    /// Last value confirmed on every backend
    pub value: serde_json::Value,
}

impl From<PropertyValue> for GetPropertyOutput {
    fn from(value: PropertyValue) -> Self {
        let property = value.kind();
        let value = match serde_json::to_value(&value) {
            Ok(serde_json::Value::Object(mut tagged)) => {
                tagged.remove("value").unwrap_or(serde_json::Value::Null)
            }
            _ => serde_json::Value::Null,
        };
        Self { property, value }
    }
}

pub struct PropertyToolHandler {
    session: SharedSession,
}

impl PropertyToolHandler {
    pub fn new(session: SharedSession) -> Self {
        Self { session }
    }

    pub async fn set_property(&self, input: SetPropertyInput) -> RouterResult<SetPropertyOutput> {
        let value = input.to_value()?;
        let property = value.kind();
        let mut session = self.session.lock().await;
        session.set_property(value).await?;
        let backends = session.registry().len();

        info!(property = %property, backends, "Property applied");
        Ok(SetPropertyOutput {
            success: true,
            property,
            backends,
            message: format!("{} applied to {} backends", property, backends),
        })
    }

    pub async fn get_property(&self, input: GetPropertyInput) -> RouterResult<GetPropertyOutput> {
        let session = self.session.lock().await;
        Ok(session.property(input.property)?.into())
    }
}
