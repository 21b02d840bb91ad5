//! Inbound request parameters shared by all broker verbs.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Service principal credentials and target subscription.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AzureCredentials {
    /// Environment name, e.g. "AzureCloud"
    #[serde(default)]
    pub environment: String,
    #[serde(default)]
    pub subscription_id: String,
    #[serde(default)]
    pub tenant_id: String,
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_resource_group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_location: Option<String>,
}

impl fmt::Debug for AzureCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AzureCredentials")
            .field("environment", &self.environment)
            .field("subscription_id", &self.subscription_id)
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("default_resource_group", &self.default_resource_group)
            .field("default_location", &self.default_location)
            .finish()
    }
}

/// Caller-supplied provisioning parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisioningParameters {
    #[serde(default, alias = "resource_group_name", skip_serializing_if = "Option::is_none")]
    pub resource_group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub tags: Map<String, Value>,
    /// Full instance document overriding the derived one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance: Option<Value>,
}

/// Caller-supplied binding parameters; each document overrides the derived one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BindingParameters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operations: Option<Vec<Value>>,
}

/// The thing being bound, typically a route ("api.product.domain").
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindResource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_guid: Option<String>,
}

/// Parameters for any broker verb.
///
/// Result payloads arrive as the opaque strings previously returned by the
/// broker and are parsed defensively.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BrokerRequest {
    #[serde(default)]
    pub instance_id: String,
    #[serde(default)]
    pub plan_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub space_guid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_guid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_operation: Option<String>,
    #[serde(default)]
    pub azure: AzureCredentials,
    #[serde(default)]
    pub parameters: ProvisioningParameters,
    #[serde(default)]
    pub binding_parameters: BindingParameters,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bind_resource: Option<BindResource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provisioning_result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binding_result: Option<String>,
}

impl BrokerRequest {
    /// Instance name requested by the caller, before any payload replay.
    pub fn requested_instance_name(&self) -> Option<String> {
        self.parameters
            .instance
            .as_ref()
            .and_then(|doc| doc.get("name"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| self.space_guid.clone())
    }
}
