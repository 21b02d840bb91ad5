//! Opaque result payloads.
//!
//! Returned to the caller after provision/bind and handed back unchanged on
//! later calls. Missing fields deserialize to `None` so payloads written by
//! older broker versions stay readable.

use crate::error::PayloadError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Snapshot written after provision.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisioningResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_name: Option<String>,
}

/// Snapshot written after bind. Ids are bare names, not resource paths.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BindingResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_id: Option<String>,
}

fn parse_payload<T>(raw: Option<&str>, kind: &'static str) -> Result<T, PayloadError>
where
    T: DeserializeOwned + Default,
{
    let raw = match raw.map(str::trim) {
        None | Some("") => return Ok(T::default()),
        Some(raw) => raw,
    };
    let value: serde_json::Value =
        serde_json::from_str(raw).map_err(|e| PayloadError::Malformed {
            kind,
            reason: e.to_string(),
        })?;
    if value.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(value).map_err(|e| PayloadError::Malformed {
        kind,
        reason: e.to_string(),
    })
}

impl ProvisioningResult {
    pub fn new(resource_group: &str, instance_name: &str) -> Self {
        Self {
            resource_group: Some(resource_group.to_string()),
            instance_name: Some(instance_name.to_string()),
        }
    }

    /// Parse a replayed payload; absent or empty means "nothing recorded".
    pub fn parse(raw: Option<&str>) -> Result<Self, PayloadError> {
        parse_payload(raw, "provisioning")
    }

    pub fn to_payload(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

impl BindingResult {
    pub fn new(product_id: &str, api_id: &str) -> Self {
        Self {
            product_id: Some(product_id.to_string()),
            api_id: Some(api_id.to_string()),
        }
    }

    pub fn parse(raw: Option<&str>) -> Result<Self, PayloadError> {
        parse_payload(raw, "binding")
    }

    pub fn to_payload(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_payload_is_default() {
        assert_eq!(ProvisioningResult::parse(None).unwrap(), ProvisioningResult::default());
        assert_eq!(ProvisioningResult::parse(Some("  ")).unwrap(), ProvisioningResult::default());
        assert_eq!(BindingResult::parse(Some("null")).unwrap(), BindingResult::default());
    }

    #[test]
    fn test_older_payload_missing_fields() {
        let parsed = ProvisioningResult::parse(Some(r#"{"resourceGroup":"rg1"}"#)).unwrap();
        assert_eq!(parsed.resource_group.as_deref(), Some("rg1"));
        assert_eq!(parsed.instance_name, None);
    }

    #[test]
    fn test_unknown_fields_are_ignored() {
        let parsed =
            BindingResult::parse(Some(r#"{"productId":"p","apiId":"a","extra":1}"#)).unwrap();
        assert_eq!(parsed, BindingResult::new("p", "a"));
    }

    #[test]
    fn test_malformed_payload() {
        let err = ProvisioningResult::parse(Some("{not json")).unwrap_err();
        assert!(err.to_string().contains("malformed provisioning payload"));

        let err = BindingResult::parse(Some("[1,2]")).unwrap_err();
        assert!(err.to_string().contains("binding"));
    }

    #[test]
    fn test_payload_round_trip() {
        let original = ProvisioningResult::new("rg", "svc1");
        let replayed = ProvisioningResult::parse(Some(&original.to_payload())).unwrap();
        assert_eq!(original, replayed);
    }
}
