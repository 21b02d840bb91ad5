//! Declared resource actions.
//!
//! Each action names one HTTP call against the resource manager: method,
//! API version family, URL template and optional body. URLs are built from
//! the [`OperationContext`] at invocation time.

use crate::context::OperationContext;
use serde_json::{json, Value};
use stratus_protocol::{BrokerError, Method};

/// Which `api-version` an action sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiFamily {
    /// Microsoft.Resources (resource groups)
    Resources,
    /// Microsoft.ApiManagement
    ApiManagement,
}

pub type UrlBuilder = fn(&OperationContext) -> Result<String, BrokerError>;
pub type BodyBuilder = fn(&OperationContext) -> Result<Value, BrokerError>;

/// A declared resource manager call.
#[derive(Clone, Copy)]
pub struct ResourceAction {
    pub name: &'static str,
    pub method: Method,
    pub family: ApiFamily,
    pub url: UrlBuilder,
    pub body: Option<BodyBuilder>,
}

impl std::fmt::Debug for ResourceAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceAction")
            .field("name", &self.name)
            .field("method", &self.method)
            .field("family", &self.family)
            .finish()
    }
}

/// An action with its URL and body resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedRequest {
    pub name: String,
    pub method: Method,
    pub family: ApiFamily,
    pub url: String,
    pub body: Option<Value>,
}

impl ResourceAction {
    pub fn prepare(&self, ctx: &OperationContext) -> Result<PreparedRequest, BrokerError> {
        Ok(PreparedRequest {
            name: self.name.to_string(),
            method: self.method,
            family: self.family,
            url: (self.url)(ctx)?,
            body: self.body.map(|build| build(ctx)).transpose()?,
        })
    }
}

// ============================================================================
// URL templates
// ============================================================================

fn service_url(ctx: &OperationContext) -> Result<String, BrokerError> {
    Ok(format!(
        "{}/subscriptions/{}/providers/Microsoft.ApiManagement",
        ctx.azure.endpoint, ctx.azure.subscription_id
    ))
}

fn check_name_url(ctx: &OperationContext) -> Result<String, BrokerError> {
    Ok(format!("{}/checkNameAvailability", service_url(ctx)?))
}

fn resource_group_url(ctx: &OperationContext) -> Result<String, BrokerError> {
    Ok(format!(
        "{}/subscriptions/{}/resourcegroups/{}",
        ctx.azure.endpoint, ctx.azure.subscription_id, ctx.azure.resource_group
    ))
}

pub fn instance_url(ctx: &OperationContext) -> Result<String, BrokerError> {
    Ok(format!(
        "{}/subscriptions/{}/resourceGroups/{}/providers/Microsoft.ApiManagement/service/{}",
        ctx.azure.endpoint, ctx.azure.subscription_id, ctx.azure.resource_group, ctx.instance.name
    ))
}

fn product_url(ctx: &OperationContext) -> Result<String, BrokerError> {
    Ok(format!("{}/products/{}", instance_url(ctx)?, ctx.product()?.name))
}

fn product_api_url(ctx: &OperationContext) -> Result<String, BrokerError> {
    Ok(format!("{}/apis/{}", product_url(ctx)?, ctx.api()?.name))
}

fn api_url(ctx: &OperationContext) -> Result<String, BrokerError> {
    Ok(format!("{}/apis/{}", instance_url(ctx)?, ctx.api()?.name))
}

// ============================================================================
// Bodies
// ============================================================================

fn check_name_body(ctx: &OperationContext) -> Result<Value, BrokerError> {
    Ok(json!({ "name": ctx.instance.name }))
}

fn resource_group_body(ctx: &OperationContext) -> Result<Value, BrokerError> {
    Ok(json!({
        "location": ctx.azure.location,
        "tags": ctx.resource_tags(),
    }))
}

fn instance_body(ctx: &OperationContext) -> Result<Value, BrokerError> {
    Ok(ctx.instance.document.clone())
}

fn product_body(ctx: &OperationContext) -> Result<Value, BrokerError> {
    Ok(ctx.product()?.document.clone())
}

fn api_body(ctx: &OperationContext) -> Result<Value, BrokerError> {
    Ok(ctx.api()?.document.clone())
}

// ============================================================================
// Actions
// ============================================================================

pub const CHECK_NAME_AVAILABILITY: ResourceAction = ResourceAction {
    name: "check-name-availability",
    method: Method::Post,
    family: ApiFamily::ApiManagement,
    url: check_name_url,
    body: Some(check_name_body),
};

pub const PUT_RESOURCE_GROUP: ResourceAction = ResourceAction {
    name: "put-resource-group",
    method: Method::Put,
    family: ApiFamily::Resources,
    url: resource_group_url,
    body: Some(resource_group_body),
};

pub const GET_INSTANCE: ResourceAction = ResourceAction {
    name: "get-instance",
    method: Method::Get,
    family: ApiFamily::ApiManagement,
    url: instance_url,
    body: None,
};

pub const PUT_INSTANCE: ResourceAction = ResourceAction {
    name: "put-instance",
    method: Method::Put,
    family: ApiFamily::ApiManagement,
    url: instance_url,
    body: Some(instance_body),
};

pub const DELETE_INSTANCE: ResourceAction = ResourceAction {
    name: "delete-instance",
    method: Method::Delete,
    family: ApiFamily::ApiManagement,
    url: instance_url,
    body: None,
};

pub const GET_PRODUCT: ResourceAction = ResourceAction {
    name: "get-product",
    method: Method::Get,
    family: ApiFamily::ApiManagement,
    url: product_url,
    body: None,
};

pub const PUT_PRODUCT: ResourceAction = ResourceAction {
    name: "put-product",
    method: Method::Put,
    family: ApiFamily::ApiManagement,
    url: product_url,
    body: Some(product_body),
};

pub const PATCH_PRODUCT: ResourceAction = ResourceAction {
    name: "patch-product",
    method: Method::Patch,
    family: ApiFamily::ApiManagement,
    url: product_url,
    body: Some(product_body),
};

pub const PUT_PRODUCT_API: ResourceAction = ResourceAction {
    name: "put-product-api",
    method: Method::Put,
    family: ApiFamily::ApiManagement,
    url: product_api_url,
    body: None,
};

pub const GET_API: ResourceAction = ResourceAction {
    name: "get-api",
    method: Method::Get,
    family: ApiFamily::ApiManagement,
    url: api_url,
    body: None,
};

pub const PUT_API: ResourceAction = ResourceAction {
    name: "put-api",
    method: Method::Put,
    family: ApiFamily::ApiManagement,
    url: api_url,
    body: Some(api_body),
};

pub const DELETE_API: ResourceAction = ResourceAction {
    name: "delete-api",
    method: Method::Delete,
    family: ApiFamily::ApiManagement,
    url: api_url,
    body: None,
};

/// One `PUT` per API operation descriptor, in declaration order.
pub fn api_operation_requests(ctx: &OperationContext) -> Result<Vec<PreparedRequest>, BrokerError> {
    let base = instance_url(ctx)?;
    Ok(ctx
        .operations
        .iter()
        .map(|op| PreparedRequest {
            name: format!("put-operation:{}", op.path),
            method: Method::Put,
            family: ApiFamily::ApiManagement,
            url: format!("{}/{}", base, op.path),
            body: Some(op.document.clone()),
        })
        .collect())
}
