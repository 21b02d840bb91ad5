//! Provision and deprovision orchestration.

use crate::client::{provider_error, require_success};
use crate::context::OperationContext;
use crate::pipeline::{Control, Pipeline};
use crate::resources::{
    CHECK_NAME_AVAILABILITY, DELETE_INSTANCE, GET_INSTANCE, PUT_INSTANCE, PUT_RESOURCE_GROUP,
};
use crate::services::{acquire_token, context_step, stop_if_existing, unexpected_status, Services};
use serde_json::Value;
use std::sync::Arc;
use stratus_protocol::{BrokerError, StatusClass};
use tracing::{debug, info};

/// token → existing-instance check → name check → resource group → instance.
///
/// An instance that already exists ends the run early and successfully;
/// nothing after the check is sent.
pub fn provision_pipeline(services: &Arc<Services>) -> Pipeline<OperationContext> {
    Pipeline::new("provision")
        .step_with("acquire-token", Arc::clone(services), acquire_token)
        .step_with(
            "check-existing-instance",
            Arc::clone(services),
            context_step!(check_existing_instance),
        )
        .step_with(
            "check-name-availability",
            Arc::clone(services),
            context_step!(check_name_availability),
        )
        .step_with(
            "ensure-resource-group",
            Arc::clone(services),
            context_step!(ensure_resource_group),
        )
        .step_with("create-instance", Arc::clone(services), context_step!(create_instance))
}

/// Existing-plan shortcut → token → delete.
pub fn deprovision_pipeline(services: &Arc<Services>) -> Pipeline<OperationContext> {
    Pipeline::new("deprovision")
        .step("existing-shortcut", stop_if_existing)
        .step_with("acquire-token", Arc::clone(services), acquire_token)
        .step_with("delete-instance", Arc::clone(services), context_step!(delete_instance))
}

async fn check_existing_instance(
    services: &Services,
    ctx: &mut OperationContext,
) -> Result<Control, BrokerError> {
    let response = services.client.invoke(&GET_INSTANCE, ctx).await?;
    match response.class() {
        StatusClass::Success if response.status == 200 => {
            info!(instance = %ctx.instance.name, "instance already exists");
            ctx.instance.capture(&response.body);
            Ok(Control::Stop)
        }
        StatusClass::NotFound if ctx.plan.is_existing() => Err(BrokerError::NotFound(
            "Plan requires existing instance, but named instance was not found".to_string(),
        )),
        StatusClass::NotFound => Ok(Control::Continue),
        _ => Err(provider_error(&response, None)),
    }
}

async fn check_name_availability(
    services: &Services,
    ctx: &mut OperationContext,
) -> Result<Control, BrokerError> {
    let response = services.client.invoke(&CHECK_NAME_AVAILABILITY, ctx).await?;
    if response.status != 200 {
        return Err(BrokerError::provider(
            response.status,
            format!("Unexpected HTTP status code: {}", response.status),
        ));
    }
    let available = response
        .body
        .get("nameAvailable")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    if !available {
        let message = response
            .message()
            .map(str::to_string)
            .unwrap_or_else(|| format!("Instance name {} is not available", ctx.instance.name));
        return Err(BrokerError::Conflict(message));
    }
    Ok(Control::Continue)
}

async fn ensure_resource_group(
    services: &Services,
    ctx: &mut OperationContext,
) -> Result<Control, BrokerError> {
    services.client.invoke(&PUT_RESOURCE_GROUP, ctx).await?;
    require_success(ctx)?;
    debug!(resource_group = %ctx.azure.resource_group, "resource group ensured");
    Ok(Control::Continue)
}

async fn create_instance(
    services: &Services,
    ctx: &mut OperationContext,
) -> Result<Control, BrokerError> {
    let response = services.client.invoke(&PUT_INSTANCE, ctx).await?;
    match response.status {
        200 | 201 | 202 => {
            info!(instance = %ctx.instance.name, status = response.status, "instance create accepted");
            ctx.instance.capture(&response.body);
            Ok(Control::Continue)
        }
        _ => Err(provider_error(&response, None)),
    }
}

async fn delete_instance(
    services: &Services,
    ctx: &mut OperationContext,
) -> Result<Control, BrokerError> {
    let response = services.client.invoke(&DELETE_INSTANCE, ctx).await?;
    match response.class() {
        StatusClass::Success => Ok(Control::Continue),
        StatusClass::NotFound => {
            debug!(instance = %ctx.instance.name, "instance already gone");
            Ok(Control::Continue)
        }
        _ if response.message().is_some() => Err(provider_error(&response, None)),
        _ => Err(unexpected_status(response.status)),
    }
}
