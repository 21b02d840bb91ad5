//! Bind and unbind orchestration.
//!
//! Bind registers the route as an API on the instance, attaches it to a
//! product (created on demand), publishes the product and registers one
//! catch-all operation per HTTP method.

use crate::client::{provider_error, require_success};
use crate::context::OperationContext;
use crate::pipeline::{Control, Flow, Pipeline};
use crate::resources::{
    api_operation_requests, DELETE_API, GET_API, GET_INSTANCE, GET_PRODUCT, PATCH_PRODUCT,
    PUT_API, PUT_PRODUCT, PUT_PRODUCT_API,
};
use crate::services::{acquire_token, context_step, Services};
use serde_json::Value;
use std::sync::Arc;
use stratus_protocol::defaults::PUBLISHED_PRODUCT_STATE;
use stratus_protocol::{BrokerError, StatusClass};
use tracing::{debug, info};

pub fn bind_pipeline(services: &Arc<Services>) -> Pipeline<OperationContext> {
    Pipeline::new("bind")
        .step_with("acquire-token", Arc::clone(services), acquire_token)
        .step_with("ensure-product", Arc::clone(services), ensure_product)
        .step_with("reject-existing-api", Arc::clone(services), context_step!(reject_existing_api))
        .step_with("create-api", Arc::clone(services), context_step!(create_api))
        .step_with("link-product-api", Arc::clone(services), context_step!(link_product_api))
        .step("mark-published", mark_published)
        .step_with("update-product", Arc::clone(services), context_step!(update_product))
        .step_with("create-operations", Arc::clone(services), create_operations)
        .step_with("refresh-instance", Arc::clone(services), context_step!(refresh_instance))
}

pub fn unbind_pipeline(services: &Arc<Services>) -> Pipeline<OperationContext> {
    Pipeline::new("unbind")
        .step_with("acquire-token", Arc::clone(services), acquire_token)
        .step_with("delete-api", Arc::clone(services), context_step!(delete_api))
}

/// Nested pipeline run when the product does not exist yet.
fn create_product_pipeline(services: &Arc<Services>) -> Pipeline<OperationContext> {
    Pipeline::new("create-product")
        .step_with("put-product", Arc::clone(services), context_step!(put_product))
        .step("require-success", |mut ctx: OperationContext| async move {
            let checked = require_success(&mut ctx).map(|_| Control::Continue);
            Flow::resolve(ctx, checked)
        })
}

async fn ensure_product(services: Arc<Services>, mut ctx: OperationContext) -> Flow<OperationContext> {
    let response = match services.client.invoke(&GET_PRODUCT, &mut ctx).await {
        Ok(response) => response,
        Err(err) => return Flow::Fail(ctx, err),
    };

    if response.status == 200 {
        if let Some(product) = ctx.product.as_mut() {
            product.capture(&response.body);
        }
        return Flow::Continue(ctx);
    }
    if ctx.plan.is_existing() {
        return Flow::Fail(
            ctx,
            BrokerError::NotFound(
                "Plan requires existing product, but named product was not found".to_string(),
            ),
        );
    }

    debug!(status = response.status, "product missing, creating it");
    let run = create_product_pipeline(&services).run(ctx).await;
    match run.outcome {
        Ok(_) => Flow::Continue(run.context),
        Err(err) => Flow::Fail(run.context, err),
    }
}

async fn put_product(services: &Services, ctx: &mut OperationContext) -> Result<Control, BrokerError> {
    services.client.invoke(&PUT_PRODUCT, ctx).await?;
    Ok(Control::Continue)
}

async fn reject_existing_api(
    services: &Services,
    ctx: &mut OperationContext,
) -> Result<Control, BrokerError> {
    let response = services.client.invoke(&GET_API, ctx).await?;
    match response.class() {
        StatusClass::Success if response.status == 200 => {
            Err(BrokerError::Conflict("API already exists".to_string()))
        }
        StatusClass::NotFound => Ok(Control::Continue),
        _ => Err(provider_error(&response, None)),
    }
}

async fn create_api(services: &Services, ctx: &mut OperationContext) -> Result<Control, BrokerError> {
    services.client.invoke(&PUT_API, ctx).await?;
    require_success(ctx)?;
    Ok(Control::Continue)
}

async fn link_product_api(
    services: &Services,
    ctx: &mut OperationContext,
) -> Result<Control, BrokerError> {
    services.client.invoke(&PUT_PRODUCT_API, ctx).await?;
    require_success(ctx)?;
    Ok(Control::Continue)
}

async fn mark_published(mut ctx: OperationContext) -> Flow<OperationContext> {
    let result = ctx.product_mut().map(|product| {
        if let Value::Object(doc) = &mut product.document {
            doc.insert(
                "state".to_string(),
                Value::String(PUBLISHED_PRODUCT_STATE.to_string()),
            );
        }
        Control::Continue
    });
    Flow::resolve(ctx, result)
}

async fn update_product(
    services: &Services,
    ctx: &mut OperationContext,
) -> Result<Control, BrokerError> {
    services.client.invoke(&PATCH_PRODUCT, ctx).await?;
    require_success(ctx)?;
    Ok(Control::Continue)
}

async fn create_operations(services: Arc<Services>, ctx: OperationContext) -> Flow<OperationContext> {
    let requests = match api_operation_requests(&ctx) {
        Ok(requests) => requests,
        Err(err) => return Flow::Fail(ctx, err),
    };
    debug!(count = requests.len(), "registering API operations");
    let run = services.client.invoke_each(requests, ctx).await;
    match run.outcome {
        Ok(_) => Flow::Continue(run.context),
        Err(err) => Flow::Fail(run.context, err),
    }
}

async fn refresh_instance(
    services: &Services,
    ctx: &mut OperationContext,
) -> Result<Control, BrokerError> {
    services.client.invoke(&GET_INSTANCE, ctx).await?;
    require_success(ctx)?;
    if let Some(body) = ctx.result.clone() {
        ctx.instance.capture(&body);
    }
    Ok(Control::Continue)
}

async fn delete_api(services: &Services, ctx: &mut OperationContext) -> Result<Control, BrokerError> {
    let response = services.client.invoke(&DELETE_API, ctx).await?;
    if response.class() == StatusClass::NotFound && services.config.unbind_tolerates_missing_api {
        info!(api = %ctx.api()?.name, "API already removed");
        return Ok(Control::Continue);
    }
    require_success(ctx)?;
    Ok(Control::Continue)
}

/// `runtimeUrl` of the refreshed instance joined with the API path.
pub fn route_service_url(ctx: &OperationContext) -> Result<String, BrokerError> {
    let runtime_url = ctx.instance.property("runtimeUrl").ok_or_else(|| {
        BrokerError::provider(200, "instance document has no properties.runtimeUrl")
    })?;
    let api = ctx.api()?;
    let path = api
        .document
        .get("path")
        .and_then(Value::as_str)
        .unwrap_or(api.name.as_str());
    Ok(format!(
        "{}/{}",
        runtime_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    ))
}
