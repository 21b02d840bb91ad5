//! Poll reconciler.
//!
//! Re-reads the instance and maps its `provisioningState` onto a broker
//! status. Nothing is cached between polls; provider state is the only
//! source of truth.

use crate::context::OperationContext;
use crate::pipeline::{Control, Flow, Pipeline};
use crate::resources::GET_INSTANCE;
use crate::services::{acquire_token, unexpected_status, Services};
use std::sync::Arc;
use stratus_protocol::{BrokerError, BrokerStatus, LastOperation, PlanKind, PollReply};
use tracing::debug;

/// Map provider observations onto a poll reply.
///
/// `http_status` is the status of the instance GET, or `None` when no
/// request was made. Only a deprovision poll on an "Existing" plan may skip
/// the request.
pub fn reconcile(
    last_operation: LastOperation,
    plan_kind: PlanKind,
    http_status: Option<u16>,
    provisioning_state: Option<&str>,
) -> Result<PollReply, BrokerError> {
    use BrokerStatus::{Failed, InProgress, Succeeded};

    if last_operation == LastOperation::Deprovision && plan_kind == PlanKind::Existing {
        return Ok(PollReply::new(Succeeded, "Deprovisioning has succeeded"));
    }

    let status = http_status.ok_or_else(|| {
        BrokerError::Transport("instance state was not fetched".to_string())
    })?;
    let state = provisioning_state.unwrap_or("unknown");

    let reply = match (last_operation, status) {
        (LastOperation::Provision, 200) => match state {
            "Succeeded" => PollReply::new(Succeeded, "Provisioning has succeeded"),
            "Created" | "Activating" | "Updating" => {
                PollReply::new(InProgress, format!("Provisioning is in progress ({})", state))
            }
            other => PollReply::new(Failed, format!("Provisioning has failed ({})", other)),
        },
        (LastOperation::Provision, 404) => {
            PollReply::new(Failed, "Provisioning has failed (404)")
        }
        (LastOperation::Deprovision, 200) => match state {
            "Deleted" => PollReply::new(Succeeded, "Deprovisioning has succeeded"),
            "Stopped" | "Terminating" => {
                PollReply::new(InProgress, format!("Deprovisioning is in progress ({})", state))
            }
            other => PollReply::new(Failed, format!("Deprovisioning has failed ({})", other)),
        },
        (LastOperation::Deprovision, 404) => {
            PollReply::new(Succeeded, "Deprovisioning has succeeded")
        }
        (_, other) => return Err(unexpected_status(other)),
    };
    Ok(reply)
}

/// Steps: short-circuit, token, fetch, reconcile.
pub fn poll_pipeline(services: &Arc<Services>, last_operation: LastOperation) -> Pipeline<OperationContext> {
    Pipeline::new(format!("poll-{}", last_operation))
        .step("existing-shortcut", move |ctx: OperationContext| async move {
            existing_shortcut(last_operation, ctx)
        })
        .step_with("acquire-token", Arc::clone(services), acquire_token)
        .step_with("fetch-instance", Arc::clone(services), move |services: Arc<Services>, mut ctx: OperationContext| async move {
            let result = fetch_and_reconcile(&services, &mut ctx, last_operation).await;
            Flow::resolve(ctx, result)
        })
}

fn existing_shortcut(last_operation: LastOperation, mut ctx: OperationContext) -> Flow<OperationContext> {
    if last_operation != LastOperation::Deprovision || ctx.plan_kind() != PlanKind::Existing {
        return Flow::Continue(ctx);
    }
    match reconcile(last_operation, PlanKind::Existing, None, None) {
        Ok(reply) => {
            ctx.poll_reply = Some(reply);
            Flow::Stop(ctx)
        }
        Err(err) => Flow::Fail(ctx, err),
    }
}

async fn fetch_and_reconcile(
    services: &Services,
    ctx: &mut OperationContext,
    last_operation: LastOperation,
) -> Result<Control, BrokerError> {
    let response = services.client.invoke(&GET_INSTANCE, ctx).await?;
    if response.status == 200 {
        ctx.instance.capture(&response.body);
    }
    let state = ctx.instance.property("provisioningState").map(str::to_string);
    let state = if response.status == 200 { state } else { None };
    debug!(
        last_operation = %last_operation,
        status = response.status,
        provisioning_state = state.as_deref().unwrap_or("-"),
        "reconciling instance state"
    );
    let reply = reconcile(
        last_operation,
        ctx.plan_kind(),
        Some(response.status),
        state.as_deref(),
    )?;
    ctx.poll_reply = Some(reply);
    Ok(Control::Continue)
}
