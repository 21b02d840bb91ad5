//! Collaborators shared by every step of every operation.

use crate::client::ResourceClient;
use crate::config::BrokerConfig;
use crate::context::OperationContext;
use crate::pipeline::{Control, Flow};
use std::sync::Arc;
use stratus_protocol::{BrokerError, TokenProvider, Transport};

/// Immutable, shared across concurrent operations.
pub struct Services {
    pub client: ResourceClient,
    pub tokens: Arc<dyn TokenProvider>,
    pub config: BrokerConfig,
}

impl Services {
    pub fn new(
        config: BrokerConfig,
        transport: Arc<dyn Transport>,
        tokens: Arc<dyn TokenProvider>,
    ) -> Self {
        Self {
            client: ResourceClient::new(transport),
            tokens,
            config,
        }
    }
}

/// Wrap `async fn(&Services, &mut OperationContext) -> Result<Control, _>`
/// as a pipeline step.
macro_rules! context_step {
    ($inner:path) => {
        |services: std::sync::Arc<$crate::services::Services>,
         mut ctx: $crate::context::OperationContext| async move {
            let result = $inner(&services, &mut ctx).await;
            $crate::pipeline::Flow::resolve(ctx, result)
        }
    };
}

pub(crate) use context_step;

/// Acquire a bearer token for the context's environment.
pub async fn acquire_token(services: Arc<Services>, mut ctx: OperationContext) -> Flow<OperationContext> {
    let token = services
        .tokens
        .get_token(
            ctx.azure.environment,
            &ctx.request.azure,
            ctx.azure.api_versions.token,
        )
        .await;
    let result = token.map(|token| {
        ctx.token = Some(token);
        Control::Continue
    });
    Flow::resolve(ctx, result)
}

/// Soft-stop when the plan's instance is not managed by the broker.
pub async fn stop_if_existing(ctx: OperationContext) -> Flow<OperationContext> {
    if ctx.plan.is_existing() {
        tracing::debug!(instance = %ctx.instance.name, "plan is Existing, skipping provider calls");
        Flow::Stop(ctx)
    } else {
        Flow::Continue(ctx)
    }
}

pub(crate) fn unexpected_status(status: u16) -> BrokerError {
    BrokerError::provider(status, format!("Unexpected HTTP status: {}", status))
}
