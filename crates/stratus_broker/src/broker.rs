//! API Management broker facade.
//!
//! One async method per broker verb. Each call derives a fresh context,
//! runs the verb's pipeline over it and builds the reply. Pipelines are
//! built once and shared by concurrent calls.

use crate::binding::{bind_pipeline, route_service_url, unbind_pipeline};
use crate::config::BrokerConfig;
use crate::context::OperationContext;
use crate::pipeline::Pipeline;
use crate::poll::poll_pipeline;
use crate::provisioning::{deprovision_pipeline, provision_pipeline};
use crate::services::Services;
use std::sync::Arc;
use std::time::Instant;
use stratus_protocol::defaults::SERVICE_NAME;
use stratus_protocol::{
    BindReply, BindingResult, BrokerError, BrokerRequest, EmptyReply, LastOperation, PollOutcome,
    ProvisionReply, ProvisioningResult, ServiceCatalog, TokenProvider, Transport,
};
use tracing::{info, info_span, warn, Instrument};

pub struct ApiManagementBroker {
    services: Arc<Services>,
    provision: Pipeline<OperationContext>,
    deprovision: Pipeline<OperationContext>,
    poll_provision: Pipeline<OperationContext>,
    poll_deprovision: Pipeline<OperationContext>,
    bind: Pipeline<OperationContext>,
    unbind: Pipeline<OperationContext>,
}

impl ApiManagementBroker {
    pub fn new(
        config: BrokerConfig,
        transport: Arc<dyn Transport>,
        tokens: Arc<dyn TokenProvider>,
    ) -> Self {
        let services = Arc::new(Services::new(config, transport, tokens));
        Self {
            provision: provision_pipeline(&services),
            deprovision: deprovision_pipeline(&services),
            poll_provision: poll_pipeline(&services, LastOperation::Provision),
            poll_deprovision: poll_pipeline(&services, LastOperation::Deprovision),
            bind: bind_pipeline(&services),
            unbind: unbind_pipeline(&services),
            services,
        }
    }

    pub fn config(&self) -> &BrokerConfig {
        &self.services.config
    }

    pub fn catalog(&self) -> &ServiceCatalog {
        &self.services.config.catalog
    }

    pub async fn provision(
        &self,
        request: BrokerRequest,
    ) -> Result<(ProvisionReply, ProvisioningResult), BrokerError> {
        let span = info_span!("broker.provision", instance_id = %request.instance_id);
        self.provision_inner(request).instrument(span).await
    }

    /// Poll the last asynchronous operation. An unknown or missing
    /// `last_operation` fails before any provider call.
    pub async fn poll(&self, request: BrokerRequest) -> Result<PollOutcome, BrokerError> {
        let span = info_span!("broker.poll", instance_id = %request.instance_id);
        self.poll_inner(request).instrument(span).await
    }

    pub async fn deprovision(&self, request: BrokerRequest) -> Result<EmptyReply, BrokerError> {
        let span = info_span!("broker.deprovision", instance_id = %request.instance_id);
        self.deprovision_inner(request).instrument(span).await
    }

    pub async fn bind(
        &self,
        request: BrokerRequest,
    ) -> Result<(BindReply, BindingResult), BrokerError> {
        let span = info_span!("broker.bind", instance_id = %request.instance_id);
        self.bind_inner(request).instrument(span).await
    }

    pub async fn unbind(&self, request: BrokerRequest) -> Result<EmptyReply, BrokerError> {
        let span = info_span!("broker.unbind", instance_id = %request.instance_id);
        self.unbind_inner(request).instrument(span).await
    }

    async fn provision_inner(
        &self,
        request: BrokerRequest,
    ) -> Result<(ProvisionReply, ProvisioningResult), BrokerError> {
        let ctx = self.derive(request)?;
        let ctx = run_verb(&self.provision, ctx).await?;
        let reply = ProvisionReply {
            dashboard_url: ctx.instance.property("portalUrl").map(str::to_string),
        };
        Ok((reply, ctx.provisioning_result()))
    }

    async fn poll_inner(&self, request: BrokerRequest) -> Result<PollOutcome, BrokerError> {
        let last_operation: LastOperation = request
            .last_operation
            .as_deref()
            .ok_or_else(|| BrokerError::Contract("last_operation is required".to_string()))?
            .parse()?;
        let ctx = self.derive(request)?;
        let pipeline = match last_operation {
            LastOperation::Provision => &self.poll_provision,
            LastOperation::Deprovision => &self.poll_deprovision,
        };
        let ctx = run_verb(pipeline, ctx).await?;
        let reply = ctx
            .poll_reply
            .clone()
            .ok_or_else(|| BrokerError::Transport("poll finished without a reply".to_string()))?;
        info!(state = %reply.state, "{}", reply.description);
        Ok(PollOutcome {
            last_operation,
            reply,
            result: ctx.provisioning_result(),
        })
    }

    async fn deprovision_inner(&self, request: BrokerRequest) -> Result<EmptyReply, BrokerError> {
        let ctx = self.derive(request)?;
        run_verb(&self.deprovision, ctx).await?;
        Ok(EmptyReply {})
    }

    async fn bind_inner(
        &self,
        request: BrokerRequest,
    ) -> Result<(BindReply, BindingResult), BrokerError> {
        let ctx = self.derive(request)?;
        ctx.api()?;
        ctx.product()?;
        let ctx = run_verb(&self.bind, ctx).await?;
        let reply = BindReply {
            route_service_url: route_service_url(&ctx)?,
        };
        Ok((reply, ctx.binding_result()?))
    }

    async fn unbind_inner(&self, request: BrokerRequest) -> Result<EmptyReply, BrokerError> {
        let ctx = self.derive(request)?;
        ctx.api()?;
        run_verb(&self.unbind, ctx).await?;
        Ok(EmptyReply {})
    }

    fn derive(&self, request: BrokerRequest) -> Result<OperationContext, BrokerError> {
        OperationContext::derive(request, &self.services.config).map_err(|err| {
            warn!("rejected request: {}", err);
            err
        })
    }
}

async fn run_verb(
    pipeline: &Pipeline<OperationContext>,
    ctx: OperationContext,
) -> Result<OperationContext, BrokerError> {
    let start = Instant::now();
    let run = pipeline.run(ctx).await;
    let duration_ms = start.elapsed().as_millis() as u64;
    match &run.outcome {
        Ok(completion) => info!(
            pipeline = pipeline.name(),
            duration_ms,
            completion = ?completion,
            "operation finished"
        ),
        Err(err) => warn!(
            pipeline = pipeline.name(),
            duration_ms,
            http_status = err.http_status(),
            "operation failed: {}",
            err
        ),
    }
    run.into_result()
}

/// Azure-side id for the instance a request names:
/// `<service name>-<instance name>`.
pub fn azure_instance_id(request: &BrokerRequest) -> Result<String, BrokerError> {
    let name = request.requested_instance_name().ok_or_else(|| {
        BrokerError::Validation("instance name is required (parameters.instance.name or space_guid)".into())
    })?;
    Ok(format!("{}-{}", SERVICE_NAME, name))
}
