//! Resource client.
//!
//! Turns a [`ResourceAction`] into one HTTP exchange: attaches auth and
//! correlation headers, appends `api-version`, records the response on the
//! context and hands it back uninterpreted. Status policy belongs to the
//! calling step.

use crate::context::OperationContext;
use crate::pipeline::{Control, Flow, Pipeline, PipelineRun};
use crate::resources::{ApiFamily, PreparedRequest, ResourceAction};
use std::sync::Arc;
use stratus_protocol::{BrokerError, HttpRequest, HttpResponse, Transport};
use tracing::{debug, warn};
use uuid::Uuid;

const USER_AGENT: &str = concat!("stratus/", env!("CARGO_PKG_VERSION"));

#[derive(Clone)]
pub struct ResourceClient {
    transport: Arc<dyn Transport>,
}

impl ResourceClient {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Resolve `action` against the context and send it.
    pub async fn invoke(
        &self,
        action: &ResourceAction,
        ctx: &mut OperationContext,
    ) -> Result<HttpResponse, BrokerError> {
        let prepared = action.prepare(ctx)?;
        self.send(&prepared, ctx).await
    }

    /// Send a prepared request and record the response on the context.
    pub async fn send(
        &self,
        prepared: &PreparedRequest,
        ctx: &mut OperationContext,
    ) -> Result<HttpResponse, BrokerError> {
        let token = ctx
            .token
            .as_deref()
            .ok_or_else(|| BrokerError::Auth("no bearer token acquired".to_string()))?;
        let api_version = match prepared.family {
            ApiFamily::Resources => ctx.azure.api_versions.resources,
            ApiFamily::ApiManagement => ctx.azure.api_versions.api_management,
        };
        let request_id = Uuid::new_v4().to_string();

        let request = HttpRequest {
            url: prepared.url.clone(),
            query: vec![("api-version".to_string(), api_version.to_string())],
            method: prepared.method,
            headers: vec![
                ("Authorization".to_string(), format!("Bearer {}", token)),
                ("x-ms-client-request-id".to_string(), request_id.clone()),
                ("x-ms-return-client-request-id".to_string(), "true".to_string()),
                ("Content-Type".to_string(), "application/json".to_string()),
                ("If-Match".to_string(), "*".to_string()),
                ("User-Agent".to_string(), USER_AGENT.to_string()),
            ],
            json_body: prepared.body.clone(),
        };

        debug!(
            action = %prepared.name,
            method = %prepared.method,
            url = %prepared.url,
            request_id = %request_id,
            "sending resource manager request"
        );
        let response = self.transport.send(request).await?;
        debug!(action = %prepared.name, status = response.status, "response received");

        ctx.last_response = Some(response.clone());
        Ok(response)
    }

    /// Send each request in order, requiring a 2xx after every one. The
    /// first failure aborts the rest.
    pub async fn invoke_each(
        &self,
        requests: Vec<PreparedRequest>,
        ctx: OperationContext,
    ) -> PipelineRun<OperationContext> {
        let mut batch = Pipeline::new("invoke-each");
        for request in requests {
            let name = request.name.clone();
            let shared = Arc::new((self.clone(), request));
            batch = batch
                .step_with(
                    &name,
                    shared,
                    |shared: Arc<(ResourceClient, PreparedRequest)>, mut ctx: OperationContext| async move {
                        let (client, request) = &*shared;
                        let sent = client.send(request, &mut ctx).await.map(|_| Control::Continue);
                        Flow::resolve(ctx, sent)
                    },
                )
                .step("require-success", |mut ctx: OperationContext| async move {
                    let checked = require_success(&mut ctx).map(|_| Control::Continue);
                    Flow::resolve(ctx, checked)
                });
        }
        batch.run(ctx).await
    }
}

/// Fail unless the last response was 2xx; on success its body becomes the
/// context result.
pub fn require_success(ctx: &mut OperationContext) -> Result<(), BrokerError> {
    let response = ctx
        .last_response
        .as_ref()
        .ok_or_else(|| BrokerError::Transport("no response recorded".to_string()))?;
    if !response.is_success() {
        let err = provider_error(response, None);
        warn!(status = response.status, "resource manager call failed: {}", err);
        return Err(err);
    }
    ctx.result = Some(response.body.clone());
    Ok(())
}

/// Provider error for `response`, preferring the provider's own message.
pub fn provider_error(response: &HttpResponse, fallback: Option<&str>) -> BrokerError {
    let message = response
        .message()
        .map(str::to_string)
        .or_else(|| fallback.map(str::to_string))
        .unwrap_or_else(|| format!("Non-successful HTTP status: {}", response.status));
    BrokerError::provider(response.status, message)
}
