//! Verb dispatch.

use super::output;
use serde_json::{json, Value};
use stratus_broker::{azure_instance_id, ApiManagementBroker};
use stratus_protocol::{BrokerError, BrokerRequest};
use tracing::debug;

/// One broker verb as exposed on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Catalog,
    Provision,
    Poll,
    Deprovision,
    Bind,
    Unbind,
    InstanceId,
}

impl Verb {
    pub fn name(&self) -> &'static str {
        match self {
            Verb::Catalog => "catalog",
            Verb::Provision => "provision",
            Verb::Poll => "poll",
            Verb::Deprovision => "deprovision",
            Verb::Bind => "bind",
            Verb::Unbind => "unbind",
            Verb::InstanceId => "instance-id",
        }
    }

    /// Whether the verb consumes a request document.
    pub fn takes_request(&self) -> bool {
        !matches!(self, Verb::Catalog)
    }
}

/// Run `verb` and render its reply.
///
/// `request` is ignored by [`Verb::Catalog`] and defaults to an empty
/// request for the others.
pub async fn execute(
    broker: &ApiManagementBroker,
    verb: Verb,
    request: Option<BrokerRequest>,
) -> Result<Value, BrokerError> {
    debug!(verb = verb.name(), "Dispatching broker verb");
    let request = request.unwrap_or_default();

    let document = match verb {
        Verb::Catalog => json!({ "services": [broker.catalog().document()] }),
        Verb::Provision => {
            let (reply, result) = broker.provision(request).await?;
            output::provision_document(&reply, &result)
        }
        Verb::Poll => output::poll_document(&broker.poll(request).await?),
        Verb::Deprovision => output::empty_document(&broker.deprovision(request).await?),
        Verb::Bind => {
            let (reply, result) = broker.bind(request).await?;
            output::bind_document(&reply, &result)
        }
        Verb::Unbind => output::empty_document(&broker.unbind(request).await?),
        Verb::InstanceId => json!({ "instance_id": azure_instance_id(&request)? }),
    };

    Ok(document)
}
