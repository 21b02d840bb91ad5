//! Stratus Broker Protocol
//!
//! Shared vocabulary between the broker adapter, the orchestration core and
//! the collaborators it consumes.
//!
//! - Request/reply shapes for the six broker verbs
//! - Opaque result payloads replayed by the caller
//! - Service catalog and plans
//! - Azure environment table and API versions
//! - `Transport` and `TokenProvider` seams

pub mod auth;
pub mod catalog;
pub mod defaults;
pub mod environment;
pub mod error;
pub mod payload;
pub mod reply;
pub mod request;
pub mod transport;

pub use auth::TokenProvider;
pub use catalog::{Plan, PlanKind, ServiceCatalog};
pub use environment::{ApiVersions, AzureEnvironment};
pub use error::{BrokerError, PayloadError};
pub use payload::{BindingResult, ProvisioningResult};
pub use reply::{
    BindReply, BrokerStatus, EmptyReply, LastOperation, PollOutcome, PollReply, ProvisionReply,
};
pub use request::{AzureCredentials, BindResource, BrokerRequest};
pub use transport::{HttpRequest, HttpResponse, Method, StatusClass, Transport};
