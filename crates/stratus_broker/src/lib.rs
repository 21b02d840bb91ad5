//! Stratus Broker
//!
//! Orchestration core of the API Management provisioning broker.
//!
//! - [`pipeline`]: sequential step runner with stop and fail semantics
//! - [`context`]: per-operation state derived from the inbound request
//! - [`client`]: one HTTP exchange per declared [`resources`] action
//! - [`provisioning`], [`poll`], [`binding`]: the verb pipelines
//! - [`broker`]: the [`ApiManagementBroker`] facade

pub mod binding;
pub mod broker;
pub mod client;
pub mod config;
pub mod context;
pub mod pipeline;
pub mod poll;
pub mod provisioning;
pub mod resources;
pub mod services;
pub mod transport;

pub use broker::{azure_instance_id, ApiManagementBroker};
pub use client::ResourceClient;
pub use config::{BrokerConfig, ConfigError};
pub use context::OperationContext;
pub use pipeline::{Completion, Control, Flow, Pipeline, PipelineRun};
pub use poll::reconcile;
pub use transport::ReqwestTransport;
