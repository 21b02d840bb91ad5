//! Broker-facing replies.

use crate::error::BrokerError;
use crate::payload::ProvisioningResult;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Externally visible state of an asynchronous operation.
///
/// Derived on every poll from fresh provider state; never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BrokerStatus {
    #[serde(rename = "succeeded")]
    Succeeded,
    #[serde(rename = "in progress")]
    InProgress,
    #[serde(rename = "failed")]
    Failed,
}

impl BrokerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BrokerStatus::Succeeded => "succeeded",
            BrokerStatus::InProgress => "in progress",
            BrokerStatus::Failed => "failed",
        }
    }

    /// Succeeded and failed end polling; in progress does not.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, BrokerStatus::InProgress)
    }
}

impl fmt::Display for BrokerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The asynchronous operation a poll refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LastOperation {
    Provision,
    Deprovision,
}

impl LastOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            LastOperation::Provision => "provision",
            LastOperation::Deprovision => "deprovision",
        }
    }
}

impl fmt::Display for LastOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LastOperation {
    type Err = BrokerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "provision" => Ok(LastOperation::Provision),
            "deprovision" => Ok(LastOperation::Deprovision),
            other => Err(BrokerError::Contract(format!(
                "unrecognized last operation: {:?}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionReply {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dashboard_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollReply {
    pub state: BrokerStatus,
    pub description: String,
}

impl PollReply {
    pub fn new(state: BrokerStatus, description: impl Into<String>) -> Self {
        Self {
            state,
            description: description.into(),
        }
    }
}

/// Everything a poll hands back to the adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollOutcome {
    pub last_operation: LastOperation,
    pub reply: PollReply,
    pub result: ProvisioningResult,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindReply {
    pub route_service_url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmptyReply {}
