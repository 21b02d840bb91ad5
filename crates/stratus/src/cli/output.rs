//! JSON rendering for the adapter.
//!
//! Replies go to stdout as one JSON document. Result payloads are emitted
//! as the opaque strings the adapter stores and hands back on later calls.

use serde_json::{json, Value};
use stratus_protocol::{
    BindReply, BindingResult, BrokerError, EmptyReply, PollOutcome, ProvisionReply,
    ProvisioningResult,
};

pub fn provision_document(reply: &ProvisionReply, result: &ProvisioningResult) -> Value {
    json!({
        "reply": reply,
        "provisioning_result": result.to_payload(),
    })
}

pub fn poll_document(outcome: &PollOutcome) -> Value {
    json!({
        "last_operation": outcome.last_operation,
        "reply": outcome.reply,
        "provisioning_result": outcome.result.to_payload(),
    })
}

pub fn bind_document(reply: &BindReply, result: &BindingResult) -> Value {
    json!({
        "reply": reply,
        "binding_result": result.to_payload(),
    })
}

pub fn empty_document(reply: &EmptyReply) -> Value {
    json!({ "reply": reply })
}

/// Stable name of an error class.
pub fn error_kind(err: &BrokerError) -> &'static str {
    match err {
        BrokerError::Validation(_) => "validation",
        BrokerError::NotFound(_) => "not_found",
        BrokerError::Conflict(_) => "conflict",
        BrokerError::Provider { .. } => "provider",
        BrokerError::Contract(_) => "contract",
        BrokerError::Auth(_) => "auth",
        BrokerError::Transport(_) => "transport",
    }
}

pub fn error_document(err: &BrokerError) -> Value {
    json!({
        "error": {
            "kind": error_kind(err),
            "message": err.to_string(),
            "http_status": err.http_status(),
            "provider_status": err.provider_status(),
            "retryable": err.is_retryable(),
        }
    })
}
