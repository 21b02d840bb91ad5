//! Provision / poll / deprovision against the in-memory resource manager.

use serde_json::{json, Value};
use std::sync::Arc;
use stratus_broker::{ApiManagementBroker, BrokerConfig};
use stratus_protocol::{BrokerError, BrokerStatus, HttpResponse, LastOperation, Method};
use stratus_test_utils::fixtures::{self, EXISTING_PLAN_ID, STANDARD_PLAN_ID};
use stratus_test_utils::{FakeArm, StaticTokenProvider};

struct Harness {
    arm: Arc<FakeArm>,
    tokens: Arc<StaticTokenProvider>,
    broker: ApiManagementBroker,
}

fn harness() -> Harness {
    harness_with(BrokerConfig::default())
}

fn harness_with(config: BrokerConfig) -> Harness {
    let arm = Arc::new(FakeArm::new());
    let tokens = Arc::new(StaticTokenProvider::new("test-token"));
    let broker = ApiManagementBroker::new(config, arm.clone(), tokens.clone());
    Harness { arm, tokens, broker }
}

#[tokio::test]
async fn test_provision_creates_resource_group_and_instance() {
    let h = harness();
    let (reply, result) = h
        .broker
        .provision(fixtures::request(STANDARD_PLAN_ID, "svc1"))
        .await
        .unwrap();

    assert_eq!(
        reply.dashboard_url.as_deref(),
        Some("https://svc1.portal.azure-api.net")
    );
    assert_eq!(result.resource_group.as_deref(), Some("CloudFoundryServiceBroker"));
    assert_eq!(result.instance_name.as_deref(), Some("svc1"));

    let methods: Vec<Method> = h.arm.requests().iter().map(|r| r.method).collect();
    assert_eq!(
        methods,
        vec![Method::Get, Method::Post, Method::Put, Method::Put]
    );
    assert_eq!(h.arm.count(Method::Put, "/resourcegroups/CloudFoundryServiceBroker"), 1);

    let rg = h.arm.requests()[2].clone();
    assert_eq!(rg.query_param("api-version"), Some("2016-09-01"));
    assert_eq!(rg.json_body.unwrap()["tags"]["user-agent"], "stratus");

    let instance = h.arm.resource(&fixtures::instance_url("svc1")).unwrap();
    assert_eq!(instance["sku"]["name"], "Standard");
    assert_eq!(instance["properties"]["publisherEmail"], "bit-bucket@test.smtp.org");
    assert_eq!(h.tokens.calls(), 1);
}

#[tokio::test]
async fn test_provision_is_idempotent() {
    let h = harness();
    for _ in 0..3 {
        h.broker
            .provision(fixtures::request(STANDARD_PLAN_ID, "svc1"))
            .await
            .unwrap();
    }
    assert_eq!(h.arm.count(Method::Put, "/service/svc1"), 1);
    assert_eq!(h.arm.count(Method::Post, "/checkNameAvailability"), 1);
    assert_eq!(h.arm.count(Method::Get, "/service/svc1"), 3);
}

#[tokio::test]
async fn test_provision_stops_before_side_effects_when_instance_exists() {
    let h = harness();
    h.arm.seed_instance(
        fixtures::SUBSCRIPTION_ID,
        fixtures::DEFAULT_RESOURCE_GROUP,
        "svc1",
        "Succeeded",
    );

    let (reply, _) = h
        .broker
        .provision(fixtures::request(STANDARD_PLAN_ID, "svc1"))
        .await
        .unwrap();
    assert!(reply.dashboard_url.is_some());
    assert_eq!(h.arm.request_count(), 1);
    assert_eq!(h.arm.count(Method::Put, ""), 0);
}

#[tokio::test]
async fn test_provision_name_taken_is_conflict() {
    let h = harness();
    h.arm.take_name("svc1");
    let err = h
        .broker
        .provision(fixtures::request(STANDARD_PLAN_ID, "svc1"))
        .await
        .unwrap_err();
    assert!(matches!(err, BrokerError::Conflict(ref msg) if msg.contains("already in use")));
    assert_eq!(err.http_status(), 409);
    assert_eq!(h.arm.count(Method::Put, ""), 0);
}

#[tokio::test]
async fn test_provision_name_check_unexpected_status() {
    let h = harness();
    h.arm.respond_once(
        Method::Post,
        "/checkNameAvailability",
        HttpResponse::new(500, Value::Null),
    );
    let err = h
        .broker
        .provision(fixtures::request(STANDARD_PLAN_ID, "svc1"))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        BrokerError::provider(500, "Unexpected HTTP status code: 500")
    );
}

#[tokio::test]
async fn test_provision_rejected_instance_put_is_provider_error() {
    let h = harness();
    h.arm.respond_once(
        Method::Put,
        "/service/svc1",
        HttpResponse::new(400, json!({ "error": { "message": "SKU not allowed" } })),
    );
    let err = h
        .broker
        .provision(fixtures::request(STANDARD_PLAN_ID, "svc1"))
        .await
        .unwrap_err();
    assert_eq!(err, BrokerError::provider(400, "SKU not allowed"));
    assert_eq!(err.http_status(), 502);
}

#[tokio::test]
async fn test_existing_plan_never_creates() {
    let h = harness();
    let err = h
        .broker
        .provision(fixtures::request(EXISTING_PLAN_ID, "svc1"))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        BrokerError::NotFound(
            "Plan requires existing instance, but named instance was not found".into()
        )
    );
    assert_eq!(h.arm.count(Method::Put, ""), 0);
    assert_eq!(h.arm.count(Method::Post, ""), 0);
}

#[tokio::test]
async fn test_existing_plan_registers_present_instance() {
    let h = harness();
    h.arm.seed_instance(
        fixtures::SUBSCRIPTION_ID,
        fixtures::DEFAULT_RESOURCE_GROUP,
        "svc1",
        "Succeeded",
    );
    let (_, result) = h
        .broker
        .provision(fixtures::request(EXISTING_PLAN_ID, "svc1"))
        .await
        .unwrap();
    assert_eq!(result.instance_name.as_deref(), Some("svc1"));
    assert_eq!(h.arm.count(Method::Put, ""), 0);
}

#[tokio::test]
async fn test_existing_plan_deprovision_touches_nothing() {
    let h = harness();
    h.broker
        .deprovision(fixtures::request(EXISTING_PLAN_ID, "svc1"))
        .await
        .unwrap();

    let mut poll = fixtures::request(EXISTING_PLAN_ID, "svc1");
    poll.last_operation = Some("deprovision".into());
    let outcome = h.broker.poll(poll).await.unwrap();

    assert_eq!(outcome.reply.state, BrokerStatus::Succeeded);
    assert_eq!(h.arm.request_count(), 0);
    assert_eq!(h.tokens.calls(), 0);
}

#[tokio::test]
async fn test_deprovision_missing_instance_is_success() {
    let h = harness();
    h.broker
        .deprovision(fixtures::request(STANDARD_PLAN_ID, "svc1"))
        .await
        .unwrap();
    assert_eq!(h.arm.count(Method::Delete, "/service/svc1"), 1);
}

#[tokio::test]
async fn test_deprovision_other_failure_is_provider_error() {
    let h = harness();
    h.arm.respond_once(
        Method::Delete,
        "/service/svc1",
        HttpResponse::new(409, json!({ "message": "locked" })),
    );
    let err = h
        .broker
        .deprovision(fixtures::request(STANDARD_PLAN_ID, "svc1"))
        .await
        .unwrap_err();
    assert_eq!(err, BrokerError::provider(409, "locked"));
}

#[tokio::test]
async fn test_provision_then_poll_until_succeeded() {
    let h = harness();
    let (_, result) = h
        .broker
        .provision(fixtures::request(STANDARD_PLAN_ID, "svc1"))
        .await
        .unwrap();

    let mut poll = fixtures::request(STANDARD_PLAN_ID, "ignored-space");
    poll.last_operation = Some("provision".into());
    poll.provisioning_result = Some(result.to_payload());

    let outcome = h.broker.poll(poll.clone()).await.unwrap();
    assert_eq!(outcome.last_operation, LastOperation::Provision);
    assert_eq!(outcome.reply.state, BrokerStatus::InProgress);
    assert_eq!(outcome.reply.description, "Provisioning is in progress (Activating)");
    assert_eq!(outcome.result, result);

    assert!(h.arm.set_provisioning_state("svc1", "Succeeded"));
    let outcome = h.broker.poll(poll).await.unwrap();
    assert_eq!(outcome.reply.state, BrokerStatus::Succeeded);
}

#[tokio::test]
async fn test_payload_round_trip_targets_same_instance() {
    let h = harness();
    let mut provision = fixtures::request(STANDARD_PLAN_ID, "space-1");
    provision.parameters.resource_group = Some("custom-rg".into());
    provision.parameters.instance = Some(json!({ "name": "gateway" }));
    let (_, result) = h.broker.provision(provision).await.unwrap();

    let mut deprovision = fixtures::request(STANDARD_PLAN_ID, "space-1");
    deprovision.provisioning_result = Some(result.to_payload());
    h.broker.deprovision(deprovision).await.unwrap();

    assert_eq!(
        h.arm.count(Method::Delete, "/resourceGroups/custom-rg/providers/Microsoft.ApiManagement/service/gateway"),
        1
    );
}

#[tokio::test]
async fn test_poll_deprovision_states() {
    let h = harness();
    h.arm.seed_instance(
        fixtures::SUBSCRIPTION_ID,
        fixtures::DEFAULT_RESOURCE_GROUP,
        "svc1",
        "Terminating",
    );
    let mut poll = fixtures::request(STANDARD_PLAN_ID, "svc1");
    poll.last_operation = Some("deprovision".into());

    let outcome = h.broker.poll(poll.clone()).await.unwrap();
    assert_eq!(outcome.reply.state, BrokerStatus::InProgress);

    h.broker
        .deprovision(fixtures::request(STANDARD_PLAN_ID, "svc1"))
        .await
        .unwrap();
    let outcome = h.broker.poll(poll).await.unwrap();
    assert_eq!(outcome.reply.state, BrokerStatus::Succeeded);
}

#[tokio::test]
async fn test_poll_unknown_operation_fails_before_io() {
    let h = harness();
    for last in [None, Some("update".to_string())] {
        let mut poll = fixtures::request(STANDARD_PLAN_ID, "svc1");
        poll.last_operation = last;
        let err = h.broker.poll(poll).await.unwrap_err();
        assert!(matches!(err, BrokerError::Contract(_)));
        assert!(!err.is_retryable());
    }
    assert_eq!(h.arm.request_count(), 0);
    assert_eq!(h.tokens.calls(), 0);
}

#[tokio::test]
async fn test_poll_unexpected_status_is_provider_error() {
    let h = harness();
    h.arm.respond_once(Method::Get, "/service/svc1", HttpResponse::new(503, Value::Null));
    let mut poll = fixtures::request(STANDARD_PLAN_ID, "svc1");
    poll.last_operation = Some("provision".into());
    let err = h.broker.poll(poll).await.unwrap_err();
    assert_eq!(err.provider_status(), Some(503));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_validation_errors_precede_io() {
    let h = harness();

    let mut bad_sub = fixtures::request(STANDARD_PLAN_ID, "svc1");
    bad_sub.azure.subscription_id.clear();
    assert!(matches!(
        h.broker.provision(bad_sub).await.unwrap_err(),
        BrokerError::Validation(_)
    ));

    let unknown_plan = fixtures::request("not-a-plan", "svc1");
    assert_eq!(
        h.broker.deprovision(unknown_plan).await.unwrap_err().http_status(),
        400
    );

    let mut malformed = fixtures::request(STANDARD_PLAN_ID, "svc1");
    malformed.provisioning_result = Some("{oops".into());
    assert!(matches!(
        h.broker.deprovision(malformed).await.unwrap_err(),
        BrokerError::Contract(_)
    ));

    assert_eq!(h.arm.request_count(), 0);
    assert_eq!(h.tokens.calls(), 0);
}

#[tokio::test]
async fn test_token_failure_is_auth_error() {
    let arm = Arc::new(FakeArm::new());
    let broker = ApiManagementBroker::new(
        BrokerConfig::default(),
        arm.clone(),
        Arc::new(StaticTokenProvider::failing("invalid_client")),
    );
    let err = broker
        .provision(fixtures::request(STANDARD_PLAN_ID, "svc1"))
        .await
        .unwrap_err();
    assert_eq!(err, BrokerError::Auth("invalid_client".into()));
    assert_eq!(arm.request_count(), 0);
}

#[tokio::test]
async fn test_concurrent_operations_use_independent_contexts() {
    let h = Arc::new(harness());
    let mut handles = Vec::new();
    for name in ["a1", "a2", "a3", "a4"] {
        let h = Arc::clone(&h);
        handles.push(tokio::spawn(async move {
            h.broker
                .provision(fixtures::request(STANDARD_PLAN_ID, name))
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }
    for name in ["a1", "a2", "a3", "a4"] {
        assert_eq!(h.arm.count(Method::Put, &format!("/service/{}", name)), 1);
    }
}
