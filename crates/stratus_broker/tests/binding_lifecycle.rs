//! Bind / unbind against the in-memory resource manager.

use serde_json::json;
use std::sync::Arc;
use stratus_broker::{ApiManagementBroker, BrokerConfig};
use stratus_protocol::{BindingResult, BrokerError, HttpResponse, Method};
use stratus_test_utils::fixtures::{self, EXISTING_PLAN_ID, STANDARD_PLAN_ID};
use stratus_test_utils::{FakeArm, StaticTokenProvider};

const ROUTE: &str = "orders.shop.example.com";

fn broker(arm: &Arc<FakeArm>, config: BrokerConfig) -> ApiManagementBroker {
    ApiManagementBroker::new(config, arm.clone(), Arc::new(StaticTokenProvider::new("tok")))
}

fn seeded_arm() -> Arc<FakeArm> {
    let arm = Arc::new(FakeArm::new());
    arm.seed_instance(
        fixtures::SUBSCRIPTION_ID,
        fixtures::DEFAULT_RESOURCE_GROUP,
        "svc1",
        "Succeeded",
    );
    arm
}

#[tokio::test]
async fn test_bind_registers_api_product_and_operations() {
    let arm = seeded_arm();
    let broker = broker(&arm, BrokerConfig::default());

    let (reply, result) = broker
        .bind(fixtures::bind_request(STANDARD_PLAN_ID, "svc1", ROUTE))
        .await
        .unwrap();

    assert_eq!(reply.route_service_url, "https://svc1.azure-api.net/orders");
    assert_eq!(result, BindingResult::new("shop.example.com", "orders"));

    let instance = fixtures::instance_url("svc1");
    let product = arm
        .resource(&format!("{}/products/shop.example.com", instance))
        .unwrap();
    assert_eq!(product["state"], "published");
    assert_eq!(product["subscriptionRequired"], false);

    let api = arm.resource(&format!("{}/apis/orders", instance)).unwrap();
    assert_eq!(api["serviceUrl"], "https://orders.shop.example.com");
    assert!(arm
        .resource(&format!("{}/products/shop.example.com/apis/orders", instance))
        .is_some());

    assert_eq!(arm.count_containing(Method::Put, "/apis/orders/operations/"), 8);
    for method in ["GET", "POST", "PUT", "DELETE", "HEAD", "OPTIONS", "PATCH", "TRACE"] {
        assert_eq!(
            arm.count_containing(Method::Put, &format!("/operations/{}-", method)),
            1,
            "missing operation for {}",
            method
        );
    }
}

#[tokio::test]
async fn test_bind_step_order() {
    let arm = seeded_arm();
    let broker = broker(&arm, BrokerConfig::default());
    broker
        .bind(fixtures::bind_request(STANDARD_PLAN_ID, "svc1", ROUTE))
        .await
        .unwrap();

    let calls: Vec<(Method, String)> = arm
        .requests()
        .into_iter()
        .map(|r| {
            let tail = r.url.rsplit("/service/svc1").next().unwrap_or_default().to_string();
            (r.method, tail)
        })
        .collect();

    assert_eq!(calls[0], (Method::Get, "/products/shop.example.com".to_string()));
    assert_eq!(calls[1], (Method::Put, "/products/shop.example.com".to_string()));
    assert_eq!(calls[2], (Method::Get, "/apis/orders".to_string()));
    assert_eq!(calls[3], (Method::Put, "/apis/orders".to_string()));
    assert_eq!(
        calls[4],
        (Method::Put, "/products/shop.example.com/apis/orders".to_string())
    );
    assert_eq!(calls[5], (Method::Patch, "/products/shop.example.com".to_string()));
    assert!(calls[6..14].iter().all(|(m, tail)| *m == Method::Put && tail.contains("/operations/")));
    assert_eq!(calls[14], (Method::Get, String::new()));
    assert_eq!(calls.len(), 15);
}

#[tokio::test]
async fn test_bind_reuses_existing_product() {
    let arm = seeded_arm();
    let product_url = format!("{}/products/shop.example.com", fixtures::instance_url("svc1"));
    arm.seed(&product_url, json!({ "name": "shop.example.com", "terms": "keep me" }));
    let broker = broker(&arm, BrokerConfig::default());

    broker
        .bind(fixtures::bind_request(STANDARD_PLAN_ID, "svc1", ROUTE))
        .await
        .unwrap();

    assert_eq!(arm.count(Method::Put, "/products/shop.example.com"), 0);
    let product = arm.resource(&product_url).unwrap();
    assert_eq!(product["terms"], "keep me");
    assert_eq!(product["state"], "published");
}

#[tokio::test]
async fn test_bind_existing_api_is_conflict() {
    let arm = seeded_arm();
    arm.seed(
        &format!("{}/apis/orders", fixtures::instance_url("svc1")),
        json!({ "name": "orders" }),
    );
    let broker = broker(&arm, BrokerConfig::default());

    let err = broker
        .bind(fixtures::bind_request(STANDARD_PLAN_ID, "svc1", ROUTE))
        .await
        .unwrap_err();
    assert_eq!(err, BrokerError::Conflict("API already exists".into()));
    assert_eq!(arm.count(Method::Put, "/apis/orders"), 0);
}

#[tokio::test]
async fn test_bind_existing_plan_requires_product() {
    let arm = seeded_arm();
    let broker = broker(&arm, BrokerConfig::default());
    let err = broker
        .bind(fixtures::bind_request(EXISTING_PLAN_ID, "svc1", ROUTE))
        .await
        .unwrap_err();
    assert!(matches!(err, BrokerError::NotFound(_)));
    assert_eq!(arm.count(Method::Put, ""), 0);
}

#[tokio::test]
async fn test_bind_product_creation_failure_aborts() {
    let arm = seeded_arm();
    arm.respond_once(
        Method::Put,
        "/products/shop.example.com",
        HttpResponse::new(400, json!({ "message": "bad product" })),
    );
    let broker = broker(&arm, BrokerConfig::default());

    let err = broker
        .bind(fixtures::bind_request(STANDARD_PLAN_ID, "svc1", ROUTE))
        .await
        .unwrap_err();
    assert_eq!(err, BrokerError::provider(400, "bad product"));
    assert_eq!(arm.count(Method::Get, "/apis/orders"), 0);
}

#[tokio::test]
async fn test_bind_operation_failure_stops_batch() {
    let arm = seeded_arm();
    arm.respond_once(
        Method::Put,
        "/operations/post",
        HttpResponse::new(500, json!({ "message": "throttled backend" })),
    );
    let broker = broker(&arm, BrokerConfig::default());

    let mut request = fixtures::bind_request(STANDARD_PLAN_ID, "svc1", ROUTE);
    request.binding_parameters.operations = Some(vec![
        json!({ "id": "/apis/orders/operations/get", "method": "GET", "urlTemplate": "/*" }),
        json!({ "id": "/apis/orders/operations/post", "method": "POST", "urlTemplate": "/*" }),
        json!({ "id": "/apis/orders/operations/put", "method": "PUT", "urlTemplate": "/*" }),
    ]);

    let err = broker.bind(request).await.unwrap_err();
    assert_eq!(err, BrokerError::provider(500, "throttled backend"));
    assert_eq!(arm.count(Method::Put, "/operations/get"), 1);
    assert_eq!(arm.count(Method::Put, "/operations/put"), 0);
    assert_eq!(arm.count(Method::Get, "/service/svc1"), 0);
}

#[tokio::test]
async fn test_bind_without_route_is_validation_error() {
    let arm = seeded_arm();
    let broker = broker(&arm, BrokerConfig::default());
    let err = broker
        .bind(fixtures::request(STANDARD_PLAN_ID, "svc1"))
        .await
        .unwrap_err();
    assert!(matches!(err, BrokerError::Validation(_)));
    assert_eq!(arm.request_count(), 0);
}

#[tokio::test]
async fn test_unbind_deletes_api_from_payload() {
    let arm = seeded_arm();
    let broker = broker(&arm, BrokerConfig::default());
    let (_, result) = broker
        .bind(fixtures::bind_request(STANDARD_PLAN_ID, "svc1", ROUTE))
        .await
        .unwrap();

    let mut unbind = fixtures::request(STANDARD_PLAN_ID, "svc1");
    unbind.binding_result = Some(result.to_payload());
    broker.unbind(unbind).await.unwrap();

    assert_eq!(arm.count(Method::Delete, "/service/svc1/apis/orders"), 1);
    assert!(arm
        .resource(&format!("{}/apis/orders", fixtures::instance_url("svc1")))
        .is_none());
}

#[tokio::test]
async fn test_unbind_missing_api_is_provider_error_by_default() {
    let arm = seeded_arm();
    let broker = broker(&arm, BrokerConfig::default());
    let err = broker
        .unbind(fixtures::bind_request(STANDARD_PLAN_ID, "svc1", ROUTE))
        .await
        .unwrap_err();
    assert_eq!(err.provider_status(), Some(404));
}

#[tokio::test]
async fn test_unbind_missing_api_tolerated_when_configured() {
    let arm = seeded_arm();
    let config = BrokerConfig {
        unbind_tolerates_missing_api: true,
        ..BrokerConfig::default()
    };
    let broker = broker(&arm, config);
    broker
        .unbind(fixtures::bind_request(STANDARD_PLAN_ID, "svc1", ROUTE))
        .await
        .unwrap();
}
