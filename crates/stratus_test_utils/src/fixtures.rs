//! Request fixtures matching the built-in catalog.

use stratus_protocol::{AzureCredentials, BindResource, BrokerRequest};

pub const DEVELOPER_PLAN_ID: &str = "8b0c5e0d-67c5-4b2e-9fd0-54c1e2d3c001";
pub const STANDARD_PLAN_ID: &str = "8b0c5e0d-67c5-4b2e-9fd0-54c1e2d3c002";
pub const EXISTING_PLAN_ID: &str = "8b0c5e0d-67c5-4b2e-9fd0-54c1e2d3c004";

pub const SUBSCRIPTION_ID: &str = "00000000-0000-0000-0000-00000000beef";
pub const DEFAULT_RESOURCE_GROUP: &str = "CloudFoundryServiceBroker";

pub fn credentials() -> AzureCredentials {
    AzureCredentials {
        environment: "AzureCloud".to_string(),
        subscription_id: SUBSCRIPTION_ID.to_string(),
        tenant_id: "tenant".to_string(),
        client_id: "client".to_string(),
        client_secret: "secret".to_string(),
        default_resource_group: None,
        default_location: None,
    }
}

/// Request for instance `space_guid` on `plan_id`.
pub fn request(plan_id: &str, space_guid: &str) -> BrokerRequest {
    BrokerRequest {
        instance_id: format!("cf-{}", space_guid),
        plan_id: plan_id.to_string(),
        space_guid: Some(space_guid.to_string()),
        organization_guid: Some("org-1".to_string()),
        azure: credentials(),
        ..Default::default()
    }
}

/// Bind request for `route` against instance `space_guid`.
pub fn bind_request(plan_id: &str, space_guid: &str, route: &str) -> BrokerRequest {
    BrokerRequest {
        bind_resource: Some(BindResource {
            route: Some(route.to_string()),
            app_guid: None,
        }),
        ..request(plan_id, space_guid)
    }
}

pub fn instance_url(name: &str) -> String {
    crate::FakeArm::instance_url(SUBSCRIPTION_ID, DEFAULT_RESOURCE_GROUP, name)
}
