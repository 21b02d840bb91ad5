//! Canonical default values shared by the broker core and its adapters.

/// Plan name reserved for instances this broker did not create.
pub const EXISTING_PLAN_NAME: &str = "Existing";

/// Resource group used when neither the payload, the parameters nor the
/// credentials name one.
pub const DEFAULT_RESOURCE_GROUP: &str = "CloudFoundryServiceBroker";

/// SKU requested when the plan is "Existing" and an instance document has to
/// be synthesized anyway.
pub const DEFAULT_EXISTING_SKU: &str = "Developer";

pub const DEFAULT_PUBLISHER_EMAIL: &str = "bit-bucket@test.smtp.org";
pub const DEFAULT_LOCATION: &str = "westus";

/// Service name used as the prefix of generated Azure instance ids.
pub const SERVICE_NAME: &str = "azure-apimanagement";

/// Tag merged into every resource the broker writes.
pub const USER_AGENT_TAG: (&str, &str) = ("user-agent", "stratus");

pub const PUBLISHED_PRODUCT_STATE: &str = "published";

/// HTTP methods registered as API operations on bind.
pub const API_OPERATION_METHODS: [&str; 8] = [
    "GET", "POST", "PUT", "DELETE", "HEAD", "OPTIONS", "PATCH", "TRACE",
];

pub const API_OPERATION_URL_TEMPLATE: &str = "/*";

pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;
