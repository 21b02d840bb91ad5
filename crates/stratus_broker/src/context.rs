//! Per-operation context.
//!
//! An [`OperationContext`] is derived once from the inbound request and the
//! broker configuration, then moved through the steps of one pipeline run.
//! Derivation performs no I/O; every validation failure surfaces before the
//! first provider call.

use crate::config::BrokerConfig;
use serde_json::{json, Map, Value};
use stratus_protocol::defaults::{
    API_OPERATION_METHODS, API_OPERATION_URL_TEMPLATE, USER_AGENT_TAG,
};
use stratus_protocol::{
    ApiVersions, AzureEnvironment, BindingResult, BrokerError, BrokerRequest, HttpResponse, Plan,
    PlanKind, PollReply, ProvisioningResult,
};

/// Where the broker's resource manager calls go.
#[derive(Debug, Clone)]
pub struct AzureTarget {
    pub environment: &'static AzureEnvironment,
    /// Resource manager base URL without a trailing slash
    pub endpoint: &'static str,
    pub subscription_id: String,
    pub resource_group: String,
    pub location: String,
    pub api_versions: ApiVersions,
}

/// A named resource and the document sent when writing it.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceDescriptor {
    /// Bare resource name used in URLs
    pub name: String,
    pub document: Value,
}

impl ResourceDescriptor {
    /// Replace the document with a captured provider response, keeping the
    /// name. Non-object bodies are ignored.
    pub fn capture(&mut self, body: &Value) {
        if body.is_object() {
            self.document = body.clone();
        }
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.document
            .get("properties")
            .and_then(|p| p.get(key))
            .or_else(|| self.document.get(key))
            .and_then(Value::as_str)
    }
}

/// One API operation to register. `path` is relative to the instance URL.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationDescriptor {
    pub path: String,
    pub document: Value,
}

/// Mutable state of one broker operation.
#[derive(Debug)]
pub struct OperationContext {
    pub request: BrokerRequest,
    pub plan: Plan,
    pub azure: AzureTarget,
    pub instance: ResourceDescriptor,
    pub product: Option<ResourceDescriptor>,
    pub api: Option<ResourceDescriptor>,
    pub operations: Vec<OperationDescriptor>,
    /// Bearer token, set by the token step
    pub token: Option<String>,
    /// Most recent provider response
    pub last_response: Option<HttpResponse>,
    /// Body of the most recent response that passed a success check
    pub result: Option<Value>,
    pub poll_reply: Option<PollReply>,
}

impl OperationContext {
    /// Derive the context for `request`.
    ///
    /// Fails with a validation error when the plan, environment,
    /// subscription or instance name cannot be resolved, and with a contract
    /// error when a replayed payload is malformed.
    pub fn derive(request: BrokerRequest, config: &BrokerConfig) -> Result<Self, BrokerError> {
        let plan = config
            .catalog
            .plan(&request.plan_id)
            .cloned()
            .ok_or_else(|| BrokerError::Validation(format!("unknown plan id: {:?}", request.plan_id)))?;

        let environment = AzureEnvironment::lookup(&request.azure.environment).ok_or_else(|| {
            BrokerError::Validation(format!(
                "unknown Azure environment: {:?}",
                request.azure.environment
            ))
        })?;

        if request.azure.subscription_id.trim().is_empty() {
            return Err(BrokerError::Validation(
                "azure.subscriptionId is required".to_string(),
            ));
        }

        let provisioned = ProvisioningResult::parse(request.provisioning_result.as_deref())?;
        let bound = BindingResult::parse(request.binding_result.as_deref())?;

        let resource_group = first_non_empty([
            provisioned.resource_group.as_deref(),
            request.parameters.resource_group.as_deref(),
            request.azure.default_resource_group.as_deref(),
            Some(config.default_resource_group.as_str()),
        ])
        .unwrap_or_default();

        let location = first_non_empty([
            request.parameters.location.as_deref(),
            request.azure.default_location.as_deref(),
            Some(config.default_location.as_str()),
        ])
        .unwrap_or_default();

        let azure = AzureTarget {
            environment,
            endpoint: environment.management_base(),
            subscription_id: request.azure.subscription_id.trim().to_string(),
            resource_group,
            location,
            api_versions: environment.api_versions,
        };

        let instance = derive_instance(&request, &plan, &azure, &provisioned, config)?;
        let (api_name, product_name) = route_names(&request);
        let product = derive_product(&request, bound.product_id.as_deref().or(product_name.as_deref()));
        let api = derive_api(&request, bound.api_id.as_deref().or(api_name.as_deref()));
        let operations = match &api {
            Some(api) => derive_operations(&request, api, chrono::Utc::now().timestamp_millis())?,
            None => Vec::new(),
        };

        Ok(Self {
            request,
            plan,
            azure,
            instance,
            product,
            api,
            operations,
            token: None,
            last_response: None,
            result: None,
            poll_reply: None,
        })
    }

    pub fn plan_kind(&self) -> PlanKind {
        self.plan.kind()
    }

    pub fn product(&self) -> Result<&ResourceDescriptor, BrokerError> {
        self.product.as_ref().ok_or_else(|| {
            BrokerError::Validation("product name could not be derived from the bind route".into())
        })
    }

    pub fn api(&self) -> Result<&ResourceDescriptor, BrokerError> {
        self.api.as_ref().ok_or_else(|| {
            BrokerError::Validation("API name could not be derived from the bind route".into())
        })
    }

    pub fn product_mut(&mut self) -> Result<&mut ResourceDescriptor, BrokerError> {
        self.product.as_mut().ok_or_else(|| {
            BrokerError::Validation("product name could not be derived from the bind route".into())
        })
    }

    /// Payload handed back after provision and poll.
    pub fn provisioning_result(&self) -> ProvisioningResult {
        ProvisioningResult::new(&self.azure.resource_group, &self.instance.name)
    }

    /// Payload handed back after bind.
    pub fn binding_result(&self) -> Result<BindingResult, BrokerError> {
        Ok(BindingResult::new(&self.product()?.name, &self.api()?.name))
    }

    /// Tags written on every resource: caller tags plus broker-owned ones.
    pub fn resource_tags(&self) -> Value {
        merged_tags(&self.request.parameters.tags)
    }
}

fn first_non_empty<'a>(candidates: impl IntoIterator<Item = Option<&'a str>>) -> Option<String> {
    candidates
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

fn merged_tags(caller: &Map<String, Value>) -> Value {
    let mut tags = caller.clone();
    tags.insert(
        USER_AGENT_TAG.0.to_string(),
        Value::String(USER_AGENT_TAG.1.to_string()),
    );
    Value::Object(tags)
}

fn derive_instance(
    request: &BrokerRequest,
    plan: &Plan,
    azure: &AzureTarget,
    provisioned: &ProvisioningResult,
    config: &BrokerConfig,
) -> Result<ResourceDescriptor, BrokerError> {
    let mut document = match &request.parameters.instance {
        Some(Value::Object(doc)) => Value::Object(doc.clone()),
        Some(_) => {
            return Err(BrokerError::Validation(
                "parameters.instance must be an object".to_string(),
            ))
        }
        None => {
            let sku = match plan.kind() {
                PlanKind::Existing => config.existing_plan_sku.clone(),
                PlanKind::Managed => plan.name.clone(),
            };
            json!({
                "location": azure.location,
                "sku": { "name": sku },
                "properties": { "publisherEmail": config.publisher_email },
            })
        }
    };

    let name = first_non_empty([
        document.get("name").and_then(Value::as_str),
        provisioned.instance_name.as_deref(),
        request.space_guid.as_deref(),
    ])
    .ok_or_else(|| {
        BrokerError::Validation(
            "instance name is required (parameters.instance.name or space_guid)".to_string(),
        )
    })?;

    if let Value::Object(doc) = &mut document {
        doc.insert("name".to_string(), Value::String(name.clone()));
        let caller_tags = doc
            .get("tags")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_else(|| request.parameters.tags.clone());
        doc.insert("tags".to_string(), merged_tags(&caller_tags));
    }

    Ok(ResourceDescriptor { name, document })
}

/// Split a bind route `api.product.domain` at its first dot into the API
/// name and the product name.
fn route_names(request: &BrokerRequest) -> (Option<String>, Option<String>) {
    let route = request
        .bind_resource
        .as_ref()
        .and_then(|r| r.route.as_deref())
        .map(str::trim)
        .unwrap_or_default();
    match route.split_once('.') {
        Some((api, product)) if !api.is_empty() && !product.is_empty() => {
            (Some(api.to_string()), Some(product.to_string()))
        }
        _ if !route.is_empty() && !route.contains('.') => (Some(route.to_string()), None),
        _ => (None, None),
    }
}

/// Bare name from a caller document: `name`, or the last segment of `id`.
fn document_name(doc: &Value) -> Option<String> {
    doc.get("name")
        .and_then(Value::as_str)
        .or_else(|| {
            doc.get("id")
                .and_then(Value::as_str)
                .and_then(|id| id.rsplit('/').next())
        })
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn derive_product(request: &BrokerRequest, derived_name: Option<&str>) -> Option<ResourceDescriptor> {
    if let Some(doc) = &request.binding_parameters.product {
        let name = document_name(doc).or_else(|| derived_name.map(str::to_string))?;
        return Some(ResourceDescriptor {
            name,
            document: doc.clone(),
        });
    }
    let name = derived_name.filter(|s| !s.is_empty())?.to_string();
    Some(ResourceDescriptor {
        document: json!({
            "id": format!("/products/{}", name),
            "name": name,
            "description": name,
            "subscriptionRequired": false,
        }),
        name,
    })
}

fn derive_api(request: &BrokerRequest, derived_name: Option<&str>) -> Option<ResourceDescriptor> {
    if let Some(doc) = &request.binding_parameters.api {
        let name = document_name(doc).or_else(|| derived_name.map(str::to_string))?;
        return Some(ResourceDescriptor {
            name,
            document: doc.clone(),
        });
    }
    let name = derived_name.filter(|s| !s.is_empty())?.to_string();
    let route = request
        .bind_resource
        .as_ref()
        .and_then(|r| r.route.clone())
        .unwrap_or_default();
    Some(ResourceDescriptor {
        document: json!({
            "id": format!("/apis/{}", name),
            "name": name,
            "serviceUrl": format!("https://{}", route),
            "path": name,
            "protocols": ["Https"],
            "subscriptionRequired": false,
        }),
        name,
    })
}

fn derive_operations(
    request: &BrokerRequest,
    api: &ResourceDescriptor,
    stamp_millis: i64,
) -> Result<Vec<OperationDescriptor>, BrokerError> {
    if let Some(docs) = &request.binding_parameters.operations {
        return docs
            .iter()
            .map(|doc| -> Result<OperationDescriptor, BrokerError> {
                let id = doc
                    .get("id")
                    .and_then(Value::as_str)
                    .filter(|id| !id.is_empty())
                    .ok_or_else(|| {
                        BrokerError::Validation(
                            "every binding_parameters.operations entry needs an id".to_string(),
                        )
                    })?;
                Ok(OperationDescriptor {
                    path: id.trim_start_matches('/').to_string(),
                    document: doc.clone(),
                })
            })
            .collect();
    }

    Ok(API_OPERATION_METHODS
        .iter()
        .map(|method| {
            let id = format!("/apis/{}/operations/{}-{}", api.name, method, stamp_millis);
            OperationDescriptor {
                path: id.trim_start_matches('/').to_string(),
                document: json!({
                    "id": id,
                    "name": method,
                    "method": method,
                    "urlTemplate": API_OPERATION_URL_TEMPLATE,
                }),
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use stratus_protocol::{AzureCredentials, BindResource};

    const STANDARD: &str = "8b0c5e0d-67c5-4b2e-9fd0-54c1e2d3c002";
    const EXISTING: &str = "8b0c5e0d-67c5-4b2e-9fd0-54c1e2d3c004";

    fn request(plan_id: &str) -> BrokerRequest {
        BrokerRequest {
            instance_id: "inst-1".into(),
            plan_id: plan_id.into(),
            space_guid: Some("space-1".into()),
            azure: AzureCredentials {
                subscription_id: "sub-1".into(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_defaults_when_nothing_supplied() {
        let ctx = OperationContext::derive(request(STANDARD), &BrokerConfig::default()).unwrap();
        assert_eq!(ctx.azure.endpoint, "https://management.azure.com");
        assert_eq!(ctx.azure.resource_group, "CloudFoundryServiceBroker");
        assert_eq!(ctx.azure.location, "westus");
        assert_eq!(ctx.instance.name, "space-1");
        assert_eq!(ctx.instance.document["sku"]["name"], "Standard");
        assert_eq!(ctx.instance.document["tags"]["user-agent"], "stratus");
        assert!(ctx.product.is_none());
        assert!(ctx.operations.is_empty());
    }

    #[test]
    fn test_resource_group_precedence() {
        let config = BrokerConfig::default();
        let mut req = request(STANDARD);
        req.azure.default_resource_group = Some("from-creds".into());
        assert_eq!(
            OperationContext::derive(req.clone(), &config).unwrap().azure.resource_group,
            "from-creds"
        );

        req.parameters.resource_group = Some("from-params".into());
        assert_eq!(
            OperationContext::derive(req.clone(), &config).unwrap().azure.resource_group,
            "from-params"
        );

        req.provisioning_result = Some(r#"{"resourceGroup":"from-payload"}"#.into());
        assert_eq!(
            OperationContext::derive(req, &config).unwrap().azure.resource_group,
            "from-payload"
        );
    }

    #[test]
    fn test_instance_name_precedence() {
        let config = BrokerConfig::default();
        let mut req = request(STANDARD);
        req.parameters.instance = Some(json!({ "name": "explicit", "sku": { "name": "Premium" } }));
        let ctx = OperationContext::derive(req.clone(), &config).unwrap();
        assert_eq!(ctx.instance.name, "explicit");
        assert_eq!(ctx.instance.document["sku"]["name"], "Premium");

        // Caller-supplied instance parameters win over a replayed payload.
        req.provisioning_result = Some(r#"{"instanceName":"replayed"}"#.into());
        let ctx = OperationContext::derive(req.clone(), &config).unwrap();
        assert_eq!(ctx.instance.name, "explicit");
        assert_eq!(ctx.instance.document["name"], "explicit");

        req.parameters.instance = None;
        let ctx = OperationContext::derive(req, &config).unwrap();
        assert_eq!(ctx.instance.name, "replayed");
        assert_eq!(ctx.instance.document["name"], "replayed");
    }

    #[test]
    fn test_existing_plan_uses_configured_sku() {
        let ctx = OperationContext::derive(request(EXISTING), &BrokerConfig::default()).unwrap();
        assert_eq!(ctx.plan_kind(), PlanKind::Existing);
        assert_eq!(ctx.instance.document["sku"]["name"], "Developer");
    }

    #[test]
    fn test_validation_failures() {
        let config = BrokerConfig::default();

        let err = OperationContext::derive(request("nope"), &config).unwrap_err();
        assert!(matches!(err, BrokerError::Validation(_)));

        let mut req = request(STANDARD);
        req.azure.environment = "MarsCloud".into();
        assert!(matches!(
            OperationContext::derive(req, &config).unwrap_err(),
            BrokerError::Validation(_)
        ));

        let mut req = request(STANDARD);
        req.azure.subscription_id = " ".into();
        assert!(matches!(
            OperationContext::derive(req, &config).unwrap_err(),
            BrokerError::Validation(_)
        ));

        let mut req = request(STANDARD);
        req.space_guid = None;
        assert!(matches!(
            OperationContext::derive(req, &config).unwrap_err(),
            BrokerError::Validation(_)
        ));
    }

    #[test]
    fn test_malformed_payload_is_contract_error() {
        let mut req = request(STANDARD);
        req.provisioning_result = Some("{not json".into());
        let err = OperationContext::derive(req, &BrokerConfig::default()).unwrap_err();
        assert!(matches!(err, BrokerError::Contract(_)));
    }

    #[test]
    fn test_route_derives_product_api_and_operations() {
        let mut req = request(STANDARD);
        req.bind_resource = Some(BindResource {
            route: Some("orders.shop.example.com".into()),
            app_guid: None,
        });
        let ctx = OperationContext::derive(req, &BrokerConfig::default()).unwrap();

        let product = ctx.product().unwrap();
        assert_eq!(product.name, "shop.example.com");
        assert_eq!(product.document["subscriptionRequired"], false);

        let api = ctx.api().unwrap();
        assert_eq!(api.name, "orders");
        assert_eq!(api.document["serviceUrl"], "https://orders.shop.example.com");
        assert_eq!(api.document["path"], "orders");
        assert_eq!(api.document["protocols"], json!(["Https"]));

        assert_eq!(ctx.operations.len(), 8);
        let first = &ctx.operations[0];
        assert!(first.path.starts_with("apis/orders/operations/GET-"));
        assert_eq!(first.document["urlTemplate"], "/*");
        assert_eq!(ctx.operations[7].document["method"], "TRACE");

        let result = ctx.binding_result().unwrap();
        assert_eq!(result.product_id.as_deref(), Some("shop.example.com"));
        assert_eq!(result.api_id.as_deref(), Some("orders"));
    }

    #[test]
    fn test_binding_payload_overrides_route() {
        let mut req = request(STANDARD);
        req.binding_result = Some(r#"{"productId":"p1","apiId":"a1"}"#.into());
        let ctx = OperationContext::derive(req, &BrokerConfig::default()).unwrap();
        assert_eq!(ctx.product().unwrap().name, "p1");
        assert_eq!(ctx.api().unwrap().name, "a1");
    }

    #[test]
    fn test_caller_documents_override_derived() {
        let mut req = request(STANDARD);
        req.bind_resource = Some(BindResource {
            route: Some("orders.shop".into()),
            app_guid: None,
        });
        req.binding_parameters.api = Some(json!({ "id": "/apis/custom", "path": "v2" }));
        req.binding_parameters.operations =
            Some(vec![json!({ "id": "/apis/custom/operations/only-get", "method": "GET" })]);
        let ctx = OperationContext::derive(req, &BrokerConfig::default()).unwrap();

        assert_eq!(ctx.api().unwrap().name, "custom");
        assert_eq!(ctx.api().unwrap().document["path"], "v2");
        assert_eq!(ctx.operations.len(), 1);
        assert_eq!(ctx.operations[0].path, "apis/custom/operations/only-get");
    }

    #[test]
    fn test_caller_tags_merged_with_broker_tag() {
        let mut req = request(STANDARD);
        req.parameters
            .tags
            .insert("team".into(), Value::String("payments".into()));
        let ctx = OperationContext::derive(req, &BrokerConfig::default()).unwrap();
        let tags = ctx.resource_tags();
        assert_eq!(tags["team"], "payments");
        assert_eq!(tags["user-agent"], "stratus");
        assert_eq!(ctx.instance.document["tags"]["team"], "payments");
    }
}
