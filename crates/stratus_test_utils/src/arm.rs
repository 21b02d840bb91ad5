//! In-memory Azure Resource Manager.
//!
//! Resources are stored by URL. GET/PUT/PATCH/DELETE behave like ARM
//! create-or-update endpoints; `checkNameAvailability` consults the stored
//! instances. Every request is recorded, and one-shot or sticky responses
//! can be scripted per method and URL suffix.

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use stratus_protocol::{BrokerError, HttpRequest, HttpResponse, Method, Transport};
use tracing::debug;

pub const DEFAULT_BASE: &str = "https://management.azure.com";

/// `provisioningState` given to freshly written instances.
pub const CREATED_INSTANCE_STATE: &str = "Activating";

const SERVICE_SEGMENT: &str = "/providers/Microsoft.ApiManagement/service/";

struct Scripted {
    method: Method,
    suffix: String,
    response: HttpResponse,
    sticky: bool,
}

#[derive(Default)]
struct ArmState {
    resources: BTreeMap<String, Value>,
    requests: Vec<HttpRequest>,
    scripted: Vec<Scripted>,
    taken_names: HashSet<String>,
}

#[derive(Default)]
pub struct FakeArm {
    state: Mutex<ArmState>,
}

impl FakeArm {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ArmState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// URL of an API Management instance in the public cloud.
    pub fn instance_url(subscription: &str, resource_group: &str, name: &str) -> String {
        format!(
            "{}/subscriptions/{}/resourceGroups/{}{}{}",
            DEFAULT_BASE, subscription, resource_group, SERVICE_SEGMENT, name
        )
    }

    // ------------------------------------------------------------------------
    // Scripting
    // ------------------------------------------------------------------------

    /// Answer the next matching request with `response`.
    pub fn respond_once(&self, method: Method, url_suffix: &str, response: HttpResponse) {
        self.script(method, url_suffix, response, false);
    }

    /// Answer every matching request with `response`.
    pub fn respond_always(&self, method: Method, url_suffix: &str, response: HttpResponse) {
        self.script(method, url_suffix, response, true);
    }

    fn script(&self, method: Method, url_suffix: &str, response: HttpResponse, sticky: bool) {
        self.lock().scripted.push(Scripted {
            method,
            suffix: url_suffix.to_string(),
            response,
            sticky,
        });
    }

    /// Make `checkNameAvailability` report `name` as taken.
    pub fn take_name(&self, name: &str) {
        self.lock().taken_names.insert(name.to_string());
    }

    pub fn seed(&self, url: &str, document: Value) {
        self.lock().resources.insert(url.to_string(), document);
    }

    pub fn seed_instance(&self, subscription: &str, resource_group: &str, name: &str, state: &str) {
        let url = Self::instance_url(subscription, resource_group, name);
        let document = instance_document(name, Value::Null, state);
        self.seed(&url, document);
    }

    /// Set `provisioningState` on every stored instance called `name`.
    pub fn set_provisioning_state(&self, name: &str, state: &str) -> bool {
        let suffix = format!("{}{}", SERVICE_SEGMENT, name);
        let mut guard = self.lock();
        let mut found = false;
        for (url, doc) in guard.resources.iter_mut() {
            if url.ends_with(&suffix) {
                doc["properties"]["provisioningState"] = Value::String(state.to_string());
                found = true;
            }
        }
        found
    }

    // ------------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------------

    pub fn resource(&self, url: &str) -> Option<Value> {
        self.lock().resources.get(url).cloned()
    }

    /// Stored resource whose URL ends with `suffix`.
    pub fn find(&self, suffix: &str) -> Option<Value> {
        self.lock()
            .resources
            .iter()
            .find(|(url, _)| url.ends_with(suffix))
            .map(|(_, doc)| doc.clone())
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.lock().requests.clone()
    }

    pub fn request_count(&self) -> usize {
        self.lock().requests.len()
    }

    /// Recorded requests with `method` whose URL ends with `url_suffix`.
    pub fn count(&self, method: Method, url_suffix: &str) -> usize {
        self.lock()
            .requests
            .iter()
            .filter(|r| r.method == method && r.url.ends_with(url_suffix))
            .count()
    }

    /// Recorded requests with `method` whose URL contains `fragment`.
    pub fn count_containing(&self, method: Method, fragment: &str) -> usize {
        self.lock()
            .requests
            .iter()
            .filter(|r| r.method == method && r.url.contains(fragment))
            .count()
    }

    pub fn clear_requests(&self) {
        self.lock().requests.clear();
    }

    // ------------------------------------------------------------------------
    // Behaviour
    // ------------------------------------------------------------------------

    fn handle(state: &mut ArmState, request: &HttpRequest) -> HttpResponse {
        if let Some(index) = state
            .scripted
            .iter()
            .position(|s| s.method == request.method && request.url.ends_with(&s.suffix))
        {
            let response = state.scripted[index].response.clone();
            if !state.scripted[index].sticky {
                state.scripted.remove(index);
            }
            return response;
        }

        let url = request.url.as_str();
        match request.method {
            Method::Post if url.ends_with("/checkNameAvailability") => {
                let name = request
                    .json_body
                    .as_ref()
                    .and_then(|b| b.get("name"))
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                let suffix = format!("{}{}", SERVICE_SEGMENT, name);
                let taken = state.taken_names.contains(name)
                    || state.resources.keys().any(|u| u.ends_with(&suffix));
                if taken {
                    HttpResponse::new(
                        200,
                        json!({
                            "nameAvailable": false,
                            "reason": "AlreadyExists",
                            "message": format!("{} is already in use.", name),
                        }),
                    )
                } else {
                    HttpResponse::new(200, json!({ "nameAvailable": true }))
                }
            }
            Method::Get => match state.resources.get(url) {
                Some(doc) => HttpResponse::new(200, doc.clone()),
                None => not_found(url),
            },
            Method::Put => {
                let existed = state.resources.contains_key(url);
                let body = request.json_body.clone().unwrap_or_else(|| json!({}));
                let stored = match instance_name(url) {
                    Some(name) => {
                        let prior_state = state
                            .resources
                            .get(url)
                            .and_then(|d| d["properties"]["provisioningState"].as_str())
                            .map(str::to_string);
                        instance_document(
                            name,
                            body,
                            prior_state.as_deref().unwrap_or(CREATED_INSTANCE_STATE),
                        )
                    }
                    None => body,
                };
                state.resources.insert(url.to_string(), stored.clone());
                HttpResponse::new(if existed { 200 } else { 201 }, stored)
            }
            Method::Patch => match state.resources.get_mut(url) {
                Some(doc) => {
                    if let (Some(target), Some(Value::Object(patch))) =
                        (doc.as_object_mut(), request.json_body.as_ref())
                    {
                        for (key, value) in patch {
                            target.insert(key.clone(), value.clone());
                        }
                    }
                    HttpResponse::new(200, doc.clone())
                }
                None => not_found(url),
            },
            Method::Delete => match state.resources.remove(url) {
                Some(_) => HttpResponse::new(200, Value::Null),
                None => not_found(url),
            },
            Method::Post => not_found(url),
        }
    }
}

#[async_trait]
impl Transport for FakeArm {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, BrokerError> {
        let mut state = self.lock();
        let response = Self::handle(&mut state, &request);
        debug!(method = %request.method, url = %request.url, status = response.status, "fake arm");
        state.requests.push(request);
        Ok(response)
    }
}

fn not_found(url: &str) -> HttpResponse {
    HttpResponse::new(
        404,
        json!({
            "error": {
                "code": "ResourceNotFound",
                "message": format!("The resource '{}' was not found.", url),
            }
        }),
    )
}

/// Instance name when `url` addresses an instance itself (not a child).
fn instance_name(url: &str) -> Option<&str> {
    let (_, rest) = url.split_once(SERVICE_SEGMENT)?;
    (!rest.is_empty() && !rest.contains('/')).then_some(rest)
}

/// Instance document as ARM returns it: caller fields plus generated
/// endpoints and a provisioning state.
fn instance_document(name: &str, body: Value, state: &str) -> Value {
    let mut doc = match body {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    doc.insert("name".to_string(), Value::String(name.to_string()));
    let properties = doc
        .entry("properties")
        .or_insert_with(|| json!({}));
    if let Some(props) = properties.as_object_mut() {
        props.insert("provisioningState".to_string(), Value::String(state.to_string()));
        props
            .entry("portalUrl")
            .or_insert_with(|| Value::String(format!("https://{}.portal.azure-api.net", name)));
        props
            .entry("runtimeUrl")
            .or_insert_with(|| Value::String(format!("https://{}.azure-api.net", name)));
    }
    Value::Object(doc)
}
