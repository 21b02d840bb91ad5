//! Service catalog and plans.
//!
//! The catalog is immutable once built. Plans are looked up by id through a
//! read-only map built at construction time.

use crate::defaults::{EXISTING_PLAN_NAME, SERVICE_NAME};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A catalog plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub free: bool,
}

/// Whether the broker manages the backing resource for a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanKind {
    /// Broker creates and deletes the instance
    Managed,
    /// Instance was provisioned outside the broker; create/delete are no-ops
    Existing,
}

impl Plan {
    pub fn kind(&self) -> PlanKind {
        if self.name == EXISTING_PLAN_NAME {
            PlanKind::Existing
        } else {
            PlanKind::Managed
        }
    }

    pub fn is_existing(&self) -> bool {
        self.kind() == PlanKind::Existing
    }
}

/// Wire shape of the catalog document.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CatalogDocument {
    id: String,
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default = "default_bindable")]
    bindable: bool,
    #[serde(default)]
    tags: Vec<String>,
    plans: Vec<Plan>,
}

fn default_bindable() -> bool {
    true
}

/// Immutable service catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "CatalogDocument", into = "CatalogDocument")]
pub struct ServiceCatalog {
    pub id: String,
    pub name: String,
    pub description: String,
    pub bindable: bool,
    pub tags: Vec<String>,
    plans: Vec<Plan>,
    by_id: HashMap<String, usize>,
}

impl From<CatalogDocument> for ServiceCatalog {
    fn from(doc: CatalogDocument) -> Self {
        let by_id = doc
            .plans
            .iter()
            .enumerate()
            .map(|(idx, plan)| (plan.id.clone(), idx))
            .collect();
        Self {
            id: doc.id,
            name: doc.name,
            description: doc.description,
            bindable: doc.bindable,
            tags: doc.tags,
            plans: doc.plans,
            by_id,
        }
    }
}

impl From<ServiceCatalog> for CatalogDocument {
    fn from(catalog: ServiceCatalog) -> Self {
        Self {
            id: catalog.id,
            name: catalog.name,
            description: catalog.description,
            bindable: catalog.bindable,
            tags: catalog.tags,
            plans: catalog.plans,
        }
    }
}

impl ServiceCatalog {
    pub fn new(id: &str, name: &str, description: &str, plans: Vec<Plan>) -> Self {
        CatalogDocument {
            id: id.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            bindable: true,
            tags: Vec::new(),
            plans,
        }
        .into()
    }

    /// Find a plan by id.
    pub fn plan(&self, plan_id: &str) -> Option<&Plan> {
        self.by_id.get(plan_id).map(|idx| &self.plans[*idx])
    }

    pub fn plans(&self) -> &[Plan] {
        &self.plans
    }

    /// Catalog document served to the broker adapter.
    pub fn document(&self) -> serde_json::Value {
        serde_json::to_value(CatalogDocument::from(self.clone())).unwrap_or_default()
    }
}

impl Default for ServiceCatalog {
    /// The built-in API Management catalog.
    fn default() -> Self {
        let plan = |id: &str, name: &str, description: &str| Plan {
            id: id.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            free: false,
        };
        let mut catalog = Self::new(
            "fa7ca3a5-1b1e-4c53-9b48-4a1a2e4e9d7b",
            SERVICE_NAME,
            "Azure API Management Service",
            vec![
                plan(
                    "8b0c5e0d-67c5-4b2e-9fd0-54c1e2d3c001",
                    "Developer",
                    "Developer tier, no SLA",
                ),
                plan(
                    "8b0c5e0d-67c5-4b2e-9fd0-54c1e2d3c002",
                    "Standard",
                    "Standard tier",
                ),
                plan(
                    "8b0c5e0d-67c5-4b2e-9fd0-54c1e2d3c003",
                    "Premium",
                    "Premium tier, multi-region",
                ),
                plan(
                    "8b0c5e0d-67c5-4b2e-9fd0-54c1e2d3c004",
                    EXISTING_PLAN_NAME,
                    "Register an API Management instance provisioned outside the broker",
                ),
            ],
        );
        catalog.tags = vec!["Azure".to_string(), "API Management".to_string()];
        catalog
    }
}
