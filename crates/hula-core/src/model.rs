//! Catalog model and provisioning handles.
//!
//! A [`Catalog`] is decoded once from a broker's catalog response and never
//! mutated afterwards. It owns its services, and each [`Service`] owns its
//! plans. Every plan's `service_id` is re-stamped with the owning service's id
//! at construction, whatever the broker sent.

use serde::{Deserialize, Serialize};

use crate::error::{BrokerError, Result};

/// Arbitrary credentials returned by a bind call.
pub type Credentials = serde_json::Map<String, serde_json::Value>;

/// A purchasable tier of a service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    id: String,
    name: String,
    description: String,
    service_id: String,
}

impl Plan {
    /// Create a plan belonging to `service_id`.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        service_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: description.into(),
            service_id: service_id.into(),
        }
    }

    /// The broker's plan id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The plan name as shown in the catalog.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Human-readable description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Id of the service this plan belongs to.
    #[must_use]
    pub fn service_id(&self) -> &str {
        &self.service_id
    }
}

/// A service advertised in the broker catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "ServiceDocument", into = "ServiceDocument")]
pub struct Service {
    id: String,
    name: String,
    description: String,
    bindable: bool,
    plans: Vec<Plan>,
}

impl Service {
    /// Create a service, taking ownership of its plans.
    ///
    /// Each plan's `service_id` is overwritten with `id`.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        bindable: bool,
        plans: impl IntoIterator<Item = Plan>,
    ) -> Self {
        let id = id.into();
        let plans = plans
            .into_iter()
            .map(|plan| Plan {
                service_id: id.clone(),
                ..plan
            })
            .collect();

        Self {
            id,
            name: name.into(),
            description: description.into(),
            bindable,
            plans,
        }
    }

    /// The broker's service id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The service name as shown in the catalog.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Human-readable description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Whether instances of this service can be bound.
    #[must_use]
    pub const fn bindable(&self) -> bool {
        self.bindable
    }

    /// Plans in catalog order.
    #[must_use]
    pub fn plans(&self) -> &[Plan] {
        &self.plans
    }

    /// Names of all plans in catalog order.
    #[must_use]
    pub fn plan_names(&self) -> Vec<String> {
        self.plans.iter().map(|p| p.name.clone()).collect()
    }

    /// Find the first plan named `plan_name`.
    ///
    /// # Errors
    ///
    /// Returns `BrokerError::PlanNotFound` listing every plan name of this service.
    pub fn plan(&self, plan_name: &str) -> Result<&Plan> {
        self.plans
            .iter()
            .find(|p| p.name == plan_name)
            .ok_or_else(|| BrokerError::PlanNotFound {
                service: self.name.clone(),
                name: plan_name.to_string(),
                known: self.plan_names(),
            })
    }
}

/// The wire shape of a catalog service entry.
#[derive(Serialize, Deserialize)]
struct ServiceDocument {
    id: String,
    name: String,
    description: String,
    bindable: bool,
    plans: Vec<PlanDocument>,
}

/// The wire shape of a catalog plan entry; it carries no service id.
#[derive(Serialize, Deserialize)]
struct PlanDocument {
    id: String,
    name: String,
    description: String,
}

impl From<ServiceDocument> for Service {
    fn from(doc: ServiceDocument) -> Self {
        let plans: Vec<Plan> = doc
            .plans
            .into_iter()
            .map(|p| Plan::new(p.id, p.name, p.description, doc.id.as_str()))
            .collect();
        Self::new(doc.id, doc.name, doc.description, doc.bindable, plans)
    }
}

impl From<Service> for ServiceDocument {
    fn from(service: Service) -> Self {
        Self {
            id: service.id,
            name: service.name,
            description: service.description,
            bindable: service.bindable,
            plans: service
                .plans
                .into_iter()
                .map(|p| PlanDocument {
                    id: p.id,
                    name: p.name,
                    description: p.description,
                })
                .collect(),
        }
    }
}

/// The broker's advertised services.
///
/// Names are not required to be unique; lookups return the first match.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Catalog {
    services: Vec<Service>,
}

impl Catalog {
    /// Create a catalog from services in broker order.
    #[must_use]
    pub fn new(services: Vec<Service>) -> Self {
        Self { services }
    }

    /// Services in catalog order.
    #[must_use]
    pub fn services(&self) -> &[Service] {
        &self.services
    }

    /// Names of all services in catalog order.
    #[must_use]
    pub fn service_names(&self) -> Vec<String> {
        self.services.iter().map(|s| s.name.clone()).collect()
    }

    /// Find the first service named `service_name`.
    ///
    /// # Errors
    ///
    /// Returns `BrokerError::ServiceNotFound` listing every known service name.
    pub fn service(&self, service_name: &str) -> Result<&Service> {
        self.services
            .iter()
            .find(|s| s.name == service_name)
            .ok_or_else(|| BrokerError::ServiceNotFound {
                name: service_name.to_string(),
                known: self.service_names(),
            })
    }

    /// Resolve a plan by service and plan name.
    ///
    /// # Errors
    ///
    /// Returns `BrokerError::ServiceNotFound` or `BrokerError::PlanNotFound`.
    pub fn service_plan(&self, service_name: &str, plan_name: &str) -> Result<&Plan> {
        self.service(service_name)?.plan(plan_name)
    }
}

/// A provisioned instance at the broker. Identity is the id alone.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServiceInstance {
    id: String,
}

impl ServiceInstance {
    /// Wrap an instance id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    /// The instance id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }
}

/// A live binding to a service instance.
///
/// The binding refers to its instance but does not own the instance's lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceBinding {
    id: String,
    credentials: Credentials,
    service_instance: ServiceInstance,
}

impl InstanceBinding {
    /// Create a binding handle.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        credentials: Credentials,
        service_instance: ServiceInstance,
    ) -> Self {
        Self {
            id: id.into(),
            credentials,
            service_instance,
        }
    }

    /// The binding id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Credentials returned by the broker.
    #[must_use]
    pub const fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// The bound instance.
    #[must_use]
    pub const fn service_instance(&self) -> &ServiceInstance {
        &self.service_instance
    }
}
