//! Core types for the hula service broker client.
//!
//! This crate provides the foundational types shared by the broker client and CLI:
//!
//! - **Catalog model**: `Catalog`, `Service` and `Plan`, decoded from a broker's
//!   `/v2/catalog` response
//! - **Handles**: `ServiceInstance` and `InstanceBinding` returned by provisioning
//!   and binding
//! - **Errors**: the `BrokerError` taxonomy with its category tags
//! - **Identifiers**: pluggable generation of instance and binding ids
//!
//! # Example
//!
//! ```
//! use hula_core::Catalog;
//!
//! let catalog: Catalog = serde_json::from_str(r#"{
//!     "services": [{
//!         "id": "EEA47C3A",
//!         "name": "p-redis",
//!         "description": "Redis service",
//!         "bindable": true,
//!         "plans": [{ "id": "C210CA06", "name": "shared-vm", "description": "Shared VM" }]
//!     }]
//! }"#).unwrap();
//!
//! let plan = catalog.service_plan("p-redis", "shared-vm").unwrap();
//! assert_eq!(plan.service_id(), "EEA47C3A");
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod ids;
pub mod model;

pub use error::{BrokerError, ErrorCategory, Result};
#[cfg(any(test, feature = "test-utils"))]
pub use ids::SequentialIds;
pub use ids::{IdGenerator, UuidGenerator};
pub use model::{Catalog, Credentials, InstanceBinding, Plan, Service, ServiceInstance};
