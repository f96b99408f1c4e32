//! Service broker client with provision and bind lifecycle orchestration.
//!
//! This crate talks the service broker HTTP protocol and pairs every
//! provision or bind with its teardown, so a caller can run code against a
//! live service instance without remembering cleanup.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       BrokerClient                          │
//! │  ┌──────────────────────┐   ┌────────────────────────────┐  │
//! │  │  with_* / provision  │   │   Lifecycle                │  │
//! │  │  _and_bind teardown  │   │   State Machine            │  │
//! │  └──────────────────────┘   └────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │              BrokerApi (HttpBrokerApi or a mock)            │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                HttpJsonClient (reqwest, JSON)               │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use hula_broker::{BrokerClient, BrokerConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = BrokerConfig::new("https://broker.example.com", "admin", "secret");
//! let client = BrokerClient::from_config(&config)?;
//!
//! let host = client
//!     .provision_and_bind("p-redis", "shared-vm", |binding, _instance| async move {
//!         Ok::<_, hula_broker::BrokerError>(binding.credentials().get("host").cloned())
//!     })
//!     .await?;
//!
//! println!("bound to {host:?}");
//! # Ok(())
//! # }
//! ```
//!
//! # Teardown
//!
//! - provision fails: nothing to tear down
//! - bind fails: deprovision
//! - the work or unbind fails: unbind and deprovision still run
//! - the work panics: the owed teardown runs, then the panic resumes
//!
//! The earliest failure is returned. Dropping an orchestration future before
//! it completes cancels its remaining teardown. See the [`lifecycle`] module for the
//! stage machine.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod api;
pub mod client;
pub mod config;
pub mod http;
pub mod lifecycle;

pub use api::{BrokerApi, HttpBrokerApi, API_VERSION_HEADER};
pub use client::{BrokerClient, DEFAULT_UNBIND_SETTLE};
pub use config::{BrokerConfig, ProxyConfig};
pub use http::{BasicAuth, HttpJsonClient, TransportOptions};

// Re-export the domain types so callers need only this crate
pub use hula_core::{
    BrokerError, Catalog, Credentials, ErrorCategory, IdGenerator, InstanceBinding, Plan, Result,
    Service, ServiceInstance, UuidGenerator,
};
