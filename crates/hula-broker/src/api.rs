//! Service broker protocol client.
//!
//! [`BrokerApi`] is the seam between the lifecycle orchestration in
//! [`BrokerClient`](crate::BrokerClient) and the wire. [`HttpBrokerApi`] maps each
//! protocol step onto exactly one HTTP request.

use std::sync::Arc;

use async_trait::async_trait;
use hula_core::{
    BrokerError, Catalog, Credentials, IdGenerator, InstanceBinding, Plan, Result,
    ServiceInstance, UuidGenerator,
};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::BrokerConfig;
use crate::http::{BasicAuth, HttpJsonClient};

/// Header carrying the broker protocol version.
pub const API_VERSION_HEADER: &str = "X-Broker-Api-Version";

/// Operations of the service broker protocol.
///
/// Implementations must not retry or recover locally; every failure
/// propagates to the caller unchanged.
#[async_trait]
pub trait BrokerApi: Send + Sync {
    /// Fetch the broker's catalog.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the body is not a catalog.
    async fn catalog(&self) -> Result<Catalog>;

    /// Provision an instance of `plan`.
    ///
    /// The instance id is `instance_id` when given, otherwise a freshly
    /// generated one. The id is chosen by the client, so retrying with the
    /// same id is idempotent on the broker side.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    async fn provision_instance(
        &self,
        plan: &Plan,
        instance_id: Option<&str>,
    ) -> Result<ServiceInstance>;

    /// Deprovision an instance of `plan`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    async fn deprovision_instance(&self, instance: &ServiceInstance, plan: &Plan) -> Result<()>;

    /// Bind to an instance of `plan`, returning the broker's credentials.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response has no
    /// `credentials` object.
    async fn bind_instance(
        &self,
        instance: &ServiceInstance,
        plan: &Plan,
        binding_id: Option<&str>,
    ) -> Result<InstanceBinding>;

    /// Remove a binding.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    async fn unbind_instance(&self, binding: &InstanceBinding, plan: &Plan) -> Result<()>;

    /// Fetch the broker's debug document.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    async fn debug(&self) -> Result<Value>;
}

/// Body sent when provisioning and when binding.
#[derive(Debug, Serialize)]
struct PlanRequest<'a> {
    service_id: &'a str,
    plan_id: &'a str,
}

impl<'a> PlanRequest<'a> {
    fn for_plan(plan: &'a Plan) -> Self {
        Self {
            service_id: plan.service_id(),
            plan_id: plan.id(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct BindResponse {
    credentials: Credentials,
}

/// [`BrokerApi`] over HTTP with Basic auth.
pub struct HttpBrokerApi {
    http: HttpJsonClient,
    base_url: Url,
    auth: BasicAuth,
    headers: HeaderMap,
    ids: Arc<dyn IdGenerator>,
}

impl HttpBrokerApi {
    /// Create a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns `BrokerError::Config` if the configuration is invalid.
    pub fn new(config: &BrokerConfig) -> Result<Self> {
        config.validate()?;
        let http = HttpJsonClient::new(&config.transport_options())?;
        Self::from_validated(config, http)
    }

    /// Create a client that sends requests through `http`.
    ///
    /// # Errors
    ///
    /// Returns `BrokerError::Config` if the configuration is invalid.
    pub fn with_http_client(config: &BrokerConfig, http: HttpJsonClient) -> Result<Self> {
        config.validate()?;
        Self::from_validated(config, http)
    }

    fn from_validated(config: &BrokerConfig, http: HttpJsonClient) -> Result<Self> {
        let version = HeaderValue::from_str(&config.api_version).map_err(|_| {
            BrokerError::Config(format!("invalid API version: {:?}", config.api_version))
        })?;
        let mut headers = HeaderMap::new();
        headers.insert(HeaderName::from_static("x-broker-api-version"), version);

        Ok(Self {
            http,
            base_url: config.parsed_url()?,
            auth: BasicAuth::new(&config.username, &config.password),
            headers,
            ids: Arc::new(UuidGenerator),
        })
    }

    /// Replace the generator used when no explicit id is supplied.
    #[must_use]
    pub fn with_id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    /// The broker base URL.
    #[must_use]
    pub const fn url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| {
                BrokerError::Config(format!("broker URL cannot be a base: {}", self.base_url))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn endpoint_for_plan(&self, segments: &[&str], plan: &Plan) -> Result<Url> {
        let mut url = self.endpoint(segments)?;
        url.query_pairs_mut()
            .append_pair("plan_id", plan.id())
            .append_pair("service_id", plan.service_id());
        Ok(url)
    }

    fn id_or_generated(&self, id: Option<&str>) -> String {
        id.map_or_else(|| self.ids.next_id(), ToString::to_string)
    }
}

impl std::fmt::Debug for HttpBrokerApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpBrokerApi")
            .field("base_url", &self.base_url.as_str())
            .field("auth", &self.auth)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl BrokerApi for HttpBrokerApi {
    async fn catalog(&self) -> Result<Catalog> {
        let url = self.endpoint(&["v2", "catalog"])?;
        let json = self.http.get(&url, Some(&self.auth), &self.headers).await?;
        let catalog: Catalog = serde_json::from_value(json)?;

        tracing::debug!(services = catalog.services().len(), "Fetched broker catalog");
        Ok(catalog)
    }

    async fn provision_instance(
        &self,
        plan: &Plan,
        instance_id: Option<&str>,
    ) -> Result<ServiceInstance> {
        let instance_id = self.id_or_generated(instance_id);
        let url = self.endpoint(&["v2", "service_instances", &instance_id])?;

        tracing::info!(
            instance_id = %instance_id,
            plan = plan.name(),
            "Provisioning service instance"
        );

        self.http
            .put(
                &url,
                Some(&PlanRequest::for_plan(plan)),
                Some(&self.auth),
                &self.headers,
            )
            .await?;

        Ok(ServiceInstance::new(instance_id))
    }

    async fn deprovision_instance(&self, instance: &ServiceInstance, plan: &Plan) -> Result<()> {
        let url = self.endpoint_for_plan(&["v2", "service_instances", instance.id()], plan)?;

        tracing::info!(instance_id = instance.id(), "Deprovisioning service instance");

        self.http
            .delete(&url, Some(&self.auth), &self.headers)
            .await?;
        Ok(())
    }

    async fn bind_instance(
        &self,
        instance: &ServiceInstance,
        plan: &Plan,
        binding_id: Option<&str>,
    ) -> Result<InstanceBinding> {
        let binding_id = self.id_or_generated(binding_id);
        let url = self.endpoint(&[
            "v2",
            "service_instances",
            instance.id(),
            "service_bindings",
            &binding_id,
        ])?;

        tracing::info!(
            instance_id = instance.id(),
            binding_id = %binding_id,
            "Binding service instance"
        );

        let json = self
            .http
            .put(
                &url,
                Some(&PlanRequest::for_plan(plan)),
                Some(&self.auth),
                &self.headers,
            )
            .await?;
        let response: BindResponse = serde_json::from_value(json)?;

        Ok(InstanceBinding::new(
            binding_id,
            response.credentials,
            instance.clone(),
        ))
    }

    async fn unbind_instance(&self, binding: &InstanceBinding, plan: &Plan) -> Result<()> {
        let url = self.endpoint_for_plan(
            &[
                "v2",
                "service_instances",
                binding.service_instance().id(),
                "service_bindings",
                binding.id(),
            ],
            plan,
        )?;

        tracing::info!(
            instance_id = binding.service_instance().id(),
            binding_id = binding.id(),
            "Unbinding service instance"
        );

        self.http
            .delete(&url, Some(&self.auth), &self.headers)
            .await?;
        Ok(())
    }

    async fn debug(&self) -> Result<Value> {
        let url = self.endpoint(&["debug"])?;
        self.http.get(&url, Some(&self.auth), &self.headers).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProxyConfig;
    use hula_core::SequentialIds;
    use serde_json::json;
    use wiremock::matchers::{basic_auth, body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn catalog_json() -> Value {
        json!({
            "services": [{
                "id": "EEA47C3A-569C-4C24-869D-0ADB5B337A4C",
                "name": "p-redis",
                "description": "Redis service to provide a key-value store",
                "bindable": true,
                "plans": [{
                    "id": "C210CA06-E7E5-4F5D-A5AA-7A2C51CC290E",
                    "name": "shared-vm",
                    "description": "This plan provides a single Redis process on a shared VM"
                }]
            }]
        })
    }

    fn plan() -> Plan {
        Plan::new(
            "C210CA06-E7E5-4F5D-A5AA-7A2C51CC290E",
            "shared-vm",
            "This plan provides a single Redis process on a shared VM",
            "EEA47C3A-569C-4C24-869D-0ADB5B337A4C",
        )
    }

    fn api(server: &MockServer) -> HttpBrokerApi {
        let config = BrokerConfig::new(format!("{}/baz", server.uri()), "admin", "hunter2");
        HttpBrokerApi::new(&config).unwrap()
    }

    fn authorized(m: &str, p: &str) -> wiremock::MockBuilder {
        Mock::given(method(m))
            .and(path(p))
            .and(basic_auth("admin", "hunter2"))
            .and(header(API_VERSION_HEADER, "2.4"))
    }

    #[tokio::test]
    async fn catalog_is_decoded() {
        let server = MockServer::start().await;
        authorized("GET", "/baz/v2/catalog")
            .respond_with(ResponseTemplate::new(200).set_body_json(catalog_json()))
            .expect(1)
            .mount(&server)
            .await;

        let catalog = api(&server).catalog().await.unwrap();

        assert_eq!(catalog.service_names(), vec!["p-redis"]);
        assert_eq!(catalog.service_plan("p-redis", "shared-vm").unwrap(), &plan());
    }

    #[tokio::test]
    async fn malformed_catalog_is_a_parse_error() {
        let server = MockServer::start().await;
        authorized("GET", "/baz/v2/catalog")
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "services": 1 })))
            .mount(&server)
            .await;

        let err = api(&server).catalog().await.unwrap_err();
        assert!(matches!(err, BrokerError::JsonParse(_)));
    }

    #[tokio::test]
    async fn provision_with_explicit_id() {
        let server = MockServer::start().await;
        authorized("PUT", "/baz/v2/service_instances/service_instance_id")
            .and(body_json(json!({
                "service_id": "EEA47C3A-569C-4C24-869D-0ADB5B337A4C",
                "plan_id": "C210CA06-E7E5-4F5D-A5AA-7A2C51CC290E"
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let instance = api(&server)
            .provision_instance(&plan(), Some("service_instance_id"))
            .await
            .unwrap();

        assert_eq!(instance, ServiceInstance::new("service_instance_id"));
    }

    #[tokio::test]
    async fn provision_with_generated_id() {
        let server = MockServer::start().await;
        authorized("PUT", "/baz/v2/service_instances/instance-1")
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let instance = api(&server)
            .with_id_generator(Arc::new(SequentialIds::new("instance")))
            .provision_instance(&plan(), None)
            .await
            .unwrap();

        assert_eq!(instance.id(), "instance-1");
    }

    #[tokio::test]
    async fn deprovision_sends_plan_query() {
        let server = MockServer::start().await;
        authorized("DELETE", "/baz/v2/service_instances/instance_id")
            .and(query_param("plan_id", plan().id()))
            .and(query_param("service_id", plan().service_id()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        api(&server)
            .deprovision_instance(&ServiceInstance::new("instance_id"), &plan())
            .await
            .unwrap();

        let requests = server.received_requests().await.unwrap();
        assert_eq!(
            requests[0].url.query(),
            Some(
                "plan_id=C210CA06-E7E5-4F5D-A5AA-7A2C51CC290E\
                 &service_id=EEA47C3A-569C-4C24-869D-0ADB5B337A4C"
            )
        );
    }

    #[tokio::test]
    async fn bind_returns_credentials() {
        let server = MockServer::start().await;
        authorized(
            "PUT",
            "/baz/v2/service_instances/instance_id/service_bindings/binding_id",
        )
        .and(body_json(json!({
            "service_id": "EEA47C3A-569C-4C24-869D-0ADB5B337A4C",
            "plan_id": "C210CA06-E7E5-4F5D-A5AA-7A2C51CC290E"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "credentials": { "host": "10.0.0.1", "port": 6379, "password": "pw" }
        })))
        .expect(1)
        .mount(&server)
        .await;

        let instance = ServiceInstance::new("instance_id");
        let binding = api(&server)
            .bind_instance(&instance, &plan(), Some("binding_id"))
            .await
            .unwrap();

        assert_eq!(binding.id(), "binding_id");
        assert_eq!(binding.service_instance(), &instance);
        assert_eq!(binding.credentials()["host"], "10.0.0.1");
        assert_eq!(binding.credentials()["port"], 6379);
    }

    #[tokio::test]
    async fn bind_without_credentials_fails() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({})))
            .mount(&server)
            .await;

        let err = api(&server)
            .bind_instance(&ServiceInstance::new("instance_id"), &plan(), Some("b"))
            .await
            .unwrap_err();

        assert!(matches!(err, BrokerError::JsonParse(_)));
    }

    #[tokio::test]
    async fn unbind_sends_plan_query() {
        let server = MockServer::start().await;
        authorized(
            "DELETE",
            "/baz/v2/service_instances/instance_id/service_bindings/binding_id",
        )
        .and(query_param("plan_id", plan().id()))
        .and(query_param("service_id", plan().service_id()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

        let binding = InstanceBinding::new(
            "binding_id",
            Credentials::new(),
            ServiceInstance::new("instance_id"),
        );
        api(&server).unbind_instance(&binding, &plan()).await.unwrap();
    }

    #[tokio::test]
    async fn debug_returns_raw_json() {
        let server = MockServer::start().await;
        authorized("GET", "/baz/debug")
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "pool": [1, 2] })))
            .expect(1)
            .mount(&server)
            .await;

        let debug = api(&server).debug().await.unwrap();
        assert_eq!(debug, json!({ "pool": [1, 2] }));
    }

    #[tokio::test]
    async fn http_errors_propagate_unchanged() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(410).set_body_string("Gone"))
            .mount(&server)
            .await;

        let err = api(&server)
            .deprovision_instance(&ServiceInstance::new("instance_id"), &plan())
            .await
            .unwrap_err();

        match err {
            BrokerError::Http { status, body, uri } => {
                assert_eq!(status, 410);
                assert_eq!(body, "Gone");
                assert!(uri.contains("/baz/v2/service_instances/instance_id?plan_id="));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn ids_are_escaped_path_segments() {
        let config = BrokerConfig::new("http://broker.example.com/base/", "admin", "pw");
        let api = HttpBrokerApi::new(&config).unwrap();

        let url = api
            .endpoint(&["v2", "service_instances", "a/b c"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://broker.example.com/base/v2/service_instances/a%2Fb%20c"
        );
        assert_eq!(api.url().as_str(), "http://broker.example.com/base/");
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = BrokerConfig::new("mailto:someone", "admin", "pw");
        assert!(matches!(
            HttpBrokerApi::new(&config),
            Err(BrokerError::Config(_))
        ));
    }

    #[test]
    fn config_is_validated_before_the_transport_is_built() {
        let mut config = BrokerConfig::new("mailto:someone", "admin", "pw");
        config.proxy = Some(ProxyConfig::new("bad host", 3128));

        let err = HttpBrokerApi::new(&config).unwrap_err();
        assert!(
            matches!(err, BrokerError::Config(ref msg) if msg.contains("broker URL scheme")),
            "unexpected error: {err}"
        );
    }
}
