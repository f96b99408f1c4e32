//! JSON-over-HTTP transport for broker requests.
//!
//! [`HttpJsonClient`] performs one request per call and decodes the response
//! body as JSON. Non-2xx responses, timeouts and undecodable bodies map onto
//! the matching [`BrokerError`] variants. There are no retries.

use std::time::Duration;

use hula_core::{BrokerError, Result};
use reqwest::header::HeaderMap;
use reqwest::{RequestBuilder, Url};
use serde::Serialize;
use serde_json::Value;

use crate::config::ProxyConfig;

/// Basic auth credentials sent with every broker request.
#[derive(Clone, PartialEq, Eq)]
pub struct BasicAuth {
    /// Username.
    pub username: String,
    /// Password.
    pub password: String,
}

impl BasicAuth {
    /// Create basic auth credentials.
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for BasicAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasicAuth")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

/// Transport-level settings for [`HttpJsonClient`].
#[derive(Debug, Clone)]
pub struct TransportOptions {
    /// Whole-request timeout.
    pub request_timeout: Duration,
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Upstream proxy; `None` connects directly.
    pub proxy: Option<ProxyConfig>,
    /// Skip TLS certificate verification.
    pub accept_invalid_certs: bool,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(5),
            proxy: None,
            accept_invalid_certs: false,
        }
    }
}

/// HTTP client that sends JSON and expects JSON back.
#[derive(Debug, Clone)]
pub struct HttpJsonClient {
    client: reqwest::Client,
}

impl HttpJsonClient {
    /// Create a client with the given transport settings.
    ///
    /// # Errors
    ///
    /// Returns `BrokerError::Config` if the proxy URL is invalid or the
    /// underlying client cannot be built.
    pub fn new(options: &TransportOptions) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .timeout(options.request_timeout)
            .connect_timeout(options.connect_timeout)
            .danger_accept_invalid_certs(options.accept_invalid_certs);

        builder = match &options.proxy {
            Some(proxy) => {
                let url = proxy.url();
                let proxy = reqwest::Proxy::all(&url)
                    .map_err(|e| BrokerError::Config(format!("invalid proxy {url}: {e}")))?;
                builder.proxy(proxy)
            }
            None => builder.no_proxy(),
        };

        if options.accept_invalid_certs {
            tracing::warn!("TLS certificate verification is disabled for broker requests");
        }

        let client = builder
            .build()
            .map_err(|e| BrokerError::Config(format!("failed to create HTTP client: {e}")))?;

        Ok(Self { client })
    }

    /// Create a client around an existing reqwest client.
    #[must_use]
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Send a GET request.
    ///
    /// # Errors
    ///
    /// Returns `Http`, `Timeout`, `Transport` or `JsonParse` errors.
    pub async fn get(
        &self,
        uri: &Url,
        auth: Option<&BasicAuth>,
        headers: &HeaderMap,
    ) -> Result<Value> {
        tracing::debug!(uri = %uri, "GET");
        self.send(self.client.get(uri.clone()), uri, auth, headers)
            .await
    }

    /// Send a PUT request, with `body` serialized as JSON when present.
    ///
    /// # Errors
    ///
    /// Returns `Http`, `Timeout`, `Transport` or `JsonParse` errors.
    pub async fn put<B>(
        &self,
        uri: &Url,
        body: Option<&B>,
        auth: Option<&BasicAuth>,
        headers: &HeaderMap,
    ) -> Result<Value>
    where
        B: Serialize + ?Sized + Sync,
    {
        tracing::debug!(uri = %uri, "PUT");
        let mut request = self.client.put(uri.clone());
        if let Some(body) = body {
            request = request.json(body);
        }
        self.send(request, uri, auth, headers).await
    }

    /// Send a DELETE request.
    ///
    /// # Errors
    ///
    /// Returns `Http`, `Timeout`, `Transport` or `JsonParse` errors.
    pub async fn delete(
        &self,
        uri: &Url,
        auth: Option<&BasicAuth>,
        headers: &HeaderMap,
    ) -> Result<Value> {
        tracing::debug!(uri = %uri, "DELETE");
        self.send(self.client.delete(uri.clone()), uri, auth, headers)
            .await
    }

    async fn send(
        &self,
        request: RequestBuilder,
        uri: &Url,
        auth: Option<&BasicAuth>,
        headers: &HeaderMap,
    ) -> Result<Value> {
        let mut request = request.headers(headers.clone());
        if let Some(auth) = auth {
            request = request.basic_auth(&auth.username, Some(&auth.password));
        }

        let response = request
            .send()
            .await
            .map_err(|e| transport_error(uri, &e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| transport_error(uri, &e))?;

        if !status.is_success() {
            tracing::debug!(uri = %uri, status = %status, "Broker returned an error status");
            return Err(BrokerError::Http {
                uri: uri.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body)
            .map_err(|e| BrokerError::JsonParse(format!("response from {uri}: {e}")))
    }
}

fn transport_error(uri: &Url, err: &reqwest::Error) -> BrokerError {
    if err.is_timeout() {
        BrokerError::Timeout {
            uri: uri.to_string(),
            message: err.to_string(),
        }
    } else {
        BrokerError::Transport {
            uri: uri.to_string(),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hula_core::ErrorCategory;
    use reqwest::header::HeaderValue;
    use serde_json::json;
    use wiremock::matchers::{basic_auth, body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client() -> HttpJsonClient {
        HttpJsonClient::new(&TransportOptions::default()).unwrap()
    }

    fn extra_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("hkey", HeaderValue::from_static("hvalue"));
        headers
    }

    fn url(server: &MockServer, p: &str) -> Url {
        Url::parse(&format!("{}{p}", server.uri())).unwrap()
    }

    #[tokio::test]
    async fn get_with_auth_and_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/foos"))
            .and(header("hkey", "hvalue"))
            .and(basic_auth("something", "secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "key": "value" })))
            .expect(1)
            .mount(&server)
            .await;

        let auth = BasicAuth::new("something", "secret");
        let result = client()
            .get(&url(&server, "/foos"), Some(&auth), &extra_headers())
            .await
            .unwrap();

        assert_eq!(result, json!({ "key": "value" }));
    }

    #[tokio::test]
    async fn get_without_auth() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/foos"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "key": "value" })))
            .mount(&server)
            .await;

        let result = client()
            .get(&url(&server, "/foos"), None, &HeaderMap::new())
            .await
            .unwrap();

        assert_eq!(result["key"], "value");
        let requests = server.received_requests().await.unwrap();
        assert!(requests[0].headers.get("authorization").is_none());
    }

    #[tokio::test]
    async fn non_json_body_is_a_parse_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("something else"))
            .mount(&server)
            .await;

        let err = client()
            .get(&url(&server, "/foos"), None, &HeaderMap::new())
            .await
            .unwrap_err();

        assert!(matches!(err, BrokerError::JsonParse(_)));
    }

    #[tokio::test]
    async fn empty_body_is_a_parse_error() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let err = client()
            .delete(&url(&server, "/foos"), None, &HeaderMap::new())
            .await
            .unwrap_err();

        assert_eq!(err.category(), ErrorCategory::JsonParse);
    }

    #[tokio::test]
    async fn slow_response_is_a_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({}))
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let options = TransportOptions {
            request_timeout: Duration::from_millis(100),
            ..TransportOptions::default()
        };
        let err = HttpJsonClient::new(&options)
            .unwrap()
            .get(&url(&server, "/foos"), None, &HeaderMap::new())
            .await
            .unwrap_err();

        assert!(matches!(err, BrokerError::Timeout { .. }));
    }

    #[tokio::test]
    async fn non_2xx_is_an_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
            .mount(&server)
            .await;

        let err = client()
            .get(&url(&server, "/foos"), None, &HeaderMap::new())
            .await
            .unwrap_err();

        assert_eq!(err.status_code(), Some(500));
        assert!(err.to_string().contains("Internal Server Error"));
        assert!(err.to_string().contains("/foos"));
    }

    #[tokio::test]
    async fn put_sends_json_body() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/foos"))
            .and(basic_auth("something", "secret"))
            .and(body_json(json!({ "a_param": "a_value" })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "key": "value" })))
            .expect(1)
            .mount(&server)
            .await;

        let auth = BasicAuth::new("something", "secret");
        let result = client()
            .put(
                &url(&server, "/foos"),
                Some(&json!({ "a_param": "a_value" })),
                Some(&auth),
                &extra_headers(),
            )
            .await
            .unwrap();

        assert_eq!(result, json!({ "key": "value" }));
    }

    #[tokio::test]
    async fn put_non_2xx_is_an_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
            .mount(&server)
            .await;

        let err = client()
            .put(&url(&server, "/foos"), Some(&json!({})), None, &HeaderMap::new())
            .await
            .unwrap_err();

        assert!(matches!(err, BrokerError::Http { status: 500, .. }));
    }

    #[tokio::test]
    async fn delete_returns_body() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/foos"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let result = client()
            .delete(&url(&server, "/foos"), None, &HeaderMap::new())
            .await
            .unwrap();

        assert_eq!(result, json!({}));
    }

    #[tokio::test]
    async fn refused_connection_is_a_transport_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        let target = Url::parse(&format!("http://127.0.0.1:{port}/foos")).unwrap();

        let err = client()
            .get(&target, None, &HeaderMap::new())
            .await
            .unwrap_err();

        assert_eq!(err.category(), ErrorCategory::Transport);
        assert!(err.is_retriable());
    }

    #[tokio::test]
    async fn requests_go_through_the_configured_proxy() {
        let proxy = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/foos"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "via": "proxy" })))
            .expect(1)
            .mount(&proxy)
            .await;

        let options = TransportOptions {
            proxy: Some(ProxyConfig::new("127.0.0.1", proxy.address().port())),
            ..TransportOptions::default()
        };
        let target = Url::parse("http://broker.invalid/foos").unwrap();

        let result = HttpJsonClient::new(&options)
            .unwrap()
            .get(&target, None, &HeaderMap::new())
            .await
            .unwrap();

        assert_eq!(result, json!({ "via": "proxy" }));
    }

    #[test]
    fn invalid_proxy_is_a_config_error() {
        let options = TransportOptions {
            proxy: Some(ProxyConfig::new("bad host", 3128)),
            ..TransportOptions::default()
        };

        let err = HttpJsonClient::new(&options).unwrap_err();
        assert!(matches!(err, BrokerError::Config(ref msg) if msg.contains("invalid proxy")));
    }

    #[test]
    fn basic_auth_debug_hides_password() {
        let auth = BasicAuth::new("admin", "hunter2");
        assert!(!format!("{auth:?}").contains("hunter2"));
    }
}
