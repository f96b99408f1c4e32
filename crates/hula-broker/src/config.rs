//! Broker client configuration.
//!
//! This module defines the endpoint, credential and transport settings used to
//! build an [`HttpBrokerApi`](crate::HttpBrokerApi).

use std::fmt;
use std::time::Duration;

use hula_core::{BrokerError, Result};
use reqwest::header::HeaderValue;
use reqwest::Url;
use serde::Deserialize;

use crate::http::TransportOptions;

/// An upstream HTTP proxy that all broker requests are forwarded through.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProxyConfig {
    /// Proxy host name or address.
    pub host: String,
    /// Proxy port.
    pub port: u16,
}

impl ProxyConfig {
    /// Create a proxy configuration.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// The proxy URL handed to the HTTP client.
    #[must_use]
    pub fn url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

/// Configuration for talking to a service broker.
#[derive(Clone, Deserialize)]
pub struct BrokerConfig {
    /// Base URL of the broker, including any path prefix (e.g. `https://broker:443/base`).
    pub url: String,

    /// Basic auth username.
    pub username: String,

    /// Basic auth password.
    pub password: String,

    /// Value sent in the `X-Broker-Api-Version` header.
    #[serde(default = "BrokerConfig::default_api_version")]
    pub api_version: String,

    /// Whole-request timeout in seconds.
    #[serde(default = "BrokerConfig::default_request_timeout")]
    pub request_timeout_seconds: u64,

    /// Connection timeout in seconds.
    #[serde(default = "BrokerConfig::default_connect_timeout")]
    pub connect_timeout_seconds: u64,

    /// Optional upstream HTTP proxy. Absent means direct connections.
    #[serde(default)]
    pub proxy: Option<ProxyConfig>,

    /// Skip TLS certificate verification for https brokers.
    #[serde(default)]
    pub accept_invalid_certs: bool,

    /// Pause after a successful unbind, in milliseconds.
    #[serde(default = "BrokerConfig::default_unbind_settle")]
    pub unbind_settle_millis: u64,
}

impl BrokerConfig {
    fn default_api_version() -> String {
        "2.4".to_string()
    }

    const fn default_request_timeout() -> u64 {
        30
    }

    const fn default_connect_timeout() -> u64 {
        5
    }

    const fn default_unbind_settle() -> u64 {
        1000
    }

    /// Create a configuration with default transport settings.
    #[must_use]
    pub fn new(
        url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            username: username.into(),
            password: password.into(),
            api_version: Self::default_api_version(),
            request_timeout_seconds: Self::default_request_timeout(),
            connect_timeout_seconds: Self::default_connect_timeout(),
            proxy: None,
            accept_invalid_certs: false,
            unbind_settle_millis: Self::default_unbind_settle(),
        }
    }

    /// Check that the configuration can be used to build a client.
    ///
    /// # Errors
    ///
    /// Returns `BrokerError::Config` if the URL is not an absolute http(s) URL,
    /// the username is empty, or the API version is not a valid header value.
    pub fn validate(&self) -> Result<()> {
        self.parsed_url()?;

        if self.username.trim().is_empty() {
            return Err(BrokerError::Config("username cannot be empty".to_string()));
        }

        HeaderValue::from_str(&self.api_version).map_err(|_| {
            BrokerError::Config(format!("invalid API version: {:?}", self.api_version))
        })?;

        if let Some(proxy) = &self.proxy {
            if proxy.host.trim().is_empty() {
                return Err(BrokerError::Config("proxy host cannot be empty".to_string()));
            }
        }

        Ok(())
    }

    /// Parse the broker URL.
    ///
    /// # Errors
    ///
    /// Returns `BrokerError::Config` if the URL is malformed or not http(s).
    pub fn parsed_url(&self) -> Result<Url> {
        let url = Url::parse(&self.url)
            .map_err(|e| BrokerError::Config(format!("invalid broker URL {:?}: {e}", self.url)))?;

        match url.scheme() {
            "http" | "https" => Ok(url),
            scheme => Err(BrokerError::Config(format!(
                "unsupported broker URL scheme: {scheme}"
            ))),
        }
    }

    /// Get the request timeout as a `Duration`.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    /// Get the connect timeout as a `Duration`.
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }

    /// Get the post-unbind pause as a `Duration`.
    #[must_use]
    pub const fn unbind_settle(&self) -> Duration {
        Duration::from_millis(self.unbind_settle_millis)
    }

    /// Transport settings for [`HttpJsonClient`](crate::HttpJsonClient).
    #[must_use]
    pub fn transport_options(&self) -> TransportOptions {
        TransportOptions {
            request_timeout: self.request_timeout(),
            connect_timeout: self.connect_timeout(),
            proxy: self.proxy.clone(),
            accept_invalid_certs: self.accept_invalid_certs,
        }
    }
}

impl fmt::Debug for BrokerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrokerConfig")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("api_version", &self.api_version)
            .field("request_timeout_seconds", &self.request_timeout_seconds)
            .field("connect_timeout_seconds", &self.connect_timeout_seconds)
            .field("proxy", &self.proxy)
            .field("accept_invalid_certs", &self.accept_invalid_certs)
            .field("unbind_settle_millis", &self.unbind_settle_millis)
            .finish()
    }
}
