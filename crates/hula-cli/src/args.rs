//! Command line arguments.

use clap::{Args as ClapArgs, Parser, Subcommand};
use hula_broker::{BrokerConfig, ProxyConfig};

/// Hula - service broker client.
#[derive(Parser, Debug)]
#[command(name = "hula")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Broker base URL, including any path prefix.
    #[arg(long, env = "HULA_BROKER_URL")]
    pub url: String,

    /// Basic auth username.
    #[arg(long, env = "HULA_BROKER_USERNAME")]
    pub username: String,

    /// Basic auth password.
    #[arg(long, env = "HULA_BROKER_PASSWORD", hide_env_values = true)]
    pub password: String,

    /// Value of the X-Broker-Api-Version header.
    #[arg(long, default_value = "2.4")]
    pub api_version: String,

    /// Upstream HTTP proxy as host:port.
    #[arg(long, value_parser = parse_proxy)]
    pub proxy: Option<ProxyConfig>,

    /// Skip TLS certificate verification.
    #[arg(long)]
    pub insecure: bool,

    /// Request timeout in seconds.
    #[arg(long, default_value_t = 30)]
    pub timeout: u64,

    /// Enable debug logging.
    #[arg(long, default_value = "false")]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Args {
    /// Broker configuration from the global options.
    #[must_use]
    pub fn broker_config(&self) -> BrokerConfig {
        let mut config = BrokerConfig::new(&self.url, &self.username, &self.password);
        config.api_version.clone_from(&self.api_version);
        config.proxy.clone_from(&self.proxy);
        config.accept_invalid_certs = self.insecure;
        config.request_timeout_seconds = self.timeout;
        config
    }
}

/// Broker operations.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the broker catalog.
    Catalog,

    /// Print the broker debug document.
    Debug,

    /// Provision a service instance.
    Provision {
        #[command(flatten)]
        target: PlanArgs,

        /// Instance id; generated when omitted.
        #[arg(long)]
        instance_id: Option<String>,
    },

    /// Deprovision a service instance.
    Deprovision {
        #[command(flatten)]
        target: PlanArgs,

        /// Instance id.
        #[arg(long)]
        instance_id: String,
    },

    /// Bind to a service instance and print the credentials.
    Bind {
        #[command(flatten)]
        target: PlanArgs,

        /// Instance id.
        #[arg(long)]
        instance_id: String,

        /// Binding id; generated when omitted.
        #[arg(long)]
        binding_id: Option<String>,
    },

    /// Remove a binding.
    Unbind {
        #[command(flatten)]
        target: PlanArgs,

        /// Instance id.
        #[arg(long)]
        instance_id: String,

        /// Binding id.
        #[arg(long)]
        binding_id: String,
    },

    /// Provision and bind, optionally run a command, then tear everything down.
    Smoke {
        #[command(flatten)]
        target: PlanArgs,

        /// Shell command to run against the live binding.
        ///
        /// The binding is exposed as HULA_INSTANCE_ID, HULA_BINDING_ID and
        /// HULA_CREDENTIALS (JSON).
        #[arg(long)]
        run: Option<String>,
    },
}

/// Service and plan selection.
#[derive(ClapArgs, Debug, Clone)]
pub struct PlanArgs {
    /// Service name in the catalog.
    #[arg(long)]
    pub service: String,

    /// Plan name within the service.
    #[arg(long)]
    pub plan: String,
}

fn parse_proxy(value: &str) -> Result<ProxyConfig, String> {
    let (host, port) = value
        .rsplit_once(':')
        .ok_or_else(|| format!("expected host:port, got {value:?}"))?;
    if host.is_empty() {
        return Err(format!("missing proxy host in {value:?}"));
    }
    let port = port
        .parse::<u16>()
        .map_err(|e| format!("invalid proxy port {port:?}: {e}"))?;
    Ok(ProxyConfig::new(host, port))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    const GLOBALS: [&str; 7] = [
        "hula",
        "--url",
        "http://broker:8080/base",
        "--username",
        "admin",
        "--password",
        "secret",
    ];

    fn parse(extra: &[&str]) -> Args {
        Args::try_parse_from(GLOBALS.iter().chain(extra)).unwrap()
    }

    #[test]
    fn command_definition_is_valid() {
        Args::command().debug_assert();
    }

    #[test]
    fn builds_broker_config() {
        let args = parse(&[
            "--proxy",
            "127.0.0.1:3128",
            "--insecure",
            "--timeout",
            "5",
            "catalog",
        ]);
        let config = args.broker_config();

        assert_eq!(config.url, "http://broker:8080/base");
        assert_eq!(config.api_version, "2.4");
        assert_eq!(config.proxy, Some(ProxyConfig::new("127.0.0.1", 3128)));
        assert!(config.accept_invalid_certs);
        assert_eq!(config.request_timeout_seconds, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn parses_subcommands() {
        let args = parse(&[
            "bind",
            "--service",
            "p-redis",
            "--plan",
            "shared-vm",
            "--instance-id",
            "abc",
        ]);
        match args.command {
            Command::Bind {
                target,
                instance_id,
                binding_id,
            } => {
                assert_eq!(target.service, "p-redis");
                assert_eq!(target.plan, "shared-vm");
                assert_eq!(instance_id, "abc");
                assert!(binding_id.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn unbind_requires_binding_id() {
        let result = Args::try_parse_from(GLOBALS.iter().chain(&[
            "unbind",
            "--service",
            "p-redis",
            "--plan",
            "shared-vm",
            "--instance-id",
            "abc",
        ]));
        assert!(result.is_err());
    }

    #[test]
    fn proxy_parsing() {
        assert_eq!(
            parse_proxy("proxy.internal:8080").unwrap(),
            ProxyConfig::new("proxy.internal", 8080)
        );
        assert!(parse_proxy("proxy.internal").is_err());
        assert!(parse_proxy(":8080").is_err());
        assert!(parse_proxy("proxy:99999").is_err());
    }
}
