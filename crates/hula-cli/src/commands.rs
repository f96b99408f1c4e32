//! Subcommand execution.

use anyhow::Context;
use hula_broker::{BrokerApi, BrokerClient, Credentials, InstanceBinding, Plan, ServiceInstance};
use hula_command::{CommandRunner, ShellCommandRunner};
use serde::Serialize;
use serde_json::Value;

use crate::args::{Command, PlanArgs};

/// Result of a `smoke` run.
#[derive(Debug, Serialize)]
struct SmokeReport {
    instance_id: String,
    binding_id: String,
    credential_keys: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    output: Option<String>,
}

/// Run `command` and return the JSON document to print.
pub async fn execute<A: BrokerApi>(
    client: &BrokerClient<A>,
    command: Command,
) -> anyhow::Result<Value> {
    match command {
        Command::Catalog => {
            let catalog = client.catalog().await?;
            Ok(serde_json::to_value(catalog)?)
        }

        Command::Debug => Ok(client.debug().await?),

        Command::Provision {
            target,
            instance_id,
        } => {
            let plan = resolve(client, &target).await?;
            let instance = client
                .api()
                .provision_instance(&plan, instance_id.as_deref())
                .await?;
            Ok(serde_json::to_value(instance)?)
        }

        Command::Deprovision {
            target,
            instance_id,
        } => {
            let plan = resolve(client, &target).await?;
            let instance = ServiceInstance::new(instance_id);
            client.deprovision_instance(&instance, &plan).await?;
            Ok(serde_json::json!({ "deprovisioned": instance.id() }))
        }

        Command::Bind {
            target,
            instance_id,
            binding_id,
        } => {
            let plan = resolve(client, &target).await?;
            let binding = client
                .api()
                .bind_instance(
                    &ServiceInstance::new(instance_id),
                    &plan,
                    binding_id.as_deref(),
                )
                .await?;
            Ok(serde_json::to_value(binding)?)
        }

        Command::Unbind {
            target,
            instance_id,
            binding_id,
        } => {
            let plan = resolve(client, &target).await?;
            let binding = InstanceBinding::new(
                binding_id,
                Credentials::new(),
                ServiceInstance::new(instance_id),
            );
            client.unbind_instance(&binding, &plan).await?;
            Ok(serde_json::json!({ "unbound": binding.id() }))
        }

        Command::Smoke { target, run } => {
            let report = smoke(client, &target, run).await?;
            Ok(serde_json::to_value(report)?)
        }
    }
}

async fn resolve<A: BrokerApi>(
    client: &BrokerClient<A>,
    target: &PlanArgs,
) -> anyhow::Result<Plan> {
    Ok(client.resolve_plan(&target.service, &target.plan).await?)
}

async fn smoke<A: BrokerApi>(
    client: &BrokerClient<A>,
    target: &PlanArgs,
    run: Option<String>,
) -> anyhow::Result<SmokeReport> {
    client
        .provision_and_bind(&target.service, &target.plan, |binding, instance| async move {
            let output = match run {
                Some(command) => {
                    let credentials = serde_json::to_string(binding.credentials())?;
                    let runner = ShellCommandRunner::new()
                        .with_env("HULA_INSTANCE_ID", instance.id())
                        .with_env("HULA_BINDING_ID", binding.id())
                        .with_env("HULA_CREDENTIALS", credentials);
                    let output = runner
                        .run(&command, false)
                        .await
                        .with_context(|| format!("smoke command failed against {}", instance.id()))?;
                    Some(output)
                }
                None => None,
            };

            Ok::<_, anyhow::Error>(SmokeReport {
                instance_id: instance.id().to_string(),
                binding_id: binding.id().to_string(),
                credential_keys: binding.credentials().keys().cloned().collect(),
                output,
            })
        })
        .await
}
