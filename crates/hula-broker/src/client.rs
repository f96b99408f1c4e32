//! Provision and bind orchestration with guaranteed teardown.
//!
//! The `with_*` methods and [`BrokerClient::provision_and_bind`] run a unit of
//! work against a live instance or binding and always attempt the matching
//! teardown afterwards: unbind before deprovision, every step attempted, and
//! the earliest failure is the one returned. A panic in the work is caught,
//! the owed teardown runs, and the panic then resumes.

use std::any::Any;
use std::future::Future;
use std::panic::{resume_unwind, AssertUnwindSafe};
use std::time::Duration;

use futures::FutureExt;

use hula_core::{BrokerError, Catalog, InstanceBinding, Plan, Result, ServiceInstance};
use serde_json::Value;

use crate::api::{BrokerApi, HttpBrokerApi};
use crate::config::BrokerConfig;
use crate::lifecycle::{Stage, StageTracker, Teardown};

/// Default pause after a successful unbind.
pub const DEFAULT_UNBIND_SETTLE: Duration = Duration::from_secs(1);

/// Lifecycle orchestration over a [`BrokerApi`].
#[derive(Debug)]
pub struct BrokerClient<A = HttpBrokerApi> {
    api: A,
    unbind_settle: Duration,
}

impl BrokerClient<HttpBrokerApi> {
    /// Create a client that talks HTTP to the configured broker.
    ///
    /// # Errors
    ///
    /// Returns `BrokerError::Config` if the configuration is invalid.
    pub fn from_config(config: &BrokerConfig) -> Result<Self> {
        let api = HttpBrokerApi::new(config)?;
        Ok(Self::new(api).with_unbind_settle(config.unbind_settle()))
    }
}

impl<A: BrokerApi> BrokerClient<A> {
    /// Create a client over `api`.
    #[must_use]
    pub const fn new(api: A) -> Self {
        Self {
            api,
            unbind_settle: DEFAULT_UNBIND_SETTLE,
        }
    }

    /// Set the pause after a successful unbind.
    ///
    /// Brokers may finish unbind side effects asynchronously; the pause gives
    /// them time before the caller carries on.
    #[must_use]
    pub fn with_unbind_settle(mut self, settle: Duration) -> Self {
        self.unbind_settle = settle;
        self
    }

    /// Direct access to the underlying API.
    #[must_use]
    pub const fn api(&self) -> &A {
        &self.api
    }

    /// Fetch the broker's catalog.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn catalog(&self) -> Result<Catalog> {
        self.api.catalog().await
    }

    /// Fetch the broker's debug document.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn debug(&self) -> Result<Value> {
        self.api.debug().await
    }

    /// Deprovision an instance.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn deprovision_instance(&self, instance: &ServiceInstance, plan: &Plan) -> Result<()> {
        self.api.deprovision_instance(instance, plan).await
    }

    /// Remove a binding.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn unbind_instance(&self, binding: &InstanceBinding, plan: &Plan) -> Result<()> {
        self.api.unbind_instance(binding, plan).await
    }

    /// Look up a plan by service and plan name in a freshly fetched catalog.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog request fails or either name is unknown.
    pub async fn resolve_plan(&self, service_name: &str, plan_name: &str) -> Result<Plan> {
        let catalog = self.api.catalog().await?;
        catalog.service_plan(service_name, plan_name).cloned()
    }

    /// Provision an instance and hand it to the caller, who owns its cleanup.
    ///
    /// # Errors
    ///
    /// Returns an error if the plan cannot be resolved or provisioning fails.
    pub async fn provision_instance(
        &self,
        service_name: &str,
        plan_name: &str,
    ) -> Result<ServiceInstance> {
        let plan = self.resolve_plan(service_name, plan_name).await?;
        self.api.provision_instance(&plan, None).await
    }

    /// Provision an instance, run `work` against it, then deprovision it.
    ///
    /// Deprovision is attempted whenever provisioning succeeded, including
    /// when `work` panics; the panic resumes once teardown has run. If both
    /// the work and deprovision fail, the work's error is returned.
    ///
    /// Dropping the returned future before it completes cancels the pending
    /// teardown.
    ///
    /// # Errors
    ///
    /// Returns the first failure among plan lookup, provisioning, the work
    /// and deprovisioning.
    pub async fn with_provisioned_instance<F, Fut, T, E>(
        &self,
        service_name: &str,
        plan_name: &str,
        work: F,
    ) -> std::result::Result<T, E>
    where
        F: FnOnce(ServiceInstance) -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: From<BrokerError>,
    {
        let plan = self.resolve_plan(service_name, plan_name).await?;
        let mut stage = StageTracker::new();

        let instance = self.api.provision_instance(&plan, None).await?;
        stage.advance(Stage::Provisioned);

        let outcome = run_work(|| work(instance.clone())).await;

        self.tear_down(&mut stage, &instance, None, &plan, OWNS_INSTANCE, outcome)
            .await
    }

    /// Bind to an existing instance and hand the binding to the caller.
    ///
    /// # Errors
    ///
    /// Returns an error if the plan cannot be resolved or binding fails.
    pub async fn bind_instance(
        &self,
        instance: &ServiceInstance,
        service_name: &str,
        plan_name: &str,
    ) -> Result<InstanceBinding> {
        let plan = self.resolve_plan(service_name, plan_name).await?;
        self.api.bind_instance(instance, &plan, None).await
    }

    /// Bind to an existing instance, run `work`, then unbind.
    ///
    /// Unbind is attempted whenever binding succeeded, including when `work`
    /// panics, and is followed by the settle pause if it succeeds. If both
    /// the work and unbind fail, the work's error is returned. The instance
    /// belongs to the caller and is never deprovisioned here.
    ///
    /// Dropping the returned future before it completes cancels the pending
    /// unbind.
    ///
    /// # Errors
    ///
    /// Returns the first failure among plan lookup, binding, the work and
    /// unbinding.
    pub async fn with_bound_instance<F, Fut, T, E>(
        &self,
        instance: &ServiceInstance,
        service_name: &str,
        plan_name: &str,
        work: F,
    ) -> std::result::Result<T, E>
    where
        F: FnOnce(InstanceBinding, ServiceInstance) -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: From<BrokerError>,
    {
        let plan = self.resolve_plan(service_name, plan_name).await?;
        let mut stage = StageTracker::starting_at(Stage::Provisioned);

        let binding = self.api.bind_instance(instance, &plan, None).await?;
        stage.advance(Stage::Bound);

        let outcome = run_work(|| work(binding.clone(), instance.clone())).await;
        if outcome.succeeded() {
            stage.advance(Stage::WorkDone);
        }

        self.tear_down(&mut stage, instance, Some(&binding), &plan, OWNS_BINDING, outcome)
            .await
    }

    /// Provision, bind, run `work`, unbind and deprovision.
    ///
    /// Teardown always runs unbind before deprovision and attempts every step
    /// that is owed:
    ///
    /// - provisioning fails: nothing else runs
    /// - binding fails: deprovision runs, unbind does not
    /// - the work fails or panics, or unbind fails: both teardown steps still run
    ///
    /// A panic in `work` resumes after teardown. Dropping the returned future
    /// before it completes cancels the pending teardown.
    ///
    /// # Errors
    ///
    /// Returns the earliest failure. Later teardown failures are logged.
    pub async fn provision_and_bind<F, Fut, T, E>(
        &self,
        service_name: &str,
        plan_name: &str,
        work: F,
    ) -> std::result::Result<T, E>
    where
        F: FnOnce(InstanceBinding, ServiceInstance) -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: From<BrokerError>,
    {
        let plan = self.resolve_plan(service_name, plan_name).await?;
        let mut stage = StageTracker::new();

        let instance = self.api.provision_instance(&plan, None).await?;
        stage.advance(Stage::Provisioned);

        let (binding, outcome) = match self.api.bind_instance(&instance, &plan, None).await {
            Ok(binding) => {
                stage.advance(Stage::Bound);
                let outcome = run_work(|| work(binding.clone(), instance.clone())).await;
                if outcome.succeeded() {
                    stage.advance(Stage::WorkDone);
                }
                (Some(binding), outcome)
            }
            Err(err) => (None, WorkOutcome::Returned(Err(err.into()))),
        };

        self.tear_down(
            &mut stage,
            &instance,
            binding.as_ref(),
            &plan,
            OWNS_INSTANCE,
            outcome,
        )
        .await
    }

    /// Run the teardown steps owed at the current stage that this call owns,
    /// in order, then return the combined result or resume the work's panic.
    async fn tear_down<T, E>(
        &self,
        stage: &mut StageTracker,
        instance: &ServiceInstance,
        binding: Option<&InstanceBinding>,
        plan: &Plan,
        owned: &[Teardown],
        outcome: WorkOutcome<T, E>,
    ) -> std::result::Result<T, E>
    where
        E: From<BrokerError>,
    {
        let mut outcome = outcome;
        for step in stage.pending_teardown() {
            if !owned.contains(&step) {
                continue;
            }
            let teardown = match (step, binding) {
                (Teardown::Unbind, Some(binding)) => self.unbind_and_settle(binding, plan).await,
                (Teardown::Unbind, None) => continue,
                (Teardown::Deprovision, _) => self.api.deprovision_instance(instance, plan).await,
            };
            if teardown.is_ok() {
                stage.advance(step.completed_stage());
            }

            outcome = match outcome {
                WorkOutcome::Returned(result) => {
                    WorkOutcome::Returned(settle(result, teardown, step.name()))
                }
                WorkOutcome::Panicked(payload) => {
                    if let Err(err) = teardown {
                        tracing::warn!(
                            step = step.name(),
                            error = %err,
                            "Teardown failed after the work panicked"
                        );
                    }
                    WorkOutcome::Panicked(payload)
                }
            };
        }

        match outcome {
            WorkOutcome::Returned(result) => result,
            WorkOutcome::Panicked(payload) => resume_unwind(payload),
        }
    }

    async fn unbind_and_settle(&self, binding: &InstanceBinding, plan: &Plan) -> Result<()> {
        self.api.unbind_instance(binding, plan).await?;
        if !self.unbind_settle.is_zero() {
            tokio::time::sleep(self.unbind_settle).await;
        }
        Ok(())
    }
}

/// Teardown owned by calls that provisioned their own instance.
const OWNS_INSTANCE: &[Teardown] = &[Teardown::Unbind, Teardown::Deprovision];

/// Teardown owned by calls that only bound to a caller's instance.
const OWNS_BINDING: &[Teardown] = &[Teardown::Unbind];

/// How the caller's unit of work ended.
enum WorkOutcome<T, E> {
    Returned(std::result::Result<T, E>),
    Panicked(Box<dyn Any + Send>),
}

impl<T, E> WorkOutcome<T, E> {
    const fn succeeded(&self) -> bool {
        matches!(self, Self::Returned(Ok(_)))
    }
}

/// Build and await the work, catching a panic from either step.
async fn run_work<G, Fut, T, E>(work: G) -> WorkOutcome<T, E>
where
    G: FnOnce() -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
{
    match AssertUnwindSafe(async move { work().await })
        .catch_unwind()
        .await
    {
        Ok(result) => WorkOutcome::Returned(result),
        Err(payload) => WorkOutcome::Panicked(payload),
    }
}

/// Combine an earlier outcome with a teardown result. The earlier failure wins.
fn settle<T, E>(
    outcome: std::result::Result<T, E>,
    teardown: Result<()>,
    step: &str,
) -> std::result::Result<T, E>
where
    E: From<BrokerError>,
{
    match (outcome, teardown) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(err)) => Err(err.into()),
        (Err(err), Ok(())) => Err(err),
        (Err(err), Err(teardown_err)) => {
            tracing::warn!(
                step,
                error = %teardown_err,
                "Teardown failed after an earlier failure"
            );
            Err(err)
        }
    }
}
