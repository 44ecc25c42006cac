//! Registry controller
//!
//! Watches Registry resources and reconciles their storage configuration:
//! validates the desired backend against the facts recorded on the status,
//! persists newly recorded facts, and completes configuration for backends
//! that need no external provisioning.
//!
//! One reconciliation runs to completion per resource; different resources
//! reconcile in parallel. Status writes go through `replace_status`, so a
//! concurrent update loses the resourceVersion race and the reconciliation
//! retries from a fresh read instead of overwriting it.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use kube::{
    api::{Api, PostParams},
    client::Client,
    runtime::controller::{Action, Controller},
    runtime::watcher,
};
use tracing::{debug, error, info, warn};

use crate::crd::{
    ConditionStatus, ManagementState, Registry, RegistryCondition, STORAGE_EXISTS,
};
use crate::error::{Error, ErrorAction, Result};
use crate::storage::DriverFactory;

/// Interval between periodic re-reconciliations of a settled resource
const RESYNC_INTERVAL: Duration = Duration::from_secs(600);

/// Delay before retrying a transient failure
const RETRY_INTERVAL: Duration = Duration::from_secs(30);

/// Shared controller state
pub struct Context {
    pub client: Client,
}

/// Reconcile a single Registry resource
pub async fn reconcile(registry: Arc<Registry>, ctx: Arc<Context>) -> Result<Action> {
    let name = registry
        .metadata
        .name
        .clone()
        .ok_or(Error::MissingMetadata("name"))?;
    let namespace = registry
        .metadata
        .namespace
        .clone()
        .ok_or(Error::MissingMetadata("namespace"))?;

    if registry.spec.management_state != ManagementState::Managed {
        debug!(
            registry = %name,
            state = %registry.spec.management_state,
            "resource is not managed, skipping"
        );
        return Ok(Action::await_change());
    }

    let driver = DriverFactory::create(&name, &namespace, &registry.spec.storage)?;

    let mut status = registry.status.clone().unwrap_or_default();
    let transition = driver.validate_configuration(&status.storage_state)?;
    info!(
        registry = %name,
        backend = driver.name(),
        modified = transition.modified,
        "storage configuration validated"
    );

    let mut changed = transition.modified;
    status.storage_state = transition.state;

    if driver.requires_provisioning() {
        // The storage medium is created by the external provisioning
        // collaborator; record that we are waiting for it, but never
        // overwrite a condition the provisioner has already set.
        if status.condition(STORAGE_EXISTS).is_none() {
            changed |= status.set_condition(RegistryCondition::new(
                STORAGE_EXISTS,
                ConditionStatus::Unknown,
                "AwaitingProvisioning",
                format!("{} storage medium has not been provisioned", driver.name()),
            ));
        }
    } else {
        let completed = driver.complete_configuration(&status.storage)?;
        if completed != status.storage {
            status.storage = completed;
            changed = true;
        }
        changed |= status.set_condition(RegistryCondition::new(
            STORAGE_EXISTS,
            ConditionStatus::True,
            "UserSuppliedVolume",
            "registry data lives on the user-supplied volume",
        ));
    }

    if changed {
        let api: Api<Registry> = Api::namespaced(ctx.client.clone(), &namespace);
        let mut updated = (*registry).clone();
        updated.status = Some(status);
        api.replace_status(&name, &PostParams::default(), serde_json::to_vec(&updated)?)
            .await?;
        info!(registry = %name, "persisted storage status");
    }

    Ok(Action::requeue(RESYNC_INTERVAL))
}

/// Decide how to proceed after a reconciliation error
pub fn error_policy(registry: Arc<Registry>, err: &Error, _ctx: Arc<Context>) -> Action {
    match err.action() {
        ErrorAction::RequeueWithBackoff => {
            warn!(registry = %registry.name(), error = %err, "reconciliation failed, retrying");
            Action::requeue(RETRY_INTERVAL)
        }
        ErrorAction::RequeueAfter(duration) => {
            warn!(registry = %registry.name(), error = %err, "reconciliation failed, retrying");
            Action::requeue(duration)
        }
        ErrorAction::NoRequeue => {
            // Retrying with the same spec fails identically; wait for the
            // user to fix it.
            error!(
                registry = %registry.name(),
                error = %err,
                "rejected storage configuration, waiting for spec change"
            );
            Action::await_change()
        }
    }
}

/// Run the controller until shutdown
pub async fn run(client: Client) -> Result<()> {
    let registries: Api<Registry> = Api::all(client.clone());
    let ctx = Arc::new(Context { client });

    info!("starting registry controller");
    Controller::new(registries, watcher::Config::default())
        .shutdown_on_signal()
        .run(reconcile, error_policy, ctx)
        .for_each(|result| async move {
            match result {
                Ok((object, _)) => debug!(object = %object, "reconciled"),
                Err(err) => warn!(error = %err, "reconciliation error"),
            }
        })
        .await;

    info!("registry controller stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{FilesystemStorage, RegistrySpec, StorageSpec};

    #[tokio::test]
    async fn test_error_policy_waits_on_rejected_configuration() {
        let registry = Arc::new(Registry::new(
            "image-registry",
            RegistrySpec {
                storage: StorageSpec {
                    filesystem: Some(FilesystemStorage::default()),
                    ..Default::default()
                },
                ..serde_json::from_value(serde_json::json!({})).unwrap()
            },
        ));

        let err = Error::ConfigurationChangeRejected {
            key: "storagetype".into(),
            previous: "filesystem".into(),
            requested: "s3".into(),
        };
        // await_change is requeue-never; compare against the canonical value
        assert_eq!(
            format!("{:?}", error_policy(registry.clone(), &err, test_context())),
            format!("{:?}", Action::await_change())
        );

        let transient = Error::Internal("status write failed".into());
        assert_eq!(
            format!("{:?}", error_policy(registry, &transient, test_context())),
            format!("{:?}", Action::requeue(RETRY_INTERVAL))
        );
    }

    fn test_context() -> Arc<Context> {
        // A client is only needed for status writes, which error_policy
        // never performs.
        Arc::new(Context {
            client: Client::try_from(
                kube::Config::new("http://localhost:8080".parse().unwrap()),
            )
            .unwrap(),
        })
    }
}
