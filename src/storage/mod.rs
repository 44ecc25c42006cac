//! Storage Backend Drivers
//!
//! Provides drivers for the supported registry storage backends:
//! - Filesystem: user-supplied local volume
//! - S3: AWS S3 or S3-compatible object storage
//! - Azure: Azure Blob Storage
//! - GCS: Google Cloud Storage
//! - Swift: OpenStack Swift
//!
//! Every driver implements the same contract: it derives the workload
//! configuration (env vars, volumes) for its backend and pins the facts
//! that must never change once storage has been provisioned.

pub mod azure;
pub mod filesystem;
pub mod gcs;
pub mod s3;
pub mod source;
pub mod state;
pub mod swift;

pub use azure::AzureDriver;
pub use filesystem::FilesystemDriver;
pub use gcs::GcsDriver;
pub use s3::S3Driver;
pub use swift::SwiftDriver;

use k8s_openapi::api::core::v1::{EnvVar, Volume, VolumeMount};

use crate::crd::{Registry, StorageBackend, StorageSpec, StorageStatus};
use crate::error::Result;
use state::{StateStore, StateTransition, STORAGE_TYPE};

// =============================================================================
// Driver Contract
// =============================================================================

/// Common contract implemented by every storage backend.
///
/// Drivers are short-lived values constructed per reconciliation from the
/// resource identity and the active backend configuration. They perform no
/// I/O: they describe what storage configuration should exist and leave
/// provisioning to the external collaborator.
pub trait StorageDriver: Send {
    /// Stable backend identifier, recorded as the `storagetype` fact
    fn name(&self) -> &'static str;

    /// Environment variables the workload needs to select and configure
    /// this backend. Deterministic for identical input, so repeated
    /// reconciliations do not cause spurious redeployments.
    fn config_env(&self) -> Vec<EnvVar>;

    /// Volumes the workload must mount for this backend. Cloud backends
    /// return empty sequences; credentials are supplied externally.
    fn volumes(&self) -> (Vec<Volume>, Vec<VolumeMount>);

    /// Backend-specific facts that must never change once recorded
    fn immutable_facts(&self) -> Result<Vec<(&'static str, String)>>;

    /// Whether the backend medium must be created by the external
    /// provisioning collaborator before configuration can complete
    fn requires_provisioning(&self) -> bool {
        true
    }

    /// Validate the desired configuration against previously recorded
    /// facts. First-time facts are recorded; a conflicting fact fails the
    /// whole pass and records nothing.
    fn validate_configuration(&self, state: &StateStore) -> Result<StateTransition> {
        let mut facts = vec![(STORAGE_TYPE, self.name().to_string())];
        facts.extend(self.immutable_facts()?);
        state.pin_all(facts)
    }

    /// Derive the status fields the backend remembers once the storage
    /// medium is confirmed to exist: the committed configuration snapshot,
    /// generated medium names, and whether the medium is operator-managed.
    fn complete_configuration(&self, status: &StorageStatus) -> Result<StorageStatus>;
}

// =============================================================================
// Driver Factory
// =============================================================================

/// Factory selecting the driver for the populated backend section
pub struct DriverFactory;

impl DriverFactory {
    /// Create the driver matching the active backend variant.
    ///
    /// Fails when no backend is configured or when more than one is.
    pub fn create(
        name: &str,
        namespace: &str,
        storage: &StorageSpec,
    ) -> Result<Box<dyn StorageDriver>> {
        Ok(match storage.backend()? {
            StorageBackend::Filesystem(c) => Box::new(FilesystemDriver::new(name, namespace, c)),
            StorageBackend::S3(c) => Box::new(S3Driver::new(name, namespace, c)),
            StorageBackend::Azure(c) => Box::new(AzureDriver::new(name, namespace, c)),
            StorageBackend::Gcs(c) => Box::new(GcsDriver::new(name, namespace, c)),
            StorageBackend::Swift(c) => Box::new(SwiftDriver::new(name, namespace, c)),
        })
    }
}

// =============================================================================
// Storage Plan
// =============================================================================

/// Workload configuration derived from the desired backend, plus the fact
/// table after validation. Consumed by the deployment-rendering side and by
/// the controller when persisting status.
#[derive(Debug, Clone)]
pub struct StoragePlan {
    /// Name of the active backend
    pub backend: &'static str,
    /// Environment variables for the registry workload
    pub env: Vec<EnvVar>,
    /// Volumes the workload must declare
    pub volumes: Vec<Volume>,
    /// Mounts for those volumes
    pub mounts: Vec<VolumeMount>,
    /// Fact table after validation
    pub state: StateTransition,
}

/// Run one validation and derivation pass over the resource without
/// mutating it.
pub fn plan(registry: &Registry) -> Result<StoragePlan> {
    let name = registry.metadata.name.as_deref().unwrap_or_default();
    let namespace = registry.metadata.namespace.as_deref().unwrap_or_default();

    let driver = DriverFactory::create(name, namespace, &registry.spec.storage)?;
    let current = registry
        .status
        .as_ref()
        .map(|s| s.storage_state.clone())
        .unwrap_or_default();

    let state = driver.validate_configuration(&current)?;
    let (volumes, mounts) = driver.volumes();

    Ok(StoragePlan {
        backend: driver.name(),
        env: driver.config_env(),
        volumes,
        mounts,
        state,
    })
}

// =============================================================================
// Helpers
// =============================================================================

pub(crate) fn env_var(name: &str, value: impl Into<String>) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value: Some(value.into()),
        ..Default::default()
    }
}

/// Default name for an operator-created storage medium. Derived from the
/// resource identity only, so repeated completion yields the same name.
pub(crate) fn default_medium_name(namespace: &str, name: &str) -> String {
    format!("{}-{}-registry", namespace, name)
}
