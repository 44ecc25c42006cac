//! Azure Blob Storage driver
//!
//! Configures the registry against an Azure Blob Storage container. The
//! container name is pinned once known; account credentials are supplied
//! to the workload externally.

use k8s_openapi::api::core::v1::{EnvVar, Volume, VolumeMount};
use tracing::debug;

use crate::crd::{AzureStorage, StorageSpec, StorageStatus};
use crate::error::Result;
use crate::storage::state::STORAGE_CONTAINER;
use crate::storage::{default_medium_name, env_var, StorageDriver};

/// Driver for the Azure backend
pub struct AzureDriver {
    name: String,
    namespace: String,
    config: AzureStorage,
}

impl AzureDriver {
    /// Create a new Azure driver for the given resource
    pub fn new(name: &str, namespace: &str, config: AzureStorage) -> Self {
        Self {
            name: name.to_string(),
            namespace: namespace.to_string(),
            config,
        }
    }

    fn container(&self) -> String {
        if self.config.container.is_empty() {
            default_medium_name(&self.namespace, &self.name)
        } else {
            self.config.container.clone()
        }
    }
}

impl StorageDriver for AzureDriver {
    fn name(&self) -> &'static str {
        "azure"
    }

    fn config_env(&self) -> Vec<EnvVar> {
        vec![
            env_var("REGISTRY_STORAGE", self.name()),
            env_var("REGISTRY_STORAGE_AZURE_CONTAINER", self.container()),
        ]
    }

    fn volumes(&self) -> (Vec<Volume>, Vec<VolumeMount>) {
        (Vec::new(), Vec::new())
    }

    fn immutable_facts(&self) -> Result<Vec<(&'static str, String)>> {
        Ok(vec![(STORAGE_CONTAINER, self.container())])
    }

    fn complete_configuration(&self, status: &StorageStatus) -> Result<StorageStatus> {
        let container = self.container();
        let managed = self.config.container.is_empty();
        debug!(
            registry = %self.name,
            namespace = %self.namespace,
            container = %container,
            managed,
            "completing azure storage configuration"
        );

        let mut status = status.clone();
        status.managed = managed;
        status.state = StorageSpec {
            azure: Some(AzureStorage { container }),
            ..Default::default()
        };
        Ok(status)
    }
}
