//! OpenStack Swift storage driver
//!
//! Configures the registry against a Swift container behind a Keystone
//! auth endpoint. Both the container and the auth endpoint are pinned once
//! known, since moving either would orphan the stored images.

use k8s_openapi::api::core::v1::{EnvVar, Volume, VolumeMount};
use tracing::debug;

use crate::crd::{StorageSpec, StorageStatus, SwiftStorage};
use crate::error::Result;
use crate::storage::state::{STORAGE_AUTH_URL, STORAGE_CONTAINER};
use crate::storage::{default_medium_name, env_var, StorageDriver};

/// Driver for the Swift backend
pub struct SwiftDriver {
    name: String,
    namespace: String,
    config: SwiftStorage,
}

impl SwiftDriver {
    /// Create a new Swift driver for the given resource
    pub fn new(name: &str, namespace: &str, config: SwiftStorage) -> Self {
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

impl StorageDriver for SwiftDriver {
    fn name(&self) -> &'static str {
        "swift"
    }

    fn config_env(&self) -> Vec<EnvVar> {
        vec![
            env_var("REGISTRY_STORAGE", self.name()),
            env_var("REGISTRY_STORAGE_SWIFT_AUTHURL", self.config.auth_url.clone()),
            env_var("REGISTRY_STORAGE_SWIFT_CONTAINER", self.container()),
        ]
    }

    fn volumes(&self) -> (Vec<Volume>, Vec<VolumeMount>) {
        (Vec::new(), Vec::new())
    }

    fn immutable_facts(&self) -> Result<Vec<(&'static str, String)>> {
        Ok(vec![
            (STORAGE_CONTAINER, self.container()),
            (STORAGE_AUTH_URL, self.config.auth_url.clone()),
        ])
    }

    fn complete_configuration(&self, status: &StorageStatus) -> Result<StorageStatus> {
        let container = self.container();
        let managed = self.config.container.is_empty();
        debug!(
            registry = %self.name,
            namespace = %self.namespace,
            container = %container,
            managed,
            "completing swift storage configuration"
        );

        let mut status = status.clone();
        status.managed = managed;
        status.state = StorageSpec {
            swift: Some(SwiftStorage {
                container,
                ..self.config.clone()
            }),
            ..Default::default()
        };
        Ok(status)
    }
}
