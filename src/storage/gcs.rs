//! Google Cloud Storage driver
//!
//! Configures the registry against a GCS bucket. The bucket name is pinned
//! once known; service-account credentials are supplied to the workload
//! externally.

use k8s_openapi::api::core::v1::{EnvVar, Volume, VolumeMount};
use tracing::debug;

use crate::crd::{GcsStorage, StorageSpec, StorageStatus};
use crate::error::Result;
use crate::storage::state::STORAGE_BUCKET;
use crate::storage::{default_medium_name, env_var, StorageDriver};

/// Driver for the GCS backend
pub struct GcsDriver {
    name: String,
    namespace: String,
    config: GcsStorage,
}

impl GcsDriver {
    /// Create a new GCS driver for the given resource
    pub fn new(name: &str, namespace: &str, config: GcsStorage) -> Self {
        Self {
            name: name.to_string(),
            namespace: namespace.to_string(),
            config,
        }
    }

    fn bucket(&self) -> String {
        if self.config.bucket.is_empty() {
            default_medium_name(&self.namespace, &self.name)
        } else {
            self.config.bucket.clone()
        }
    }
}

impl StorageDriver for GcsDriver {
    fn name(&self) -> &'static str {
        "gcs"
    }

    fn config_env(&self) -> Vec<EnvVar> {
        vec![
            env_var("REGISTRY_STORAGE", self.name()),
            env_var("REGISTRY_STORAGE_GCS_BUCKET", self.bucket()),
        ]
    }

    fn volumes(&self) -> (Vec<Volume>, Vec<VolumeMount>) {
        (Vec::new(), Vec::new())
    }

    fn immutable_facts(&self) -> Result<Vec<(&'static str, String)>> {
        Ok(vec![(STORAGE_BUCKET, self.bucket())])
    }

    fn complete_configuration(&self, status: &StorageStatus) -> Result<StorageStatus> {
        let bucket = self.bucket();
        let managed = self.config.bucket.is_empty();
        debug!(
            registry = %self.name,
            namespace = %self.namespace,
            bucket = %bucket,
            managed,
            "completing gcs storage configuration"
        );

        let mut status = status.clone();
        status.managed = managed;
        status.state = StorageSpec {
            gcs: Some(GcsStorage { bucket }),
            ..Default::default()
        };
        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::state::{StateStore, STORAGE_TYPE};

    fn driver(bucket: &str) -> GcsDriver {
        GcsDriver::new(
            "image-registry",
            "registry-system",
            GcsStorage {
                bucket: bucket.into(),
            },
        )
    }

    #[test]
    fn test_config_env_contents() {
        let envs = driver("images").config_env();
        assert_eq!(envs.len(), 2);
        assert_eq!(envs[0].value.as_deref(), Some("gcs"));
        assert_eq!(envs[1].name, "REGISTRY_STORAGE_GCS_BUCKET");
        assert_eq!(envs[1].value.as_deref(), Some("images"));
    }

    #[test]
    fn test_validation_pins_bucket() {
        let transition = driver("images")
            .validate_configuration(&StateStore::new())
            .unwrap();
        assert_eq!(transition.state.get(STORAGE_TYPE), Some("gcs"));
        assert_eq!(transition.state.get(STORAGE_BUCKET), Some("images"));
    }

    #[test]
    fn test_completion_generates_bucket_when_unset() {
        let status = driver("")
            .complete_configuration(&StorageStatus::default())
            .unwrap();
        assert!(status.managed);
        assert_eq!(
            status.state.gcs.unwrap().bucket,
            "registry-system-image-registry-registry"
        );
    }
}
