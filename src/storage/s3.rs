//! S3 storage driver
//!
//! Configures the registry against an AWS S3 (or S3-compatible) bucket.
//! The bucket and region are pinned once known; a bucket left unnamed in
//! the spec is given a deterministic operator-generated name and marked
//! as managed.

use k8s_openapi::api::core::v1::{EnvVar, Volume, VolumeMount};
use tracing::debug;

use crate::crd::{S3Storage, StorageSpec, StorageStatus};
use crate::error::Result;
use crate::storage::state::{STORAGE_BUCKET, STORAGE_REGION};
use crate::storage::{default_medium_name, env_var, StorageDriver};

/// Driver for the S3 backend
pub struct S3Driver {
    name: String,
    namespace: String,
    config: S3Storage,
}

impl S3Driver {
    /// Create a new S3 driver for the given resource
    pub fn new(name: &str, namespace: &str, config: S3Storage) -> Self {
        Self {
            name: name.to_string(),
            namespace: namespace.to_string(),
            config,
        }
    }

    /// Effective bucket name: the configured one, or the generated name
    /// when the spec leaves the bucket empty
    fn bucket(&self) -> String {
        if self.config.bucket.is_empty() {
            default_medium_name(&self.namespace, &self.name)
        } else {
            self.config.bucket.clone()
        }
    }
}

impl StorageDriver for S3Driver {
    fn name(&self) -> &'static str {
        "s3"
    }

    fn config_env(&self) -> Vec<EnvVar> {
        let mut envs = vec![
            env_var("REGISTRY_STORAGE", self.name()),
            env_var("REGISTRY_STORAGE_S3_BUCKET", self.bucket()),
            env_var("REGISTRY_STORAGE_S3_REGION", self.config.region.clone()),
        ];
        if !self.config.region_endpoint.is_empty() {
            envs.push(env_var(
                "REGISTRY_STORAGE_S3_REGIONENDPOINT",
                self.config.region_endpoint.clone(),
            ));
        }
        envs.push(env_var(
            "REGISTRY_STORAGE_S3_ENCRYPT",
            self.config.encrypt.to_string(),
        ));
        envs
    }

    fn volumes(&self) -> (Vec<Volume>, Vec<VolumeMount>) {
        (Vec::new(), Vec::new())
    }

    fn immutable_facts(&self) -> Result<Vec<(&'static str, String)>> {
        Ok(vec![
            (STORAGE_BUCKET, self.bucket()),
            (STORAGE_REGION, self.config.region.clone()),
        ])
    }

    fn complete_configuration(&self, status: &StorageStatus) -> Result<StorageStatus> {
        let bucket = self.bucket();
        let managed = self.config.bucket.is_empty();
        debug!(
            registry = %self.name,
            namespace = %self.namespace,
            bucket = %bucket,
            managed,
            "completing s3 storage configuration"
        );

        let mut status = status.clone();
        status.managed = managed;
        status.state = StorageSpec {
            s3: Some(S3Storage {
                bucket,
                ..self.config.clone()
            }),
            ..Default::default()
        };
        Ok(status)
    }
}
