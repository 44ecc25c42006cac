//! Filesystem storage driver
//!
//! Mounts a user-supplied volume source at the registry root directory.
//! The storage medium is whatever the volume points at, so nothing is
//! provisioned and the medium is never operator-managed.

use k8s_openapi::api::core::v1::{EnvVar, Volume, VolumeMount};
use tracing::debug;

use crate::crd::{FilesystemStorage, StorageSpec, StorageStatus};
use crate::error::Result;
use crate::storage::source::{volume_source_kind, volume_with_source};
use crate::storage::state::STORAGE_FIELD;
use crate::storage::{env_var, StorageDriver};

/// Fixed mount point for registry data inside the workload
pub const ROOT_DIRECTORY: &str = "/registry";

/// Name of the volume carrying registry data
const VOLUME_NAME: &str = "registry-storage";

/// Driver for the filesystem backend
pub struct FilesystemDriver {
    name: String,
    namespace: String,
    config: FilesystemStorage,
}

impl FilesystemDriver {
    /// Create a new filesystem driver for the given resource
    pub fn new(name: &str, namespace: &str, config: FilesystemStorage) -> Self {
        Self {
            name: name.to_string(),
            namespace: namespace.to_string(),
            config,
        }
    }
}

impl StorageDriver for FilesystemDriver {
    fn name(&self) -> &'static str {
        "filesystem"
    }

    fn config_env(&self) -> Vec<EnvVar> {
        vec![
            env_var("REGISTRY_STORAGE", self.name()),
            env_var("REGISTRY_STORAGE_FILESYSTEM_ROOTDIRECTORY", ROOT_DIRECTORY),
        ]
    }

    fn volumes(&self) -> (Vec<Volume>, Vec<VolumeMount>) {
        let volume = volume_with_source(VOLUME_NAME, &self.config.volume_source);
        let mount = VolumeMount {
            name: volume.name.clone(),
            mount_path: ROOT_DIRECTORY.to_string(),
            ..Default::default()
        };
        (vec![volume], vec![mount])
    }

    fn immutable_facts(&self) -> Result<Vec<(&'static str, String)>> {
        let mut facts = Vec::new();
        // An unresolved kind carries no constraint.
        if let Some(kind) = volume_source_kind(&self.config.volume_source)? {
            facts.push((STORAGE_FIELD, kind.to_ascii_lowercase()));
        }
        Ok(facts)
    }

    fn requires_provisioning(&self) -> bool {
        false
    }

    fn complete_configuration(&self, status: &StorageStatus) -> Result<StorageStatus> {
        debug!(
            registry = %self.name,
            namespace = %self.namespace,
            "filesystem storage requires no completion"
        );
        let mut status = status.clone();
        status.managed = false;
        status.state = StorageSpec {
            filesystem: Some(self.config.clone()),
            ..Default::default()
        };
        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::VolumeSource;
    use crate::error::Error;
    use crate::storage::state::{StateStore, STORAGE_TYPE};
    use assert_matches::assert_matches;
    use k8s_openapi::api::core::v1::{EmptyDirVolumeSource, PersistentVolumeClaimVolumeSource};

    fn driver_with_source(volume_source: VolumeSource) -> FilesystemDriver {
        FilesystemDriver::new(
            "image-registry",
            "registry-system",
            FilesystemStorage { volume_source },
        )
    }

    fn empty_dir_driver() -> FilesystemDriver {
        driver_with_source(VolumeSource {
            empty_dir: Some(EmptyDirVolumeSource::default()),
            ..Default::default()
        })
    }

    #[test]
    fn test_config_env_is_deterministic() {
        let a = empty_dir_driver().config_env();
        let b = empty_dir_driver().config_env();
        assert_eq!(a, b);

        assert_eq!(a[0].name, "REGISTRY_STORAGE");
        assert_eq!(a[0].value.as_deref(), Some("filesystem"));
        assert_eq!(a[1].name, "REGISTRY_STORAGE_FILESYSTEM_ROOTDIRECTORY");
        assert_eq!(a[1].value.as_deref(), Some(ROOT_DIRECTORY));
    }

    #[test]
    fn test_volumes_mount_the_supplied_source_at_the_root() {
        let source = VolumeSource {
            persistent_volume_claim: Some(PersistentVolumeClaimVolumeSource {
                claim_name: "registry-data".into(),
                ..Default::default()
            }),
            ..Default::default()
        };
        let (volumes, mounts) = driver_with_source(source.clone()).volumes();

        assert_eq!(volumes.len(), 1);
        assert_eq!(mounts.len(), 1);
        assert_eq!(mounts[0].mount_path, ROOT_DIRECTORY);
        assert_eq!(mounts[0].name, volumes[0].name);
        assert_eq!(
            volumes[0].persistent_volume_claim,
            source.persistent_volume_claim
        );
    }

    #[test]
    fn test_validation_records_lowercase_source_kind() {
        let transition = empty_dir_driver()
            .validate_configuration(&StateStore::new())
            .unwrap();

        assert!(transition.modified);
        assert_eq!(transition.state.get(STORAGE_TYPE), Some("filesystem"));
        assert_eq!(transition.state.get(STORAGE_FIELD), Some("emptydir"));
    }

    #[test]
    fn test_validation_is_idempotent() {
        let driver = empty_dir_driver();
        let first = driver.validate_configuration(&StateStore::new()).unwrap();
        let second = driver.validate_configuration(&first.state).unwrap();
        assert!(!second.modified);
        assert_eq!(second.state, first.state);
    }

    #[test]
    fn test_validation_rejects_source_kind_change() {
        let first = empty_dir_driver()
            .validate_configuration(&StateStore::new())
            .unwrap();

        let switched = driver_with_source(VolumeSource {
            persistent_volume_claim: Some(PersistentVolumeClaimVolumeSource::default()),
            ..Default::default()
        });
        let err = switched.validate_configuration(&first.state).unwrap_err();
        assert_matches!(
            err,
            Error::ConfigurationChangeRejected { key, previous, requested }
                if key == "storagefield"
                    && previous == "emptydir"
                    && requested == "persistentvolumeclaim"
        );
    }

    #[test]
    fn test_unset_source_carries_no_constraint() {
        let driver = driver_with_source(VolumeSource::default());
        let transition = driver.validate_configuration(&StateStore::new()).unwrap();
        assert_eq!(transition.state.get(STORAGE_FIELD), None);
        assert_eq!(transition.state.get(STORAGE_TYPE), Some("filesystem"));
    }

    #[test]
    fn test_completion_commits_snapshot_unmanaged() {
        let driver = empty_dir_driver();
        let status = driver.complete_configuration(&StorageStatus::default()).unwrap();
        assert!(!status.managed);
        assert_eq!(status.state.filesystem, Some(driver.config.clone()));
        assert!(status.state.s3.is_none());
    }
}
